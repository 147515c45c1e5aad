//! Answer composition from retrieved passages.
//!
//! Remote generation is best effort: whenever the backend fails, the
//! composer answers from the passages themselves so a question always gets
//! an answer.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::generation::GenerationBackend;

/// Characters of context quoted by a local answer.
pub const LOCAL_EXCERPT_CHARS: usize = 1000;

pub const LOCAL_DISCLAIMER: &str =
    "Note: this answer was automatically extracted from the document text.";

pub const NO_INFORMATION_ANSWER: &str =
    "No relevant information was found in the document for this question.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMode {
    Remote,
    Local,
}

pub struct AnswerComposer {
    document_title: String,
    backend: Option<Box<dyn GenerationBackend>>,
}

impl AnswerComposer {
    /// A composer that only ever answers locally.
    pub fn local(document_title: impl Into<String>) -> Self {
        Self {
            document_title: document_title.into(),
            backend: None,
        }
    }

    pub fn with_backend(
        document_title: impl Into<String>,
        backend: Box<dyn GenerationBackend>,
    ) -> Self {
        Self {
            document_title: document_title.into(),
            backend: Some(backend),
        }
    }

    pub fn document_title(&self) -> &str {
        &self.document_title
    }

    /// Whether a remote backend is attached.
    pub fn remote_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Answer `question` from `passages`, given in retrieval order.
    ///
    /// Never fails: remote errors and a missing backend both produce the
    /// local answer.
    pub fn compose(
        &self,
        question: &str,
        passages: &[String],
        mode: AnswerMode,
    ) -> String {
        let context = passages.join("\n\n");

        if mode == AnswerMode::Remote
            && let Some(backend) = &self.backend
        {
            let prompt = build_prompt(&self.document_title, &context, question);
            match backend.generate(&prompt) {
                Ok(answer) => {
                    debug!(backend = backend.name(), "remote answer generated");
                    return answer;
                }
                Err(e) => {
                    warn!(
                        backend = backend.name(),
                        error = %e,
                        "remote generation failed, answering locally"
                    );
                }
            }
        }

        local_answer(&self.document_title, &context)
    }
}

impl std::fmt::Debug for AnswerComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerComposer")
            .field("document_title", &self.document_title)
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .finish()
    }
}

/// Prompt sent to the remote model.
pub fn build_prompt(document_title: &str, context: &str, question: &str) -> String {
    format!(
        "You are an assistant specialised in the {document_title}.\n\
         Answer the question using only the information taken from the document below.\n\
         \n\
         DOCUMENT CONTENT:\n\
         {context}\n\
         \n\
         QUESTION: {question}\n\
         \n\
         ANSWER:"
    )
}

/// Deterministic answer quoting the start of the retrieved context.
///
/// # Examples
///
/// ```
/// use planrag::composer::{NO_INFORMATION_ANSWER, local_answer};
///
/// let answer = local_answer("Regional Plan", "Metro lines will double.");
/// assert!(answer.contains("Metro lines will double."));
///
/// assert_eq!(local_answer("Regional Plan", "  "), NO_INFORMATION_ANSWER);
/// ```
pub fn local_answer(document_title: &str, context: &str) -> String {
    if context.trim().is_empty() {
        return NO_INFORMATION_ANSWER.to_string();
    }

    let mut excerpt: String = context.chars().take(LOCAL_EXCERPT_CHARS).collect();
    if context.chars().nth(LOCAL_EXCERPT_CHARS).is_some() {
        excerpt.push_str("...");
    }

    format!(
        "Relevant information found in the {document_title}:\n\n{excerpt}\n\n{LOCAL_DISCLAIMER}"
    )
}
