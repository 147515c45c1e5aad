//! Question/answer history kept by interactive front ends.

use serde::{Deserialize, Serialize};

/// Sample questions offered to new users.
pub const EXAMPLE_QUESTIONS: [&str; 4] = [
    "What are the main goals of the plan?",
    "What are the transportation plans?",
    "What are the environmental policies?",
    "What is urban transformation?",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub question: String,
    pub answer: String,
}

/// Append-only list of exchanges. Records can only be removed all at once.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    records: Vec<QueryRecord>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.records.push(QueryRecord {
            question: question.into(),
            answer: answer.into(),
        });
    }

    pub fn records(&self) -> &[QueryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
