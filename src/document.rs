//! Raw text extraction from the source document.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{Error, Result};

/// Turns a document on disk into one string of text in reading order.
pub trait DocumentReader {
    fn extract(&self, path: &Path) -> Result<String>;
}

fn unreadable(path: &Path, reason: impl Into<String>) -> Error {
    Error::DocumentUnreadable {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn ensure_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(unreadable(path, "file does not exist"));
    }
    if !path.is_file() {
        return Err(unreadable(path, "path is not a file"));
    }
    Ok(())
}

/// Reads PDF files page by page.
///
/// Each page that yields text contributes that text followed by a newline;
/// pages without extractable text contribute nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfReader;

impl DocumentReader for PdfReader {
    fn extract(&self, path: &Path) -> Result<String> {
        ensure_exists(path)?;

        let document = pdf_oxide::PdfDocument::open(path)
            .map_err(|e| unreadable(path, format!("cannot parse PDF: {e}")))?;
        let page_count = document.page_count().map_err(|e| {
            unreadable(path, format!("cannot read page count: {e}"))
        })?;
        info!(path = %path.display(), pages = page_count, "reading PDF");

        let mut pages = Vec::with_capacity(page_count);
        for page in 0..page_count {
            let text = document.extract_text(page).map_err(|e| {
                unreadable(
                    path,
                    format!("cannot extract text from page {}: {e}", page + 1),
                )
            })?;
            debug!(page = page + 1, chars = text.len(), "extracted page");
            pages.push(text);
        }

        let text = join_pages(pages);
        info!(chars = text.chars().count(), "PDF text extracted");
        Ok(text)
    }
}

/// Reads UTF-8 text files as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextReader;

impl DocumentReader for PlainTextReader {
    fn extract(&self, path: &Path) -> Result<String> {
        ensure_exists(path)?;
        std::fs::read_to_string(path).map_err(|e| unreadable(path, e.to_string()))
    }
}

/// Concatenate page texts, skipping pages with no text.
pub fn join_pages<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut text = String::new();
    for page in pages {
        let page = page.as_ref();
        if page.is_empty() {
            continue;
        }
        text.push_str(page);
        text.push('\n');
    }
    text
}

/// Pick a reader from the file extension: `.pdf` goes through
/// [`PdfReader`], anything else is read as plain text.
pub fn reader_for_path(path: &Path) -> Box<dyn DocumentReader> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        Box::new(PdfReader)
    } else {
        Box::new(PlainTextReader)
    }
}
