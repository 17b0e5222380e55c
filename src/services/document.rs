use std::path::Path;

use crate::error::{AppError, Result};
use crate::text::collapse_whitespace;

/// Whitespace-normalised text of a PDF or plain-text file.
pub fn extract_document_text(path: &Path) -> Result<String> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

    let raw = if is_pdf {
        pdf_extract::extract_text(path)
            .map_err(|e| AppError::Document(format!("{}: {}", path.display(), e)))?
    } else {
        std::fs::read_to_string(path)?
    };

    let text = collapse_whitespace(&raw);
    if text.is_empty() {
        return Err(AppError::Document(format!(
            "No text found in {}",
            path.display()
        )));
    }
    Ok(text)
}
