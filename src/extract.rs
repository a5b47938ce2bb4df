//! Plain-text extraction for uploaded documents (PDF, CSV, TXT).
//!
//! Every extractor is a pure function of its input bytes. Failures come back
//! as [`ExtractionError`] values; nothing here panics on malformed input.

use std::panic::AssertUnwindSafe;

use crate::models::DocumentKind;

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("unsupported document type: {0}")]
    Unsupported(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("CSV parsing failed: {0}")]
    Csv(String),
    #[error("text is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}

/// Extracts plain text from document bytes of the given kind.
pub fn extract_text(kind: DocumentKind, bytes: &[u8]) -> Result<String, ExtractionError> {
    match kind {
        DocumentKind::Pdf => extract_pdf(bytes),
        DocumentKind::Csv => extract_csv(bytes),
        DocumentKind::Txt => extract_txt(bytes),
    }
}

/// Visible text of every page, in document order. A PDF without text yields `""`.
///
/// pdf-extract panics on some structurally valid but inconsistent files
/// (e.g. a page that selects a font it never declares); those are reported
/// as [`ExtractionError::Pdf`] like any other malformed input.
pub fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractionError> {
    let text = std::panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(bytes)
    }))
    .map_err(|_| ExtractionError::Pdf("malformed PDF".to_string()))?
    .map_err(|e| ExtractionError::Pdf(e.to_string()))?;
    if text.trim().is_empty() {
        return Ok(String::new());
    }
    Ok(text)
}

/// Renders a CSV table as aligned plain text, header first, no row index.
///
/// Columns are right-aligned to their widest cell and separated by two
/// spaces. Ragged rows are rejected.
pub fn extract_csv(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(false)
        .from_reader(bytes);

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ExtractionError::Csv(e.to_string()))?;
        rows.push(record.iter().map(|cell| cell.to_string()).collect());
    }

    if rows.is_empty() {
        return Ok(String::new());
    }

    let columns = rows[0].len();
    let mut widths = vec![0usize; columns];
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let lines: Vec<String> = rows
        .iter()
        .map(|row| {
            row.iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:>width$}", cell, width = *width))
                .collect::<Vec<_>>()
                .join("  ")
        })
        .collect();

    Ok(lines.join("\n"))
}

/// Decodes UTF-8 text verbatim.
pub fn extract_txt(bytes: &[u8]) -> Result<String, ExtractionError> {
    Ok(std::str::from_utf8(bytes)?.to_string())
}
