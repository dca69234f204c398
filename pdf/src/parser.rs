//! Native text extraction pass (§4.4 step 1), adapted from the pack's
//! `lopdf`-based page text extractor.

use std::path::Path;

use lopdf::Document;

use crate::error::{PdfError, Result};

/// Per-page extracted, normalized text, in page order (1-based page
/// numbers implied by index + 1).
pub fn extract_pages(path: &Path) -> Result<Vec<String>> {
    let doc = Document::load(path).map_err(|e| PdfError::Parse(e.to_string()))?;
    extract_pages_from_doc(&doc)
}

/// Extracts from an in-memory PDF, for callers that already hold the
/// bytes (e.g. tests).
pub fn extract_pages_from_bytes(bytes: &[u8]) -> Result<Vec<String>> {
    let doc = Document::load_mem(bytes).map_err(|e| PdfError::Parse(e.to_string()))?;
    extract_pages_from_doc(&doc)
}

fn extract_pages_from_doc(doc: &Document) -> Result<Vec<String>> {
    let page_map = doc.get_pages();
    let mut page_numbers: Vec<u32> = page_map.keys().copied().collect();
    page_numbers.sort_unstable();

    Ok(page_numbers
        .iter()
        .map(|page_number| {
            let raw = doc.extract_text(&[*page_number]).unwrap_or_default();
            normalize_text(&raw)
        })
        .collect())
}

fn normalize_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pdf_bytes_error() {
        let err = extract_pages_from_bytes(b"not a pdf").unwrap_err();
        assert!(matches!(err, PdfError::Parse(_)));
    }
}
