//! PDF text extraction.
//!
//! PDF support is an optional capability behind the `pdf` cargo feature.
//! Callers probe [`pdf_support_available`] and treat an unavailable extractor
//! as a normal runtime state: the file is skipped, indexing continues.

/// Extraction error. The loader logs these and drops the file.
#[derive(Debug)]
pub enum ExtractError {
    Unavailable,
    Pdf(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Unavailable => write!(f, "PDF support not compiled in"),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Whether this build can read PDF files.
pub fn pdf_support_available() -> bool {
    cfg!(feature = "pdf")
}

/// Extract text page by page, joining pages with `\n`.
#[cfg(feature = "pdf")]
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed files.
    let result = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| ExtractError::Pdf("parser panicked".to_string()))?;
    let pages = result.map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(pages.join("\n"))
}

#[cfg(not(feature = "pdf"))]
pub fn extract_pdf_text(_bytes: &[u8]) -> Result<String, ExtractError> {
    Err(ExtractError::Unavailable)
}
