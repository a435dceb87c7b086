use std::panic::{self, AssertUnwindSafe};

use tracing::debug;

use super::ExtractError;

/// Extracts the text layer of a PDF. `pdf-extract` panics on some malformed
/// inputs; those panics are reported as corruption.
pub(super) fn extract(bytes: &[u8]) -> Result<String, ExtractError> {
    if !bytes.starts_with(b"%PDF") {
        return Err(ExtractError::CorruptFile("missing %PDF header".to_string()));
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)));
    match outcome {
        Ok(Ok(text)) => {
            debug!("PDF text layer: {} chars", text.len());
            Ok(text)
        }
        Ok(Err(e)) => Err(ExtractError::CorruptFile(format!("PDF parse failed: {e}"))),
        Err(_) => Err(ExtractError::CorruptFile(
            "PDF parser aborted on malformed input".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_check_rejects_non_pdf() {
        let err = extract(b"PK\x03\x04 zip bytes").unwrap_err();
        assert_eq!(
            err,
            ExtractError::CorruptFile("missing %PDF header".to_string())
        );
    }

    #[test]
    fn test_truncated_pdf_is_corrupt() {
        let err = extract(b"%PDF-1.5\n1 0 obj\n<< /Type /Catalog").unwrap_err();
        assert!(matches!(err, ExtractError::CorruptFile(_)));
    }
}
