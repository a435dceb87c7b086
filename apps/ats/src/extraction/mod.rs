//! Document Extractor: turns an uploaded resume (PDF / DOC / DOCX) into plain text.
//!
//! Pure with respect to its input: reads the bytes it is given and nothing else.
//! Parsing is CPU-bound, so async callers should go through [`extract_text_blocking`].

mod doc;
mod docx;
mod pdf;

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExtractError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt or unreadable file: {0}")]
    CorruptFile(String),

    #[error("Could not extract text")]
    EmptyDocument,
}

/// Document types the extractor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Doc,
    Docx,
}

const MIME_PDF: &str = "application/pdf";
const MIME_DOC: &str = "application/msword";
const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

impl DocumentKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    pub fn from_mime(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            MIME_PDF => Some(Self::Pdf),
            MIME_DOC => Some(Self::Doc),
            MIME_DOCX => Some(Self::Docx),
            _ => None,
        }
    }

    /// Resolves the declared type of an upload: file extension first, then MIME type.
    pub fn resolve(filename: &str, content_type: Option<&str>) -> Result<Self, ExtractError> {
        Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .or_else(|| content_type.and_then(Self::from_mime))
            .ok_or_else(|| {
                let declared = content_type.unwrap_or("unknown type");
                ExtractError::UnsupportedFormat(format!("{filename} ({declared})"))
            })
    }
}

/// Extracts plain text from `bytes` interpreted as `kind`.
///
/// Returns `EmptyDocument` when the file parses but carries no text
/// (scanned PDFs, empty documents).
pub fn extract_text(bytes: &[u8], kind: DocumentKind) -> Result<String, ExtractError> {
    if bytes.is_empty() {
        return Err(ExtractError::CorruptFile("file is empty".to_string()));
    }

    let raw = match kind {
        DocumentKind::Pdf => pdf::extract(bytes)?,
        DocumentKind::Docx => docx::extract(bytes)?,
        DocumentKind::Doc => doc::extract(bytes)?,
    };

    let text = normalize_whitespace(&raw);
    if text.is_empty() {
        return Err(ExtractError::EmptyDocument);
    }
    Ok(text)
}

/// Runs [`extract_text`] on the blocking pool.
pub async fn extract_text_blocking(
    bytes: bytes::Bytes,
    kind: DocumentKind,
) -> Result<String, ExtractError> {
    tokio::task::spawn_blocking(move || extract_text(&bytes, kind))
        .await
        .map_err(|e| ExtractError::CorruptFile(format!("extraction task failed: {e}")))?
}

/// Trims trailing spaces, drops control characters and collapses runs of blank lines.
fn normalize_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;

    for line in raw.lines() {
        let line: String = line
            .chars()
            .filter(|c| !c.is_control() || *c == '\t')
            .collect();
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    out.trim().to_string()
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Builds real documents in memory so extraction is tested against actual parsers.

    use std::io::Cursor;

    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// A one-page PDF with each entry of `lines` drawn in Helvetica.
    pub fn pdf_with_lines(lines: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("TL", vec![16.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
        ];
        for line in lines {
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    /// A DOCX with one paragraph per entry of `paragraphs`.
    pub fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
        let mut docx = docx_rs::Docx::new();
        for text in paragraphs {
            docx = docx.add_paragraph(
                docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text(*text)),
            );
        }
        let mut cursor = Cursor::new(Vec::new());
        docx.build().pack(&mut cursor).unwrap();
        cursor.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{docx_with_paragraphs, pdf_with_lines};
    use super::*;

    #[test]
    fn test_resolve_by_extension_is_case_insensitive() {
        assert_eq!(
            DocumentKind::resolve("Resume.PDF", None).unwrap(),
            DocumentKind::Pdf
        );
        assert_eq!(
            DocumentKind::resolve("cv.docx", Some("application/octet-stream")).unwrap(),
            DocumentKind::Docx
        );
        assert_eq!(DocumentKind::resolve("old.doc", None).unwrap(), DocumentKind::Doc);
    }

    #[test]
    fn test_resolve_falls_back_to_mime() {
        let kind = DocumentKind::resolve("upload", Some("application/pdf; charset=binary")).unwrap();
        assert_eq!(kind, DocumentKind::Pdf);
    }

    #[test]
    fn test_resolve_rejects_unknown_types() {
        let err = DocumentKind::resolve("photo.png", Some("image/png")).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(ref m) if m.contains("photo.png")));
    }

    #[test]
    fn test_pdf_extraction_returns_text() {
        let bytes = pdf_with_lines(&["Jane Doe", "Patent Counsel"]);
        let text = extract_text(&bytes, DocumentKind::Pdf).unwrap();
        assert!(text.contains("Jane Doe"), "got: {text}");
        assert!(text.contains("Patent Counsel"), "got: {text}");
    }

    #[test]
    fn test_docx_extraction_returns_paragraphs() {
        let bytes = docx_with_paragraphs(&["Jane Doe", "LLM, National Law School"]);
        let text = extract_text(&bytes, DocumentKind::Docx).unwrap();
        assert_eq!(text, "Jane Doe\nLLM, National Law School");
    }

    #[test]
    fn test_doc_declared_file_that_is_really_docx() {
        let bytes = docx_with_paragraphs(&["Renamed resume"]);
        let text = extract_text(&bytes, DocumentKind::Doc).unwrap();
        assert_eq!(text, "Renamed resume");
    }

    #[test]
    fn test_garbage_is_corrupt_for_every_kind() {
        let garbage = b"this is definitely not a document".to_vec();
        for kind in [DocumentKind::Pdf, DocumentKind::Doc, DocumentKind::Docx] {
            let err = extract_text(&garbage, kind).unwrap_err();
            assert!(
                matches!(err, ExtractError::CorruptFile(_)),
                "{kind:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_empty_bytes_are_corrupt() {
        let err = extract_text(&[], DocumentKind::Pdf).unwrap_err();
        assert!(matches!(err, ExtractError::CorruptFile(_)));
    }

    #[test]
    fn test_docx_without_text_is_empty_document() {
        let bytes = docx_with_paragraphs(&["   "]);
        let err = extract_text(&bytes, DocumentKind::Docx).unwrap_err();
        assert_eq!(err, ExtractError::EmptyDocument);
    }

    #[test]
    fn test_normalize_collapses_blank_lines() {
        let raw = "Name  \n\n\n\nSkills\t\n\u{0}Rust\n";
        assert_eq!(normalize_whitespace(raw), "Name\n\nSkills\nRust");
    }

    #[tokio::test]
    async fn test_blocking_wrapper_matches_sync_path() {
        let bytes = docx_with_paragraphs(&["Async resume"]);
        let text = extract_text_blocking(bytes::Bytes::from(bytes), DocumentKind::Docx)
            .await
            .unwrap();
        assert_eq!(text, "Async resume");
    }
}
