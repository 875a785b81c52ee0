//! Document text extraction: turns an uploaded PDF or DOCX into plain text.
//!
//! Classification happens before any parsing: an unsupported upload is
//! rejected without its bytes ever reaching a parser. Extraction is
//! deterministic; the same bytes always yield the same text.
//!
//! Parsing is CPU-bound. Async callers run `extract` via
//! `tokio::task::spawn_blocking`.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use docx_rs::{DocumentChild, InsertChild, Paragraph, ParagraphChild, Run, RunChild};
use serde::Serialize;
use thiserror::Error;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";
pub const DOCX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Pdf => f.write_str("pdf"),
            DocumentKind::Docx => f.write_str("docx"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type. Upload a .pdf or .docx")]
    UnsupportedDocumentType {
        filename: Option<String>,
        media_type: Option<String>,
    },

    #[error("The document contains no extractable text")]
    NoExtractableText,

    #[error("Could not read the {kind} document: {message}")]
    MalformedDocument { kind: DocumentKind, message: String },
}

/// Decides the document kind from the declared filename and media type.
///
/// A known extension wins; the media type is consulted only when the
/// extension is missing or unknown. There is no default kind.
pub fn classify(
    filename: Option<&str>,
    media_type: Option<&str>,
) -> Result<DocumentKind, ExtractionError> {
    let extension = filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    let by_extension = match extension.as_deref() {
        Some("pdf") => Some(DocumentKind::Pdf),
        Some("docx") => Some(DocumentKind::Docx),
        _ => None,
    };

    // Media types may carry parameters, e.g. "application/pdf; charset=binary".
    let essence = media_type
        .and_then(|mt| mt.split(';').next())
        .map(|mt| mt.trim().to_ascii_lowercase());

    let by_media_type = match essence.as_deref() {
        Some(PDF_MEDIA_TYPE) => Some(DocumentKind::Pdf),
        Some(DOCX_MEDIA_TYPE) => Some(DocumentKind::Docx),
        _ => None,
    };

    by_extension
        .or(by_media_type)
        .ok_or_else(|| ExtractionError::UnsupportedDocumentType {
            filename: filename.map(String::from),
            media_type: media_type.map(String::from),
        })
}

/// The extraction seam used by the match analyzer.
pub trait DocumentExtractor: Send + Sync {
    fn extract(
        &self,
        bytes: &[u8],
        filename: Option<&str>,
        media_type: Option<&str>,
    ) -> Result<String, ExtractionError>;
}

/// Default extractor: `pdf-extract` for PDF, `docx-rs` for DOCX.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileTextExtractor;

impl DocumentExtractor for FileTextExtractor {
    fn extract(
        &self,
        bytes: &[u8],
        filename: Option<&str>,
        media_type: Option<&str>,
    ) -> Result<String, ExtractionError> {
        let kind = classify(filename, media_type)?;

        if bytes.is_empty() {
            return Err(ExtractionError::NoExtractableText);
        }

        let text = match kind {
            DocumentKind::Pdf => extract_pdf_text(bytes)?,
            DocumentKind::Docx => extract_docx_text(bytes)?,
        };

        if text.trim().is_empty() {
            return Err(ExtractionError::NoExtractableText);
        }
        Ok(text)
    }
}

/// Page-by-page PDF text. Pages without text (scans, images) are skipped.
fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    // pdf-extract panics on some malformed font tables; treat that as a bad document.
    let pages = catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }))
    .map_err(|_| ExtractionError::MalformedDocument {
        kind: DocumentKind::Pdf,
        message: "the PDF parser aborted on this file".to_string(),
    })?
    .map_err(|e| ExtractionError::MalformedDocument {
        kind: DocumentKind::Pdf,
        message: e.to_string(),
    })?;

    let text = pages
        .iter()
        .map(|page| page.trim())
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    Ok(text)
}

/// Top-level DOCX paragraphs in document order; empty paragraphs are dropped.
fn extract_docx_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| ExtractionError::MalformedDocument {
        kind: DocumentKind::Docx,
        message: e.to_string(),
    })?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(paragraph) => Some(paragraph_text(paragraph)),
            _ => None,
        })
        .filter(|text| !text.trim().is_empty())
        .collect();

    Ok(paragraphs.join("\n"))
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut buffer = String::new();
    for child in &paragraph.children {
        append_paragraph_child(child, &mut buffer);
    }
    buffer
}

fn append_paragraph_child(child: &ParagraphChild, buffer: &mut String) {
    match child {
        ParagraphChild::Run(run) => append_run(run, buffer),
        ParagraphChild::Insert(insert) => {
            for inner in &insert.children {
                if let InsertChild::Run(run) = inner {
                    append_run(run, buffer);
                }
            }
        }
        ParagraphChild::Hyperlink(link) => {
            for inner in &link.children {
                append_paragraph_child(inner, buffer);
            }
        }
        _ => {}
    }
}

fn append_run(run: &Run, buffer: &mut String) {
    for child in &run.children {
        match child {
            RunChild::Text(text) => buffer.push_str(&text.text),
            RunChild::Tab(_) => buffer.push('\t'),
            RunChild::Break(_) => buffer.push(' '),
            _ => {}
        }
    }
}
