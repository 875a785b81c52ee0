use serde::Serialize;

use crate::analysis::extractor::DocumentKind;

/// An uploaded CV after successful extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CvDocument {
    pub filename: Option<String>,
    pub media_type: Option<String>,
    pub kind: DocumentKind,
    pub extracted_text: String,
    pub char_count: usize,
}
