//! Resume documents: kind detection and text extraction.
//!
//! Only plain text is extracted here. PDF and word-processor files are
//! recognised so the error can say what was rejected.

use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::{Error, Result};

/// Broad document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    WordProcessing,
    PlainText,
    Unknown,
}

impl DocumentKind {
    /// Detect the kind from magic bytes, then the file extension.
    pub fn detect(path: &Path, bytes: &[u8]) -> Self {
        if bytes.starts_with(b"%PDF-") {
            return Self::Pdf;
        }
        // OLE2 compound file (legacy .doc)
        if bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]) {
            return Self::WordProcessing;
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Self::Pdf,
            "doc" | "docx" | "odt" | "rtf" | "pages" => Self::WordProcessing,
            "txt" | "text" | "md" | "markdown" => Self::PlainText,
            // Zip containers are word-processor formats in practice.
            _ if bytes.starts_with(b"PK\x03\x04") => Self::WordProcessing,
            _ if looks_like_text(bytes) => Self::PlainText,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pdf => "PDF",
            Self::WordProcessing => "word-processing document",
            Self::PlainText => "plain text",
            Self::Unknown => "unknown document type",
        })
    }
}

fn looks_like_text(bytes: &[u8]) -> bool {
    !bytes.is_empty() && !bytes.contains(&0) && std::str::from_utf8(bytes).is_ok()
}

/// Turns a document payload into text.
pub trait DocumentParser {
    fn kind(&self) -> DocumentKind;
    fn parse(&self, bytes: &[u8]) -> Result<String>;
}

/// UTF-8 text, with an optional byte-order mark.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextParser;

impl DocumentParser for PlainTextParser {
    fn kind(&self) -> DocumentKind {
        DocumentKind::PlainText
    }

    fn parse(&self, bytes: &[u8]) -> Result<String> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let text = std::str::from_utf8(bytes).map_err(|e| {
            Error::UnsupportedDocument(format!("plain text is not valid UTF-8: {}", e))
        })?;
        Ok(text.replace("\r\n", "\n"))
    }
}

/// Extract text from a document payload.
pub fn extract_text(path: &Path, bytes: &[u8]) -> Result<String> {
    let kind = DocumentKind::detect(path, bytes);
    debug!("document {}: {}", path.display(), kind);
    match kind {
        DocumentKind::PlainText => PlainTextParser.parse(bytes),
        other => Err(Error::UnsupportedDocument(format!(
            "{} ({}); export the resume as plain text",
            other,
            path.display()
        ))),
    }
}

/// Read and extract a document from disk.
pub fn read_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    extract_text(path, &bytes)
}
