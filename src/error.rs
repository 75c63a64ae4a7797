//! Error types for the pdf2quiz library.
//!
//! Every fallible library operation returns [`QuizError`]. The five kinds a
//! caller most often needs to tell apart (unsafe path, bad input file,
//! inconsistent page range, filter without matches, empty range) each have
//! their own variant, and [`QuizError::kind`] collapses the full set into a
//! payload-free [`ErrorKind`] for callers that only want to branch.
//!
//! Two collaborators deliberately do *not* return this type:
//! [`crate::pipeline::encode::encode_image_to_base64`] yields `None` and
//! [`crate::pipeline::llm::generate_questions_from_image`] yields a
//! human-readable message. Both log the underlying error.

use crate::pipeline::range::ResolvedInterval;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2quiz library.
#[derive(Debug, Error)]
pub enum QuizError {
    // ── Path guard ────────────────────────────────────────────────────────
    /// Path is malformed, contains `..`, or escapes the confinement root.
    #[error("Unsafe path '{path}': {reason}")]
    PathSafety { path: PathBuf, reason: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file is missing, not a regular file, or not a `.pdf`.
    #[error("Invalid input '{path}': {reason}")]
    InvalidInput { path: PathBuf, reason: String },

    /// `from`/`to` do not follow one of the accepted sign patterns.
    #[error(
        "Invalid page range from={from} to={to}: {reason}\n\
Use from>0,to>0 (absolute), from>0,to=0 (through the end) or from<0,to<0,to>from (counted from the end)."
    )]
    InvalidRange { from: i32, to: i32, reason: String },

    /// A content filter was set but no page in the interval contained it.
    #[error("Content '{needle}' not found in {pages}")]
    NoMatch {
        needle: String,
        pages: ResolvedInterval,
    },

    /// The resolved interval selects no page at all.
    #[error("Page range from={from} to={to} selects no pages (document has {page_count} pages)")]
    EmptyRange {
        from: i32,
        to: i32,
        page_count: usize,
    },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium could not build the text layer of a page.
    #[error("Text extraction failed for page {page}: {detail}")]
    TextExtractionFailed { page: usize, detail: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Output extension or requested format is not one we can write.
    #[error("Unsupported output format '{format}' (supported: png, jpeg)")]
    UnsupportedFormat { format: String },

    /// Could not create or write the output image or directory.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The composite canvas could not be encoded.
    #[error("Failed to encode image: {0}")]
    ImageEncodeFailed(#[from] image::ImageError),

    // ── Batch errors ──────────────────────────────────────────────────────
    /// The file-name filter is not a valid regular expression.
    #[error("Invalid file-name pattern '{pattern}': {detail}")]
    InvalidPattern { pattern: String, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// No API key (or otherwise unusable endpoint settings).
    #[error("LLM endpoint is not configured.\n{hint}")]
    ProviderNotConfigured { hint: String },

    /// The LLM endpoint returned an error or an unusable response.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
The library is normally downloaded into the cache on first use. Offline, install\n\
libpdfium from https://github.com/bblanchon/pdfium-binaries/releases and either\n\
  • put it next to the binary / in the working directory, or\n\
  • set PDFIUM_LIB_PATH=/path/to/libpdfium (file or directory).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Payload-free discriminant of [`QuizError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ErrorKind {
    PathSafety,
    InvalidInput,
    InvalidRange,
    NoMatch,
    EmptyRange,
    Pdf,
    Output,
    Batch,
    Llm,
    Config,
    Internal,
}

impl QuizError {
    /// Coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            QuizError::PathSafety { .. } => ErrorKind::PathSafety,
            QuizError::InvalidInput { .. } => ErrorKind::InvalidInput,
            QuizError::InvalidRange { .. } => ErrorKind::InvalidRange,
            QuizError::NoMatch { .. } => ErrorKind::NoMatch,
            QuizError::EmptyRange { .. } => ErrorKind::EmptyRange,
            QuizError::CorruptPdf { .. }
            | QuizError::PasswordRequired { .. }
            | QuizError::WrongPassword { .. }
            | QuizError::TextExtractionFailed { .. }
            | QuizError::RasterisationFailed { .. }
            | QuizError::PdfiumBindingFailed(_) => ErrorKind::Pdf,
            QuizError::UnsupportedFormat { .. }
            | QuizError::OutputWriteFailed { .. }
            | QuizError::ImageEncodeFailed(_) => ErrorKind::Output,
            QuizError::InvalidPattern { .. } => ErrorKind::Batch,
            QuizError::ProviderNotConfigured { .. } | QuizError::LlmApiError { .. } => {
                ErrorKind::Llm
            }
            QuizError::InvalidConfig(_) => ErrorKind::Config,
            QuizError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn path_safety(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        QuizError::PathSafety {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        QuizError::InvalidInput {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_match_display() {
        let e = QuizError::NoMatch {
            needle: "Acceleration".into(),
            pages: ResolvedInterval {
                start: 2,
                end: 9,
                page_count: 10,
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("'Acceleration'"), "got: {msg}");
        assert!(msg.contains("pages 3-9 of 10"), "got: {msg}");
    }

    #[test]
    fn no_match_on_empty_interval_says_no_pages() {
        let e = QuizError::NoMatch {
            needle: "Acceleration".into(),
            pages: ResolvedInterval {
                start: 10,
                end: 10,
                page_count: 10,
            },
        };
        let msg = e.to_string();
        assert!(msg.ends_with("not found in no pages of 10"), "got: {msg}");
    }

    #[test]
    fn invalid_range_display_has_hint() {
        let e = QuizError::InvalidRange {
            from: 2,
            to: -1,
            reason: "mixed signs".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("from=2 to=-1"));
        assert!(msg.contains("counted from the end"));
    }

    #[test]
    fn empty_range_display() {
        let e = QuizError::EmptyRange {
            from: 12,
            to: 14,
            page_count: 10,
        };
        assert!(e.to_string().contains("10 pages"));
    }

    #[test]
    fn kinds_are_distinct_for_core_errors() {
        let kinds = [
            QuizError::path_safety("../x", "traversal").kind(),
            QuizError::invalid_input("x.txt", "not a pdf").kind(),
            QuizError::InvalidRange {
                from: 0,
                to: 0,
                reason: String::new(),
            }
            .kind(),
            QuizError::NoMatch {
                needle: "a".into(),
                pages: ResolvedInterval {
                    start: 0,
                    end: 1,
                    page_count: 1,
                },
            }
            .kind(),
            QuizError::EmptyRange {
                from: 1,
                to: 1,
                page_count: 0,
            }
            .kind(),
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn output_write_failed_keeps_source() {
        use std::error::Error as _;
        let e = QuizError::OutputWriteFailed {
            path: "/nope/out.png".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.source().is_some());
        assert_eq!(e.kind(), ErrorKind::Output);
    }
}
