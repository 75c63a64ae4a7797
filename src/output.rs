//! Result types returned by the conversion entry points.
//!
//! All of them serialise with serde so the CLI's `--json` mode can print
//! them verbatim.

use serde::Serialize;
use std::path::PathBuf;

/// Outcome of one successful [`crate::convert::compose`] call.
#[derive(Debug, Clone, Serialize)]
pub struct CompositionReport {
    /// Canonical path of the source PDF.
    pub pdf_path: PathBuf,
    /// Canonical path of the written image.
    pub output_path: PathBuf,
    /// Total pages in the document.
    pub page_count: usize,
    /// Zero-based start of the resolved interval (inclusive).
    pub interval_start: usize,
    /// Zero-based end of the resolved interval (exclusive).
    pub interval_end: usize,
    /// 1-based numbers of the pages on the canvas, top to bottom.
    pub rendered_pages: Vec<usize>,
    pub width: u32,
    pub height: u32,
    pub bytes_written: u64,
    pub duration_ms: u64,
}

/// A PDF the batch could not convert.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of [`crate::convert::convert_folder`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub converted: Vec<CompositionReport>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    /// Number of PDFs the batch attempted.
    pub fn attempted(&self) -> usize {
        self.converted.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of [`crate::convert::prepare_quiz`].
#[derive(Debug, Clone, Serialize)]
pub struct QuizOutput {
    pub report: CompositionReport,
    /// Text returned by the model.
    pub questions: String,
}
