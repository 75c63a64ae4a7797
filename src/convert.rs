//! Conversion entry points: one PDF, a folder of PDFs, or a PDF through to
//! quiz questions.
//!
//! Every filesystem path passes the [`crate::guard`] before it is touched,
//! and all of the cheap checks (path safety, input type, output format) run
//! before pdfium is bound, so a bad invocation fails without side effects.

use crate::config::{check_dpi, CompositionConfig, LlmConfig, OutputFormat};
use crate::error::QuizError;
use crate::guard::{self, ValidatedPath};
use crate::output::{BatchFailure, BatchReport, CompositionReport, QuizOutput};
use crate::pipeline::compose::PageSource;
use crate::pipeline::llm::QuizClient;
use crate::pipeline::{compose, encode, render};
use crate::prompts;
use pdfium_render::prelude::Pdfium;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Checked inputs of one composition, ready for rendering.
struct Prepared {
    pdf: ValidatedPath,
    output: ValidatedPath,
    format: OutputFormat,
}

/// Render the configured pages of `pdf_path` into one stacked image at
/// `output_path`.
///
/// Blocking: binds pdfium and rasterises on the calling thread. Use
/// [`compose_async`] from async code.
///
/// # Errors
/// * [`QuizError::InvalidConfig`]: DPI outside the accepted range
/// * [`QuizError::PathSafety`]: either path fails the guard
/// * [`QuizError::InvalidInput`]: input missing, not a file, or not `.pdf`
/// * [`QuizError::UnsupportedFormat`]: output format cannot be determined
/// * [`QuizError::NoMatch`] / [`QuizError::EmptyRange`]: nothing to render;
///   the output file is neither created nor overwritten
/// * pdfium, rendering and write errors
pub fn compose(
    pdf_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &CompositionConfig,
) -> Result<CompositionReport, QuizError> {
    let start = Instant::now();
    let prepared = prepare(pdf_path.as_ref(), output_path.as_ref(), config)?;
    let pdfium = render::bind_pdfium()?;
    compose_prepared(&pdfium, prepared, config, start)
}

/// [`compose`] on tokio's blocking pool.
pub async fn compose_async(
    pdf_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &CompositionConfig,
) -> Result<CompositionReport, QuizError> {
    let pdf = pdf_path.as_ref().to_path_buf();
    let output = output_path.as_ref().to_path_buf();
    let config = config.clone();

    tokio::task::spawn_blocking(move || compose(&pdf, &output, &config))
        .await
        .map_err(|e| QuizError::Internal(format!("Composition task panicked: {}", e)))?
}

/// Compose every PDF in `source_dir` whose file name matches
/// `file_name_pattern` (regex search; all PDFs when `None`), writing
/// `<stem>.<ext>` into `output_dir`.
///
/// Files are visited in name order. A file that fails is recorded in
/// [`BatchReport::failed`] and the batch moves on; only problems with the
/// directories themselves, the pattern, or binding pdfium abort the batch.
/// Two inputs whose targets collide (`a.pdf` and `a.PDF` both want
/// `a.png`) are not allowed to overwrite each other: the later one is
/// recorded as failed.
pub fn convert_folder(
    source_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    file_name_pattern: Option<&str>,
    config: &CompositionConfig,
) -> Result<BatchReport, QuizError> {
    let root = config.confinement_root.as_deref();
    check_dpi(config.dpi)?;

    let pattern = file_name_pattern
        .map(|p| {
            Regex::new(p).map_err(|e| QuizError::InvalidPattern {
                pattern: p.to_string(),
                detail: e.to_string(),
            })
        })
        .transpose()?;

    let source = guard::validate_existing_dir(source_dir, root)?;
    let output = guard::validate(output_dir, root)?;
    if output.exists() && !output.is_dir() {
        return Err(QuizError::invalid_input(
            output.as_path(),
            "output exists and is not a directory",
        ));
    }

    let candidates = list_pdfs(&source, pattern.as_ref())?;
    std::fs::create_dir_all(&output).map_err(|e| QuizError::OutputWriteFailed {
        path: output.to_path_buf(),
        source: e,
    })?;
    info!(
        "Batch: {} matching PDF(s) in {} → {}",
        candidates.len(),
        source,
        output
    );

    let mut report = BatchReport::default();
    if candidates.is_empty() {
        return Ok(report);
    }

    let extension = config.output_format.unwrap_or_default().extension();
    let pdfium = render::bind_pdfium()?;

    for (pdf, target) in plan_targets(candidates, &output, extension) {
        let start = Instant::now();
        let result = match target {
            Ok(target) => prepare(&pdf, &target, config)
                .and_then(|prepared| compose_prepared(&pdfium, prepared, config, start)),
            Err(earlier) => Err(QuizError::invalid_input(
                pdf.as_path(),
                format!(
                    "its output name collides with the image of '{}'",
                    earlier.display()
                ),
            )),
        };
        match result {
            Ok(composed) => report.converted.push(composed),
            Err(e) => {
                warn!("Skipping '{}': {}", pdf.display(), e);
                report.failed.push(BatchFailure {
                    path: pdf,
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        "Batch complete: {} converted, {} failed",
        report.converted.len(),
        report.failed.len()
    );
    Ok(report)
}

/// Compose `pdf_path` into `image_path`, then ask the model for quiz
/// questions about the image.
///
/// `prompt` falls back to [`prompts::DEFAULT_QUIZ_PROMPT`]. The endpoint
/// configuration is checked before any page is rendered.
pub async fn prepare_quiz(
    pdf_path: impl AsRef<Path>,
    image_path: impl AsRef<Path>,
    config: &CompositionConfig,
    llm: &LlmConfig,
    prompt: Option<&str>,
) -> Result<QuizOutput, QuizError> {
    let client = QuizClient::new(llm)?;
    let report = compose_async(pdf_path, image_path, config).await?;

    let image_b64 = encode::encode_image_to_base64(&report.output_path).ok_or_else(|| {
        QuizError::Internal(format!(
            "Could not process the image '{}'",
            report.output_path.display()
        ))
    })?;

    let questions = client
        .generate(&image_b64, prompts::effective_prompt(prompt))
        .await?;
    Ok(QuizOutput { report, questions })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Every check that needs neither pdfium nor the document.
fn prepare(
    pdf_path: &Path,
    output_path: &Path,
    config: &CompositionConfig,
) -> Result<Prepared, QuizError> {
    let root = config.confinement_root.as_deref();
    check_dpi(config.dpi)?;

    let pdf = guard::validate(pdf_path, root)?;
    check_pdf_input(pdf_path, &pdf)?;

    let output = guard::validate(output_path, root)?;
    if output.is_dir() {
        return Err(QuizError::invalid_input(
            output.as_path(),
            "output path is a directory",
        ));
    }
    let format = config.resolve_output_format(&output)?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(|e| QuizError::OutputWriteFailed {
            path: output.to_path_buf(),
            source: e,
        })?;
    }

    Ok(Prepared {
        pdf,
        output,
        format,
    })
}

fn compose_prepared(
    pdfium: &Pdfium,
    prepared: Prepared,
    config: &CompositionConfig,
    start: Instant,
) -> Result<CompositionReport, QuizError> {
    let Prepared {
        pdf,
        output,
        format,
    } = prepared;

    let (composition, page_count) = {
        let document = render::open_document(pdfium, &pdf, config.password.as_deref())?;
        let composition = compose::compose_pages(
            &document,
            config.pages,
            config.dpi,
            config.content_filter.as_deref(),
            config.progress_callback.as_deref(),
        )?;
        (composition, document.page_count())
    };

    let bytes_written = compose::save_canvas(&composition.canvas, &output, format)?;
    let report = CompositionReport {
        pdf_path: pdf.into_path_buf(),
        output_path: output.into_path_buf(),
        page_count,
        interval_start: composition.interval.start,
        interval_end: composition.interval.end,
        rendered_pages: composition.rendered_pages,
        width: composition.canvas.width(),
        height: composition.canvas.height(),
        bytes_written,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Wrote {} ({}x{}, {} page(s)) in {}ms",
        report.output_path.display(),
        report.width,
        report.height,
        report.rendered_pages.len(),
        report.duration_ms
    );
    Ok(report)
}

/// The extension is checked on the path as given: a `.pdf` symlink to a
/// differently named file is accepted.
fn check_pdf_input(supplied: &Path, pdf: &ValidatedPath) -> Result<(), QuizError> {
    if !pdf.exists() {
        return Err(QuizError::invalid_input(pdf.as_path(), "file does not exist"));
    }
    if !pdf.is_file() {
        return Err(QuizError::invalid_input(pdf.as_path(), "not a regular file"));
    }
    if !has_pdf_extension(supplied) {
        return Err(QuizError::invalid_input(
            pdf.as_path(),
            "expected a file with a .pdf extension",
        ));
    }
    Ok(())
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Pair each batch input with `<stem>.<extension>` in `output`.
///
/// Targets are compared case-insensitively; an input whose target was
/// already claimed gets `Err(earlier_input)` instead.
fn plan_targets(
    candidates: Vec<PathBuf>,
    output: &Path,
    extension: &str,
) -> Vec<(PathBuf, Result<PathBuf, PathBuf>)> {
    let mut claimed: HashMap<String, PathBuf> = HashMap::new();
    candidates
        .into_iter()
        .map(|pdf| {
            let stem = pdf
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let name = format!("{stem}.{extension}");
            let target = match claimed.get(&name.to_lowercase()) {
                Some(earlier) => Err(earlier.clone()),
                None => {
                    claimed.insert(name.to_lowercase(), pdf.clone());
                    Ok(output.join(&name))
                }
            };
            (pdf, target)
        })
        .collect()
}

/// Regular `.pdf` files in `dir` whose name matches `pattern`, sorted.
fn list_pdfs(dir: &ValidatedPath, pattern: Option<&Regex>) -> Result<Vec<PathBuf>, QuizError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| QuizError::invalid_input(dir.as_path(), format!("cannot read directory: {e}")))?;

    let mut pdfs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            QuizError::invalid_input(dir.as_path(), format!("cannot read directory entry: {e}"))
        })?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        if !path.is_file() || !has_pdf_extension(&path) {
            continue;
        }
        if let Some(re) = pattern {
            if !re.is_match(&name) {
                debug!("Pattern does not match '{}'", name);
                continue;
            }
        }
        pdfs.push(path);
    }

    pdfs.sort();
    Ok(pdfs)
}
