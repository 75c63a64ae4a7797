//! # pdf2quiz
//!
//! Turn a range of PDF pages into one tall image, then ask a multimodal
//! language model to write quiz questions about it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Guard    validate and canonicalise every path (optionally confined)
//!  ├─ 2. Range    resolve (from, to) into a zero-based page interval
//!  ├─ 3. Filter   keep pages whose text contains the content filter
//!  ├─ 4. Render   rasterise kept pages via pdfium at the requested DPI
//!  ├─ 5. Compose  stack the rasters top-to-bottom on a white canvas
//!  └─ 6. Quiz     base64 PNG + prompt → OpenAI-compatible endpoint
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2quiz::{compose, CompositionConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Last three pages but one, only those mentioning "Acceleration".
//!     let config = CompositionConfig::builder()
//!         .page_range(-3, -1)
//!         .content_filter("Acceleration")
//!         .dpi(150)
//!         .build()?;
//!     let report = compose("physics.pdf", "images/physics.png", &config)?;
//!     println!("pages {:?} → {}", report.rendered_pages, report.output_path.display());
//!     Ok(())
//! }
//! ```
//!
//! Quiz generation reads `OPENAI_API_KEY`, `OPENAI_BASE_URL` and
//! `USE_AI_LLM_MODEL` through [`LlmConfig::from_env`]:
//!
//! ```rust,no_run
//! use pdf2quiz::{prepare_quiz, CompositionConfig, LlmConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let quiz = prepare_quiz(
//!         "physics.pdf",
//!         "images/physics.png",
//!         &CompositionConfig::default(),
//!         &LlmConfig::from_env(),
//!         None,
//!     )
//!     .await?;
//!     println!("{}", quiz.questions);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2quiz` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `bundled` | off   | Embeds libpdfium in the binary; build with `PDFIUM_BUNDLE_LIB=/path/to/lib` |
//!
//! ## pdfium
//!
//! Rendering needs the pdfium shared library at run time. The
//! [`pdfium_auto`] crate resolves it: `PDFIUM_LIB_PATH` (file or
//! directory), the working directory, the per-user cache, and finally a
//! one-off download into that cache. The system search path is the last
//! resort.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod guard;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    CompositionConfig, CompositionConfigBuilder, LlmConfig, LlmConfigBuilder, OutputFormat,
    DEFAULT_MODEL,
};
pub use convert::{compose, compose_async, convert_folder, prepare_quiz};
pub use error::{ErrorKind, QuizError};
pub use guard::{validate, ValidatedPath};
pub use output::{BatchFailure, BatchReport, CompositionReport, QuizOutput};
pub use pipeline::compose::{compose_pages, Composition, PageSource};
pub use pipeline::encode::encode_image_to_base64;
pub use pipeline::llm::{generate_questions_from_image, QuizClient};
pub use pipeline::range::{PageRange, ResolvedInterval};
pub use progress::{CompositionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::DEFAULT_QUIZ_PROMPT;
