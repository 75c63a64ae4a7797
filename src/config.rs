//! Configuration types for page composition and quiz generation.
//!
//! Composition is controlled through [`CompositionConfig`], the LLM endpoint
//! through [`LlmConfig`]. Both are built with a consuming builder whose
//! `build()` validates the combination, so an invalid page range or DPI is
//! rejected before any file is opened.

use crate::error::QuizError;
use crate::pipeline::range::PageRange;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Lowest accepted rendering DPI.
pub const MIN_DPI: u32 = 36;
/// Highest accepted rendering DPI.
pub const MAX_DPI: u32 = 600;

/// Configuration for one composition (single file or every file of a batch).
///
/// # Example
/// ```rust
/// use pdf2quiz::CompositionConfig;
///
/// let config = CompositionConfig::builder()
///     .page_range(-3, -1)
///     .dpi(150)
///     .content_filter("Acceleration")
///     .build()
///     .unwrap();
/// assert_eq!(config.pages.from_page(), -3);
/// ```
#[derive(Clone)]
pub struct CompositionConfig {
    /// Rendering DPI. Range: 36–600. Default: 300.
    ///
    /// Affects only raster size, never which pages are selected. The composite
    /// is kept in memory in full, so a long range at 600 DPI can need several
    /// hundred megabytes.
    pub dpi: u32,

    /// Pages to consider. Default: the whole document.
    pub pages: PageRange,

    /// Only pages whose text contains this substring (case-sensitive) are
    /// rendered. Default: None (every page in range).
    pub content_filter: Option<String>,

    /// Output image format. If None, derived from the output file extension.
    pub output_format: Option<OutputFormat>,

    /// Every path must resolve under this directory. Default: None.
    pub confinement_root: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            pages: PageRange::default(),
            content_filter: None,
            output_format: None,
            confinement_root: None,
            password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for CompositionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositionConfig")
            .field("dpi", &self.dpi)
            .field("pages", &self.pages)
            .field("content_filter", &self.content_filter)
            .field("output_format", &self.output_format)
            .field("confinement_root", &self.confinement_root)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn CompositionProgressCallback>"),
            )
            .finish()
    }
}

impl CompositionConfig {
    /// Create a new builder for `CompositionConfig`.
    pub fn builder() -> CompositionConfigBuilder {
        CompositionConfigBuilder {
            config: Self::default(),
            raw_range: None,
        }
    }

    /// The output format to use for `output_path`.
    pub fn resolve_output_format(&self, output_path: &Path) -> Result<OutputFormat, QuizError> {
        match self.output_format {
            Some(format) => Ok(format),
            None => OutputFormat::from_path(output_path),
        }
    }
}

/// Builder for [`CompositionConfig`].
pub struct CompositionConfigBuilder {
    config: CompositionConfig,
    raw_range: Option<(i32, i32)>,
}

impl CompositionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    /// Set an already validated range.
    pub fn pages(mut self, pages: PageRange) -> Self {
        self.config.pages = pages;
        self.raw_range = None;
        self
    }

    /// Set `from`/`to`; the sign pattern is checked in [`Self::build`].
    pub fn page_range(mut self, from: i32, to: i32) -> Self {
        self.raw_range = Some((from, to));
        self
    }

    /// An empty string means no filter.
    pub fn content_filter(mut self, needle: impl Into<String>) -> Self {
        let needle = needle.into();
        self.config.content_filter = if needle.is_empty() { None } else { Some(needle) };
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = Some(format);
        self
    }

    pub fn confine_to(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.confinement_root = Some(root.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<CompositionConfig, QuizError> {
        if let Some((from, to)) = self.raw_range {
            self.config.pages = PageRange::new(from, to)?;
        }
        check_dpi(self.config.dpi)?;
        Ok(self.config)
    }
}

/// Reject a DPI outside [`MIN_DPI`]..=[`MAX_DPI`].
///
/// The fields of [`CompositionConfig`] are public, so the pipeline calls this
/// again rather than trusting the builder.
pub(crate) fn check_dpi(dpi: u32) -> Result<(), QuizError> {
    if (MIN_DPI..=MAX_DPI).contains(&dpi) {
        Ok(())
    } else {
        Err(QuizError::InvalidConfig(format!(
            "DPI must be {MIN_DPI}-{MAX_DPI}, got {dpi}"
        )))
    }
}

// ── Output format ────────────────────────────────────────────────────────

/// Raster formats the composite can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossless; what the LLM step expects. (default)
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    /// Match a file extension (without the dot, case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(OutputFormat::Png),
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            _ => None,
        }
    }

    /// Derive the format from `path`'s extension.
    pub fn from_path(path: &Path) -> Result<Self, QuizError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(ext).ok_or_else(|| QuizError::UnsupportedFormat {
            format: if ext.is_empty() {
                "<no extension>".to_string()
            } else {
                ext.to_string()
            },
        })
    }

    /// Canonical file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            OutputFormat::Png => image::ImageFormat::Png,
            OutputFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = QuizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| QuizError::UnsupportedFormat {
            format: s.to_string(),
        })
    }
}

// ── LLM endpoint ─────────────────────────────────────────────────────────

/// Model used when neither the caller nor `USE_AI_LLM_MODEL` names one.
pub const DEFAULT_MODEL: &str = "qwen2.5vl:32b";

/// Endpoint used when neither the caller nor `OPENAI_BASE_URL` names one.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_MODEL: &str = "USE_AI_LLM_MODEL";

/// Settings for an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct LlmConfig {
    /// Bearer token. Required to actually call the endpoint.
    pub api_key: Option<String>,

    /// Base URL without the `/chat/completions` suffix. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Vision-capable model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Completion budget. Default: 500, enough for three questions with answers.
    pub max_tokens: u32,

    /// Whole-request timeout in seconds. Default: 120.
    pub timeout_secs: u64,

    /// Pre-built provider. When set it is used as-is and the key, URL and
    /// model above are ignored; useful for tests or custom middleware.
    pub provider: Option<Arc<dyn LLMProvider>>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 500,
            timeout_secs: 120,
            provider: None,
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("provider", &self.provider.as_ref().map(|p| p.name()))
            .finish()
    }
}

impl LlmConfig {
    pub fn builder() -> LlmConfigBuilder {
        LlmConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `USE_AI_LLM_MODEL`.
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Like [`Self::from_env`] but with an explicit variable lookup.
    /// Empty values count as unset.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            api_key: get(ENV_API_KEY),
            base_url: get(ENV_BASE_URL).unwrap_or(defaults.base_url),
            model: get(ENV_MODEL).unwrap_or(defaults.model),
            ..defaults
        }
    }

    /// Base URL without a trailing slash; the provider appends
    /// `/chat/completions`.
    pub fn api_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Builder for [`LlmConfig`], starting from the defaults.
#[derive(Debug)]
pub struct LlmConfigBuilder {
    config: LlmConfig,
}

impl LlmConfigBuilder {
    /// Start from an existing config, e.g. [`LlmConfig::from_env`].
    pub fn from_config(config: LlmConfig) -> Self {
        Self { config }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn build(self) -> Result<LlmConfig, QuizError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(QuizError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.model.trim().is_empty() {
            return Err(QuizError::InvalidConfig("model must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(QuizError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}
