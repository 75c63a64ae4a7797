//! CLI binary for pdf2quiz.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `CompositionConfig` / `LlmConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2quiz::{
    compose_async, convert_folder, prepare_quiz, BatchReport, CompositionConfig,
    CompositionProgressCallback, CompositionReport, LlmConfig, LlmConfigBuilder, OutputFormat,
    PageRange, ProgressCallback, DEFAULT_MODEL,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar over the resolved interval plus a
/// `page N: ✔` / `page N: .` line per page when a content filter is active.
struct CliProgressCallback {
    bar: ProgressBar,
    matched: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            matched: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Composing");
        self.bar.reset_eta();
        self.matched.store(0, Ordering::SeqCst);
    }
}

impl CompositionProgressCallback for CliProgressCallback {
    fn on_composition_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
    }

    fn on_page_matched(&self, page_num: usize) {
        self.matched.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!("  page {page_num}: {}", green("✔")));
    }

    fn on_page_skipped(&self, page_num: usize) {
        self.bar.println(format!("  page {page_num}: {}", dim(".")));
        self.bar.inc(1);
    }

    fn on_page_rendered(&self, page_num: usize, width: u32, height: u32) {
        self.bar
            .set_message(format!("page {page_num} {width}x{height}"));
        self.bar.inc(1);
    }

    fn on_composition_complete(&self, rendered_pages: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} page(s) composed",
            green("✔"),
            bold(&rendered_pages.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"PAGE RANGES:
  --from N --to M     pages N..M (1-based, inclusive)
  --from N --to 0     page N through the last page
  --from -3 --to -1   the third-last and second-last page
  --pages SPEC        shorthand: 5, 3:7, 3:, -3:-1

EXAMPLES:
  # Whole document into one image next to the PDF
  pdf2quiz physics.pdf

  # Pages mentioning "Acceleration" among pages 10-40, at 150 DPI
  pdf2quiz physics.pdf --from 10 --to 40 --match Acceleration --dpi 150 -o quiz/accel.png

  # Every chapter PDF in a folder, confined to the folder
  pdf2quiz ./books --pattern '^chapter_\d+' --root ./books

  # Compose and generate quiz questions
  pdf2quiz physics.pdf --pages -3:-1 --quiz --model llava

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY      API key for the chat-completions endpoint
  OPENAI_BASE_URL     Endpoint base URL (default https://api.openai.com/v1)
  USE_AI_LLM_MODEL    Model identifier (default qwen2.5vl:32b)
  PDFIUM_LIB_PATH     pdfium shared library file or directory
  PDF2QUIZ_*          Defaults for the flags below (PDF2QUIZ_DPI, ...)
"#;

/// Stack PDF pages into one image and generate quiz questions from it.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2quiz",
    version,
    about = "Stack PDF pages into one image and generate quiz questions from it",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file, or a directory of PDFs for batch mode.
    input: PathBuf,

    /// Output image (single file) or output directory (batch).
    #[arg(short, long, env = "PDF2QUIZ_OUTPUT")]
    output: Option<PathBuf>,

    /// First page: positive is 1-based, negative counts from the end.
    #[arg(long, env = "PDF2QUIZ_FROM", allow_negative_numbers = true, conflicts_with = "pages")]
    from: Option<i32>,

    /// Last page: positive is 1-based inclusive, 0 means the last page,
    /// negative is an exclusive offset from the end.
    #[arg(long, env = "PDF2QUIZ_TO", allow_negative_numbers = true, conflicts_with = "pages")]
    to: Option<i32>,

    /// Page range shorthand: 5, 3:7, 3: or -3:-1.
    #[arg(long, env = "PDF2QUIZ_PAGES", allow_hyphen_values = true)]
    pages: Option<PageRange>,

    /// Rendering DPI (36–600).
    #[arg(long, env = "PDF2QUIZ_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(36..=600))]
    dpi: u32,

    /// Only keep pages whose text contains this (case-sensitive).
    #[arg(long = "match", env = "PDF2QUIZ_MATCH")]
    content_filter: Option<String>,

    /// Batch mode: regex searched in each PDF file name.
    #[arg(long, env = "PDF2QUIZ_PATTERN")]
    pattern: Option<String>,

    /// Refuse any path that resolves outside this directory.
    #[arg(long, env = "PDF2QUIZ_ROOT")]
    root: Option<PathBuf>,

    /// Output format: png or jpeg. Default: from the output extension.
    #[arg(long, env = "PDF2QUIZ_FORMAT")]
    format: Option<OutputFormat>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2QUIZ_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Send the composed image to the model and print quiz questions.
    #[arg(long, env = "PDF2QUIZ_QUIZ")]
    quiz: bool,

    /// Text file with a custom quiz prompt.
    #[arg(long, env = "PDF2QUIZ_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Model identifier.
    #[arg(long, env = "USE_AI_LLM_MODEL", long_help = format!("Model identifier. Default: {DEFAULT_MODEL}."))]
    model: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint.
    #[arg(long, env = "OPENAI_BASE_URL")]
    base_url: Option<String>,

    /// API key for the endpoint.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Max tokens in the model's answer.
    #[arg(long, env = "PDF2QUIZ_MAX_TOKENS")]
    max_tokens: Option<u32>,

    /// Request timeout in seconds.
    #[arg(long, env = "PDF2QUIZ_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Print the result as JSON.
    #[arg(long, env = "PDF2QUIZ_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2QUIZ_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2QUIZ_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2QUIZ_QUIET")]
    quiet: bool,
}

/// Make the pdfium library available before any work starts.
///
/// With `bundled` the embedded copy is written to the cache. Otherwise the
/// first run downloads it (about 30 MB) into the cache, with a progress
/// bar unless output is quiet; later runs only check the path.
fn ensure_pdfium(show_progress: bool) -> Result<()> {
    #[cfg(feature = "bundled")]
    {
        let _ = show_progress;
        tokio::task::block_in_place(pdfium_auto::ensure_pdfium_bundled)
            .context("Failed to extract bundled PDFium engine")?;
    }

    #[cfg(not(feature = "bundled"))]
    if !pdfium_auto::is_pdfium_cached() {
        if !show_progress {
            tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
                .context("Failed to download PDFium engine")?;
            return Ok(());
        }

        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:40.green/238}] {bytes}/{total_bytes}  ETA {eta}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_prefix("PDF engine");
        bar.enable_steady_tick(Duration::from_millis(80));

        let on_progress = |downloaded: u64, total: Option<u64>| {
            if let Some(t) = total {
                if bar.length() != Some(t) {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        };
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(Some(&on_progress)))
            .context("Failed to download PDFium engine")?;
        bar.finish_with_message("ready");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    ensure_pdfium(show_progress)?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn CompositionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Batch mode ───────────────────────────────────────────────────────
    if cli.input.is_dir() {
        if cli.quiz {
            anyhow::bail!("--quiz needs a single PDF input, not a directory");
        }
        let output_dir = cli
            .output
            .clone()
            .unwrap_or_else(|| cli.input.join("images"));
        let input = cli.input.clone();
        let pattern = cli.pattern.clone();
        let report = tokio::task::spawn_blocking(move || {
            convert_folder(&input, &output_dir, pattern.as_deref(), &config)
        })
        .await
        .context("Batch task panicked")?
        .context("Batch conversion failed")?;

        print_batch(&cli, &report)?;
        if !report.is_clean() {
            anyhow::bail!("{} of {} PDF(s) failed", report.failed.len(), report.attempted());
        }
        return Ok(());
    }

    // ── Single file ──────────────────────────────────────────────────────
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input, config.output_format));

    if cli.quiz {
        let llm = build_llm_config(&cli)?;
        let prompt = read_prompt(cli.prompt_file.as_deref()).await?;
        let quiz = prepare_quiz(&cli.input, &output_path, &config, &llm, prompt.as_deref())
            .await
            .context("Quiz preparation failed")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&quiz).context("Failed to serialise output")?
            );
        } else {
            print_report(&cli, &quiz.report);
            let separator = "=".repeat(60);
            println!("{separator}");
            println!("{}", quiz.questions.trim_end());
            println!("{separator}");
        }
        return Ok(());
    }

    let report = compose_async(&cli.input, &output_path, &config)
        .await
        .context("Composition failed")?;
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else {
        print_report(&cli, &report);
    }
    Ok(())
}

/// Map CLI args to `CompositionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<CompositionConfig> {
    let mut builder = CompositionConfig::builder().dpi(cli.dpi);

    if cli.from.is_some() || cli.to.is_some() {
        builder = builder.page_range(cli.from.unwrap_or(1), cli.to.unwrap_or(0));
    } else if let Some(pages) = cli.pages {
        builder = builder.pages(pages);
    }
    if let Some(ref needle) = cli.content_filter {
        builder = builder.content_filter(needle.clone());
    }
    if let Some(format) = cli.format {
        builder = builder.output_format(format);
    }
    if let Some(ref root) = cli.root {
        builder = builder.confine_to(root.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Map CLI args onto the environment-derived `LlmConfig`.
fn build_llm_config(cli: &Cli) -> Result<LlmConfig> {
    let mut builder = LlmConfigBuilder::from_config(LlmConfig::from_env());
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(n) = cli.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.timeout_secs(secs);
    }
    builder.build().context("Invalid LLM configuration")
}

async fn read_prompt(path: Option<&Path>) -> Result<Option<String>> {
    match path {
        Some(path) => Ok(Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read prompt from {:?}", path))?,
        )),
        None => Ok(None),
    }
}

/// `<stem>.<ext>` next to the input PDF.
fn default_output_path(input: &Path, format: Option<OutputFormat>) -> PathBuf {
    input.with_extension(format.unwrap_or_default().extension())
}

fn print_report(cli: &Cli, report: &CompositionReport) {
    if cli.quiet {
        return;
    }
    let pages: Vec<String> = report.rendered_pages.iter().map(|p| p.to_string()).collect();
    eprintln!(
        "{}  pages {}  {}x{}  {}ms  →  {}",
        green("✔"),
        pages.join(","),
        report.width,
        report.height,
        report.duration_ms,
        bold(&report.output_path.display().to_string()),
    );
}

fn print_batch(cli: &Cli, report: &BatchReport) -> Result<()> {
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(report).context("Failed to serialise report")?
        );
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }
    for converted in &report.converted {
        print_report(cli, converted);
    }
    for failed in &report.failed {
        eprintln!(
            "{}  {}  {}",
            red("✗"),
            failed.path.display(),
            red(&failed.error)
        );
    }
    eprintln!(
        "{} {}/{} PDF(s) converted",
        if report.is_clean() { green("✔") } else { cyan("⚠") },
        bold(&report.converted.len().to_string()),
        report.attempted(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_bounds_parse() {
        let cli = Cli::try_parse_from(["pdf2quiz", "doc.pdf", "--from", "-3", "--to", "-1"]).unwrap();
        assert_eq!((cli.from, cli.to), (Some(-3), Some(-1)));
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.pages, PageRange::new(-3, -1).unwrap());
    }

    #[test]
    fn pages_shorthand_parses() {
        let cli = Cli::try_parse_from(["pdf2quiz", "doc.pdf", "--pages", "-3:-1"]).unwrap();
        assert_eq!(cli.pages, Some(PageRange::new(-3, -1).unwrap()));
    }

    #[test]
    fn inconsistent_range_is_rejected() {
        let cli = Cli::try_parse_from(["pdf2quiz", "doc.pdf", "--from", "2", "--to", "-1"]).unwrap();
        assert!(build_config(&cli, None).is_err());
    }

    #[test]
    fn from_conflicts_with_pages() {
        assert!(
            Cli::try_parse_from(["pdf2quiz", "doc.pdf", "--from", "2", "--pages", "3:4"]).is_err()
        );
    }

    #[test]
    fn default_output_sits_next_to_input() {
        assert_eq!(
            default_output_path(Path::new("/docs/physics.pdf"), None),
            PathBuf::from("/docs/physics.png")
        );
        assert_eq!(
            default_output_path(Path::new("physics.pdf"), Some(OutputFormat::Jpeg)),
            PathBuf::from("physics.jpg")
        );
    }
}
