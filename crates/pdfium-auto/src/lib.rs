//! # pdfium-auto
//!
//! Find a usable PDFium shared library for `pdfium-render`, fetching and
//! caching one on first use so `pdf2quiz` works without a manual install.
//!
//! ## Resolution order
//!
//! 1. `PDFIUM_LIB_PATH`: a library file, or a directory holding the
//!    platform library.
//! 2. The platform library in the current working directory.
//! 3. The per-version cache directory (see [`pdfium_cache_dir`]).
//! 4. With the `bundled` feature: the library embedded at compile time,
//!    written into the cache. Without it: a download of the platform
//!    archive from
//!    [bblanchon/pdfium-binaries](https://github.com/bblanchon/pdfium-binaries),
//!    extracted into the cache.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pdfium_auto::{bind_pdfium_from_path, bind_pdfium_silent, ensure_pdfium_library};
//!
//! let pdfium = bind_pdfium_silent().expect("PDFium unavailable");
//!
//! let path = ensure_pdfium_library(Some(&|done, total| {
//!     if let Some(t) = total {
//!         eprint!("\rDownloading PDFium: {done}/{t} bytes");
//!     }
//! }))
//! .expect("download failed");
//! let pdfium = bind_pdfium_from_path(&path).expect("bind failed");
//! ```
//!
//! ## Environment
//!
//! - `PDFIUM_LIB_PATH`: use an existing library and never download.
//! - `PDFIUM_AUTO_CACHE_DIR`: replace the platform cache base directory.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use pdfium_render::prelude::Pdfium;
use thiserror::Error;
use tracing::{debug, info, warn};

#[cfg(feature = "bundled")]
mod bundled {
    include!(concat!(env!("OUT_DIR"), "/bundled.rs"));
}

/// pdfium-binaries release the download and cache are keyed on.
pub const PDFIUM_VERSION: &str = "7690";

/// Library file or directory override.
pub const ENV_LIB_PATH: &str = "PDFIUM_LIB_PATH";

/// Cache base directory override.
pub const ENV_CACHE_DIR: &str = "PDFIUM_AUTO_CACHE_DIR";

#[cfg_attr(feature = "bundled", allow(dead_code))]
const BASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

/// Cache sub-directory under the platform cache base.
const CACHE_APP_DIR: &str = "pdf2quiz";

/// Errors from locating, fetching or binding the library.
#[derive(Error, Debug)]
pub enum PdfiumAutoError {
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Cache directory error: {0}")]
    CacheDir(#[source] std::io::Error),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Archive extraction failed: {0}")]
    Extract(String),

    /// `pdfium-render` could not load the library at `path`.
    #[error("Failed to bind PDFium from '{path}': {reason}")]
    Bind { path: PathBuf, reason: String },
}

// ── Platform table ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PlatformInfo {
    /// Release asset, e.g. `pdfium-linux-x64.tgz`.
    archive_name: &'static str,
    /// Member path inside the archive.
    lib_path_in_archive: &'static str,
    /// File name on disk.
    lib_name: &'static str,
}

const fn lib_info(
    archive_name: &'static str,
    lib_name: &'static str,
    member: &'static str,
) -> PlatformInfo {
    PlatformInfo {
        archive_name,
        lib_path_in_archive: member,
        lib_name,
    }
}

fn platform_for(os: &str, arch: &str) -> Result<PlatformInfo, PdfiumAutoError> {
    let info = match (os, arch) {
        ("macos", "aarch64") => lib_info("pdfium-mac-arm64.tgz", "libpdfium.dylib", "lib/libpdfium.dylib"),
        ("macos", "x86_64") => lib_info("pdfium-mac-x64.tgz", "libpdfium.dylib", "lib/libpdfium.dylib"),
        ("linux", "x86_64") => lib_info("pdfium-linux-x64.tgz", "libpdfium.so", "lib/libpdfium.so"),
        ("linux", "aarch64") => lib_info("pdfium-linux-arm64.tgz", "libpdfium.so", "lib/libpdfium.so"),
        ("windows", "x86_64") => lib_info("pdfium-win-x64.tgz", "pdfium.dll", "bin/pdfium.dll"),
        ("windows", "aarch64") => lib_info("pdfium-win-arm64.tgz", "pdfium.dll", "bin/pdfium.dll"),
        ("windows", "x86") => lib_info("pdfium-win-x86.tgz", "pdfium.dll", "bin/pdfium.dll"),
        (os, arch) => {
            return Err(PdfiumAutoError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            })
        }
    };
    Ok(info)
}

fn detect_platform() -> Result<PlatformInfo, PdfiumAutoError> {
    platform_for(std::env::consts::OS, std::env::consts::ARCH)
}

// ── Cache directory ──────────────────────────────────────────────────────────

/// Per-version cache directory, e.g. `~/.cache/pdf2quiz/pdfium-7690/` on
/// Linux or `~/Library/Caches/pdf2quiz/pdfium-7690/` on macOS.
pub fn pdfium_cache_dir() -> PathBuf {
    let versioned = format!("pdfium-{PDFIUM_VERSION}");
    if let Ok(base) = std::env::var(ENV_CACHE_DIR) {
        if !base.is_empty() {
            return PathBuf::from(base).join(versioned);
        }
    }

    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_APP_DIR)
        .join(versioned)
}

static RESOLVED_PATH: OnceLock<PathBuf> = OnceLock::new();

/// The library named by `PDFIUM_LIB_PATH`, if it exists. A directory is
/// searched for the platform library name.
fn env_override() -> Option<PathBuf> {
    let configured = std::env::var(ENV_LIB_PATH).ok().filter(|v| !v.is_empty())?;
    let path = library_at(Path::new(&configured));
    if path.is_file() {
        Some(path)
    } else {
        warn!(
            "{} points to '{}', which is not a pdfium library",
            ENV_LIB_PATH,
            path.display()
        );
        None
    }
}

/// `path` itself, or the platform library inside it when it is a directory.
fn library_at(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

/// A library already on disk: override, working directory, then cache.
fn local_library() -> Option<PathBuf> {
    if let Some(p) = env_override() {
        return Some(p);
    }
    let in_cwd = Pdfium::pdfium_platform_library_name_at_path("./");
    if in_cwd.is_file() {
        return Some(in_cwd);
    }
    let info = detect_platform().ok()?;
    let cached = pdfium_cache_dir().join(info.lib_name);
    cached.is_file().then_some(cached)
}

// ── Public API ───────────────────────────────────────────────────────────────

/// `true` when a library is already on disk, so resolving it needs no
/// network access.
pub fn is_pdfium_cached() -> bool {
    local_library().is_some()
}

/// Path of the on-disk library, or `None` if it still has to be fetched.
pub fn cached_pdfium_path() -> Option<PathBuf> {
    local_library()
}

/// Make sure a library exists on disk and return its path.
///
/// Without the `bundled` feature a missing library is downloaded;
/// `on_progress` then receives `(bytes_so_far, total_bytes)` every 64 KiB.
/// The resolved path is remembered for the rest of the process.
pub fn ensure_pdfium_library(
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<PathBuf, PdfiumAutoError> {
    if let Some(path) = RESOLVED_PATH.get() {
        return Ok(path.clone());
    }

    let path = match local_library() {
        Some(path) => path,
        None => fetch_library(on_progress)?,
    };

    // A concurrent caller may have won the race with the same answer.
    let _ = RESOLVED_PATH.set(path.clone());
    Ok(path)
}

/// Write the embedded library into the cache (if not already there) and
/// return its path.
#[cfg(feature = "bundled")]
pub fn ensure_pdfium_bundled() -> Result<PathBuf, PdfiumAutoError> {
    if let Some(path) = env_override() {
        return Ok(path);
    }
    let info = detect_platform()?;
    let cache_dir = pdfium_cache_dir();
    let lib_path = cache_dir.join(info.lib_name);
    write_bundled(bundled::PDFIUM_BYTES, &cache_dir, &lib_path)?;
    let _ = RESOLVED_PATH.set(lib_path.clone());
    Ok(lib_path)
}

/// Resolve (and if needed fetch) the library, then bind to it.
pub fn bind_pdfium(
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<Pdfium, PdfiumAutoError> {
    let lib_path = ensure_pdfium_library(on_progress)?;
    bind_pdfium_from_path(&lib_path)
}

/// [`bind_pdfium`] without progress reporting.
pub fn bind_pdfium_silent() -> Result<Pdfium, PdfiumAutoError> {
    bind_pdfium(None)
}

/// Bind to the library at `path` (a file, or a directory holding the
/// platform library). Never touches the cache or network.
pub fn bind_pdfium_from_path(path: &Path) -> Result<Pdfium, PdfiumAutoError> {
    let lib_path = library_at(path);
    debug!("Binding pdfium from {}", lib_path.display());
    Pdfium::bind_to_library(&lib_path)
        .map(Pdfium::new)
        .map_err(|e| PdfiumAutoError::Bind {
            path: lib_path,
            reason: e.to_string(),
        })
}

// ── Fetching ─────────────────────────────────────────────────────────────────

#[cfg(feature = "bundled")]
fn fetch_library(
    _on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<PathBuf, PdfiumAutoError> {
    ensure_pdfium_bundled()
}

#[cfg(not(feature = "bundled"))]
fn fetch_library(
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<PathBuf, PdfiumAutoError> {
    let info = detect_platform()?;
    let cache_dir = pdfium_cache_dir();
    let lib_path = cache_dir.join(info.lib_name);
    let url = format!(
        "{}/chromium%2F{}/{}",
        BASE_URL, PDFIUM_VERSION, info.archive_name
    );

    std::fs::create_dir_all(&cache_dir).map_err(PdfiumAutoError::CacheDir)?;
    info!("Downloading PDFium {} from {}", PDFIUM_VERSION, url);
    let archive_bytes = download_bytes(&url, on_progress)?;
    extract_library(&archive_bytes, info.lib_path_in_archive, &lib_path)?;
    info!("PDFium cached at {}", lib_path.display());
    Ok(lib_path)
}

#[cfg(feature = "bundled")]
fn write_bundled(bytes: &[u8], cache_dir: &Path, lib_path: &Path) -> Result<(), PdfiumAutoError> {
    let up_to_date = std::fs::metadata(lib_path)
        .map(|m| m.len() == bytes.len() as u64)
        .unwrap_or(false);
    if up_to_date {
        return Ok(());
    }
    std::fs::create_dir_all(cache_dir).map_err(PdfiumAutoError::CacheDir)?;
    let partial = lib_path.with_extension("part");
    std::fs::write(&partial, bytes).map_err(PdfiumAutoError::CacheDir)?;
    std::fs::rename(&partial, lib_path).map_err(PdfiumAutoError::CacheDir)?;
    info!("Extracted bundled PDFium to {}", lib_path.display());
    Ok(())
}

#[cfg_attr(feature = "bundled", allow(dead_code))]
fn download_bytes(
    url: &str,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<Vec<u8>, PdfiumAutoError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pdfium-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| PdfiumAutoError::Download(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| PdfiumAutoError::Download(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(PdfiumAutoError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let total = response.content_length();
    let mut buf = Vec::with_capacity(total.unwrap_or(32 * 1024 * 1024) as usize);
    let mut chunk = vec![0u8; 64 * 1024];
    let mut downloaded: u64 = 0;

    loop {
        match response.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                downloaded += n as u64;
                if let Some(cb) = on_progress {
                    cb(downloaded, total);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PdfiumAutoError::Download(format!("read error: {e}"))),
        }
    }

    Ok(buf)
}

/// Unpack the single member `lib_path_in_archive` of a `.tgz` to `dest_path`.
#[cfg_attr(feature = "bundled", allow(dead_code))]
fn extract_library(
    archive_bytes: &[u8],
    lib_path_in_archive: &str,
    dest_path: &Path,
) -> Result<(), PdfiumAutoError> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let mut archive = Archive::new(GzDecoder::new(archive_bytes));
    let entries = archive
        .entries()
        .map_err(|e| PdfiumAutoError::Extract(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| PdfiumAutoError::Extract(e.to_string()))?;
        let matches = entry
            .path()
            .map(|p| p.to_string_lossy() == lib_path_in_archive)
            .map_err(|e| PdfiumAutoError::Extract(e.to_string()))?;
        if matches {
            entry
                .unpack(dest_path)
                .map_err(|e| PdfiumAutoError::Extract(format!("unpack failed: {e}")))?;
            return Ok(());
        }
    }

    Err(PdfiumAutoError::Extract(format!(
        "'{lib_path_in_archive}' not found in archive"
    )))
}
