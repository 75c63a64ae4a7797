//! Compositing: walk the resolved interval, render qualifying pages and stack
//! them top-to-bottom on one white RGB canvas.
//!
//! Document access goes through the [`PageSource`] trait so that the interval
//! walk, the filter policy and the canvas arithmetic do not depend on pdfium.
//! [`crate::pipeline::render::PdfiumPages`] is the production source.

use crate::config::OutputFormat;
use crate::error::QuizError;
use crate::pipeline::range::{PageRange, ResolvedInterval};
use crate::progress::CompositionProgressCallback;
use image::{imageops, Rgb, RgbImage};
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::{debug, info};

/// Read access to the pages of one open document.
///
/// Indices are zero-based and always `< page_count()` when called by
/// [`compose_pages`].
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Full extracted text of the page.
    fn page_text(&self, index: usize) -> Result<String, QuizError>;

    /// Rasterise the page at `dpi`.
    fn render_page(&self, index: usize, dpi: u32) -> Result<RgbImage, QuizError>;
}

/// One rasterised page waiting to be pasted.
struct RenderedPage {
    page_num: usize,
    image: RgbImage,
}

/// Result of [`compose_pages`].
#[derive(Debug)]
pub struct Composition {
    pub canvas: RgbImage,
    pub interval: ResolvedInterval,
    /// 1-based numbers of the pages on the canvas, top to bottom.
    pub rendered_pages: Vec<usize>,
}

/// Render every qualifying page of `range` and stack the rasters.
///
/// With `filter` set, a page qualifies only if its text contains the filter;
/// other pages are skipped without being rendered.
///
/// # Errors
/// * [`QuizError::NoMatch`]: a filter was set and no page qualified
/// * [`QuizError::EmptyRange`]: no filter and the interval is empty
/// * text-extraction and rasterisation errors from the source
pub fn compose_pages<S: PageSource + ?Sized>(
    source: &S,
    range: PageRange,
    dpi: u32,
    filter: Option<&str>,
    progress: Option<&dyn CompositionProgressCallback>,
) -> Result<Composition, QuizError> {
    let interval = range.resolve(source.page_count());
    info!(
        "Composing pages {} (requested {}) at {} DPI",
        interval, range, dpi
    );
    if let Some(cb) = progress {
        cb.on_composition_start(interval.len());
    }

    let mut rendered: Vec<RenderedPage> = Vec::with_capacity(interval.len());
    let mut total_height: u32 = 0;
    let mut max_width: u32 = 0;

    for index in interval.indices() {
        let page_num = index + 1;

        if let Some(needle) = filter {
            let text = source.page_text(index)?;
            if !text.contains(needle) {
                debug!("Page {}: no match", page_num);
                if let Some(cb) = progress {
                    cb.on_page_skipped(page_num);
                }
                continue;
            }
            debug!("Page {}: match", page_num);
            if let Some(cb) = progress {
                cb.on_page_matched(page_num);
            }
        }

        let image = source.render_page(index, dpi)?;
        let (width, height) = image.dimensions();
        total_height = total_height.checked_add(height).ok_or_else(|| {
            QuizError::Internal(format!(
                "composite height overflows at page {page_num} ({total_height} + {height} px)"
            ))
        })?;
        max_width = max_width.max(width);
        debug!("Rendered page {} → {}x{} px", page_num, width, height);
        if let Some(cb) = progress {
            cb.on_page_rendered(page_num, width, height);
        }

        rendered.push(RenderedPage { page_num, image });
    }

    if rendered.is_empty() {
        return Err(match filter {
            Some(needle) => QuizError::NoMatch {
                needle: needle.to_string(),
                pages: interval,
            },
            None => QuizError::EmptyRange {
                from: range.from_page(),
                to: range.to_page(),
                page_count: interval.page_count,
            },
        });
    }

    if let Some(cb) = progress {
        cb.on_composition_complete(rendered.len());
    }

    let rendered_pages = rendered.iter().map(|p| p.page_num).collect();
    let canvas = stack_vertically(&rendered, max_width, total_height);
    info!(
        "Composite canvas {}x{} px from {} pages",
        canvas.width(),
        canvas.height(),
        rendered.len()
    );

    Ok(Composition {
        canvas,
        interval,
        rendered_pages,
    })
}

/// Paste pages left-aligned, each directly below the previous one.
fn stack_vertically(pages: &[RenderedPage], width: u32, height: u32) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut offset: i64 = 0;
    for page in pages {
        imageops::replace(&mut canvas, &page.image, 0, offset);
        offset += i64::from(page.image.height());
    }
    canvas
}

/// Encode `canvas` as `format` and atomically write it to `path`.
///
/// The bytes go to a temporary file in the destination directory which is
/// then renamed over `path`, so readers never see a partial image and a
/// failed encode leaves an existing file untouched. A new file gets the
/// mode a plain create would (`0o666` less the umask); an overwritten one
/// keeps its mode. Returns the bytes written.
pub fn save_canvas(canvas: &RgbImage, path: &Path, format: OutputFormat) -> Result<u64, QuizError> {
    let mut buf = Vec::new();
    canvas.write_to(&mut Cursor::new(&mut buf), format.image_format())?;

    let write_failed = |source: std::io::Error| QuizError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut builder = tempfile::Builder::new();
    builder.prefix(".pdf2quiz-");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // Applied at creation, so the umask still takes effect.
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    let mut tmp = builder.tempfile_in(dir).map_err(write_failed)?;
    tmp.write_all(&buf).map_err(write_failed)?;
    if let Ok(existing) = std::fs::metadata(path) {
        tmp.as_file()
            .set_permissions(existing.permissions())
            .map_err(write_failed)?;
    }
    tmp.persist(path).map_err(|e| write_failed(e.error))?;

    debug!("Wrote {} bytes → {}", buf.len(), path.display());
    Ok(buf.len() as u64)
}
