//! PDF access via pdfium: binding the native library, opening documents, and
//! the [`PageSource`] implementation used by the compositor.
//!
//! pdfium is not async-safe; everything here is blocking and is driven either
//! directly by [`crate::convert::compose`] or from `spawn_blocking` by
//! [`crate::convert::compose_async`].

use crate::error::QuizError;
use crate::pipeline::compose::PageSource;
use image::RgbImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Points per inch in PDF user space; pdfium renders 1 pt = 1 px at scale 1.
const POINTS_PER_INCH: f32 = 72.0;

/// Bind to a pdfium library.
///
/// `PDFIUM_LIB_PATH`, the working directory and the download cache are
/// tried first (see [`pdfium_auto`]); when none has a library one is
/// downloaded into the cache, or taken from the binary with the `bundled`
/// feature. If all of that fails the system library search path is the
/// last resort.
pub fn bind_pdfium() -> Result<Pdfium, QuizError> {
    match pdfium_auto::bind_pdfium_silent() {
        Ok(pdfium) => Ok(pdfium),
        Err(auto_err) => {
            debug!("pdfium-auto failed ({}); trying the system library", auto_err);
            Pdfium::bind_to_system_library()
                .map(Pdfium::new)
                .map_err(|_| QuizError::PdfiumBindingFailed(auto_err.to_string()))
        }
    }
}

/// Bind to the pdfium library at `path` (a file, or a directory holding the
/// platform library).
pub fn bind_pdfium_from_path(path: &Path) -> Result<Pdfium, QuizError> {
    pdfium_auto::bind_pdfium_from_path(path)
        .map_err(|e| QuizError::PdfiumBindingFailed(e.to_string()))
}

/// An open document. Dropping it closes the document.
pub struct PdfiumPages<'a> {
    document: PdfDocument<'a>,
    page_count: usize,
}

/// Open `pdf_path`, mapping pdfium's load errors onto [`QuizError`].
pub fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfiumPages<'a>, QuizError> {
    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                QuizError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                QuizError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            QuizError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let page_count = document.pages().len() as usize;
    info!("PDF loaded: {} pages", page_count);

    Ok(PdfiumPages {
        document,
        page_count,
    })
}

impl<'a> PdfiumPages<'a> {
    fn page(&self, index: usize) -> Result<PdfPage<'a>, QuizError> {
        let idx = u16::try_from(index).map_err(|_| QuizError::RasterisationFailed {
            page: index + 1,
            detail: "page index exceeds pdfium's page index range".into(),
        })?;
        self.document
            .pages()
            .get(idx)
            .map_err(|e| QuizError::RasterisationFailed {
                page: index + 1,
                detail: format!("{:?}", e),
            })
    }
}

impl PageSource for PdfiumPages<'_> {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_text(&self, index: usize) -> Result<String, QuizError> {
        let page = self.page(index)?;
        let text = page.text().map_err(|e| QuizError::TextExtractionFailed {
            page: index + 1,
            detail: format!("{:?}", e),
        })?;
        Ok(text.all())
    }

    fn render_page(&self, index: usize, dpi: u32) -> Result<RgbImage, QuizError> {
        let page = self.page(index)?;
        let render_config =
            PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / POINTS_PER_INCH);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| QuizError::RasterisationFailed {
                page: index + 1,
                detail: format!("{:?}", e),
            })?;

        Ok(bitmap.as_image().to_rgb8())
    }
}
