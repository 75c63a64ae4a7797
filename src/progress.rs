//! Progress-callback trait for per-page composition events.
//!
//! Inject an [`Arc<dyn CompositionProgressCallback>`] via
//! [`crate::config::CompositionConfigBuilder::progress_callback`] to learn,
//! page by page, which pages matched the content filter, which were skipped,
//! and how large each rendered raster turned out.
//!
//! # Example
//!
//! ```rust
//! use pdf2quiz::{CompositionConfig, CompositionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct SkipCounter {
//!     skipped: AtomicUsize,
//! }
//!
//! impl CompositionProgressCallback for SkipCounter {
//!     fn on_page_skipped(&self, page_num: usize) {
//!         self.skipped.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page_num}: no match");
//!     }
//! }
//!
//! let counter = Arc::new(SkipCounter { skipped: AtomicUsize::new(0) });
//!
//! let config = CompositionConfig::builder()
//!     .content_filter("Acceleration")
//!     .progress_callback(counter as Arc<dyn CompositionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the compositor as it walks the resolved interval.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Page numbers are 1-based.
pub trait CompositionProgressCallback: Send + Sync {
    /// Called once the interval is known, before the first page is looked at.
    ///
    /// # Arguments
    /// * `total_pages`: number of pages in the resolved interval
    fn on_composition_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// The page's text contains the content filter.
    fn on_page_matched(&self, page_num: usize) {
        let _ = page_num;
    }

    /// The page's text does not contain the content filter; it is not rendered.
    fn on_page_skipped(&self, page_num: usize) {
        let _ = page_num;
    }

    /// The page was rasterised.
    ///
    /// # Arguments
    /// * `page_num`: 1-indexed page number
    /// * `width`, `height`: raster size in pixels
    fn on_page_rendered(&self, page_num: usize, width: u32, height: u32) {
        let _ = (page_num, width, height);
    }

    /// Called once after the interval has been walked, before the canvas is
    /// built. Not called when composition fails.
    fn on_composition_complete(&self, rendered_pages: usize) {
        let _ = rendered_pages;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl CompositionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::CompositionConfig`].
pub type ProgressCallback = Arc<dyn CompositionProgressCallback>;
