//! Pipeline stages from PDF pages to quiz questions.
//!
//! Each submodule implements one transformation step; the entry points in
//! [`crate::convert`] wire them together.
//!
//! ## Data Flow
//!
//! ```text
//! range ──▶ render ──▶ compose ──▶ encode ──▶ llm
//! (interval) (pdfium)  (canvas)   (base64)   (quiz)
//! ```
//!
//! 1. [`range`]   resolves `(from, to)` against the page count into a
//!    zero-based half-open interval
//! 2. [`render`]  binds pdfium and exposes an open document as a
//!    [`compose::PageSource`]; blocking, so async callers go through
//!    `spawn_blocking`
//! 3. [`compose`] filters pages by text, rasterises the survivors and
//!    stacks them on one white canvas, then writes it atomically
//! 4. [`encode`]  turns the written image into base64 PNG
//! 5. [`llm`]     sends image and prompt to an OpenAI-compatible endpoint;
//!    the only stage with network I/O

pub mod compose;
pub mod encode;
pub mod llm;
pub mod range;
pub mod render;
