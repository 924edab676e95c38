//! Codec adapters, one per conversion family.
//!
//! Every adapter is a pure `bytes in → bytes out` function; none of them
//! touch the filesystem or check whether a pair is permitted. The
//! [`crate::dispatch`] module routes a validated request to exactly one of
//! them and owns all I/O.
//!
//! ## Families
//!
//! ```text
//! raster ──▶ raster     raster::convert      decode, re-encode, same pixels
//! raster ──▶ pdf        image_pdf::convert   one page sized to the image
//! pdf    ──▶ raster     rasterize::convert   first page, placeholder canvas
//! pdf    ──▶ txt        extract::convert     text operators in page order
//! txt    ──▶ pdf        layout::convert      A4, Helvetica 12 pt
//! pdf    ──▶ doc/docx   legacy::to_legacy    extracted text + footer
//! doc/x  ──▶ txt        legacy::to_text      OOXML or plain-text body
//! ```
//!
//! The crate-private `pdf` module holds the `lopdf` plumbing shared by the
//! PDF adapters.

pub mod extract;
pub mod image_pdf;
pub mod layout;
pub mod legacy;
pub(crate) mod pdf;
pub mod raster;
pub mod rasterize;
