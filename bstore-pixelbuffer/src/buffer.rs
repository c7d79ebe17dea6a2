//! Pixel buffer traits.
//!
//! - [`PixelBuffer`]: read-only access to pixel data
//! - [`MutablePixelBuffer`]: read-write access plus the mutation primitives a
//!   backing store needs (fill, scroll-style copy, paint from renderer data)
//!
//! # Stride is in Pixels, Not Bytes
//!
//! All stride values in this API are measured in **pixels**. To calculate byte
//! offsets:
//!
//! ```text
//! byte_offset = (y * stride + x) * bytes_per_pixel
//! byte_length = height * stride * bytes_per_pixel
//! ```

use crate::PixelFormat;
use anyhow::Result;
use bstore_common::{Point, Rect};

/// Read-only pixel buffer access.
pub trait PixelBuffer {
    /// Returns the dimensions of the pixel buffer as (width, height).
    fn dimensions(&self) -> (u32, u32);

    /// Returns the pixel format used by this buffer.
    fn pixel_format(&self) -> &PixelFormat;
}

/// Mutable pixel buffer with rendering operations.
///
/// # Example
///
/// ```
/// use bstore_pixelbuffer::{ManagedPixelBuffer, MutablePixelBuffer, PixelBuffer, PixelFormat};
/// use bstore_common::Rect;
///
/// fn clear<B: MutablePixelBuffer>(buffer: &mut B) -> anyhow::Result<()> {
///     let (width, height) = buffer.dimensions();
///     let black = buffer.pixel_format().from_rgb888([0, 0, 0, 255]);
///     buffer.fill_rect(Rect::new(0, 0, width, height), &black)
/// }
///
/// let mut buffer = ManagedPixelBuffer::new(16, 16, PixelFormat::rgb888());
/// clear(&mut buffer).unwrap();
/// ```
pub trait MutablePixelBuffer: PixelBuffer {
    /// Fills a rectangle with a single pixel value (already in the buffer's format).
    fn fill_rect(&mut self, rect: Rect, pixel: &[u8]) -> Result<()>;

    /// Copies a rectangle within the buffer.
    ///
    /// `src_offset` is the offset from `dest` to the source position. Overlapping
    /// source and destination regions are handled correctly.
    fn copy_rect(&mut self, dest: Rect, src_offset: Point) -> Result<()>;

    /// Copies externally supplied pixel data into `dest`.
    ///
    /// `stride` is the source stride in **pixels**; 0 means tightly packed.
    fn image_rect(&mut self, dest: Rect, pixels: &[u8], stride: usize) -> Result<()>;
}
