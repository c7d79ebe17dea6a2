//! Owned pixel buffer.
//!
//! [`ManagedPixelBuffer`] is the concrete pixel payload behind backing stores
//! and thumbnails. It stores pixels row-major in a `Vec<u8>` with a stride equal
//! to the width, so for width W, height H and bytes-per-pixel B:
//!
//! ```text
//! Total size = W * H * B bytes
//! Pixel at (x, y) starts at offset: (y * W + x) * B
//! ```

use crate::{MutablePixelBuffer, PixelBuffer, PixelFormat};
use anyhow::{anyhow, Result};
use bstore_common::{Point, Rect};

/// A pixel buffer that manages its own memory.
///
/// # Example
///
/// ```
/// use bstore_pixelbuffer::{ManagedPixelBuffer, PixelFormat, PixelBuffer};
///
/// let buffer = ManagedPixelBuffer::new(800, 600, PixelFormat::rgb888());
/// assert_eq!(buffer.dimensions(), (800, 600));
/// assert_eq!(buffer.stride(), 800); // Stride in pixels
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedPixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    /// Row-major, no padding.
    data: Vec<u8>,
    /// Stride in **pixels**; always equals width.
    stride: usize,
}

impl ManagedPixelBuffer {
    /// Creates a zero-initialised buffer (black for the common formats).
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let stride = width as usize;
        let bytes_per_pixel = format.bytes_per_pixel() as usize;
        let data = vec![0u8; stride * height as usize * bytes_per_pixel];

        Self {
            width,
            height,
            format,
            data,
            stride,
        }
    }

    /// Creates a buffer where every pixel is `rgba`.
    pub fn filled(width: u32, height: u32, format: PixelFormat, rgba: [u8; 4]) -> Self {
        let pixel = format.from_rgb888(rgba);
        let data = pixel.repeat(width as usize * height as usize);
        Self {
            width,
            height,
            format,
            data,
            stride: width as usize,
        }
    }

    /// Wraps tightly packed pixel data.
    ///
    /// Fails if `data` does not hold exactly `width * height` pixels.
    pub fn from_data(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel() as usize;
        if data.len() != expected {
            return Err(anyhow!(
                "Pixel data is {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            ));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
            stride: width as usize,
        })
    }

    /// Caller guarantees `data.len() == width * height * bytes_per_pixel`.
    pub(crate) fn from_raw(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        debug_assert_eq!(
            data.len(),
            width as usize * height as usize * format.bytes_per_pixel() as usize
        );
        Self {
            width,
            height,
            format,
            data,
            stride: width as usize,
        }
    }

    /// Returns the stride in pixels.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the raw pixel data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the buffer width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the buffer height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the pixel format.
    pub fn format(&self) -> &PixelFormat {
        &self.format
    }

    /// Bytes held by the pixel payload.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Colour of the pixel at (x, y) as `[R, G, B, 255]`.
    pub fn pixel_rgb(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.format.bytes_per_pixel() as usize;
        let offset = (y as usize * self.stride + x as usize) * bpp;
        Some(self.format.to_rgb888(&self.data[offset..offset + bpp]))
    }

    /// Mean colour over every pixel, or `None` for an empty buffer.
    pub fn average_rgb(&self) -> Option<[u8; 3]> {
        let bpp = self.format.bytes_per_pixel() as usize;
        let count = self.width as u64 * self.height as u64;
        if count == 0 || bpp == 0 {
            return None;
        }

        let mut sums = [0u64; 3];
        for pixel in self.data.chunks_exact(bpp) {
            let rgba = self.format.to_rgb888(pixel);
            sums[0] += rgba[0] as u64;
            sums[1] += rgba[1] as u64;
            sums[2] += rgba[2] as u64;
        }

        Some([
            (sums[0] / count) as u8,
            (sums[1] / count) as u8,
            (sums[2] / count) as u8,
        ])
    }

    fn validate_rect(&self, rect: Rect) -> Result<()> {
        if rect.x < 0
            || rect.y < 0
            || rect.x as u64 + rect.width as u64 > self.width as u64
            || rect.y as u64 + rect.height as u64 > self.height as u64
        {
            return Err(anyhow!(
                "Rectangle out of bounds: {:?} (buffer size: {}x{})",
                rect,
                self.width,
                self.height
            ));
        }
        Ok(())
    }
}

impl PixelBuffer for ManagedPixelBuffer {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn pixel_format(&self) -> &PixelFormat {
        &self.format
    }
}

impl MutablePixelBuffer for ManagedPixelBuffer {
    fn fill_rect(&mut self, rect: Rect, pixel: &[u8]) -> Result<()> {
        self.validate_rect(rect)?;

        let bytes_per_pixel = self.format.bytes_per_pixel() as usize;
        if pixel.len() != bytes_per_pixel {
            return Err(anyhow!(
                "Invalid pixel size: got {} bytes, expected {}",
                pixel.len(),
                bytes_per_pixel
            ));
        }

        for y in 0..rect.height as usize {
            let row_offset =
                ((rect.y as usize + y) * self.stride + rect.x as usize) * bytes_per_pixel;
            let row = &mut self.data[row_offset..row_offset + rect.width as usize * bytes_per_pixel];
            for dst in row.chunks_exact_mut(bytes_per_pixel) {
                dst.copy_from_slice(pixel);
            }
        }

        Ok(())
    }

    fn copy_rect(&mut self, dest: Rect, src_offset: Point) -> Result<()> {
        self.validate_rect(dest)?;

        let (Some(src_x), Some(src_y)) = (
            dest.x.checked_add(src_offset.x),
            dest.y.checked_add(src_offset.y),
        ) else {
            return Err(anyhow!("Copy source offset {:?} out of range", src_offset));
        };
        let src_rect = Rect::new(src_x, src_y, dest.width, dest.height);
        self.validate_rect(src_rect)?;

        let bytes_per_pixel = self.format.bytes_per_pixel() as usize;
        let row_bytes = dest.width as usize * bytes_per_pixel;
        let stride = self.stride;
        let row_offsets = |y: usize| {
            let src = ((src_rect.y as usize + y) * stride + src_rect.x as usize) * bytes_per_pixel;
            let dst = ((dest.y as usize + y) * stride + dest.x as usize) * bytes_per_pixel;
            (src, dst)
        };

        // Source above the destination: walk rows bottom-up so unread source
        // rows are not overwritten. Overlap within a row is handled by copy_within.
        if src_offset.y < 0 {
            for y in (0..dest.height as usize).rev() {
                let (src, dst) = row_offsets(y);
                self.data.copy_within(src..src + row_bytes, dst);
            }
        } else {
            for y in 0..dest.height as usize {
                let (src, dst) = row_offsets(y);
                self.data.copy_within(src..src + row_bytes, dst);
            }
        }

        Ok(())
    }

    fn image_rect(&mut self, dest: Rect, pixels: &[u8], stride: usize) -> Result<()> {
        self.validate_rect(dest)?;
        if dest.is_empty() {
            return Ok(());
        }

        let bytes_per_pixel = self.format.bytes_per_pixel() as usize;
        let row_bytes = dest.width as usize * bytes_per_pixel;

        let src_stride = if stride == 0 {
            dest.width as usize
        } else {
            stride
        };
        let src_stride_bytes = src_stride * bytes_per_pixel;

        let required = src_stride_bytes * (dest.height as usize - 1) + row_bytes;
        if pixels.len() < required {
            return Err(anyhow!(
                "Insufficient source data: got {} bytes, need at least {}",
                pixels.len(),
                required
            ));
        }

        for y in 0..dest.height as usize {
            let dst = ((dest.y as usize + y) * self.stride + dest.x as usize) * bytes_per_pixel;
            let src = y * src_stride_bytes;
            self.data[dst..dst + row_bytes].copy_from_slice(&pixels[src..src + row_bytes]);
        }

        Ok(())
    }
}
