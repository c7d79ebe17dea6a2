//! Thumbnail downsampling by repeated halving.
//!
//! Each step converts to RGBA and scales with `image`'s triangle filter.
//! Odd dimensions round up.

use crate::{ManagedPixelBuffer, PixelFormat};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

/// Produces a copy of `src` no larger than `max_width` x `max_height`.
///
/// Both dimensions are halved together until the result fits, so the aspect
/// ratio is preserved up to rounding. The input is never modified, and when it
/// already fits the result is an independent copy of it.
///
/// Halving can land well under the bounds: a 600 pixel wide source with a
/// 294 pixel limit ends at 150, not 294.
///
/// # Example
///
/// ```
/// use bstore_pixelbuffer::{downsample, ManagedPixelBuffer, PixelFormat};
///
/// let page = ManagedPixelBuffer::filled(800, 600, PixelFormat::rgb888(), [0, 0, 0, 255]);
/// let thumb = downsample(&page, 294, 204);
/// assert_eq!((thumb.width(), thumb.height()), (200, 150));
/// ```
pub fn downsample(src: &ManagedPixelBuffer, max_width: u32, max_height: u32) -> ManagedPixelBuffer {
    let mut current: Option<ManagedPixelBuffer> = None;
    let mut steps = 0u32;

    loop {
        let view = current.as_ref().unwrap_or(src);
        let fits = view.width() <= max_width && view.height() <= max_height;
        let irreducible = view.width() <= 1 && view.height() <= 1;
        if fits || irreducible {
            break;
        }
        current = Some(downsample_by_two(view));
        steps += 1;
    }

    tracing::trace!(
        "downsample {}x{} -> bounds {}x{} in {} halving step(s)",
        src.width(),
        src.height(),
        max_width,
        max_height,
        steps
    );

    current.unwrap_or_else(|| src.clone())
}

/// Halves both dimensions (rounding up) with a triangle filter.
pub fn downsample_by_two(src: &ManagedPixelBuffer) -> ManagedPixelBuffer {
    let format: PixelFormat = *src.format();
    let (src_w, src_h) = (src.width(), src.height());
    let dst_w = src_w.div_ceil(2);
    let dst_h = src_h.div_ceil(2);
    if src_w == 0 || src_h == 0 {
        return ManagedPixelBuffer::new(dst_w, dst_h, format);
    }

    let bpp = format.bytes_per_pixel() as usize;
    let data = src.data();
    let stride = src.stride();
    let rgba = RgbaImage::from_fn(src_w, src_h, |x, y| {
        let offset = (y as usize * stride + x as usize) * bpp;
        Rgba(format.to_rgb888(&data[offset..offset + bpp]))
    });
    let scaled = imageops::resize(&rgba, dst_w, dst_h, FilterType::Triangle);

    let mut out = Vec::with_capacity(dst_w as usize * dst_h as usize * bpp);
    for pixel in scaled.pixels() {
        let [r, g, b, _] = pixel.0;
        out.extend_from_slice(&format.from_rgb888([r, g, b, 255]));
    }

    ManagedPixelBuffer::from_raw(dst_w, dst_h, format, out)
}
