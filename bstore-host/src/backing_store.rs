//! Full-resolution backing stores.
//!
//! A [`BackingStore`] holds the most recently rendered pixels for one surface
//! at one size. Renderers mutate it with [`PaintUpdate`]s and scrolls; the
//! thumbnail generator reads it through [`BackingStore::buffer`].

use crate::errors::HostError;
use crate::surface::SurfaceId;
use anyhow::{anyhow, Result};
use bstore_common::{Point, Rect, Size};
use bstore_pixelbuffer::{ManagedPixelBuffer, MutablePixelBuffer, PixelFormat};

/// Largest backing store we are willing to allocate, in pixels.
pub const MAX_BACKING_STORE_PIXELS: u64 = 8192 * 8192;

/// Pixels for one rectangle, tightly packed in the store's pixel format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaintUpdate {
    /// Destination rectangle in surface coordinates.
    pub rect: Rect,
    /// Row-major pixel data covering `rect`.
    pub pixels: Vec<u8>,
}

impl PaintUpdate {
    /// Wrap raw pixels for `rect`.
    pub fn new(rect: Rect, pixels: Vec<u8>) -> Self {
        Self { rect, pixels }
    }

    /// A rectangle of a single colour.
    pub fn solid(rect: Rect, format: &PixelFormat, rgba: [u8; 4]) -> Self {
        let pixels = format.from_rgb888(rgba).repeat(rect.area() as usize);
        Self { rect, pixels }
    }

    /// True when the update covers `size` exactly, starting at the origin.
    pub fn covers(&self, size: Size) -> bool {
        self.rect.covers_from_origin(size)
    }
}

/// Rendered pixel contents of one surface.
#[derive(Debug)]
pub struct BackingStore {
    owner: SurfaceId,
    size: Size,
    buffer: ManagedPixelBuffer,
}

impl BackingStore {
    /// Allocate a black store of `size`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::InvalidSize`] for an empty size or one above
    /// [`MAX_BACKING_STORE_PIXELS`].
    pub fn new(owner: SurfaceId, size: Size, format: PixelFormat) -> Result<Self, HostError> {
        if size.is_empty() || size.area() > MAX_BACKING_STORE_PIXELS {
            return Err(HostError::InvalidSize {
                width: size.width,
                height: size.height,
            });
        }

        Ok(Self {
            owner,
            size,
            buffer: ManagedPixelBuffer::new(size.width, size.height, format),
        })
    }

    /// Surface this store belongs to.
    pub fn owner(&self) -> SurfaceId {
        self.owner
    }

    /// Pixel size.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Read access to the pixels.
    pub fn buffer(&self) -> &ManagedPixelBuffer {
        &self.buffer
    }

    /// Bytes of pixel memory held.
    pub fn memory_size(&self) -> usize {
        self.buffer.byte_len()
    }

    /// Copy an update into the store.
    ///
    /// Parts of the update outside the store are ignored.
    pub fn paint_rect(&mut self, update: &PaintUpdate) -> Result<()> {
        let bpp = self.buffer.format().bytes_per_pixel() as usize;
        let needed = update.rect.area() as usize * bpp;
        if update.pixels.len() < needed {
            return Err(anyhow!(
                "Paint data too short for {:?}: got {} bytes, need {}",
                update.rect,
                update.pixels.len(),
                needed
            ));
        }

        let Some(visible) = update.rect.intersect(&Rect::from_size(self.size)) else {
            return Ok(());
        };

        let skip_x = (i64::from(visible.x) - i64::from(update.rect.x)) as usize;
        let skip_y = (i64::from(visible.y) - i64::from(update.rect.y)) as usize;
        let src_stride = update.rect.width as usize;
        let offset = (skip_y * src_stride + skip_x) * bpp;
        self.buffer
            .image_rect(visible, &update.pixels[offset..], src_stride)
    }

    /// Scroll the contents of `clip` by (`dx`, `dy`).
    ///
    /// Pixels scrolled out of `clip` are lost; the strip scrolled into view
    /// keeps its old contents until the renderer repaints it.
    pub fn scroll_rect(&mut self, dx: i32, dy: i32, clip: Rect) -> Result<()> {
        let Some(clip) = clip.intersect(&Rect::from_size(self.size)) else {
            return Ok(());
        };
        // Everything in the clip scrolls out of view.
        if dx.unsigned_abs() >= clip.width || dy.unsigned_abs() >= clip.height {
            return Ok(());
        }
        let shifted = Rect::new(clip.x + dx, clip.y + dy, clip.width, clip.height);
        let Some(dest) = shifted.intersect(&clip) else {
            return Ok(());
        };
        self.buffer.copy_rect(dest, Point::new(-dx, -dy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SurfaceRegistry;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const GREEN: [u8; 4] = [0, 255, 0, 255];
    const BLACK: [u8; 4] = [0, 0, 0, 255];

    fn store(width: u32, height: u32) -> BackingStore {
        let mut registry = SurfaceRegistry::new();
        BackingStore::new(registry.create(), Size::new(width, height), PixelFormat::rgb888()).unwrap()
    }

    #[test]
    fn rejects_unallocatable_sizes() {
        let mut registry = SurfaceRegistry::new();
        let id = registry.create();
        let format = PixelFormat::rgb888();

        assert!(matches!(
            BackingStore::new(id, Size::new(0, 100), format),
            Err(HostError::InvalidSize { width: 0, height: 100 })
        ));
        assert!(matches!(
            BackingStore::new(id, Size::new(100_000, 100_000), format),
            Err(HostError::InvalidSize { .. })
        ));
    }

    #[test]
    fn starts_black() {
        let store = store(4, 4);
        assert_eq!(store.buffer().average_rgb(), Some([0, 0, 0]));
        assert_eq!(store.memory_size(), 4 * 4 * 4);
    }

    #[test]
    fn paint_writes_pixels() {
        let mut store = store(8, 8);
        let update = PaintUpdate::solid(Rect::new(2, 2, 2, 2), &PixelFormat::rgb888(), RED);
        store.paint_rect(&update).unwrap();

        assert_eq!(store.buffer().pixel_rgb(2, 2), Some(RED));
        assert_eq!(store.buffer().pixel_rgb(3, 3), Some(RED));
        assert_eq!(store.buffer().pixel_rgb(4, 4), Some(BLACK));
    }

    #[test]
    fn paint_clips_to_store() {
        let mut store = store(4, 4);
        let format = PixelFormat::rgb888();
        // Left column red, the rest green, partly outside the store.
        let mut pixels = Vec::new();
        for _y in 0..4 {
            pixels.extend(format.from_rgb888(RED));
            for _x in 1..4 {
                pixels.extend(format.from_rgb888(GREEN));
            }
        }
        let update = PaintUpdate::new(Rect::new(-1, 2, 4, 4), pixels);
        store.paint_rect(&update).unwrap();

        // Column -1 was red and clipped away.
        assert_eq!(store.buffer().pixel_rgb(0, 2), Some(GREEN));
        assert_eq!(store.buffer().pixel_rgb(2, 3), Some(GREEN));
        assert_eq!(store.buffer().pixel_rgb(3, 3), Some(BLACK));
        assert_eq!(store.buffer().pixel_rgb(0, 1), Some(BLACK));
    }

    #[test]
    fn paint_outside_is_noop() {
        let mut store = store(4, 4);
        let update = PaintUpdate::solid(Rect::new(10, 10, 2, 2), &PixelFormat::rgb888(), RED);
        store.paint_rect(&update).unwrap();
        assert_eq!(store.buffer().average_rgb(), Some([0, 0, 0]));
    }

    #[test]
    fn short_paint_data_is_an_error() {
        let mut store = store(4, 4);
        let update = PaintUpdate::new(Rect::new(0, 0, 2, 2), vec![0; 3]);
        assert!(store.paint_rect(&update).is_err());
    }

    #[test]
    fn scroll_moves_content_down() {
        let mut store = store(4, 4);
        let update = PaintUpdate::solid(Rect::new(0, 0, 4, 1), &PixelFormat::rgb888(), RED);
        store.paint_rect(&update).unwrap();

        store.scroll_rect(0, 2, Rect::new(0, 0, 4, 4)).unwrap();
        assert_eq!(store.buffer().pixel_rgb(1, 2), Some(RED));
        // Exposed strip keeps stale contents.
        assert_eq!(store.buffer().pixel_rgb(1, 0), Some(RED));
        assert_eq!(store.buffer().pixel_rgb(1, 1), Some(BLACK));
    }

    #[test]
    fn scroll_beyond_clip_copies_nothing() {
        let mut store = store(4, 4);
        let format = PixelFormat::rgb888();
        store
            .paint_rect(&PaintUpdate::solid(Rect::new(0, 0, 4, 4), &format, GREEN))
            .unwrap();
        store.scroll_rect(10, 0, Rect::new(0, 0, 4, 4)).unwrap();
        store.scroll_rect(0, -4, Rect::new(0, 0, 4, 4)).unwrap();
        assert_eq!(store.buffer().average_rgb(), Some([0, 255, 0]));
    }

    #[test]
    fn scroll_by_extreme_deltas_is_noop() {
        let mut store = store(8, 8);
        let format = PixelFormat::rgb888();
        store
            .paint_rect(&PaintUpdate::solid(Rect::new(0, 0, 8, 1), &format, RED))
            .unwrap();

        let clip = Rect::new(0, 0, 8, 8);
        store.scroll_rect(i32::MAX, 0, clip).unwrap();
        store.scroll_rect(i32::MIN, 0, clip).unwrap();
        store.scroll_rect(0, i32::MAX, clip).unwrap();
        store.scroll_rect(i32::MIN, i32::MIN, clip).unwrap();

        assert_eq!(store.buffer().pixel_rgb(0, 0), Some(RED));
        assert_eq!(store.buffer().pixel_rgb(0, 1), Some(BLACK));
    }

    #[test]
    fn paint_far_outside_is_noop() {
        let mut store = store(8, 8);
        let format = PixelFormat::rgb888();
        for rect in [
            Rect::new(i32::MAX - 1, 0, 4, 1),
            Rect::new(0, i32::MAX, 1, 4),
            Rect::new(i32::MIN, i32::MIN, 2, 2),
        ] {
            store.paint_rect(&PaintUpdate::solid(rect, &format, RED)).unwrap();
        }
        assert_eq!(store.buffer().average_rgb(), Some([0, 0, 0]));
    }

    #[test]
    fn covers_requires_origin_and_size() {
        let format = PixelFormat::rgb888();
        let size = Size::new(10, 10);
        assert!(PaintUpdate::solid(Rect::new(0, 0, 10, 10), &format, RED).covers(size));
        assert!(!PaintUpdate::solid(Rect::new(1, 0, 10, 10), &format, RED).covers(size));
        assert!(!PaintUpdate::solid(Rect::new(0, 0, 5, 10), &format, RED).covers(size));
    }
}
