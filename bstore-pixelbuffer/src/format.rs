//! Pixel format descriptions and conversions.
//!
//! A backing store holds pixels in whatever layout the renderer produced them.
//! [`PixelFormat`] describes that layout as bit fields inside a little- or
//! big-endian word so that code which needs to reason about colour (averaging
//! during downsampling, dominant-colour checks) can go through RGB888.
//!
//! # Channel Extraction and Scaling
//!
//! To extract a color component from a pixel value:
//! 1. Shift right by the channel's shift value
//! 2. Mask with the channel's max value
//! 3. Scale to 8-bit: `(component * 255) / channel_max`
//!
//! # Example
//!
//! ```
//! use bstore_pixelbuffer::PixelFormat;
//!
//! let pf = PixelFormat::rgb888();
//! assert_eq!(pf.bytes_per_pixel(), 4);
//!
//! let pixel = [0xCC, 0xBB, 0xAA, 0x00]; // Little-endian: 0x00AABBCC
//! assert_eq!(pf.to_rgb888(&pixel), [0xAA, 0xBB, 0xCC, 0xFF]);
//! assert_eq!(pf.from_rgb888([0xAA, 0xBB, 0xCC, 0xFF]), vec![0xCC, 0xBB, 0xAA, 0x00]);
//! ```

/// Describes a true-colour pixel layout and converts to/from RGB888.
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub struct PixelFormat {
    /// Storage bits per pixel, e.g. 32 for RGB888 in a 32-bit word.
    pub bits_per_pixel: u8,

    /// Significant colour bits, e.g. 24 for RGB888.
    pub depth: u8,

    /// Byte order for multi-byte pixels (`true` = big endian).
    pub big_endian: bool,

    /// Maximum red component value (255 for 8-bit red).
    pub red_max: u16,

    /// Maximum green component value.
    pub green_max: u16,

    /// Maximum blue component value.
    pub blue_max: u16,

    /// Bit position of the least significant red bit.
    pub red_shift: u8,

    /// Bit position of the least significant green bit.
    pub green_shift: u8,

    /// Bit position of the least significant blue bit.
    pub blue_shift: u8,
}

impl Default for PixelFormat {
    fn default() -> Self {
        Self::rgb888()
    }
}

impl PixelFormat {
    /// Returns bytes-per-pixel, rounded up to the nearest byte.
    pub fn bytes_per_pixel(&self) -> u8 {
        self.bits_per_pixel.div_ceil(8)
    }

    /// Standard little-endian 32bpp RGB888 (red at bit 16, green at 8, blue at 0).
    ///
    /// A pixel with R=0xAA, G=0xBB, B=0xCC is stored as `[0xCC, 0xBB, 0xAA, 0x00]`.
    pub fn rgb888() -> Self {
        Self {
            bits_per_pixel: 32,
            depth: 24,
            big_endian: false,
            red_max: 255,
            green_max: 255,
            blue_max: 255,
            red_shift: 16,
            green_shift: 8,
            blue_shift: 0,
        }
    }

    /// Little-endian 16bpp RGB565.
    pub fn rgb565() -> Self {
        Self {
            bits_per_pixel: 16,
            depth: 16,
            big_endian: false,
            red_max: 31,
            green_max: 63,
            blue_max: 31,
            red_shift: 11,
            green_shift: 5,
            blue_shift: 0,
        }
    }

    /// Converts a pixel from this format to `[R, G, B, 255]`.
    ///
    /// # Panics
    ///
    /// Panics if `pixel.len()` does not equal `self.bytes_per_pixel()`, or if any
    /// channel max is zero (invalid format).
    pub fn to_rgb888(&self, pixel: &[u8]) -> [u8; 4] {
        let bpp = self.bytes_per_pixel() as usize;
        assert_eq!(
            pixel.len(),
            bpp,
            "pixel length {} does not match bytes_per_pixel {}",
            pixel.len(),
            bpp
        );

        let mut value = 0u32;
        if self.big_endian {
            for &byte in pixel.iter().take(bpp) {
                value = (value << 8) | (byte as u32);
            }
        } else {
            for (i, &byte) in pixel.iter().take(bpp).enumerate() {
                value |= (byte as u32) << (i * 8);
            }
        }

        let r = (value >> self.red_shift) & (self.red_max as u32);
        let g = (value >> self.green_shift) & (self.green_max as u32);
        let b = (value >> self.blue_shift) & (self.blue_max as u32);

        assert!(self.red_max > 0, "red_max must be > 0");
        assert!(self.green_max > 0, "green_max must be > 0");
        assert!(self.blue_max > 0, "blue_max must be > 0");

        [
            ((r * 255) / self.red_max as u32) as u8,
            ((g * 255) / self.green_max as u32) as u8,
            ((b * 255) / self.blue_max as u32) as u8,
            255,
        ]
    }

    /// Converts `[R, G, B, A]` to this format. Alpha is ignored.
    pub fn from_rgb888(&self, rgb: [u8; 4]) -> Vec<u8> {
        let r = (rgb[0] as u32 * self.red_max as u32) / 255;
        let g = (rgb[1] as u32 * self.green_max as u32) / 255;
        let b = (rgb[2] as u32 * self.blue_max as u32) / 255;

        let mut value = (r << self.red_shift) | (g << self.green_shift) | (b << self.blue_shift);

        let bpp = self.bytes_per_pixel() as usize;
        let mut result = vec![0u8; bpp];

        if self.big_endian {
            for i in 0..bpp {
                result[bpp - 1 - i] = (value & 0xFF) as u8;
                value >>= 8;
            }
        } else {
            for item in result.iter_mut() {
                *item = (value & 0xFF) as u8;
                value >>= 8;
            }
        }

        result
    }

    /// True for the layout returned by [`PixelFormat::rgb888`].
    pub fn is_rgb888(&self) -> bool {
        *self == Self::rgb888()
    }
}
