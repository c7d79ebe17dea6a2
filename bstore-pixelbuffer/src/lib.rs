//! Pixel storage for backing stores and thumbnails.
//!
//! - [`PixelFormat`] describes how a pixel is laid out in memory
//! - [`PixelBuffer`] / [`MutablePixelBuffer`] are the access traits
//! - [`ManagedPixelBuffer`] owns its pixels in a `Vec<u8>`
//! - [`downsample`] shrinks a buffer by repeated halving

pub mod buffer;
pub mod downsample;
pub mod format;
pub mod managed;

pub use buffer::{MutablePixelBuffer, PixelBuffer};
pub use downsample::{downsample, downsample_by_two};
pub use format::PixelFormat;
pub use managed::ManagedPixelBuffer;
