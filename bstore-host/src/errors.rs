//! Error types for the backing-store host.

use crate::surface::SurfaceId;
use std::io;
use thiserror::Error;

/// Errors that can occur while hosting surfaces.
///
/// Cache misses, empty thumbnails and a disabled cache are normal outcomes and
/// are reported through `Option`/empty values, never through this type.
#[derive(Debug, Error)]
pub enum HostError {
    /// The surface id was never issued or belongs to a destroyed surface.
    #[error("Unknown surface: {0}")]
    UnknownSurface(SurfaceId),

    /// A backing store of this size cannot be allocated.
    #[error("Invalid backing store size {width}x{height}")]
    InvalidSize {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },

    /// Applying pixels to a backing store failed.
    #[error("Paint error: {0}")]
    Paint(#[from] anyhow::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error (reading a configuration file).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The host event loop has shut down.
    #[error("Host channel closed")]
    ChannelClosed,
}

impl HostError {
    /// Returns true if the caller passed something invalid.
    ///
    /// Caller errors leave the host untouched; retrying with corrected input
    /// is expected to succeed.
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownSurface(_) | Self::InvalidSize { .. } | Self::Config(_)
        )
    }
}
