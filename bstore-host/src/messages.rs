//! Message types exchanged with the host event loop.

use crate::backing_store::PaintUpdate;
use crate::surface::SurfaceId;
use crate::thumbnail::Thumbnail;
use bstore_common::{Rect, Size};

/// Commands sent from the application to the host.
#[derive(Debug, Clone)]
pub enum HostCommand {
    /// Register a new surface. Answered with [`HostEvent::SurfaceCreated`].
    CreateSurface,

    /// Paint into a surface's backing store.
    Paint {
        /// Target surface.
        id: SurfaceId,
        /// Size the surface currently needs.
        size: Size,
        /// Pixels to apply.
        update: PaintUpdate,
    },

    /// Scroll part of a surface's backing store.
    Scroll {
        /// Target surface.
        id: SurfaceId,
        /// Horizontal offset in pixels.
        dx: i32,
        /// Vertical offset in pixels.
        dy: i32,
        /// Region to scroll.
        clip: Rect,
    },

    /// Show or hide a surface.
    SetVisible {
        /// Target surface.
        id: SurfaceId,
        /// New visibility.
        visible: bool,
    },

    /// Destroy a surface.
    Destroy {
        /// Target surface.
        id: SurfaceId,
    },

    /// Ask for a surface's thumbnail. Answered with [`HostEvent::Thumbnail`].
    RequestThumbnail {
        /// Target surface.
        id: SurfaceId,
    },

    /// Stop the event loop.
    Shutdown,
}

/// Events sent from the host to the application.
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// A surface was registered.
    SurfaceCreated {
        /// The new surface's id.
        id: SurfaceId,
    },

    /// A paint created a new backing store without covering it; the
    /// application should repaint the whole surface.
    NeedsFullPaint {
        /// Surface to repaint.
        id: SurfaceId,
    },

    /// Reply to [`HostCommand::RequestThumbnail`]. May be empty.
    Thumbnail {
        /// Surface the thumbnail belongs to.
        id: SurfaceId,
        /// The thumbnail.
        thumbnail: Thumbnail,
    },

    /// Protected thumbnails expired after their debounce window.
    ThumbnailsExpired {
        /// How many were cleared.
        count: usize,
    },

    /// A command failed. The loop keeps running.
    Error {
        /// The error message.
        message: String,
    },

    /// The event loop has stopped.
    Closed,
}
