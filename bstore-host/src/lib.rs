//! Backing-store cache and thumbnail host.
//!
//! This crate keeps full-resolution backing stores for a small number of
//! surfaces and a downsampled thumbnail for every surface, so previews stay
//! available after the expensive backing store has been evicted.
//!
//! # Features
//!
//! - **Bounded cache**: at most a few backing stores, sized from physical memory
//! - **Eviction salvage**: a thumbnail is captured right before a store is evicted
//! - **Debounced invalidation**: rapid show/hide churn does not throw thumbnails away
//! - **Generation-checked ids**: stale surface handles are rejected, never aliased
//! - **Configuration management**: TOML files with defaults for every field
//!
//! # Quick Start
//!
//! ```no_run
//! use bstore_host::{Config, HostBuilder, HostCommand, HostEvent};
//! use anyhow::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::builder().cache_capacity(3).build()?;
//!     let host = HostBuilder::new(config).build()?;
//!     let handle = host.handle();
//!
//!     handle.send(HostCommand::CreateSurface)?;
//!     while let Ok(event) = handle.events().recv_async().await {
//!         match event {
//!             HostEvent::SurfaceCreated { id } => {
//!                 println!("Surface {} ready", id);
//!                 handle.shutdown()?;
//!             }
//!             HostEvent::Closed => break,
//!             _ => {}
//!         }
//!     }
//!
//!     let host = host.join().await?;
//!     println!("{} surface(s) alive", host.surface_count());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! [`SurfaceHost`] is the synchronous core: it owns the surface registry, the
//! [`BackingStoreManager`] and the [`ThumbnailGenerator`], and can be driven
//! directly. [`HostBuilder`] moves it onto a tokio task that serves
//! [`HostCommand`]s from a channel and fires the thumbnail expiry timer.
//!
//! # Safety
//!
//! This crate is `#![forbid(unsafe_code)]` and uses only safe Rust.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

// Public modules
pub mod backing_store;
pub mod clock;
pub mod config;
pub mod errors;
pub mod host;
pub mod manager;
pub mod memory_tier;
pub mod messages;
pub mod surface;
pub mod thumbnail;
pub mod timer;

// Private implementation modules
mod event_loop;

// Re-exports
pub use backing_store::{BackingStore, PaintUpdate, MAX_BACKING_STORE_PIXELS};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use errors::HostError;
pub use host::{SurfaceEvent, SurfaceHost};
pub use manager::{BackingStoreManager, PreparedBackingStore};
pub use memory_tier::{FixedMemory, MemoryTierOracle, SystemMemory};
pub use messages::{HostCommand, HostEvent};
pub use surface::{SurfaceId, SurfaceRegistry};
pub use thumbnail::{Thumbnail, ThumbnailGenerator, ThumbnailStats, WidgetThumbnail};

use bstore_pixelbuffer::PixelFormat;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Builder for a host running on its own event loop task.
pub struct HostBuilder {
    config: Config,
    oracle: Box<dyn MemoryTierOracle>,
    clock: Arc<dyn Clock>,
    format: PixelFormat,
}

impl HostBuilder {
    /// Creates a new host builder with the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            oracle: Box::new(SystemMemory),
            clock: Arc::new(SystemClock),
            format: PixelFormat::rgb888(),
        }
    }

    /// Use `oracle` instead of reading the machine's memory.
    #[must_use]
    pub fn memory_oracle(mut self, oracle: impl MemoryTierOracle + 'static) -> Self {
        self.oracle = Box::new(oracle);
        self
    }

    /// Read time from `clock`. It must track real time.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Pixel format for backing stores.
    #[must_use]
    pub fn pixel_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Builds the host and spawns its event loop.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> Result<Host, HostError> {
        let host = SurfaceHost::with_parts(&self.config, self.oracle.as_ref(), self.clock, self.format)?;

        let (cmd_tx, cmd_rx) = flume::bounded(32);
        let (event_tx, event_rx) = flume::bounded(64);
        let join_handle = event_loop::spawn(host, cmd_rx, event_tx);

        Ok(Host {
            handle: HostHandle {
                commands: cmd_tx,
                events: event_rx,
            },
            join_handle,
        })
    }
}

/// Handle for talking to a running host.
///
/// It can be cloned and shared across threads.
#[derive(Clone)]
pub struct HostHandle {
    commands: flume::Sender<HostCommand>,
    events: flume::Receiver<HostEvent>,
}

impl HostHandle {
    /// Sends a command to the host.
    ///
    /// # Errors
    ///
    /// Returns an error if the host has shut down.
    pub fn send(&self, cmd: HostCommand) -> Result<(), HostError> {
        self.commands
            .send(cmd)
            .map_err(|_| HostError::ChannelClosed)
    }

    /// Sends a command, waiting asynchronously if the channel is full.
    ///
    /// # Errors
    ///
    /// Returns an error if the host has shut down.
    pub async fn send_async(&self, cmd: HostCommand) -> Result<(), HostError> {
        self.commands
            .send_async(cmd)
            .await
            .map_err(|_| HostError::ChannelClosed)
    }

    /// Returns a reference to the event receiver.
    #[must_use]
    pub fn events(&self) -> &flume::Receiver<HostEvent> {
        &self.events
    }

    /// Asks the event loop to stop.
    ///
    /// # Errors
    ///
    /// Returns an error if the host has already shut down.
    pub fn shutdown(&self) -> Result<(), HostError> {
        self.send(HostCommand::Shutdown)
    }
}

/// A host running on a background task.
pub struct Host {
    handle: HostHandle,
    join_handle: JoinHandle<SurfaceHost>,
}

impl Host {
    /// Returns a handle for interacting with the host.
    #[must_use]
    pub fn handle(&self) -> HostHandle {
        self.handle.clone()
    }

    /// Waits for the event loop to stop and returns the host state.
    ///
    /// # Errors
    ///
    /// Returns an error if the event loop task panicked.
    pub async fn join(self) -> Result<SurfaceHost, HostError> {
        let Host {
            handle,
            join_handle,
        } = self;
        drop(handle);
        join_handle.await.map_err(|_| HostError::ChannelClosed)
    }
}
