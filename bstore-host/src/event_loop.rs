//! Event loop: runs a [`SurfaceHost`] on one task, serving commands and the
//! thumbnail expiry timer.
//!
//! The host's clock must track real time, since timer deadlines are slept on
//! with tokio.

use crate::{
    errors::HostError,
    host::SurfaceHost,
    messages::{HostCommand, HostEvent},
};
use std::time::Duration;
use tokio::select;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Placeholder sleep while no timer is armed; the branch is disabled anyway.
const IDLE_SLEEP: Duration = Duration::from_secs(3600);

/// Spawn the host event loop.
///
/// The loop stops on [`HostCommand::Shutdown`] or when every command sender
/// is dropped, and hands the host back through the join handle.
pub fn spawn(
    mut host: SurfaceHost,
    commands: flume::Receiver<HostCommand>,
    events: flume::Sender<HostEvent>,
) -> JoinHandle<SurfaceHost> {
    tokio::spawn(async move {
        loop {
            let deadline = host.next_timer_deadline();
            let wake_at = deadline
                .map(tokio::time::Instant::from_std)
                .unwrap_or_else(|| tokio::time::Instant::now() + IDLE_SLEEP);

            select! {
                cmd = commands.recv_async() => {
                    match cmd {
                        Ok(HostCommand::Shutdown) | Err(_) => {
                            debug!("Host event loop shutting down");
                            let _ = events.try_send(HostEvent::Closed);
                            break;
                        }
                        Ok(command) => {
                            let reply = match handle_command(&mut host, command) {
                                Ok(reply) => reply,
                                Err(e) => {
                                    warn!("Host command failed: {}", e);
                                    Some(HostEvent::Error { message: e.to_string() })
                                }
                            };
                            if let Some(event) = reply {
                                if events.send_async(event).await.is_err() {
                                    trace!("Event receiver gone, dropping reply");
                                }
                            }
                        }
                    }
                }

                _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => {
                    let count = host.run_expired_timers();
                    trace!("Expiry timer fired, {} thumbnail(s) cleared", count);
                    if count > 0 {
                        let _ = events.send_async(HostEvent::ThumbnailsExpired { count }).await;
                    }
                }
            }
        }
        host
    })
}

/// Apply one command, returning the event to report back, if any.
fn handle_command(host: &mut SurfaceHost, command: HostCommand) -> Result<Option<HostEvent>, HostError> {
    let reply = match command {
        HostCommand::CreateSurface => Some(HostEvent::SurfaceCreated {
            id: host.create_surface(),
        }),
        HostCommand::Paint { id, size, update } => host
            .paint(id, size, &update)?
            .then_some(HostEvent::NeedsFullPaint { id }),
        HostCommand::Scroll { id, dx, dy, clip } => {
            host.scroll(id, dx, dy, clip)?;
            None
        }
        HostCommand::SetVisible { id, visible } => {
            host.set_visible(id, visible)?;
            None
        }
        HostCommand::Destroy { id } => {
            host.destroy_surface(id)?;
            None
        }
        HostCommand::RequestThumbnail { id } => Some(HostEvent::Thumbnail {
            id,
            thumbnail: host.thumbnail(id)?,
        }),
        HostCommand::Shutdown => None,
    };
    Ok(reply)
}
