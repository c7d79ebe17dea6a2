mod args;
mod report;

use anyhow::{bail, Result};
use args::Args;
use bstore_common::{Rect, Size};
use bstore_host::{HostBuilder, HostCommand, HostEvent, HostHandle, PaintUpdate, SurfaceId};
use bstore_pixelbuffer::PixelFormat;
use clap::Parser;
use report::{Report, SurfaceReport};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Solid colours handed out to surfaces in creation order.
const PALETTE: [[u8; 4]; 6] = [
    [0, 0, 0, 255],
    [255, 255, 255, 255],
    [220, 40, 40, 255],
    [40, 160, 60, 255],
    [40, 80, 220, 255],
    [240, 200, 40, 255],
];

fn init_logging(level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("bstore_sim={level},bstore_host={level},bstore_cache={level}").into()
            }),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}

/// Wait for the next event, logging the asynchronous ones that are not replies.
async fn next_reply(handle: &HostHandle) -> Result<HostEvent> {
    loop {
        let event = handle.events().recv_async().await?;
        match event {
            HostEvent::NeedsFullPaint { id } => {
                debug!("Surface {} needs a full repaint", id);
            }
            HostEvent::ThumbnailsExpired { count } => {
                debug!("{} protected thumbnail(s) expired", count);
            }
            HostEvent::Error { message } => {
                warn!("Host reported an error: {}", message);
            }
            HostEvent::Closed => bail!("Host closed unexpectedly"),
            reply => return Ok(reply),
        }
    }
}

async fn run(args: &Args) -> Result<Report> {
    let config = args.to_config()?;
    let size = Size::new(args.width, args.height);
    let format = PixelFormat::rgb888();

    let host = HostBuilder::new(config.clone()).pixel_format(format).build()?;
    let handle = host.handle();

    let mut surfaces = Vec::with_capacity(args.surfaces);
    for _ in 0..args.surfaces {
        handle.send_async(HostCommand::CreateSurface).await?;
        match next_reply(&handle).await? {
            HostEvent::SurfaceCreated { id } => surfaces.push(id),
            other => bail!("Expected SurfaceCreated, got {:?}", other),
        }
    }
    info!("Created {} surface(s) of {}x{}", surfaces.len(), size.width, size.height);

    // Paint every surface in turn; later ones push earlier ones out of the cache.
    let mut colours: HashMap<SurfaceId, [u8; 4]> = HashMap::new();
    for (i, id) in surfaces.iter().enumerate() {
        let rgba = PALETTE[i % PALETTE.len()];
        colours.insert(*id, rgba);
        handle
            .send_async(HostCommand::SetVisible { id: *id, visible: true })
            .await?;
        handle
            .send_async(HostCommand::Paint {
                id: *id,
                size,
                update: PaintUpdate::solid(Rect::from_size(size), &format, rgba),
            })
            .await?;
        handle
            .send_async(HostCommand::SetVisible { id: *id, visible: false })
            .await?;
    }

    // Bring the first surface back and give it a partial repaint, the way a
    // tab switch followed by a small invalidation would.
    if let Some(first) = surfaces.first().copied() {
        handle
            .send_async(HostCommand::SetVisible { id: first, visible: true })
            .await?;
        handle
            .send_async(HostCommand::Paint {
                id: first,
                size,
                update: PaintUpdate::solid(Rect::new(0, 0, size.width / 4, size.height / 4), &format, [128, 128, 128, 255]),
            })
            .await?;
    }

    let mut reports = Vec::with_capacity(surfaces.len());
    for id in &surfaces {
        handle.send_async(HostCommand::RequestThumbnail { id: *id }).await?;
        match next_reply(&handle).await? {
            HostEvent::Thumbnail { id, thumbnail } => reports.push(SurfaceReport {
                id: id.to_string(),
                painted_rgb: colours.get(&id).map(|c| [c[0], c[1], c[2]]),
                has_backing_store: false,
                thumbnail_size: thumbnail.dimensions(),
                thumbnail_rgb: thumbnail.average_rgb(),
            }),
            other => bail!("Expected Thumbnail, got {:?}", other),
        }
    }

    handle.shutdown()?;
    drop(handle);
    let host = host.join().await?;

    for (report, id) in reports.iter_mut().zip(&surfaces) {
        report.has_backing_store = host.backing_store(*id)?.is_some();
    }

    Ok(Report::new(&config, &host, reports))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging first
    init_logging(args.log_level())?;

    info!("Starting bstore-sim {}", env!("CARGO_PKG_VERSION"));

    let report = run(&args).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report);
    }

    Ok(())
}
