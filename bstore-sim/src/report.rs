//! Simulation report.

use bstore_host::{Config, SurfaceHost};
use serde::Serialize;
use std::fmt;

/// What happened to one surface.
#[derive(Debug, Clone, Serialize)]
pub struct SurfaceReport {
    pub id: String,
    pub painted_rgb: Option<[u8; 3]>,
    pub has_backing_store: bool,
    pub thumbnail_size: Option<(u32, u32)>,
    pub thumbnail_rgb: Option<[u8; 3]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheSummary {
    pub capacity: usize,
    pub live_stores: usize,
    pub memory_bytes: usize,
    pub insertions: u64,
    pub evictions: u64,
    pub removals: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThumbnailSummary {
    pub debounce_window_ms: u64,
    pub generated: u64,
    pub salvaged: u64,
    pub invalidated: u64,
    pub served_from_cache: u64,
}

/// Full simulator output.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub surfaces: Vec<SurfaceReport>,
    pub cache: CacheSummary,
    pub thumbnails: ThumbnailSummary,
}

impl Report {
    pub fn new(config: &Config, host: &SurfaceHost, surfaces: Vec<SurfaceReport>) -> Self {
        let manager = host.manager();
        let cache_stats = manager.stats();
        let thumb_stats = host.generator().stats();

        Self {
            surfaces,
            cache: CacheSummary {
                capacity: manager.capacity(),
                live_stores: manager.len(),
                memory_bytes: manager.memory_size(),
                insertions: cache_stats.insertions,
                evictions: cache_stats.evictions,
                removals: cache_stats.removals,
            },
            thumbnails: ThumbnailSummary {
                debounce_window_ms: config.thumbnail.debounce_window_ms,
                generated: thumb_stats.generated,
                salvaged: thumb_stats.salvaged,
                invalidated: thumb_stats.invalidated,
                served_from_cache: thumb_stats.served_from_cache,
            },
        }
    }
}

fn rgb(colour: Option<[u8; 3]>) -> String {
    match colour {
        Some([r, g, b]) => format!("#{r:02x}{g:02x}{b:02x}"),
        None => "-".to_string(),
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<10} {:>8} {:>6} {:>10} {:>8}", "surface", "painted", "store", "thumbnail", "colour")?;
        for s in &self.surfaces {
            let size = s
                .thumbnail_size
                .map_or_else(|| "empty".to_string(), |(w, h)| format!("{w}x{h}"));
            writeln!(
                f,
                "{:<10} {:>8} {:>6} {:>10} {:>8}",
                s.id,
                rgb(s.painted_rgb),
                if s.has_backing_store { "yes" } else { "no" },
                size,
                rgb(s.thumbnail_rgb)
            )?;
        }
        writeln!(
            f,
            "cache: capacity {}, {} live ({} bytes), {} inserted, {} evicted, {} removed",
            self.cache.capacity,
            self.cache.live_stores,
            self.cache.memory_bytes,
            self.cache.insertions,
            self.cache.evictions,
            self.cache.removals
        )?;
        writeln!(
            f,
            "thumbnails: window {}ms, {} generated, {} salvaged, {} invalidated, {} served from cache",
            self.thumbnails.debounce_window_ms,
            self.thumbnails.generated,
            self.thumbnails.salvaged,
            self.thumbnails.invalidated,
            self.thumbnails.served_from_cache
        )
    }
}
