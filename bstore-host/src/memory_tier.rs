//! Physical memory tiers and the backing-store cache capacity derived from them.

/// Cache capacity per 256 MB memory tier; the last tier covers everything above.
const CAPACITY_BY_TIER: [usize; 4] = [2, 3, 4, 5];

/// Size of one memory tier in megabytes.
const TIER_MB: u64 = 256;

/// Reports how much physical memory the machine has.
pub trait MemoryTierOracle: Send + Sync {
    /// Physical memory in megabytes, or `None` when unknown.
    fn physical_memory_mb(&self) -> Option<u64>;
}

/// Reads the machine's physical memory.
///
/// On Linux this parses `MemTotal` from `/proc/meminfo`; elsewhere the amount
/// is reported as unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMemory;

impl MemoryTierOracle for SystemMemory {
    fn physical_memory_mb(&self) -> Option<u64> {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_meminfo_total_mb(&meminfo)
    }
}

/// A fixed memory amount, for configuration overrides and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedMemory(pub u64);

impl MemoryTierOracle for FixedMemory {
    fn physical_memory_mb(&self) -> Option<u64> {
        Some(self.0)
    }
}

/// Cache capacity for a machine with `memory_mb` megabytes of RAM.
///
/// Unknown memory is treated as the lowest tier.
pub fn cache_capacity_for_memory(memory_mb: Option<u64>) -> usize {
    let tier = memory_mb.map_or(0, |mb| (mb / TIER_MB).min(CAPACITY_BY_TIER.len() as u64 - 1));
    CAPACITY_BY_TIER[tier as usize]
}

fn parse_meminfo_total_mb(meminfo: &str) -> Option<u64> {
    let line = meminfo.lines().find(|line| line.starts_with("MemTotal:"))?;
    let mut fields = line.split_whitespace().skip(1);
    let value: u64 = fields.next()?.parse().ok()?;
    match fields.next() {
        Some("kB") | None => Some(value / 1024),
        Some(_) => None,
    }
}
