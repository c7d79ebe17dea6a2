//! Bounded-capacity eviction cache.
//!
//! [`BoundedMruCache`] owns its values, orders them by recency of use and
//! evicts the least recently used entry when full. Eviction observers get a
//! look at each victim before it is destroyed, which is what lets a consumer
//! salvage derived data (a thumbnail of a backing store, for instance) right
//! before the expensive original goes away.

pub mod mru;
pub mod stats;

pub use mru::{BoundedMruCache, EvictionObserver};
pub use stats::CacheStats;
