//! Active device count caching.
//!
//! The cache only serves display counts. Every implementation may fail or go
//! stale without affecting admission correctness, because both admission
//! modes read the registry directly.

mod cached_registry;
mod memory;
#[cfg(feature = "database")]
mod redis_cache;

pub use cached_registry::CachedDeviceRegistry;
pub use memory::InMemoryDeviceCache;
#[cfg(feature = "database")]
pub use redis_cache::{DeviceCacheKeys, RedisDeviceCache};
