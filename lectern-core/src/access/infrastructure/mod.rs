// Infrastructure adapters for the admission domain repositories

pub mod cache;
pub mod memory;
#[cfg(feature = "database")]
pub mod repositories;
