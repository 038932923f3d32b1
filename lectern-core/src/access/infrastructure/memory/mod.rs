//! Process-local implementations of the repository traits.
//!
//! Used by tests and single-node deployments without a database. The device
//! registry still honours the atomic admission contract.

mod account_directory;
mod device_registry;
mod enrollment_store;
mod media_catalog;

pub use account_directory::InMemoryAccountDirectory;
pub use device_registry::InMemoryDeviceRegistry;
pub use enrollment_store::InMemoryEnrollmentStore;
pub use media_catalog::InMemoryMediaCatalog;
