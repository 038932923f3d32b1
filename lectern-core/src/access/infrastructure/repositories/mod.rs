// PostgreSQL implementations of the admission repositories

mod account_directory;
mod device_registry;
mod enrollment_store;
mod media_catalog;

pub use account_directory::PostgresAccountDirectory;
pub use device_registry::PostgresDeviceRegistry;
pub use enrollment_store::PostgresEnrollmentStore;
pub use media_catalog::PostgresMediaCatalog;
