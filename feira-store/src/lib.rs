pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod memory;
pub mod order_repo;
pub mod party_repo;

pub use app_config::Config;
pub use catalog_repo::PgCatalog;
pub use database::DbClient;
pub use memory::MemStore;
pub use order_repo::PgOrderStore;
pub use party_repo::PgDirectory;

use feira_core::CoreError;

/// One translation point for driver failures; the taxonomy has no database
/// variant because callers can do nothing driver-specific about them.
pub(crate) fn db_error(err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "database operation failed");
    CoreError::Integrity("storage failure".into())
}
