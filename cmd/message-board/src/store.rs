//! Picks the store adapter the settings ask for.

use std::sync::Arc;

use configs::{StorageBackend, StorageLayout, StorageSettings};
use domains::{DocumentStore, StoreError, StoreLayout, StoreResult};
use storage_adapters::MemoryStore;

/// Builds the configured adapter.
///
/// Connections are opened lazily; nothing touches the network here.
pub fn open(settings: &StorageSettings) -> StoreResult<Arc<dyn DocumentStore>> {
    match settings.backend {
        StorageBackend::Memory => {
            let layout = match settings.layout {
                StorageLayout::Shared => StoreLayout::SharedTable,
                StorageLayout::Container => StoreLayout::ContainerPerBoard,
            };
            let store = MemoryStore::new(layout);
            let store = if settings.transactions {
                store
            } else {
                store.without_transactions()
            };
            tracing::info!(?layout, transactions = settings.transactions, "using in-memory store");
            Ok(Arc::new(store))
        }
        #[cfg(feature = "db-postgres")]
        StorageBackend::Postgres => {
            let url = settings
                .database_url
                .as_ref()
                .ok_or_else(|| StoreError::Connection("no database_url configured".into()))?;
            tracing::info!(max_connections = settings.max_connections, "using postgres store");
            Ok(Arc::new(storage_adapters::PostgresStore::connect_lazy(
                url,
                settings.max_connections,
            )?))
        }
        #[cfg(not(feature = "db-postgres"))]
        StorageBackend::Postgres => Err(StoreError::Unsupported(
            "postgres backend (build with the db-postgres feature)",
        )),
    }
}
