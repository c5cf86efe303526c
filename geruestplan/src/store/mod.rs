//! Ablage der Gebäudekontexte (Speicher oder PostgreSQL)

pub mod fingerprint;
pub mod pg;
pub mod pool;

pub use fingerprint::{context_fingerprint, fingerprint_hex};
pub use pg::PgContextStore;
pub use pool::{create_pool, test_connection, DatabaseConfig, SslMode};

use anyhow::Result;
use npk114::{BuildingContext, Footprint};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Gespeicherter Kontext mit dem Fingerabdruck seines Gebäudezustands
#[derive(Debug, Clone)]
pub struct StoredContext {
    pub context: BuildingContext,
    pub fingerprint: Option<Vec<u8>>,
}

/// Kontextablage mit austauschbarem Rückhalt
pub enum ContextRepository {
    /// Ablage im Speicher (Tests, Läufe ohne Datenbank)
    Memory(MemoryContextStore),
    /// PostgreSQL/PostGIS
    Postgres(PgContextStore),
}

impl ContextRepository {
    pub fn memory() -> Self {
        Self::Memory(MemoryContextStore::default())
    }

    /// Kontext zu einer EGID, `Ok(None)` wenn keiner gespeichert ist
    pub async fn get(&self, egid: &str) -> Result<Option<StoredContext>> {
        match self {
            Self::Memory(store) => Ok(store.get(egid).await),
            Self::Postgres(store) => store.get(egid).await,
        }
    }

    /// Speichert oder ersetzt den Kontext eines Gebäudes
    pub async fn save(
        &self,
        context: &BuildingContext,
        footprint: Option<&Footprint>,
        fingerprint: Option<[u8; 32]>,
    ) -> Result<()> {
        match self {
            Self::Memory(store) => {
                store.save(context, fingerprint).await;
                Ok(())
            }
            Self::Postgres(store) => store.save(context, footprint, fingerprint).await,
        }
    }

    /// Entfernt einen Kontext, true wenn einer vorhanden war
    pub async fn delete(&self, egid: &str) -> Result<bool> {
        match self {
            Self::Memory(store) => Ok(store.delete(egid).await),
            Self::Postgres(store) => store.delete(egid).await,
        }
    }
}

/// Kontextablage im Speicher
#[derive(Debug, Default)]
pub struct MemoryContextStore {
    contexts: RwLock<HashMap<String, StoredContext>>,
}

impl MemoryContextStore {
    pub async fn get(&self, egid: &str) -> Option<StoredContext> {
        self.contexts.read().await.get(egid).cloned()
    }

    pub async fn save(&self, context: &BuildingContext, fingerprint: Option<[u8; 32]>) {
        self.contexts.write().await.insert(
            context.egid.clone(),
            StoredContext {
                context: context.clone(),
                fingerprint: fingerprint.map(|f| f.to_vec()),
            },
        );
    }

    pub async fn delete(&self, egid: &str) -> bool {
        self.contexts.write().await.remove(egid).is_some()
    }
}
