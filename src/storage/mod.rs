//! Persistence backend selection
//!
//! Postgres when a database URL is configured, in-memory otherwise.

pub mod postgres;

pub use postgres::PostgresStore;

use crate::cache::{InMemoryKvBackend, KvBackend};
use crate::conversation::{ContextBackend, InMemoryContextBackend};
use crate::leaderboard::{InMemoryScoreBackend, ScoreBackend};
use std::sync::Arc;
use tracing::{info, warn};

/// The three capabilities the core persists through.
#[derive(Clone)]
pub struct Backends {
    pub kv: Arc<dyn KvBackend>,
    pub contexts: Arc<dyn ContextBackend>,
    pub scores: Arc<dyn ScoreBackend>,
    pub kind: BackendKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    InMemory,
    Postgres,
}

impl Backends {
    pub fn in_memory() -> Self {
        Self {
            kv: Arc::new(InMemoryKvBackend::new()),
            contexts: Arc::new(InMemoryContextBackend::new()),
            scores: Arc::new(InMemoryScoreBackend::new()),
            kind: BackendKind::InMemory,
        }
    }

    pub fn postgres(store: PostgresStore) -> Self {
        let store = Arc::new(store);
        Self {
            kv: store.clone(),
            contexts: store.clone(),
            scores: store,
            kind: BackendKind::Postgres,
        }
    }
}

pub fn build_backends(database_url: Option<&str>) -> Backends {
    if let Some(url) = database_url {
        match PostgresStore::connect_lazy(url) {
            Ok(store) => {
                info!("Storage backend: postgres");
                return Backends::postgres(store);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres backend, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Storage backend: in-memory");
    Backends::in_memory()
}
