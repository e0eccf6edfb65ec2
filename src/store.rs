//! Optional persistence for weather documents
//!
//! Documents are appended to an embedded fjall keyspace and only ever read
//! back as "the most recent one". When no store path is configured the sink
//! is disabled: appends do nothing and reads report that persistence is off.

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use fjall::Keyspace;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task;
use tracing::{debug, error, info, instrument};

use crate::config::StoreConfig;
use crate::models::WeatherDocument;
use crate::{RelayError, Result};

const DOCUMENT_PREFIX: &str = "doc:";
const LATEST_KEY: &[u8] = b"meta:latest";

/// A document as read back from a store, with its store-assigned id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredDocument {
    pub id: u64,
    pub document: WeatherDocument,
}

/// Append-only document storage
#[async_trait]
pub trait DocumentStore: Send + Sync + Debug {
    /// Append a document, returning its id
    async fn insert(&self, document: &WeatherDocument) -> Result<u64>;

    /// Most recently inserted document
    async fn latest(&self) -> Result<Option<StoredDocument>>;
}

/// Result of reading the newest document through a [`DocumentSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum Latest {
    NotConfigured,
    Empty,
    Found(StoredDocument),
}

impl Latest {
    #[must_use]
    pub fn configured(&self) -> bool {
        !matches!(self, Latest::NotConfigured)
    }

    #[must_use]
    pub fn into_document(self) -> Option<StoredDocument> {
        match self {
            Latest::Found(stored) => Some(stored),
            Latest::NotConfigured | Latest::Empty => None,
        }
    }
}

#[derive(Debug, Clone)]
enum SinkState {
    Disabled,
    Connected(Arc<dyn DocumentStore>),
}

/// Process-wide handle to the optional store, shared by all handlers
#[derive(Debug, Clone)]
pub struct DocumentSink {
    state: SinkState,
}

impl DocumentSink {
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            state: SinkState::Disabled,
        }
    }

    #[must_use]
    pub fn connected(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            state: SinkState::Connected(store),
        }
    }

    /// Open the configured store. A missing path, or a store that fails to
    /// open, leaves persistence disabled.
    pub fn open(config: &StoreConfig) -> Self {
        let Some(path) = config.path.as_deref() else {
            info!("No store path configured, persistence disabled");
            return Self::disabled();
        };

        match FjallStore::open(path, &config.namespace) {
            Ok(store) => {
                info!("Connected document store at {} ({})", path, config.namespace);
                Self::connected(Arc::new(store))
            }
            Err(e) => {
                error!("Store init error, persistence disabled: {}", e);
                Self::disabled()
            }
        }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        matches!(self.state, SinkState::Connected(_))
    }

    /// Best-effort append. Failures are logged and dropped.
    pub async fn append(&self, document: &WeatherDocument) {
        let SinkState::Connected(store) = &self.state else {
            return;
        };

        match store.insert(document).await {
            Ok(id) => debug!("Stored weather document {}", id),
            Err(e) => error!("Failed to store weather document: {}", e),
        }
    }

    pub async fn latest(&self) -> Result<Latest> {
        let SinkState::Connected(store) = &self.state else {
            return Ok(Latest::NotConfigured);
        };

        Ok(match store.latest().await? {
            Some(stored) => Latest::Found(stored),
            None => Latest::Empty,
        })
    }
}

/// [`DocumentStore`] on an embedded fjall database.
///
/// Documents live under zero-padded sequence keys; `meta:latest` holds the
/// newest sequence number and is written after the document itself.
pub struct FjallStore {
    store: Keyspace,
    append_lock: Mutex<()>,
}

impl Debug for FjallStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FjallStore").finish_non_exhaustive()
    }
}

fn document_key(id: u64) -> Vec<u8> {
    format!("{DOCUMENT_PREFIX}{id:020}").into_bytes()
}

fn read_latest_id(store: &Keyspace) -> Result<Option<u64>> {
    let Some(bytes) = store.get(LATEST_KEY)? else {
        return Ok(None);
    };
    let raw: [u8; 8] = bytes
        .to_vec()
        .try_into()
        .map_err(|_| RelayError::store("corrupt latest pointer"))?;
    Ok(Some(u64::from_be_bytes(raw)))
}

fn insert_blocking(store: &Keyspace, bytes: Vec<u8>) -> Result<u64> {
    let id = read_latest_id(store)?.map_or(1, |latest| latest + 1);
    store.insert(document_key(id), bytes)?;
    store.insert(LATEST_KEY.to_vec(), id.to_be_bytes().to_vec())?;
    Ok(id)
}

fn latest_blocking(store: &Keyspace) -> Result<Option<(u64, Vec<u8>)>> {
    let Some(id) = read_latest_id(store)? else {
        return Ok(None);
    };
    let bytes = store
        .get(document_key(id))?
        .ok_or_else(|| RelayError::store(format!("document {id} is missing")))?;
    Ok(Some((id, bytes.to_vec())))
}

fn join_error(err: task::JoinError) -> RelayError {
    RelayError::store(format!("store task failed: {err}"))
}

impl FjallStore {
    pub fn open(path: impl AsRef<Path>, namespace: &str) -> Result<Self> {
        let db = fjall::Database::builder(&path).open()?;
        let items = db.keyspace(namespace, fjall::KeyspaceCreateOptions::default)?;
        Ok(FjallStore {
            store: items,
            append_lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl DocumentStore for FjallStore {
    #[instrument(name = "store_insert", level = "debug", skip_all)]
    async fn insert(&self, document: &WeatherDocument) -> Result<u64> {
        let bytes = serde_json::to_vec(document)
            .map_err(|e| RelayError::store(format!("failed to encode document: {e}")))?;

        // Sequence allocation and the pointer update must not interleave
        let _guard = self.append_lock.lock().await;
        let store = self.store.clone();
        task::spawn_blocking(move || insert_blocking(&store, bytes))
            .await
            .map_err(join_error)?
    }

    #[instrument(name = "store_latest", level = "debug", skip_all)]
    async fn latest(&self) -> Result<Option<StoredDocument>> {
        let store = self.store.clone();
        let found = task::spawn_blocking(move || latest_blocking(&store))
            .await
            .map_err(join_error)??;

        let Some((id, bytes)) = found else {
            debug!("Store is empty");
            return Ok(None);
        };
        let document = serde_json::from_slice(&bytes)
            .map_err(|e| RelayError::store(format!("failed to decode document {id}: {e}")))?;
        Ok(Some(StoredDocument { id, document }))
    }
}
