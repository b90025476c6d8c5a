use std::collections::HashMap;
use std::sync::Arc;

use async_stream::try_stream;
use futures_util::{Stream, TryStreamExt};
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;

use crate::connection::{ConnectionProvider, Server};
use crate::error::Error;
use crate::store::ValueStore;

/// Keys requested per SCAN round-trip unless overridden.
const DEFAULT_SCAN_COUNT: u32 = 100;

/// Result of a best-effort bulk removal. A failed deletion never aborts the
/// run; it is logged and counted here instead.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RemoveOutcome {
    pub removed: usize,
    pub failed: usize,
}

impl RemoveOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }

    pub fn attempted(&self) -> usize {
        self.removed + self.failed
    }
}

/// Accessor over one Redis server, resolved lazily from the first endpoint
/// of the multiplexed connection and cached for the client's lifetime.
///
/// Prefix operations match keys against `<prefix>*` on the resolved server
/// and go through the [`ValueStore`] collaborator for per-key reads and
/// deletes.
pub struct ServerClient {
    provider: Arc<dyn ConnectionProvider>,
    store: Arc<dyn ValueStore>,
    server: OnceCell<Arc<dyn Server>>,
    scan_count: u32,
}

impl ServerClient {
    pub fn new(provider: Arc<dyn ConnectionProvider>, store: Arc<dyn ValueStore>) -> Self {
        Self {
            provider,
            store,
            server: OnceCell::new(),
            scan_count: DEFAULT_SCAN_COUNT,
        }
    }

    /// Connect to a single Redis URL and build a client with the default
    /// redis-backed provider and store sharing one multiplexed connection.
    pub async fn open(url_str: &str) -> Result<Self, Error> {
        let provider = crate::connection::RedisConnectionProvider::connect(url_str).await?;
        let store = crate::store::RedisValueStore::new(provider.conn());
        Ok(Self::new(Arc::new(provider), Arc::new(store)))
    }

    pub fn with_scan_count(mut self, scan_count: u32) -> Self {
        self.scan_count = scan_count;
        self
    }

    /// Resolve the server handle, initializing it on first use.
    ///
    /// Initialization is single-flight: concurrent first callers share one
    /// creation routine and observe the same handle. A failed initialization
    /// is not cached; the next call retries.
    pub async fn resolve(&self) -> Result<Arc<dyn Server>, Error> {
        self.server
            .get_or_try_init(|| self.create_server())
            .await
            .cloned()
    }

    async fn create_server(&self) -> Result<Arc<dyn Server>, Error> {
        tracing::debug!("building server handle from multiplexed connection");

        let conn = self.provider.get().await?;
        let endpoints = conn.endpoints();

        // The connection should always know at least one endpoint; fail
        // loudly if it does not.
        let Some(first) = endpoints.first() else {
            return Err(Error::NoEndpoints);
        };

        conn.server(first)
    }

    /// Drop the cached server handle. Idempotent; a later `resolve`
    /// initializes a fresh handle.
    pub fn dispose(&mut self) {
        if self.server.take().is_some() {
            tracing::debug!("released cached server handle");
        }
    }

    fn validate_prefix(prefix: &str) -> Result<(), Error> {
        if prefix.contains('\0') {
            return Err(Error::InvalidPattern(
                "prefix must not contain null bytes".to_string(),
            ));
        }
        Ok(())
    }

    /// Lazily scan keys matching `<prefix>*` in server cursor order.
    ///
    /// The stream is forward-only and may be abandoned mid-way. A resolve
    /// failure surfaces as the first item's error rather than an empty
    /// stream.
    pub fn scan_keys_by_prefix(
        &self,
        prefix: &str,
    ) -> impl Stream<Item = Result<String, Error>> + '_ {
        let validation = Self::validate_prefix(prefix);
        let pattern = format!("{prefix}*");
        let count = self.scan_count;

        try_stream! {
            validation?;
            let server = self.resolve().await?;

            let mut cursor: u64 = 0;
            loop {
                let (next_cursor, batch) = server.scan_page(&pattern, cursor, count).await?;
                for key in batch {
                    yield key;
                }
                cursor = next_cursor;
                if cursor == 0 {
                    break;
                }
            }
        }
    }

    /// Drain the prefix scan into a list. Zero matches is `Ok(vec![])`,
    /// never an error.
    pub async fn collect_keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>, Error> {
        self.scan_keys_by_prefix(prefix).try_collect().await
    }

    /// Fetch and JSON-decode the value of every key matching `<prefix>*`.
    /// Keys whose fetch returns nothing are omitted from the map.
    pub async fn fetch_values_by_prefix<T: DeserializeOwned>(
        &self,
        prefix: &str,
    ) -> Result<HashMap<String, T>, Error> {
        let keys = self.collect_keys_by_prefix(prefix).await?;

        let mut values = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(raw) = self.store.get_raw(&key).await? {
                let value = serde_json::from_str(&raw)?;
                values.insert(key, value);
            }
        }
        Ok(values)
    }

    /// Same as [`fetch_values_by_prefix`](Self::fetch_values_by_prefix) but
    /// returns raw strings without decoding.
    pub async fn fetch_raw_values_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<HashMap<String, String>, Error> {
        let keys = self.collect_keys_by_prefix(prefix).await?;

        let mut values = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(raw) = self.store.get_raw(&key).await? {
                values.insert(key, raw);
            }
        }
        Ok(values)
    }

    /// Fetch and JSON-decode one named hash field from every key matching
    /// `<prefix>*`. Missing keys and missing fields are omitted.
    pub async fn fetch_hash_field_by_prefix<T: DeserializeOwned>(
        &self,
        prefix: &str,
        field: &str,
    ) -> Result<HashMap<String, T>, Error> {
        let keys = self.collect_keys_by_prefix(prefix).await?;

        let mut values = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(raw) = self.store.get_hash_field_raw(&key, field).await? {
                let value = serde_json::from_str(&raw)?;
                values.insert(key, value);
            }
        }
        Ok(values)
    }

    /// Delete every key matching `<prefix>*`, best-effort. A failure on one
    /// key is logged and counted; the remaining keys are still attempted.
    /// An empty match set is an immediate no-op.
    pub async fn remove_by_prefix(
        &self,
        prefix: &str,
        fire_and_forget: bool,
    ) -> Result<RemoveOutcome, Error> {
        let keys = self.collect_keys_by_prefix(prefix).await?;

        let mut outcome = RemoveOutcome::default();
        if keys.is_empty() {
            return Ok(outcome);
        }

        for key in &keys {
            match self.store.remove(key, fire_and_forget).await {
                Ok(_) => outcome.removed += 1,
                Err(e) => {
                    tracing::warn!(error = %e, key, "failed to remove key, continuing");
                    outcome.failed += 1;
                }
            }
        }

        tracing::debug!(
            prefix,
            removed = outcome.removed,
            failed = outcome.failed,
            "prefix removal finished"
        );
        Ok(outcome)
    }

    /// FLUSHALL on the resolved server. Never propagates an error: failures
    /// (including a failed resolve) are logged and reported as `false`.
    pub async fn flush_all(&self) -> bool {
        let server = match self.resolve().await {
            Ok(server) => server,
            Err(e) => {
                tracing::warn!(error = %e, "flush skipped, could not resolve server");
                return false;
            }
        };

        match server.flush_all().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, endpoint = %server.endpoint(), "FLUSHALL failed");
                false
            }
        }
    }
}
