use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Error;

/// One Redis node, identified as `host:port` (with the database suffix when
/// it is not 0, e.g. `127.0.0.1:6379/15`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Derive an endpoint from a Redis URL. Example:
    /// `redis://127.0.0.1:6379/2` becomes `127.0.0.1:6379/2`. Host-less
    /// URLs (e.g. `redis+unix:` schemes) yield `None`.
    pub fn from_url(url_str: &str) -> Option<Self> {
        let parsed = url::Url::parse(url_str).ok()?;
        let host = parsed.host_str()?;
        let port = parsed.port().unwrap_or(6379);
        let db = parsed.path().trim_start_matches('/');
        if db.is_empty() || db == "0" {
            Some(Self(format!("{}:{}", host, port)))
        } else {
            Some(Self(format!("{}:{}/{}", host, port, db)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supplies the established multiplexed connection. Connectivity is owned
/// by the provider; this crate never reconnects on its own.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn get(&self) -> Result<Arc<dyn Connection>, Error>;
}

/// A live multiplexed connection: knows its endpoints and hands out
/// node-scoped server handles.
pub trait Connection: Send + Sync {
    fn endpoints(&self) -> Vec<Endpoint>;
    fn server(&self, endpoint: &Endpoint) -> Result<Arc<dyn Server>, Error>;
}

/// Node-scoped admin surface used for key enumeration and flushing.
#[async_trait]
pub trait Server: Send + Sync {
    fn endpoint(&self) -> &Endpoint;

    /// One SCAN round-trip: returns the next cursor and a batch of matching
    /// keys. A returned cursor of 0 means the scan is complete.
    async fn scan_page(
        &self,
        pattern: &str,
        cursor: u64,
        count: u32,
    ) -> Result<(u64, Vec<String>), Error>;

    async fn flush_all(&self) -> Result<(), Error>;
}

impl fmt::Debug for dyn Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("endpoint", self.endpoint())
            .finish_non_exhaustive()
    }
}

/// Default provider backed by the `redis` crate, wrapping one established
/// `ConnectionManager`.
pub struct RedisConnectionProvider {
    endpoint: Endpoint,
    conn: redis::aio::ConnectionManager,
}

impl RedisConnectionProvider {
    pub async fn connect(url_str: &str) -> Result<Self, Error> {
        let client = redis::Client::open(url_str)?;
        let endpoint =
            Endpoint::from_url(url_str).unwrap_or_else(|| Endpoint::new(url_str.to_string()));
        let conn = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self { endpoint, conn })
    }

    pub fn from_parts(endpoint: Endpoint, conn: redis::aio::ConnectionManager) -> Self {
        Self { endpoint, conn }
    }

    /// A clone of the underlying multiplexed connection, e.g. to build a
    /// [`crate::store::RedisValueStore`] sharing it.
    pub fn conn(&self) -> redis::aio::ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl ConnectionProvider for RedisConnectionProvider {
    async fn get(&self) -> Result<Arc<dyn Connection>, Error> {
        Ok(Arc::new(RedisConnection {
            endpoint: self.endpoint.clone(),
            conn: self.conn.clone(),
        }))
    }
}

pub struct RedisConnection {
    endpoint: Endpoint,
    conn: redis::aio::ConnectionManager,
}

impl RedisConnection {
    pub fn new(endpoint: Endpoint, conn: redis::aio::ConnectionManager) -> Self {
        Self { endpoint, conn }
    }
}

impl Connection for RedisConnection {
    fn endpoints(&self) -> Vec<Endpoint> {
        vec![self.endpoint.clone()]
    }

    fn server(&self, endpoint: &Endpoint) -> Result<Arc<dyn Server>, Error> {
        if *endpoint != self.endpoint {
            return Err(Error::UnknownEndpoint(endpoint.to_string()));
        }
        Ok(Arc::new(RedisServer {
            endpoint: self.endpoint.clone(),
            conn: self.conn.clone(),
        }))
    }
}

pub struct RedisServer {
    endpoint: Endpoint,
    conn: redis::aio::ConnectionManager,
}

#[async_trait]
impl Server for RedisServer {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn scan_page(
        &self,
        pattern: &str,
        cursor: u64,
        count: u32,
    ) -> Result<(u64, Vec<String>), Error> {
        let mut conn = self.conn.clone();
        let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        Ok((next_cursor, batch))
    }

    async fn flush_all(&self) -> Result<(), Error> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("FLUSHALL").query_async(&mut conn).await?;
        Ok(())
    }
}
