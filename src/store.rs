use async_trait::async_trait;

use crate::error::Error;

/// Value-level operations on individual keys. Raw strings cross this
/// boundary; typed decoding happens in [`crate::client::ServerClient`].
#[async_trait]
pub trait ValueStore: Send + Sync {
    /// GET. `None` when the key does not exist.
    async fn get_raw(&self, key: &str) -> Result<Option<String>, Error>;

    /// HGET of a single named field. `None` when the key or field is absent.
    async fn get_hash_field_raw(&self, key: &str, field: &str)
        -> Result<Option<String>, Error>;

    /// Delete one key. Returns whether the key existed. With
    /// `fire_and_forget`, deletion is issued as UNLINK so the server
    /// reclaims memory asynchronously.
    async fn remove(&self, key: &str, fire_and_forget: bool) -> Result<bool, Error>;
}

/// Default store backed by a cloned multiplexed connection.
pub struct RedisValueStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisValueStore {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ValueStore for RedisValueStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, Error> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn get_hash_field_raw(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<String>, Error> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("HGET")
            .arg(key)
            .arg(field)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn remove(&self, key: &str, fire_and_forget: bool) -> Result<bool, Error> {
        let mut conn = self.conn.clone();
        let command = if fire_and_forget { "UNLINK" } else { "DEL" };
        let removed: i64 = redis::cmd(command).arg(key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }
}
