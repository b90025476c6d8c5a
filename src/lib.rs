//! Thin accessor over a Redis server connection with prefix-based key
//! helpers.
//!
//! Wraps an established multiplexed connection, lazily resolves a server
//! handle from its first endpoint, and exposes convenience methods to scan,
//! fetch, and delete keys sharing a prefix. Connection management, retries,
//! and timeouts stay with the underlying `redis` client.

pub mod client;
pub mod connection;
pub mod error;
pub mod keys;
pub mod store;

pub use client::{RemoveOutcome, ServerClient};
pub use connection::{
    Connection, ConnectionProvider, Endpoint, RedisConnectionProvider, Server,
};
pub use error::Error;
pub use store::{RedisValueStore, ValueStore};
