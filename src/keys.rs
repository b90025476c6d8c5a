//! Cache key composition.

/// Separator between a cache key and its entry prefix. Reserved: neither
/// part should contain it.
pub const SEPARATOR: char = ':';

/// Compose the storage key for one entry: `<cache_key>:<prefix>`.
pub fn build(cache_key: &str, prefix: &str) -> String {
    format!("{cache_key}{SEPARATOR}{prefix}")
}
