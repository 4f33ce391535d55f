//! Content hashing for cache invalidation and resource identity
//!
//! A 64-bit xxh3 digest over a resource's decoded payload. Two payloads with
//! equal hashes are treated as identical for caching purposes; collisions are
//! an accepted risk of the format, not defended against.

use xxhash_rust::xxh3::xxh3_64;

/// The "no expectation" sentinel. Callers that do not yet know a resource's
/// hash pass this to skip validation; see [`crate::cache::CacheStore`].
pub const NO_HASH: u64 = 0;

/// Compute the content hash of a byte buffer.
pub fn content_hash(data: &[u8]) -> u64 {
    xxh3_64(data)
}

/// Compute the content hash of several buffers as if concatenated.
///
/// Used by loaders whose decoded payload lives in more than one allocation
/// (e.g. mesh vertices + indices) without copying into a scratch buffer.
pub fn content_hash_parts(parts: &[&[u8]]) -> u64 {
    let mut hasher = xxhash_rust::xxh3::Xxh3::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.digest()
}
