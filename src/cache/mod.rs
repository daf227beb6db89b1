//! Fingerprinting and TTL caching of finished itineraries.

pub mod backend;
pub mod fingerprint;
pub mod store;

pub use backend::{CacheBackend, CacheEntry, RedisBackend};
pub use fingerprint::{fingerprint, Fingerprint};
pub use store::{CacheBackendKind, CacheStats, ItineraryCache};
