//! On-disk derived-artifact cache.
//!
//! Stores transformed media under a hierarchically sharded directory tree so
//! that one `(owner, asset)` pair owns a single subtree. Entries are keyed by
//! [`Fingerprint`](crate::fingerprint::Fingerprint); deleting an asset
//! invalidates every variant ever derived from it in one subtree removal.
//!
//! The cache is strictly an optimization: every failure path degrades to a
//! miss or a swallowed warning, never to an error in the operation that
//! triggered it.

mod record;
mod store;

pub use record::{CacheEntry, RecordError};
pub use store::ArtifactCache;
