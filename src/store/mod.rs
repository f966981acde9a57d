//! Durable-store collaborator for the engine.
//!
//! The engine snapshots its whole network into a small set of keyed blobs.
//! Two backends implement [`Durable`]:
//!
//! - [`MemStore`]: concurrent hashmap (DashMap), lost on process exit
//! - [`DurableStore`]: ACID transactions in a redb file
//!
//! Both commit a batch of writes atomically.

pub mod durable;
pub mod mem;

use crate::error::StoreError;

pub use durable::DurableStore;
pub use mem::MemStore;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Key of the format version blob.
pub const VERSION_KEY: &[u8] = b"kb:version";
/// Key of the serialized network.
pub const STATE_KEY: &[u8] = b"kb:state";
/// Current snapshot format.
pub const FORMAT_VERSION: u32 = 1;

/// Keyed blob storage with atomic multi-key commits.
pub trait Durable: Send + Sync + std::fmt::Debug {
    /// Read a value. `Ok(None)` if the key was never written.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Write every pair in one transaction: all or nothing.
    fn commit(&self, batch: &[(&[u8], &[u8])]) -> StoreResult<()>;

    /// Whether the store outlives the process.
    fn is_persistent(&self) -> bool;
}
