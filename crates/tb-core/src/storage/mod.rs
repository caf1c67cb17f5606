//! Key-Value Persistence
//!
//! Block sets and general options live in a flat key-value storage area
//! (the extension's `sync` or `local` storage). The area has a per-item byte
//! quota and a write-rate limit, and writes of several keys are not atomic.
//! [`BrowserStorage`] maps the model onto such an area; [`StorageArea`] is
//! the contract an area has to fulfil.

mod gateway;
mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::codec::DecompressError;
use crate::schema::ParseError;
use crate::types::BlockSetId;

pub use gateway::{
    block_set_key, BrowserStorage, BLOCK_SETS_TIME_ELAPSED_KEY, BLOCK_SET_IDS_KEY,
    GENERAL_OPTIONS_KEY, MAX_BLOCK_SET_ID,
};
pub use memory::MemoryStorage;

/// Key to value map used for reads and writes.
pub type Items = Map<String, Value>;

/// Marker a backend puts in its message when the write-rate limit is hit.
pub const MAX_WRITE_OPERATIONS: &str = "MAX_WRITE_OPERATIONS";

// =============================================================================
// Storage Area Contract
// =============================================================================

/// Rejection reported by a storage area.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// A flat key-value storage area.
#[async_trait(?Send)]
pub trait StorageArea {
    /// Read the given keys. Keys with no stored value resolve to the value
    /// supplied with them.
    async fn get(&self, keys: Items) -> Result<Items, BackendError>;

    /// Write all items. A `null` value clears the key.
    async fn set(&self, items: Items) -> Result<(), BackendError>;

    /// Largest allowed size of one item in bytes, `None` for no limit.
    fn quota_bytes_per_item(&self) -> Option<usize>;
}

// =============================================================================
// Errors
// =============================================================================

/// Error type for storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Item {key} is {size} bytes, over the {quota} byte quota")]
    TooLarge { key: String, size: usize, quota: usize },
    #[error("Too many write operations, try again later")]
    TooManyWrites,
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Malformed stored value: {0}")]
    Malformed(String),
    #[error("Failed to encode {key}: {message}")]
    Encode { key: String, message: String },
}

impl From<BackendError> for StorageError {
    fn from(err: BackendError) -> Self {
        if err.message.contains(MAX_WRITE_OPERATIONS) {
            Self::TooManyWrites
        } else {
            Self::Backend(err.message)
        }
    }
}

/// Error type for one block set entry that could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Block set {id}: can't decompress stored data: {source}")]
    Decompress {
        id: BlockSetId,
        #[source]
        source: DecompressError,
    },
    #[error("Block set {id}: {source}")]
    Parse {
        id: BlockSetId,
        #[source]
        source: ParseError,
    },
}

impl LoadError {
    pub fn id(&self) -> BlockSetId {
        match self {
            Self::Decompress { id, .. } | Self::Parse { id, .. } => *id,
        }
    }
}
