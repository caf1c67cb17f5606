//! Timeblock Core Library
//!
//! This crate provides the engine behind Timeblock block sets: rule matching,
//! the daily time budget, and versioned persistence of block set data.
//!
//! # Architecture
//!
//! Saved block set data enters through [`schema`], which migrates any older
//! shape to the current one. A [`BlockSet`] owns one parsed configuration
//! together with the compiled form of its URL rules. [`BlockSets`] owns the
//! ordered collection, mints ids and talks to [`BrowserStorage`], which maps
//! the model onto a flat key-value storage area.
//!
//! # Modules
//!
//! - `block_set`: one block set, its compiled rules and time budget
//! - `block_sets`: the ordered collection and id allocation
//! - `codec`: compact string encoding for persisted payloads
//! - `events`: synchronous change notification channels
//! - `pattern`: wildcard pattern compilation
//! - `schema`: persisted shapes and version migration
//! - `storage`: key-value persistence gateway
//! - `types`: shared type definitions
//! - `url`: scheme handling for candidate URLs
//! - `youtube`: category table and channel-title lookup

pub mod block_set;
pub mod block_sets;
pub mod codec;
pub mod events;
pub mod pattern;
pub mod schema;
pub mod storage;
pub mod types;
pub mod url;
pub mod youtube;

// Re-export commonly used types
pub use block_set::{AddError, BlockSet, SetError};
pub use block_sets::{BlockSets, CollectionError};
pub use codec::{compress, decompress, CompressError, DecompressError};
pub use pattern::{pattern_to_regexp, url_to_pattern};
pub use schema::{
    parse_block_set_data, parse_general_options, BlockSetData, GeneralOptionsData, ParseError,
};
pub use storage::{BrowserStorage, LoadError, MemoryStorage, StorageArea, StorageError};
pub use types::{BlockSetId, ListType, TestResult, TimeState};
pub use youtube::{ChannelTitleFetcher, FetchError};
