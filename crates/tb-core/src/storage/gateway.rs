//! Mapping of block sets and options onto storage keys.

use serde_json::{json, Value};

use super::{Items, LoadError, StorageArea, StorageError};
use crate::block_set::BlockSet;
use crate::codec::{compress, decompress};
use crate::schema::{parse_general_options, GeneralOptionsData};
use crate::types::BlockSetId;

// =============================================================================
// Keys
// =============================================================================

/// Ordered list of block set ids.
pub const BLOCK_SET_IDS_KEY: &str = "blockSetIds";
/// Elapsed time array indexed by block set id.
pub const BLOCK_SETS_TIME_ELAPSED_KEY: &str = "blockSetsTimeElapsed";
pub const GENERAL_OPTIONS_KEY: &str = "generalOptions";

/// Storage key of one block set's data.
pub fn block_set_key(id: BlockSetId) -> String {
    format!("blockSet_{id}")
}

/// Largest block set id accepted from storage. Ids are allocated smallest
/// free first, and the elapsed array is indexed by id.
pub const MAX_BLOCK_SET_ID: BlockSetId = 4095;

/// Quotes and colon the backend counts on top of key and value.
const ITEM_OVERHEAD: usize = 2;

// =============================================================================
// Gateway
// =============================================================================

/// Persistence gateway over one storage area.
pub struct BrowserStorage {
    area: Box<dyn StorageArea>,
}

impl std::fmt::Debug for BrowserStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserStorage")
            .field("quota_bytes_per_item", &self.area.quota_bytes_per_item())
            .finish_non_exhaustive()
    }
}

impl BrowserStorage {
    /// Use `sync` when `prefer_sync` is set, `local` otherwise.
    pub fn new<S, L>(prefer_sync: bool, sync: S, local: L) -> Self
    where
        S: StorageArea + 'static,
        L: StorageArea + 'static,
    {
        if prefer_sync {
            Self::with_area(sync)
        } else {
            Self::with_area(local)
        }
    }

    pub fn with_area<A: StorageArea + 'static>(area: A) -> Self {
        Self { area: Box::new(area) }
    }

    async fn get_one(&self, key: &str, default: Value) -> Result<Value, StorageError> {
        let mut keys = Items::new();
        keys.insert(key.to_string(), default.clone());
        let mut items = self.area.get(keys).await?;
        Ok(items.remove(key).unwrap_or(default))
    }

    async fn write(&self, items: Items) -> Result<(), StorageError> {
        log::debug!("Writing keys {:?}", items.keys().collect::<Vec<_>>());
        self.area.set(items).await.map_err(StorageError::from)
    }

    /// Compress a block set's data and check it against the item quota.
    fn encode(&self, block_set: &BlockSet) -> Result<(String, Value), StorageError> {
        let key = block_set_key(block_set.id());
        let compressed = compress(&block_set.data().to_value()).map_err(|e| StorageError::Encode {
            key: key.clone(),
            message: e.to_string(),
        })?;

        if let Some(quota) = self.area.quota_bytes_per_item() {
            let size = key.len() + compressed.len() + ITEM_OVERHEAD;
            if size > quota {
                return Err(StorageError::TooLarge { key, size, quota });
            }
        }
        Ok((key, Value::String(compressed)))
    }

    // -------------------------------------------------------------------------
    // Block Sets
    // -------------------------------------------------------------------------

    /// Load every stored block set.
    ///
    /// The outer error covers the id list. A malformed elapsed array is
    /// logged and read as all zeros. Each entry is decompressed and parsed on
    /// its own, so one corrupt entry only yields its own [`LoadError`].
    pub async fn load_block_sets(&self) -> Result<Vec<Result<BlockSet, LoadError>>, StorageError> {
        let ids = parse_ids(&self.get_one(BLOCK_SET_IDS_KEY, json!([])).await?)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.get_one(BLOCK_SETS_TIME_ELAPSED_KEY, json!([])).await?;
        let elapsed = match elapsed {
            Value::Array(items) => items,
            other => {
                log::warn!("Ignoring {BLOCK_SETS_TIME_ELAPSED_KEY}, not an array: {other}");
                Vec::new()
            }
        };

        let keys: Items = ids.iter().map(|id| (block_set_key(*id), Value::Null)).collect();
        let mut stored = self.area.get(keys).await?;
        log::debug!("Loaded {} block set entries", ids.len());

        Ok(ids
            .into_iter()
            .map(|id| {
                let raw = stored.remove(&block_set_key(id)).unwrap_or(Value::Null);
                load_entry(id, raw, elapsed_at(&elapsed, id))
            })
            .collect())
    }

    /// Write a new block set together with the id list and elapsed array of
    /// `ordered`, the complete collection including it.
    pub async fn save_new_block_set(
        &self,
        block_set: &BlockSet,
        ordered: &[&BlockSet],
    ) -> Result<(), StorageError> {
        let (key, data) = self.encode(block_set)?;
        let mut items = collection_items(ordered);
        items.insert(key, data);
        self.write(items).await
    }

    /// Write only the data of an existing block set.
    pub async fn save_block_set(&self, block_set: &BlockSet) -> Result<(), StorageError> {
        let (key, data) = self.encode(block_set)?;
        let mut items = Items::new();
        items.insert(key, data);
        self.write(items).await
    }

    /// Remove a block set, rewriting id list and elapsed array from `remaining`.
    pub async fn delete_block_set(
        &self,
        id: BlockSetId,
        remaining: &[&BlockSet],
    ) -> Result<(), StorageError> {
        let mut items = collection_items(remaining);
        items.insert(block_set_key(id), Value::Null);
        self.write(items).await
    }

    pub async fn save_block_set_ids(&self, ordered: &[&BlockSet]) -> Result<(), StorageError> {
        let mut items = Items::new();
        items.insert(BLOCK_SET_IDS_KEY.to_string(), ids_value(ordered));
        self.write(items).await
    }

    pub async fn save_time_elapsed(&self, ordered: &[&BlockSet]) -> Result<(), StorageError> {
        let mut items = Items::new();
        items.insert(BLOCK_SETS_TIME_ELAPSED_KEY.to_string(), time_elapsed_value(ordered));
        self.write(items).await
    }

    // -------------------------------------------------------------------------
    // General Options
    // -------------------------------------------------------------------------

    /// Load general options. Missing or unreadable options yield defaults.
    pub async fn load_general_options(&self) -> Result<GeneralOptionsData, StorageError> {
        let raw = self.get_one(GENERAL_OPTIONS_KEY, Value::Null).await?;
        if raw.is_null() {
            return Ok(GeneralOptionsData::default());
        }
        Ok(parse_general_options(Some(&raw)).unwrap_or_else(|e| {
            log::warn!("Using default general options, stored ones are unreadable: {e}");
            GeneralOptionsData::default()
        }))
    }

    pub async fn save_general_options(&self, options: &GeneralOptionsData) -> Result<(), StorageError> {
        let mut items = Items::new();
        items.insert(GENERAL_OPTIONS_KEY.to_string(), options.to_value());
        self.write(items).await
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn load_entry(id: BlockSetId, raw: Value, time_elapsed: u64) -> Result<BlockSet, LoadError> {
    let value = match raw {
        Value::String(encoded) => {
            decompress(&encoded).map_err(|source| LoadError::Decompress { id, source })?
        }
        other => other,
    };
    BlockSet::create(id, Some(&value), time_elapsed).map_err(|source| LoadError::Parse { id, source })
}

/// Ids above [`MAX_BLOCK_SET_ID`] are logged and dropped.
fn parse_ids(value: &Value) -> Result<Vec<BlockSetId>, StorageError> {
    let malformed = || StorageError::Malformed(format!("{BLOCK_SET_IDS_KEY}: {value}"));
    let mut ids = Vec::new();
    for id in value.as_array().ok_or_else(malformed)? {
        let id = id.as_u64().ok_or_else(malformed)?;
        match BlockSetId::try_from(id) {
            Ok(id) if id <= MAX_BLOCK_SET_ID => ids.push(id),
            _ => log::warn!("Dropping block set id {id}, above {MAX_BLOCK_SET_ID}"),
        }
    }
    Ok(ids)
}

fn elapsed_at(elapsed: &[Value], id: BlockSetId) -> u64 {
    elapsed
        .get(id as usize)
        .and_then(|value| {
            value
                .as_u64()
                .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        })
        .unwrap_or(0)
}

fn ids_value(ordered: &[&BlockSet]) -> Value {
    Value::Array(ordered.iter().map(|bs| json!(bs.id())).collect())
}

fn time_elapsed_value(ordered: &[&BlockSet]) -> Value {
    let len = ordered.iter().map(|bs| bs.id() as usize + 1).max().unwrap_or(0);
    let mut elapsed = vec![Value::Null; len];
    for bs in ordered {
        elapsed[bs.id() as usize] = json!(bs.time_elapsed());
    }
    Value::Array(elapsed)
}

fn collection_items(ordered: &[&BlockSet]) -> Items {
    let mut items = Items::new();
    items.insert(BLOCK_SET_IDS_KEY.to_string(), ids_value(ordered));
    items.insert(BLOCK_SETS_TIME_ELAPSED_KEY.to_string(), time_elapsed_value(ordered));
    items
}
