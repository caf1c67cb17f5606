//! Block Set Collection
//!
//! [`BlockSets`] owns every block set in display order and is the only place
//! ids are minted. Operations that add or remove block sets write to storage
//! first and change memory only after the write succeeded, so a failed write
//! leaves the collection as it was.

use std::collections::HashMap;

use chrono::{DateTime, Local, TimeZone};

use crate::block_set::{ms_since_midnight, weekday_index, BlockSet};
use crate::schema::{BlockSetData, DEFAULT_NAME};
use crate::storage::{BrowserStorage, StorageError};
use crate::types::{BlockSetId, TestResult};

/// Error type for collection operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectionError {
    #[error("No block set with id {0}")]
    NotFound(BlockSetId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct BlockSets {
    storage: BrowserStorage,
    order: Vec<BlockSetId>,
    map: HashMap<BlockSetId, BlockSet>,
}

impl std::fmt::Debug for BlockSets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockSets")
            .field("order", &self.order)
            .field("storage", &self.storage)
            .finish()
    }
}

impl BlockSets {
    /// Load the collection from storage.
    ///
    /// Entries that fail to load are logged and dropped. When nothing is
    /// left, one default block set is created and persisted.
    pub async fn create(storage: BrowserStorage) -> Result<Self, StorageError> {
        let loaded = storage.load_block_sets().await?;
        let mut block_sets = Self {
            storage,
            order: Vec::with_capacity(loaded.len()),
            map: HashMap::with_capacity(loaded.len()),
        };

        for entry in loaded {
            match entry {
                Ok(block_set) if block_sets.map.contains_key(&block_set.id()) => {
                    log::warn!("Dropping block set with duplicate id {}", block_set.id());
                }
                Ok(block_set) => {
                    block_sets.order.push(block_set.id());
                    block_sets.map.insert(block_set.id(), block_set);
                }
                Err(e) => log::warn!("Dropping block set that failed to load: {e}"),
            }
        }

        if block_sets.is_empty() {
            block_sets.add_default_block_set().await?;
        }
        log::debug!("Loaded {} block sets", block_sets.len());
        Ok(block_sets)
    }

    // ===== Accessors =====

    pub fn storage(&self) -> &BrowserStorage {
        &self.storage
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Ids in display order.
    pub fn ids(&self) -> &[BlockSetId] {
        &self.order
    }

    pub fn get(&self, id: BlockSetId) -> Option<&BlockSet> {
        self.map.get(&id)
    }

    /// Mutable access for setters. Call [`BlockSets::save_block_set`] to
    /// persist the result.
    pub fn get_mut(&mut self, id: BlockSetId) -> Option<&mut BlockSet> {
        self.map.get_mut(&id)
    }

    /// Block sets in display order.
    pub fn iter(&self) -> impl Iterator<Item = &BlockSet> + '_ {
        self.order.iter().filter_map(|id| self.map.get(id))
    }

    fn ordered(&self) -> Vec<&BlockSet> {
        self.iter().collect()
    }

    // ===== Adding and Removing =====

    /// Smallest id not in use.
    fn next_free_id(&self) -> BlockSetId {
        let mut id = 0;
        while self.map.contains_key(&id) {
            id += 1;
        }
        id
    }

    /// Persist a new block set, then append it.
    async fn insert(&mut self, block_set: BlockSet) -> Result<BlockSetId, StorageError> {
        let id = block_set.id();
        {
            let mut ordered = self.ordered();
            ordered.push(&block_set);
            self.storage.save_new_block_set(&block_set, &ordered).await?;
        }
        self.order.push(id);
        self.map.insert(id, block_set);
        Ok(id)
    }

    pub async fn add_default_block_set(&mut self) -> Result<BlockSetId, StorageError> {
        let data = BlockSetData {
            name: default_name(self.iter().map(BlockSet::name)),
            ..BlockSetData::default()
        };
        let id = self.next_free_id();
        self.insert(BlockSet::from_data(id, data, 0)).await?;
        log::info!("Added block set {id}");
        Ok(id)
    }

    /// Copy the data of `source_id` into a new block set with zero elapsed time.
    pub async fn add_block_set_copy(&mut self, source_id: BlockSetId) -> Result<BlockSetId, CollectionError> {
        let source = self.get(source_id).ok_or(CollectionError::NotFound(source_id))?;
        let mut data = source.data().clone();
        data.name = copy_name(&data.name);

        let id = self.next_free_id();
        self.insert(BlockSet::from_data(id, data, 0)).await?;
        log::info!("Copied block set {source_id} into {id}");
        Ok(id)
    }

    pub async fn delete_block_set(&mut self, id: BlockSetId) -> Result<(), CollectionError> {
        if !self.map.contains_key(&id) {
            return Err(CollectionError::NotFound(id));
        }
        {
            let remaining: Vec<&BlockSet> = self.iter().filter(|bs| bs.id() != id).collect();
            self.storage.delete_block_set(id, &remaining).await?;
        }
        self.order.retain(|other| *other != id);
        self.map.remove(&id);
        log::info!("Deleted block set {id}");
        Ok(())
    }

    /// Move a block set to `new_index` in display order, clamped to the end.
    pub async fn move_block_set(&mut self, id: BlockSetId, new_index: usize) -> Result<(), CollectionError> {
        let from = self
            .order
            .iter()
            .position(|other| *other == id)
            .ok_or(CollectionError::NotFound(id))?;

        let mut order = self.order.clone();
        order.remove(from);
        order.insert(new_index.min(order.len()), id);

        {
            let ordered: Vec<&BlockSet> = order.iter().filter_map(|id| self.map.get(id)).collect();
            self.storage.save_block_set_ids(&ordered).await?;
        }
        self.order = order;
        Ok(())
    }

    // ===== Persistence =====

    /// Persist the data of a block set after it was changed through
    /// [`BlockSets::get_mut`].
    pub async fn save_block_set(&self, id: BlockSetId) -> Result<(), CollectionError> {
        let block_set = self.get(id).ok_or(CollectionError::NotFound(id))?;
        self.storage.save_block_set(block_set).await?;
        Ok(())
    }

    /// Persist the elapsed time of every block set.
    pub async fn save_time_elapsed(&self) -> Result<(), StorageError> {
        self.storage.save_time_elapsed(&self.ordered()).await
    }

    /// Apply due daily resets.
    ///
    /// The reset block sets and the elapsed array are written first; memory
    /// only changes once every write succeeded. Returns the ids that were
    /// reset.
    pub async fn reset_due_block_sets<Tz: TimeZone>(
        &mut self,
        now: &DateTime<Tz>,
    ) -> Result<Vec<BlockSetId>, StorageError> {
        let now_ms = now.timestamp_millis().max(0) as u64;
        let staged: HashMap<BlockSetId, BlockSet> = self
            .iter()
            .filter(|bs| bs.is_reset_due(now))
            .map(|bs| {
                let mut data = bs.data().clone();
                data.last_reset = now_ms;
                (bs.id(), BlockSet::from_data(bs.id(), data, 0))
            })
            .collect();
        if staged.is_empty() {
            return Ok(Vec::new());
        }

        {
            let ordered: Vec<&BlockSet> = self
                .order
                .iter()
                .filter_map(|id| staged.get(id).or_else(|| self.map.get(id)))
                .collect();
            for block_set in &ordered {
                if staged.contains_key(&block_set.id()) {
                    self.storage.save_block_set(block_set).await?;
                }
            }
            self.storage.save_time_elapsed(&ordered).await?;
        }

        let mut reset = Vec::with_capacity(staged.len());
        for id in &self.order {
            if let Some(block_set) = self.map.get_mut(id) {
                if staged.contains_key(id) {
                    block_set.set_time_elapsed(0);
                    block_set.set_last_reset(now_ms);
                    reset.push(*id);
                }
            }
        }
        log::info!("Reset elapsed time of block sets {reset:?}");
        Ok(reset)
    }

    // ===== Queries =====

    /// Ids of the block sets that want to block a request right now.
    pub fn blocked_by(&self, url: &str, channel_id: Option<&str>, category_id: Option<&str>) -> Vec<BlockSetId> {
        self.blocked_by_at(&Local::now(), url, channel_id, category_id)
    }

    /// Ids of the block sets that want to block a request at `now`.
    ///
    /// Block sets outside their active days or active time are skipped; the
    /// rest count when their rules blacklist the request. Ids follow display
    /// order.
    pub fn blocked_by_at<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        url: &str,
        channel_id: Option<&str>,
        category_id: Option<&str>,
    ) -> Vec<BlockSetId> {
        let day = weekday_index(now);
        let time = ms_since_midnight(now);

        self.iter()
            .filter(|bs| bs.is_in_active_weekday(day) && bs.is_in_active_time(time))
            .filter(|bs| bs.test(url, channel_id, category_id) == TestResult::Blacklisted)
            .map(BlockSet::id)
            .collect()
    }
}

// ===== Names =====

/// Parse a run of ASCII digits.
fn parse_number(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `"Block Set {n}"` with `n` one above the largest number already used in
/// a name of exactly that form.
pub fn default_name<'a>(existing: impl IntoIterator<Item = &'a str>) -> String {
    let prefix = format!("{DEFAULT_NAME} ");
    let largest = existing
        .into_iter()
        .filter_map(|name| name.strip_prefix(prefix.as_str()).and_then(parse_number))
        .max()
        .unwrap_or(0);
    format!("{prefix}{}", largest.saturating_add(1))
}

/// Name of a copy: `X` becomes `X (copy)`, then `X (copy2x)`, `X (copy3x)`...
pub fn copy_name(name: &str) -> String {
    if let Some(base) = name.strip_suffix("(copy)") {
        return format!("{base}(copy2x)");
    }
    if let Some(rest) = name.strip_suffix("x)") {
        if let Some(start) = rest.rfind("(copy") {
            if let Some(n) = parse_number(&rest[start + "(copy".len()..]) {
                return format!("{}(copy{}x)", &rest[..start], n.saturating_add(1));
            }
        }
    }
    format!("{name} (copy)")
}
