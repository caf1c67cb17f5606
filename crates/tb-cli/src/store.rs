//! JSON export of the extension's storage areas.
//!
//! The file holds `{ "sync": {...}, "local": {...} }`. Both areas are loaded
//! into memory, commands run against them and the file is rewritten after.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tb_core::storage::Items;
use tb_core::{BrowserStorage, MemoryStorage};

/// Per-item quota of the extension's sync storage.
pub const SYNC_QUOTA_BYTES_PER_ITEM: usize = 8192;

pub struct StorageFile {
    path: PathBuf,
    sync: MemoryStorage,
    local: MemoryStorage,
}

fn area_items(root: &Value, name: &str) -> Result<Items, String> {
    match root.get(name) {
        None | Some(Value::Null) => Ok(Items::new()),
        Some(Value::Object(items)) => Ok(items.clone()),
        Some(_) => Err(format!("Storage area '{name}' is not an object")),
    }
}

impl StorageFile {
    /// Open a storage file. A missing file starts out empty.
    pub fn open(path: &Path) -> Result<Self, String> {
        let root = if path.exists() {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
            serde_json::from_str(&text)
                .map_err(|e| format!("Invalid storage file '{}': {}", path.display(), e))?
        } else {
            tracing::info!("Storage file {} does not exist yet, starting empty", path.display());
            json!({})
        };

        let sync = MemoryStorage::with_quota(SYNC_QUOTA_BYTES_PER_ITEM);
        sync.load_items(area_items(&root, "sync")?);
        let local = MemoryStorage::new();
        local.load_items(area_items(&root, "local")?);

        Ok(Self {
            path: path.to_path_buf(),
            sync,
            local,
        })
    }

    pub fn gateway(&self, prefer_sync: bool) -> BrowserStorage {
        BrowserStorage::new(prefer_sync, self.sync.clone(), self.local.clone())
    }

    /// Number of writes issued against either area since opening.
    pub fn write_count(&self) -> usize {
        self.sync.write_count() + self.local.write_count()
    }

    /// Rewrite the file if anything was written.
    pub fn save(&self) -> Result<(), String> {
        if self.write_count() == 0 {
            return Ok(());
        }
        let root = json!({
            "sync": Value::Object(self.sync.items()),
            "local": Value::Object(self.local.items()),
        });
        let text = serde_json::to_string_pretty(&root)
            .map_err(|e| format!("Failed to serialize storage: {e}"))?;
        fs::write(&self.path, text)
            .map_err(|e| format!("Failed to write '{}': {}", self.path.display(), e))?;
        tracing::debug!("Saved {}", self.path.display());
        Ok(())
    }
}
