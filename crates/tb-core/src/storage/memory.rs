//! In-memory storage area.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use serde_json::Value;

use super::{BackendError, Items, StorageArea};

#[derive(Debug, Default)]
struct Inner {
    items: Items,
    writes: usize,
    last_write: Option<Items>,
    fail_next_write: Option<String>,
}

/// [`StorageArea`] kept in memory.
///
/// Clones share the same contents, so a handle kept outside a
/// [`BrowserStorage`](super::BrowserStorage) observes every write.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Rc<RefCell<Inner>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Area that enforces a per-item quota like the extension's sync storage.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::default()
        }
    }

    /// Replace the contents without counting a write.
    pub fn load_items(&self, items: Items) {
        self.inner.borrow_mut().items = items;
    }

    pub fn items(&self) -> Items {
        self.inner.borrow().items.clone()
    }

    pub fn item(&self, key: &str) -> Option<Value> {
        self.inner.borrow().items.get(key).cloned()
    }

    /// Number of `set` calls, failed ones included.
    pub fn write_count(&self) -> usize {
        self.inner.borrow().writes
    }

    /// Items passed to the most recent successful `set`.
    pub fn last_write(&self) -> Option<Items> {
        self.inner.borrow().last_write.clone()
    }

    /// Make the next `set` fail with `message`.
    pub fn fail_next_write(&self, message: impl Into<String>) {
        self.inner.borrow_mut().fail_next_write = Some(message.into());
    }
}

#[async_trait(?Send)]
impl StorageArea for MemoryStorage {
    async fn get(&self, keys: Items) -> Result<Items, BackendError> {
        let inner = self.inner.borrow();
        Ok(keys
            .into_iter()
            .map(|(key, default)| {
                let value = inner.items.get(&key).cloned().unwrap_or(default);
                (key, value)
            })
            .collect())
    }

    async fn set(&self, items: Items) -> Result<(), BackendError> {
        let mut inner = self.inner.borrow_mut();
        inner.writes += 1;
        if let Some(message) = inner.fail_next_write.take() {
            return Err(BackendError::new(message));
        }

        for (key, value) in &items {
            if value.is_null() {
                inner.items.remove(key);
            } else {
                inner.items.insert(key.clone(), value.clone());
            }
        }
        inner.last_write = Some(items);
        Ok(())
    }

    fn quota_bytes_per_item(&self) -> Option<usize> {
        self.quota
    }
}
