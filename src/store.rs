//! Key-value persistence shared by the session core and the preference layer.
//!
//! Every key holds one complete JSON document. Writers always replace the whole
//! value, so two foreground writers can only ever race to last-write-wins.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::warn;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};

/// Logical persisted keys.
pub mod keys {
    pub const TIMER_SETTINGS: &str = "timer-settings";
    pub const PROGRESS: &str = "progress";
    pub const SESSION: &str = "session";
    pub const AMBIENT_SOUND: &str = "ambient-sound";
    pub const VOLUME: &str = "volume";
    pub const MUTED: &str = "muted";
    pub const THEME: &str = "theme";
    pub const CURRENT_TASK: &str = "current-task";
    pub const LAST_UPDATE_CHECK: &str = "last-update-check";
    pub const HAS_SEEN_SHORTCUTS: &str = "has-seen-shortcuts";
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: String) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Reads and decodes `key`. A value that no longer decodes is treated as absent
/// so a schema change never blocks startup.
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            warn!("Discarding unreadable value for '{key}': {err}");
            Ok(None)
        }
    }
}

pub async fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let serialized =
        serde_json::to_string(value).with_context(|| format!("failed to encode '{key}'"))?;
    store
        .put(key, serialized)
        .await
        .with_context(|| format!("failed to persist '{key}'"))
}

/// In-process store used by tests and as a fallback when no database can be opened.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail, emulating an exhausted storage quota.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent read fail, emulating storage that is unavailable.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("storage unavailable"));
        }
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("storage quota exceeded"));
        }
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("storage quota exceeded"));
        }
        self.entries.lock().remove(key);
        Ok(())
    }
}
