//! Item persistence
//!
//! Items saved by handlers go through the processor chain and are appended
//! to the backup file as MessagePack records, one record per item.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Errors raised while saving or reading items
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("cannot encode item: {0}")]
    Encode(String),

    #[error("cannot decode item: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no backup file configured")]
    NoBackupFile,
}

impl From<rmp_serde::encode::Error> for ItemError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        ItemError::Encode(err.to_string())
    }
}

impl From<serde_json::Error> for ItemError {
    fn from(err: serde_json::Error) -> Self {
        ItemError::Encode(err.to_string())
    }
}

/// Transforms or rejects an item before it is persisted
///
/// Returning `None` rejects the item; later processors do not run.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process(&self, item: Value) -> Option<Value>;
}

#[async_trait]
impl<F> ItemProcessor for F
where
    F: Fn(Value) -> Option<Value> + Send + Sync + 'static,
{
    async fn process(&self, item: Value) -> Option<Value> {
        self(item)
    }
}

/// Capability handed to handlers for persisting items
///
/// Clones share the same processors, backup file and lock.
#[derive(Clone)]
pub struct ItemSaver {
    processors: Arc<Vec<Arc<dyn ItemProcessor>>>,
    backup: Option<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl ItemSaver {
    /// Creates a saver
    ///
    /// # Arguments
    ///
    /// * `processors` - Chain applied to each item, in order
    /// * `backup` - File receiving the records (`None` disables saving)
    pub fn new(processors: Vec<Arc<dyn ItemProcessor>>, backup: Option<PathBuf>) -> Self {
        Self {
            processors: Arc::new(processors),
            backup,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn backup_file(&self) -> Option<&Path> {
        self.backup.as_deref()
    }

    /// Runs the processor chain and appends the item to the backup file
    ///
    /// Processing and writing happen under one lock so records from
    /// concurrent handlers never interleave.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The item was written
    /// * `Ok(false)` - A processor rejected the item
    /// * `Err(ItemError)` - No backup file, or encoding/IO failed
    pub async fn save_item<T: Serialize>(&self, item: &T) -> Result<bool, ItemError> {
        let path = self.backup.as_ref().ok_or(ItemError::NoBackupFile)?;
        let original = serde_json::to_value(item)?;

        let _guard = self.lock.lock().await;

        let mut current = original.clone();
        for processor in self.processors.iter() {
            match processor.process(current).await {
                Some(next) => current = next,
                None => {
                    tracing::debug!("item {} was rejected", original);
                    return Ok(false);
                }
            }
        }

        tracing::debug!("writing item {} to file {}", current, path.display());
        let record = rmp_serde::to_vec_named(&current)?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(&record).await?;
        file.flush().await?;

        Ok(true)
    }
}

/// Reads back every record of a backup file
pub fn read_items(path: &Path) -> Result<Vec<Value>, ItemError> {
    let bytes = std::fs::read(path)?;
    let mut cursor = Cursor::new(bytes.as_slice());
    let mut items = Vec::new();

    while (cursor.position() as usize) < bytes.len() {
        let item: Value = rmp_serde::from_read(&mut cursor)?;
        items.push(item);
    }

    Ok(items)
}
