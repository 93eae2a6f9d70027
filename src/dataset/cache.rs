use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use tracing::debug;

use crate::dataset::{Table, loader};
use crate::error::Result;
use crate::fetch::is_remote;

/// Identity of a source: a local file is the same file while its path,
/// length and modification time are unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SourceKey {
    File {
        path: PathBuf,
        len: u64,
        modified: Option<SystemTime>,
    },
    Remote(String),
}

impl SourceKey {
    fn for_source(source: &str) -> Result<Self> {
        if is_remote(source) {
            return Ok(SourceKey::Remote(source.to_string()));
        }
        let metadata = std::fs::metadata(source)?;
        Ok(SourceKey::File {
            path: std::fs::canonicalize(source)?,
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

/// Memoizes parsed tables for the lifetime of a session.
#[derive(Debug, Default)]
pub struct DatasetCache {
    entries: HashMap<SourceKey, Arc<Table>>,
    hits: usize,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached parse of `source`, loading it on first use.
    pub async fn load(&mut self, source: &str) -> Result<Arc<Table>> {
        let key = SourceKey::for_source(source)?;
        if let Some(table) = self.entries.get(&key) {
            self.hits += 1;
            debug!(source, "Dataset cache hit");
            return Ok(Arc::clone(table));
        }

        let table = Arc::new(loader::load(source).await?);
        debug!(source, table = table.name(), rows = table.len(), "Dataset loaded");
        self.entries.insert(key, Arc::clone(&table));
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}
