use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use crate::backend::Backend;
use crate::block_id::BlockId;
use crate::error::{KeeperError, Result};
use crate::query::{self, ListQuery};
use crate::record::{BlockRecord, FileVersion};

/// In-memory storage engine with the same observable behaviour as
/// [`super::FileBackend`]. Used by the test suites.
#[derive(Default)]
pub struct MemoryBackend {
    blocks: Mutex<HashMap<BlockId, BlockRecord>>,
    logs: Mutex<HashMap<String, Vec<FileVersion>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn store_metadata(&self, hostname: &str, meta: &FileVersion) -> Result<()> {
        let mut logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        logs.entry(hostname.to_string())
            .or_default()
            .push(meta.clone());
        Ok(())
    }

    fn store_block(&self, block: &BlockRecord) -> Result<()> {
        let mut blocks = self.blocks.lock().unwrap_or_else(PoisonError::into_inner);
        blocks.insert(block.hash, block.clone());
        Ok(())
    }

    fn needed(&self, ids: &[BlockId]) -> Result<Vec<BlockId>> {
        let blocks = self.blocks.lock().unwrap_or_else(PoisonError::into_inner);
        let mut emitted = HashSet::new();
        let mut out = Vec::new();
        for id in ids {
            if !blocks.contains_key(id) && emitted.insert(*id) {
                out.push(*id);
            }
        }
        Ok(out)
    }

    fn list_files(&self, hostname: &str, query: &ListQuery) -> Result<Vec<FileVersion>> {
        let logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        let mut records: Vec<FileVersion> = logs
            .get(hostname)
            .into_iter()
            .flatten()
            .filter(|meta| query.regex.is_match(&meta.name) && query.mtime_matches(meta.mtime))
            .map(|meta| {
                if query.reduced {
                    FileVersion {
                        file_type: meta.file_type,
                        mtime: meta.mtime,
                        size: meta.size,
                        name: meta.name.clone(),
                        ..FileVersion::default()
                    }
                } else {
                    meta.clone()
                }
            })
            .collect();
        query::sort_records(&mut records);
        if query.latest {
            records = query::keep_latest(records);
        }
        Ok(records)
    }

    fn get_block(&self, id: &BlockId) -> Result<BlockRecord> {
        let blocks = self.blocks.lock().unwrap_or_else(PoisonError::into_inner);
        blocks
            .get(id)
            .cloned()
            .ok_or_else(|| KeeperError::BlockNotFound(id.to_hex()))
    }
}
