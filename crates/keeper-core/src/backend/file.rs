use std::path::Path;

use crate::backend::Backend;
use crate::block_id::BlockId;
use crate::blockstore::BlockStore;
use crate::error::Result;
use crate::metalog::MetaLog;
use crate::query::{self, ListQuery};
use crate::record::{BlockRecord, FileVersion};

/// The flat-file storage engine: a content-addressed block store under
/// `<prefix>/data/` and per-host metadata logs under `<prefix>/meta/`.
pub struct FileBackend {
    blocks: BlockStore,
    meta: MetaLog,
}

impl FileBackend {
    /// Open both stores under `prefix`, initialising the block store fan-out
    /// on first use.
    pub fn open(prefix: &Path, dir_level: u8) -> Result<Self> {
        Ok(FileBackend {
            blocks: BlockStore::open(prefix, dir_level)?,
            meta: MetaLog::open(prefix)?,
        })
    }
}

impl Backend for FileBackend {
    fn store_metadata(&self, hostname: &str, meta: &FileVersion) -> Result<()> {
        self.meta.append(hostname, meta).map(|_| ())
    }

    fn store_block(&self, block: &BlockRecord) -> Result<()> {
        self.blocks.put(block)
    }

    fn needed(&self, ids: &[BlockId]) -> Result<Vec<BlockId>> {
        Ok(self.blocks.needed(ids))
    }

    fn list_files(&self, hostname: &str, query: &ListQuery) -> Result<Vec<FileVersion>> {
        let mut records = self.meta.scan(hostname, query)?;
        query::sort_records(&mut records);
        if query.latest {
            records = query::keep_latest(records);
        }
        Ok(records)
    }

    fn get_block(&self, id: &BlockId) -> Result<BlockRecord> {
        self.blocks.get(id)
    }
}
