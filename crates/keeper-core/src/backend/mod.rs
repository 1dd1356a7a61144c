mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::block_id::BlockId;
use crate::error::Result;
use crate::query::ListQuery;
use crate::record::{BlockRecord, FileVersion};

/// Abstract storage engine behind the ingestion pipeline and the query
/// endpoints. The file-based realisation is the normative one; the in-memory
/// realisation keeps property and handler tests fast and deterministic.
///
/// Initialisation is the realisation's constructor; teardown is `Drop`.
pub trait Backend: Send + Sync {
    /// Append one file-version record to `hostname`'s metadata log.
    fn store_metadata(&self, hostname: &str, meta: &FileVersion) -> Result<()>;

    /// Persist one block. Idempotent per digest.
    fn store_block(&self, block: &BlockRecord) -> Result<()>;

    /// Of `ids`, return the digests this backend does not hold, preserving
    /// input order, each at most once.
    fn needed(&self, ids: &[BlockId]) -> Result<Vec<BlockId>>;

    /// Matching file-version records for a host, sorted by `(name, mtime)`
    /// ascending, optionally collapsed to the latest version per path.
    fn list_files(&self, hostname: &str, query: &ListQuery) -> Result<Vec<FileVersion>>;

    /// Fetch a block and its compression descriptor.
    fn get_block(&self, id: &BlockId) -> Result<BlockRecord>;
}
