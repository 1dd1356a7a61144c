use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::block_id::BlockId;
use crate::compress::CompressionKind;
use crate::error::{KeeperError, Result};
use crate::record::BlockRecord;

/// Smallest and largest accepted fan-out levels. Level 2 costs ~256 MB of
/// empty directories on ext4; level 5 would cost terabytes.
pub const MIN_DIR_LEVEL: u8 = 2;
pub const MAX_DIR_LEVEL: u8 = 5;

/// Marker created once the full fan-out tree exists.
const DONE_MARKER: &str = ".done";

/// Write-once, deduplicating content-addressed block store.
///
/// Blocks live under `<prefix>/data/<hh>/.../<remaining-hex>` where the first
/// `level` bytes of the digest pick the directory and the remaining hex names
/// the payload file. A `<remaining-hex>.meta` sidecar records the compression
/// descriptor. The filesystem directory is the index; there is no other one.
pub struct BlockStore {
    root: PathBuf,
    level: u8,
}

impl BlockStore {
    /// Open (and on first use initialise) the store under `prefix`.
    ///
    /// Unless the `.done` marker is already present, all 256^level leaf
    /// directories are pre-created so the write path never has to mkdir and
    /// concurrent writers cannot race on directory creation.
    pub fn open(prefix: &Path, level: u8) -> Result<Self> {
        if !(MIN_DIR_LEVEL..=MAX_DIR_LEVEL).contains(&level) {
            return Err(KeeperError::Config(format!(
                "dir-level ({level}) must be between {MIN_DIR_LEVEL} and {MAX_DIR_LEVEL}"
            )));
        }

        let root = prefix.join("data");
        fs::create_dir_all(&root)?;

        let store = BlockStore { root, level };
        let marker = store.root.join(DONE_MARKER);
        if !marker.exists() {
            tracing::info!(level, root = %store.root.display(), "creating block store fan-out directories");
            create_fanout(&store.root, level)?;
            fs::File::create(&marker)?;
            tracing::info!("block store fan-out complete");
        }
        Ok(store)
    }

    /// Payload and sidecar paths for a digest.
    fn leaf_paths(&self, id: &BlockId) -> (PathBuf, PathBuf) {
        let hex = id.to_hex();
        let mut dir = self.root.clone();
        for i in 0..self.level as usize {
            dir.push(&hex[i * 2..i * 2 + 2]);
        }
        let rest = &hex[self.level as usize * 2..];
        (dir.join(rest), dir.join(format!("{rest}.meta")))
    }

    /// Persist a block. Writes the descriptor sidecar first, then the payload
    /// with replace semantics. Same-digest writes are idempotent: content is
    /// addressed by its hash, so the last writer wins byte-identically.
    pub fn put(&self, block: &BlockRecord) -> Result<()> {
        let (payload, sidecar) = self.leaf_paths(&block.hash);
        write_sidecar(&sidecar, block.cmptype, block.uncmplen)?;
        fs::write(&payload, &block.data)?;
        Ok(())
    }

    /// Fetch a block and its compression descriptor.
    pub fn get(&self, id: &BlockId) -> Result<BlockRecord> {
        let (payload, sidecar) = self.leaf_paths(id);
        let data = match fs::read(&payload) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(KeeperError::BlockNotFound(id.to_hex()));
            }
            Err(e) => return Err(e.into()),
        };
        let (cmptype, uncmplen) = read_sidecar(&sidecar);
        // A lost sidecar degrades to "stored as-is": the payload length is
        // the uncompressed length.
        let uncmplen = if cmptype == CompressionKind::None && uncmplen == 0 {
            data.len() as u64
        } else {
            uncmplen
        };
        Ok(BlockRecord {
            hash: *id,
            size: data.len() as u64,
            data,
            cmptype,
            uncmplen,
        })
    }

    /// Existence probe. Filesystem errors count as "not present": a false
    /// negative only causes the client to re-send a block we already have.
    pub fn has(&self, id: &BlockId) -> bool {
        let (payload, _) = self.leaf_paths(id);
        match fs::metadata(&payload) {
            Ok(meta) => meta.is_file(),
            Err(_) => false,
        }
    }

    /// Of `ids`, return those not present in the store, preserving input
    /// order and emitting each missing digest at most once.
    pub fn needed(&self, ids: &[BlockId]) -> Vec<BlockId> {
        let mut emitted = HashSet::new();
        let mut out = Vec::new();
        for id in ids {
            if !self.has(id) && emitted.insert(*id) {
                out.push(*id);
            }
        }
        out
    }
}

fn create_fanout(dir: &Path, depth: u8) -> std::io::Result<()> {
    for byte in 0..=255u8 {
        let sub = dir.join(format!("{byte:02x}"));
        fs::create_dir_all(&sub)?;
        if depth > 1 {
            create_fanout(&sub, depth - 1)?;
        }
    }
    Ok(())
}

/// Sidecar key-file: `[meta]` group with `cmptype` and `uncmplen` keys.
fn write_sidecar(path: &Path, kind: CompressionKind, uncmplen: u64) -> std::io::Result<()> {
    let contents = format!("[meta]\ncmptype={}\nuncmplen={}\n", u8::from(kind), uncmplen);
    fs::write(path, contents)
}

/// Read a sidecar, tolerating absence and garbage: an unreadable descriptor
/// degrades to `(None, 0)` exactly like the original key-file reader.
fn read_sidecar(path: &Path) -> (CompressionKind, u64) {
    let Ok(text) = fs::read_to_string(path) else {
        return (CompressionKind::None, 0);
    };
    let mut kind = CompressionKind::None;
    let mut uncmplen = 0u64;
    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "cmptype" => {
                kind = value
                    .trim()
                    .parse::<u8>()
                    .ok()
                    .and_then(|tag| CompressionKind::try_from(tag).ok())
                    .unwrap_or(CompressionKind::None);
            }
            "uncmplen" => {
                uncmplen = value.trim().parse().unwrap_or(0);
            }
            _ => {}
        }
    }
    (kind, uncmplen)
}
