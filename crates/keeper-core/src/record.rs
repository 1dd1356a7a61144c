use serde::{Deserialize, Serialize};

use crate::block_id::BlockId;
use crate::compress::{self, CompressionKind};
use crate::error::{KeeperError, Result};

/// A block in transit or at rest: digest plus payload in its transmitted form.
///
/// Wire shape (`/Data.json` and friends): `{hash, data, size, cmptype,
/// uncmplen}` with `hash` and `data` base64-encoded. When `cmptype` is not
/// `None`, `data` holds the compressed bytes and `uncmplen` the original
/// length; `size` is always the transmitted byte count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub hash: BlockId,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub size: u64,
    #[serde(default)]
    pub cmptype: CompressionKind,
    #[serde(default)]
    pub uncmplen: u64,
}

impl BlockRecord {
    /// Build an uncompressed record from raw bytes, computing its digest.
    pub fn from_plain(data: Vec<u8>) -> Self {
        let hash = BlockId::compute(&data);
        let size = data.len() as u64;
        BlockRecord {
            hash,
            data,
            size,
            cmptype: CompressionKind::None,
            uncmplen: size,
        }
    }

    /// Check wire invariants and normalise the descriptor.
    ///
    /// `size` must match the payload length; for an uncompressed block the
    /// uncompressed length is by definition the payload length, whatever the
    /// sender filled in.
    pub fn validate(&mut self) -> Result<()> {
        if self.data.len() as u64 != self.size {
            return Err(KeeperError::MalformedRecord(format!(
                "block size {} does not match payload length {}",
                self.size,
                self.data.len()
            )));
        }
        if self.cmptype == CompressionKind::None {
            self.uncmplen = self.size;
        }
        Ok(())
    }

    /// Return the original (uncompressed) bytes of the block.
    pub fn uncompressed(&self) -> Result<Vec<u8>> {
        compress::decompress(self.cmptype, &self.data, self.uncmplen)
    }
}

/// One snapshot of one file's attributes plus the ordered list of its block
/// digests. This is what a host's metadata log records, one per line.
///
/// Wire keys follow the client protocol (`filetype`, `fsize`, ...).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileVersion {
    #[serde(rename = "filetype")]
    pub file_type: u8,
    #[serde(default)]
    pub inode: u64,
    #[serde(default)]
    pub mode: u32,
    #[serde(default)]
    pub atime: u64,
    #[serde(default)]
    pub ctime: u64,
    pub mtime: u64,
    #[serde(rename = "fsize")]
    pub size: u64,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub uid: u32,
    #[serde(default)]
    pub gid: u32,
    pub name: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub hash_list: Vec<BlockId>,
}

/// The `/Meta.json` request envelope: a file version together with the host
/// that reported it. `data_sent` is set by clients that have already pushed
/// every block of the file, so the needed-blocks answer can be skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostedVersion {
    pub hostname: String,
    #[serde(default)]
    pub data_sent: bool,
    pub meta: FileVersion,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        BASE64.decode(s.as_bytes()).map_err(D::Error::custom)
    }
}
