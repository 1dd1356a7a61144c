use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::{KeeperError, Result};

/// Maximum decompressed output size (64 MiB). Blocks are client-buffer sized,
/// so anything above this is either corruption or a decompression bomb.
const MAX_DECOMPRESS_SIZE: u64 = 64 * 1024 * 1024;

/// How a block payload was encoded for transmission and storage.
///
/// The integer tags are part of the wire protocol and of the on-disk sidecar
/// format, so they must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CompressionKind {
    #[default]
    None,
    Zlib,
}

impl From<CompressionKind> for u8 {
    fn from(kind: CompressionKind) -> u8 {
        match kind {
            CompressionKind::None => 0,
            CompressionKind::Zlib => 1,
        }
    }
}

impl TryFrom<u8> for CompressionKind {
    type Error = KeeperError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(CompressionKind::None),
            1 => Ok(CompressionKind::Zlib),
            other => Err(KeeperError::UnknownCompressionType(other)),
        }
    }
}

/// Encode `data` with the given kind. For `None` this is a plain copy.
pub fn compress(kind: CompressionKind, data: &[u8]) -> Result<Vec<u8>> {
    match kind {
        CompressionKind::None => Ok(data.to_vec()),
        CompressionKind::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
    }
}

/// Decode a stored payload back to its original bytes.
///
/// `uncmplen` is the uncompressed length recorded alongside the payload; the
/// decoded output must match it exactly. Output is capped at
/// `MAX_DECOMPRESS_SIZE` regardless of what the descriptor claims.
pub fn decompress(kind: CompressionKind, payload: &[u8], uncmplen: u64) -> Result<Vec<u8>> {
    match kind {
        CompressionKind::None => Ok(payload.to_vec()),
        CompressionKind::Zlib => {
            if uncmplen > MAX_DECOMPRESS_SIZE {
                return Err(KeeperError::Decompression(format!(
                    "declared size {uncmplen} exceeds limit of {MAX_DECOMPRESS_SIZE} bytes"
                )));
            }
            let mut output = Vec::with_capacity(uncmplen as usize);
            let mut decoder = ZlibDecoder::new(payload);
            decoder
                .by_ref()
                .take(MAX_DECOMPRESS_SIZE + 1)
                .read_to_end(&mut output)
                .map_err(|e| KeeperError::Decompression(format!("zlib: {e}")))?;
            if output.len() as u64 > MAX_DECOMPRESS_SIZE {
                return Err(KeeperError::Decompression(format!(
                    "decompressed size exceeds limit of {MAX_DECOMPRESS_SIZE} bytes"
                )));
            }
            if output.len() as u64 != uncmplen {
                return Err(KeeperError::Decompression(format!(
                    "decompressed to {} bytes, descriptor says {uncmplen}",
                    output.len()
                )));
            }
            Ok(output)
        }
    }
}
