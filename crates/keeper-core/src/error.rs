use thiserror::Error;

pub type Result<T> = std::result::Result<T, KeeperError>;

#[derive(Debug, Error)]
pub enum KeeperError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("unknown compression type: {0}")]
    UnknownCompressionType(u8),

    #[error("decompression error: {0}")]
    Decompression(String),

    #[error("block not found: {0}")]
    BlockNotFound(String),

    #[error("invalid hostname: '{0}'")]
    InvalidHostname(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("invalid filter: {0}")]
    Filter(String),

    #[error("configuration error: {0}")]
    Config(String),
}
