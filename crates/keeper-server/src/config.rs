use std::path::Path;

use keeper_core::error::{KeeperError, Result};
use serde::{Deserialize, Serialize};

/// Server configuration file, YAML. Section and key names are part of the
/// deployment contract; `Server` is accepted as an alias for `server`.
///
/// ```yaml
/// server:
///   port: 5468
///   ip: "0.0.0.0"
/// file_backend:
///   file-directory: /var/tmp/cdpfgl/server
///   dir-level: 2
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default, alias = "Server")]
    pub server: ServerSection,
    #[serde(default)]
    pub file_backend: FileBackendSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address to bind.
    #[serde(default = "default_ip")]
    pub ip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileBackendSection {
    /// Prefix directory holding `data/` and `meta/`.
    #[serde(rename = "file-directory", default = "default_file_directory")]
    pub file_directory: String,

    /// Block store fan-out level (2..=5).
    #[serde(rename = "dir-level", default = "default_dir_level")]
    pub dir_level: u8,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            ip: default_ip(),
        }
    }
}

impl Default for FileBackendSection {
    fn default() -> Self {
        Self {
            file_directory: default_file_directory(),
            dir_level: default_dir_level(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            KeeperError::Config(format!("cannot read '{}': {e}", path.display()))
        })?;
        serde_yaml::from_str(&text).map_err(|e| {
            KeeperError::Config(format!("cannot parse '{}': {e}", path.display()))
        })
    }
}

fn default_port() -> u16 {
    5468
}

fn default_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_file_directory() -> String {
    "/var/tmp/cdpfgl/server".to_string()
}

fn default_dir_level() -> u8 {
    2
}
