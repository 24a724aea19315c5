use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{KrbError, KrbResult};

/// File name of the credential database inside `db.path`
pub const DB_FILE_NAME: &str = "kerberos.json";

/// Top-level configuration shared by `krbd` and `krb` (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KrbConfig {
    #[serde(rename = "as")]
    pub auth: AuthConfig,
    pub tgs: TgsConfig,
    pub fs: FsConfig,
    pub db: DbConfig,
    pub client: ClientConfig,
}

/// Authentication service listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// TCP listen address (default: 127.0.0.1:8555)
    pub listen: String,
}

/// Ticket-granting service listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TgsConfig {
    /// TCP listen address (default: 127.0.0.1:8655)
    pub listen: String,
}

/// File service listener and serving root
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// TCP listen address (default: 127.0.0.1:8755)
    pub listen: String,
    /// Directory that download requests are confined to
    pub serve_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Directory holding kerberos.json, or the full path to the file
    pub path: PathBuf,
}

/// Client-side endpoints and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub as_url: String,
    pub tgs_url: String,
    pub fs_url: String,
    /// Per-request timeout in seconds (default: 5)
    pub timeout_secs: u64,
    /// Where downloaded resources are written
    pub download_dir: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8555".into(),
        }
    }
}

impl Default for TgsConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8655".into(),
        }
    }
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8755".into(),
            serve_root: PathBuf::from("/var/lib/krb/files"),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/krb"),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            as_url: "http://127.0.0.1:8555".into(),
            tgs_url: "http://127.0.0.1:8655".into(),
            fs_url: "http://127.0.0.1:8755".into(),
            timeout_secs: 5,
            download_dir: PathBuf::from("."),
        }
    }
}

impl DbConfig {
    /// Resolve the database file: `path` is used as-is when it already names
    /// kerberos.json, otherwise it is treated as the containing directory.
    pub fn database_file(&self) -> PathBuf {
        if self.path.file_name().is_some_and(|n| n == DB_FILE_NAME) {
            self.path.clone()
        } else {
            self.path.join(DB_FILE_NAME)
        }
    }
}

impl KrbConfig {
    /// Load configuration from `path`, falling back to defaults if the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> KrbResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| KrbError::Config(format!("parsing config {}: {e}", path.display())))
    }
}
