use std::path::{Path, PathBuf};

use chrono::Duration;

pub const DATA_DIR_ENV: &str = "CHATBOARD_DATA_DIR";
pub const DEFAULT_DATA_DIR: &str = "data";

/// Limits and locations for one board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    pub data_dir: PathBuf,
    /// Roster entries older than this are pruned on the next listing.
    pub presence_timeout: Duration,
    /// Maximum number of messages kept in the ledger.
    pub retention: usize,
    /// Maximum number of messages returned by one query.
    pub page_size: usize,
    pub max_body_chars: usize,
    pub max_name_chars: usize,
}

impl BoardConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            presence_timeout: Duration::seconds(30),
            retention: 1000,
            page_size: 50,
            max_body_chars: 1000,
            max_name_chars: 20,
        }
    }

    /// Resolve the data directory: explicit value, then `$CHATBOARD_DATA_DIR`,
    /// then `./data`.
    pub fn resolve(data_dir: Option<&Path>) -> Self {
        let dir = data_dir
            .map(Path::to_path_buf)
            .or_else(|| {
                std::env::var(DATA_DIR_ENV)
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
            })
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        Self::new(dir)
    }

    pub fn messages_path(&self) -> PathBuf {
        self.data_dir.join("messages.json")
    }

    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join("users.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join(".lock")
    }
}
