//! On-disk layout of a TonyToken data directory.
//!
//! ```text
//! <data-dir>/
//!   contract-address.json     deployment record
//!   streams/<ledger-id>.jsonl one event stream per ledger
//! ```

use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_DIR: &str = ".tonytoken";
pub const ADDRESS_FILE_NAME: &str = "contract-address.json";
pub const STREAMS_DIR: &str = "streams";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    data_dir: PathBuf,
}

impl StoragePaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn streams_dir(&self) -> PathBuf {
        self.data_dir.join(STREAMS_DIR)
    }

    pub fn default_address_file(&self) -> PathBuf {
        self.data_dir.join(ADDRESS_FILE_NAME)
    }
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}
