//! Deployment record: the JSON file that remembers which ledger the CLI
//! tasks operate on.
//!
//! Format: `{ "address": "<ledger id>" }`, pretty-printed.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tonytoken_core::LedgerId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddress {
    pub address: String,
}

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("deployment record io failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("deployment record at {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("deployment record at {path} holds an invalid address: {reason}")]
    InvalidAddress { path: PathBuf, reason: String },
}

impl DeploymentError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Write the deployment record, creating parent directories as needed.
/// An existing record is overwritten.
pub fn save_contract_address(path: &Path, ledger_id: LedgerId) -> Result<(), DeploymentError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| DeploymentError::io(parent, e))?;
    }

    let record = ContractAddress {
        address: ledger_id.to_string(),
    };
    let mut json = serde_json::to_string_pretty(&record).map_err(|source| DeploymentError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    json.push('\n');

    fs::write(path, json).map_err(|e| DeploymentError::io(path, e))?;
    tracing::debug!(path = %path.display(), address = %ledger_id, "saved deployment record");
    Ok(())
}

/// Read the deployment record. `None` if nothing was deployed yet.
pub fn load_contract_address(path: &Path) -> Result<Option<LedgerId>, DeploymentError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(DeploymentError::io(path, e)),
    };

    let record: ContractAddress =
        serde_json::from_slice(&bytes).map_err(|source| DeploymentError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    record
        .address
        .parse::<LedgerId>()
        .map(Some)
        .map_err(|e| DeploymentError::InvalidAddress {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}
