//! File-backed event store: one JSON-lines file per ledger stream.
//!
//! Lets separate CLI invocations share ledger state. Each line is one
//! [`StoredEvent`]; a batch is written with a single `write_all` and synced
//! before `append` returns.
//!
//! Access goes through an OS file lock on `<root>/.lock`: `append` holds it
//! exclusively across read, version check and write, readers hold it shared.
//! The lock is taken on a fresh handle per call, so it serializes threads of
//! one process as well as separate processes.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use fd_lock::RwLock;
use tracing::instrument;

use tonytoken_core::{ExpectedVersion, LedgerId};

use super::r#trait::{
    EventStore, EventStoreError, StoredEvent, UncommittedEvent, commit_batch, validate_batch,
};

const STREAM_EXTENSION: &str = "jsonl";
const LOCK_FILE: &str = ".lock";

#[derive(Debug)]
pub struct FileEventStore {
    root: PathBuf,
}

impl FileEventStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, EventStoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| EventStoreError::io("create_dir", e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stream_path(&self, ledger_id: LedgerId) -> PathBuf {
        self.root.join(format!("{ledger_id}.{STREAM_EXTENSION}"))
    }

    fn lock_file(&self) -> Result<RwLock<File>, EventStoreError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.root.join(LOCK_FILE))
            .map_err(|e| EventStoreError::io("open_lock", e))?;
        Ok(RwLock::new(file))
    }

    fn read_stream(&self, ledger_id: LedgerId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let file = match File::open(self.stream_path(ledger_id)) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(EventStoreError::io("open_stream", e)),
        };

        let mut events = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| EventStoreError::io("read_stream", e))?;
            if line.trim().is_empty() {
                continue;
            }
            let event: StoredEvent =
                serde_json::from_str(&line).map_err(|e| EventStoreError::Corrupt {
                    ledger_id,
                    line: idx + 1,
                    reason: e.to_string(),
                })?;
            if event.ledger_id != ledger_id {
                return Err(EventStoreError::Corrupt {
                    ledger_id,
                    line: idx + 1,
                    reason: format!("event belongs to ledger {}", event.ledger_id),
                });
            }
            events.push(event);
        }
        Ok(events)
    }
}

impl EventStore for FileEventStore {
    #[instrument(
        skip(self, events),
        fields(event_count = events.len(), expected_version = ?expected_version),
        err
    )]
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        let (ledger_id, aggregate_type) = validate_batch(&events)?;

        let mut lock = self.lock_file()?;
        let _guard = lock.write().map_err(|e| EventStoreError::io("lock_stream", e))?;

        let stream = self.read_stream(ledger_id)?;
        let committed = commit_batch(&stream, &aggregate_type, events, expected_version)?;

        let mut buffer = Vec::new();
        for stored in &committed {
            serde_json::to_writer(&mut buffer, stored)
                .map_err(|e| EventStoreError::Serialization(e.to_string()))?;
            buffer.push(b'\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.stream_path(ledger_id))
            .map_err(|e| EventStoreError::io("open_stream", e))?;
        file.write_all(&buffer)
            .map_err(|e| EventStoreError::io("write_stream", e))?;
        file.sync_data()
            .map_err(|e| EventStoreError::io("sync_stream", e))?;

        tracing::debug!(
            ledger_id = %ledger_id,
            committed = committed.len(),
            "appended events to stream file"
        );
        Ok(committed)
    }

    fn load_stream(&self, ledger_id: LedgerId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let lock = self.lock_file()?;
        let _guard = lock.read().map_err(|e| EventStoreError::io("lock_stream", e))?;
        self.read_stream(ledger_id)
    }

    fn list_streams(&self) -> Result<Vec<LedgerId>, EventStoreError> {
        let entries = fs::read_dir(&self.root).map_err(|e| EventStoreError::io("list_streams", e))?;

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| EventStoreError::io("list_streams", e))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some(STREAM_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match stem.parse::<LedgerId>() {
                Ok(id) => ids.push(id),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping foreign stream file"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}
