//! File-backed store with atomic whole-document writes.
//!
//! # Responsibility
//! - Keep the full store document in memory and mirror it to one JSON file.
//! - Make every batch durable with temp-write, fsync, then rename.
//!
//! # Invariants
//! - The rename is the only visible on-disk state transition; a crash
//!   before it leaves the previous canonical file intact.
//! - In-memory state changes only after the rename succeeded; a failed
//!   write rolls the batch back.
//! - A leftover temp file at open time belongs to an interrupted write and
//!   is discarded, never loaded.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{error, info, warn};

use crate::config::StoreOptions;
use crate::model::{EntityId, EntityKind};
use crate::store::document::StoreDocument;
use crate::store::{Record, Store, StoreError, StoreResult, WriteOp};

const TEMP_SUFFIX: &str = ".tmp";

/// Store persisted to a single JSON document on disk.
#[derive(Debug)]
pub struct FileStore {
    options: StoreOptions,
    temp_path: PathBuf,
    document: StoreDocument,
}

impl FileStore {
    /// Opens (or initializes) the store at `path` with default options.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::open_with(StoreOptions::new(path))
    }

    /// Opens the store described by `options`.
    ///
    /// A missing data file starts an empty store; nothing is written until
    /// the first mutation.
    ///
    /// # Errors
    /// - `StoreError::Io` when the file exists but cannot be read.
    /// - `StoreError::InvalidData` when the file content is not a valid document.
    pub fn open_with(options: StoreOptions) -> StoreResult<Self> {
        let started_at = Instant::now();
        info!("event=store_open module=store status=start");

        let temp_path = temp_path_for(&options.path);
        discard_stale_temp(&temp_path);

        let document = match fs::read(&options.path) {
            Ok(bytes) => StoreDocument::from_json(&bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(StoreDocument::empty()),
            Err(source) => Err(StoreError::Io {
                op: "read",
                path: options.path.clone(),
                source,
            }),
        };

        match document {
            Ok(document) => {
                info!(
                    "event=store_open module=store status=ok duration_ms={} users={} places={} reviews={} amenities={} cities={} countries={}",
                    started_at.elapsed().as_millis(),
                    document.len(EntityKind::User),
                    document.len(EntityKind::Place),
                    document.len(EntityKind::Review),
                    document.len(EntityKind::Amenity),
                    document.len(EntityKind::City),
                    document.len(EntityKind::Country),
                );
                Ok(Self {
                    options,
                    temp_path,
                    document,
                })
            }
            Err(err) => {
                error!(
                    "event=store_open module=store status=error duration_ms={} error_code=store_open_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Canonical data file path.
    pub fn path(&self) -> &Path {
        &self.options.path
    }

    /// Temp file path used during writes.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    fn persist(&self) -> StoreResult<()> {
        let bytes = self.document.to_json()?;
        let attempts = self.options.write_attempts.max(1);
        let mut backoff = self.options.retry_backoff;
        let mut attempt = 1;

        loop {
            match self.write_atomically(&bytes) {
                Ok(()) => return Ok(()),
                Err(err) if attempt < attempts => {
                    warn!(
                        "event=store_write module=store status=retry attempt={} max_attempts={} backoff_ms={} error={}",
                        attempt,
                        attempts,
                        backoff.as_millis(),
                        err
                    );
                    std::thread::sleep(backoff);
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => {
                    error!(
                        "event=store_write module=store status=error attempt={} error_code=store_write_failed error={}",
                        attempt, err
                    );
                    return Err(err);
                }
            }
        }
    }

    fn write_atomically(&self, bytes: &[u8]) -> StoreResult<()> {
        let mut temp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.temp_path)
            .map_err(io_error("create_temp", &self.temp_path))?;
        temp.write_all(bytes)
            .map_err(io_error("write_temp", &self.temp_path))?;
        temp.sync_all()
            .map_err(io_error("sync_temp", &self.temp_path))?;
        drop(temp);

        fs::rename(&self.temp_path, &self.options.path)
            .map_err(io_error("rename", &self.options.path))?;
        sync_parent_dir(&self.options.path);
        Ok(())
    }
}

impl Store for FileStore {
    fn apply(&mut self, ops: Vec<WriteOp>) -> StoreResult<()> {
        let op_count = ops.len();
        let undo = self.document.apply(ops);
        if undo.is_empty() {
            return Ok(());
        }

        let started_at = Instant::now();
        let changed = undo.len();
        match self.persist() {
            Ok(()) => {
                info!(
                    "event=store_write module=store status=ok ops={} changed={} duration_ms={}",
                    op_count,
                    changed,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                self.document.rollback(undo);
                Err(err)
            }
        }
    }

    fn load_record(&self, kind: EntityKind, id: EntityId) -> StoreResult<Option<Record>> {
        Ok(self.document.get(kind, id).cloned())
    }

    fn load_all_records(&self, kind: EntityKind) -> StoreResult<Vec<Record>> {
        Ok(self.document.records(kind))
    }

    fn count(&self, kind: EntityKind) -> StoreResult<usize> {
        Ok(self.document.len(kind))
    }
}

fn io_error(op: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> StoreError {
    let path = path.to_path_buf();
    move |source| StoreError::Io { op, path, source }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut file_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    file_name.push(TEMP_SUFFIX);
    path.with_file_name(file_name)
}

fn discard_stale_temp(temp_path: &Path) {
    match fs::remove_file(temp_path) {
        Ok(()) => warn!(
            "event=store_open module=store status=recovered action=discard_stale_temp path={}",
            temp_path.display()
        ),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(
            "event=store_open module=store status=warn action=discard_stale_temp error={}",
            err
        ),
    }
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    let Some(parent) = path.parent() else {
        return;
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    if let Err(err) = fs::File::open(parent).and_then(|dir| dir.sync_all()) {
        warn!(
            "event=store_write module=store status=warn action=sync_parent_dir error={}",
            err
        );
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::temp_path_for;
    use std::path::{Path, PathBuf};

    #[test]
    fn temp_path_sits_next_to_data_file() {
        assert_eq!(
            temp_path_for(Path::new("/data/file_storage.json")),
            PathBuf::from("/data/file_storage.json.tmp")
        );
        assert_eq!(
            temp_path_for(Path::new("store.json")),
            PathBuf::from("store.json.tmp")
        );
    }
}
