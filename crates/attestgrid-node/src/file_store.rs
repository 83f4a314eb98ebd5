//! # File Receipt Store
//!
//! One JSON document per task under `<root>/receipts/`, named by the
//! content hash of the `task_id`:
//!
//! ```text
//! <root>/receipts/<sha256(canonical(task_id))>.json
//! ```
//!
//! Hashing the key keeps arbitrary `task_id` strings out of the filesystem
//! namespace (no path separators, no length limits).
//!
//! ## Atomic insert
//!
//! A record is written to a uniquely named temporary file, fsynced, then
//! published with `hard_link`. Linking fails with `AlreadyExists` if the
//! record is already present, which makes insert-if-absent atomic across
//! processes sharing the directory. The temporary is always removed, so a
//! reader never observes a partially written record.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use attestgrid_core::{content_hash, Receipt};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{check_key, PersistOutcome, ReceiptStore};

const RECORD_DIR: &str = "receipts";
const RECORD_EXT: &str = "json";

/// Filesystem-backed receipt store.
#[derive(Debug)]
pub struct FileReceiptStore {
    records: PathBuf,
    write_lock: Mutex<()>,
}

impl FileReceiptStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let records = root.as_ref().join(RECORD_DIR);
        fs::create_dir_all(&records).map_err(|source| StoreError::Io {
            path: records.clone(),
            source,
        })?;
        tracing::debug!(path = %records.display(), "opened file receipt store");
        Ok(Self {
            records,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the record files.
    pub fn records_dir(&self) -> &Path {
        &self.records
    }

    fn record_path(&self, task_id: &str) -> Result<PathBuf, StoreError> {
        let digest = content_hash(&task_id)?;
        Ok(self
            .records
            .join(format!("{}.{RECORD_EXT}", digest.to_hex())))
    }

    fn read_record(path: &Path) -> Result<Option<Receipt>, StoreError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    /// Read the record at `path` and confirm it belongs to `task_id`.
    fn read_owned(path: &Path, task_id: &str) -> Result<Option<Receipt>, StoreError> {
        match Self::read_record(path)? {
            Some(receipt) if receipt.task_id() != task_id => Err(StoreError::Corrupt {
                path: path.to_path_buf(),
                reason: format!(
                    "record holds task {:?}, expected {task_id:?}",
                    receipt.task_id()
                ),
            }),
            other => Ok(other),
        }
    }

    fn write_temp(&self, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let tmp = self.records.join(format!(".{}.tmp", Uuid::new_v4()));
        let io_err = |source: io::Error| StoreError::Io {
            path: tmp.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)
            .map_err(io_err)?;
        if let Err(source) = file.write_all(bytes).and_then(|()| file.sync_all()) {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(source));
        }
        Ok(tmp)
    }

    #[cfg(unix)]
    fn sync_dir(&self) {
        if let Err(e) = fs::File::open(&self.records).and_then(|d| d.sync_all()) {
            tracing::warn!(path = %self.records.display(), error = %e, "failed to fsync receipt directory");
        }
    }

    #[cfg(not(unix))]
    fn sync_dir(&self) {}
}

impl ReceiptStore for FileReceiptStore {
    fn persist(&self, task_id: &str, receipt: Receipt) -> Result<PersistOutcome, StoreError> {
        check_key(task_id, &receipt)?;
        let path = self.record_path(task_id)?;
        let _guard = self.write_lock.lock();

        if let Some(existing) = Self::read_owned(&path, task_id)? {
            return Ok(PersistOutcome::AlreadyPresent(existing));
        }

        let mut bytes = serde_json::to_vec_pretty(&receipt)?;
        bytes.push(b'\n');
        let tmp = self.write_temp(&bytes)?;
        let linked = fs::hard_link(&tmp, &path);
        let _ = fs::remove_file(&tmp);

        match linked {
            Ok(()) => {
                self.sync_dir();
                tracing::debug!(task_id, path = %path.display(), "receipt persisted");
                Ok(PersistOutcome::Inserted(receipt))
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                // Another process published between our read and our link.
                match Self::read_owned(&path, task_id)? {
                    Some(existing) => Ok(PersistOutcome::AlreadyPresent(existing)),
                    None => Err(StoreError::Corrupt {
                        path,
                        reason: "record vanished after concurrent insert".to_string(),
                    }),
                }
            }
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn get(&self, task_id: &str) -> Result<Option<Receipt>, StoreError> {
        let path = self.record_path(task_id)?;
        Self::read_owned(&path, task_id)
    }

    fn list_all(&self) -> Result<Vec<Receipt>, StoreError> {
        let mut receipts = Vec::new();
        for path in record_files(&self.records)? {
            let Some(receipt) = Self::read_record(&path)? else {
                continue;
            };
            if self.record_path(receipt.task_id())? != path {
                return Err(StoreError::Corrupt {
                    path,
                    reason: format!("file name does not match task {:?}", receipt.task_id()),
                });
            }
            receipts.push(receipt);
        }
        receipts.sort_by(|a, b| a.task_id().cmp(b.task_id()));
        Ok(receipts)
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(record_files(&self.records)?.len())
    }
}

/// Published record files. Temporaries (dot-prefixed) are skipped.
fn record_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let io_err = |source: io::Error| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_record = path.extension().is_some_and(|ext| ext == RECORD_EXT)
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !n.starts_with('.'));
        if is_record {
            files.push(path);
        }
    }
    Ok(files)
}
