//! # kvraft-storage
//!
//! why: keep the epoch and committed log across restarts using standard rust fs apis
//! relations: implements kvraft_core::LogStore, used by kvraft-sim when a data dir is given
//! what: FileStore, a json-file backed store with atomic, fsynced writes

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use kvraft_core::{Epoch, LogIndex, LogItem, LogStore, MemoryStore, RaftError, Result};
use serde::{Deserialize, Serialize};

/// File-backed log store.
///
/// Stores state in a directory with:
/// - meta.json: current epoch
/// - log.json: array of committed log items
///
/// Reads are served from memory. Every change to the epoch or the committed
/// log is written to disk before the call returns; the provisional slot is
/// never persisted.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    inner: MemoryStore,
}

/// Contents of meta.json.
#[derive(Serialize, Deserialize, Default)]
struct Meta {
    epoch: Epoch,
}

impl FileStore {
    /// Open the store in `dir`, creating the directory if needed and
    /// recovering whatever a previous process left there.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let meta: Meta = read_json(&dir.join(META_FILE))?.unwrap_or_default();
        let log: Vec<LogItem> = read_json(&dir.join(LOG_FILE))?.unwrap_or_default();
        if let Some((position, _)) = log
            .iter()
            .enumerate()
            .find(|(position, item)| item.index != *position as u64)
        {
            return Err(RaftError::MissingLogEntry {
                index: position as u64,
            });
        }

        tracing::debug!(dir = %dir.display(), epoch = meta.epoch, entries = log.len(), "store opened");
        Ok(Self {
            dir,
            inner: MemoryStore::from_parts(meta.epoch, log),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All committed entries.
    pub fn log(&self) -> &[LogItem] {
        self.inner.log()
    }

    /// Remove all persisted state (for tests and fresh simulator runs).
    pub fn clear(&mut self) -> Result<()> {
        for name in [META_FILE, LOG_FILE] {
            match fs::remove_file(self.dir.join(name)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.inner = MemoryStore::new();
        Ok(())
    }

    fn persist_meta(&self) -> Result<()> {
        let meta = Meta {
            epoch: self.inner.epoch(),
        };
        write_atomic(&self.dir, META_FILE, &meta)
    }

    fn persist_log(&self) -> Result<()> {
        write_atomic(&self.dir, LOG_FILE, self.inner.log())
    }
}

const META_FILE: &str = "meta.json";
const LOG_FILE: &str = "log.json";

/// Write to a temp file, fsync, then rename over `name`.
fn write_atomic<T: Serialize + ?Sized>(dir: &Path, name: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;

    let temp_path = dir.join(format!("{name}.tmp"));
    let mut file = File::create(&temp_path)?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    fs::rename(&temp_path, dir.join(name))?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl LogStore for FileStore {
    fn epoch(&self) -> Epoch {
        self.inner.epoch()
    }

    fn set_epoch(&mut self, epoch: Epoch) -> Result<()> {
        self.inner.set_epoch(epoch)?;
        self.persist_meta()
    }

    fn log_size(&self) -> u64 {
        self.inner.log_size()
    }

    fn entry_at(&self, index: LogIndex) -> Option<&LogItem> {
        self.inner.entry_at(index)
    }

    fn read_key(&self, key: &str) -> Option<String> {
        self.inner.read_key(key)
    }

    fn provisional(&self) -> Option<&LogItem> {
        self.inner.provisional()
    }

    fn append_provisional(&mut self, entry: LogItem) {
        self.inner.append_provisional(entry);
    }

    fn discard_provisional(&mut self) {
        self.inner.discard_provisional();
    }

    fn commit_provisional(&mut self) -> Result<LogItem> {
        let committed = self.inner.commit_provisional()?;
        self.persist_log()?;
        Ok(committed)
    }

    fn replace_from(&mut self, from: LogIndex, entries: Vec<LogItem>) -> Result<()> {
        self.inner.replace_from(from, entries)?;
        self.persist_log()
    }
}
