//! # store
//!
//! why: give roles a narrow, swappable handle on the log and key/value data
//! relations: implemented here in memory and by kvraft-storage on disk; used by every role
//! what: LogStore trait, MemoryStore

use std::collections::BTreeMap;

use crate::error::{RaftError, Result};
use crate::log::{replay, Epoch, LogIndex, LogItem};

/// Log and data store consumed by the roles.
///
/// Indices are 0-based positions, so the next index to append is always the
/// log size. A single provisional slot holds the write the leader (or a
/// follower on its behalf) has accepted but not yet committed.
pub trait LogStore {
    /// Current epoch as last persisted.
    fn epoch(&self) -> Epoch;

    /// Persist a new epoch.
    fn set_epoch(&mut self, epoch: Epoch) -> Result<()>;

    /// Number of committed entries.
    fn log_size(&self) -> u64;

    /// Committed entry at `index`.
    fn entry_at(&self, index: LogIndex) -> Option<&LogItem>;

    /// Committed value for `key`.
    fn read_key(&self, key: &str) -> Option<String>;

    /// The write accepted but not yet committed, if any.
    fn provisional(&self) -> Option<&LogItem>;

    /// Put `entry` in the provisional slot, replacing what was there.
    fn append_provisional(&mut self, entry: LogItem);

    /// Drop the provisional write.
    fn discard_provisional(&mut self);

    /// Move the provisional write to the end of the log and apply it.
    fn commit_provisional(&mut self) -> Result<LogItem>;

    /// Truncate the log at `from` and append `entries` in its place.
    ///
    /// `from` may be at most the log size; anything past it would leave a gap.
    fn replace_from(&mut self, from: LogIndex, entries: Vec<LogItem>) -> Result<()>;

    /// Index the next committed entry will take.
    fn next_index(&self) -> LogIndex {
        self.log_size()
    }

    fn last_log_item(&self) -> Option<&LogItem> {
        self.log_size()
            .checked_sub(1)
            .and_then(|index| self.entry_at(index))
    }

    /// Committed entries from `from` to the end of the log.
    fn entries_from(&self, from: LogIndex) -> Vec<LogItem> {
        (from..self.log_size())
            .filter_map(|index| self.entry_at(index).cloned())
            .collect()
    }
}

/// In-memory log store, no persistence across restarts.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    epoch: Epoch,
    log: Vec<LogItem>,
    provisional: Option<LogItem>,
    data: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from recovered state (data is replayed from the log).
    pub fn from_parts(epoch: Epoch, log: Vec<LogItem>) -> Self {
        let data = replay(&log);
        Self {
            epoch,
            log,
            provisional: None,
            data,
        }
    }

    /// All committed entries.
    pub fn log(&self) -> &[LogItem] {
        &self.log
    }

    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.data
    }
}

impl LogStore for MemoryStore {
    fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn set_epoch(&mut self, epoch: Epoch) -> Result<()> {
        self.epoch = epoch;
        Ok(())
    }

    fn log_size(&self) -> u64 {
        self.log.len() as u64
    }

    fn entry_at(&self, index: LogIndex) -> Option<&LogItem> {
        usize::try_from(index).ok().and_then(|i| self.log.get(i))
    }

    fn read_key(&self, key: &str) -> Option<String> {
        self.data.get(key).cloned()
    }

    fn provisional(&self) -> Option<&LogItem> {
        self.provisional.as_ref()
    }

    fn append_provisional(&mut self, entry: LogItem) {
        self.provisional = Some(entry);
    }

    fn discard_provisional(&mut self) {
        self.provisional = None;
    }

    fn commit_provisional(&mut self) -> Result<LogItem> {
        let expected = self.next_index();
        match self.provisional.take() {
            None => Err(RaftError::NoProvisionalWrite),
            Some(entry) if entry.index != expected => {
                let found = entry.index;
                self.provisional = Some(entry);
                Err(RaftError::ProvisionalIndexMismatch { expected, found })
            }
            Some(entry) => {
                entry.command.apply(&mut self.data);
                self.log.push(entry.clone());
                Ok(entry)
            }
        }
    }

    fn replace_from(&mut self, from: LogIndex, entries: Vec<LogItem>) -> Result<()> {
        let len = self.log_size();
        if from > len {
            return Err(RaftError::MissingLogEntry { index: len });
        }
        self.log.truncate(from as usize);
        self.log.extend(entries);
        self.data = replay(&self.log);

        if self
            .provisional
            .as_ref()
            .is_some_and(|p| p.index != self.log.len() as u64)
        {
            self.provisional = None;
        }
        Ok(())
    }
}
