//! Where the election collection lives between runs.
//!
//! A storage holds named slots of text. The store keeps its whole
//! collection in one slot and rewrites it after every change.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::NamedTempFile;

/// A set of named text slots.
pub trait Storage {
    /// The content of a slot, or `None` if nothing was ever written to it.
    fn read_slot(&self, slot: &str) -> io::Result<Option<String>>;

    /// Replaces the content of a slot. Either the whole content is written or
    /// the previous content is kept.
    fn write_slot(&mut self, slot: &str, contents: &str) -> io::Result<()>;
}

/// Slots kept in memory, for tests and embedding.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct MemoryStorage {
    slots: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }

    /// A storage with one slot already filled.
    pub fn with_slot(slot: &str, contents: &str) -> MemoryStorage {
        let mut res = MemoryStorage::new();
        res.slots.insert(slot.to_string(), contents.to_string());
        res
    }

    pub fn slot(&self, slot: &str) -> Option<&str> {
        self.slots.get(slot).map(|s| s.as_str())
    }
}

impl Storage for MemoryStorage {
    fn read_slot(&self, slot: &str) -> io::Result<Option<String>> {
        Ok(self.slots.get(slot).cloned())
    }

    fn write_slot(&mut self, slot: &str, contents: &str) -> io::Result<()> {
        self.slots.insert(slot.to_string(), contents.to_string());
        Ok(())
    }
}

/// Slots stored as JSON files in a directory: slot `name` is `<dir>/name.json`.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> FileStorage {
        FileStorage { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn slot_path(&self, slot: &str) -> PathBuf {
        self.root.join(format!("{}.json", slot))
    }
}

impl Storage for FileStorage {
    fn read_slot(&self, slot: &str) -> io::Result<Option<String>> {
        let path = self.slot_path(slot);
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("read_slot: {} does not exist", path.display());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn write_slot(&mut self, slot: &str, contents: &str) -> io::Result<()> {
        fs::create_dir_all(&self.root)?;
        let path = self.slot_path(slot);
        // A fresh file next to the target, synced, then renamed over it.
        // The file is removed if any step fails.
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        debug!("write_slot: {} bytes to {}", contents.len(), path.display());
        Ok(())
    }
}
