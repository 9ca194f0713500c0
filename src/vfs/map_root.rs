//! This module provides a storage root that keeps every tree and blob in memory.
//!
//! ### Key Features:
//! - **No host access**: nothing touches the disk; useful for tests and scratch data.
//! - **Same contract**: honours the full [`StorageRoot`] capability set, including
//!   read-only enforcement, so generic tree code behaves identically on it.
//! - **Ordered listing**: children are enumerated in component order.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Cursor, Read, Write};
use std::rc::Rc;

use anyhow::anyhow;

use crate::core::{Result, StorageRoot};
use crate::error::VfsError;
use crate::path::RelPath;

#[derive(Debug, Clone)]
enum Entry {
    Directory,
    File(Vec<u8>),
}

type Entries = Rc<RefCell<BTreeMap<RelPath, Entry>>>;

/// An in-memory storage root.
///
/// ### Invariants
///
/// 1. **Root existence**: the empty path is always present and is a directory.
/// 2. **Parent consistency**: for any entry `a/b/c` there is a directory entry `a/b`.
///
/// Open writers share the entry map, so bytes written through them are visible
/// to readers opened afterwards.
pub struct MapRoot {
    entries: Entries,
    writeable: bool,
}

impl MapRoot {
    /// Creates an empty, writeable root.
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(RelPath::new(), Entry::Directory);
        Self {
            entries: Rc::new(RefCell::new(entries)),
            writeable: true,
        }
    }

    /// Creates an empty root that refuses every mutation.
    pub fn read_only() -> Self {
        Self {
            writeable: false,
            ..Self::new()
        }
    }

    fn get(&self, path: &RelPath) -> Option<Entry> {
        self.entries.borrow().get(path).cloned()
    }

    fn check_writeable(&self) -> Result<()> {
        if !self.writeable {
            return Err(VfsError::read_only(self).into());
        }
        Ok(())
    }

    fn check_parent_dir(&self, path: &RelPath) -> Result<()> {
        let parent = path.parent().unwrap_or_default();
        if !self.is_directory(&parent) {
            return Err(VfsError::not_found(format!("{self}/{parent}")).into());
        }
        Ok(())
    }
}

impl Default for MapRoot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MapRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<memory>")
    }
}

impl StorageRoot for MapRoot {
    fn is_directory(&self, path: &RelPath) -> bool {
        matches!(self.get(path), Some(Entry::Directory))
    }

    fn is_file(&self, path: &RelPath) -> bool {
        matches!(self.get(path), Some(Entry::File(_)))
    }

    fn path_exists(&self, path: &RelPath) -> bool {
        self.entries.borrow().contains_key(path)
    }

    fn list(&self, path: &RelPath) -> Result<Vec<String>> {
        match self.get(path) {
            None => return Err(VfsError::not_found(format!("{self}/{path}")).into()),
            Some(Entry::File(_)) => {
                return Err(VfsError::TypeMismatch {
                    path: format!("{self}/{path}"),
                    expected: "tree",
                }
                .into());
            }
            Some(Entry::Directory) => {}
        }
        let depth = path.len() + 1;
        Ok(self
            .entries
            .borrow()
            .keys()
            .filter(|p| p.len() == depth && p.starts_with(path))
            .filter_map(|p| p.name().map(str::to_string))
            .collect())
    }

    fn open_read(&self, path: &RelPath) -> Result<Box<dyn Read>> {
        match self.get(path) {
            Some(Entry::File(content)) => Ok(Box::new(Cursor::new(content))),
            Some(Entry::Directory) => Err(VfsError::TypeMismatch {
                path: format!("{self}/{path}"),
                expected: "blob",
            }
            .into()),
            None => Err(VfsError::not_found(format!("{self}/{path}")).into()),
        }
    }

    fn open_write(&self, path: &RelPath) -> Result<Box<dyn Write>> {
        self.check_writeable()?;
        if self.is_directory(path) {
            return Err(VfsError::TypeMismatch {
                path: format!("{self}/{path}"),
                expected: "blob",
            }
            .into());
        }
        self.check_parent_dir(path)?;
        self.entries
            .borrow_mut()
            .insert(path.clone(), Entry::File(Vec::new()));
        Ok(Box::new(MapWriter {
            entries: Rc::clone(&self.entries),
            path: path.clone(),
        }))
    }

    fn remove_node(&self, path: &RelPath, recursive: bool) -> Result<()> {
        self.check_writeable()?;
        if path.is_root() {
            return Err(VfsError::invalid_target(self, "the root cannot be removed").into());
        }
        if !self.path_exists(path) {
            return Err(VfsError::not_found(format!("{self}/{path}")).into());
        }
        let removed: Vec<RelPath> = self
            .entries
            .borrow()
            .keys()
            .filter(|p| p.starts_with(path))
            .cloned()
            .collect();
        if removed.len() > 1 && !recursive {
            return Err(anyhow!("{self}/{path} is not empty"));
        }
        let mut entries = self.entries.borrow_mut();
        for p in &removed {
            entries.remove(p);
        }
        Ok(())
    }

    fn make_directory(&self, path: &RelPath) -> Result<()> {
        self.check_writeable()?;
        if self.path_exists(path) {
            return Err(VfsError::AlreadyExists(format!("{self}/{path}")).into());
        }
        self.check_parent_dir(path)?;
        self.entries
            .borrow_mut()
            .insert(path.clone(), Entry::Directory);
        Ok(())
    }

    fn is_writeable(&self) -> bool {
        self.writeable
    }
}

/// Appends into a file entry of a [`MapRoot`].
struct MapWriter {
    entries: Entries,
    path: RelPath,
}

impl Write for MapWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.entries.borrow_mut().get_mut(&self.path) {
            Some(Entry::File(content)) => {
                content.extend_from_slice(buf);
                Ok(buf.len())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} was removed while open for writing", self.path),
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
