//! Temporary, single-owner filesystem roots.
//!
//! A [`TempFsRoot`] owns a freshly allocated host directory or file. The
//! location is removed when the root is dropped, unless its data has been
//! moved into a permanent tree first (see [`Tree::insert`]). Abnormal process
//! termination skips the drop and leaves the location behind;
//! [`sweep_orphans`] clears such leftovers.
//!
//! [`Tree::insert`]: crate::Tree::insert

use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Context;
use tracing::{debug, warn};

use crate::core::{LocalRoot, Result, StorageRoot, utils};
use crate::error::VfsError;
use crate::path::RelPath;
use crate::vfs::fs_root::host;
use crate::vfs::transfer::HOLD_PREFIX;
use crate::vfs::{Blob, Tree};

/// Name prefix of every location allocated by [`TempFsRoot`].
pub(crate) const TEMP_PREFIX: &str = ".blobtree-tmp-";

/// Who owns the temporary location right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TempLocation {
    /// This handle owns the location and will delete it on drop.
    Active(PathBuf),
    /// The data was moved into a permanent tree; the handle is dead.
    Consumed,
}

/// An always-writeable root over a temporary host location.
pub struct TempFsRoot {
    location: RefCell<TempLocation>,
    kind: &'static str,
}

impl TempFsRoot {
    /// Allocates a fresh empty directory under `parent`.
    pub fn new_dir_in<P: AsRef<Path>>(parent: P) -> Result<Self> {
        let parent = parent.as_ref();
        let path = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir_in(parent)
            .with_context(|| format!("failed to create temporary directory in {}", parent.display()))?
            .keep();
        debug!("allocated temporary directory {}", path.display());
        Ok(Self::active(path, "directory"))
    }

    /// Allocates a fresh empty file under `parent`.
    pub fn new_file_in<P: AsRef<Path>>(parent: P) -> Result<Self> {
        let parent = parent.as_ref();
        let path = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(parent)
            .with_context(|| format!("failed to create temporary file in {}", parent.display()))?
            .into_temp_path()
            .keep()
            .with_context(|| format!("failed to keep temporary file in {}", parent.display()))?;
        debug!("allocated temporary file {}", path.display());
        Ok(Self::active(path, "file"))
    }

    /// Allocates a fresh empty directory under the platform temp directory.
    pub fn new_dir() -> Result<Self> {
        Self::new_dir_in(std::env::temp_dir())
    }

    /// Allocates a fresh empty file under the platform temp directory.
    pub fn new_file() -> Result<Self> {
        Self::new_file_in(std::env::temp_dir())
    }

    fn active(path: PathBuf, kind: &'static str) -> Self {
        Self {
            location: RefCell::new(TempLocation::Active(path)),
            kind,
        }
    }

    pub fn state(&self) -> TempLocation {
        self.location.borrow().clone()
    }

    /// Host location, `None` once consumed.
    pub fn location(&self) -> Option<PathBuf> {
        match &*self.location.borrow() {
            TempLocation::Active(path) => Some(path.clone()),
            TempLocation::Consumed => None,
        }
    }

    pub fn is_consumed(&self) -> bool {
        *self.location.borrow() == TempLocation::Consumed
    }

    /// `"directory"` or `"file"`, depending on what was allocated.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Marks the location as handed over. Nothing is deleted on drop after this.
    pub(crate) fn consume(&self) {
        self.location.replace(TempLocation::Consumed);
    }

    fn require_active(&self) -> Result<PathBuf> {
        self.location()
            .ok_or_else(|| VfsError::AlreadyMoved { kind: self.kind }.into())
    }

    fn host(&self, path: &RelPath) -> Result<PathBuf> {
        Ok(utils::host_join(&self.require_active()?, path))
    }
}

impl fmt::Display for TempFsRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.location.borrow() {
            TempLocation::Active(path) => write!(f, "{}", path.display()),
            TempLocation::Consumed => write!(f, "<moved temporary {}>", self.kind),
        }
    }
}

impl fmt::Debug for TempFsRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TempFsRoot")
            .field("location", &*self.location.borrow())
            .field("kind", &self.kind)
            .finish()
    }
}

impl StorageRoot for TempFsRoot {
    fn is_directory(&self, path: &RelPath) -> bool {
        self.host(path).is_ok_and(|h| h.is_dir())
    }

    fn is_file(&self, path: &RelPath) -> bool {
        self.host(path).is_ok_and(|h| h.is_file())
    }

    fn path_exists(&self, path: &RelPath) -> bool {
        self.host(path).is_ok_and(|h| host::exists(&h))
    }

    fn list(&self, path: &RelPath) -> Result<Vec<String>> {
        host::list(&self.host(path)?)
    }

    fn open_read(&self, path: &RelPath) -> Result<Box<dyn Read>> {
        host::open_read(&self.host(path)?)
    }

    fn open_write(&self, path: &RelPath) -> Result<Box<dyn Write>> {
        host::open_write(&self.host(path)?)
    }

    fn remove_node(&self, path: &RelPath, recursive: bool) -> Result<()> {
        let host = self.host(path)?;
        if path.is_root() {
            return Err(VfsError::invalid_target(self, "the root cannot be removed").into());
        }
        host::remove(&host, recursive)
    }

    fn make_directory(&self, path: &RelPath) -> Result<()> {
        host::make_directory(&self.host(path)?)
    }

    fn is_writeable(&self) -> bool {
        true
    }
}

impl LocalRoot for TempFsRoot {
    fn sys_path(&self, path: &RelPath) -> Result<PathBuf> {
        self.host(path)
    }
}

impl Drop for TempFsRoot {
    fn drop(&mut self) {
        let TempLocation::Active(path) = self.location.get_mut() else {
            return;
        };
        if !host::exists(path) {
            return;
        }
        match utils::rm_on_host(&*path) {
            Ok(()) => debug!("removed temporary {} {}", self.kind, path.display()),
            Err(e) => warn!("failed to remove temporary {} {}: {:#}", self.kind, path.display(), e),
        }
    }
}

/// A temporary tree under the platform temp directory.
pub fn temp_tree() -> Result<Tree<TempFsRoot>> {
    Ok(Tree::new(Rc::new(TempFsRoot::new_dir()?)))
}

/// A temporary tree under `parent`. Pick a parent on the same filesystem as
/// the eventual destination so the final move is a plain rename.
pub fn temp_tree_in<P: AsRef<Path>>(parent: P) -> Result<Tree<TempFsRoot>> {
    Ok(Tree::new(Rc::new(TempFsRoot::new_dir_in(parent)?)))
}

/// A temporary, empty blob under the platform temp directory.
pub fn temp_blob() -> Result<Blob<TempFsRoot>> {
    Ok(Blob::new(Rc::new(TempFsRoot::new_file()?)))
}

/// A temporary, empty blob under `parent`.
pub fn temp_blob_in<P: AsRef<Path>>(parent: P) -> Result<Blob<TempFsRoot>> {
    Ok(Blob::new(Rc::new(TempFsRoot::new_file_in(parent)?)))
}

/// Removes temporary locations and holding areas left directly under
/// `parent` by a process that did not shut down cleanly. Returns how many
/// entries were removed.
///
/// Run this at startup, before any temporary roots are allocated under
/// `parent`: it cannot tell a leftover from a live root of another process.
pub fn sweep_orphans<P: AsRef<Path>>(parent: P) -> Result<usize> {
    let parent = parent.as_ref();
    let mut removed = 0;
    let entries =
        fs::read_dir(parent).with_context(|| format!("failed to list {}", parent.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", parent.display()))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(TEMP_PREFIX) && !name.starts_with(HOLD_PREFIX) {
            continue;
        }
        match utils::rm_on_host(entry.path()) {
            Ok(()) => {
                debug!("swept orphaned {}", entry.path().display());
                removed += 1;
            }
            Err(e) => warn!("failed to sweep {}: {:#}", entry.path().display(), e),
        }
    }
    Ok(removed)
}
