//! Committing temporary data into a permanent tree.
//!
//! The host filesystem has no multi-step transactions, so the move protects
//! whatever already sits at the destination by parking it in a holding area
//! first and putting it back if the move fails:
//!
//! ```text
//! Idle ──(dest exists)──> HoldingOld ──(move ok)──> Committed
//!   │                         │
//!   │                         └──(move failed)──> RolledBack | Unrecoverable
//!   └──(move ok)──> Committed
//! ```
//!
//! A crash between steps can leave the holding area behind; it is named with
//! [`HOLD_PREFIX`] so that [`sweep_orphans`](crate::sweep_orphans) finds it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, error, warn};

use crate::core::{LocalRoot, Result, StorageRoot, utils};
use crate::error::VfsError;
use crate::path::{IntoRelPath, RelPath};
use crate::vfs::temp_root::TempFsRoot;
use crate::vfs::{Blob, Tree};

/// Name prefix of holding areas.
pub(crate) const HOLD_PREFIX: &str = ".blobtree-hold-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveState {
    Idle,
    /// The previous destination content has been parked in the holding area.
    HoldingOld,
    Committed,
    /// The move failed and the destination is back to what it was.
    RolledBack,
    /// The move failed and the previous content could not be put back; it is
    /// still in the holding area.
    Unrecoverable,
}

/// One best-effort move of `src` onto `dest`, replacing whatever is there.
#[derive(Debug)]
pub struct MoveWithRollback {
    src: PathBuf,
    dest: PathBuf,
    scratch: PathBuf,
    state: MoveState,
    holding: Option<PathBuf>,
}

impl MoveWithRollback {
    /// * `scratch` is the directory the holding area is created in. It should
    ///   be on the same filesystem as `dest`.
    pub fn new<P, Q, S>(src: P, dest: Q, scratch: S) -> Self
    where
        P: Into<PathBuf>,
        Q: Into<PathBuf>,
        S: Into<PathBuf>,
    {
        Self {
            src: src.into(),
            dest: dest.into(),
            scratch: scratch.into(),
            state: MoveState::Idle,
            holding: None,
        }
    }

    pub fn state(&self) -> MoveState {
        self.state
    }

    /// Holding area created for the previous destination content, if any.
    /// Removed again once the move commits.
    pub fn holding_area(&self) -> Option<&Path> {
        self.holding.as_deref()
    }

    /// Runs the move with the host's rename.
    pub fn run(&mut self) -> Result<()> {
        self.run_with(move_path)
    }

    /// Runs the move with `mv` performing each individual host move: parking
    /// the old destination, moving the new data in, and restoring on failure.
    pub fn run_with<F>(&mut self, mut mv: F) -> Result<()>
    where
        F: FnMut(&Path, &Path) -> io::Result<()>,
    {
        if self.state != MoveState::Idle {
            return Err(anyhow!("move to {} has already run", self.dest.display()));
        }

        let held = if fs::symlink_metadata(&self.dest).is_ok() {
            Some(self.park_destination(&mut mv)?)
        } else {
            None
        };

        let err = match mv(&self.src, &self.dest) {
            Ok(()) => {
                self.commit();
                return Ok(());
            }
            Err(err) => err,
        };

        let Some(held) = held else {
            self.state = MoveState::RolledBack;
            return Err(err).with_context(|| self.failure_message());
        };

        match mv(&held, &self.dest) {
            Ok(()) => {
                self.state = MoveState::RolledBack;
                debug!("restored {} after failed move", self.dest.display());
                self.discard_holding_area();
                Err(err).with_context(|| self.failure_message())
            }
            Err(restore) => {
                self.state = MoveState::Unrecoverable;
                error!(
                    "failed to restore {}; original data is preserved in {}",
                    self.dest.display(),
                    held.display()
                );
                Err(VfsError::Rollback {
                    dest: self.dest.clone(),
                    holding: held,
                    source: err,
                    restore,
                }
                .into())
            }
        }
    }

    /// Moves the current destination into a fresh holding area and returns
    /// where it ended up.
    fn park_destination<F>(&mut self, mv: &mut F) -> Result<PathBuf>
    where
        F: FnMut(&Path, &Path) -> io::Result<()>,
    {
        let name = self
            .dest
            .file_name()
            .ok_or_else(|| anyhow!("{} has no file name", self.dest.display()))?;
        let area = tempfile::Builder::new()
            .prefix(HOLD_PREFIX)
            .tempdir_in(&self.scratch)
            .with_context(|| format!("failed to create holding area in {}", self.scratch.display()))?
            .keep();
        let held = area.join(name);
        if let Err(e) = mv(&self.dest, &held) {
            if let Err(cleanup) = utils::rm_on_host(&area) {
                warn!("failed to remove holding area {}: {:#}", area.display(), cleanup);
            }
            return Err(e).with_context(|| {
                format!("failed to move {} aside to {}", self.dest.display(), held.display())
            });
        }
        debug!("moved {} aside to {}", self.dest.display(), held.display());
        self.holding = Some(area);
        self.state = MoveState::HoldingOld;
        Ok(held)
    }

    fn commit(&mut self) {
        self.state = MoveState::Committed;
        debug!("moved {} to {}", self.src.display(), self.dest.display());
        self.discard_holding_area();
    }

    fn discard_holding_area(&mut self) {
        if let Some(area) = self.holding.take() {
            // The data is safe at this point; a leftover area is swept later.
            if let Err(e) = utils::rm_on_host(&area) {
                warn!("failed to remove holding area {}: {:#}", area.display(), e);
            }
        }
    }

    fn failure_message(&self) -> String {
        format!(
            "failed to move {} to {}",
            self.src.display(),
            self.dest.display()
        )
    }
}

/// Host move: a rename, or copy-then-delete when the two paths live on
/// different filesystems.
fn move_path(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => copy_then_remove(from, to),
        other => other,
    }
}

/// Cross-device fallback. A failed copy leaves nothing behind at `to`.
fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    if let Err(e) = copy_recursively(from, to) {
        if fs::symlink_metadata(to).is_ok() {
            if let Err(cleanup) = remove_any(to) {
                warn!("failed to remove partial copy {}: {}", to.display(), cleanup);
            }
        }
        return Err(e);
    }
    remove_any(from)
}

fn copy_recursively(from: &Path, to: &Path) -> io::Result<()> {
    if fs::symlink_metadata(from)?.is_dir() {
        fs::create_dir(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_recursively(&entry.path(), &to.join(entry.file_name()))?;
        }
        Ok(())
    } else {
        fs::copy(from, to).map(|_| ())
    }
}

fn remove_any(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Temporary data that can be handed over to a permanent tree.
pub trait TempData {
    fn temp_root(&self) -> &TempFsRoot;
    fn temp_path(&self) -> &RelPath;
}

impl TempData for Tree<TempFsRoot> {
    fn temp_root(&self) -> &TempFsRoot {
        self.root()
    }

    fn temp_path(&self) -> &RelPath {
        self.path()
    }
}

impl TempData for Blob<TempFsRoot> {
    fn temp_root(&self) -> &TempFsRoot {
        self.root()
    }

    fn temp_path(&self) -> &RelPath {
        self.path()
    }
}

impl<R: LocalRoot + ?Sized> Tree<R> {
    /// Moves temporary `data` into this tree under `name`, replacing whatever
    /// was there, and transfers ownership: `data`'s root is consumed and every
    /// handle on it fails with [`VfsError::AlreadyMoved`] from now on.
    ///
    /// # Errors
    /// - [`VfsError::ReadOnly`] if this tree's root is not writeable.
    /// - [`VfsError::AlreadyMoved`] if `data` was transferred before.
    /// - [`VfsError::InvalidTarget`] unless this tree is its root's top and
    ///   `data` is the whole temporary location.
    /// - [`VfsError::Rollback`] if the move failed and the previous content
    ///   could not be restored.
    ///
    /// On any other failure the destination is restored and `data` stays usable.
    /// Parent directories of `name` that had to be created for the move are
    /// removed again.
    pub fn insert<T: TempData>(&self, name: impl IntoRelPath, data: &T) -> Result<()> {
        self.insert_with(name, data, move_path)
    }

    /// [`insert`](Tree::insert) with `mv` performing the host moves.
    pub(crate) fn insert_with<T, F>(&self, name: impl IntoRelPath, data: &T, mv: F) -> Result<()>
    where
        T: TempData,
        F: FnMut(&Path, &Path) -> io::Result<()>,
    {
        let name = name.into_rel_path()?;
        if !self.root().is_writeable() {
            return Err(VfsError::read_only(self.root()).into());
        }
        let temp = data.temp_root();
        let src = temp
            .location()
            .ok_or(VfsError::AlreadyMoved { kind: temp.kind() })?;
        if !self.path().is_root() {
            return Err(VfsError::invalid_target(
                self,
                "temporary data can only be moved into the top of a tree",
            )
            .into());
        }
        if !data.temp_path().is_root() {
            return Err(VfsError::invalid_target(
                self,
                "temporary data must be moved in full, not a part of it",
            )
            .into());
        }
        if name.is_root() {
            return Err(VfsError::invalid_target(self, "the destination needs a name").into());
        }

        let created = match name.parent() {
            Some(parent) => {
                let missing = self.first_missing(&parent);
                self.ensure_dir(&parent)?;
                missing
            }
            None => None,
        };
        let dest = self.root().sys_path(&name)?;
        let scratch = src
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);

        if let Err(e) = MoveWithRollback::new(&src, &dest, scratch).run_with(mv) {
            if let Some(created) = created {
                if let Err(cleanup) = self.root().remove_node(&created, true) {
                    warn!("failed to remove {}: {:#}", created, cleanup);
                }
            }
            return Err(e);
        }
        temp.consume();
        debug!("transferred temporary {} into {}", temp.kind(), dest.display());
        Ok(())
    }

    /// Shortest prefix of `rel` that does not exist yet.
    fn first_missing(&self, rel: &RelPath) -> Option<RelPath> {
        let mut prefix = RelPath::new();
        for name in rel.components() {
            prefix = prefix.join_name(name).ok()?;
            if !self.root().path_exists(&prefix) {
                return Some(prefix);
            }
        }
        None
    }
}
