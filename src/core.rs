use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;

use crate::path::RelPath;

pub type Result<T> = std::result::Result<T, anyhow::Error>;

/// Capabilities a backing store provides so that it can be addressed through
/// [`Tree`](crate::Tree) and [`Blob`](crate::Blob) nodes.
///
/// Every path is relative to the root; the empty path is the root's own top.
/// The predicates never fail: an unreachable or consumed location is simply
/// "not there". All mutating operations must check [`is_writeable`] first and
/// fail with [`VfsError::ReadOnly`](crate::VfsError::ReadOnly).
///
/// Roots are shared between nodes through `Rc`, so every method takes `&self`.
///
/// [`is_writeable`]: StorageRoot::is_writeable
pub trait StorageRoot: fmt::Display {
    fn is_directory(&self, path: &RelPath) -> bool;
    fn is_file(&self, path: &RelPath) -> bool;

    /// True if anything at all lives at `path`, including entries that are
    /// neither a directory nor a regular file.
    fn path_exists(&self, path: &RelPath) -> bool;

    /// Names of the immediate children of the directory at `path`, in the
    /// order the store enumerates them.
    fn list(&self, path: &RelPath) -> Result<Vec<String>>;

    fn open_read(&self, path: &RelPath) -> Result<Box<dyn Read>>;

    /// Opens `path` for writing, creating or truncating it.
    /// The parent directory must already exist.
    fn open_write(&self, path: &RelPath) -> Result<Box<dyn Write>>;

    /// Removes the node at `path`. Non-empty directories need `recursive`.
    fn remove_node(&self, path: &RelPath, recursive: bool) -> Result<()>;

    /// Creates a single directory; the parent must already exist.
    fn make_directory(&self, path: &RelPath) -> Result<()>;

    fn is_writeable(&self) -> bool;
}

/// A root whose nodes live at real host paths. Ownership transfer of
/// temporary data is only possible between local roots.
pub trait LocalRoot: StorageRoot {
    /// Host path of `path`. Fails once the root no longer owns its location.
    fn sys_path(&self, path: &RelPath) -> Result<PathBuf>;
}

pub(crate) mod utils {
    use std::path::{Component, Path, PathBuf};

    use anyhow::Context;

    use crate::core::Result;
    use crate::path::RelPath;

    /// Normalizes path (removes "." and resolves "..").
    pub fn normalize<P: AsRef<Path>>(path: P) -> PathBuf {
        let mut result = PathBuf::new();
        for component in path.as_ref().components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    result.pop();
                }
                _ => result.push(component),
            }
        }
        result
    }

    /// Joins the components of `path` onto `base` with host path rules.
    pub fn host_join(base: &Path, path: &RelPath) -> PathBuf {
        let mut host = base.to_path_buf();
        host.extend(path.components());
        host
    }

    /// Removes a file, a symlink or a whole directory tree on the host.
    pub fn rm_on_host<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let meta = std::fs::symlink_metadata(path)
            .with_context(|| format!("failed to stat {}", path.display()))?;
        if meta.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        }
        .with_context(|| format!("failed to remove {}", path.display()))
    }
}
