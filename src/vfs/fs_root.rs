//! This module provides a storage root that maps to a real location on the host
//! system: a directory (for trees) or a single file (for a blob).
//!
//! ### Key Features:
//! - **Isolated root**: every [`RelPath`] is joined onto the root's base location;
//!   validated components cannot climb out of it.
//! - **Fixed permissions**: the write flag is chosen at construction and never changes.
//! - **Live classification**: directory/file predicates are plain host `stat` calls.
//! - **Cross‑platform**: uses `std::path::Path` and `PathBuf` for portable path handling.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::core::{LocalRoot, Result, StorageRoot, utils};
use crate::error::VfsError;
use crate::path::RelPath;

/// A permanent storage root backed by a host directory or file.
///
/// ### Usage notes:
/// - Directory/file predicates follow symlinks; `path_exists` does not, so a
///   dangling link still counts as an existing "other" entry.
/// - Not thread‑safe in the sense of cross-process writers; concurrent
///   modification of the host location is not detected.
///
/// ### Example:
/// ```
/// use std::rc::Rc;
/// use blobtree::{FsRoot, Tree};
///
/// let dir = tempfile::tempdir().unwrap();
/// let tree = Tree::new(Rc::new(FsRoot::new(dir.path(), true).unwrap()));
/// tree.mkfile("docs/note.txt", Some(b"Hello")).unwrap();
/// assert_eq!(tree.get_blob("docs/note.txt").unwrap().read_string().unwrap(), "Hello");
/// ```
#[derive(Debug, Clone)]
pub struct FsRoot {
    path: PathBuf, // host-related absolute normalized path
    writeable: bool,
}

impl FsRoot {
    /// Creates a root at the existing host location `path`.
    /// * `path` may be relative; it is made absolute against the current directory.
    /// * `writeable` decides, once and for all, whether mutations are allowed.
    pub fn new<P: AsRef<Path>>(path: P, writeable: bool) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(VfsError::InvalidPath {
                component: String::new(),
                reason: "empty root location",
            }
            .into());
        }
        let absolute = std::path::absolute(path)
            .with_context(|| format!("failed to resolve {}", path.display()))?;
        let path = utils::normalize(absolute);
        if fs::symlink_metadata(&path).is_err() {
            return Err(VfsError::not_found(path.display()).into());
        }
        Ok(Self { path, writeable })
    }

    /// Host location of the root's top.
    pub fn location(&self) -> &Path {
        &self.path
    }

    fn host(&self, path: &RelPath) -> PathBuf {
        utils::host_join(&self.path, path)
    }

    fn check_writeable(&self) -> Result<()> {
        if !self.writeable {
            return Err(VfsError::read_only(self).into());
        }
        Ok(())
    }
}

impl fmt::Display for FsRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl StorageRoot for FsRoot {
    fn is_directory(&self, path: &RelPath) -> bool {
        self.host(path).is_dir()
    }

    fn is_file(&self, path: &RelPath) -> bool {
        self.host(path).is_file()
    }

    fn path_exists(&self, path: &RelPath) -> bool {
        host::exists(&self.host(path))
    }

    fn list(&self, path: &RelPath) -> Result<Vec<String>> {
        host::list(&self.host(path))
    }

    fn open_read(&self, path: &RelPath) -> Result<Box<dyn Read>> {
        host::open_read(&self.host(path))
    }

    fn open_write(&self, path: &RelPath) -> Result<Box<dyn Write>> {
        self.check_writeable()?;
        host::open_write(&self.host(path))
    }

    fn remove_node(&self, path: &RelPath, recursive: bool) -> Result<()> {
        self.check_writeable()?;
        if path.is_root() {
            return Err(VfsError::invalid_target(self, "the root cannot be removed").into());
        }
        host::remove(&self.host(path), recursive)
    }

    fn make_directory(&self, path: &RelPath) -> Result<()> {
        self.check_writeable()?;
        host::make_directory(&self.host(path))
    }

    fn is_writeable(&self) -> bool {
        self.writeable
    }
}

impl LocalRoot for FsRoot {
    fn sys_path(&self, path: &RelPath) -> Result<PathBuf> {
        Ok(self.host(path))
    }
}

/// Host operations shared by the permanent and temporary filesystem roots.
/// Every function takes an already-joined host path.
pub(crate) mod host {
    use super::*;

    pub fn exists(host: &Path) -> bool {
        fs::symlink_metadata(host).is_ok()
    }

    pub fn list(host: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let entries =
            fs::read_dir(host).with_context(|| format!("failed to list {}", host.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to list {}", host.display()))?;
            let name = entry.file_name().into_string().map_err(|name| VfsError::InvalidPath {
                component: name.to_string_lossy().into_owned(),
                reason: "not valid UTF-8",
            })?;
            names.push(name);
        }
        Ok(names)
    }

    pub fn open_read(host: &Path) -> Result<Box<dyn Read>> {
        let file =
            File::open(host).with_context(|| format!("failed to open {}", host.display()))?;
        Ok(Box::new(BufReader::new(file)))
    }

    pub fn open_write(host: &Path) -> Result<Box<dyn Write>> {
        let file = File::create(host)
            .with_context(|| format!("failed to open {} for writing", host.display()))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    pub fn remove(host: &Path, recursive: bool) -> Result<()> {
        let meta = fs::symlink_metadata(host)
            .with_context(|| format!("failed to stat {}", host.display()))?;
        if meta.is_dir() {
            if recursive {
                fs::remove_dir_all(host)
            } else {
                fs::remove_dir(host)
            }
        } else {
            fs::remove_file(host)
        }
        .with_context(|| format!("failed to remove {}", host.display()))
    }

    pub fn make_directory(host: &Path) -> Result<()> {
        if exists(host) {
            return Err(VfsError::AlreadyExists(host.display().to_string()).into());
        }
        fs::create_dir(host).with_context(|| format!("failed to create {}", host.display()))
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use tempdir::TempDir;

    fn p(s: &str) -> RelPath {
        RelPath::parse(s).unwrap()
    }

    fn kind(err: &anyhow::Error) -> Option<&VfsError> {
        err.downcast_ref::<VfsError>()
    }

    fn setup_test_env() -> TempDir {
        TempDir::new("fsroot_test").unwrap()
    }

    mod creations {
        use super::*;

        #[test]
        fn test_new_existing_directory() -> Result<()> {
            let temp_dir = setup_test_env();
            let root = FsRoot::new(temp_dir.path(), true)?;
            assert_eq!(root.location(), temp_dir.path());
            assert!(root.is_writeable());
            assert!(root.is_directory(&RelPath::new()));
            Ok(())
        }

        #[test]
        fn test_new_existing_file() -> Result<()> {
            let temp_dir = setup_test_env();
            let file = temp_dir.path().join("greeting.txt");
            fs::write(&file, "Hello world!\n")?;
            let root = FsRoot::new(&file, false)?;
            assert!(root.is_file(&RelPath::new()));
            assert!(!root.is_directory(&RelPath::new()));
            Ok(())
        }

        #[test]
        fn test_new_missing_location() {
            let temp_dir = setup_test_env();
            let err = FsRoot::new(temp_dir.path().join("missing"), true).unwrap_err();
            assert!(matches!(kind(&err), Some(VfsError::NotFound(_))));
        }

        #[test]
        fn test_new_empty_path() {
            let err = FsRoot::new("", true).unwrap_err();
            assert!(matches!(kind(&err), Some(VfsError::InvalidPath { .. })));
        }

        #[test]
        fn test_new_normalize_path() -> Result<()> {
            let temp_dir = setup_test_env();
            fs::create_dir(temp_dir.path().join("subdir"))?;
            let messy = temp_dir.path().join("././subdir/../subdir");
            let root = FsRoot::new(&messy, false)?;
            assert_eq!(root.location(), temp_dir.path().join("subdir"));
            Ok(())
        }

        #[test]
        fn test_new_special_characters() -> Result<()> {
            let temp_dir = setup_test_env();
            let special = temp_dir.path().join("папка с пробелами и юникод!");
            fs::create_dir(&special)?;
            let root = FsRoot::new(&special, true)?;
            root.make_directory(&p("ok"))?;
            assert!(special.join("ok").is_dir());
            Ok(())
        }
    }

    mod predicates {
        use super::*;

        #[test]
        fn test_is_dir_and_is_file() -> Result<()> {
            let temp_dir = setup_test_env();
            fs::create_dir(temp_dir.path().join("src"))?;
            fs::write(temp_dir.path().join("data.json"), "{}")?;
            let root = FsRoot::new(temp_dir.path(), false)?;

            assert!(root.is_directory(&p("src")));
            assert!(!root.is_file(&p("src")));
            assert!(root.is_file(&p("data.json")));
            assert!(!root.is_directory(&p("data.json")));
            assert!(!root.path_exists(&p("missing")));
            Ok(())
        }

        #[cfg(unix)]
        #[test]
        fn test_dangling_symlink_exists_but_is_neither() -> Result<()> {
            let temp_dir = setup_test_env();
            std::os::unix::fs::symlink(
                temp_dir.path().join("nowhere"),
                temp_dir.path().join("dangling"),
            )?;
            let root = FsRoot::new(temp_dir.path(), false)?;
            assert!(root.path_exists(&p("dangling")));
            assert!(!root.is_file(&p("dangling")));
            assert!(!root.is_directory(&p("dangling")));
            Ok(())
        }
    }

    mod streams {
        use super::*;

        #[test]
        fn test_write_then_read() -> Result<()> {
            let temp_dir = setup_test_env();
            let root = FsRoot::new(temp_dir.path(), true)?;
            {
                let mut w = root.open_write(&p("a.txt"))?;
                w.write_all(b"abc")?;
            }
            let mut content = String::new();
            root.open_read(&p("a.txt"))?.read_to_string(&mut content)?;
            assert_eq!(content, "abc");
            Ok(())
        }

        #[test]
        fn test_open_missing_keeps_io_error() -> Result<()> {
            let temp_dir = setup_test_env();
            let root = FsRoot::new(temp_dir.path(), true)?;
            let err = root.open_read(&p("missing.txt")).err().unwrap();
            let io_err = err.downcast_ref::<io::Error>().unwrap();
            assert_eq!(io_err.kind(), io::ErrorKind::NotFound);
            assert!(err.to_string().contains("missing.txt"));
            Ok(())
        }
    }

    mod permissions {
        use super::*;

        #[test]
        fn test_read_only_rejects_all_mutation() -> Result<()> {
            let temp_dir = setup_test_env();
            fs::write(temp_dir.path().join("keep.txt"), "keep")?;
            let root = FsRoot::new(temp_dir.path(), false)?;

            let err = root.open_write(&p("new.txt")).err().unwrap();
            assert!(matches!(kind(&err), Some(VfsError::ReadOnly(_))));
            let err = root.make_directory(&p("d")).unwrap_err();
            assert!(matches!(kind(&err), Some(VfsError::ReadOnly(_))));
            let err = root.remove_node(&p("keep.txt"), false).unwrap_err();
            assert!(matches!(kind(&err), Some(VfsError::ReadOnly(_))));

            assert!(temp_dir.path().join("keep.txt").exists());
            assert!(!temp_dir.path().join("new.txt").exists());
            Ok(())
        }
    }

    mod remove {
        use super::*;

        #[test]
        fn test_remove_non_empty_dir_needs_recursive() -> Result<()> {
            let temp_dir = setup_test_env();
            fs::create_dir_all(temp_dir.path().join("a/b"))?;
            let root = FsRoot::new(temp_dir.path(), true)?;
            assert!(root.remove_node(&p("a"), false).is_err());
            root.remove_node(&p("a"), true)?;
            assert!(!temp_dir.path().join("a").exists());
            Ok(())
        }

        #[test]
        fn test_remove_root_fails() -> Result<()> {
            let temp_dir = setup_test_env();
            let root = FsRoot::new(temp_dir.path(), true)?;
            let err = root.remove_node(&RelPath::new(), true).unwrap_err();
            assert!(matches!(kind(&err), Some(VfsError::InvalidTarget { .. })));
            assert!(temp_dir.path().exists());
            Ok(())
        }
    }

    mod list {
        use super::*;

        #[test]
        fn test_list_names() -> Result<()> {
            let temp_dir = setup_test_env();
            fs::write(temp_dir.path().join("1.csv"), "")?;
            fs::create_dir(temp_dir.path().join("sub"))?;
            let root = FsRoot::new(temp_dir.path(), false)?;
            let mut names = root.list(&RelPath::new())?;
            names.sort();
            assert_eq!(names, ["1.csv", "sub"]);
            Ok(())
        }

        #[test]
        fn test_list_file_fails() -> Result<()> {
            let temp_dir = setup_test_env();
            fs::write(temp_dir.path().join("1.csv"), "")?;
            let root = FsRoot::new(temp_dir.path(), false)?;
            assert!(root.list(&p("1.csv")).is_err());
            Ok(())
        }

        #[cfg(unix)]
        #[test]
        fn test_backslash_names_are_listed_and_copied() -> Result<()> {
            use std::rc::Rc;

            use crate::vfs::{MapRoot, Tree, copy_into};

            let temp_dir = setup_test_env();
            fs::write(temp_dir.path().join("ok.csv"), "ok")?;
            fs::write(temp_dir.path().join("a\\b.csv"), "odd")?;
            let src = Tree::new(Rc::new(FsRoot::new(temp_dir.path(), false)?));

            let children = src.children()?.collect::<Result<Vec<_>>>()?;
            assert_eq!(children.len(), 2);
            assert!(children.iter().all(|c| c.is_blob()));

            let dst = Tree::new(Rc::new(MapRoot::new()));
            copy_into(&dst, &src)?;
            assert_eq!(dst.get_blob(RelPath::from_components(["a\\b.csv"])?)?.read_string()?, "odd");
            assert_eq!(dst.get_blob("ok.csv")?.read_string()?, "ok");
            assert!(src.render(2)?.contains("a\\b.csv"));
            Ok(())
        }
    }
}
