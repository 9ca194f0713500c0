use std::fmt;
use std::io::{Read, Write};
use std::rc::Rc;

use anyhow::Context;

use crate::core::{Result, StorageRoot};
use crate::path::{AbsPath, RelPath};

/// A leaf node: one opaque byte stream, never any children.
pub struct Blob<R: StorageRoot + ?Sized> {
    root: Rc<R>,
    path: RelPath,
}

impl<R: StorageRoot + ?Sized> Blob<R> {
    /// A blob at the top of `root` (for roots whose location is a single file).
    pub fn new(root: Rc<R>) -> Self {
        Self::at(root, RelPath::new())
    }

    /// A blob at `path` below `root`. Existence is not checked here.
    pub fn at(root: Rc<R>, path: RelPath) -> Self {
        Self { root, path }
    }

    pub fn root(&self) -> &Rc<R> {
        &self.root
    }

    pub fn path(&self) -> &RelPath {
        &self.path
    }

    pub fn abs_path(&self) -> AbsPath<R> {
        AbsPath::new(Rc::clone(&self.root), self.path.clone())
    }

    /// Last path component, `None` when the blob is its root's top.
    pub fn name(&self) -> Option<&str> {
        self.path.name()
    }

    pub fn open_read(&self) -> Result<Box<dyn Read>> {
        self.root.open_read(&self.path)
    }

    pub fn open_write(&self) -> Result<Box<dyn Write>> {
        self.root.open_write(&self.path)
    }

    /// Runs `f` with a reader over the blob. The stream is closed when this
    /// returns, whether `f` succeeded or not.
    pub fn with_reader<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Read) -> Result<T>,
    {
        let mut reader = self.open_read()?;
        f(reader.as_mut())
    }

    /// Runs `f` with a writer that replaces the blob's content, flushing
    /// afterwards. The stream is closed on every exit path.
    pub fn with_writer<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Write) -> Result<T>,
    {
        let mut writer = self.open_write()?;
        let out = f(writer.as_mut())?;
        writer
            .flush()
            .with_context(|| format!("failed to flush {}", self))?;
        Ok(out)
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        self.with_reader(|r| {
            let mut content = Vec::new();
            r.read_to_end(&mut content)
                .with_context(|| format!("failed to read {}", self))?;
            Ok(content)
        })
    }

    pub fn read_string(&self) -> Result<String> {
        self.with_reader(|r| {
            let mut content = String::new();
            r.read_to_string(&mut content)
                .with_context(|| format!("failed to read {}", self))?;
            Ok(content)
        })
    }

    /// Replaces the entire content of the blob.
    pub fn write_bytes(&self, content: &[u8]) -> Result<()> {
        self.with_writer(|w| {
            w.write_all(content)
                .with_context(|| format!("failed to write {}", self))
        })
    }
}

impl<R: StorageRoot + ?Sized> Clone for Blob<R> {
    fn clone(&self) -> Self {
        Self::at(Rc::clone(&self.root), self.path.clone())
    }
}

impl<R: StorageRoot + ?Sized> fmt::Debug for Blob<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob({})", self.abs_path())
    }
}

impl<R: StorageRoot + ?Sized> fmt::Display for Blob<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abs_path())
    }
}
