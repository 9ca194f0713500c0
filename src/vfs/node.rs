use std::fmt;
use std::rc::Rc;

use crate::core::{Result, StorageRoot};
use crate::error::VfsError;
use crate::path::{AbsPath, RelPath};
use crate::vfs::entry::{EntryType, classify};
use crate::vfs::{Blob, Tree};

/// Result of indexing a tree: a directory-like node, a leaf, or a path that
/// exists but is neither.
pub enum Node<R: StorageRoot + ?Sized> {
    Tree(Tree<R>),
    Blob(Blob<R>),
    Path(AbsPath<R>),
}

impl<R: StorageRoot + ?Sized> Node<R> {
    /// Classifies `path` against `root` right now and wraps it accordingly.
    pub fn resolve(root: Rc<R>, path: RelPath) -> Result<Self> {
        Ok(match classify(&*root, &path) {
            EntryType::Tree => Node::Tree(Tree::at(root, path)),
            EntryType::Blob => Node::Blob(Blob::at(root, path)),
            EntryType::Other => Node::Path(AbsPath::new(root, path)),
            EntryType::NotFound => {
                return Err(VfsError::not_found(AbsPath::new(root, path)).into());
            }
        })
    }

    pub fn root(&self) -> &Rc<R> {
        match self {
            Node::Tree(t) => t.root(),
            Node::Blob(b) => b.root(),
            Node::Path(p) => p.root(),
        }
    }

    pub fn path(&self) -> &RelPath {
        match self {
            Node::Tree(t) => t.path(),
            Node::Blob(b) => b.path(),
            Node::Path(p) => p.path(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.path().name()
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, Node::Tree(_))
    }

    pub fn is_blob(&self) -> bool {
        matches!(self, Node::Blob(_))
    }

    pub fn as_tree(&self) -> Option<&Tree<R>> {
        match self {
            Node::Tree(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Blob<R>> {
        match self {
            Node::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_tree(self) -> Option<Tree<R>> {
        match self {
            Node::Tree(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_blob(self) -> Option<Blob<R>> {
        match self {
            Node::Blob(b) => Some(b),
            _ => None,
        }
    }
}

impl<R: StorageRoot + ?Sized> Clone for Node<R> {
    fn clone(&self) -> Self {
        match self {
            Node::Tree(t) => Node::Tree(t.clone()),
            Node::Blob(b) => Node::Blob(b.clone()),
            Node::Path(p) => Node::Path(p.clone()),
        }
    }
}

impl<R: StorageRoot + ?Sized> fmt::Debug for Node<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Tree(t) => fmt::Debug::fmt(t, f),
            Node::Blob(b) => fmt::Debug::fmt(b, f),
            Node::Path(p) => fmt::Debug::fmt(p, f),
        }
    }
}

impl<R: StorageRoot + ?Sized> fmt::Display for Node<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Tree(t) => write!(f, "{t}"),
            Node::Blob(b) => write!(f, "{b}"),
            Node::Path(p) => write!(f, "{p}"),
        }
    }
}
