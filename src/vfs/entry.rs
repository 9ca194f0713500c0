use crate::core::StorageRoot;
use crate::path::RelPath;

/// What a root currently holds at a path.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntryType {
    Tree,
    Blob,
    /// Exists, but is neither a directory nor a regular file.
    Other,
    NotFound,
}

impl EntryType {
    pub fn is_tree(&self) -> bool {
        *self == EntryType::Tree
    }

    pub fn is_blob(&self) -> bool {
        *self == EntryType::Blob
    }

    pub fn exists(&self) -> bool {
        *self != EntryType::NotFound
    }
}

/// Asks `root` what lives at `path`: directory first, then file, then the
/// generic existence check. The answer is never cached.
pub fn classify<R: StorageRoot + ?Sized>(root: &R, path: &RelPath) -> EntryType {
    if root.is_directory(path) {
        EntryType::Tree
    } else if root.is_file(path) {
        EntryType::Blob
    } else if root.path_exists(path) {
        EntryType::Other
    } else {
        EntryType::NotFound
    }
}
