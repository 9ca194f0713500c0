//! Hierarchical data trees on top of pluggable storage roots.
//!
//! ### Overview
//!
//! `blobtree` lets you address data as a tree of named nodes, whatever the
//! backing store is. A [`Tree`] is a directory-like node and a [`Blob`] is a
//! file-like leaf; both are just a shared root plus a [`RelPath`] inside it.
//! Roots implement the [`StorageRoot`] capability trait: [`FsRoot`] maps to a
//! host location, [`MapRoot`] keeps everything in memory, and [`TempFsRoot`]
//! owns a temporary location that is removed when the last node referring to
//! it goes away.
//!
//! **Key ideas**:
//! - **Live nodes**: nodes are never cached; every query goes to the root.
//! - **Fixed permissions**: a root is writeable or not from construction on.
//! - **Safe hand-over**: temporary data is moved into a permanent tree with
//!   [`Tree::insert`], which restores any replaced data if the move fails.
//! - **Drivers**: [`DriverRegistry`] builds nodes from a [`ConnectConfig`]
//!   and hands them to a continuation.
//!
//! ### Example
//!
//! ```
//! use std::rc::Rc;
//! use blobtree::{FsRoot, Tree, temp_tree_in};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let data = Tree::new(Rc::new(FsRoot::new(dir.path(), true).unwrap()));
//!
//! let staging = temp_tree_in(dir.path()).unwrap();
//! staging.mkfile("a.csv", Some(b"1,2\n")).unwrap();
//! data.insert("csvs", &staging).unwrap();
//!
//! assert_eq!(data.get_blob("csvs/a.csv").unwrap().read_string().unwrap(), "1,2\n");
//! ```

mod core;
mod driver;
mod error;
mod path;
mod vfs;

pub use core::{LocalRoot, Result, StorageRoot};
pub use driver::{
    ConnectConfig, ConnectFn, Continuation, DataType, DriverRegistry, DynNode, FILESYSTEM_DRIVER,
    connect_filesystem,
};
pub use error::VfsError;
pub use path::{AbsPath, IntoRelPath, RelPath};
pub use vfs::{
    Blob, Children, EntryType, FsRoot, MapRoot, MoveState, MoveWithRollback, Node, TempData,
    TempFsRoot, TempLocation, Tree, classify, copy_into, render_tree, sweep_orphans, temp_blob,
    temp_blob_in, temp_tree, temp_tree_in,
};
