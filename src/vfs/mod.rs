mod blob;
mod entry;
mod fs_root;
mod map_root;
mod node;
mod temp_root;
mod transfer;
mod tree;

pub use blob::Blob;
pub use entry::{EntryType, classify};
pub use fs_root::FsRoot;
pub use map_root::MapRoot;
pub use node::Node;
pub use temp_root::{
    TempFsRoot, TempLocation, sweep_orphans, temp_blob, temp_blob_in, temp_tree, temp_tree_in,
};
pub use transfer::{MoveState, MoveWithRollback, TempData};
pub use tree::{Children, Tree, copy_into, render_tree};
