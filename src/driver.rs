//! Named storage drivers.
//!
//! A [`DriverRegistry`] maps a driver name to a connect function. Connecting
//! builds a node from a [`ConnectConfig`] and hands it to a continuation;
//! the node never outlives that call.

use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::anyhow;
use serde::Deserialize;
use tracing::debug;

use crate::core::{Result, StorageRoot};
use crate::error::VfsError;
use crate::vfs::{Blob, FsRoot, Node, Tree};

/// Name under which [`connect_filesystem`] is registered by default.
pub const FILESYSTEM_DRIVER: &str = "FileSystem";

/// What a configured location is expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum DataType {
    #[serde(alias = "File")]
    Blob,
    #[serde(alias = "FileTree")]
    BlobTree,
}

/// Storage section of a dataset description.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectConfig {
    /// Native location of the data.
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub data_type: DataType,
    /// Open the root writeable. Defaults to read-only.
    #[serde(default)]
    pub write: bool,
    /// For trees: start at this sub-tree instead of the top.
    #[serde(default)]
    pub subpath: Option<String>,
}

/// Node type handed to continuations; drivers may use any root.
pub type DynNode = Node<dyn StorageRoot>;

pub type Continuation<'a> = dyn FnMut(DynNode) -> Result<()> + 'a;

/// `connect(config, continuation)`: build the node and call the continuation
/// with it exactly once.
pub type ConnectFn = fn(&ConnectConfig, &mut Continuation<'_>) -> Result<()>;

/// Registration table of storage drivers, built explicitly and passed to
/// whatever resolves dataset configuration.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, ConnectFn>,
}

impl DriverRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the filesystem driver registered as [`FILESYSTEM_DRIVER`].
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(FILESYSTEM_DRIVER, connect_filesystem);
        registry
    }

    /// Registers `connect` under `name`, returning the driver it replaced.
    pub fn register(&mut self, name: impl Into<String>, connect: ConnectFn) -> Option<ConnectFn> {
        self.drivers.insert(name.into(), connect)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Connects through the driver called `driver` and returns what `f`
    /// returns.
    ///
    /// Fails with [`VfsError::UnknownDriver`] for unregistered names.
    pub fn connect<T, F>(&self, driver: &str, config: &ConnectConfig, f: F) -> Result<T>
    where
        F: FnOnce(DynNode) -> Result<T>,
    {
        let connect = self
            .drivers
            .get(driver)
            .ok_or_else(|| VfsError::UnknownDriver(driver.to_string()))?;
        debug!("connecting {:?} via driver {}", config.path, driver);

        let mut f = Some(f);
        let mut out = None;
        connect(config, &mut |node: DynNode| {
            let f = f
                .take()
                .ok_or_else(|| anyhow!("driver {driver:?} invoked its continuation twice"))?;
            out = Some(f(node)?);
            Ok(())
        })?;
        out.ok_or_else(|| anyhow!("driver {driver:?} returned without invoking its continuation"))
    }
}

/// Connect function of the local filesystem driver.
///
/// `path` must be an existing file for [`DataType::Blob`] and an existing
/// directory for [`DataType::BlobTree`]; otherwise this fails with
/// [`VfsError::TypeMismatch`] before the continuation runs.
pub fn connect_filesystem(config: &ConnectConfig, f: &mut Continuation<'_>) -> Result<()> {
    let path = &config.path;
    let node = match config.data_type {
        DataType::Blob => {
            if !path.is_file() {
                return Err(VfsError::TypeMismatch {
                    path: path.display().to_string(),
                    expected: "file",
                }
                .into());
            }
            let root: Rc<dyn StorageRoot> = Rc::new(FsRoot::new(path, config.write)?);
            Node::Blob(Blob::new(root))
        }
        DataType::BlobTree => {
            if !path.is_dir() {
                return Err(VfsError::TypeMismatch {
                    path: path.display().to_string(),
                    expected: "directory",
                }
                .into());
            }
            let root: Rc<dyn StorageRoot> = Rc::new(FsRoot::new(path, config.write)?);
            let tree = Tree::new(root);
            match &config.subpath {
                Some(sub) => Node::Tree(tree.get_tree(sub.as_str())?),
                None => Node::Tree(tree),
            }
        }
    };
    f(node)
}
