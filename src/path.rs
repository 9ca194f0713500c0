//! Root-independent names for nodes.
//!
//! A [`RelPath`] is a sequence of validated components, always relative to
//! some root; the empty sequence names the root itself. An [`AbsPath`] binds
//! a `RelPath` to a concrete root.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::core::{Result, StorageRoot};
use crate::error::VfsError;

/// Relative location below a storage root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelPath {
    components: Vec<String>,
}

impl RelPath {
    /// The root itself.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a path from individual components, validating each one.
    pub fn from_components<I, S>(components: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let components = components
            .into_iter()
            .map(|c| -> Result<String> {
                let c: String = c.into();
                validate_component(&c)?;
                Ok(c)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { components })
    }

    /// Parses a `/`-separated path such as `"data/2024/1.csv"`.
    /// The empty string is the root. Leading, trailing or doubled separators
    /// are rejected.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self::new());
        }
        Self::from_components(s.split('/'))
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Last component, `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// Everything but the last component, `None` for the root.
    pub fn parent(&self) -> Option<RelPath> {
        let (_, init) = self.components.split_last()?;
        Some(Self {
            components: init.to_vec(),
        })
    }

    /// Concatenation. The empty path is the identity on both sides.
    pub fn join(&self, extra: &RelPath) -> RelPath {
        let mut components = Vec::with_capacity(self.len() + extra.len());
        components.extend_from_slice(&self.components);
        components.extend_from_slice(&extra.components);
        Self { components }
    }

    /// Appends a single component.
    pub fn join_name(&self, name: &str) -> Result<RelPath> {
        validate_component(name)?;
        let mut joined = self.clone();
        joined.components.push(name.to_string());
        Ok(joined)
    }

    /// True if `self` is `prefix` or lies below it.
    pub fn starts_with(&self, prefix: &RelPath) -> bool {
        self.components.starts_with(&prefix.components)
    }
}

fn validate_component(component: &str) -> Result<()> {
    let reason = if component.is_empty() {
        Some("empty component")
    } else if component == "." || component == ".." {
        Some("relative components are not allowed")
    } else if component.contains(|c: char| c == '/' || std::path::is_separator(c)) {
        Some("contains a path separator")
    } else if component.contains('\0') {
        Some("contains a NUL byte")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(VfsError::InvalidPath {
            component: component.to_string(),
            reason,
        }
        .into()),
        None => Ok(()),
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.components.join("/"))
    }
}

impl FromStr for RelPath {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Anything usable as a location below a tree: `&str`/`String` (parsed with
/// [`RelPath::parse`]) or a `RelPath`.
pub trait IntoRelPath {
    fn into_rel_path(self) -> Result<RelPath>;
}

impl IntoRelPath for RelPath {
    fn into_rel_path(self) -> Result<RelPath> {
        Ok(self)
    }
}

impl IntoRelPath for &RelPath {
    fn into_rel_path(self) -> Result<RelPath> {
        Ok(self.clone())
    }
}

impl IntoRelPath for &str {
    fn into_rel_path(self) -> Result<RelPath> {
        RelPath::parse(self)
    }
}

impl IntoRelPath for String {
    fn into_rel_path(self) -> Result<RelPath> {
        RelPath::parse(&self)
    }
}

impl IntoRelPath for &String {
    fn into_rel_path(self) -> Result<RelPath> {
        RelPath::parse(self)
    }
}

/// A `RelPath` bound to a root. Says nothing about existence.
pub struct AbsPath<R: StorageRoot + ?Sized> {
    root: Rc<R>,
    path: RelPath,
}

impl<R: StorageRoot + ?Sized> AbsPath<R> {
    pub fn new(root: Rc<R>, path: RelPath) -> Self {
        Self { root, path }
    }

    pub fn root(&self) -> &Rc<R> {
        &self.root
    }

    pub fn path(&self) -> &RelPath {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.root.path_exists(&self.path)
    }
}

impl<R: StorageRoot + ?Sized> Clone for AbsPath<R> {
    fn clone(&self) -> Self {
        Self {
            root: Rc::clone(&self.root),
            path: self.path.clone(),
        }
    }
}

impl<R: StorageRoot + ?Sized> fmt::Debug for AbsPath<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbsPath")
            .field("root", &self.root.to_string())
            .field("path", &self.path)
            .finish()
    }
}

impl<R: StorageRoot + ?Sized> fmt::Display for AbsPath<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "{}", self.root)
        } else {
            write!(f, "{}/{}", self.root, self.path)
        }
    }
}
