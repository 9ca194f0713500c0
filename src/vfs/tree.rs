//! Directory-like nodes and the generic operations built purely on the
//! [`StorageRoot`] contract: indexing, child enumeration, recursive copy and
//! rendering.

use std::fmt::{self, Write as _};
use std::io;
use std::rc::Rc;

use anyhow::Context;
use tracing::warn;

use crate::core::{Result, StorageRoot};
use crate::error::VfsError;
use crate::path::{AbsPath, IntoRelPath, RelPath};
use crate::vfs::entry::classify;
use crate::vfs::{Blob, Node};

/// A directory-like node: `(root, path)`, enumerable into children.
pub struct Tree<R: StorageRoot + ?Sized> {
    root: Rc<R>,
    path: RelPath,
}

impl<R: StorageRoot + ?Sized> Tree<R> {
    /// A tree at the top of `root`.
    pub fn new(root: Rc<R>) -> Self {
        Self::at(root, RelPath::new())
    }

    /// A tree at `path` below `root`. Existence is not checked here.
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

    /// Last path component, `None` for a tree at its root's top.
    pub fn name(&self) -> Option<&str> {
        self.path.name()
    }

    /// Resolves `path` below this tree into a [`Node`], consulting the root
    /// on every call.
    ///
    /// Fails with [`VfsError::NotFound`] if nothing lives there.
    pub fn index(&self, path: impl IntoRelPath) -> Result<Node<R>> {
        let path = self.path.join(&path.into_rel_path()?);
        Node::resolve(Rc::clone(&self.root), path)
    }

    /// Like [`index`](Tree::index), but insists on a tree.
    pub fn get_tree(&self, path: impl IntoRelPath) -> Result<Tree<R>> {
        match self.index(path)? {
            Node::Tree(t) => Ok(t),
            other => Err(VfsError::TypeMismatch {
                path: other.to_string(),
                expected: "tree",
            }
            .into()),
        }
    }

    /// Like [`index`](Tree::index), but insists on a blob.
    pub fn get_blob(&self, path: impl IntoRelPath) -> Result<Blob<R>> {
        match self.index(path)? {
            Node::Blob(b) => Ok(b),
            other => Err(VfsError::TypeMismatch {
                path: other.to_string(),
                expected: "blob",
            }
            .into()),
        }
    }

    /// True if anything lives at `path` below this tree.
    pub fn contains(&self, path: impl IntoRelPath) -> Result<bool> {
        let path = self.path.join(&path.into_rel_path()?);
        Ok(classify(&*self.root, &path).exists())
    }

    /// Names of the immediate children, in the root's enumeration order.
    pub fn names(&self) -> Result<Vec<String>> {
        self.root.list(&self.path)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.names()?.is_empty())
    }

    /// Lazily classified children. The listing is taken once up front; each
    /// child is classified only when the iterator reaches it.
    pub fn children(&self) -> Result<Children<R>> {
        Ok(Children {
            root: Rc::clone(&self.root),
            base: self.path.clone(),
            names: self.names()?.into_iter(),
        })
    }

    /// Creates the directory at `path` below this tree, along with any
    /// missing parents.
    ///
    /// Fails with [`VfsError::AlreadyExists`] if `path` is already taken.
    pub fn mkdir(&self, path: impl IntoRelPath) -> Result<Tree<R>> {
        let rel = path.into_rel_path()?;
        let full = self.path.join(&rel);
        if self.root.path_exists(&full) {
            return Err(VfsError::AlreadyExists(self.describe(&full)).into());
        }
        self.ensure_dir(&rel)
    }

    /// Creates (or truncates) the file at `path` below this tree, creating
    /// missing parent directories. Writes `content` if given.
    pub fn mkfile(&self, path: impl IntoRelPath, content: Option<&[u8]>) -> Result<Blob<R>> {
        let rel = path.into_rel_path()?;
        if rel.is_root() {
            return Err(VfsError::invalid_target(self, "a file needs a name").into());
        }
        if let Some(parent) = rel.parent() {
            self.ensure_dir(&parent)?;
        }
        let blob = Blob::at(Rc::clone(&self.root), self.path.join(&rel));
        blob.write_bytes(content.unwrap_or_default())?;
        Ok(blob)
    }

    /// Removes whatever lives at `path` below this tree, recursively.
    pub fn rm(&self, path: impl IntoRelPath) -> Result<()> {
        let rel = path.into_rel_path()?;
        if rel.is_root() {
            return Err(VfsError::invalid_target(self, "a tree cannot remove itself").into());
        }
        let full = self.path.join(&rel);
        if !self.root.path_exists(&full) {
            return Err(VfsError::not_found(self.describe(&full)).into());
        }
        self.root.remove_node(&full, true)
    }

    /// Recursively mirrors every descendant of `src` into this tree.
    pub fn copy_from<S: StorageRoot + ?Sized>(&self, src: &Tree<S>) -> Result<()> {
        copy_into(self, src)
    }

    /// Nested listing down to `max_depth` levels. See [`render_tree`].
    pub fn render(&self, max_depth: usize) -> Result<String> {
        render_tree(&Node::Tree(self.clone()), max_depth)
    }

    /// Walks `rel` creating each missing directory; existing directories are
    /// kept as they are.
    pub(crate) fn ensure_dir(&self, rel: &RelPath) -> Result<Tree<R>> {
        let mut built = self.path.clone();
        for name in rel.components() {
            built = built.join_name(name)?;
            if !self.root.is_directory(&built) {
                self.root.make_directory(&built)?;
            }
        }
        Ok(Tree::at(Rc::clone(&self.root), built))
    }

    fn describe(&self, path: &RelPath) -> String {
        AbsPath::new(Rc::clone(&self.root), path.clone()).to_string()
    }
}

impl<R: StorageRoot + ?Sized> Clone for Tree<R> {
    fn clone(&self) -> Self {
        Self::at(Rc::clone(&self.root), self.path.clone())
    }
}

impl<R: StorageRoot + ?Sized> fmt::Debug for Tree<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tree({})", self.abs_path())
    }
}

impl<R: StorageRoot + ?Sized> fmt::Display for Tree<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abs_path())
    }
}

/// Iterator over the children of a [`Tree`].
///
/// The size hint is always `(0, None)`; listings are not pre-counted.
pub struct Children<R: StorageRoot + ?Sized> {
    root: Rc<R>,
    base: RelPath,
    names: std::vec::IntoIter<String>,
}

impl<R: StorageRoot + ?Sized> Iterator for Children<R> {
    type Item = Result<Node<R>>;

    fn next(&mut self) -> Option<Self::Item> {
        let name = self.names.next()?;
        Some(
            self.base
                .join_name(&name)
                .and_then(|path| Node::resolve(Rc::clone(&self.root), path)),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, None)
    }
}

/// Recursively mirrors every descendant of `src` into `dst`, creating
/// directories as needed and streaming each leaf into a fresh destination
/// blob.
///
/// The first failure aborts the copy. Whatever was copied before it stays in
/// `dst`.
///
/// Fails with [`VfsError::InvalidTarget`] if `dst` is `src` itself or lies
/// below it on the same root.
pub fn copy_into<D, S>(dst: &Tree<D>, src: &Tree<S>) -> Result<()>
where
    D: StorageRoot + ?Sized,
    S: StorageRoot + ?Sized,
{
    let same_root = std::ptr::addr_eq(Rc::as_ptr(dst.root()), Rc::as_ptr(src.root()));
    if same_root && dst.path().starts_with(src.path()) {
        return Err(VfsError::invalid_target(dst, "cannot copy a tree into itself").into());
    }
    for child in src.children()? {
        let child = child?;
        let Some(name) = child.name().map(str::to_string) else {
            continue;
        };
        match child {
            Node::Tree(sub) => {
                let target = dst.ensure_dir(&RelPath::from_components([name])?)?;
                copy_into(&target, &sub)?;
            }
            Node::Blob(blob) => {
                let target = Blob::at(Rc::clone(dst.root()), dst.path().join_name(&name)?);
                blob.with_reader(|r| {
                    target.with_writer(|w| {
                        io::copy(r, w)
                            .with_context(|| format!("failed to copy {} to {}", blob, target))
                    })
                })?;
            }
            Node::Path(other) => {
                warn!("skipping {}: neither a tree nor a blob", other);
            }
        }
    }
    Ok(())
}

const ELIDED: &str = "⋮";

/// Human-readable nested listing of `node`.
///
/// Children are shown down to `max_depth` levels below `node`; a non-empty
/// tree at the limit gets a single `⋮` line instead of its contents.
pub fn render_tree<R: StorageRoot + ?Sized>(node: &Node<R>, max_depth: usize) -> Result<String> {
    let mut out = String::new();
    match node {
        Node::Tree(tree) => {
            writeln!(out, "📂 Tree {}", tree)?;
            render_children(&mut out, tree, "", max_depth)?;
        }
        Node::Blob(blob) => writeln!(out, "📄 Blob {}", blob)?,
        Node::Path(path) => writeln!(out, "{}", path)?,
    }
    Ok(out)
}

fn render_children<R: StorageRoot + ?Sized>(
    out: &mut String,
    tree: &Tree<R>,
    prefix: &str,
    depth_left: usize,
) -> Result<()> {
    if depth_left == 0 {
        if !tree.is_empty()? {
            writeln!(out, "{prefix}└─ {ELIDED}")?;
        }
        return Ok(());
    }

    let children = tree.children()?.collect::<Result<Vec<_>>>()?;
    let count = children.len();
    for (i, child) in children.iter().enumerate() {
        let (branch, indent) = if i + 1 == count {
            ("└─ ", "   ")
        } else {
            ("├─ ", "│  ")
        };
        let name = child.name().unwrap_or_default();
        match child {
            Node::Tree(sub) => {
                writeln!(out, "{prefix}{branch}📂 {name}")?;
                render_children(out, sub, &format!("{prefix}{indent}"), depth_left - 1)?;
            }
            Node::Blob(_) => writeln!(out, "{prefix}{branch}📄 {name}")?,
            Node::Path(_) => writeln!(out, "{prefix}{branch}{name}")?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MapRoot;

    fn kind(err: &anyhow::Error) -> Option<&VfsError> {
        err.downcast_ref::<VfsError>()
    }

    fn setup_test_tree() -> Result<Tree<MapRoot>> {
        let tree = Tree::new(Rc::new(MapRoot::new()));
        tree.mkfile("1.csv", Some(b"a,b\n1,2\n"))?;
        tree.mkfile("2.csv", Some(b"a,b\n3,4\n"))?;
        tree.mkfile("sub/deeper/note.txt", Some(b"hi"))?;
        Ok(tree)
    }

    mod index {
        use super::*;

        #[test]
        fn test_index_blob_and_tree() -> Result<()> {
            let tree = setup_test_tree()?;
            assert!(tree.index("1.csv")?.is_blob());
            assert!(tree.index("sub")?.is_tree());
            assert!(tree.index("sub/deeper/note.txt")?.is_blob());
            Ok(())
        }

        #[test]
        fn test_index_missing_is_not_found() -> Result<()> {
            let tree = setup_test_tree()?;
            for missing in ["nope", "sub/nope", "1.csv/inside"] {
                let err = tree.index(missing).unwrap_err();
                assert!(matches!(kind(&err), Some(VfsError::NotFound(_))), "{missing}");
            }
            Ok(())
        }

        #[test]
        fn test_index_is_relative_to_subtree() -> Result<()> {
            let tree = setup_test_tree()?;
            let sub = tree.get_tree("sub")?;
            let note = sub.get_blob("deeper/note.txt")?;
            assert_eq!(note.path(), &RelPath::parse("sub/deeper/note.txt")?);
            assert_eq!(note.read_string()?, "hi");
            Ok(())
        }

        #[test]
        fn test_get_wrong_kind() -> Result<()> {
            let tree = setup_test_tree()?;
            let err = tree.get_tree("1.csv").unwrap_err();
            assert!(matches!(kind(&err), Some(VfsError::TypeMismatch { .. })));
            let err = tree.get_blob("sub").unwrap_err();
            assert!(matches!(kind(&err), Some(VfsError::TypeMismatch { .. })));
            Ok(())
        }

        #[test]
        fn test_classification_reflects_mutation() -> Result<()> {
            let tree = setup_test_tree()?;
            assert!(tree.index("1.csv")?.is_blob());
            assert!(tree.index("1.csv")?.is_blob());
            tree.rm("1.csv")?;
            tree.mkdir("1.csv")?;
            assert!(tree.index("1.csv")?.is_tree());
            Ok(())
        }
    }

    mod children {
        use super::*;

        #[test]
        fn test_children_names_and_kinds() -> Result<()> {
            let tree = setup_test_tree()?;
            let mut names: Vec<_> = tree
                .children()?
                .map(|c| c.map(|n| (n.name().unwrap_or_default().to_string(), n.is_tree())))
                .collect::<Result<_>>()?;
            names.sort();
            assert_eq!(
                names,
                vec![
                    ("1.csv".to_string(), false),
                    ("2.csv".to_string(), false),
                    ("sub".to_string(), true),
                ]
            );
            Ok(())
        }

        #[test]
        fn test_children_size_unknown() -> Result<()> {
            let tree = setup_test_tree()?;
            assert_eq!(tree.children()?.size_hint(), (0, None));
            Ok(())
        }

        #[test]
        fn test_children_of_missing_tree_fails() {
            let tree = Tree::at(Rc::new(MapRoot::new()), RelPath::parse("ghost").unwrap());
            assert!(tree.children().is_err());
        }
    }

    mod mutation {
        use super::*;

        #[test]
        fn test_mkdir_creates_parents() -> Result<()> {
            let tree = Tree::new(Rc::new(MapRoot::new()));
            tree.mkdir("a/b/c")?;
            assert!(tree.index("a")?.is_tree());
            assert!(tree.index("a/b/c")?.is_tree());
            Ok(())
        }

        #[test]
        fn test_mkdir_already_exists() -> Result<()> {
            let tree = setup_test_tree()?;
            let err = tree.mkdir("sub").unwrap_err();
            assert!(matches!(kind(&err), Some(VfsError::AlreadyExists(_))));
            Ok(())
        }

        #[test]
        fn test_rm_recursive() -> Result<()> {
            let tree = setup_test_tree()?;
            tree.rm("sub")?;
            assert!(!tree.contains("sub")?);
            assert!(!tree.contains("sub/deeper/note.txt")?);
            Ok(())
        }

        #[test]
        fn test_rm_missing_and_self() -> Result<()> {
            let tree = setup_test_tree()?;
            let err = tree.rm("missing").unwrap_err();
            assert!(matches!(kind(&err), Some(VfsError::NotFound(_))));
            let err = tree.rm("").unwrap_err();
            assert!(matches!(kind(&err), Some(VfsError::InvalidTarget { .. })));
            Ok(())
        }

        #[test]
        fn test_read_only_root_rejects_mutation() -> Result<()> {
            let tree = Tree::new(Rc::new(MapRoot::read_only()));
            let err = tree.mkdir("a").unwrap_err();
            assert!(matches!(kind(&err), Some(VfsError::ReadOnly(_))));
            let err = tree.mkfile("a.txt", None).unwrap_err();
            assert!(matches!(kind(&err), Some(VfsError::ReadOnly(_))));
            Ok(())
        }
    }

    mod copy {
        use super::*;

        #[test]
        fn test_copy_into_empty_tree() -> Result<()> {
            let src = Tree::new(Rc::new(MapRoot::new()));
            src.mkfile("1.csv", Some(b"one"))?;
            src.mkfile("2.csv", Some(b"two"))?;
            let dst = Tree::new(Rc::new(MapRoot::new()));

            copy_into(&dst, &src)?;

            let mut names = dst.names()?;
            names.sort();
            assert_eq!(names, ["1.csv", "2.csv"]);
            assert_eq!(dst.get_blob("1.csv")?.read_bytes()?, b"one");
            assert_eq!(dst.get_blob("2.csv")?.read_bytes()?, b"two");
            Ok(())
        }

        #[test]
        fn test_copy_nested() -> Result<()> {
            let src = setup_test_tree()?;
            let dst = Tree::new(Rc::new(MapRoot::new()));
            dst.copy_from(&src)?;
            assert_eq!(dst.get_blob("sub/deeper/note.txt")?.read_string()?, "hi");
            Ok(())
        }

        #[test]
        fn test_copy_into_own_subtree_fails() -> Result<()> {
            let tree = setup_test_tree()?;
            let before = tree.render(5)?;

            let err = copy_into(&tree.get_tree("sub")?, &tree).unwrap_err();
            assert!(matches!(kind(&err), Some(VfsError::InvalidTarget { .. })));
            let err = tree.copy_from(&tree).unwrap_err();
            assert!(matches!(kind(&err), Some(VfsError::InvalidTarget { .. })));
            assert_eq!(tree.render(5)?, before);
            Ok(())
        }

        #[test]
        fn test_copy_subtree_into_parent_on_same_root() -> Result<()> {
            let tree = setup_test_tree()?;
            let copy = tree.mkdir("copy")?;
            copy_into(&copy, &tree.get_tree("sub")?)?;
            assert_eq!(tree.get_blob("copy/deeper/note.txt")?.read_string()?, "hi");
            Ok(())
        }

        #[test]
        fn test_copy_into_read_only_fails() -> Result<()> {
            let src = setup_test_tree()?;
            let dst = Tree::new(Rc::new(MapRoot::read_only()));
            let err = copy_into(&dst, &src).unwrap_err();
            assert!(matches!(kind(&err), Some(VfsError::ReadOnly(_))));
            Ok(())
        }
    }

    mod render {
        use super::*;

        #[test]
        fn test_render_full_depth() -> Result<()> {
            let tree = Tree::new(Rc::new(MapRoot::new()));
            tree.mkfile("a.txt", None)?;
            tree.mkfile("sub/b.txt", None)?;
            let text = tree.render(5)?;
            assert!(text.starts_with("📂 Tree "));
            assert!(text.contains("├─ 📄 a.txt"));
            assert!(text.contains("└─ 📂 sub"));
            assert!(text.contains("   └─ 📄 b.txt"));
            assert!(!text.contains(ELIDED));
            Ok(())
        }

        #[test]
        fn test_render_elides_past_depth() -> Result<()> {
            let tree = Tree::new(Rc::new(MapRoot::new()));
            tree.mkfile("sub/deeper/c.txt", None)?;
            let text = tree.render(1)?;
            assert!(text.contains("└─ 📂 sub"));
            assert!(text.contains(ELIDED));
            assert!(!text.contains("deeper"));
            Ok(())
        }

        #[test]
        fn test_render_blob() -> Result<()> {
            let tree = setup_test_tree()?;
            let text = render_tree(&tree.index("1.csv")?, 3)?;
            assert!(text.starts_with("📄 Blob "));
            Ok(())
        }
    }
}
