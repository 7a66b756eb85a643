use crate::error::{DfsUtilError, Result};
use crate::path::DfsPath;
use crate::permission::FsPermission;
use crate::status::FileStatus;

use std::collections::BTreeMap;

#[derive(Clone)]
struct Meta {
    permission: FsPermission,
    owner: String,
    group: String,
}

enum INode {
    Directory {
        meta: Meta,
        children: BTreeMap<String, INode>,
    },
    File {
        meta: Meta,
        content: Vec<u8>,
    },
}

impl INode {
    fn directory(meta: Meta) -> Self {
        INode::Directory {
            meta,
            children: BTreeMap::new(),
        }
    }

    fn meta_mut(&mut self) -> &mut Meta {
        match self {
            INode::Directory { meta, .. } => meta,
            INode::File { meta, .. } => meta,
        }
    }

    fn status(&self, path: DfsPath) -> FileStatus {
        let (meta, len, is_dir) = match self {
            INode::Directory { meta, .. } => (meta, 0, true),
            INode::File { meta, content } => (meta, content.len() as u64, false),
        };
        FileStatus {
            path,
            len,
            is_dir,
            permission: meta.permission,
            owner: meta.owner.clone(),
            group: meta.group.clone(),
        }
    }
}

fn not_a_directory(path: impl std::fmt::Display) -> DfsUtilError {
    DfsUtilError::FSError(format!("'{}': Directory expected, but got file", path))
}

fn is_a_directory(path: impl std::fmt::Display) -> DfsUtilError {
    DfsUtilError::FSError(format!("'{}': Is a directory", path))
}

/// Directory tree of the in-memory filesystem, file contents included.
pub(crate) struct Namespace {
    root: INode,
    user: String,
    group: String,
}

impl Namespace {
    pub(crate) fn new(user: &str, group: &str) -> Self {
        let meta = Meta {
            permission: FsPermission::dir_default(),
            owner: user.to_owned(),
            group: group.to_owned(),
        };
        Self {
            root: INode::directory(meta),
            user: user.to_owned(),
            group: group.to_owned(),
        }
    }

    fn new_meta(&self, permission: FsPermission) -> Meta {
        Meta {
            permission,
            owner: self.user.clone(),
            group: self.group.clone(),
        }
    }

    fn node(&self, path: &DfsPath) -> Option<&INode> {
        let mut node = &self.root;
        for part in path.components() {
            node = match node {
                INode::Directory { children, .. } => children.get(part)?,
                INode::File { .. } => return None,
            };
        }
        Some(node)
    }

    fn node_mut(&mut self, path: &DfsPath) -> Option<&mut INode> {
        let mut node = &mut self.root;
        for part in path.components() {
            node = match node {
                INode::Directory { children, .. } => children.get_mut(part)?,
                INode::File { .. } => return None,
            };
        }
        Some(node)
    }

    fn lookup(&self, path: &DfsPath) -> Result<&INode> {
        self.node(path).ok_or_else(|| DfsUtilError::not_found(path))
    }

    fn lookup_mut(&mut self, path: &DfsPath) -> Result<&mut INode> {
        self.node_mut(path).ok_or_else(|| DfsUtilError::not_found(path))
    }

    fn children_mut(&mut self, path: &DfsPath) -> Result<&mut BTreeMap<String, INode>> {
        match self.lookup_mut(path)? {
            INode::Directory { children, .. } => Ok(children),
            INode::File { .. } => Err(not_a_directory(path)),
        }
    }

    pub(crate) fn exists(&self, path: &DfsPath) -> bool {
        self.node(path).is_some()
    }

    pub(crate) fn mkdirs(&mut self, path: &DfsPath) -> Result<()> {
        let meta = self.new_meta(FsPermission::dir_default());
        let mut node = &mut self.root;
        for part in path.components() {
            node = match node {
                INode::Directory { children, .. } => children
                    .entry(part.to_owned())
                    .or_insert_with(|| INode::directory(meta.clone())),
                INode::File { .. } => return Err(not_a_directory(path)),
            };
        }

        match node {
            INode::Directory { .. } => Ok(()),
            INode::File { .. } => Err(DfsUtilError::already_exists(path)),
        }
    }

    pub(crate) fn status(&self, path: &DfsPath) -> Result<FileStatus> {
        Ok(self.lookup(path)?.status(path.clone()))
    }

    pub(crate) fn list(&self, path: &DfsPath) -> Result<Vec<FileStatus>> {
        match self.lookup(path)? {
            INode::Directory { children, .. } => Ok(children
                .iter()
                .map(|(name, child)| child.status(path.child(name)))
                .collect()),
            file => Ok(vec![file.status(path.clone())]),
        }
    }

    pub(crate) fn delete(&mut self, path: &DfsPath, recursive: bool) -> Result<bool> {
        let parent = match path.parent() {
            Some(parent) => parent,
            None => {
                return Err(DfsUtilError::FSError(
                    "Cannot delete the root directory".to_owned(),
                ))
            }
        };

        match self.node(path) {
            None => return Ok(false),
            Some(INode::Directory { children, .. }) if !recursive && !children.is_empty() => {
                return Err(DfsUtilError::FSError(format!(
                    "'{}': Directory is not empty",
                    path
                )))
            }
            Some(_) => (),
        }

        self.children_mut(&parent)?.remove(path.name());
        Ok(true)
    }

    /// Creates an empty file, or truncates an existing one if `overwrite` is set.
    pub(crate) fn create_file(&mut self, path: &DfsPath, overwrite: bool) -> Result<()> {
        let parent = path.parent().ok_or_else(|| is_a_directory(path))?;
        self.mkdirs(&parent)?;

        let meta = self.new_meta(FsPermission::file_default());
        let children = self.children_mut(&parent)?;
        match children.get_mut(path.name()) {
            Some(INode::Directory { .. }) => Err(is_a_directory(path)),
            Some(INode::File { .. }) if !overwrite => Err(DfsUtilError::already_exists(path)),
            Some(INode::File { content, .. }) => {
                content.clear();
                Ok(())
            }
            None => {
                let file = INode::File {
                    meta,
                    content: vec![],
                };
                children.insert(path.name().to_owned(), file);
                Ok(())
            }
        }
    }

    pub(crate) fn check_file(&self, path: &DfsPath) -> Result<()> {
        match self.lookup(path)? {
            INode::File { .. } => Ok(()),
            INode::Directory { .. } => Err(is_a_directory(path)),
        }
    }

    pub(crate) fn append_to_file(&mut self, path: &DfsPath, data: &[u8]) -> Result<()> {
        match self.lookup_mut(path)? {
            INode::File { content, .. } => {
                content.extend_from_slice(data);
                Ok(())
            }
            INode::Directory { .. } => Err(is_a_directory(path)),
        }
    }

    pub(crate) fn read_file(&self, path: &DfsPath) -> Result<Vec<u8>> {
        match self.lookup(path)? {
            INode::File { content, .. } => Ok(content.clone()),
            INode::Directory { .. } => Err(is_a_directory(path)),
        }
    }

    pub(crate) fn rename(&mut self, src: &DfsPath, dst: &DfsPath) -> Result<bool> {
        let src_parent = match src.parent() {
            Some(parent) if self.exists(src) => parent,
            _ => return Ok(false),
        };

        let target = match self.node(dst) {
            Some(INode::Directory { .. }) => dst.child(src.name()),
            Some(INode::File { .. }) => return Ok(src == dst),
            None => dst.clone(),
        };
        if &target == src {
            return Ok(true);
        }
        if target.starts_with(src) || self.exists(&target) {
            return Ok(false);
        }

        let target_parent = match target.parent() {
            Some(parent) => parent,
            None => return Ok(false),
        };
        match self.node(&target_parent) {
            Some(INode::Directory { .. }) => (),
            _ => return Ok(false),
        }

        let node = match self.children_mut(&src_parent)?.remove(src.name()) {
            Some(node) => node,
            None => return Ok(false),
        };
        self.children_mut(&target_parent)?
            .insert(target.name().to_owned(), node);

        Ok(true)
    }

    pub(crate) fn set_permission(&mut self, path: &DfsPath, permission: FsPermission) -> Result<()> {
        self.lookup_mut(path)?.meta_mut().permission = permission;
        Ok(())
    }

    pub(crate) fn set_owner(
        &mut self,
        path: &DfsPath,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> Result<()> {
        let meta = self.lookup_mut(path)?.meta_mut();
        if let Some(owner) = owner {
            meta.owner = owner.to_owned();
        }
        if let Some(group) = group {
            meta.group = group.to_owned();
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {

    use super::Namespace;

    use crate::error::DfsUtilError;
    use crate::path::DfsPath;

    fn path(path: &str) -> DfsPath {
        DfsPath::new(path).unwrap()
    }

    fn names(namespace: &Namespace, dir: &str) -> Vec<String> {
        namespace
            .list(&path(dir))
            .unwrap()
            .into_iter()
            .map(|status| status.path.name().to_owned())
            .collect()
    }

    #[test]
    fn can_create_directories() {
        let directories = ["/foo", "/foobar", "/foobarbaz", "/foo/bar/baz"];

        let mut namespace = Namespace::new("hdfs", "supergroup");
        for dir in &directories {
            assert!(namespace.mkdirs(&path(dir)).is_ok());
        }

        assert_eq!(names(&namespace, "/"), vec!["foo", "foobar", "foobarbaz"]);
        assert_eq!(names(&namespace, "/foo"), vec!["bar"]);
        assert_eq!(names(&namespace, "/foo/bar"), vec!["baz"]);
    }

    #[test]
    fn files_block_directory_creation() {
        let mut namespace = Namespace::new("hdfs", "supergroup");
        namespace.create_file(&path("/data/word.txt"), false).unwrap();

        assert!(namespace.mkdirs(&path("/data/word.txt/sub")).is_err());
        assert!(matches!(
            namespace.mkdirs(&path("/data/word.txt")),
            Err(DfsUtilError::AlreadyExists(_))
        ));
        assert!(namespace.create_file(&path("/data"), true).is_err());
    }

    #[test]
    fn create_truncates_only_with_overwrite() {
        let mut namespace = Namespace::new("hdfs", "supergroup");
        let file = path("/word.txt");
        namespace.create_file(&file, false).unwrap();
        namespace.append_to_file(&file, b"Welcome To Hadoop").unwrap();

        assert!(matches!(
            namespace.create_file(&file, false),
            Err(DfsUtilError::AlreadyExists(_))
        ));
        assert_eq!(namespace.read_file(&file).unwrap(), b"Welcome To Hadoop");

        namespace.create_file(&file, true).unwrap();
        assert!(namespace.read_file(&file).unwrap().is_empty());
    }

    #[test]
    fn delete_requires_recursive_for_non_empty_directories() {
        let mut namespace = Namespace::new("hdfs", "supergroup");
        namespace.mkdirs(&path("/data/xuz")).unwrap();

        assert!(namespace.delete(&path("/data"), false).is_err());
        assert!(namespace.delete(&path("/data/xuz"), false).unwrap());
        assert!(namespace.delete(&path("/data"), true).unwrap());
        assert!(!namespace.delete(&path("/data"), true).unwrap());
        assert!(namespace.delete(&DfsPath::root(), true).is_err());
    }

    #[test]
    fn rename_moves_into_existing_directories() {
        let mut namespace = Namespace::new("hdfs", "supergroup");
        namespace.create_file(&path("/in/word.txt"), false).unwrap();
        namespace.mkdirs(&path("/out")).unwrap();

        assert!(namespace.rename(&path("/in/word.txt"), &path("/out")).unwrap());
        assert!(namespace.exists(&path("/out/word.txt")));
        assert!(!namespace.exists(&path("/in/word.txt")));

        assert!(namespace
            .rename(&path("/out/word.txt"), &path("/in/renamed.txt"))
            .unwrap());
        assert!(namespace.exists(&path("/in/renamed.txt")));
    }

    #[test]
    fn rename_refuses_bad_targets() {
        let mut namespace = Namespace::new("hdfs", "supergroup");
        namespace.mkdirs(&path("/a/b")).unwrap();
        namespace.create_file(&path("/f"), false).unwrap();

        assert!(!namespace.rename(&path("/missing"), &path("/x")).unwrap());
        assert!(!namespace.rename(&path("/a"), &path("/a/b/c")).unwrap());
        assert!(!namespace.rename(&path("/a"), &path("/f")).unwrap());
        assert!(!namespace.rename(&path("/f"), &path("/nope/f")).unwrap());
        assert!(!namespace.rename(&DfsPath::root(), &path("/x")).unwrap());
    }

    #[test]
    fn owner_and_permission_changes() {
        let mut namespace = Namespace::new("hdfs", "supergroup");
        let dir = path("/data");
        namespace.mkdirs(&dir).unwrap();

        namespace
            .set_permission(&dir, crate::permission::FsPermission::new(0o700))
            .unwrap();
        namespace.set_owner(&dir, Some("xuz"), None).unwrap();

        let status = namespace.status(&dir).unwrap();
        assert_eq!(status.permission.mode(), 0o700);
        assert_eq!(status.owner, "xuz");
        assert_eq!(status.group, "supergroup");
    }
}
