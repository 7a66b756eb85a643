use crate::error::{DfsUtilError, Result};
use crate::fs::FileSystem;
use crate::io::{FsInputStream, FsOutputStream};
use crate::path::DfsPath;
use crate::permission::FsPermission;
use crate::status::FileStatus;

use std::collections::HashMap;
use std::fs::{Metadata, Permissions};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use nix::unistd::{Gid, Group, Uid, User};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};

use tracing::debug;

/// A filesystem backed by a directory on the local disk.
///
/// Every path is resolved below `root`, so `/data/word.txt` maps to
/// `<root>/data/word.txt`.
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }
        if !root.is_dir() {
            return Err(DfsUtilError::ConfigError(format!(
                "{} is not a directory.",
                root.display()
            )));
        }
        debug!("Local filesystem rooted at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &DfsPath) -> PathBuf {
        let mut resolved = self.root.clone();
        for component in path.components() {
            resolved.push(component);
        }
        resolved
    }

    async fn metadata(&self, path: &DfsPath) -> Result<Option<Metadata>> {
        match tokio::fs::metadata(self.resolve(path)).await {
            Ok(metadata) => Ok(Some(metadata)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn is_dir(&self, path: &DfsPath) -> Result<bool> {
        Ok(self.metadata(path).await?.map_or(false, |m| m.is_dir()))
    }
}

/// Builds statuses for a batch of entries. Owner and group names are looked
/// up on the blocking pool, each id only once per batch.
async fn to_statuses(entries: Vec<(DfsPath, Metadata)>) -> Result<Vec<FileStatus>> {
    tokio::task::spawn_blocking(move || {
        let mut users = HashMap::new();
        let mut groups = HashMap::new();
        entries
            .into_iter()
            .map(|(path, metadata)| {
                let owner = users
                    .entry(metadata.uid())
                    .or_insert_with(|| user_name(metadata.uid()))
                    .clone();
                let group = groups
                    .entry(metadata.gid())
                    .or_insert_with(|| group_name(metadata.gid()))
                    .clone();
                FileStatus {
                    path,
                    len: if metadata.is_dir() { 0 } else { metadata.len() },
                    is_dir: metadata.is_dir(),
                    permission: FsPermission::new((metadata.permissions().mode() & 0o1777) as u16),
                    owner,
                    group,
                }
            })
            .collect::<Vec<_>>()
    })
    .await
    .map_err(|err| DfsUtilError::FSError(format!("Owner lookup failed: {}", err)))
}

fn is_a_directory(path: &DfsPath) -> DfsUtilError {
    DfsUtilError::FSError(format!("'{}': Is a directory", path))
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    fn scheme(&self) -> &'static str {
        "file"
    }

    async fn mkdirs(&self, path: &DfsPath) -> Result<bool> {
        match self.metadata(path).await? {
            Some(metadata) if metadata.is_dir() => Ok(true),
            Some(_) => Err(DfsUtilError::already_exists(path)),
            None => {
                tokio::fs::create_dir_all(self.resolve(path)).await?;
                Ok(true)
            }
        }
    }

    async fn delete(&self, path: &DfsPath, recursive: bool) -> Result<bool> {
        if path.is_root() {
            return Err(DfsUtilError::FSError(
                "Cannot delete the root directory".to_owned(),
            ));
        }
        let local = self.resolve(path);
        let metadata = match tokio::fs::symlink_metadata(&local).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err.into()),
        };

        if !metadata.is_dir() {
            tokio::fs::remove_file(&local).await?;
        } else if recursive {
            tokio::fs::remove_dir_all(&local).await?;
        } else {
            let mut entries = tokio::fs::read_dir(&local).await?;
            if entries.next_entry().await?.is_some() {
                return Err(DfsUtilError::FSError(format!(
                    "'{}': Directory is not empty",
                    path
                )));
            }
            tokio::fs::remove_dir(&local).await?;
        }

        Ok(true)
    }

    async fn exists(&self, path: &DfsPath) -> Result<bool> {
        Ok(self.metadata(path).await?.is_some())
    }

    async fn file_status(&self, path: &DfsPath) -> Result<FileStatus> {
        let metadata = self
            .metadata(path)
            .await?
            .ok_or_else(|| DfsUtilError::not_found(path))?;
        let mut statuses = to_statuses(vec![(path.clone(), metadata)]).await?;
        statuses
            .pop()
            .ok_or_else(|| DfsUtilError::not_found(path))
    }

    async fn list_status(&self, path: &DfsPath) -> Result<Vec<FileStatus>> {
        let status = self.file_status(path).await?;
        if status.is_file() {
            return Ok(vec![status]);
        }

        let mut children = vec![];
        let mut entries = tokio::fs::read_dir(self.resolve(path)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            children.push((path.child(&name), entry.metadata().await?));
        }
        let mut statuses = to_statuses(children).await?;
        statuses.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(statuses)
    }

    async fn create(&self, path: &DfsPath, overwrite: bool) -> Result<Box<dyn FsOutputStream>> {
        if path.is_root() || self.is_dir(path).await? {
            return Err(is_a_directory(path));
        }
        if let Some(parent) = path.parent() {
            self.mkdirs(&parent).await?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .create_new(!overwrite)
            .open(self.resolve(path))
            .await?;
        Ok(Box::new(LocalOutputStream {
            writer: BufWriter::new(file),
        }))
    }

    async fn append(&self, path: &DfsPath) -> Result<Box<dyn FsOutputStream>> {
        if self.file_status(path).await?.is_dir {
            return Err(is_a_directory(path));
        }
        let file = OpenOptions::new()
            .append(true)
            .open(self.resolve(path))
            .await?;
        Ok(Box::new(LocalOutputStream {
            writer: BufWriter::new(file),
        }))
    }

    async fn open(&self, path: &DfsPath) -> Result<Box<dyn FsInputStream>> {
        if self.file_status(path).await?.is_dir {
            return Err(is_a_directory(path));
        }
        let file = File::open(self.resolve(path)).await?;
        Ok(Box::new(LocalInputStream {
            reader: BufReader::new(file),
        }))
    }

    async fn rename(&self, src: &DfsPath, dst: &DfsPath) -> Result<bool> {
        if src.is_root() || !self.exists(src).await? {
            return Ok(false);
        }

        let target = match self.metadata(dst).await? {
            Some(metadata) if metadata.is_dir() => dst.child(src.name()),
            Some(_) => return Ok(src == dst),
            None => dst.clone(),
        };
        if &target == src {
            return Ok(true);
        }
        if target.starts_with(src) || self.exists(&target).await? {
            return Ok(false);
        }
        let parent_is_dir = match target.parent() {
            Some(parent) => self.is_dir(&parent).await?,
            None => false,
        };
        if !parent_is_dir {
            return Ok(false);
        }

        tokio::fs::rename(self.resolve(src), self.resolve(&target)).await?;
        Ok(true)
    }

    async fn set_permission(&self, path: &DfsPath, permission: FsPermission) -> Result<()> {
        let permissions = Permissions::from_mode(u32::from(permission.mode()));
        tokio::fs::set_permissions(self.resolve(path), permissions).await?;
        Ok(())
    }

    async fn set_owner(
        &self,
        path: &DfsPath,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> Result<()> {
        let local = self.resolve(path);
        let owner = owner.map(str::to_owned);
        let group = group.map(str::to_owned);
        tokio::task::spawn_blocking(move || -> Result<()> {
            let uid = owner.as_deref().map(user_id).transpose()?;
            let gid = group.as_deref().map(group_id).transpose()?;
            std::os::unix::fs::chown(local, uid, gid)?;
            Ok(())
        })
        .await
        .map_err(|err| DfsUtilError::FSError(format!("chown failed: {}", err)))?
    }
}

struct LocalOutputStream {
    writer: BufWriter<File>,
}

#[async_trait]
impl FsOutputStream for LocalOutputStream {
    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.writer.write_all(buf).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }
}

struct LocalInputStream {
    reader: BufReader<File>,
}

#[async_trait]
impl FsInputStream for LocalInputStream {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.reader.read(buf).await?)
    }
}

fn lookup_error(err: nix::Error) -> DfsUtilError {
    DfsUtilError::FSError(format!("Name lookup failed: {}", err))
}

fn user_id(name: &str) -> Result<u32> {
    if let Ok(uid) = name.parse() {
        return Ok(uid);
    }
    User::from_name(name)
        .map_err(lookup_error)?
        .map(|user| user.uid.as_raw())
        .ok_or_else(|| DfsUtilError::NotFound(format!("Unknown user '{}'", name)))
}

fn group_id(name: &str) -> Result<u32> {
    if let Ok(gid) = name.parse() {
        return Ok(gid);
    }
    Group::from_name(name)
        .map_err(lookup_error)?
        .map(|group| group.gid.as_raw())
        .ok_or_else(|| DfsUtilError::NotFound(format!("Unknown group '{}'", name)))
}

// Ids without a passwd or group entry are shown numerically.
fn user_name(uid: u32) -> String {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => user.name,
        _ => uid.to_string(),
    }
}

fn group_name(gid: u32) -> String {
    match Group::from_gid(Gid::from_raw(gid)) {
        Ok(Some(group)) => group.name,
        _ => gid.to_string(),
    }
}
