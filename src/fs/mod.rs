mod dfs_client;
mod distributed_filesystem;
mod local;
mod memory;
mod namespace;

pub use dfs_client::DfsClient;
pub use distributed_filesystem::DistributedFileSystem;
pub use local::LocalFileSystem;
pub use memory::MemoryFileSystem;

use crate::config::{self, Config};
use crate::error::{DfsUtilError, Result};
use crate::io::{self, FsInputStream, FsOutputStream, WriterStream};
use crate::path::DfsPath;
use crate::permission::FsPermission;
use crate::status::{ContentSummary, FileStatus};

use std::path::Path;

use async_trait::async_trait;

use tokio::fs::File;
use tokio::io::{BufReader, BufWriter};

use tracing::debug;

/// Client side view of a filesystem.
///
/// Implementations only need to provide the primitive operations, listing,
/// summaries and local transfers are built on top of them.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Short name of the implementation, e.g. `udfs`.
    fn scheme(&self) -> &'static str;

    /// Creates a directory and all missing parents. Returns `true` when the
    /// directory exists afterwards.
    async fn mkdirs(&self, path: &DfsPath) -> Result<bool>;

    /// Deletes a file or directory. Returns `false` if nothing was there.
    async fn delete(&self, path: &DfsPath, recursive: bool) -> Result<bool>;

    async fn exists(&self, path: &DfsPath) -> Result<bool>;

    async fn file_status(&self, path: &DfsPath) -> Result<FileStatus>;

    /// Immediate children of a directory, or the status of the file itself.
    async fn list_status(&self, path: &DfsPath) -> Result<Vec<FileStatus>>;

    async fn create(&self, path: &DfsPath, overwrite: bool) -> Result<Box<dyn FsOutputStream>>;

    /// Creates an empty file. Returns `false` if the path already exists.
    async fn create_new_file(&self, path: &DfsPath) -> Result<bool> {
        if self.exists(path).await? {
            return Ok(false);
        }
        let mut out = self.create(path, false).await?;
        out.shutdown().await?;
        Ok(true)
    }

    async fn append(&self, path: &DfsPath) -> Result<Box<dyn FsOutputStream>>;

    async fn open(&self, path: &DfsPath) -> Result<Box<dyn FsInputStream>>;

    /// Moves `src` to `dst`. If `dst` is a directory, `src` is moved into it.
    async fn rename(&self, src: &DfsPath, dst: &DfsPath) -> Result<bool>;

    async fn set_permission(&self, path: &DfsPath, permission: FsPermission) -> Result<()>;

    /// `None` leaves the owner or group untouched.
    async fn set_owner(
        &self,
        path: &DfsPath,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> Result<()>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// All files below `path`, sorted by path. Directories are descended
    /// into only if `recursive` is set.
    async fn list_files(&self, path: &DfsPath, recursive: bool) -> Result<Vec<FileStatus>> {
        let mut files = vec![];
        let mut pending = vec![path.clone()];

        while let Some(dir) = pending.pop() {
            for status in self.list_status(&dir).await? {
                if status.is_file() {
                    files.push(status);
                } else if recursive && status.path != dir {
                    pending.push(status.path);
                }
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    async fn content_summary(&self, path: &DfsPath) -> Result<ContentSummary> {
        let status = self.file_status(path).await?;
        let mut summary = ContentSummary::default();
        summary.add(&status);
        if status.is_file() {
            return Ok(summary);
        }

        let mut pending = vec![status.path];
        while let Some(dir) = pending.pop() {
            for child in self.list_status(&dir).await? {
                summary.add(&child);
                if child.is_dir {
                    pending.push(child.path);
                }
            }
        }

        Ok(summary)
    }

    /// Uploads a local file or directory tree. If `dst` is an existing
    /// directory, the source is placed inside it.
    async fn copy_from_local(
        &self,
        del_src: bool,
        overwrite: bool,
        src: &Path,
        dst: &DfsPath,
    ) -> Result<()> {
        let metadata = tokio::fs::metadata(src).await?;
        let target = match self.file_status(dst).await {
            Ok(status) if status.is_dir => dst.join(&local_name(src)?)?,
            Ok(_) | Err(DfsUtilError::NotFound(_)) => dst.clone(),
            Err(err) => return Err(err),
        };
        debug!("Uploading {} to {}", src.display(), target);

        if metadata.is_file() {
            upload_file(self, src, &target, overwrite).await?;
        } else {
            let mut pending = vec![(src.to_path_buf(), target)];
            while let Some((local_dir, remote_dir)) = pending.pop() {
                self.mkdirs(&remote_dir).await?;
                let mut entries = tokio::fs::read_dir(&local_dir).await?;
                while let Some(entry) = entries.next_entry().await? {
                    let remote = remote_dir.join(&local_name(&entry.path())?)?;
                    if entry.file_type().await?.is_dir() {
                        pending.push((entry.path(), remote));
                    } else {
                        upload_file(self, &entry.path(), &remote, overwrite).await?;
                    }
                }
            }
        }

        if del_src {
            if metadata.is_file() {
                tokio::fs::remove_file(src).await?;
            } else {
                tokio::fs::remove_dir_all(src).await?;
            }
        }

        Ok(())
    }

    /// Downloads a file or directory tree. If `dst` is an existing local
    /// directory, the source is placed inside it.
    async fn copy_to_local(&self, src: &DfsPath, dst: &Path) -> Result<()> {
        let status = self.file_status(src).await?;
        let dst_is_dir = match tokio::fs::metadata(dst).await {
            Ok(metadata) => metadata.is_dir(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => false,
            Err(err) => return Err(err.into()),
        };
        let target = if dst_is_dir && !src.is_root() {
            dst.join(src.name())
        } else {
            dst.to_path_buf()
        };
        debug!("Downloading {} to {}", src, target.display());

        if status.is_file() {
            return download_file(self, src, &target).await;
        }

        let mut pending = vec![(status.path, target)];
        while let Some((remote_dir, local_dir)) = pending.pop() {
            tokio::fs::create_dir_all(&local_dir).await?;
            for child in self.list_status(&remote_dir).await? {
                let local = local_dir.join(child.path.name());
                if child.is_dir {
                    pending.push((child.path, local));
                } else {
                    download_file(self, &child.path, &local).await?;
                }
            }
        }

        Ok(())
    }
}

fn local_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            DfsUtilError::InvalidPath(format!("'{}' has no file name", path.display()))
        })
}

async fn upload_file<F: FileSystem + ?Sized>(
    fs: &F,
    src: &Path,
    dst: &DfsPath,
    overwrite: bool,
) -> Result<()> {
    let mut reader = BufReader::new(File::open(src).await?);
    let mut writer = fs.create(dst, overwrite).await?;
    io::copy_from_reader(&mut reader, writer.as_mut(), 128 * 1024).await?;
    Ok(())
}

async fn download_file<F: FileSystem + ?Sized>(fs: &F, src: &DfsPath, dst: &Path) -> Result<()> {
    let mut reader = fs.open(src).await?;
    if let Some(parent) = dst.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut writer = WriterStream(BufWriter::new(File::create(dst).await?));
    io::copy_bytes(reader.as_mut(), &mut writer, 128 * 1024).await?;
    Ok(())
}

/// Builds the filesystem named in the configuration.
pub fn from_config(config: &Config) -> Result<Box<dyn FileSystem>> {
    let fs: Box<dyn FileSystem> = match config.filesystem {
        config::FileSystem::Udfs {
            ref namenode_rpc_address,
        } => Box::new(DistributedFileSystem::new(namenode_rpc_address, config)),
        config::FileSystem::Local { ref root } => Box::new(LocalFileSystem::new(root)?),
        config::FileSystem::Memory {} => Box::new(MemoryFileSystem::new(config)),
    };
    Ok(fs)
}
