use crate::config::Config;
use crate::error::{DfsUtilError, Result};
use crate::fs::{self, FileSystem};
use crate::io::{self, FsInputStream, FsOutputStream};
use crate::path::DfsPath;
use crate::permission::FsPermission;
use crate::status::ContentSummary;

use std::path::Path;

use tokio::io::AsyncRead;

use tracing::{debug, info};

/// Convenience wrapper bundling a [`FileSystem`] with its [`Config`].
///
/// Every method takes plain path strings, builds a [`DfsPath`] from them and
/// forwards the call to the filesystem. Failures of the filesystem are
/// returned to the caller unchanged.
pub struct DfsUtil {
    fs: Box<dyn FileSystem>,
    config: Config,
}

impl DfsUtil {
    /// Loads the configuration (see [`Config::load`]) and connects the
    /// filesystem it names.
    pub fn new() -> Result<Self> {
        Self::with_config(Config::load()?)
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let fs = fs::from_config(&config)?;
        info!("Using {} filesystem", fs.scheme());
        Ok(Self { fs, config })
    }

    pub fn with_filesystem(fs: Box<dyn FileSystem>, config: Config) -> Self {
        Self { fs, config }
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// Replaces the filesystem, returning the previous one without closing it.
    pub fn set_fs(&mut self, fs: Box<dyn FileSystem>) -> Box<dyn FileSystem> {
        std::mem::replace(&mut self.fs, fs)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates a directory including all missing parents.
    pub async fn mkdir(&self, path: &str) -> Result<bool> {
        let path = DfsPath::new(path)?;
        debug!("mkdir {}", path);
        self.fs.mkdirs(&path).await
    }

    /// Recursively deletes a directory or file. `false` if nothing was deleted.
    pub async fn clear_dir(&self, path: &str) -> Result<bool> {
        let path = DfsPath::new(path)?;
        debug!("delete -r {}", path);
        self.fs.delete(&path, true).await
    }

    /// Uploads the local file or directory `src` to `dst`.
    pub async fn put(&self, src: &str, dst: &str, del_src: bool, overwrite: bool) -> Result<()> {
        let dst = DfsPath::new(dst)?;
        debug!("put {} {} (delete source: {}, overwrite: {})", src, dst, del_src, overwrite);
        self.fs
            .copy_from_local(del_src, overwrite, Path::new(src), &dst)
            .await
    }

    /// Downloads `src` to the local path `dst`.
    pub async fn get(&self, src: &str, dst: &str) -> Result<()> {
        let src = DfsPath::new(src)?;
        debug!("get {} {}", src, dst);
        self.fs.copy_to_local(&src, Path::new(dst)).await
    }

    /// Changes the permission bits, `mode` is octal (`744`) or symbolic (`rwxr--r--`).
    pub async fn change_permission(&self, path: &str, mode: &str) -> Result<()> {
        let path = DfsPath::new(path)?;
        let permission = FsPermission::parse(mode)?;
        debug!("chmod {} {}", permission, path);
        self.fs.set_permission(&path, permission).await
    }

    pub async fn check(&self, path: &str) -> Result<bool> {
        let path = DfsPath::new(path)?;
        self.fs.exists(&path).await
    }

    /// Appends everything `reader` yields to the file at `path`, creating
    /// the file first if needed. Returns the number of bytes appended.
    pub async fn append_content(
        &self,
        reader: &mut (impl AsyncRead + Unpin + Send + ?Sized),
        path: &str,
    ) -> Result<u64> {
        if !self.config.dfs.support_append {
            return Err(DfsUtilError::Unsupported(
                "Append is disabled by dfs.support_append".to_owned(),
            ));
        }

        let path = DfsPath::new(path)?;
        if !self.fs.exists(&path).await? {
            self.fs.create_new_file(&path).await?;
        }

        let mut out = self.fs.append(&path).await?;
        let appended =
            io::copy_from_reader(reader, out.as_mut(), self.config.client.buffer_size).await?;
        debug!("Appended {} bytes to {}", appended, path);

        Ok(appended)
    }

    /// All files below `path` whose full path ends with `ext`.
    pub async fn list_file(&self, path: &str, ext: &str) -> Result<Vec<String>> {
        let path = DfsPath::new(path)?;
        let files = self.fs.list_files(&path, true).await?;
        Ok(files
            .into_iter()
            .map(|status| status.path.to_string())
            .filter(|name| name.ends_with(ext))
            .collect())
    }

    /// Direct subdirectories of `folder` whose name contains `pattern`.
    /// A missing folder yields an empty list.
    pub async fn files_under_folder(
        &self,
        folder: &str,
        pattern: Option<&str>,
    ) -> Result<Vec<DfsPath>> {
        let folder = DfsPath::new(folder)?;
        if !self.fs.exists(&folder).await? {
            return Ok(vec![]);
        }

        let statuses = self.fs.list_status(&folder).await?;
        Ok(statuses
            .into_iter()
            .filter(|status| status.is_dir)
            .map(|status| status.path)
            .filter(|path| pattern.map_or(true, |pattern| path.name().contains(pattern)))
            .collect())
    }

    pub async fn move_file(&self, src: &str, dst: &str) -> Result<bool> {
        let src = DfsPath::new(src)?;
        let dst = DfsPath::new(dst)?;
        debug!("mv {} {}", src, dst);
        self.fs.rename(&src, &dst).await
    }

    /// Copies a file or directory tree within the filesystem. If `dst` is an
    /// existing directory the copy is placed inside it.
    pub async fn copy_file(&self, src: &str, dst: &str) -> Result<()> {
        let src = DfsPath::new(src)?;
        let dst = DfsPath::new(dst)?;
        debug!("cp {} {}", src, dst);

        let status = self.fs.file_status(&src).await?;
        let target = match self.fs.file_status(&dst).await {
            Ok(dst_status) if dst_status.is_dir => dst.child(src.name()),
            Ok(_) | Err(DfsUtilError::NotFound(_)) => dst,
            Err(err) => return Err(err),
        };
        if status.is_dir && target.starts_with(&src) {
            return Err(DfsUtilError::FSError(format!(
                "Cannot copy '{}' into itself",
                src
            )));
        }

        if status.is_file() {
            return self.copy_single_file(&src, &target).await;
        }

        let mut pending = vec![(src, target)];
        while let Some((from_dir, to_dir)) = pending.pop() {
            self.fs.mkdirs(&to_dir).await?;
            for child in self.fs.list_status(&from_dir).await? {
                let to = to_dir.child(child.path.name());
                if child.is_dir {
                    pending.push((child.path, to));
                } else {
                    self.copy_single_file(&child.path, &to).await?;
                }
            }
        }

        Ok(())
    }

    async fn copy_single_file(&self, src: &DfsPath, dst: &DfsPath) -> Result<()> {
        let mut input = self.fs.open(src).await?;
        let mut output = self.fs.create(dst, false).await?;
        io::copy_bytes(input.as_mut(), output.as_mut(), self.config.client.buffer_size).await?;
        Ok(())
    }

    /// Creates (or truncates) `path` and returns a stream writing to it.
    pub async fn output_stream(&self, path: &str) -> Result<Box<dyn FsOutputStream>> {
        let path = DfsPath::new(path)?;
        self.fs.create(&path, true).await
    }

    pub async fn open(&self, path: &str) -> Result<Box<dyn FsInputStream>> {
        let path = DfsPath::new(path)?;
        self.fs.open(&path).await
    }

    pub async fn read_to_end(&self, path: &str) -> Result<Vec<u8>> {
        let mut input = self.open(path).await?;
        io::read_to_end(input.as_mut()).await
    }

    /// Creates an empty file. `false` if something already exists at `path`.
    pub async fn create_new_file(&self, path: &str) -> Result<bool> {
        let path = DfsPath::new(path)?;
        self.fs.create_new_file(&path).await
    }

    /// Number of files, directories and bytes below `path`.
    pub async fn file_statuses(&self, path: &str) -> Result<ContentSummary> {
        let path = DfsPath::new(path)?;
        self.fs.content_summary(&path).await
    }

    /// Sets `owner` (and the configured default group) on `path` and
    /// everything below it.
    pub async fn change_files_owner(&self, path: &str, owner: &str) -> Result<()> {
        let path = DfsPath::new(path)?;
        let group = self.config.client.default_group.as_str();
        debug!("chown -R {}:{} {}", owner, group, path);

        let status = self.fs.file_status(&path).await?;
        let mut pending = vec![status];
        while let Some(status) = pending.pop() {
            self.fs
                .set_owner(&status.path, Some(owner), Some(group))
                .await?;
            if status.is_dir {
                pending.extend(self.fs.list_status(&status.path).await?);
            }
        }

        Ok(())
    }

    /// Closes the filesystem and releases the wrapper.
    pub async fn destroy(self) -> Result<()> {
        info!("Closing {} filesystem", self.fs.scheme());
        self.fs.close().await
    }
}
