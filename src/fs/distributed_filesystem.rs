use crate::config::Config;
use crate::error::{DfsUtilError, Result};
use crate::fs::dfs_client::DfsClient;
use crate::fs::FileSystem;
use crate::io::{FsInputStream, FsOutputStream};
use crate::path::DfsPath;
use crate::permission::FsPermission;
use crate::status::{ContentSummary, FileStatus};

use async_trait::async_trait;

/// Client of a remote filesystem cluster, reached through its namenode.
pub struct DistributedFileSystem {
    dfs_client: DfsClient,
}

impl DistributedFileSystem {
    pub fn new(namenode_rpc_address: impl Into<String>, config: &Config) -> Self {
        let dfs_client = DfsClient::new(namenode_rpc_address, &config.dfs);
        Self { dfs_client }
    }

    pub fn client(&self) -> &DfsClient {
        &self.dfs_client
    }
}

#[async_trait]
impl FileSystem for DistributedFileSystem {
    fn scheme(&self) -> &'static str {
        "udfs"
    }

    async fn mkdirs(&self, path: &DfsPath) -> Result<bool> {
        self.dfs_client.mkdir(path.to_string()).await
    }

    async fn delete(&self, path: &DfsPath, recursive: bool) -> Result<bool> {
        self.dfs_client.delete(path.to_string(), recursive).await
    }

    async fn exists(&self, path: &DfsPath) -> Result<bool> {
        Ok(self.dfs_client.get_file_info(path.to_string()).await?.is_some())
    }

    async fn file_status(&self, path: &DfsPath) -> Result<FileStatus> {
        self.dfs_client
            .get_file_info(path.to_string())
            .await?
            .ok_or_else(|| DfsUtilError::not_found(path))
    }

    async fn list_status(&self, path: &DfsPath) -> Result<Vec<FileStatus>> {
        self.dfs_client.ls(path.to_string()).await
    }

    async fn create(&self, path: &DfsPath, overwrite: bool) -> Result<Box<dyn FsOutputStream>> {
        let writer = self.dfs_client.create(path.to_string(), overwrite).await?;
        Ok(Box::new(writer))
    }

    async fn append(&self, path: &DfsPath) -> Result<Box<dyn FsOutputStream>> {
        let writer = self.dfs_client.append(path.to_string()).await?;
        Ok(Box::new(writer))
    }

    async fn open(&self, path: &DfsPath) -> Result<Box<dyn FsInputStream>> {
        let reader = self.dfs_client.open(path.to_string()).await?;
        Ok(Box::new(reader))
    }

    async fn rename(&self, src: &DfsPath, dst: &DfsPath) -> Result<bool> {
        self.dfs_client
            .rename(src.to_string(), dst.to_string())
            .await
    }

    async fn set_permission(&self, path: &DfsPath, permission: FsPermission) -> Result<()> {
        self.dfs_client
            .set_permission(path.to_string(), permission.mode())
            .await
    }

    async fn set_owner(
        &self,
        path: &DfsPath,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> Result<()> {
        self.dfs_client
            .set_owner(path.to_string(), owner, group)
            .await
    }

    async fn content_summary(&self, path: &DfsPath) -> Result<ContentSummary> {
        self.dfs_client.content_summary(path.to_string()).await
    }
}
