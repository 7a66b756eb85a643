use crate::config::Dfs;
use crate::error::Result;
use crate::io::{DfsReader, DfsWriter};
use crate::proto;
use crate::proto::client_protocol_client::ClientProtocolClient;
use crate::status::{ContentSummary, FileStatus};
use crate::utils::proto_utils;

use std::convert::TryFrom;

use tonic::transport::Channel;

/// Issues the namenode RPCs of the client protocol.
pub struct DfsClient {
    namenode_rpc_address: String,
    config: Dfs,
}

impl DfsClient {
    pub fn new(namenode_rpc_address: impl Into<String>, config: &Dfs) -> Self {
        Self {
            namenode_rpc_address: namenode_rpc_address.into(),
            config: config.clone(),
        }
    }

    pub fn namenode_rpc_address(&self) -> &str {
        &self.namenode_rpc_address
    }

    async fn get_client(&self) -> Result<ClientProtocolClient<Channel>> {
        proto_utils::connect_namenode(&self.namenode_rpc_address).await
    }

    pub async fn mkdir(&self, path: impl Into<String>) -> Result<bool> {
        let mut client = self.get_client().await?;
        let response = client
            .mkdir(proto::PathRequest { path: path.into() })
            .await?;
        Ok(response.into_inner().success)
    }

    pub async fn delete(&self, path: impl Into<String>, recursive: bool) -> Result<bool> {
        let mut client = self.get_client().await?;
        let response = client
            .delete(proto::DeleteRequest {
                path: path.into(),
                recursive,
            })
            .await?;
        Ok(response.into_inner().success)
    }

    pub async fn rename(&self, src: impl Into<String>, dst: impl Into<String>) -> Result<bool> {
        let mut client = self.get_client().await?;
        let response = client
            .rename(proto::RenameRequest {
                src: src.into(),
                dst: dst.into(),
            })
            .await?;
        Ok(response.into_inner().success)
    }

    /// `None` if the path does not exist.
    pub async fn get_file_info(&self, path: impl Into<String>) -> Result<Option<FileStatus>> {
        let mut client = self.get_client().await?;
        let response = client
            .get_file_info(proto::PathRequest { path: path.into() })
            .await?;
        let proto::FileInfoResponse { status } = response.into_inner();
        status.map(FileStatus::try_from).transpose()
    }

    pub async fn ls(&self, path: impl Into<String>) -> Result<Vec<FileStatus>> {
        let mut client = self.get_client().await?;
        let response = client.ls(proto::PathRequest { path: path.into() }).await?;
        let proto::ListStatusResponse { statuses } = response.into_inner();
        statuses.into_iter().map(FileStatus::try_from).collect()
    }

    pub async fn set_permission(&self, path: impl Into<String>, mode: u16) -> Result<()> {
        let mut client = self.get_client().await?;
        client
            .set_permission(proto::SetPermissionRequest {
                path: path.into(),
                permission: u32::from(mode),
            })
            .await?;
        Ok(())
    }

    pub async fn set_owner(
        &self,
        path: impl Into<String>,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> Result<()> {
        let mut client = self.get_client().await?;
        client
            .set_owner(proto::SetOwnerRequest {
                path: path.into(),
                owner: owner.unwrap_or_default().to_owned(),
                group: group.unwrap_or_default().to_owned(),
            })
            .await?;
        Ok(())
    }

    pub async fn content_summary(&self, path: impl Into<String>) -> Result<ContentSummary> {
        let mut client = self.get_client().await?;
        let response = client
            .content_summary(proto::PathRequest { path: path.into() })
            .await?;
        Ok(response.into_inner().into())
    }

    pub async fn create(&self, path: impl Into<String>, overwrite: bool) -> Result<DfsWriter> {
        DfsWriter::create(path, overwrite, &self.namenode_rpc_address, &self.config).await
    }

    pub async fn append(&self, path: impl Into<String>) -> Result<DfsWriter> {
        DfsWriter::append(path, &self.namenode_rpc_address, &self.config).await
    }

    pub async fn open(&self, path: impl Into<String>) -> Result<DfsReader> {
        DfsReader::open(&self.namenode_rpc_address, path).await
    }
}
