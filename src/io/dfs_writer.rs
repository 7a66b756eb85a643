use crate::config::Dfs;
use crate::error::{DfsUtilError, Result};
use crate::io::FsOutputStream;
use crate::proto;
use crate::proto::client_protocol_client::ClientProtocolClient;
use crate::utils::proto_utils;

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

use tonic::transport::Channel;

use tracing::{debug, warn};

async fn new_backup_file(backup_dir: &Path) -> Result<(PathBuf, BufWriter<File>)> {
    let filename = format!("dfsutil_tmp_{}", rand::random::<u64>());
    let path = backup_dir.join(filename);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(&path)
        .await?;
    Ok((path, BufWriter::new(file)))
}

/// Writes a file block by block.
///
/// Bytes are buffered in a local backup file until a block is full. The
/// block is then streamed in packets to the first datanode of the pipeline
/// handed out by the namenode, and the replicated block is reported back.
///
/// A writer dropped without `shutdown` or `abort` removes its backup file and
/// asks the namenode to abort the file.
pub struct DfsWriter {
    namenode_client: ClientProtocolClient<Channel>,
    block_size: u64,
    packet_size: u64,
    path: String,
    bytes_written_to_block: u64,
    backup_path: PathBuf,
    backup_buffer: BufWriter<File>,
    closed: bool,
}

impl DfsWriter {
    /// Starts a new file. Fails if it exists and `overwrite` is not set.
    pub async fn create(
        path: impl Into<String>,
        overwrite: bool,
        namenode_rpc_address: &str,
        config: &Dfs,
    ) -> Result<Self> {
        let path = path.into();
        let mut client = proto_utils::connect_namenode(namenode_rpc_address).await?;
        client
            .start_file_create(proto::CreateFileRequest {
                path: path.clone(),
                overwrite,
            })
            .await?;
        Self::new(client, path, config).await
    }

    /// Reopens an existing file, new blocks are added after its last block.
    pub async fn append(
        path: impl Into<String>,
        namenode_rpc_address: &str,
        config: &Dfs,
    ) -> Result<Self> {
        let path = path.into();
        let mut client = proto_utils::connect_namenode(namenode_rpc_address).await?;
        client
            .append_file(proto::PathRequest { path: path.clone() })
            .await?;
        Self::new(client, path, config).await
    }

    async fn new(
        namenode_client: ClientProtocolClient<Channel>,
        path: String,
        config: &Dfs,
    ) -> Result<Self> {
        let (backup_path, backup_buffer) = new_backup_file(&config.backup_dir).await?;
        Ok(Self {
            namenode_client,
            block_size: config.block_size.max(1),
            packet_size: config.packet_size.max(1),
            path,
            bytes_written_to_block: 0,
            backup_path,
            backup_buffer,
            closed: false,
        })
    }

    async fn write_block(&mut self) -> Result<()> {
        let proto::BlockWithTargets { block, targets } = self
            .namenode_client
            .add_block(proto::PathRequest {
                path: self.path.clone(),
            })
            .await?
            .into_inner();
        let block = block.ok_or_else(|| {
            DfsUtilError::RPCError("Expected to receive a block from namenode".to_owned())
        })?;
        let first_target = targets.first().ok_or_else(|| {
            DfsUtilError::FSError("Namenode returned no datanode for the block".to_owned())
        })?;
        debug!(
            "Writing block {} of '{}' to {}",
            block.id, self.path, first_target.address
        );

        let mut datanode = TcpStream::connect(&first_target.address).await?;
        let op = proto::Operation {
            op: proto::operation::OpCode::WriteBlock as i32,
        };
        proto_utils::write_message(&mut datanode, &op).await?;

        let write_op = proto::WriteBlockOperation {
            block: Some(block),
            targets: targets.iter().map(|info| info.address.clone()).collect(),
        };
        proto_utils::write_message(&mut datanode, &write_op).await?;

        self.backup_buffer.flush().await?;
        let backup_file = self.backup_buffer.get_mut();
        backup_file.seek(SeekFrom::Start(0u64)).await?;

        let mut buffer = vec![];
        let mut remaining_to_send = self.bytes_written_to_block;
        while remaining_to_send > 0 {
            let packet_size = std::cmp::min(remaining_to_send, self.packet_size);
            remaining_to_send -= packet_size;
            let packet = proto::Packet {
                size: packet_size,
                last: remaining_to_send == 0,
            };
            proto_utils::write_message(&mut datanode, &packet).await?;
            buffer.resize_with(packet_size as usize, u8::default);
            backup_file.read_exact(&mut buffer).await?;
            datanode.write_all(&buffer).await?;
        }
        datanode.flush().await?;

        let proto::WriteBlockResponse {
            success,
            block,
            locations,
        } = proto_utils::parse_message(&mut datanode).await?;

        if success {
            self.namenode_client
                .finish_block_write(proto::FinishBlockWriteRequest {
                    block,
                    locations,
                    path: self.path.clone(),
                })
                .await?;
        } else {
            return Err(DfsUtilError::FSError(
                "Replicating block was not successful".to_owned(),
            ));
        }

        let backup_file = self.backup_buffer.get_mut();
        backup_file.set_len(0).await?;
        backup_file.seek(SeekFrom::Start(0u64)).await?;
        self.bytes_written_to_block = 0;

        Ok(())
    }

    async fn abort_on_namenode(&mut self) -> Result<()> {
        self.namenode_client
            .abort_file_create(proto::PathRequest {
                path: self.path.clone(),
            })
            .await?;
        Ok(())
    }

    async fn remove_backup_file(&self) {
        if let Err(err) = tokio::fs::remove_file(&self.backup_path).await {
            warn!(
                "Could not remove backup file {}: {}",
                self.backup_path.display(),
                err
            );
        }
    }

    async fn finish(&mut self) -> Result<()> {
        if self.bytes_written_to_block > 0 {
            self.write_block().await?;
        }

        self.namenode_client
            .finish_file_create(proto::PathRequest {
                path: self.path.clone(),
            })
            .await?;

        Ok(())
    }
}

// Data only reaches the datanodes once a block is full or on shutdown,
// flush just persists the local backup buffer.
#[async_trait]
impl FsOutputStream for DfsWriter {
    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        if self.closed {
            return Err(DfsUtilError::IOError(format!(
                "'{}': Stream already closed",
                self.path
            )));
        }

        let mut buf = buf;
        while !buf.is_empty() {
            let space_in_block = self.block_size - self.bytes_written_to_block;
            let chunk = std::cmp::min(space_in_block, buf.len() as u64) as usize;
            self.backup_buffer.write_all(&buf[..chunk]).await?;
            self.bytes_written_to_block += chunk as u64;
            buf = &buf[chunk..];

            if self.bytes_written_to_block >= self.block_size {
                self.write_block().await?;
            }
        }

        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.backup_buffer.flush().await?;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let finished = self.finish().await;
        if finished.is_err() {
            warn!("Aborting creation of '{}'", self.path);
            if let Err(err) = self.abort_on_namenode().await {
                warn!("Could not abort creation of '{}': {}", self.path, err);
            }
        }
        self.remove_backup_file().await;

        finished
    }

    async fn abort(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        warn!("Aborting creation of '{}'", self.path);
        let aborted = self.abort_on_namenode().await;
        self.remove_backup_file().await;

        aborted
    }
}

impl Drop for DfsWriter {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!("'{}' dropped before shutdown, aborting", self.path);

        if let Err(err) = std::fs::remove_file(&self.backup_path) {
            warn!(
                "Could not remove backup file {}: {}",
                self.backup_path.display(),
                err
            );
        }

        // Outside of a runtime only the backup file can be cleaned up.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let mut client = self.namenode_client.clone();
            let path = self.path.clone();
            runtime.spawn(async move {
                let request = proto::PathRequest { path: path.clone() };
                if let Err(err) = client.abort_file_create(request).await {
                    warn!("Could not abort creation of '{}': {}", path, err);
                }
            });
        }
    }
}
