use crate::error::{DfsUtilError, Result};
use crate::io::FsInputStream;
use crate::proto;
use crate::utils::proto_utils;

use async_trait::async_trait;

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;

use tracing::{debug, warn};

/// Reads a file block by block from the datanodes holding it.
pub struct DfsReader {
    blocks_with_locations: Vec<(proto::Block, Vec<String>)>,
    // index of the next block to fetch
    block_index: usize,
    current_reader: Option<BufStream<TcpStream>>,
    // bytes of the current block which have not been received yet
    current_block_remaining: u64,
    // buffers the last read packet
    buffer: Vec<u8>,
    buffer_pos: usize,
}

impl DfsReader {
    pub async fn open(namenode_rpc_address: &str, path: impl Into<String>) -> Result<Self> {
        let mut client = proto_utils::connect_namenode(namenode_rpc_address).await?;

        let open_file_request = proto::PathRequest { path: path.into() };
        let proto::OpenFileResponse { blocks } =
            client.open_file(open_file_request).await?.into_inner();
        let blocks_with_locations = blocks
            .into_iter()
            .map(|block_with_locations| {
                let proto::BlockWithLocations { block, locations } = block_with_locations;
                let block = block.ok_or_else(|| {
                    DfsUtilError::RPCError("Expected to receive a block from namenode".to_owned())
                })?;
                Ok((block, locations))
            })
            .collect::<Result<Vec<(proto::Block, Vec<String>)>>>()?;

        Ok(Self::with_blocks(blocks_with_locations))
    }

    fn with_blocks(blocks_with_locations: Vec<(proto::Block, Vec<String>)>) -> Self {
        Self {
            blocks_with_locations,
            block_index: 0,
            current_reader: None,
            current_block_remaining: 0,
            buffer: Vec::new(),
            buffer_pos: 0,
        }
    }

    pub fn len(&self) -> u64 {
        self.blocks_with_locations
            .iter()
            .fold(0, |current_size, (block, _)| current_size + block.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn next_block(&mut self) -> Result<()> {
        let (block, locations) = &self.blocks_with_locations[self.block_index];
        let block = block.clone();

        let mut stream = None;
        for location in locations {
            match TcpStream::connect(location).await {
                Ok(connection) => {
                    debug!("Reading block {} from {}", block.id, location);
                    stream = Some(connection);
                    break;
                }
                Err(err) => warn!("Could not reach datanode {}: {}", location, err),
            }
        }
        let mut current_reader = BufStream::new(stream.ok_or_else(|| {
            DfsUtilError::FSError(format!("No reachable location for block {}", block.id))
        })?);

        let op = proto::Operation {
            op: proto::operation::OpCode::ReadBlock as i32,
        };
        proto_utils::write_message(&mut current_reader, &op).await?;
        let block_len = block.len;
        let read_op = proto::ReadBlockOperation { block: Some(block) };
        proto_utils::write_message(&mut current_reader, &read_op).await?;
        current_reader.flush().await?;

        self.block_index += 1;
        self.current_block_remaining = block_len;
        self.current_reader = Some(current_reader);

        Ok(())
    }

    async fn next_packet(&mut self) -> Result<()> {
        let current_reader = self
            .current_reader
            .as_mut()
            .ok_or_else(|| DfsUtilError::IOError("No block is being read".to_owned()))?;

        let proto::Packet { size, last } = proto_utils::parse_message(current_reader).await?;
        self.buffer.clear();
        self.buffer.resize_with(size as usize, u8::default);
        current_reader.read_exact(&mut self.buffer).await?;
        self.buffer_pos = 0;

        self.current_block_remaining = if last {
            0
        } else {
            self.current_block_remaining.saturating_sub(size)
        };
        if self.current_block_remaining == 0 {
            self.current_reader = None;
        }

        Ok(())
    }
}

#[async_trait]
impl FsInputStream for DfsReader {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            if self.buffer_pos < self.buffer.len() {
                let available = &self.buffer[self.buffer_pos..];
                let read = std::cmp::min(available.len(), buf.len());
                buf[..read].copy_from_slice(&available[..read]);
                self.buffer_pos += read;
                return Ok(read);
            }

            if self.current_block_remaining == 0 {
                if self.block_index == self.blocks_with_locations.len() {
                    return Ok(0);
                }
                self.next_block().await?;
            } else {
                self.next_packet().await?;
            }
        }
    }
}
