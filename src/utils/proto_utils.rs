use crate::error::{DfsUtilError, Result};
use crate::proto::client_protocol_client::ClientProtocolClient;

use prost::DecodeError;
use prost::Message;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use tonic::transport::Channel;

use tracing::debug;

pub async fn connect_namenode(namenode_rpc_address: &str) -> Result<ClientProtocolClient<Channel>> {
    match ClientProtocolClient::connect(String::from(namenode_rpc_address)).await {
        Ok(client) => {
            debug!("Connected to namenode at {}", namenode_rpc_address);
            Ok(client)
        }
        Err(err) => Err(DfsUtilError::RPCError(format!(
            "Could not connect to namenode: {}",
            err
        ))),
    }
}

pub async fn parse_message<T: Message + Default>(
    reader: &mut (impl AsyncRead + Unpin),
) -> Result<T> {
    let (size, _) = get_message_size(reader).await?;

    let mut buffer = vec![0u8; size as usize];
    reader.read_exact(buffer.as_mut()).await?;

    let message = T::decode(buffer.as_ref())?;
    Ok(message)
}

/// Writes a length delimited message, without flushing `writer`.
pub async fn write_message<T: Message>(
    writer: &mut (impl AsyncWrite + Unpin),
    message: &T,
) -> Result<()> {
    let mut buffer = Vec::with_capacity(message.encoded_len() + 10);
    message.encode_length_delimited(&mut buffer)?;
    writer.write_all(&buffer).await?;
    Ok(())
}

async fn get_message_size(reader: &mut (impl AsyncRead + Unpin)) -> Result<(u64, u8)> {
    let mut result = 0;
    let mut shift = 0;
    for bytes_read in 1..=10 {
        let tmp = reader.read_u8().await?;
        result |= u64::from(tmp & 0x7f) << shift;
        if tmp < 0x80 {
            return Ok((result, bytes_read));
        }
        shift += 7;
    }

    Err(DfsUtilError::ProtoDecodeError(DecodeError::new(
        "invalid varint",
    )))
}

#[cfg(test)]
mod test {

    use super::{parse_message, write_message};

    use crate::proto::{Block, Operation, Packet, WriteBlockOperation};

    use prost::Message;

    #[tokio::test]
    async fn buffer_with_multiple_messages() {
        let mut buffer = vec![];

        let first_op = Operation { op: 0 };
        first_op
            .encode_length_delimited(&mut buffer)
            .expect("Should encode");

        let second_op = Operation { op: 1 };
        second_op
            .encode_length_delimited(&mut buffer)
            .expect("Should encode");

        let third_op = Operation { op: 0 };
        third_op
            .encode_length_delimited(&mut buffer)
            .expect("Should encode");

        let mut reader = &buffer[..];

        let message: Operation = parse_message(&mut reader).await.expect("Should work fine");
        assert_eq!(message, first_op);

        let message: Operation = parse_message(&mut reader).await.expect("Should work fine");
        assert_eq!(message, second_op);

        let message: Operation = parse_message(&mut reader).await.expect("Should work fine");
        assert_eq!(message, third_op);
    }

    #[tokio::test]
    async fn sizes_spanning_several_varint_bytes() {
        let write_op = WriteBlockOperation {
            block: Some(Block { id: 7, len: 0 }),
            targets: (0..20)
                .map(|i| format!("127.0.0.1:{}", 42001 + i))
                .collect(),
        };
        assert!(write_op.encoded_len() > 127);

        let mut buffer = vec![];
        write_message(&mut buffer, &write_op).await.unwrap();
        write_message(&mut buffer, &Operation { op: 1 }).await.unwrap();

        let mut reader = &buffer[..];
        let parsed: WriteBlockOperation = parse_message(&mut reader).await.unwrap();
        assert_eq!(parsed, write_op);
        let parsed: Operation = parse_message(&mut reader).await.unwrap();
        assert_eq!(parsed.op, 1);
    }

    #[tokio::test]
    async fn truncated_input_is_an_error() {
        let mut buffer = vec![];
        Packet { size: 42, last: false }
            .encode_length_delimited(&mut buffer)
            .unwrap();
        buffer.truncate(buffer.len() - 1);

        let mut reader = &buffer[..];
        assert!(parse_message::<Packet>(&mut reader).await.is_err());
    }
}
