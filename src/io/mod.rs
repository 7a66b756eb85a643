mod dfs_reader;
mod dfs_writer;

pub use dfs_reader::DfsReader;
pub use dfs_writer::DfsWriter;

use crate::error::Result;

use async_trait::async_trait;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use tracing::warn;

/// A byte sink returned by `create` and `append`.
///
/// Data is only guaranteed to be visible to other readers after
/// [`shutdown`](FsOutputStream::shutdown) returned successfully.
#[async_trait]
pub trait FsOutputStream: Send {
    async fn write(&mut self, buf: &[u8]) -> Result<()>;

    async fn flush(&mut self) -> Result<()>;

    async fn shutdown(&mut self) -> Result<()>;

    /// Gives up on the stream and releases whatever it holds. Data not yet
    /// committed is discarded. A no-op after `shutdown`.
    async fn abort(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A byte source returned by `open`. A read of 0 bytes marks the end of the file.
#[async_trait]
pub trait FsInputStream: Send {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Lets any tokio reader act as an [`FsInputStream`].
pub struct ReaderStream<'a, R: ?Sized>(pub &'a mut R);

#[async_trait]
impl<R: AsyncRead + Unpin + Send + ?Sized> FsInputStream for ReaderStream<'_, R> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.0.read(buf).await?)
    }
}

/// Lets any tokio writer act as an [`FsOutputStream`].
pub struct WriterStream<W>(pub W);

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> FsOutputStream for WriterStream<W> {
    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.0.write_all(buf).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.0.flush().await?;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.0.flush().await?;
        self.0.shutdown().await?;
        Ok(())
    }
}

/// Copies everything from `input` into `output` and shuts `output` down.
/// Returns the number of bytes copied.
///
/// If reading, writing or the shutdown fails, `output` is aborted before the
/// error is returned.
pub async fn copy_bytes(
    input: &mut (dyn FsInputStream + '_),
    output: &mut (dyn FsOutputStream + '_),
    buffer_size: usize,
) -> Result<u64> {
    match pump(input, output, buffer_size).await {
        Ok(copied) => Ok(copied),
        Err(err) => {
            if let Err(abort_err) = output.abort().await {
                warn!("Could not abort output stream: {}", abort_err);
            }
            Err(err)
        }
    }
}

async fn pump(
    input: &mut (dyn FsInputStream + '_),
    output: &mut (dyn FsOutputStream + '_),
    buffer_size: usize,
) -> Result<u64> {
    let mut buf = vec![0; buffer_size.max(1)];
    let mut copied = 0;
    loop {
        let read = input.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        output.write(&buf[..read]).await?;
        copied += read as u64;
    }
    output.flush().await?;
    output.shutdown().await?;

    Ok(copied)
}

/// Same as [`copy_bytes`], reading from any tokio reader.
pub async fn copy_from_reader(
    reader: &mut (impl AsyncRead + Unpin + Send + ?Sized),
    output: &mut (dyn FsOutputStream + '_),
    buffer_size: usize,
) -> Result<u64> {
    copy_bytes(&mut ReaderStream(reader), output, buffer_size).await
}

/// Reads an input stream to its end.
pub async fn read_to_end(input: &mut (dyn FsInputStream + '_)) -> Result<Vec<u8>> {
    let mut content = vec![];
    let mut buf = vec![0; 4096];
    loop {
        let read = input.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        content.extend_from_slice(&buf[..read]);
    }
    Ok(content)
}
