// Stream relays: a straight byte copy ("echo") and a channel-fed merge loop
// bounded by a real deadline and a cancel signal.

use std::time::Duration;

use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::broadcast,
};

use crate::mspc::{self, ChannelError};

pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Chunks the reader task may run ahead of the writer.
const BUFFERED_CHUNKS: usize = 16;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("relay io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("relay channel failed: {0}")]
    Channel(#[from] ChannelError),

    #[error("relay reader task did not finish: {0}")]
    ReaderFailed(String),
}

pub type RelayResult<T> = anyhow::Result<T, RelayError>;

/// Why a [`relay`] stopped forwarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// the reader hit end of input and closed the channel
    SourceClosed,
    DeadlineElapsed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    pub bytes: usize,
    pub chunks: usize,
    pub end: RelayEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOptions {
    pub chunk_size: usize,
    pub deadline: Option<Duration>,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            deadline: None,
        }
    }
}

/// `echo` copies `reader` into `writer` until end of input or until
/// `cancel_signal` fires (dropping every sender counts as firing). Returns the
/// number of bytes copied.
pub async fn echo<R, W>(
    reader: &mut R,
    writer: &mut W,
    mut cancel_signal: broadcast::Receiver<()>,
) -> RelayResult<usize>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut copied = 0;
    let mut buf = [0u8; DEFAULT_CHUNK_SIZE];

    loop {
        let bytes_read;

        tokio::select! {
            biased;

            _ = cancel_signal.recv() => {
                concur_logs::info!("echo cancelled after {} bytes", copied);
                break;
            },

            op = reader.read(&mut buf) => {
                bytes_read = op?;
            }
        }

        if bytes_read == 0 {
            break;
        }

        writer.write_all(&buf[0..bytes_read]).await?;
        writer.flush().await?;
        copied += bytes_read;
    }

    Ok(copied)
}

/// `relay` spawns a reader task that pumps chunks of `reader` into a channel
/// and forwards them to `writer` until the reader closes the channel, the
/// deadline passes or `cancel_signal` fires. The reader task is always
/// stopped and awaited before returning.
pub async fn relay<R, W>(
    reader: R,
    writer: &mut W,
    options: RelayOptions,
    mut cancel_signal: broadcast::Receiver<()>,
) -> RelayResult<RelayOutcome>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let (chunk_sender, mut chunks) = mspc::create_bounded::<Vec<u8>>(BUFFERED_CHUNKS);
    let (stop_reader, reader_stop_signal) = broadcast::channel::<()>(1);
    let pump = tokio::spawn(pump_chunks(
        reader,
        chunk_sender,
        options.chunk_size,
        reader_stop_signal,
    ));

    let deadline = async move {
        match options.deadline {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut bytes = 0;
    let mut forwarded = 0;

    let stopped: RelayResult<RelayEnd> = loop {
        tokio::select! {
            biased;

            _ = cancel_signal.recv() => break Ok(RelayEnd::Cancelled),

            () = &mut deadline => break Ok(RelayEnd::DeadlineElapsed),

            chunk = chunks.async_receive() => match chunk {
                Ok(data) => {
                    if let Err(err) = forward(writer, &data).await {
                        break Err(err);
                    }
                    bytes += data.len();
                    forwarded += 1;
                },
                Err(ChannelError::Closed) => break Ok(RelayEnd::SourceClosed),
                Err(err) => break Err(err.into()),
            },
        }
    };

    // a reader blocked on a full channel wakes up once the receiver is gone
    let _ = stop_reader.send(());
    drop(chunks);

    let pumped = match pump.await {
        Ok(result) => result,
        Err(err) => Err(RelayError::ReaderFailed(err.to_string())),
    };

    let end = match stopped {
        Ok(end) => end,
        Err(err) => {
            if let Err(reader_err) = &pumped {
                concur_logs::debug!("relay reader also failed: {}", reader_err);
            }
            return Err(err);
        }
    };

    let read = pumped?;
    concur_logs::info!(
        "relay stopped ({:?}) after {} chunks, {} bytes of {} read",
        end,
        forwarded,
        bytes,
        read
    );

    Ok(RelayOutcome {
        bytes,
        chunks: forwarded,
        end,
    })
}

async fn forward<W>(writer: &mut W, data: &[u8]) -> RelayResult<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

// Sends only the bytes actually read and closes the channel once the source
// is done, which is how the merge loop learns the input ended.
async fn pump_chunks<R>(
    mut reader: R,
    mut sender: mspc::SendChannel<Vec<u8>>,
    chunk_size: usize,
    mut stop_signal: broadcast::Receiver<()>,
) -> RelayResult<usize>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0;

    loop {
        let bytes_read = tokio::select! {
            biased;

            _ = stop_signal.recv() => break,

            op = reader.read(&mut buf) => op?,
        };

        if bytes_read == 0 {
            break;
        }

        if sender.async_send(buf[..bytes_read].to_vec()).await.is_err() {
            // merge loop has gone away
            break;
        }
        total += bytes_read;
    }

    let _ = sender.close();
    Ok(total)
}
