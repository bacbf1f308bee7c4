//! Bounded in-memory byte conduits.
//!
//! # Responsibilities
//! - Connect exactly one writer task to exactly one reader task
//! - Block the writer once `capacity` bytes are buffered (backpressure)
//! - Signal end-of-stream to the reader when the writer closes or is dropped
//!
//! # Design Decisions
//! - Built on `tokio::io::duplex`; only one direction of each pair is used
//! - The reader side is line oriented for the write loop, and can be turned
//!   into a byte stream for request bodies

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio_util::io::ReaderStream;

/// Create a conduit buffering at most `capacity` bytes.
pub fn conduit(capacity: usize) -> (ConduitWriter, ConduitReader) {
    let (writer, reader) = tokio::io::duplex(capacity.max(1));
    (
        ConduitWriter { inner: writer },
        ConduitReader {
            inner: BufReader::new(reader),
        },
    )
}

/// Write side of a conduit.
#[derive(Debug)]
pub struct ConduitWriter {
    inner: DuplexStream,
}

impl ConduitWriter {
    /// Write all of `bytes`, waiting while the conduit is full.
    ///
    /// Fails with `BrokenPipe` once the reader has been dropped.
    pub async fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(bytes).await?;
        self.inner.flush().await
    }

    /// Write `bytes` followed by a `\n` terminator.
    pub async fn write_line(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(bytes).await?;
        self.inner.write_all(b"\n").await?;
        self.inner.flush().await
    }

    /// Close the write side. The reader observes end-of-stream after
    /// draining what is already buffered.
    pub async fn close(mut self) -> std::io::Result<()> {
        self.inner.shutdown().await
    }
}

/// Read side of a conduit.
#[derive(Debug)]
pub struct ConduitReader {
    inner: BufReader<DuplexStream>,
}

impl ConduitReader {
    /// Read up to and including the next `\n`.
    ///
    /// Returns `None` at end-of-stream. A final chunk without a terminator is
    /// returned as-is before `None`.
    pub async fn read_chunk(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        let mut buf = Vec::new();
        let n = self.inner.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            Ok(None)
        } else {
            Ok(Some(buf))
        }
    }

    /// Turn the reader into a stream of byte chunks, for use as a body.
    pub fn into_stream(self) -> ReaderStream<BufReader<DuplexStream>> {
        ReaderStream::new(self.inner)
    }
}
