//! [`ByteSource`] adapters for the common input shapes

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, TryStreamExt};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Result;
use crate::traits::ByteSource;

/// In-memory data
#[async_trait]
impl ByteSource for Bytes {
    async fn read(&mut self, size: usize) -> Result<Bytes> {
        let n = size.min(self.len());
        Ok(self.split_to(n))
    }
}

/// Any async reader: files, stdin, sockets
pub struct ReaderSource<R> {
    reader: R,
}

impl<R> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> ByteSource for ReaderSource<R> {
    async fn read(&mut self, size: usize) -> Result<Bytes> {
        let mut buf = vec![0u8; size];
        let mut filled = 0;
        // A single read may return less than asked for well before EOF.
        while filled < size {
            let n = self.reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        Ok(Bytes::from(buf))
    }
}

/// A stream of chunks, e.g. the body of another object
pub struct StreamSource {
    chunks: BoxStream<'static, Result<Bytes>>,
    pending: BytesMut,
    done: bool,
}

impl StreamSource {
    pub fn new(chunks: BoxStream<'static, Result<Bytes>>) -> Self {
        Self {
            chunks,
            pending: BytesMut::new(),
            done: false,
        }
    }
}

#[async_trait]
impl ByteSource for StreamSource {
    async fn read(&mut self, size: usize) -> Result<Bytes> {
        while !self.done && self.pending.len() < size {
            match self.chunks.try_next().await? {
                Some(chunk) => self.pending.extend_from_slice(&chunk),
                None => self.done = true,
            }
        }
        let n = size.min(self.pending.len());
        Ok(self.pending.split_to(n).freeze())
    }
}
