//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! In-memory transport for tests and benchmarks.
//!
//! Wraps a [`tokio::io::DuplexStream`] pair so two connections can talk to
//! each other inside one process with no network stack involved. Closing one
//! side surfaces as EOF on the other, which makes disconnect paths easy to
//! exercise deterministically.

use crate::transport::{Transport, TransportMetadata};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};

/// Default in-memory buffer size per direction.
const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// In-memory duplex transport.
///
/// # Examples
///
/// ```rust
/// use duplexrpc::transport::MemoryTransport;
/// use tokio::io::{AsyncReadExt, AsyncWriteExt};
///
/// # async fn example() -> std::io::Result<()> {
/// let (mut left, mut right) = MemoryTransport::pair_default();
///
/// left.write_all(b"hello").await?;
/// let mut buffer = [0u8; 5];
/// right.read_exact(&mut buffer).await?;
/// assert_eq!(&buffer, b"hello");
/// # Ok(())
/// # }
/// ```
pub struct MemoryTransport {
    stream: DuplexStream,
    metadata: TransportMetadata,
}

impl MemoryTransport {
    /// Creates a connected pair of in-memory transports.
    ///
    /// `buffer_size` bounds the bytes buffered per direction; a full buffer
    /// exerts backpressure on the writer exactly like a full socket buffer.
    #[must_use]
    pub fn pair(buffer_size: usize) -> (Self, Self) {
        let (left, right) = tokio::io::duplex(buffer_size);
        (
            Self {
                stream: left,
                metadata: TransportMetadata::new("memory"),
            },
            Self {
                stream: right,
                metadata: TransportMetadata::new("memory"),
            },
        )
    }

    /// Creates a connected pair with the default buffer size.
    #[must_use]
    pub fn pair_default() -> (Self, Self) {
        Self::pair(DEFAULT_BUFFER_SIZE)
    }
}

impl Transport for MemoryTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }
}

impl AsyncRead for MemoryTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for MemoryTransport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}
