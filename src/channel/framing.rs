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

//! Length-prefixed frame I/O.
//!
//! Each frame is a 4-byte little-endian `u32` length header followed by that
//! many payload bytes:
//!
//! ```text
//! +------------------+-------------------+
//! | Length (4 bytes) | Payload (N bytes) |
//! +------------------+-------------------+
//! ```
//!
//! A clean end-of-stream between frames reads as `Ok(None)`; an end-of-stream
//! inside a frame (a truncated header or payload) is a channel fault. All I/O
//! failures at this layer surface as [`RpcError::ChannelFault`].
//!
//! # Examples
//!
//! ```rust
//! use duplexrpc::channel::framing::{FrameReader, FrameWriter};
//!
//! # async fn example() -> Result<(), duplexrpc::error::RpcError> {
//! let mut buffer = Vec::new();
//! FrameWriter::new(&mut buffer).write_frame(b"hello").await?;
//!
//! let mut reader = FrameReader::new(&buffer[..]);
//! assert_eq!(reader.read_frame().await?.as_deref(), Some(&b"hello"[..]));
//! assert_eq!(reader.read_frame().await?, None);
//! # Ok(())
//! # }
//! ```

use crate::error::RpcError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame payload size (16 MiB).
///
/// Bounds the allocation a single length header can demand from the reader.
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Size of the frame length header in bytes.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Writes length-prefixed frames to an async byte sink.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W> FrameWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Creates a frame writer over the given byte sink.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one frame and flushes it.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ChannelFault`] if the payload exceeds
    /// [`MAX_FRAME_SIZE`] or the underlying write fails.
    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<(), RpcError> {
        let len = payload.len();
        if len > MAX_FRAME_SIZE as usize {
            return Err(RpcError::channel_fault(format!(
                "frame size {len} exceeds maximum {MAX_FRAME_SIZE}"
            )));
        }

        let header = (len as u32).to_le_bytes();
        self.writer
            .write_all(&header)
            .await
            .map_err(|e| RpcError::channel_fault_io("failed to write frame header", e))?;
        self.writer
            .write_all(payload)
            .await
            .map_err(|e| RpcError::channel_fault_io("failed to write frame payload", e))?;
        self.writer
            .flush()
            .await
            .map_err(|e| RpcError::channel_fault_io("failed to flush frame", e))?;
        Ok(())
    }

    /// Shuts down the underlying byte sink.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ChannelFault`] if the shutdown fails.
    pub async fn shutdown(&mut self) -> Result<(), RpcError> {
        self.writer
            .shutdown()
            .await
            .map_err(|e| RpcError::channel_fault_io("failed to shut down stream", e))
    }
}

/// Reads length-prefixed frames from an async byte source.
pub struct FrameReader<R> {
    reader: R,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Creates a frame reader over the given byte source.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads the next frame.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly on a frame boundary.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ChannelFault`] if the stream ends mid-frame, the
    /// header announces a payload larger than [`MAX_FRAME_SIZE`], or the
    /// underlying read fails.
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, RpcError> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        let mut filled = 0;

        // read_exact reports a bare UnexpectedEof either way, so fill the
        // header manually to tell a clean close from a truncated frame.
        while filled < FRAME_HEADER_SIZE {
            let n = self
                .reader
                .read(&mut header[filled..])
                .await
                .map_err(|e| RpcError::channel_fault_io("failed to read frame header", e))?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(RpcError::channel_fault(
                    "stream ended inside a frame header",
                ));
            }
            filled += n;
        }

        let len = u32::from_le_bytes(header);
        if len > MAX_FRAME_SIZE {
            return Err(RpcError::channel_fault(format!(
                "frame size {len} exceeds maximum {MAX_FRAME_SIZE}"
            )));
        }

        let mut payload = vec![0u8; len as usize];
        self.reader
            .read_exact(&mut payload)
            .await
            .map_err(|e| RpcError::channel_fault_io("stream ended inside a frame payload", e))?;
        Ok(Some(payload))
    }
}
