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

//! Channel message envelope.
//!
//! Every frame payload carries a 4-byte little-endian `i32` handler code
//! followed by an opaque message body:
//!
//! ```text
//! +------------------------+----------------+
//! | Handler code (4 bytes) | Body (N bytes) |
//! +------------------------+----------------+
//! ```
//!
//! The handler code routes the body to the pipeline stage that knows how to
//! decode it; the envelope itself never inspects the body.

use crate::channel::framing::FrameWriter;
use crate::error::RpcError;
use tokio::io::AsyncWrite;

/// Handler codes used by the RPC pipeline stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum HandlerCode {
    /// An [`RpcRequest`](crate::rpc::RpcRequest) body.
    RpcRequest = 1,
    /// An [`RpcResponse`](crate::rpc::RpcResponse) body.
    RpcResponse = 2,
    /// An [`RpcFault`](crate::rpc::RpcFault) body.
    RpcFault = 3,
}

impl HandlerCode {
    /// Returns the wire value for this code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// A decoded channel message: handler code plus opaque body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelMessage {
    /// Routing code identifying the pipeline stage this body belongs to.
    pub handler_code: i32,
    /// Opaque message body.
    pub payload: Vec<u8>,
}

impl ChannelMessage {
    /// Creates a message for a known handler code.
    #[must_use]
    pub fn new(code: HandlerCode, payload: Vec<u8>) -> Self {
        Self {
            handler_code: code.code(),
            payload,
        }
    }

    /// Encodes this message into a frame payload.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + self.payload.len());
        bytes.extend_from_slice(&self.handler_code.to_le_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Decodes a frame payload into a message.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ChannelFault`] if the payload is shorter than the
    /// handler code header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RpcError> {
        if bytes.len() < 4 {
            return Err(RpcError::channel_fault(format!(
                "malformed channel message: {} bytes is too short for a handler code",
                bytes.len()
            )));
        }
        let handler_code = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        Ok(Self {
            handler_code,
            payload: bytes[4..].to_vec(),
        })
    }
}

/// Serialized writer for outbound channel messages.
///
/// Wraps the connection's write half behind an async mutex so concurrent
/// callers interleave whole frames, never partial ones.
pub struct ChannelMessageWriter {
    writer: tokio::sync::Mutex<FrameWriter<Box<dyn AsyncWrite + Send + Unpin>>>,
}

impl ChannelMessageWriter {
    /// Creates a writer over the connection's write half.
    #[must_use]
    pub fn new(writer: Box<dyn AsyncWrite + Send + Unpin>) -> Self {
        Self {
            writer: tokio::sync::Mutex::new(FrameWriter::new(writer)),
        }
    }

    /// Writes one message as a single frame.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ChannelFault`] if the frame cannot be written.
    pub async fn write(&self, message: &ChannelMessage) -> Result<(), RpcError> {
        let bytes = message.to_bytes();
        let mut writer = self.writer.lock().await;
        writer.write_frame(&bytes).await
    }

    /// Shuts down the underlying write half.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ChannelFault`] if the shutdown fails.
    pub async fn shutdown(&self) -> Result<(), RpcError> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_handler_code_and_payload() {
        let message = ChannelMessage::new(HandlerCode::RpcRequest, b"body".to_vec());
        let bytes = message.to_bytes();
        assert_eq!(&bytes[0..4], &1i32.to_le_bytes());

        let decoded = ChannelMessage::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn empty_body_is_valid() {
        let message = ChannelMessage::new(HandlerCode::RpcFault, Vec::new());
        let decoded = ChannelMessage::from_bytes(&message.to_bytes()).unwrap();
        assert_eq!(decoded.handler_code, 3);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn short_payload_is_a_channel_fault() {
        let error = ChannelMessage::from_bytes(&[1, 2, 3]).unwrap_err();
        assert!(error.is_channel_fault());
        assert!(error.to_string().contains("malformed"));
    }

    #[test]
    fn unknown_handler_codes_survive_decoding() {
        let mut bytes = 42i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"mystery");
        let decoded = ChannelMessage::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.handler_code, 42);
    }
}
