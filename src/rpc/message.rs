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

//! RPC wire messages.
//!
//! Three message kinds cross the wire, each a JSON body behind its own
//! [`HandlerCode`]:
//!
//! - [`RpcRequest`]: a call, carrying a fresh query ID, the target interface
//!   and method signature, and pre-serialized arguments.
//! - [`RpcResponse`]: the successful completion of a request, correlated by
//!   query ID.
//! - [`RpcFault`]: the failed completion of a request, carrying a
//!   [`FaultCause`] the caller turns back into an error.
//!
//! Arguments and return values are JSON strings produced by the caller and
//! consumed by the handler; the messages themselves treat them as opaque.

use crate::channel::{ChannelMessage, ChannelMessageWriter, HandlerCode};
use crate::error::RpcError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fault class tag for contract mismatches.
const FAULT_KIND_CONTRACT_MISMATCH: &str = "contract-mismatch";
/// Fault class tag for application errors thrown by a handler.
const FAULT_KIND_APPLICATION: &str = "application";

/// An outbound call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcRequest {
    /// Opaque correlation ID, unique per request.
    pub query_id: String,
    /// Name of the service interface being called.
    pub interface_name: String,
    /// Method signature, method name and parameter type names joined by
    /// underscores, e.g. `Add_Int32_Int32`.
    pub method_signature: String,
    /// Positionally ordered, individually serialized arguments.
    pub arguments: Vec<String>,
}

impl RpcRequest {
    /// Creates a request with a freshly generated query ID.
    #[must_use]
    pub fn new(
        interface_name: impl Into<String>,
        method_signature: impl Into<String>,
        arguments: Vec<String>,
    ) -> Self {
        Self {
            query_id: Uuid::new_v4().to_string(),
            interface_name: interface_name.into(),
            method_signature: method_signature.into(),
            arguments,
        }
    }
}

/// The successful completion of a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcResponse {
    /// Query ID of the request this completes.
    pub query_id: String,
    /// Serialized return value, absent for void methods.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub return_value: Option<String>,
}

/// The failed completion of a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcFault {
    /// Query ID of the request this completes.
    pub query_id: String,
    /// What went wrong on the remote side.
    pub cause: FaultCause,
}

/// Serialized description of a remote failure.
///
/// The `kind` tag preserves the error class across the wire so a contract
/// mismatch detected remotely resurfaces as a contract mismatch at the
/// caller rather than a generic remote fault.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultCause {
    /// Error class tag, `"contract-mismatch"` or `"application"`.
    pub kind: String,
    /// Human-readable error message.
    pub error: String,
    /// Optional extra detail, such as a source error chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub detail: Option<String>,
}

impl FaultCause {
    /// Describes an error for transmission to the caller.
    #[must_use]
    pub fn from_error(error: &RpcError) -> Self {
        let kind = if error.is_contract_mismatch() {
            FAULT_KIND_CONTRACT_MISMATCH
        } else {
            FAULT_KIND_APPLICATION
        };
        let detail = std::error::Error::source(error).map(|source| source.to_string());
        Self {
            kind: kind.to_string(),
            error: error.to_string(),
            detail,
        }
    }

    /// Reconstructs the caller-side error this cause describes.
    #[must_use]
    pub fn into_error(self) -> RpcError {
        if self.kind == FAULT_KIND_CONTRACT_MISMATCH {
            RpcError::contract_mismatch(self.error)
        } else {
            RpcError::remote_fault(self.error, self.detail)
        }
    }
}

fn encode<T: Serialize>(code: HandlerCode, body: &T) -> Result<ChannelMessage, RpcError> {
    let payload = serde_json::to_vec(body).map_err(|e| {
        RpcError::channel_fault(format!("failed to encode {code:?} body: {e}"))
    })?;
    Ok(ChannelMessage::new(code, payload))
}

fn decode<T: for<'de> Deserialize<'de>>(
    code: HandlerCode,
    message: &ChannelMessage,
) -> Result<T, RpcError> {
    if message.handler_code != code.code() {
        return Err(RpcError::contract_mismatch(format!(
            "expected handler code {} ({code:?}), got {}",
            code.code(),
            message.handler_code
        )));
    }
    serde_json::from_slice(&message.payload).map_err(|e| {
        RpcError::channel_fault(format!("failed to decode {code:?} body: {e}"))
    })
}

/// Encodes a request into a channel message.
///
/// # Errors
///
/// Returns [`RpcError::ChannelFault`] if serialization fails.
pub fn encode_request(request: &RpcRequest) -> Result<ChannelMessage, RpcError> {
    encode(HandlerCode::RpcRequest, request)
}

/// Decodes a request from a channel message.
///
/// # Errors
///
/// Returns [`RpcError::ContractMismatch`] on a handler code mismatch and
/// [`RpcError::ChannelFault`] on a malformed body.
pub fn decode_request(message: &ChannelMessage) -> Result<RpcRequest, RpcError> {
    decode(HandlerCode::RpcRequest, message)
}

/// Encodes a response into a channel message.
///
/// # Errors
///
/// Returns [`RpcError::ChannelFault`] if serialization fails.
pub fn encode_response(response: &RpcResponse) -> Result<ChannelMessage, RpcError> {
    encode(HandlerCode::RpcResponse, response)
}

/// Decodes a response from a channel message.
///
/// # Errors
///
/// Returns [`RpcError::ContractMismatch`] on a handler code mismatch and
/// [`RpcError::ChannelFault`] on a malformed body.
pub fn decode_response(message: &ChannelMessage) -> Result<RpcResponse, RpcError> {
    decode(HandlerCode::RpcResponse, message)
}

/// Encodes a fault into a channel message.
///
/// # Errors
///
/// Returns [`RpcError::ChannelFault`] if serialization fails.
pub fn encode_fault(fault: &RpcFault) -> Result<ChannelMessage, RpcError> {
    encode(HandlerCode::RpcFault, fault)
}

/// Decodes a fault from a channel message.
///
/// # Errors
///
/// Returns [`RpcError::ContractMismatch`] on a handler code mismatch and
/// [`RpcError::ChannelFault`] on a malformed body.
pub fn decode_fault(message: &ChannelMessage) -> Result<RpcFault, RpcError> {
    decode(HandlerCode::RpcFault, message)
}

/// Typed writer for outbound RPC messages.
pub struct RpcMessageWriter {
    channel: ChannelMessageWriter,
}

impl RpcMessageWriter {
    /// Wraps a channel writer.
    #[must_use]
    pub fn new(channel: ChannelMessageWriter) -> Self {
        Self { channel }
    }

    /// Writes a request frame.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ChannelFault`] if encoding or writing fails.
    pub async fn write_request(&self, request: &RpcRequest) -> Result<(), RpcError> {
        self.channel.write(&encode_request(request)?).await
    }

    /// Writes a response frame.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ChannelFault`] if encoding or writing fails.
    pub async fn write_response(&self, response: &RpcResponse) -> Result<(), RpcError> {
        self.channel.write(&encode_response(response)?).await
    }

    /// Writes a fault frame.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ChannelFault`] if encoding or writing fails.
    pub async fn write_fault(&self, fault: &RpcFault) -> Result<(), RpcError> {
        self.channel.write(&encode_fault(fault)?).await
    }

    /// Shuts down the underlying write half.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ChannelFault`] if the shutdown fails.
    pub async fn shutdown(&self) -> Result<(), RpcError> {
        self.channel.shutdown().await
    }
}
