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

//! The RPC error taxonomy.
//!
//! Every failure a caller can observe falls into one of four classes:
//!
//! - [`RpcError::ChannelFault`]: the transport closed or failed. Always
//!   recoverable by reconnecting, never a logic error.
//! - [`RpcError::Timeout`]: no reply arrived within the bound. The caller may
//!   retry.
//! - [`RpcError::ContractMismatch`]: the two peers disagree about available
//!   interfaces, method signatures, or argument shapes. Not retryable without
//!   fixing registration.
//! - [`RpcError::RemoteFault`]: the remote method itself failed. Carries the
//!   callee's error payload.
//!
//! Raw I/O errors are converted to [`RpcError::ChannelFault`] at the framing
//! layer; no `std::io::Error` type crosses an interface boundary above it.

use crate::transport::TransportError;
use std::error::Error as StdError;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by RPC operations.
///
/// A blocked [`send`](crate::rpc::RpcMessageBroker::send) resolves to a
/// response or exactly one of these; callers never observe silent partial
/// state.
///
/// # Examples
///
/// ```rust
/// use duplexrpc::error::RpcError;
///
/// let error = RpcError::channel_fault("connection reset by peer");
/// assert!(error.is_recoverable());
///
/// let error = RpcError::contract_mismatch("interface 'Calc' is not registered");
/// assert!(!error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum RpcError {
    /// The underlying byte stream closed or failed.
    ///
    /// This is the translation target for every transport-level failure:
    /// closed sockets, resets, mid-frame EOF, broker disposal while a call
    /// is in flight.
    #[error("channel fault: {reason}")]
    ChannelFault {
        /// What happened to the channel.
        reason: String,
        /// The underlying I/O error, when one exists.
        #[source]
        source: Option<io::Error>,
    },

    /// No reply arrived within the configured bound.
    #[error("call timed out after {duration:?}")]
    Timeout {
        /// How long the caller waited.
        duration: Duration,
    },

    /// The peers disagree about the contract.
    ///
    /// Raised for unregistered interfaces, unknown or ambiguous method
    /// signatures, and argument deserialization failures.
    #[error("contract mismatch: {reason}")]
    ContractMismatch {
        /// Which part of the contract did not line up.
        reason: String,
        /// The underlying cause, for argument decode failures.
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// The remote method itself failed.
    ///
    /// This is the callee's business error, not a framework error; the
    /// message round-trips over the wire inside an `RpcFault` payload.
    #[error("remote call failed: {message}")]
    RemoteFault {
        /// The callee's error message.
        message: String,
        /// Additional detail the callee attached, if any.
        detail: Option<String>,
    },
}

impl RpcError {
    /// Creates a channel fault with no underlying I/O error.
    pub fn channel_fault(reason: impl Into<String>) -> Self {
        Self::ChannelFault {
            reason: reason.into(),
            source: None,
        }
    }

    /// Creates a channel fault wrapping an I/O error.
    pub fn channel_fault_io(reason: impl Into<String>, source: io::Error) -> Self {
        Self::ChannelFault {
            reason: reason.into(),
            source: Some(source),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub const fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Creates a contract mismatch with no underlying cause.
    pub fn contract_mismatch(reason: impl Into<String>) -> Self {
        Self::ContractMismatch {
            reason: reason.into(),
            source: None,
        }
    }

    /// Creates a contract mismatch wrapping its underlying cause.
    pub fn contract_mismatch_with(
        reason: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::ContractMismatch {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a remote fault carrying the callee's error payload.
    pub fn remote_fault(message: impl Into<String>, detail: Option<String>) -> Self {
        Self::RemoteFault {
            message: message.into(),
            detail,
        }
    }

    /// Returns `true` for channel faults.
    #[must_use]
    pub const fn is_channel_fault(&self) -> bool {
        matches!(self, Self::ChannelFault { .. })
    }

    /// Returns `true` for timeouts.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` for contract mismatches.
    #[must_use]
    pub const fn is_contract_mismatch(&self) -> bool {
        matches!(self, Self::ContractMismatch { .. })
    }

    /// Returns `true` for remote faults.
    #[must_use]
    pub const fn is_remote_fault(&self) -> bool {
        matches!(self, Self::RemoteFault { .. })
    }

    /// Returns `true` if retrying the call may succeed.
    ///
    /// Channel faults and timeouts are recoverable; a reconnect or a retry
    /// can clear them. Contract mismatches require a configuration fix, and
    /// remote faults belong to the callee.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::ChannelFault { .. } | Self::Timeout { .. })
    }
}

impl From<TransportError> for RpcError {
    fn from(error: TransportError) -> Self {
        Self::channel_fault(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_fault_is_recoverable() {
        let error = RpcError::channel_fault("peer closed");
        assert!(error.is_channel_fault());
        assert!(error.is_recoverable());
    }

    #[test]
    fn timeout_is_recoverable() {
        let error = RpcError::timeout(Duration::from_secs(15));
        assert!(error.is_timeout());
        assert!(error.is_recoverable());
    }

    #[test]
    fn contract_mismatch_is_not_recoverable() {
        let error = RpcError::contract_mismatch("interface 'Calc' is not registered");
        assert!(error.is_contract_mismatch());
        assert!(!error.is_recoverable());
    }

    #[test]
    fn remote_fault_is_not_recoverable() {
        let error = RpcError::remote_fault("division by zero", None);
        assert!(error.is_remote_fault());
        assert!(!error.is_recoverable());
    }

    #[test]
    fn channel_fault_preserves_io_source() {
        let io_error = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let error = RpcError::channel_fault_io("read failed", io_error);
        assert!(error.source().is_some());
    }

    #[test]
    fn contract_mismatch_preserves_cause() {
        let cause = serde_json::from_str::<i32>("not json").unwrap_err();
        let error = RpcError::contract_mismatch_with("argument 0 could not be deserialized", cause);
        assert!(error.source().is_some());
        assert!(error.to_string().contains("argument 0"));
    }

    #[test]
    fn transport_error_converts_to_channel_fault() {
        let error: RpcError = TransportError::Closed.into();
        assert!(error.is_channel_fault());
    }
}
