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

//! Outbound call surface.
//!
//! [`RpcCaller`] is the handle application code holds to issue calls over a
//! connection. It is cheap to clone, stays valid after its connection dies
//! (calls fail fast with a channel fault), and optionally rewrites transport
//! errors through an error mapper so applications can substitute their own
//! domain error for "the link is down".
//!
//! # Examples
//!
//! ```rust,no_run
//! use duplexrpc::rpc::{decode_return, encode_arg, RpcCaller};
//!
//! # async fn example(caller: RpcCaller) -> Result<(), duplexrpc::error::RpcError> {
//! let result = caller
//!     .call(
//!         "Calc",
//!         "Add_Int32_Int32",
//!         vec![encode_arg(&1)?, encode_arg(&2)?],
//!     )
//!     .await?;
//! let sum: i32 = decode_return(result)?;
//! assert_eq!(sum, 3);
//! # Ok(())
//! # }
//! ```

use crate::error::RpcError;
use crate::rpc::broker::BrokerShared;
use crate::rpc::message::RpcRequest;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::TypeId;
use std::sync::Arc;

/// Hook rewriting recoverable errors before they reach the application.
pub type ErrorMapper = Arc<dyn Fn(RpcError) -> RpcError + Send + Sync>;

/// Serializes one call argument.
///
/// # Errors
///
/// Returns [`RpcError::ContractMismatch`] if the value cannot be serialized.
pub fn encode_arg<T: Serialize>(value: &T) -> Result<String, RpcError> {
    serde_json::to_string(value).map_err(|e| {
        RpcError::contract_mismatch_with("failed to encode call argument", Box::new(e))
    })
}

/// Deserializes a call's return value.
///
/// A missing value decodes only as `()`; any other expected type makes it a
/// contract mismatch.
///
/// # Errors
///
/// Returns [`RpcError::ContractMismatch`] if the value is absent or does not
/// decode as `T`.
pub fn decode_return<T: DeserializeOwned + 'static>(value: Option<String>) -> Result<T, RpcError> {
    match value {
        Some(json) => serde_json::from_str(&json).map_err(|e| {
            RpcError::contract_mismatch_with("failed to decode return value", Box::new(e))
        }),
        None => {
            if TypeId::of::<T>() == TypeId::of::<()>() {
                serde_json::from_str("null").map_err(|e| {
                    RpcError::contract_mismatch_with("failed to decode return value", Box::new(e))
                })
            } else {
                Err(RpcError::contract_mismatch(
                    "method returned no value where one was expected",
                ))
            }
        }
    }
}

/// Issues calls over one connection.
#[derive(Clone)]
pub struct RpcCaller {
    shared: Arc<BrokerShared>,
    error_mapper: Option<ErrorMapper>,
}

impl RpcCaller {
    pub(crate) fn new(shared: Arc<BrokerShared>) -> Self {
        Self {
            shared,
            error_mapper: None,
        }
    }

    /// Attaches an error mapper to this caller.
    ///
    /// The mapper sees only recoverable errors, channel faults and timeouts;
    /// contract mismatches and remote faults pass through untouched because
    /// they describe the application's own contract, not the link.
    #[must_use]
    pub fn with_error_mapper(mut self, mapper: ErrorMapper) -> Self {
        self.error_mapper = Some(mapper);
        self
    }

    fn map_error(&self, error: RpcError) -> RpcError {
        match &self.error_mapper {
            Some(mapper) if error.is_recoverable() => mapper(error),
            _ => error,
        }
    }

    /// Calls a method and waits for its result.
    ///
    /// Arguments must be individually serialized, in declaration order; use
    /// [`encode_arg`] for each. The result is the serialized return value,
    /// `None` for void methods.
    ///
    /// # Errors
    ///
    /// Resolves to exactly one error class: channel fault, timeout, contract
    /// mismatch, or remote fault.
    pub async fn call(
        &self,
        interface_name: &str,
        method_signature: &str,
        arguments: Vec<String>,
    ) -> Result<Option<String>, RpcError> {
        let request = RpcRequest::new(interface_name, method_signature, arguments);
        self.shared
            .send(request)
            .await
            .map_err(|e| self.map_error(e))
    }

    /// Calls a method without waiting for any reply.
    ///
    /// The remote side still runs the method; its result and any fault are
    /// discarded there because no query is pending here.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ChannelFault`] if the request cannot be written.
    pub async fn notify(
        &self,
        interface_name: &str,
        method_signature: &str,
        arguments: Vec<String>,
    ) -> Result<(), RpcError> {
        let request = RpcRequest::new(interface_name, method_signature, arguments);
        self.shared
            .notify(request)
            .await
            .map_err(|e| self.map_error(e))
    }

    /// Returns `true` if the underlying connection has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }
}
