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

//! Inbound request dispatch.
//!
//! Services register their methods in a [`DelegateRegistry`] keyed by
//! interface name. Each interface maps to a [`ServiceMethods`] table keyed by
//! method signature; the [`RpcRequestHandler`] resolves an inbound
//! [`RpcRequest`] against that table, decodes the arguments, invokes the
//! method, and serializes the result.
//!
//! # Method signatures
//!
//! A signature is the method name and its parameter type names joined by
//! underscores, e.g. `Add_Int32_Int32` or `Polymorphic_String`. Signatures
//! disambiguate overloads; registering the same signature twice makes every
//! call to it fail with a contract mismatch rather than silently picking one.
//!
//! # Examples
//!
//! ```rust
//! use duplexrpc::rpc::{method_signature, ServiceMethods};
//!
//! let methods = ServiceMethods::new()
//!     .method2(&method_signature("Add", &["Int32", "Int32"]), |a: i32, b: i32| {
//!         Ok::<_, std::convert::Infallible>(a + b)
//!     })
//!     .method1("Polymorphic_String", |s: String| {
//!         Ok::<_, std::convert::Infallible>(format!("string: {s}"))
//!     });
//! assert_eq!(methods.len(), 2);
//! ```

use crate::error::RpcError;
use crate::rpc::caller::RpcCaller;
use crate::rpc::message::{RpcRequest, RpcResponse};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::TypeId;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Builds a method signature from a name and parameter type names.
///
/// # Examples
///
/// ```rust
/// use duplexrpc::rpc::method_signature;
///
/// assert_eq!(method_signature("Add", &["Int32", "Int32"]), "Add_Int32_Int32");
/// assert_eq!(method_signature("Ping", &[]), "Ping");
/// ```
#[must_use]
pub fn method_signature(name: &str, parameter_types: &[&str]) -> String {
    let mut signature = String::from(name);
    for parameter in parameter_types {
        signature.push('_');
        signature.push_str(parameter);
    }
    signature
}

/// Errors raised while invoking a registered method.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The arguments did not match what the method expects.
    #[error("invalid arguments: {reason}")]
    Arguments {
        /// What was wrong with the arguments.
        reason: String,
        /// The decode failure, when one exists.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The method itself failed.
    #[error(transparent)]
    Application(Box<dyn StdError + Send + Sync>),
}

impl DispatchError {
    fn arity(expected: usize, actual: usize) -> Self {
        Self::Arguments {
            reason: format!("expected {expected} arguments, got {actual}"),
            source: None,
        }
    }

    fn argument(position: usize, source: serde_json::Error) -> Self {
        Self::Arguments {
            reason: format!("failed to decode argument {position}"),
            source: Some(source),
        }
    }
}

/// Boxed method implementation.
///
/// Takes the request context and the positionally ordered serialized
/// arguments; resolves to the serialized return value, `None` for void.
pub type MethodFn = Arc<
    dyn Fn(RequestContext, Vec<String>) -> BoxFuture<'static, Result<Option<String>, DispatchError>>
        + Send
        + Sync,
>;

fn serialize_return<R: Serialize + 'static>(value: &R) -> Result<Option<String>, DispatchError> {
    if TypeId::of::<R>() == TypeId::of::<()>() {
        return Ok(None);
    }
    match serde_json::to_string(value) {
        Ok(json) => Ok(Some(json)),
        Err(e) => Err(DispatchError::Arguments {
            reason: "failed to encode return value".to_string(),
            source: Some(e),
        }),
    }
}

fn decode_argument<A: DeserializeOwned>(
    arguments: &[String],
    position: usize,
) -> Result<A, DispatchError> {
    serde_json::from_str(&arguments[position]).map_err(|e| DispatchError::argument(position, e))
}

/// Method table for one service interface.
///
/// Built with the chaining `methodN` helpers for plain synchronous methods,
/// or [`raw`](Self::raw) for async or context-aware ones. Entries are stored
/// in registration order; duplicate signatures are kept so the dispatcher can
/// detect the ambiguity instead of picking a winner.
pub struct ServiceMethods {
    entries: Vec<(String, MethodFn)>,
}

impl Default for ServiceMethods {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMethods {
    /// Creates an empty method table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Returns the number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no methods are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers a raw method implementation under a signature.
    #[must_use]
    pub fn raw(mut self, signature: impl Into<String>, method: MethodFn) -> Self {
        self.entries.push((signature.into(), method));
        self
    }

    /// Registers a nullary method.
    #[must_use]
    pub fn method0<R, E, F>(self, signature: &str, method: F) -> Self
    where
        R: Serialize + 'static,
        E: Into<Box<dyn StdError + Send + Sync>>,
        F: Fn() -> Result<R, E> + Send + Sync + 'static,
    {
        let method = Arc::new(method);
        self.raw(
            signature,
            Arc::new(move |_ctx, arguments: Vec<String>| {
                let method = Arc::clone(&method);
                Box::pin(async move {
                    if !arguments.is_empty() {
                        return Err(DispatchError::arity(0, arguments.len()));
                    }
                    let value = method().map_err(|e| DispatchError::Application(e.into()))?;
                    serialize_return(&value)
                })
            }),
        )
    }

    /// Registers a unary method.
    #[must_use]
    pub fn method1<A1, R, E, F>(self, signature: &str, method: F) -> Self
    where
        A1: DeserializeOwned + Send + 'static,
        R: Serialize + 'static,
        E: Into<Box<dyn StdError + Send + Sync>>,
        F: Fn(A1) -> Result<R, E> + Send + Sync + 'static,
    {
        let method = Arc::new(method);
        self.raw(
            signature,
            Arc::new(move |_ctx, arguments: Vec<String>| {
                let method = Arc::clone(&method);
                Box::pin(async move {
                    if arguments.len() != 1 {
                        return Err(DispatchError::arity(1, arguments.len()));
                    }
                    let a1: A1 = decode_argument(&arguments, 0)?;
                    let value = method(a1).map_err(|e| DispatchError::Application(e.into()))?;
                    serialize_return(&value)
                })
            }),
        )
    }

    /// Registers a binary method.
    #[must_use]
    pub fn method2<A1, A2, R, E, F>(self, signature: &str, method: F) -> Self
    where
        A1: DeserializeOwned + Send + 'static,
        A2: DeserializeOwned + Send + 'static,
        R: Serialize + 'static,
        E: Into<Box<dyn StdError + Send + Sync>>,
        F: Fn(A1, A2) -> Result<R, E> + Send + Sync + 'static,
    {
        let method = Arc::new(method);
        self.raw(
            signature,
            Arc::new(move |_ctx, arguments: Vec<String>| {
                let method = Arc::clone(&method);
                Box::pin(async move {
                    if arguments.len() != 2 {
                        return Err(DispatchError::arity(2, arguments.len()));
                    }
                    let a1: A1 = decode_argument(&arguments, 0)?;
                    let a2: A2 = decode_argument(&arguments, 1)?;
                    let value = method(a1, a2).map_err(|e| DispatchError::Application(e.into()))?;
                    serialize_return(&value)
                })
            }),
        )
    }

    /// Returns every entry registered under `signature`.
    fn matches(&self, signature: &str) -> Vec<MethodFn> {
        self.entries
            .iter()
            .filter(|(s, _)| s == signature)
            .map(|(_, f)| Arc::clone(f))
            .collect()
    }
}

/// Factory resolving interface names to method tables on demand.
pub type ServiceFactory = Arc<dyn Fn(&str) -> Option<Arc<ServiceMethods>> + Send + Sync>;

/// Registry of callable service interfaces.
///
/// Interfaces are resolved by exact name, first from the explicitly
/// registered instances, then through the registered factories in order.
#[derive(Default)]
pub struct DelegateRegistry {
    instances: Mutex<HashMap<String, Arc<ServiceMethods>>>,
    factories: Mutex<Vec<ServiceFactory>>,
}

impl DelegateRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a method table under an interface name.
    ///
    /// Re-registering a name replaces the previous table for connections
    /// established afterwards; existing connections keep their cached
    /// resolution.
    pub fn register(&self, interface_name: impl Into<String>, methods: ServiceMethods) {
        self.instances
            .lock()
            .insert(interface_name.into(), Arc::new(methods));
    }

    /// Registers a factory consulted for names with no direct registration.
    pub fn register_factory(&self, factory: ServiceFactory) {
        self.factories.lock().push(factory);
    }

    /// Resolves an interface name to its method table.
    pub fn resolve(&self, interface_name: &str) -> Option<Arc<ServiceMethods>> {
        if let Some(methods) = self.instances.lock().get(interface_name) {
            return Some(Arc::clone(methods));
        }
        let factories = self.factories.lock().clone();
        factories
            .iter()
            .find_map(|factory| factory(interface_name))
    }
}

/// Context available to a method while it runs.
///
/// Carries the identity of the connection the request arrived on and a
/// caller for issuing calls back over that same connection.
#[derive(Clone)]
pub struct RequestContext {
    connection_id: String,
    caller: RpcCaller,
}

impl RequestContext {
    pub(crate) fn new(connection_id: String, caller: RpcCaller) -> Self {
        Self {
            connection_id,
            caller,
        }
    }

    /// Returns the ID of the connection this request arrived on.
    #[must_use]
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Returns a caller bound to the originating connection.
    ///
    /// This is the duplex path: a server-side method can call back into the
    /// client that is currently calling it.
    #[must_use]
    pub fn caller(&self) -> &RpcCaller {
        &self.caller
    }
}

/// Dispatches inbound requests against a [`DelegateRegistry`].
///
/// Resolution results are cached per handler, including negative ones, so a
/// burst of calls to an unregistered interface does not repeatedly walk the
/// factory chain.
pub struct RpcRequestHandler {
    registry: Arc<DelegateRegistry>,
    cache: Mutex<HashMap<String, Option<Arc<ServiceMethods>>>>,
}

impl RpcRequestHandler {
    /// Creates a handler over a registry.
    #[must_use]
    pub fn new(registry: Arc<DelegateRegistry>) -> Self {
        Self {
            registry,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn resolve_cached(&self, interface_name: &str) -> Option<Arc<ServiceMethods>> {
        if let Some(cached) = self.cache.lock().get(interface_name) {
            return cached.clone();
        }
        let resolved = self.registry.resolve(interface_name);
        self.cache
            .lock()
            .insert(interface_name.to_string(), resolved.clone());
        resolved
    }

    /// Handles one inbound request to completion.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ContractMismatch`] for unregistered interfaces,
    /// unknown or ambiguous signatures, and undecodable arguments, or
    /// [`RpcError::RemoteFault`] when the method itself fails.
    pub async fn handle(
        &self,
        request: RpcRequest,
        context: RequestContext,
    ) -> Result<RpcResponse, RpcError> {
        let Some(methods) = self.resolve_cached(&request.interface_name) else {
            return Err(RpcError::contract_mismatch(format!(
                "interface '{}' is not registered",
                request.interface_name
            )));
        };

        let matches = methods.matches(&request.method_signature);
        let method = match matches.len() {
            0 => {
                return Err(RpcError::contract_mismatch(format!(
                    "interface '{}' has no method matching '{}'",
                    request.interface_name, request.method_signature
                )));
            }
            1 => &matches[0],
            n => {
                return Err(RpcError::contract_mismatch(format!(
                    "interface '{}' has {n} methods matching '{}'",
                    request.interface_name, request.method_signature
                )));
            }
        };

        debug!(
            interface = %request.interface_name,
            signature = %request.method_signature,
            query_id = %request.query_id,
            "dispatching request"
        );

        match method(context, request.arguments).await {
            Ok(return_value) => Ok(RpcResponse {
                query_id: request.query_id,
                return_value,
            }),
            Err(DispatchError::Arguments { reason, source }) => {
                let reason = format!(
                    "arguments for '{}::{}' did not match: {reason}",
                    request.interface_name, request.method_signature
                );
                Err(match source {
                    Some(source) => RpcError::contract_mismatch_with(reason, Box::new(source)),
                    None => RpcError::contract_mismatch(reason),
                })
            }
            Err(DispatchError::Application(error)) => {
                let detail = error.source().map(|source| source.to_string());
                Err(RpcError::remote_fault(error.to_string(), detail))
            }
        }
    }
}
