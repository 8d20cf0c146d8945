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

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! # duplexrpc - Peer-to-Peer RPC over Framed Byte Streams
//!
//! `duplexrpc` runs symmetric RPC between two peers over any duplex byte
//! stream:
//!
//! - **Duplex calls**: both peers register services and both peers call;
//!   there is no client or server role at the protocol level, and a method
//!   can call back into the peer that is currently calling it.
//! - **Correlation**: concurrent calls share one connection, matched to
//!   their replies by query ID with a bounded wait (15 seconds by default).
//! - **Pluggable transports**: TCP and in-memory streams ship in the box;
//!   anything implementing [`transport::Transport`] works.
//! - **Automatic reconnection**: a provider redials through a pluggable
//!   pacing strategy, and a reconnecting client hides individual
//!   connections entirely.
//! - **A four-class error taxonomy**: every failure is a channel fault, a
//!   timeout, a contract mismatch, or a remote fault; see [`error`].
//!
//! ## Layers
//!
//! - **[`transport`]**: raw byte streams (TCP, memory)
//! - **[`channel`]**: length-prefixed framing, message envelopes, and the
//!   inbound pipeline
//! - **[`rpc`]**: wire messages, the correlation broker, request dispatch,
//!   and the caller surface
//! - **[`connection`]**: one live peer connection wiring all of the above
//! - **[`reconnect`]**: connection providers, pacing strategies, and the
//!   reconnecting client
//!
//! ## Quick start
//!
//! ```rust
//! use duplexrpc::connection::Connection;
//! use duplexrpc::rpc::{decode_return, encode_arg, BrokerConfig, DelegateRegistry, ServiceMethods};
//! use duplexrpc::transport::MemoryTransport;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), duplexrpc::error::RpcError> {
//! // One peer registers a calculator service.
//! let server_registry = Arc::new(DelegateRegistry::new());
//! server_registry.register(
//!     "Calc",
//!     ServiceMethods::new().method2("Add_Int32_Int32", |a: i32, b: i32| {
//!         Ok::<_, std::convert::Infallible>(a + b)
//!     }),
//! );
//!
//! // Connect the two peers over an in-memory stream.
//! let (near, far) = MemoryTransport::pair_default();
//! let _server = Connection::establish(far, server_registry, BrokerConfig::default());
//! let client = Connection::establish(
//!     near,
//!     Arc::new(DelegateRegistry::new()),
//!     BrokerConfig::default(),
//! );
//!
//! // Call across.
//! let result = client
//!     .caller()
//!     .call("Calc", "Add_Int32_Int32", vec![encode_arg(&1)?, encode_arg(&2)?])
//!     .await?;
//! let sum: i32 = decode_return(result)?;
//! assert_eq!(sum, 3);
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod connection;
pub mod error;
pub mod reconnect;
pub mod rpc;
pub mod transport;

pub use connection::Connection;
pub use error::RpcError;
pub use reconnect::{ReconnectingConnectionProvider, ReconnectingRpcClient};
pub use rpc::{DelegateRegistry, RpcCaller, ServiceMethods};
pub use transport::{Transport, TransportError};
