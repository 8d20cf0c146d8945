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

//! The RPC layer: wire messages, correlation, dispatch, and the call surface.
//!
//! Both peers run the same machinery; there is no client or server role at
//! this layer. Each connection wires up:
//!
//! - an [`RpcMessageBroker`] correlating outbound requests with inbound
//!   replies through a pending-query table,
//! - an [`RpcRequestHandler`] dispatching inbound requests against the
//!   process's [`DelegateRegistry`],
//! - and [`RpcCaller`] handles the application uses to issue calls.
//!
//! A method running under the handler receives a [`RequestContext`] whose
//! caller is bound to the originating connection, which is what makes the
//! duplex path (callee calling back into its caller) work.

mod broker;
mod caller;
mod handler;
mod message;

pub use self::broker::{BrokerConfig, RpcMessageBroker, DEFAULT_CALL_TIMEOUT};
pub use self::caller::{decode_return, encode_arg, ErrorMapper, RpcCaller};
pub use self::handler::{
    method_signature, DelegateRegistry, DispatchError, MethodFn, RequestContext,
    RpcRequestHandler, ServiceFactory, ServiceMethods,
};
pub use self::message::{FaultCause, RpcFault, RpcMessageWriter, RpcRequest, RpcResponse};

pub(crate) use self::broker::BrokerShared;
