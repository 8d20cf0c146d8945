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

//! Automatic reconnection.
//!
//! Connections die; this module brings them back. A
//! [`ReconnectingConnectionProvider`] keeps dialing through a
//! [`ConnectionFactory`], paced by a pluggable [`ReconnectionStrategy`],
//! and [`ReconnectingRpcClient`] layers the call surface on top so
//! application code never touches individual connections at all.
//!
//! # Available strategies
//!
//! - [`FixedDelay`]: constant delay, retries forever (default pacing)
//! - [`ExponentialBackoff`]: growing delay with optional jitter and an
//!   attempt cap

mod client;
mod provider;
mod strategy;

pub use self::client::{ReconnectingRpcClient, DEFAULT_CONNECTION_TIMEOUT};
pub use self::provider::{ConnectionFactory, ReconnectingConnectionProvider};
pub use self::strategy::{
    ExponentialBackoff, ExponentialBackoffBuilder, FixedDelay, ReconnectionStrategy,
    DEFAULT_RECONNECT_DELAY,
};
