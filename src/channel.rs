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

//! Framed message channel over a transport.
//!
//! This layer turns a raw byte stream into a stream of typed messages:
//!
//! 1. [`framing`] chops the stream into length-prefixed frames.
//! 2. [`ChannelMessage`] splits each frame into a handler code and body.
//! 3. [`MessagePipeline`] routes each decoded message through an ordered
//!    chain of [`MessageHandler`] stages.
//!
//! The channel layer knows nothing about RPC semantics; the stages plugged
//! into the pipeline by [`Connection`](crate::connection::Connection) supply
//! those.

pub mod framing;
mod message;
mod pipeline;

pub use self::message::{ChannelMessage, ChannelMessageWriter, HandlerCode};
pub use self::pipeline::{MessageHandler, MessagePipeline};
