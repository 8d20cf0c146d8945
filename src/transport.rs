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

//! Transport layer abstractions.
//!
//! This module provides the byte-stream foundation the rest of the crate is
//! built on. The [`Transport`] trait defines the interface for bi-directional
//! byte streams, and this module includes two implementations:
//!
//! - [`TcpTransport`]: TCP/IP networking
//! - [`MemoryTransport`]: in-memory duplex pairs for testing and in-process use
//!
//! A transport carries opaque bytes only; all interpretation lives in the
//! framing layer above it. Transports report [`TransportMetadata`] (a unique
//! process-local ID plus addresses when they have them), and server-side code
//! accepts inbound transports through a [`TransportListener`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use duplexrpc::transport::{TcpTransport, Transport};
//! use tokio::io::AsyncWriteExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut transport = TcpTransport::connect("127.0.0.1:8080").await?;
//! println!("connected as {}", transport.metadata().id);
//! transport.write_all(b"raw bytes").await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod memory;
mod tcp;
mod traits;

pub use self::error::TransportError;
pub use self::memory::MemoryTransport;
pub use self::tcp::{TcpTransport, TcpTransportListener};
pub use self::traits::{Transport, TransportId, TransportListener, TransportMetadata};
