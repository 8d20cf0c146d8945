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

use crate::transport::TransportError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncWrite};

/// Global counter for generating unique transport IDs.
static NEXT_TRANSPORT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transport instance.
///
/// IDs are process-local and monotonically increasing; they exist for
/// logging and diagnostics, not for the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransportId(u64);

impl TransportId {
    /// Allocates the next transport ID.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_TRANSPORT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport-{}", self.0)
    }
}

/// Metadata describing a transport instance.
#[derive(Clone, Debug)]
pub struct TransportMetadata {
    /// Unique identifier for this transport.
    pub id: TransportId,
    /// Transport kind, e.g. `"tcp"` or `"memory"`.
    pub transport_type: &'static str,
    /// Remote peer address, when the transport has one.
    pub peer_addr: Option<String>,
    /// Local address, when the transport has one.
    pub local_addr: Option<String>,
}

impl TransportMetadata {
    /// Creates metadata with a freshly allocated ID and no addresses.
    #[must_use]
    pub fn new(transport_type: &'static str) -> Self {
        Self {
            id: TransportId::next(),
            transport_type,
            peer_addr: None,
            local_addr: None,
        }
    }
}

/// A duplex byte stream a connection can be built over.
///
/// This is the collaborator boundary for concrete transports: anything that
/// can read and write bytes and report who it is talking to can carry an RPC
/// connection. The framing layer owns all interpretation of the bytes.
///
/// # Examples
///
/// ```rust,no_run
/// use duplexrpc::transport::{TcpTransport, Transport};
///
/// # async fn example() -> Result<(), duplexrpc::transport::TransportError> {
/// let transport = TcpTransport::connect("127.0.0.1:8080").await?;
/// println!("connected via {}", transport.metadata().transport_type);
/// let (reader, writer) = transport.split();
/// # Ok(())
/// # }
/// ```
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Returns metadata about this transport.
    fn metadata(&self) -> &TransportMetadata;

    /// Splits the transport into separately owned read and write halves.
    ///
    /// The connection runs its read loop on one half and serializes frame
    /// writes on the other; dropping the write half (or shutting it down)
    /// disposes the stream.
    fn split(
        self,
    ) -> (
        Box<dyn AsyncRead + Send + Unpin>,
        Box<dyn AsyncWrite + Send + Unpin>,
    )
    where
        Self: Sized,
    {
        let (reader, writer) = tokio::io::split(self);
        (Box::new(reader), Box::new(writer))
    }
}

/// A listener producing inbound transports.
///
/// Server-side wiring accepts transports from a listener and builds a
/// [`Connection`](crate::connection::Connection) per accepted stream.
#[async_trait::async_trait]
pub trait TransportListener: Send + Sync {
    /// The transport type this listener produces.
    type Transport: Transport;

    /// Accepts the next inbound connection.
    async fn accept(&self) -> Result<Self::Transport, TransportError>;

    /// Returns the local address this listener is bound to.
    fn local_addr(&self) -> Result<String, TransportError>;
}
