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

//! TCP transport implementation.
//!
//! This module provides a TCP-based transport built on Tokio's `TcpStream`.
//! It supports both client and server modes.

use crate::transport::{Transport, TransportError, TransportListener, TransportMetadata};
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

/// TCP transport implementation.
///
/// `TcpTransport` wraps a Tokio `TcpStream` and implements the [`Transport`]
/// trait, providing reliable, ordered, connection-oriented byte streams.
///
/// # Examples
///
/// ## Client mode
///
/// ```rust,no_run
/// use duplexrpc::transport::{Transport, TcpTransport};
/// use tokio::io::AsyncWriteExt;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut transport = TcpTransport::connect("127.0.0.1:8080").await?;
/// transport.write_all(b"hello").await?;
/// # Ok(())
/// # }
/// ```
///
/// ## Server mode
///
/// ```rust,no_run
/// use duplexrpc::transport::{TcpTransportListener, Transport, TransportListener};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let listener = TcpTransportListener::bind("127.0.0.1:8080").await?;
/// let transport = listener.accept().await?;
/// println!("accepted {}", transport.metadata().id);
/// # Ok(())
/// # }
/// ```
pub struct TcpTransport {
    stream: TcpStream,
    metadata: TransportMetadata,
}

impl TcpTransport {
    /// Creates a new TCP transport from an existing stream.
    ///
    /// This is typically used internally when accepting connections.
    #[must_use]
    pub fn from_stream(stream: TcpStream) -> Self {
        let mut metadata = TransportMetadata::new("tcp");
        metadata.local_addr = stream.local_addr().ok().map(|a| a.to_string());
        metadata.peer_addr = stream.peer_addr().ok().map(|a| a.to_string());
        debug!(transport_id = %metadata.id, "created tcp transport from stream");
        Self { stream, metadata }
    }

    /// Connects to a remote TCP endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionFailed`] if the connection cannot
    /// be established.
    pub async fn connect(addr: impl Into<String>) -> Result<Self, TransportError> {
        let address = addr.into();
        debug!(%address, "connecting tcp transport");

        let stream = TcpStream::connect(&address)
            .await
            .map_err(|source| TransportError::ConnectionFailed {
                address: address.clone(),
                source,
            })?;

        info!(%address, "tcp connection established");
        Ok(Self::from_stream(stream))
    }

    /// Returns the local address of this transport.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    /// Returns the peer address of this transport.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    /// Sets the `TCP_NODELAY` option on the underlying socket.
    ///
    /// Disabling Nagle's algorithm reduces latency for small frames.
    pub fn set_nodelay(&self, nodelay: bool) -> io::Result<()> {
        self.stream.set_nodelay(nodelay)
    }
}

impl Transport for TcpTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }
}

impl AsyncRead for TcpTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for TcpTransport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

/// TCP listener producing [`TcpTransport`] instances.
pub struct TcpTransportListener {
    listener: TcpListener,
}

impl TcpTransportListener {
    /// Binds to a local address and listens for incoming connections.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BindFailed`] if the address cannot be bound.
    pub async fn bind(addr: impl Into<String>) -> Result<Self, TransportError> {
        let address = addr.into();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| TransportError::BindFailed {
                address: address.clone(),
                source,
            })?;
        info!(%address, "tcp listener bound");
        Ok(Self { listener })
    }

    /// Returns the bound socket address.
    pub fn socket_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

#[async_trait::async_trait]
impl TransportListener for TcpTransportListener {
    type Transport = TcpTransport;

    async fn accept(&self) -> Result<TcpTransport, TransportError> {
        let (stream, peer_addr) = self
            .listener
            .accept()
            .await
            .map_err(|source| TransportError::AcceptFailed { source })?;
        debug!(%peer_addr, "accepted tcp connection");
        Ok(TcpTransport::from_stream(stream))
    }

    fn local_addr(&self) -> Result<String, TransportError> {
        self.listener
            .local_addr()
            .map(|a| a.to_string())
            .map_err(|source| TransportError::AcceptFailed { source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn connect_and_echo() {
        let listener = TcpTransportListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.socket_addr().unwrap();

        tokio::spawn(async move {
            let mut transport = listener.accept().await.unwrap();
            let mut buffer = vec![0u8; 1024];
            let n = transport.read(&mut buffer).await.unwrap();
            transport.write_all(&buffer[..n]).await.unwrap();
        });

        let mut client = TcpTransport::connect(addr.to_string()).await.unwrap();
        client.write_all(b"hello, server").await.unwrap();

        let mut buffer = vec![0u8; 1024];
        let n = client.read(&mut buffer).await.unwrap();
        assert_eq!(&buffer[..n], b"hello, server");
    }

    #[tokio::test]
    async fn metadata_records_addresses() {
        let listener = TcpTransportListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.socket_addr().unwrap();

        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let transport = TcpTransport::connect(addr.to_string()).await.unwrap();
        let metadata = transport.metadata();
        assert_eq!(metadata.transport_type, "tcp");
        assert!(metadata.local_addr.is_some());
        assert_eq!(metadata.peer_addr.as_deref(), Some(addr.to_string().as_str()));
    }

    #[tokio::test]
    async fn connection_refused_reports_address() {
        let result = TcpTransport::connect("127.0.0.1:1").await;
        match result {
            Err(TransportError::ConnectionFailed { address, .. }) => {
                assert_eq!(address, "127.0.0.1:1");
            }
            Err(other) => panic!("expected ConnectionFailed, got {other}"),
            Ok(_) => panic!("expected ConnectionFailed, got a connection"),
        }
    }

    #[tokio::test]
    async fn accepted_transports_get_unique_ids() {
        let listener = TcpTransportListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.socket_addr().unwrap();

        let server = tokio::spawn(async move {
            let a = listener.accept().await.unwrap();
            let b = listener.accept().await.unwrap();
            (a.metadata().id, b.metadata().id)
        });

        let _c1 = TcpTransport::connect(addr.to_string()).await.unwrap();
        let _c2 = TcpTransport::connect(addr.to_string()).await.unwrap();

        let (a, b) = server.await.unwrap();
        assert_ne!(a, b);
    }
}
