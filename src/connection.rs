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

//! A live peer connection.
//!
//! [`Connection::establish`] assembles the full stack over a transport: the
//! framed write half behind a serialized writer, a broker correlating calls
//! with replies, a request handler dispatching against the given registry,
//! and a read loop feeding inbound frames through the message pipeline.
//!
//! A connection dies exactly once, whether the peer closed the stream, the
//! stream failed, or [`dispose`](Connection::dispose) was called locally.
//! Death fails every in-flight call with a channel fault and notifies every
//! disconnect observer; observers registered after death fire immediately.
//!
//! # Examples
//!
//! ```rust,no_run
//! use duplexrpc::connection::Connection;
//! use duplexrpc::rpc::{BrokerConfig, DelegateRegistry, ServiceMethods};
//! use duplexrpc::transport::TcpTransport;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(DelegateRegistry::new());
//! registry.register(
//!     "Greeter",
//!     ServiceMethods::new().method1("Greet_String", |name: String| {
//!         Ok::<_, std::convert::Infallible>(format!("hello, {name}"))
//!     }),
//! );
//!
//! let transport = TcpTransport::connect("127.0.0.1:8080").await?;
//! let connection = Connection::establish(transport, registry, BrokerConfig::default());
//! connection.on_disconnected(|| println!("peer went away"));
//!
//! let caller = connection.caller();
//! # Ok(())
//! # }
//! ```

use crate::channel::framing::FrameReader;
use crate::channel::{ChannelMessage, ChannelMessageWriter, MessagePipeline};
use crate::rpc::{BrokerConfig, DelegateRegistry, RpcCaller, RpcMessageBroker, RpcMessageWriter};
use crate::rpc::RpcRequestHandler;
use crate::transport::Transport;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// Callback invoked when a connection dies.
type DisconnectObserver = Box<dyn FnOnce() + Send>;

struct ConnectionState {
    connected: bool,
    observers: Vec<DisconnectObserver>,
}

/// Marks the connection disconnected and fires observers exactly once.
fn fire_disconnected(state: &Mutex<ConnectionState>) {
    let observers = {
        let mut guard = state.lock();
        if !guard.connected {
            return;
        }
        guard.connected = false;
        std::mem::take(&mut guard.observers)
    };
    for observer in observers {
        observer();
    }
}

/// A live, duplex RPC connection over one transport.
pub struct Connection {
    connection_id: String,
    broker: RpcMessageBroker,
    state: Arc<Mutex<ConnectionState>>,
    read_task: JoinHandle<()>,
    disposed: AtomicBool,
}

impl Connection {
    /// Establishes a connection over an already-open transport.
    ///
    /// Both peers use this identically; which side dialed and which side
    /// accepted does not matter above the transport.
    pub fn establish<T: Transport>(
        transport: T,
        registry: Arc<DelegateRegistry>,
        config: BrokerConfig,
    ) -> Arc<Self> {
        let connection_id = Uuid::new_v4().to_string();
        let transport_id = transport.metadata().id;
        info!(%connection_id, %transport_id, "establishing connection");

        let (read_half, write_half) = transport.split();
        let writer = Arc::new(RpcMessageWriter::new(ChannelMessageWriter::new(write_half)));
        let shared = crate::rpc::BrokerShared::new(Arc::clone(&writer), config);
        let handler = Arc::new(RpcRequestHandler::new(registry));
        let broker = RpcMessageBroker::new(shared, handler, connection_id.clone());

        let pipeline = MessagePipeline::new(vec![broker.response_stage(), broker.request_stage()]);
        let state = Arc::new(Mutex::new(ConnectionState {
            connected: true,
            observers: Vec::new(),
        }));

        let read_task = tokio::spawn(read_loop(
            connection_id.clone(),
            FrameReader::new(read_half),
            pipeline,
            Arc::clone(broker.shared()),
            Arc::clone(&state),
        ));

        Arc::new(Self {
            connection_id,
            broker,
            state,
            read_task,
            disposed: AtomicBool::new(false),
        })
    }

    /// Returns this connection's unique ID.
    #[must_use]
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Returns `true` until the connection dies.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Returns a caller bound to this connection.
    #[must_use]
    pub fn caller(&self) -> RpcCaller {
        self.broker.caller()
    }

    /// Returns the broker correlating this connection's calls.
    #[must_use]
    pub fn broker(&self) -> &RpcMessageBroker {
        &self.broker
    }

    /// Registers a disconnect observer.
    ///
    /// If the connection is already dead the observer runs immediately on
    /// the calling task; otherwise it runs once, when the connection dies.
    pub fn on_disconnected(&self, observer: impl FnOnce() + Send + 'static) {
        {
            let mut guard = self.state.lock();
            if guard.connected {
                guard.observers.push(Box::new(observer));
                return;
            }
        }
        observer();
    }

    /// Tears the connection down. Idempotent.
    ///
    /// Fails every in-flight call with a channel fault, stops the read loop,
    /// fires disconnect observers, and shuts the write half down.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(connection_id = %self.connection_id, "disposing connection");

        self.read_task.abort();
        self.broker.dispose();
        fire_disconnected(&self.state);

        // The writer shutdown is async; run it out-of-band when a runtime is
        // available (it is not during a runtime-teardown drop).
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let writer = Arc::clone(self.broker.shared().writer());
            handle.spawn(async move {
                let _ = writer.shutdown().await;
            });
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("connection_id", &self.connection_id)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Pumps inbound frames through the pipeline until the stream dies.
async fn read_loop(
    connection_id: String,
    mut reader: FrameReader<Box<dyn tokio::io::AsyncRead + Send + Unpin>>,
    pipeline: MessagePipeline,
    shared: Arc<crate::rpc::BrokerShared>,
    state: Arc<Mutex<ConnectionState>>,
) {
    loop {
        match reader.read_frame().await {
            Ok(Some(frame)) => match ChannelMessage::from_bytes(&frame) {
                Ok(message) => {
                    pipeline.handle(message);
                }
                Err(error) => {
                    debug!(%connection_id, %error, "stream produced a malformed message");
                    break;
                }
            },
            Ok(None) => {
                debug!(%connection_id, "peer closed the stream");
                break;
            }
            Err(error) => {
                debug!(%connection_id, %error, "stream failed");
                break;
            }
        }
    }

    shared.dispose();
    fire_disconnected(&state);
    info!(%connection_id, "connection closed");
}
