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

//! Request/response correlation.
//!
//! The broker owns the pending-query table for one connection. An outbound
//! call registers its query ID, writes the request frame, then waits on
//! whichever comes first: the correlated completion, broker disposal, or the
//! call timeout. Each query ID completes at most once; completions for
//! unknown IDs (late replies after a timeout, duplicates) are logged and
//! dropped.
//!
//! Inbound traffic reaches the broker through two [`MessageHandler`] stages:
//! one consuming response and fault frames into the pending table, one
//! spawning a dispatch task per request frame so a slow method never stalls
//! the read loop.

use crate::channel::{ChannelMessage, HandlerCode, MessageHandler};
use crate::error::RpcError;
use crate::rpc::caller::RpcCaller;
use crate::rpc::handler::{RequestContext, RpcRequestHandler};
use crate::rpc::message::{
    decode_fault, decode_request, decode_response, FaultCause, RpcFault, RpcMessageWriter,
    RpcRequest, RpcResponse,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::{debug, warn};

/// Default bound on how long a call waits for its reply.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// Broker tuning knobs.
#[derive(Clone, Copy, Debug)]
pub struct BrokerConfig {
    /// How long a call waits for its correlated reply.
    pub call_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// The terminal state of a pending query.
#[derive(Debug)]
pub(crate) enum Completion {
    /// The remote method succeeded.
    Response(RpcResponse),
    /// The remote method failed.
    Fault(FaultCause),
}

/// Pending-query table keyed by query ID.
struct PendingQueries {
    queries: Mutex<HashMap<String, oneshot::Sender<Completion>>>,
}

impl PendingQueries {
    fn new() -> Self {
        Self {
            queries: Mutex::new(HashMap::new()),
        }
    }

    fn register(&self, query_id: String) -> oneshot::Receiver<Completion> {
        let (tx, rx) = oneshot::channel();
        self.queries.lock().insert(query_id, tx);
        rx
    }

    /// Completes a query. At most one completion wins; the rest are dropped.
    fn complete(&self, query_id: &str, completion: Completion) {
        let sender = self.queries.lock().remove(query_id);
        match sender {
            Some(tx) => {
                // The waiter may have given up between removal and send.
                let _ = tx.send(completion);
            }
            None => debug!(query_id, "dropping completion for unknown query"),
        }
    }

    fn cancel(&self, query_id: &str) {
        self.queries.lock().remove(query_id);
    }

    /// Drops every pending sender, failing all outstanding waits.
    fn drain(&self) {
        self.queries.lock().clear();
    }

    fn len(&self) -> usize {
        self.queries.lock().len()
    }
}

/// The state a connection's callers share: the pending table, the write
/// half, and the disposal signal.
///
/// [`RpcCaller`]s hold this behind an `Arc`, so calls remain issuable (and
/// fail fast) after the connection that created them is gone.
pub struct BrokerShared {
    pending: PendingQueries,
    writer: Arc<RpcMessageWriter>,
    config: BrokerConfig,
    shutdown: watch::Sender<bool>,
    disposed: AtomicBool,
}

impl BrokerShared {
    pub(crate) fn new(writer: Arc<RpcMessageWriter>, config: BrokerConfig) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            pending: PendingQueries::new(),
            writer,
            config,
            shutdown,
            disposed: AtomicBool::new(false),
        })
    }

    pub(crate) fn writer(&self) -> &Arc<RpcMessageWriter> {
        &self.writer
    }

    /// Sends a request and waits for its correlated completion.
    pub(crate) async fn send(&self, request: RpcRequest) -> Result<Option<String>, RpcError> {
        if self.is_disposed() {
            return Err(RpcError::channel_fault("broker is disposed"));
        }

        let query_id = request.query_id.clone();
        let mut receiver = self.pending.register(query_id.clone());

        if let Err(error) = self.writer.write_request(&request).await {
            self.pending.cancel(&query_id);
            return Err(error);
        }

        let timeout = self.config.call_timeout;
        let mut shutdown = self.shutdown.subscribe();
        tokio::select! {
            completion = &mut receiver => match completion {
                Ok(Completion::Response(response)) => Ok(response.return_value),
                Ok(Completion::Fault(cause)) => Err(cause.into_error()),
                Err(_) => Err(RpcError::channel_fault(
                    "connection closed while the call was in flight",
                )),
            },
            _ = shutdown.wait_for(|disposed| *disposed) => {
                self.pending.cancel(&query_id);
                Err(RpcError::channel_fault(
                    "broker disposed while the call was in flight",
                ))
            }
            () = tokio::time::sleep(timeout) => {
                self.pending.cancel(&query_id);
                Err(RpcError::timeout(timeout))
            }
        }
    }

    /// Sends a request without registering for a reply.
    pub(crate) async fn notify(&self, request: RpcRequest) -> Result<(), RpcError> {
        if self.is_disposed() {
            return Err(RpcError::channel_fault("broker is disposed"));
        }
        self.writer.write_request(&request).await
    }

    pub(crate) fn complete(&self, query_id: &str, completion: Completion) {
        self.pending.complete(query_id, completion);
    }

    /// Fails every pending call and rejects new ones. Idempotent.
    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown.send(true);
        self.pending.drain();
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Correlates calls with replies over one connection.
pub struct RpcMessageBroker {
    shared: Arc<BrokerShared>,
    handler: Arc<RpcRequestHandler>,
    connection_id: String,
}

impl RpcMessageBroker {
    /// Creates a broker over a write half and a request handler.
    #[must_use]
    pub(crate) fn new(
        shared: Arc<BrokerShared>,
        handler: Arc<RpcRequestHandler>,
        connection_id: impl Into<String>,
    ) -> Self {
        Self {
            shared,
            handler,
            connection_id: connection_id.into(),
        }
    }

    /// Sends a request and waits for its correlated reply.
    ///
    /// # Errors
    ///
    /// Resolves to exactly one of the error classes: a channel fault if the
    /// connection or broker went away, a timeout if no reply arrived in
    /// time, or the error the fault reply described.
    pub async fn send(&self, request: RpcRequest) -> Result<Option<String>, RpcError> {
        self.shared.send(request).await
    }

    /// Sends a request without waiting for any reply.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ChannelFault`] if the frame cannot be written.
    pub async fn notify(&self, request: RpcRequest) -> Result<(), RpcError> {
        self.shared.notify(request).await
    }

    /// Returns a caller bound to this broker's connection.
    #[must_use]
    pub fn caller(&self) -> RpcCaller {
        RpcCaller::new(Arc::clone(&self.shared))
    }

    /// Returns the number of calls awaiting replies.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.pending_count()
    }

    /// Fails every pending call and rejects new ones. Idempotent.
    pub fn dispose(&self) {
        self.shared.dispose();
    }

    pub(crate) fn shared(&self) -> &Arc<BrokerShared> {
        &self.shared
    }

    /// Builds the pipeline stage consuming response and fault frames.
    #[must_use]
    pub fn response_stage(&self) -> Box<dyn MessageHandler> {
        Box::new(ResponseStage {
            shared: Arc::clone(&self.shared),
        })
    }

    /// Builds the pipeline stage dispatching inbound request frames.
    #[must_use]
    pub fn request_stage(&self) -> Box<dyn MessageHandler> {
        Box::new(RequestStage {
            shared: Arc::clone(&self.shared),
            handler: Arc::clone(&self.handler),
            connection_id: self.connection_id.clone(),
        })
    }
}

/// Consumes response and fault frames into the pending table.
struct ResponseStage {
    shared: Arc<BrokerShared>,
}

impl MessageHandler for ResponseStage {
    fn handle(&self, message: ChannelMessage) -> Option<ChannelMessage> {
        if message.handler_code == HandlerCode::RpcResponse.code() {
            match decode_response(&message) {
                Ok(response) => {
                    let query_id = response.query_id.clone();
                    self.shared
                        .complete(&query_id, Completion::Response(response));
                }
                Err(error) => warn!(%error, "discarding undecodable response frame"),
            }
            return None;
        }
        if message.handler_code == HandlerCode::RpcFault.code() {
            match decode_fault(&message) {
                Ok(RpcFault { query_id, cause }) => {
                    self.shared.complete(&query_id, Completion::Fault(cause));
                }
                Err(error) => warn!(%error, "discarding undecodable fault frame"),
            }
            return None;
        }
        Some(message)
    }
}

/// Spawns a dispatch task per inbound request frame.
struct RequestStage {
    shared: Arc<BrokerShared>,
    handler: Arc<RpcRequestHandler>,
    connection_id: String,
}

impl MessageHandler for RequestStage {
    fn handle(&self, message: ChannelMessage) -> Option<ChannelMessage> {
        if message.handler_code != HandlerCode::RpcRequest.code() {
            return Some(message);
        }
        let request = match decode_request(&message) {
            Ok(request) => request,
            Err(error) => {
                warn!(%error, "discarding undecodable request frame");
                return None;
            }
        };

        let shared = Arc::clone(&self.shared);
        let handler = Arc::clone(&self.handler);
        let connection_id = self.connection_id.clone();
        tokio::spawn(async move {
            dispatch(shared, handler, connection_id, request).await;
        });
        None
    }
}

/// Runs one request to completion and writes the outcome back.
///
/// Write failures are logged and swallowed; if the connection is gone the
/// caller's own pending entry fails with it.
async fn dispatch(
    shared: Arc<BrokerShared>,
    handler: Arc<RpcRequestHandler>,
    connection_id: String,
    request: RpcRequest,
) {
    let query_id = request.query_id.clone();
    let context = RequestContext::new(connection_id, RpcCaller::new(Arc::clone(&shared)));

    match handler.handle(request, context).await {
        Ok(response) => {
            if let Err(error) = shared.writer().write_response(&response).await {
                debug!(%error, %query_id, "failed to write response");
            }
        }
        Err(error) => {
            let fault = RpcFault {
                query_id: query_id.clone(),
                cause: FaultCause::from_error(&error),
            };
            if let Err(error) = shared.writer().write_fault(&fault).await {
                debug!(%error, %query_id, "failed to write fault");
            }
        }
    }
}
