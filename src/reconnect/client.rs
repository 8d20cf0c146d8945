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

//! Call surface over a self-healing connection.
//!
//! [`ReconnectingRpcClient`] fronts a [`ReconnectingConnectionProvider`]:
//! each call waits (bounded) for a live connection, then issues the call
//! over it. Failing to obtain a connection in time surfaces as a channel
//! fault, the same class the call would see if the link dropped mid-flight,
//! so callers handle "never connected" and "just disconnected" identically.

use crate::error::RpcError;
use crate::reconnect::provider::{ConnectionFactory, ReconnectingConnectionProvider};
use crate::reconnect::strategy::ReconnectionStrategy;
use crate::rpc::ErrorMapper;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on how long a call waits for a connection to come up.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(6);

/// Issues calls over whatever connection the provider currently supplies.
///
/// # Examples
///
/// ```rust,no_run
/// use duplexrpc::connection::Connection;
/// use duplexrpc::reconnect::{FixedDelay, ReconnectingRpcClient};
/// use duplexrpc::rpc::{decode_return, encode_arg, BrokerConfig, DelegateRegistry};
/// use duplexrpc::transport::TcpTransport;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), duplexrpc::error::RpcError> {
/// let registry = Arc::new(DelegateRegistry::new());
/// let client = ReconnectingRpcClient::new(
///     Arc::new(move || {
///         let registry = Arc::clone(&registry);
///         Box::pin(async move {
///             let transport = TcpTransport::connect("127.0.0.1:8080").await?;
///             Ok(Connection::establish(transport, registry, BrokerConfig::default()))
///         })
///     }),
///     Arc::new(FixedDelay::default()),
/// );
///
/// let result = client
///     .call("Calc", "Add_Int32_Int32", vec![encode_arg(&1)?, encode_arg(&2)?])
///     .await?;
/// let sum: i32 = decode_return(result)?;
/// # Ok(())
/// # }
/// ```
pub struct ReconnectingRpcClient {
    provider: ReconnectingConnectionProvider,
    connection_timeout: Duration,
    error_mapper: Option<ErrorMapper>,
}

impl ReconnectingRpcClient {
    /// Creates a client dialing through `factory`, paced by `strategy`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(factory: ConnectionFactory, strategy: Arc<dyn ReconnectionStrategy>) -> Self {
        Self {
            provider: ReconnectingConnectionProvider::new(factory, strategy),
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            error_mapper: None,
        }
    }

    /// Sets how long a call waits for a connection to come up.
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Attaches an error mapper applied to every caller this client builds.
    #[must_use]
    pub fn with_error_mapper(mut self, mapper: ErrorMapper) -> Self {
        self.error_mapper = Some(mapper);
        self
    }

    /// Returns the underlying provider.
    #[must_use]
    pub fn provider(&self) -> &ReconnectingConnectionProvider {
        &self.provider
    }

    async fn caller(&self) -> Result<crate::rpc::RpcCaller, RpcError> {
        let connection = self
            .provider
            .try_get_connection(self.connection_timeout)
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    RpcError::channel_fault(format!(
                        "no connection available within {:?}",
                        self.connection_timeout
                    ))
                } else {
                    error
                }
            })?;
        let mut caller = connection.caller();
        if let Some(mapper) = &self.error_mapper {
            caller = caller.with_error_mapper(Arc::clone(mapper));
        }
        Ok(caller)
    }

    /// Calls a method and waits for its result.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ChannelFault`] when no connection could be
    /// obtained in time, otherwise whatever the call itself resolves to.
    pub async fn call(
        &self,
        interface_name: &str,
        method_signature: &str,
        arguments: Vec<String>,
    ) -> Result<Option<String>, RpcError> {
        let caller = self.caller().await.map_err(|e| self.map_error(e))?;
        caller.call(interface_name, method_signature, arguments).await
    }

    /// Calls a method without waiting for any reply.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ChannelFault`] when no connection could be
    /// obtained in time or the request could not be written.
    pub async fn notify(
        &self,
        interface_name: &str,
        method_signature: &str,
        arguments: Vec<String>,
    ) -> Result<(), RpcError> {
        let caller = self.caller().await.map_err(|e| self.map_error(e))?;
        caller
            .notify(interface_name, method_signature, arguments)
            .await
    }

    fn map_error(&self, error: RpcError) -> RpcError {
        match &self.error_mapper {
            Some(mapper) if error.is_recoverable() => mapper(error),
            _ => error,
        }
    }

    /// Stops reconnecting and tears down the live connection. Idempotent.
    pub fn dispose(&self) {
        self.provider.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::reconnect::strategy::FixedDelay;
    use crate::rpc::{BrokerConfig, DelegateRegistry, ServiceMethods};
    use crate::transport::MemoryTransport;
    use parking_lot::Mutex;

    /// Client whose peer answers `Echo_String` over memory transports.
    fn echo_client() -> (ReconnectingRpcClient, Arc<Mutex<Vec<Arc<Connection>>>>) {
        let peers = Arc::new(Mutex::new(Vec::new()));
        let factory: ConnectionFactory = {
            let peers = Arc::clone(&peers);
            Arc::new(move || {
                let peers = Arc::clone(&peers);
                Box::pin(async move {
                    let (near, far) = MemoryTransport::pair_default();

                    let peer_registry = Arc::new(DelegateRegistry::new());
                    peer_registry.register(
                        "Echo",
                        ServiceMethods::new().method1("Echo_String", |s: String| {
                            Ok::<_, std::convert::Infallible>(s)
                        }),
                    );
                    peers.lock().push(Connection::establish(
                        far,
                        peer_registry,
                        BrokerConfig::default(),
                    ));

                    Ok(Connection::establish(
                        near,
                        Arc::new(DelegateRegistry::new()),
                        BrokerConfig::default(),
                    ))
                })
            })
        };
        let client = ReconnectingRpcClient::new(
            factory,
            Arc::new(FixedDelay::new(Duration::from_millis(10))),
        );
        (client, peers)
    }

    #[tokio::test]
    async fn calls_flow_over_the_provided_connection() {
        let (client, _peers) = echo_client();
        let result = client
            .call("Echo", "Echo_String", vec!["\"hi\"".to_string()])
            .await
            .unwrap();
        assert_eq!(result.as_deref(), Some("\"hi\""));
    }

    #[tokio::test]
    async fn calls_succeed_again_after_a_reconnect() {
        let (client, peers) = echo_client();
        client
            .call("Echo", "Echo_String", vec!["\"first\"".to_string()])
            .await
            .unwrap();

        // Kill the peer; the provider dials a fresh pair.
        peers.lock().drain(..).for_each(|peer| peer.dispose());

        let result = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match client
                    .call("Echo", "Echo_String", vec!["\"second\"".to_string()])
                    .await
                {
                    Ok(result) => break result,
                    Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result.as_deref(), Some("\"second\""));
    }

    #[tokio::test]
    async fn connection_starvation_is_a_channel_fault() {
        let factory: ConnectionFactory = Arc::new(|| {
            Box::pin(async { Err(RpcError::channel_fault("dial refused")) })
        });
        let client = ReconnectingRpcClient::new(
            factory,
            Arc::new(FixedDelay::new(Duration::from_millis(10))),
        )
        .with_connection_timeout(Duration::from_millis(50));

        let error = client
            .call("Echo", "Echo_String", vec!["\"hi\"".to_string()])
            .await
            .unwrap_err();
        assert!(error.is_channel_fault());
        assert!(error.to_string().contains("no connection available"));
    }

    #[tokio::test]
    async fn error_mapper_sees_connection_starvation() {
        let factory: ConnectionFactory = Arc::new(|| {
            Box::pin(async { Err(RpcError::channel_fault("dial refused")) })
        });
        let client = ReconnectingRpcClient::new(
            factory,
            Arc::new(FixedDelay::new(Duration::from_millis(10))),
        )
        .with_connection_timeout(Duration::from_millis(50))
        .with_error_mapper(Arc::new(|error| {
            RpcError::channel_fault(format!("mapped: {error}"))
        }));

        let error = client
            .call("Echo", "Echo_String", Vec::new())
            .await
            .unwrap_err();
        assert!(error.to_string().contains("mapped:"));
    }

    #[tokio::test]
    async fn disposed_client_fails_fast() {
        let (client, _peers) = echo_client();
        client.dispose();

        let error = client
            .call("Echo", "Echo_String", vec!["\"hi\"".to_string()])
            .await
            .unwrap_err();
        assert!(error.is_channel_fault());
    }
}
