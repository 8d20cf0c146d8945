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

//! Self-healing connection supply.
//!
//! [`ReconnectingConnectionProvider`] owns at most one live
//! [`Connection`] at a time. A maintenance task dials through the supplied
//! factory, paced by a [`ReconnectionStrategy`]; when the live connection
//! dies, its disconnect observer triggers a fresh maintenance round. Each
//! established connection is stamped with an epoch so a stale observer from
//! a connection that was already replaced cannot tear down its successor.
//!
//! Waiters block in [`try_get_connection`] on a watch channel the
//! maintenance task bumps after every successful connect, so a reconnect
//! wakes every waiter at once.
//!
//! [`try_get_connection`]: ReconnectingConnectionProvider::try_get_connection

use crate::connection::Connection;
use crate::error::RpcError;
use crate::reconnect::strategy::ReconnectionStrategy;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Factory dialing one new connection per invocation.
pub type ConnectionFactory =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Arc<Connection>, RpcError>> + Send + Sync>;

struct ProviderState {
    connection: Option<Arc<Connection>>,
    disposed: bool,
    epoch: u64,
    refresh_count: u64,
}

struct ProviderInner {
    factory: ConnectionFactory,
    strategy: Arc<dyn ReconnectionStrategy>,
    state: Mutex<ProviderState>,
    generation: watch::Sender<u64>,
}

/// Supplies a live connection, re-establishing it whenever it dies.
///
/// # Examples
///
/// ```rust,no_run
/// use duplexrpc::connection::Connection;
/// use duplexrpc::reconnect::{FixedDelay, ReconnectingConnectionProvider};
/// use duplexrpc::rpc::{BrokerConfig, DelegateRegistry};
/// use duplexrpc::transport::TcpTransport;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), duplexrpc::error::RpcError> {
/// let registry = Arc::new(DelegateRegistry::new());
/// let provider = ReconnectingConnectionProvider::new(
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
/// let connection = provider.try_get_connection(Duration::from_secs(6)).await?;
/// # Ok(())
/// # }
/// ```
pub struct ReconnectingConnectionProvider {
    inner: Arc<ProviderInner>,
}

impl ReconnectingConnectionProvider {
    /// Creates a provider and starts dialing immediately.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(factory: ConnectionFactory, strategy: Arc<dyn ReconnectionStrategy>) -> Self {
        let (generation, _) = watch::channel(0);
        let inner = Arc::new(ProviderInner {
            factory,
            strategy,
            state: Mutex::new(ProviderState {
                connection: None,
                disposed: false,
                epoch: 0,
                refresh_count: 0,
            }),
            generation,
        });
        tokio::spawn(maintain(Arc::clone(&inner)));
        Self { inner }
    }

    /// Waits up to `timeout` for a live connection.
    ///
    /// Returns immediately when one is already live; otherwise blocks until
    /// the maintenance task lands one or the timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Timeout`] if no connection came up in time, or
    /// [`RpcError::ChannelFault`] once the provider is disposed.
    pub async fn try_get_connection(
        &self,
        timeout: Duration,
    ) -> Result<Arc<Connection>, RpcError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut generation = self.inner.generation.subscribe();
        loop {
            {
                let state = self.inner.state.lock();
                if state.disposed {
                    return Err(RpcError::channel_fault("connection provider is disposed"));
                }
                if let Some(connection) = &state.connection {
                    if connection.is_connected() {
                        return Ok(Arc::clone(connection));
                    }
                }
            }
            match tokio::time::timeout_at(deadline, generation.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    return Err(RpcError::channel_fault("connection provider is disposed"));
                }
                Err(_) => return Err(RpcError::timeout(timeout)),
            }
        }
    }

    /// Returns the number of successful connection establishments so far.
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.inner.state.lock().refresh_count
    }

    /// Returns `true` once the provider has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// Stops reconnecting and tears down the live connection. Idempotent.
    pub fn dispose(&self) {
        let connection = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.connection.take()
        };
        if let Some(connection) = connection {
            connection.dispose();
        }
        self.inner.generation.send_modify(|g| *g = g.wrapping_add(1));
        info!("connection provider disposed");
    }
}

impl Drop for ReconnectingConnectionProvider {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Dials until a connection lands or the strategy gives up.
async fn maintain(inner: Arc<ProviderInner>) {
    let mut attempt: u32 = 0;
    loop {
        if inner.state.lock().disposed {
            return;
        }

        match (inner.factory)().await {
            Ok(connection) => {
                let epoch = {
                    let mut state = inner.state.lock();
                    if state.disposed {
                        drop(state);
                        connection.dispose();
                        return;
                    }
                    state.epoch += 1;
                    state.refresh_count += 1;
                    state.connection = Some(Arc::clone(&connection));
                    state.epoch
                };

                let weak = Arc::downgrade(&inner);
                connection.on_disconnected(move || {
                    if let Some(inner) = weak.upgrade() {
                        handle_disconnect(inner, epoch);
                    }
                });

                info!(
                    connection_id = %connection.connection_id(),
                    epoch,
                    "connection established"
                );
                inner.generation.send_modify(|g| *g = g.wrapping_add(1));
                return;
            }
            Err(error) => {
                if !inner.strategy.should_reconnect(attempt, &error) {
                    warn!(
                        %error,
                        attempt,
                        strategy = inner.strategy.name(),
                        "giving up on reconnection"
                    );
                    return;
                }
                let delay = inner.strategy.next_delay(attempt);
                debug!(%error, attempt, ?delay, "connection attempt failed, retrying");
                tokio::time::sleep(delay).await;
                attempt = attempt.saturating_add(1);
            }
        }
    }
}

/// Reacts to the death of the connection stamped with `epoch`.
fn handle_disconnect(inner: Arc<ProviderInner>, epoch: u64) {
    {
        let mut state = inner.state.lock();
        if state.disposed || state.epoch != epoch {
            // A successor already replaced this connection.
            return;
        }
        state.connection = None;
    }
    debug!(epoch, "live connection lost, reconnecting");
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(maintain(inner));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconnect::strategy::FixedDelay;
    use crate::rpc::{BrokerConfig, DelegateRegistry};
    use crate::transport::MemoryTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Factory that hands out the near side of pre-built memory pairs,
    /// keeping the far sides alive so connections stay up.
    fn memory_factory(
        failures_before_success: usize,
    ) -> (ConnectionFactory, Arc<Mutex<Vec<MemoryTransport>>>, Arc<AtomicUsize>) {
        let far_sides = Arc::new(Mutex::new(Vec::new()));
        let attempts = Arc::new(AtomicUsize::new(0));
        let factory: ConnectionFactory = {
            let far_sides = Arc::clone(&far_sides);
            let attempts = Arc::clone(&attempts);
            Arc::new(move || {
                let far_sides = Arc::clone(&far_sides);
                let attempts = Arc::clone(&attempts);
                Box::pin(async move {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                    if attempt < failures_before_success {
                        return Err(RpcError::channel_fault("dial refused"));
                    }
                    let (near, far) = MemoryTransport::pair_default();
                    far_sides.lock().push(far);
                    Ok(Connection::establish(
                        near,
                        Arc::new(DelegateRegistry::new()),
                        BrokerConfig::default(),
                    ))
                })
            })
        };
        (factory, far_sides, attempts)
    }

    fn fast_strategy() -> Arc<dyn ReconnectionStrategy> {
        Arc::new(FixedDelay::new(Duration::from_millis(10)))
    }

    #[tokio::test]
    async fn provides_a_connection_once_dialing_succeeds() {
        let (factory, _far, _attempts) = memory_factory(0);
        let provider = ReconnectingConnectionProvider::new(factory, fast_strategy());

        let connection = provider
            .try_get_connection(Duration::from_secs(5))
            .await
            .unwrap();
        assert!(connection.is_connected());
        assert_eq!(provider.refresh_count(), 1);
    }

    #[tokio::test]
    async fn retries_until_the_factory_succeeds() {
        let (factory, _far, attempts) = memory_factory(3);
        let provider = ReconnectingConnectionProvider::new(factory, fast_strategy());

        let connection = provider
            .try_get_connection(Duration::from_secs(5))
            .await
            .unwrap();
        assert!(connection.is_connected());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert_eq!(provider.refresh_count(), 1);
    }

    #[tokio::test]
    async fn reconnects_after_the_live_connection_dies() {
        let (factory, far_sides, _attempts) = memory_factory(0);
        let provider = ReconnectingConnectionProvider::new(factory, fast_strategy());

        let first = provider
            .try_get_connection(Duration::from_secs(5))
            .await
            .unwrap();

        // Drop the peer side so the first connection dies.
        far_sides.lock().clear();

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if provider.refresh_count() == 2 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let second = provider
            .try_get_connection(Duration::from_secs(5))
            .await
            .unwrap();
        assert!(second.is_connected());
        assert_ne!(first.connection_id(), second.connection_id());
    }

    #[tokio::test]
    async fn waiting_callers_time_out_when_nothing_connects() {
        let (factory, _far, _attempts) = memory_factory(usize::MAX);
        let provider = ReconnectingConnectionProvider::new(factory, fast_strategy());

        let error = provider
            .try_get_connection(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(error.is_timeout());
    }

    #[tokio::test]
    async fn dispose_rejects_waiters_and_stops_reconnecting() {
        let (factory, _far, attempts) = memory_factory(usize::MAX);
        let provider = ReconnectingConnectionProvider::new(factory, fast_strategy());
        tokio::time::sleep(Duration::from_millis(30)).await;

        provider.dispose();
        provider.dispose();
        assert!(provider.is_disposed());

        let error = provider
            .try_get_connection(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(error.is_channel_fault());

        let dialed = attempts.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(attempts.load(Ordering::SeqCst) <= dialed + 1);
    }

    #[tokio::test]
    async fn dispose_tears_down_the_live_connection() {
        let (factory, _far, _attempts) = memory_factory(0);
        let provider = ReconnectingConnectionProvider::new(factory, fast_strategy());
        let connection = provider
            .try_get_connection(Duration::from_secs(5))
            .await
            .unwrap();

        provider.dispose();
        assert!(!connection.is_connected());
        assert_eq!(provider.refresh_count(), 1);
    }
}
