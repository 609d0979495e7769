// Copyright 2025 Agentgate Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Connection Manager
//!
//! One supervised background task per downstream service. The task owns
//! the session lifecycle: handshake, discovery, readiness, then parks on
//! a cancellation token until `disconnect` reaps it. Operations on the
//! same service name are serialized through a per-name async mutex so a
//! teardown never races its own discovery refresh.

use crate::config::ServiceConfig;
use crate::provider::{HttpToolProvider, ProviderError};
use crate::router::ToolRouter;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Draining,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Draining => "draining",
        }
    }
}

/// Connect-time errors.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("handshake with {service} failed: {source}")]
    Handshake {
        service: String,
        #[source]
        source: ProviderError,
    },
    #[error("connection task for {service} exited before becoming ready")]
    TaskFailed { service: String },
}

/// Per-service runtime record. The session handle (the provider) is only
/// handed out while the state is Ready.
struct Connection {
    provider: Arc<HttpToolProvider>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns every downstream connection. Passed around by Arc; no globals.
pub struct ConnectionManager {
    services: Vec<ServiceConfig>,
    connections: DashMap<String, Connection>,
    ops: DashMap<String, Arc<Mutex<()>>>,
    router: Arc<ToolRouter>,
    http: reqwest::Client,
}

impl ConnectionManager {
    pub fn new(services: Vec<ServiceConfig>, router: Arc<ToolRouter>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            services,
            connections: DashMap::new(),
            ops: DashMap::new(),
            router,
            http,
        })
    }

    /// Names of the configured services, in configuration order.
    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }

    /// Current state for a service (Disconnected when no record exists).
    pub fn state(&self, name: &str) -> ConnectionState {
        self.connections
            .get(name)
            .map(|c| *c.state.borrow())
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// Connect to a single service, tearing down any prior connection for
    /// the same name first. Returns the live session handle once the
    /// connection task signals readiness.
    pub async fn connect(
        &self,
        name: &str,
        endpoint: &str,
    ) -> Result<Arc<HttpToolProvider>, ConnectError> {
        let lock = self.op_lock(name);
        let _guard = lock.lock().await;
        self.connect_locked(name, endpoint).await
    }

    /// Raise the stop signal for a service's task, await its exit, and
    /// remove the record. No-op when absent.
    pub async fn disconnect(&self, name: &str) {
        let lock = self.op_lock(name);
        let _guard = lock.lock().await;
        self.disconnect_locked(name).await;
    }

    /// Live session handle, or exactly one reconnect attempt using the
    /// configured endpoint.
    pub async fn get(&self, name: &str) -> Option<Arc<HttpToolProvider>> {
        if let Some(connection) = self.connections.get(name) {
            if *connection.state.borrow() == ConnectionState::Ready {
                return Some(connection.provider.clone());
            }
        }

        let endpoint = self.service_endpoint(name)?.to_string();
        match self.connect(name, &endpoint).await {
            Ok(provider) => Some(provider),
            Err(e) => {
                warn!(service = name, error = %e, "reconnect failed");
                None
            }
        }
    }

    /// Initial connection to every configured service. Per-service
    /// failures are logged; partial availability is a normal mode.
    pub async fn connect_all(&self) {
        info!("Connecting to downstream services");
        for service in &self.services {
            if let Err(e) = self.connect(&service.name, &service.endpoint).await {
                warn!(service = %service.name, error = %e, "service unavailable at startup");
            }
        }
    }

    /// Re-run discovery against every reachable service.
    pub async fn refresh_all(&self) {
        for service in &self.services {
            let Some(provider) = self.get(&service.name).await else {
                continue;
            };
            match self.router.refresh(&service.name, provider.as_ref()).await {
                Ok(count) => {
                    debug!(service = %service.name, tools = count, "discovery refreshed");
                }
                Err(e) => {
                    warn!(service = %service.name, error = %e, "discovery refresh failed");
                }
            }
        }
    }

    /// Tear down every connection (shutdown path).
    pub async fn disconnect_all(&self) {
        info!("Closing downstream connections");
        for name in self.service_names() {
            self.disconnect(&name).await;
        }
    }

    fn op_lock(&self, name: &str) -> Arc<Mutex<()>> {
        self.ops.entry(name.to_string()).or_default().clone()
    }

    fn service_endpoint(&self, name: &str) -> Option<&str> {
        self.services
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.endpoint.as_str())
    }

    async fn connect_locked(
        &self,
        name: &str,
        endpoint: &str,
    ) -> Result<Arc<HttpToolProvider>, ConnectError> {
        self.disconnect_locked(name).await;

        debug!(service = name, endpoint, "connecting");
        let provider = Arc::new(HttpToolProvider::new(self.http.clone(), endpoint));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let cancel = CancellationToken::new();
        let (ready_tx, ready_rx) = oneshot::channel();

        let task = tokio::spawn(run_connection(
            name.to_string(),
            provider.clone(),
            self.router.clone(),
            state_tx,
            cancel.clone(),
            ready_tx,
        ));
        self.connections.insert(
            name.to_string(),
            Connection {
                provider: provider.clone(),
                state: state_rx,
                cancel,
                task,
            },
        );

        match ready_rx.await {
            Ok(Ok(())) => Ok(provider),
            Ok(Err(source)) => {
                self.disconnect_locked(name).await;
                Err(ConnectError::Handshake {
                    service: name.to_string(),
                    source,
                })
            }
            Err(_) => {
                self.disconnect_locked(name).await;
                Err(ConnectError::TaskFailed {
                    service: name.to_string(),
                })
            }
        }
    }

    async fn disconnect_locked(&self, name: &str) {
        let Some((_, connection)) = self.connections.remove(name) else {
            return;
        };
        connection.cancel.cancel();
        if let Err(e) = connection.task.await {
            if !e.is_cancelled() {
                warn!(service = name, error = %e, "connection task join failed");
            }
        }
        debug!(service = name, "disconnected");
    }
}

/// Supervised connection task: handshake, discovery, readiness, then park
/// on the stop signal. The token is checked at both blocking waits so
/// `disconnect` always completes promptly.
async fn run_connection(
    name: String,
    provider: Arc<HttpToolProvider>,
    router: Arc<ToolRouter>,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
    ready_tx: oneshot::Sender<Result<(), ProviderError>>,
) {
    let handshake = async {
        provider.initialize().await?;
        router.refresh(&name, provider.as_ref()).await
    };

    let outcome = tokio::select! {
        _ = cancel.cancelled() => {
            let _ = state_tx.send(ConnectionState::Disconnected);
            return;
        }
        result = handshake => result,
    };

    match outcome {
        Ok(count) => {
            info!(service = %name, tools = count, "service connection ready");
            let _ = state_tx.send(ConnectionState::Ready);
            let _ = ready_tx.send(Ok(()));
        }
        Err(e) => {
            warn!(service = %name, error = %e, "connection handshake failed");
            let _ = state_tx.send(ConnectionState::Disconnected);
            let _ = ready_tx.send(Err(e));
            return;
        }
    }

    cancel.cancelled().await;

    let _ = state_tx.send(ConnectionState::Draining);
    provider.shutdown().await;
    let _ = state_tx.send(ConnectionState::Disconnected);
    debug!(service = %name, "connection task stopped");
}
