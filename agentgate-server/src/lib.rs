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

//! Agentgate server
//!
//! Orchestration gateway between desktop MCP clients, downstream
//! tool-provider services, and a streaming completion API. The server
//! exposes three surfaces: the gateway's own RPC endpoint (`/mcp`), a
//! streamed chat endpoint for the frontend (`/chat`), and a liveness
//! probe (`/health`).

pub mod api;
pub mod chat;
pub mod completion;
pub mod config;
pub mod connection;
pub mod invoker;
pub mod mcp;
pub mod provider;
pub mod router;

use anyhow::Result;
use axum::{
    http::HeaderName,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agentgate_core::SESSION_HEADER;
use api::AppState;
use chat::ChatOrchestrator;
use completion::{CompletionStream, OpenAiCompletion};
use config::GatewayConfig;
use connection::ConnectionManager;
use invoker::ToolInvoker;
use mcp::GatewayMcpHandler;
use router::ToolRouter;

/// Assemble the axum application for the given state.
pub fn build_router(state: AppState, enable_cors: bool) -> Router {
    let mut app = Router::new()
        .route("/health", get(api::health_check))
        .route("/chat", post(api::chat_endpoint))
        .route("/mcp", post(mcp::handle_rpc))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers([HeaderName::from_static(SESSION_HEADER)]);
        app = app.layer(cors);
    }

    app
}

/// Build the registry objects and shared state from configuration.
pub fn build_state(config: &GatewayConfig) -> Result<AppState> {
    let tool_router = Arc::new(ToolRouter::new());
    let manager = Arc::new(ConnectionManager::new(
        config.services.clone(),
        tool_router.clone(),
    )?);
    let invoker = Arc::new(ToolInvoker::new(
        manager.clone(),
        tool_router.clone(),
        config.invoker.clone(),
    ));

    let orchestrator = match OpenAiCompletion::new(&config.completion) {
        Ok(backend) => {
            let backend: Arc<dyn CompletionStream> = Arc::new(backend);
            Some(Arc::new(ChatOrchestrator::new(
                tool_router.clone(),
                invoker.clone(),
                backend,
            )))
        }
        Err(e) => {
            tracing::warn!(error = %e, "chat endpoint disabled");
            None
        }
    };

    let mcp = Arc::new(GatewayMcpHandler::new(tool_router.clone(), invoker.clone()));

    Ok(AppState {
        manager,
        router: tool_router,
        invoker,
        orchestrator,
        mcp,
    })
}

pub async fn run_server(config: GatewayConfig) -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentgate=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Agentgate");
    config.validate()?;

    let state = build_state(&config)?;
    let manager = state.manager.clone();
    let tool_router = state.router.clone();

    // Connect to downstream services, then run a discovery pass; partial
    // availability is fine, absent services simply contribute no tools.
    manager.connect_all().await;
    manager.refresh_all().await;
    tracing::info!(tools = tool_router.len(), "tool discovery complete");

    let app = build_router(state, config.server.enable_cors);
    let addr = config.socket_addr()?;
    tracing::info!(%addr, "Agentgate listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    manager.disconnect_all().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
}
