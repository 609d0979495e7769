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

use crate::api::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

/// Health check response structure
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: Vec<ServiceHealth>,
    pub tools: usize,
    pub sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub name: String,
    pub state: &'static str,
}

/// GET /health - liveness probe with per-service connection states.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let services = state
        .manager
        .service_names()
        .into_iter()
        .map(|name| {
            let connection_state = state.manager.state(&name);
            ServiceHealth {
                name,
                state: connection_state.as_str(),
            }
        })
        .collect();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        services,
        tools: state.router.len(),
        sessions: state.mcp.session_count(),
    })
}
