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

//! Tool Router
//!
//! Maps globally-unique tool names to the service that owns them,
//! refreshed by discovery calls. Overwrite semantics: the last refresh
//! to claim a name wins (a collision is logged, not rejected).

use crate::provider::{ProviderError, ToolProvider};
use agentgate_core::Tool;
use dashmap::DashMap;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Tool-name to owning-service mapping plus descriptor snapshot.
#[derive(Default)]
pub struct ToolRouter {
    routes: DashMap<String, String>,
    descriptors: DashMap<String, Tool>,
}

impl ToolRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Owning service for a tool name, if known.
    pub fn route(&self, tool: &str) -> Option<String> {
        self.routes.get(tool).map(|entry| entry.value().clone())
    }

    /// Current descriptors, one per known tool.
    pub fn tools(&self) -> Vec<Tool> {
        self.descriptors
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of known tools.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Query one service for its tool list and merge the result.
    ///
    /// Tools the service no longer advertises are dropped (only entries it
    /// owns); every advertised tool overwrites any previous owner. Returns
    /// the number of tools the service advertised.
    pub async fn refresh(
        &self,
        service: &str,
        provider: &dyn ToolProvider,
    ) -> Result<usize, ProviderError> {
        let tools = provider.list_tools().await?;
        let advertised: HashSet<&str> = tools.iter().map(|t| t.name.as_str()).collect();

        let stale: Vec<String> = self
            .routes
            .iter()
            .filter(|entry| entry.value() == service && !advertised.contains(entry.key().as_str()))
            .map(|entry| entry.key().clone())
            .collect();
        for name in stale {
            debug!(service, tool = %name, "dropping tool no longer advertised");
            self.routes.remove(&name);
            self.descriptors.remove(&name);
        }

        let count = tools.len();
        for tool in tools {
            if let Some(previous) = self.routes.insert(tool.name.clone(), service.to_string()) {
                if previous != service {
                    warn!(
                        tool = %tool.name,
                        from = %previous,
                        to = %service,
                        "tool owner changed; last refresh wins"
                    );
                }
            }
            debug!(service, tool = %tool.name, "registered tool");
            self.descriptors.insert(tool.name.clone(), tool);
        }
        Ok(count)
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use agentgate_core::CallToolResult;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;

    struct StaticProvider {
        tools: Vec<Tool>,
    }

    impl StaticProvider {
        fn new(names: &[&str]) -> Self {
            Self {
                tools: names
                    .iter()
                    .map(|name| Tool {
                        name: name.to_string(),
                        description: None,
                        input_schema: json!({"type": "object"}),
                    })
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl ToolProvider for StaticProvider {
        async fn list_tools(&self) -> Result<Vec<Tool>, ProviderError> {
            Ok(self.tools.clone())
        }

        async fn call_tool(
            &self,
            _name: &str,
            _arguments: HashMap<String, serde_json::Value>,
        ) -> Result<CallToolResult, ProviderError> {
            Ok(CallToolResult::text("unused"))
        }
    }

    #[tokio::test]
    async fn test_refresh_and_route() {
        let router = ToolRouter::new();
        let provider = StaticProvider::new(&["get_leave_balance", "apply_leave"]);

        let count = router.refresh("leave", &provider).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(router.route("get_leave_balance"), Some("leave".to_string()));
        assert_eq!(router.route("unknown_tool"), None);
        assert_eq!(router.tools().len(), 2);
    }

    #[tokio::test]
    async fn test_last_refresh_wins_on_collision() {
        let router = ToolRouter::new();
        let first = StaticProvider::new(&["shared_tool"]);
        let second = StaticProvider::new(&["shared_tool"]);

        router.refresh("leave", &first).await.unwrap();
        router.refresh("loan", &second).await.unwrap();
        assert_eq!(router.route("shared_tool"), Some("loan".to_string()));
        assert_eq!(router.len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_drops_vanished_tools() {
        let router = ToolRouter::new();
        router
            .refresh("leave", &StaticProvider::new(&["old_tool", "kept_tool"]))
            .await
            .unwrap();
        router
            .refresh("leave", &StaticProvider::new(&["kept_tool"]))
            .await
            .unwrap();

        assert_eq!(router.route("old_tool"), None);
        assert_eq!(router.route("kept_tool"), Some("leave".to_string()));
    }

    #[tokio::test]
    async fn test_refresh_keeps_other_services_tools() {
        let router = ToolRouter::new();
        router
            .refresh("leave", &StaticProvider::new(&["leave_tool"]))
            .await
            .unwrap();
        router
            .refresh("loan", &StaticProvider::new(&["loan_tool"]))
            .await
            .unwrap();
        router
            .refresh("leave", &StaticProvider::new(&["leave_tool"]))
            .await
            .unwrap();

        assert_eq!(router.route("loan_tool"), Some("loan".to_string()));
    }
}
