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

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Agentgate Server Configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub invoker: InvokerConfig,
    /// Downstream tool-provider services, in connection order.
    #[serde(default = "default_services")]
    pub services: Vec<ServiceConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    /// HTTP listen address (e.g., "127.0.0.1:8005")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Enable CORS
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

/// One downstream tool-provider service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub name: String,
    /// Streamable-HTTP RPC endpoint (e.g., "http://localhost:8000/mcp")
    pub endpoint: String,
}

/// Completion-stream backend configuration (OpenAI-compatible API).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionConfig {
    /// API key; falls back to the OPENAI_API_KEY environment variable.
    pub api_key: Option<String>,

    #[serde(default = "default_completion_base_url")]
    pub base_url: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    /// Outer HTTP timeout for a completion request, in seconds.
    #[serde(default = "default_completion_timeout")]
    pub request_timeout_secs: u64,
}

/// Tool invocation limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InvokerConfig {
    /// Hard per-call timeout, in seconds.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Combined tool output beyond this many bytes is truncated.
    #[serde(default = "default_max_output")]
    pub max_output_chars: usize,
}

impl InvokerConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

// Default values
fn default_listen_addr() -> String {
    "127.0.0.1:8005".to_string()
}

fn default_enable_cors() -> bool {
    true
}

fn default_completion_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_completion_timeout() -> u64 {
    60
}

fn default_call_timeout() -> u64 {
    25
}

fn default_max_output() -> usize {
    4000
}

fn default_services() -> Vec<ServiceConfig> {
    vec![
        ServiceConfig {
            name: "leave".to_string(),
            endpoint: "http://localhost:8000/mcp".to_string(),
        },
        ServiceConfig {
            name: "loan".to_string(),
            endpoint: "http://localhost:8001/mcp".to_string(),
        },
        ServiceConfig {
            name: "policy".to_string(),
            endpoint: "http://localhost:8002/mcp".to_string(),
        },
    ]
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: default_enable_cors(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_completion_base_url(),
            model: default_completion_model(),
            request_timeout_secs: default_completion_timeout(),
        }
    }
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout(),
            max_output_chars: default_max_output(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: HttpServerConfig::default(),
            completion: CompletionConfig::default(),
            invoker: InvokerConfig::default(),
            services: default_services(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with priority: file > env > defaults
    ///
    /// Supported environment variables:
    /// - AGENTGATE_LISTEN_ADDR: HTTP listen address
    /// - AGENTGATE_COMPLETION_URL: completion API base URL
    /// - AGENTGATE_COMPLETION_MODEL: completion model name
    /// - OPENAI_API_KEY: completion API key
    pub fn load(config_file: Option<std::path::PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        config.merge_env();
        Ok(config)
    }

    /// Overlay environment variables onto the current configuration.
    pub fn merge_env(&mut self) {
        if let Ok(addr) = std::env::var("AGENTGATE_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Ok(url) = std::env::var("AGENTGATE_COMPLETION_URL") {
            self.completion.base_url = url;
        }
        if let Ok(model) = std::env::var("AGENTGATE_COMPLETION_MODEL") {
            self.completion.model = model;
        }
        if self.completion.api_key.is_none() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                self.completion.api_key = Some(key);
            }
        }
    }

    /// Parse listen address as SocketAddr
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(self.server.listen_addr.parse()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.services.is_empty() {
            anyhow::bail!("no downstream services configured");
        }
        let mut seen = std::collections::HashSet::new();
        for service in &self.services {
            if !seen.insert(service.name.as_str()) {
                anyhow::bail!("duplicate service name: {}", service.name);
            }
            if !service.endpoint.starts_with("http://") && !service.endpoint.starts_with("https://")
            {
                anyhow::bail!(
                    "service {} endpoint is not an HTTP URL: {}",
                    service.name,
                    service.endpoint
                );
            }
        }

        Ok(())
    }

    /// Endpoint for a configured service, if any.
    pub fn service_endpoint(&self, name: &str) -> Option<&str> {
        self.services
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.endpoint.as_str())
    }
}
