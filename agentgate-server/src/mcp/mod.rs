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

//! Gateway RPC surface
//!
//! The gateway is itself an MCP server over streamable HTTP: desktop
//! clients (through the stdio bridge) POST JSON-RPC to `/mcp`. Session
//! continuity uses the `Mcp-Session-Id` header, issued on `initialize`
//! and echoed by the client on subsequent requests. `tools/list` and
//! `tools/call` expose the tools discovered across every downstream
//! service, routed through the invoker.

pub mod handlers;
pub mod server;

pub use handlers::GatewayMcpHandler;
pub use server::handle_rpc;
