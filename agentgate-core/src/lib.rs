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

//! Agentgate protocol vocabulary.
//!
//! Wire types shared by the gateway server and the stdio bridge:
//! JSON-RPC 2.0 messages, MCP tool/content shapes, and the protocol
//! constants both sides agree on (session header, notification
//! namespace). No I/O lives here.

pub mod protocol;

pub use protocol::*;
