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

use agentgate_bridge::{run_loop, HttpBridge};
use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tokio::io::BufReader;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The gateway's streamable-HTTP URL (e.g., http://localhost:8005/mcp)
    url: String,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Stdout is the wire; all diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentgate_bridge=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::info!(url = %args.url, "starting bridge");

    let mut bridge = HttpBridge::new(&args.url, Duration::from_secs(args.timeout_secs))?;
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();

    run_loop(&mut bridge, reader, writer).await
}
