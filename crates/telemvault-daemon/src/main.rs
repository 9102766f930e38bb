// Copyright [2026] [TelemVault Contributors]
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// Copyright (c) 2026 TelemVault Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use telemvault_daemon::config::DaemonConfig;
use telemvault_daemon::server::TelemetryVaultService;
use telemvault_protocol::pb::telemetry_vault_server::TelemetryVaultServer;

#[derive(Debug, Parser)]
#[command(name = "telemvault-daemon")]
#[command(about = "TelemVault encrypted-telemetry registry daemon")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:50061")]
    listen: String,

    #[arg(long, default_value = "./data")]
    data_dir: String,

    /// JSON file of trusted oracle verifying keys, keyed by key id.
    #[arg(long)]
    trusted_keys: Option<String>,

    #[arg(long, default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(args.log))
        .init();

    std::fs::create_dir_all(&args.data_dir)?;

    let addr: SocketAddr = args.listen.parse()?;
    let config = DaemonConfig::load(&args.data_dir, args.trusted_keys.as_deref())?;
    if config.trusted_keys.is_empty() {
        tracing::warn!("no trusted oracle keys configured; all callbacks will be rejected");
    }
    let svc = TelemetryVaultService::build(config)?;

    tracing::info!(%addr, data_dir=%args.data_dir, "starting TelemVault gRPC server");

    tonic::transport::Server::builder()
        .add_service(TelemetryVaultServer::new(svc))
        .serve(addr)
        .await?;

    Ok(())
}
