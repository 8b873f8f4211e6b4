// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Porter provisioner status server binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use porter_server::{create_app_state, create_router};
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Porter server - state and log streams for provisioner operations.
#[derive(Parser, Debug)]
#[command(
	name = "porter-server",
	about = "Porter provisioner status server",
	version
)]
struct Args {
	/// Config file to load instead of /etc/porter/server.toml
	#[arg(long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Subcommands for porter-server (e.g., `version`)
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version information
	Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("porter-server version: {}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	// Load .env file if present
	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => porter_server_config::load_config_with_file(path)?,
		None => porter_server_config::load_config()?,
	};

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		backend = %config.stream.backend,
		"starting porter-server"
	);

	let state = create_app_state(&config).await?;
	let shutdown = state.shutdown.clone();

	let app = create_router(state)
		.layer(TraceLayer::new_for_http())
		.layer(
			CorsLayer::new()
				.allow_origin(Any)
				.allow_methods(Any)
				.allow_headers(Any),
		);

	let addr = config.socket_addr();
	tracing::info!("listening on {}", addr);

	let listener = tokio::net::TcpListener::bind(&addr).await?;

	// Cancelling the parent token ends every open SSE tail so connections can drain.
	axum::serve(listener, app)
		.with_graceful_shutdown(async move {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!(error = %e, "failed to listen for shutdown signal");
				std::future::pending::<()>().await;
			}
			tracing::info!("Received shutdown signal");
			shutdown.cancel();
		})
		.await?;

	tracing::info!("Server shutdown complete");
	Ok(())
}
