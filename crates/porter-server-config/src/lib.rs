// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the Porter provisioner status server.
//!
//! Settings are layered from built-in defaults, an optional TOML file and
//! `PORTER_SERVER_*` environment variables, later sources overriding earlier
//! ones field by field.
//!
//! # Usage
//!
//! ```ignore
//! use porter_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Streams backed by {}", config.stream.backend);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use std::time::Duration;

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub stream: StreamConfig,
	pub logging: LoggingConfig,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.stream.poll_interval_ms)
	}

	pub fn keep_alive(&self) -> Duration {
		Duration::from_secs(self.stream.keep_alive_secs)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`PORTER_SERVER_*`)
/// 2. Config file (`/etc/porter/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	];
	load_from_sources(sources)
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	let mut merged = ServerConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	];
	load_from_sources(sources)
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let stream = layer.stream.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&stream)?;

	info!(
		host = %http.host,
		port = http.port,
		backend = %stream.backend,
		poll_interval_ms = stream.poll_interval_ms,
		read_batch_size = stream.read_batch_size,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		http,
		stream,
		logging,
	})
}

fn validate_config(stream: &StreamConfig) -> Result<(), ConfigError> {
	if stream.poll_interval_ms == 0 {
		return Err(ConfigError::Validation(
			"stream.poll_interval_ms must be greater than zero".to_string(),
		));
	}
	if stream.read_batch_size == 0 {
		return Err(ConfigError::Validation(
			"stream.read_batch_size must be greater than zero".to_string(),
		));
	}
	if stream.keep_alive_secs == 0 {
		return Err(ConfigError::Validation(
			"stream.keep_alive_secs must be greater than zero".to_string(),
		));
	}
	if stream.backend == StreamBackend::Sqlite && stream.database_url.trim().is_empty() {
		return Err(ConfigError::Validation(
			"PORTER_SERVER_DATABASE_URL is empty while the sqlite stream backend is selected"
				.to_string(),
		));
	}

	Ok(())
}
