// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP status service for provisioner operation streams.
//!
//! The provisioner worker pushes resource state updates, log lines and the
//! completion marker over HTTP; dashboards follow an operation as
//! server-sent events, resuming with `Last-Event-ID` after a reconnect.

pub mod api;
pub mod error;
pub mod routes;

pub use api::{build_store, create_app_state, create_router, AppState};
pub use error::ServerError;
pub use porter_server_config::ServerConfig;
