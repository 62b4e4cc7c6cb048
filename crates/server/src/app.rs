// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application finalize layer.
//!
//! An [`App`] collects RPC bundles, owns the broker, and at
//! `finalize()` turns the unified bundle into the mounted router.
//! Stream topics are registered as bundles arrive so publisher
//! handles are available before finalize (machines need them at
//! build time).

use crate::router::connect_router;
use axum::Router;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vapp_broker::{Broker, BrokerError};
use vapp_rpc::{sanitize_service_name, RpcBundle, RpcRegistry, DEFAULT_SERVICE_NAME};

/// Renders a `.proto` file from the unified bundle. The rendering
/// itself lives outside this crate; the app only drives the seam.
pub trait ProtoEmitter: Send + Sync {
    fn emit(&self, service_name: &str, bundle: &RpcBundle, path: &Path) -> std::io::Result<()>;
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Application name; `ServiceName` is its PascalCase sanitization.
    pub name: String,
    /// Render a `.proto` from the merged bundle at finalize.
    pub emit_proto: bool,
    /// Where the generated file goes.
    pub proto_path: PathBuf,
    /// FSM history ring capacity (consumed by machine construction).
    pub history_size: usize,
    /// Enables the recovery path in `start()`.
    pub enable_last_state_recovery: bool,
    /// Mount prefix for the RPC routes.
    pub rpc_prefix: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_SERVICE_NAME.to_string(),
            emit_proto: false,
            proto_path: PathBuf::from("proto/app.proto"),
            history_size: 1000,
            enable_last_state_recovery: true,
            rpc_prefix: "/rpc".to_string(),
        }
    }
}

impl AppConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// App-level failures.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Broker(#[from] BrokerError),
    #[error("proto emission failed: {0}")]
    Proto(#[from] std::io::Error),
}

/// Collects bundles and produces the HTTP surface.
pub struct App {
    config: AppConfig,
    registry: RpcRegistry,
    broker: Broker,
    proto_emitter: Option<Box<dyn ProtoEmitter>>,
}

/// What `finalize()` hands back to the host process.
pub struct FinalizedApp {
    /// Router with all RPC routes nested under the configured prefix.
    pub router: Router,
    pub service_fqn: String,
    pub broker: Broker,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            registry: RpcRegistry::new(),
            broker: Broker::new(),
            proto_emitter: None,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The broker backing this app's streams.
    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// PascalCase service name derived from the app name.
    pub fn service_name(&self) -> String {
        sanitize_service_name(&self.config.name)
    }

    /// Fully-qualified service name used in route paths.
    pub fn service_fqn(&self) -> String {
        format!("vention.app.v1.{}Service", self.service_name())
    }

    pub fn with_proto_emitter(mut self, emitter: Box<dyn ProtoEmitter>) -> Self {
        self.proto_emitter = Some(emitter);
        self
    }

    /// Register a plugin bundle. Stream topics are created
    /// immediately so publishers can be handed out before finalize.
    pub fn register_bundle(&mut self, bundle: RpcBundle) -> Result<(), AppError> {
        for stream in &bundle.streams {
            self.broker.register(stream.descriptor())?;
        }
        self.registry.add_bundle(bundle);
        Ok(())
    }

    /// Merge, normalize, mount. Consumes the app, so finalizing (and
    /// registering past it) cannot happen twice.
    pub fn finalize(mut self) -> Result<FinalizedApp, AppError> {
        let unified = self.registry.unified();
        let service_fqn = self.service_fqn();

        if self.config.emit_proto {
            match &self.proto_emitter {
                Some(emitter) => {
                    emitter.emit(&self.service_name(), &unified, &self.config.proto_path)?
                }
                None => tracing::warn!("emit_proto set but no proto emitter installed"),
            }
        }

        let rpc_routes = connect_router(&service_fqn, &unified, &self.broker);
        let router = Router::new().nest(&self.config.rpc_prefix, rpc_routes);

        tracing::info!(
            service = %service_fqn,
            actions = unified.actions.len(),
            streams = unified.streams.len(),
            prefix = %self.config.rpc_prefix,
            "app finalized"
        );

        Ok(FinalizedApp {
            router,
            service_fqn,
            broker: self.broker,
        })
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
