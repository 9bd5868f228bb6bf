//! StageFlow Shield
//!
//! The request-security boundary in front of the StageFlow serverless API.
//!
//! # Architecture
//!
//! Every endpoint runs through one pipeline, the [`boundary::Boundary`]:
//!
//! - **CORS**: origin allow-list with a canonical fallback
//! - **Method check**: 204 for preflights, 405 for anything not allowed
//! - **CSRF**: double-submit token compared in constant time
//! - **Session**: cookie tokens validated against the hosted auth service,
//!   refreshed transparently
//! - **Error shaping**: failures classified into a stable code taxonomy and
//!   returned in a sanitized JSON envelope
//!
//! # Features
//!
//! - `tracing` - Subscriber setup for structured logging

#![warn(clippy::all)]

pub mod boundary;
pub mod config;
pub mod cookie;
pub mod error;
pub mod flags;
pub mod middleware;
pub mod monitoring;
pub mod response;
pub mod routes;
pub mod telemetry;

pub use boundary::{Boundary, EndpointPolicy, RequestContext, SessionPolicy, ShieldContext};
pub use config::ShieldConfig;
pub use error::{ApiError, ApiResult};
pub use response::Reply;

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Server hosting the shielded routes.
pub struct Server {
    shield: Arc<ShieldContext>,
    addr: SocketAddr,
}

impl Server {
    /// Build the server from validated configuration.
    pub fn new(config: ShieldConfig) -> Result<Self, anyhow::Error> {
        let addr = config.server.socket_addr()?;
        let shield = ShieldContext::from_config(config)?;
        Ok(Self {
            shield: Arc::new(shield),
            addr,
        })
    }

    pub fn router(&self) -> Router {
        routes::create_router(self.shield.clone())
    }

    /// Run until Ctrl-C or SIGTERM.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("Server listening on {}", self.addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
