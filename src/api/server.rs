//! HTTP server assembly and graceful shutdown.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use super::handlers::AppState;
use super::middleware::{create_cors_layer, request_id_middleware};
use super::monitoring::MetricsRegistry;
use super::routes::create_router;
use crate::config::ApiConfig;
use crate::engine::EventBus;
use crate::errors::{GameError, GameResult};
use crate::service::GameService;

pub struct ApiServer {
    config: ApiConfig,
    service: Arc<GameService>,
    events: EventBus,
    metrics: Arc<MetricsRegistry>,
}

impl ApiServer {
    pub fn new(
        config: ApiConfig,
        service: Arc<GameService>,
        events: EventBus,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            config,
            service,
            events,
            metrics,
        }
    }

    /// Serve until ctrl-c or SIGTERM, then drain in-flight requests.
    pub async fn run(self) -> GameResult<()> {
        let addr = self.socket_addr()?;
        let app = self.create_app();

        info!("API listening on http://{}", addr);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GameError::Config(format!("failed to bind {}: {}", addr, e)))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| GameError::Config(format!("server error: {}", e)))?;

        info!("API server stopped");
        Ok(())
    }

    fn create_app(&self) -> axum::Router {
        let state = AppState {
            service: self.service.clone(),
            events: self.events.clone(),
            metrics: self.metrics.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };

        create_router(state)
            .layer(axum::middleware::from_fn(request_id_middleware))
            .layer(create_cors_layer(self.config.allowed_origins.clone()))
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.request_timeout_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }

    fn socket_addr(&self) -> GameResult<SocketAddr> {
        let ip = self
            .config
            .host
            .parse::<std::net::IpAddr>()
            .map_err(|e| GameError::Config(format!("invalid host {}: {}", self.config.host, e)))?;
        Ok(SocketAddr::from((ip, self.config.port)))
    }
}

/// Resolves on ctrl-c or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received terminate signal"),
    }
}
