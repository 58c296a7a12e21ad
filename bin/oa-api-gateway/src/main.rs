//! API Gateway
//!
//! Public HTTP API. Auth requests are forwarded to whichever healthy
//! `auth-service` instances Consul currently reports.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OA_GATEWAY_CONFIG` | - | Path to a TOML config file |
//! | `ENVIRONMENT` | `development` | Deployment environment |
//! | `API_GATEWAY_ADDRESS` | `0.0.0.0:8080` | `host:port` to bind |
//! | `AUTH_SERVICE_NAME` | `auth-service` | Logical name of the auth backend |
//! | `CONSUL_ADDRESS` | `http://127.0.0.1:8500` | Consul agent address |
//! | `REQUEST_TIMEOUT` | `10s` | Deadline for each inbound request |
//! | `RUST_LOG` | `info` | Log level |
//! | `LOG_FORMAT` | `text` | `json` for structured logs |

use std::sync::Arc;

use anyhow::Result;
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use oa_common::logging::init_logging;
use oa_config::ConfigLoader;
use oa_discovery::{ConsulRegistry, ResolverConfig, ServiceResolver};
use oa_gateway::{AuthServiceClient, GatewayState, Validator};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("oa-api-gateway");

    let config = ConfigLoader::new().load_gateway()?;
    info!(
        environment = %config.environment,
        address = %config.address,
        auth_service = %config.auth_service_name,
        "Starting API gateway"
    );

    let discovery = Arc::new(ConsulRegistry::new(
        config.consul.base_url(),
        config.consul.request_timeout(),
    )?);
    let resolver = ServiceResolver::new(
        discovery,
        ResolverConfig::default().with_refresh_interval(config.resolver_refresh_interval()),
    );
    let auth_client = AuthServiceClient::connect(&resolver, &config.auth_service_name).await?;

    let state = GatewayState::new(
        Arc::new(auth_client.clone()),
        Arc::new(Validator::new()),
        config.request_timeout(),
    );

    let app = oa_gateway::router(state, config.max_body_bytes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let listener = TcpListener::bind(&config.address).await?;
    info!("API gateway listening on http://{}", config.address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Shutdown signal received...");

    auth_client.close();

    info!("API gateway shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
