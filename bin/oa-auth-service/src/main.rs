//! Auth Service
//!
//! Serves `auth.v1.AuthService` (SignIn, SignUp, RefreshToken) and
//! `GET /health`, registered in Consul for the gateway to discover.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OA_AUTH_CONFIG` | - | Path to a TOML config file |
//! | `ENVIRONMENT` | `development` | Deployment environment |
//! | `SERVICE_NAME` | `auth-service` | Logical name registered for discovery |
//! | `SERVICE_ADDRESS` | `127.0.0.1:50051` | `host:port` to bind and register |
//! | `SERVICE_INSTANCE_ID` | `{SERVICE_NAME}-1` | Registry instance id |
//! | `ACCESS_TOKEN_SECRET` | - | Access token signing secret (required) |
//! | `REFRESH_TOKEN_SECRET` | - | Refresh token signing secret (required) |
//! | `ACCESS_TOKEN_EXPIRES_IN` | `15m` | Access token lifetime |
//! | `REFRESH_TOKEN_EXPIRES_IN` | `7d` | Refresh token lifetime |
//! | `TOKEN_ISSUER` | `optimize-api` | Issuer and audience claim |
//! | `MONGO_URI` | `mongodb://localhost:27017` | MongoDB connection URI |
//! | `MONGO_DB` | `auth` | MongoDB database name |
//! | `CONSUL_ADDRESS` | `http://127.0.0.1:8500` | Consul agent address |
//! | `LAST_LOGIN_BEST_EFFORT` | `false` | Sign in even if last login cannot be stored |
//! | `RUST_LOG` | `info` | Log level |
//! | `LOG_FORMAT` | `text` | `json` for structured logs |

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use mongodb::{bson::doc, options::ClientOptions, Client, Database};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use oa_auth::{
    initialize_indexes, Argon2Config, AuthPolicy, AuthService, HealthState, JwtAuthenticator,
    MongoHealthChecker, MongoIdentityStore, MongoSessionStore, MongoUserStore, PasswordService,
    TokenSettings,
};
use oa_common::logging::init_logging;
use oa_config::{AuthServiceConfig, ConfigLoader, MongoConfig};
use oa_discovery::{ConsulRegistry, HealthCheckSpec, ServiceRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("oa-auth-service");

    let config = ConfigLoader::new().load_auth_service()?;
    info!(
        environment = %config.environment,
        service_name = %config.service.name,
        address = %config.service.address,
        "Starting auth service"
    );

    let db = connect_mongo(&config.mongodb).await?;
    initialize_indexes(&db).await?;

    let service = build_auth_service(&config, &db)?;
    let health = HealthState::new(Some(env!("CARGO_PKG_VERSION").to_string()))
        .with_checker(Arc::new(MongoHealthChecker { db: db.clone() }));

    let app = oa_auth::rpc::router(Arc::new(service), health).layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&config.service.address).await?;
    info!(address = %config.service.address, "RPC server listening");

    let registry = ConsulRegistry::new(config.consul.base_url(), config.consul.request_timeout())?;
    let instance_id = config.service.instance_id();
    let check = HealthCheckSpec::default()
        .with_interval(Duration::from_secs(config.health_check.interval_secs))
        .with_timeout(Duration::from_secs(config.health_check.timeout_secs))
        .with_deregister_after(Duration::from_secs(config.health_check.deregister_after_secs));
    registry
        .register(&instance_id, &config.service.name, &config.service.address, check)
        .await?;
    info!(instance_id = %instance_id, "Registered with Consul");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Shutdown signal received...");

    if let Err(e) = registry.deregister(&instance_id, &config.service.name).await {
        warn!(instance_id = %instance_id, error = %e, "Failed to deregister from Consul");
    }

    info!("Auth service shutdown complete");
    Ok(())
}

async fn connect_mongo(config: &MongoConfig) -> Result<Database> {
    info!(database = %config.database, "Connecting to MongoDB");

    let mut options = ClientOptions::parse(&config.uri).await?;
    options.connect_timeout = Some(config.connect_timeout());
    options.server_selection_timeout = Some(config.connect_timeout());

    let client = Client::with_options(options)?;
    let db = client.database(&config.database);
    db.run_command(doc! { "ping": 1 }).await?;

    info!("Connected to MongoDB");
    Ok(db)
}

fn build_auth_service(config: &AuthServiceConfig, db: &Database) -> Result<AuthService> {
    let passwords = PasswordService::new(Argon2Config {
        memory_cost: config.argon2.memory_cost_kib,
        time_cost: config.argon2.time_cost,
        parallelism: config.argon2.parallelism,
        ..Argon2Config::default()
    })?;

    let tokens = TokenSettings {
        access_secret: config.token.access_token_secret.clone(),
        refresh_secret: config.token.refresh_token_secret.clone(),
        access_ttl: config.token.access_token_ttl(),
        refresh_ttl: config.token.refresh_token_ttl(),
        issuer: config.token.issuer.clone(),
    };

    let service = AuthService::new(
        Arc::new(MongoUserStore::new(db)),
        Arc::new(MongoIdentityStore::new(db)),
        Arc::new(MongoSessionStore::new(db)),
        Arc::new(JwtAuthenticator::new(&config.token.issuer)),
        Arc::new(passwords),
        tokens,
    )
    .with_policy(AuthPolicy {
        last_login_best_effort: config.auth.last_login_best_effort,
    });

    info!("Auth services initialized");
    Ok(service)
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
