//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use axum::{
    Extension, Router, http,
    http::{Method, header},
};
use kernel::clock::SystemClock;
use kernel::principal::{Principal, UserRole};
use platform::client::TrustedProxies;
use platform::crypto::from_base64;
use platform::password::ClearTextPassword;
use platform::token::{HmacTokenService, TokenConfig};
use realtime::{
    Broadcaster, ConnectionRegistry, GatewayState, InMemorySnapshotSource, MessageRouter,
    RealtimeConfig, Services, realtime_api_router, realtime_router,
};
use security::{
    AbuseTracker, AlertLog, InMemoryCredentialRepository, SecurityAppState, SecurityConfig,
    TracingAlertNotifier, auth_router, guard_api, security_router, spawn_sweeper,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "api=info,security=info,realtime=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let clock = SystemClock::shared();

    // Configuration
    let (security_config, realtime_config) = if cfg!(debug_assertions) {
        (SecurityConfig::development(), RealtimeConfig::development())
    } else {
        (SecurityConfig::default(), RealtimeConfig::default())
    };
    let token_config = load_token_config()?;
    let trusted_proxies = load_trusted_proxies()?;

    // Security services
    let alerts = Arc::new(AlertLog::new(
        security_config.alert_capacity,
        clock.clone(),
        Arc::new(TracingAlertNotifier),
    ));
    let tracker = Arc::new(AbuseTracker::new(
        Arc::new(security_config.clone()),
        clock.clone(),
        alerts.clone(),
    ));
    let tokens = Arc::new(HmacTokenService::new(token_config, clock.clone()));
    let credentials = Arc::new(InMemoryCredentialRepository::new());
    seed_admin(&credentials)?;

    // Realtime services
    let registry = Arc::new(ConnectionRegistry::new(clock.clone()));
    let services = Services {
        registry: registry.clone(),
        broadcaster: Arc::new(Broadcaster::new(registry.clone(), clock.clone())),
        snapshots: Arc::new(InMemorySnapshotSource::new(clock.clone())),
        alerts: alerts.clone(),
        clock: clock.clone(),
    };
    let message_router = Arc::new(MessageRouter::with_builtin_handlers(services));
    let gateway = GatewayState::new(
        message_router,
        tracker.clone(),
        tokens.clone(),
        realtime_config,
    );

    // Background sweeper
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = spawn_sweeper(tracker.clone(), alerts, &security_config, shutdown_rx);

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router
    let security_state = SecurityAppState::new(tracker.clone(), tokens.clone());
    let api = Router::new()
        .nest("/auth", auth_router(credentials, tracker, tokens))
        .nest("/security", security_router(security_state.clone()))
        .nest(
            "/realtime",
            realtime_api_router(registry, security_state.clone()),
        );

    let app = Router::new()
        .nest("/api", guard_api(api, security_state))
        .merge(realtime_router(gateway))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(trusted_proxies));

    // Start server
    let addr: SocketAddr = env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:31113".to_string())
        .parse()
        .context("BIND_ADDR must be a socket address")?;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "Sweeper task ended abnormally");
    }
    tracing::info!("Server stopped");

    Ok(())
}

fn load_token_config() -> anyhow::Result<TokenConfig> {
    let mut config = match env::var("TOKEN_SECRET") {
        Ok(secret_b64) => {
            let secret_bytes = from_base64(secret_b64.trim())
                .context("TOKEN_SECRET must be base64")?;
            let secret: [u8; 32] = secret_bytes
                .try_into()
                .map_err(|_| anyhow::anyhow!("TOKEN_SECRET must decode to 32 bytes"))?;
            TokenConfig {
                secret,
                ..TokenConfig::default()
            }
        }
        Err(_) if cfg!(debug_assertions) => {
            tracing::warn!("TOKEN_SECRET not set, using a random development secret");
            TokenConfig::development()
        }
        Err(_) => bail!("TOKEN_SECRET must be set in production"),
    };

    if let Ok(ttl) = env::var("TOKEN_TTL_SECS") {
        let secs: u64 = ttl.parse().context("TOKEN_TTL_SECS must be an integer")?;
        config.ttl = Duration::from_secs(secs);
    }

    Ok(config)
}

/// Reverse proxies whose X-Forwarded-For is honoured (none by default)
fn load_trusted_proxies() -> anyhow::Result<TrustedProxies> {
    let proxies = match env::var("TRUSTED_PROXIES") {
        Ok(list) => TrustedProxies::parse(&list)
            .context("TRUSTED_PROXIES must be a comma-separated IP list")?,
        Err(_) => TrustedProxies::default(),
    };
    if proxies.is_empty() {
        tracing::info!("No trusted proxies, clients are keyed on the socket peer");
    }
    Ok(proxies)
}

fn seed_admin(credentials: &InMemoryCredentialRepository) -> anyhow::Result<()> {
    let (Ok(email), Ok(password)) = (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD")) else {
        tracing::warn!("ADMIN_EMAIL/ADMIN_PASSWORD not set, no account can sign in");
        return Ok(());
    };

    let password = ClearTextPassword::new(password).context("ADMIN_PASSWORD rejected")?;
    credentials
        .insert(&email, &password, Principal::new("admin", UserRole::SuperAdmin))
        .context("Failed to seed admin account")?;
    tracing::info!(email = %email, "Admin account seeded");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
