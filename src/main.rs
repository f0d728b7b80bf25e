//! Marquee - movie catalog backend
//! Mission: Authenticate every request and keep revoked tokens out

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::{net::TcpListener, time::interval};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marquee_backend::{
    api::build_router,
    auth::{AuthService, JwtHandler, MemoryTokenCache, RevocationCache, UserDirectory, UserStore},
    config::{load_env, AppConfig},
    middleware::{LoggingConfig, ThrottleLayer},
};

#[derive(Parser, Debug)]
#[command(name = "marquee")]
#[command(about = "Movie catalog API server with token authentication")]
struct Args {
    /// Listen address (overrides BIND_ADDR)
    #[arg(long)]
    bind: Option<String>,

    /// SQLite user database path (overrides AUTH_DB_PATH)
    #[arg(long)]
    db_path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let args = Args::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(db_path) = args.db_path {
        config.db_path = db_path;
    }

    info!("Marquee backend starting");

    let users: Arc<dyn UserDirectory> = Arc::new(UserStore::new(&config.db_path)?);
    let jwt = Arc::new(JwtHandler::new(
        config.access_token_secret.clone(),
        config.refresh_token_secret.clone(),
    ));
    let token_cache = Arc::new(MemoryTokenCache::new());
    let auth = AuthService::new(
        users,
        jwt,
        RevocationCache::new(token_cache.clone()),
        config.hash_rounds,
    );

    info!(
        db_path = %config.db_path,
        hash_rounds = config.hash_rounds,
        "Authentication initialized"
    );

    if let Some(admin) = &config.bootstrap_admin {
        auth.ensure_admin(&admin.email, admin.password.clone())
            .await
            .context("Failed to create bootstrap admin")?;
    } else {
        warn!("BOOTSTRAP_ADMIN_EMAIL not set - admin routes unreachable until an admin exists");
    }

    let (app, throttle) = build_router(
        auth,
        LoggingConfig {
            slow_request: config.slow_request,
        },
    );

    spawn_housekeeping(token_cache, throttle, config.cache_sweep_interval);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("API server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Periodically drop expired cache entries and stale throttle windows
fn spawn_housekeeping(
    token_cache: Arc<MemoryTokenCache>,
    throttle: ThrottleLayer,
    every: std::time::Duration,
) {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        loop {
            ticker.tick().await;
            let purged = token_cache.purge_expired();
            if purged > 0 || !token_cache.is_empty() {
                debug!(purged, cached = token_cache.len(), "Token cache sweep");
            }
            throttle.cleanup();
        }
    });
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marquee_backend=debug,marquee=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
