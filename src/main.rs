use std::{net::SocketAddr, sync::Arc, time::Duration};

use http::HeaderValue;
use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use tracing::{error, info, warn};

use workshop_api::{
    auth::{AuthConfig, AuthService},
    config::{self, AppConfig},
    db,
    handlers::AppServices,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::load_config()?;
    config::init_tracing(&cfg.log_level, cfg.log_json);

    let pool = db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        db::run_migrations(&pool).await?;
    }
    let pool = Arc::new(pool);

    let auth = Arc::new(AuthService::new(AuthConfig::new(
        cfg.jwt_secret.clone(),
        Duration::from_secs(cfg.jwt_expiration as u64),
    )));
    let state = AppState {
        services: AppServices::new(pool.clone(), &cfg)?,
        db: pool,
        config: cfg.clone(),
    };

    let app = workshop_api::app_router(state, auth)
        .layer(CompressionLayer::new())
        .layer(cors_layer(&cfg)?);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, environment = %cfg.environment, "workshop-api listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Explicit origins win; permissive CORS only where the config allows it.
fn cors_layer(cfg: &AppConfig) -> Result<CorsLayer, String> {
    let origins: Vec<HeaderValue> = cfg
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        return Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any));
    }
    if cfg.should_allow_permissive_cors() {
        warn!("no CORS origins configured, allowing any origin");
        return Ok(CorsLayer::permissive());
    }
    Err("set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true".to_string())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
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
    info!("draining connections");
}
