use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tracelink::analytics::{GeoIpService, GeoLocator, NoopLocator};
use tracelink::app::App;
use tracelink::config::{AuthMode, Config};
use tracelink::{shutdown, storage};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Loaded configuration");

    let storage = storage::connect(&config.database, &config.cache).await?;
    info!("Database initialized successfully");

    let locator: Arc<dyn GeoLocator> = match config.geo.geoip_city_db_path.as_deref() {
        Some(path) => match GeoIpService::new(path) {
            Ok(service) => {
                info!("GeoIP city database loaded from {}", path);
                Arc::new(service)
            }
            Err(err) => {
                warn!(error = ?err, "GeoIP database unavailable, visits are recorded without network location");
                Arc::new(NoopLocator)
            }
        },
        None => {
            info!("No GEOIP_CITY_DB_PATH set, visits are recorded without network location");
            Arc::new(NoopLocator)
        }
    };

    match config.auth.mode {
        AuthMode::None => info!("Authentication is disabled - all API requests are allowed"),
        AuthMode::ApiKey => info!(
            owners = config.auth.api_keys.len(),
            "API key authentication enabled"
        ),
    }

    let app = App::new(&config, storage, locator);

    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("Failed to bind API server to {api_addr}"))?;
    info!("API server listening on http://{}", api_addr);

    let redirect_addr = format!(
        "{}:{}",
        config.redirect_server.host, config.redirect_server.port
    );
    let redirect_listener = tokio::net::TcpListener::bind(&redirect_addr)
        .await
        .with_context(|| format!("Failed to bind redirect server to {redirect_addr}"))?;
    info!("Redirect server listening on http://{}", redirect_addr);
    info!(
        "Tracking links look like {}/track/{{code}}",
        config.redirect_base_url
    );

    let token = CancellationToken::new();
    tokio::spawn(shutdown::signal_handler(token.clone()));

    let api_server = axum::serve(api_listener, app.api_router)
        .with_graceful_shutdown(token.clone().cancelled_owned());
    let redirect_server = axum::serve(
        redirect_listener,
        app.redirect_router
            .into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(token.clone().cancelled_owned());

    let served = tokio::try_join!(api_server, redirect_server);
    // A failing server takes the other one down with it
    token.cancel();
    served.context("Server error")?;

    info!(
        in_flight = app.dispatcher.in_flight(),
        "Waiting for in-flight visit recordings"
    );
    app.dispatcher.drain().await;
    if app.dispatcher.failure_count() > 0 {
        warn!(
            dropped = app.dispatcher.failure_count(),
            "Some visits could not be recorded"
        );
    }
    info!("Shutdown complete");

    Ok(())
}
