use std::sync::Arc;

use algodatta_api::broker::InMemoryBrokerStore;
use algodatta_api::broker::SqliteBrokerStore;
use algodatta_api::server;
use algodatta_api::server::AppState;
use algodatta_api::BrokerStore;
use algodatta_api::KeyProvider;
use algodatta_api::OAuthClient;
use algodatta_api::Settings;
use algodatta_api::TokenVerifier;
use anyhow::Context;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let settings = Settings::from_env().context("failed to load settings")?;

    let key_provider = Arc::new(KeyProvider::new(&settings.verifier_config())?);
    let verifier = TokenVerifier::with_key_provider(key_provider.clone(), &settings.client_id)?;
    let refresh_task = settings
        .jwks_refresh_interval
        .map(|every| key_provider.spawn_refresh_task(every));

    let brokers: Arc<dyn BrokerStore> = match &settings.database_url {
        Some(url) => Arc::new(
            SqliteBrokerStore::connect(url)
                .await
                .context("failed to open broker database")?,
        ),
        None => {
            warn!("DATABASE_URL not set, broker link is kept in memory only");
            Arc::new(InMemoryBrokerStore::default())
        }
    };

    let oauth = OAuthClient::new(
        &settings.cognito_domain,
        &settings.client_id,
        &settings.redirect_uri,
    )?;

    let state = AppState {
        verifier: Arc::new(verifier),
        oauth: Arc::new(oauth),
        brokers,
        cookie_secure: settings.cookie_secure,
    };
    let app = server::router(state, &settings.cors_origins)?;

    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
    info!(
        addr = %settings.bind_addr,
        jwks_url = key_provider.jwks_url(),
        "algodatta-api listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = refresh_task {
        handle.abort();
    }
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            warn!(%error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to install SIGTERM handler");
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
    info!("shutdown signal received");
}
