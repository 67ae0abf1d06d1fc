//! Tune Race Back binary entrypoint wiring REST, WebSocket, SSE and history storage.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tune_race_back::{
    config::AppConfig,
    dao::history::{HistoryStore, memory::MemoryHistoryStore},
    providers::{
        MediaLookup, PlaylistProvider,
        catalog::CatalogProvider,
        chat::{ChatConfig, ChatPlaylistProvider},
        itunes::ItunesMediaLookup,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, Collaborators, SharedState},
};
#[cfg(any(feature = "couch-store", feature = "mongo-store"))]
use tune_race_back::dao::storage::StorageError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let client = reqwest::Client::builder()
        .user_agent(concat!("tune-race-back/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building HTTP client")?;

    let collaborators = build_collaborators(&config, client);
    let app_state = AppState::new(config, collaborators);

    start_history(&app_state).await;
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick the playlist provider and media lookup from the environment, falling
/// back to the configured catalog for both.
fn build_collaborators(config: &AppConfig, client: reqwest::Client) -> Collaborators {
    let catalog = Arc::new(CatalogProvider::new(config.catalog.clone()));

    let playlist: Arc<dyn PlaylistProvider> = if env::var_os("PLAYLIST_API_URL").is_some() {
        match ChatConfig::from_env() {
            Ok(chat) => {
                info!(model = %chat.model, "using chat-completions playlist provider");
                Arc::new(ChatPlaylistProvider::new(client.clone(), chat))
            }
            Err(err) => {
                warn!(error = %err, "chat playlist provider misconfigured; using catalog");
                catalog.clone()
            }
        }
    } else {
        info!(tracks = config.catalog.len(), "using catalog playlist provider");
        catalog.clone()
    };

    let media: Arc<dyn MediaLookup> = match env::var("MEDIA_LOOKUP").as_deref() {
        Ok("itunes") => {
            let country = env::var("ITUNES_COUNTRY").unwrap_or_else(|_| "US".into());
            info!(%country, "using iTunes media lookup");
            Arc::new(ItunesMediaLookup::new(client, country))
        }
        Ok(other) if other != "catalog" => {
            warn!(lookup = other, "unknown media lookup; using catalog");
            catalog
        }
        _ => catalog,
    };

    Collaborators { playlist, media }
}

/// Connect the configured history backend under the storage supervisor, or
/// keep history in memory when none is configured.
async fn start_history(state: &SharedState) {
    #[cfg(feature = "couch-store")]
    {
        if env::var_os("COUCH_BASE_URL").is_some() {
            info!("using CouchDB history storage");
            tokio::spawn(storage_supervisor::run(state.history().clone(), connect_couch));
            return;
        }
    }

    #[cfg(feature = "mongo-store")]
    {
        if env::var_os("MONGO_URI").is_some() {
            info!("using MongoDB history storage");
            tokio::spawn(storage_supervisor::run(state.history().clone(), connect_mongo));
            return;
        }
    }

    warn!("no history backend configured; keeping room history in memory");
    let store: Arc<dyn HistoryStore> = Arc::new(MemoryHistoryStore::new());
    state.history().install(store).await;
}

#[cfg(feature = "couch-store")]
async fn connect_couch() -> Result<Arc<dyn HistoryStore>, StorageError> {
    use tune_race_back::dao::history::couchdb::{CouchConfig, CouchHistoryStore};

    let config = CouchConfig::from_env()?;
    let store = CouchHistoryStore::connect(config).await?;
    Ok(Arc::new(store))
}

#[cfg(feature = "mongo-store")]
async fn connect_mongo() -> Result<Arc<dyn HistoryStore>, StorageError> {
    use tune_race_back::dao::history::mongodb::{MongoConfig, MongoHistoryStore};

    let config = MongoConfig::from_env().await?;
    let store = MongoHistoryStore::connect(config).await?;
    Ok(Arc::new(store))
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "cannot install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
