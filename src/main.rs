//! QuizLive Back binary entrypoint wiring the REST and SSE layers to the session core.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizlive_back::{
    config::AppConfig,
    dao::session_store::{FileSessionStore, InMemorySessionStore, SessionStore},
    routes,
    services::{session_service, sse_service, storage_supervisor},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let store = open_store(&config).await?;
    let app_state = AppState::new(config, store);
    match session_service::restore_sessions(&app_state).await {
        Ok(restored) => info!(restored, "stored sessions restored"),
        Err(err) => {
            warn!(error = %err, "failed to restore stored sessions");
            app_state.update_degraded(true);
        }
    }

    tokio::spawn(storage_supervisor::run(app_state.clone()));
    tokio::spawn(sse_service::relay_degraded_status(app_state.clone()));

    let app = build_router(app_state.clone());

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

    // Cancel outstanding timers and write final snapshots.
    let ended_sessions = session_service::end_all(&app_state).await;
    info!(ended_sessions, "server stopped");

    Ok(())
}

/// Pick the session store: JSON files when a data directory is configured, memory otherwise.
async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn SessionStore>> {
    match &config.data_dir {
        Some(dir) => {
            let store = FileSessionStore::open(dir.clone())
                .await
                .with_context(|| format!("opening session store at {}", dir.display()))?;
            info!(dir = %store.dir().display(), "persisting sessions to disk");
            Ok(Arc::new(store))
        }
        None => {
            info!("no data directory configured; sessions are kept in memory");
            Ok(Arc::new(InMemorySessionStore::new()))
        }
    }
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

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
