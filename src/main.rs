use std::net::SocketAddr;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use quill::auth::session::create_session;
use quill::config::{Cli, Config};
use quill::db;
use quill::error::AppResult;
use quill::routes;
use quill::state::AppState;

const SEED_USERNAME: &str = "testuser";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    let state = AppState::new(pool, config.clone())?;
    match state.feed.cache().default_ttl() {
        Some(ttl) => tracing::info!("Feed page cache TTL: {}s", ttl.as_secs()),
        None => tracing::info!("Feed page cache disabled"),
    }

    let mut app = routes::app(state.clone());

    // Test-only seed endpoint: creates a user + session, returns session cookie
    if std::env::var("QUILL_TEST_SEED").is_ok() {
        let seed = Router::new()
            .route("/test/seed", get(test_seed))
            .layer(TraceLayer::new_for_http())
            .with_state(state);
        app = app.merge(seed);
    }

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Test-only: seed a user + session and return the session cookie.
/// Only mounted when QUILL_TEST_SEED env var is set.
async fn test_seed(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    // May already exist from a previous seed call
    let user = match state.store.find_user_by_username(SEED_USERNAME).await? {
        Some(user) => user,
        None => state.store.create_user(SEED_USERNAME).await?,
    };

    let token = create_session(&state.db, user.id, state.config.auth.session_hours)?;
    let cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age=3600",
        state.config.auth.cookie_name, token
    );

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        format!("user_id={} username={}", user.id, user.username),
    ))
}
