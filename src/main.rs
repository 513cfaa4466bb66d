use anyhow::Context;
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod auth;
mod config;
mod db;
mod dto;
mod error;
mod handlers;
mod models;
mod services;
mod store;

use auth::identity::IdentityStore;
use auth::jwt::JwtBackendSession;
use auth::rate_limit::{spawn_rate_limit_cleanup_worker, RateLimitState};
use auth::session::{BackendSession, SessionManager};
use config::Config;
use services::analysis::AnalysisClient;
use store::local::{FileStorage, LocalStorage};
use store::records::{spawn_trash_cleanup_worker, RecordStore};
use store::remote::RecordCollection;
use store::reports::ReportCache;
use store::settings::SettingsStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub records: Arc<RecordStore>,
    pub reports: Arc<ReportCache>,
    pub settings: Arc<SettingsStore>,
    pub session: Arc<SessionManager>,
    pub analysis: AnalysisClient,
    pub remote: Option<Arc<dyn RecordCollection>>,
    pub rate_limiter: RateLimitState,
}

async fn build_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let files = FileStorage::open(config.data_dir.clone())
        .with_context(|| format!("Failed to open data dir {}", config.data_dir.display()))?;
    tracing::info!(dir = %files.dir().display(), "Local storage ready");
    let storage: Arc<dyn LocalStorage> = Arc::new(files);

    let remote: Option<Arc<dyn RecordCollection>> = match &config.database_url {
        Some(url) => {
            let db = db::create_pool(url)
                .await
                .context("Failed to connect to database")?;
            db::run_migrations(&db)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database migrations applied");
            Some(Arc::new(db::PgRecordCollection::new(db)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; cloud sync disabled");
            None
        }
    };

    let identity = Arc::new(IdentityStore::new(storage.clone()));
    let backend: Arc<dyn BackendSession> = Arc::new(JwtBackendSession::new(
        config.session_secret.clone(),
        config.session_ttl_secs,
    ));

    let mut builder = RecordStore::builder(storage.clone(), identity.clone(), backend.clone())
        .offset(config.utc_offset());
    if let Some(remote) = &remote {
        builder = builder.remote(remote.clone());
    }
    let records = Arc::new(builder.build());

    let session = Arc::new(SessionManager::new(
        backend,
        identity,
        records.clone(),
        config.cloud_enabled(),
    ));

    let analysis = AnalysisClient::from_config(&config).context("Failed to build analysis client")?;
    if !analysis.has_api_key() {
        tracing::warn!("DEEPSEEK_API_KEY not set; mood analysis will fail");
    }

    Ok(AppState {
        config,
        records,
        reports: Arc::new(ReportCache::new(storage.clone())),
        settings: Arc::new(SettingsStore::new(storage)),
        session,
        analysis,
        remote,
        rate_limiter: RateLimitState::new(),
    })
}

fn cors_layer(config: &Config) -> CorsLayer {
    let mut origins: Vec<axum::http::HeaderValue> = Vec::new();
    match config.frontend_url.parse::<axum::http::HeaderValue>() {
        Ok(hv) => origins.push(hv),
        Err(_) => tracing::warn!(url = %config.frontend_url, "FRONTEND_URL is not a valid origin"),
    }
    // In dev, also allow LAN access (e.g. testing from another device)
    if let Ok(extra) = std::env::var("CORS_EXTRA_ORIGINS") {
        for o in extra.split(',') {
            if let Ok(hv) = o.trim().parse::<axum::http::HeaderValue>() {
                origins.push(hv);
            }
        }
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(true)
}

fn build_router(state: AppState) -> Router {
    // The relay spends upstream quota, so it is limited per client IP
    let analysis_routes = Router::new()
        .route("/api/analyze-mood", post(handlers::analysis::analyze_mood))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::rate_limit::rate_limit_analysis,
        ));

    let journal_routes = Router::new()
        // Records
        .route(
            "/api/records",
            get(handlers::records::list_records).post(handlers::records::create_record),
        )
        .route(
            "/api/records/:id",
            put(handlers::records::update_record).delete(handlers::records::delete_record),
        )
        .route("/api/records/:id/restore", post(handlers::records::restore_record))
        .route(
            "/api/records/:id/permanent",
            delete(handlers::records::permanent_delete),
        )
        .route("/api/records/batch-delete", post(handlers::records::batch_delete))
        // Trash & sync
        .route("/api/trash", get(handlers::records::list_trash))
        .route("/api/trash/cleanup", post(handlers::records::cleanup_trash))
        .route("/api/sync", post(handlers::records::sync))
        // Mood state
        .route("/api/mood-state", get(handlers::mood::get_mood_state))
        .route(
            "/api/mood-state/current-score",
            put(handlers::mood::set_current_score),
        )
        .route("/api/mood-state/baseline", post(handlers::mood::set_baseline))
        .route("/api/mood-state/reset-daily", post(handlers::mood::reset_daily))
        // Weeks, stats & classification
        .route("/api/weeks/:year", get(handlers::stats::get_weeks))
        .route("/api/weeks/:year/:week", get(handlers::stats::get_week))
        .route("/api/stats/distribution", get(handlers::stats::distribution))
        .route("/api/stats/records", get(handlers::stats::records))
        .route("/api/calendar", get(handlers::stats::calendar))
        .route("/api/classify/:score", get(handlers::stats::classify_score))
        // Reports
        .route("/api/reports", get(handlers::reports::list_reports))
        .route(
            "/api/reports/:year/:week",
            get(handlers::reports::get_report)
                .put(handlers::reports::save_report)
                .delete(handlers::reports::delete_report),
        )
        // Settings
        .route("/api/settings", get(handlers::settings::get_settings))
        .route(
            "/api/settings/audio-mode",
            put(handlers::settings::set_audio_mode),
        )
        .route(
            "/api/settings/audio/toggle",
            post(handlers::settings::toggle_audio),
        )
        // Session
        .route("/api/session", get(handlers::session::get_session))
        .route("/api/session/login", post(handlers::session::login))
        .route("/api/session/logout", post(handlers::session::logout));

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz));

    let cors = cors_layer(&state.config);

    Router::new()
        .merge(public_routes)
        .merge(journal_routes)
        .merge(analysis_routes)
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mood_journal_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Arc::new(Config::from_env()?);
    let state = build_state(config.clone()).await?;

    // Restore the saved identity and pull its records before serving
    if let Some(user) = state.session.init_auth().await {
        tracing::info!(uid = %user.uid, "Resuming soft session");
    }
    let outcome = state.records.sync_from_cloud().await;
    tracing::info!(outcome = ?outcome, "Startup sync finished");

    spawn_trash_cleanup_worker(
        state.records.clone(),
        Duration::from_secs(config.trash_sweep_interval_secs.max(1)),
    );
    spawn_rate_limit_cleanup_worker(state.rate_limiter.clone());

    let app = build_router(state);

    let addr = config.listen_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    // Use into_make_service_with_connect_info to provide client IP for rate limiting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
