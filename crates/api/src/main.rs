use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::BTreeMap;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tipster_core::learning::{ErrorAnalysis, Learnings};
use tipster_core::storage;
use tipster_core::storage::predictions::StoredBatch;
use tipster_core::tracking::{
    breakdown_by_bet_type, breakdown_by_competition, weekly_stats, Breakdown, PerformanceStats,
    PredictionRecord, WeeklyStats,
};

const RECENT_ANALYSES: i64 = 20;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = tipster_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();
    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let app = router(AppState {
        pool,
        timezone_offset_hours: settings.timezone_offset_hours,
    });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/predictions/latest", get(get_latest_predictions))
        .route("/predictions/:date", get(get_predictions_by_date))
        .route("/stats", get(get_stats))
        .route("/stats/bet-types", get(get_stats_by_bet_type))
        .route("/stats/competitions", get(get_stats_by_competition))
        .route("/stats/weekly", get(get_weekly_stats))
        .route("/learnings", get(get_learnings))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    pool: Option<PgPool>,
    timezone_offset_hours: i32,
}

impl AppState {
    fn pool(&self) -> Result<&PgPool, StatusCode> {
        self.pool.as_ref().ok_or(StatusCode::SERVICE_UNAVAILABLE)
    }
}

fn internal_error(e: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&e);
    tracing::error!(error = %e, "request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

fn parse_date(s: &str) -> Result<NaiveDate, StatusCode> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| StatusCode::BAD_REQUEST)
}

async fn get_latest_predictions(
    State(state): State<AppState>,
) -> Result<Json<StoredBatch>, StatusCode> {
    let pool = state.pool()?;
    let stored = storage::predictions::load_latest(pool)
        .await
        .map_err(internal_error)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(stored))
}

async fn get_predictions_by_date(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<StoredBatch>, StatusCode> {
    let pool = state.pool()?;
    let date = parse_date(&date)?;
    let stored = storage::predictions::load_for_date(pool, date)
        .await
        .map_err(internal_error)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(stored))
}

async fn load_records(state: &AppState) -> Result<Vec<PredictionRecord>, StatusCode> {
    let pool = state.pool()?;
    storage::performance::list_all(pool)
        .await
        .map_err(internal_error)
}

async fn get_stats(State(state): State<AppState>) -> Result<Json<PerformanceStats>, StatusCode> {
    let records = load_records(&state).await?;
    Ok(Json(PerformanceStats::compute(&records)))
}

async fn get_stats_by_bet_type(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, Breakdown>>, StatusCode> {
    let records = load_records(&state).await?;
    Ok(Json(breakdown_by_bet_type(&records)))
}

async fn get_stats_by_competition(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, Breakdown>>, StatusCode> {
    let records = load_records(&state).await?;
    Ok(Json(breakdown_by_competition(&records)))
}

async fn get_weekly_stats(State(state): State<AppState>) -> Result<Json<WeeklyStats>, StatusCode> {
    let records = load_records(&state).await?;
    let today = tipster_core::config::local_today(state.timezone_offset_hours).map_err(internal_error)?;
    Ok(Json(weekly_stats(&records, today)))
}

#[derive(Debug, Serialize)]
struct ApiLearnings {
    learnings: Learnings,
    summary: String,
    recent_analyses: Vec<ErrorAnalysis>,
}

async fn get_learnings(State(state): State<AppState>) -> Result<Json<ApiLearnings>, StatusCode> {
    let pool = state.pool()?;
    let learnings = storage::learnings::load_learnings(pool)
        .await
        .map_err(internal_error)?;
    let recent_analyses = storage::learnings::list_analyses(pool, RECENT_ANALYSES)
        .await
        .map_err(internal_error)?;
    Ok(Json(ApiLearnings {
        summary: learnings.summary(),
        learnings,
        recent_analyses,
    }))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &tipster_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
