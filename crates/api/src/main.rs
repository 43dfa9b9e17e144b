use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use radar_core::report::ReportState;
use radar_core::session::{Dashboard, DashboardSession};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = radar_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let session = DashboardSession::from_settings(settings).map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        e
    })?;
    if !session.report_enabled() {
        tracing::warn!("starting API without report generation (degraded mode)");
    }

    let state = AppState {
        session: Arc::new(session),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/dashboard", get(get_dashboard))
        .route("/dashboard/refresh", post(refresh_dashboard))
        .route("/dashboard/cache", delete(clear_cache))
        .route("/prompt", get(get_prompt))
        .route(
            "/report",
            post(trigger_report).get(get_report).delete(cancel_report),
        )
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http());

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

    state.session.cancel_report();
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    session: Arc<DashboardSession>,
}

#[derive(Debug, Deserialize)]
struct DateQuery {
    as_of_date: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReportAccepted {
    request_id: Uuid,
    as_of_date: NaiveDate,
}

async fn get_dashboard(State(state): State<AppState>) -> Json<Dashboard> {
    Json(state.session.render().await)
}

async fn refresh_dashboard(State(state): State<AppState>) -> Json<Dashboard> {
    Json(state.session.refresh().await)
}

async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    state.session.clear_cache();
    StatusCode::NO_CONTENT
}

async fn get_prompt(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<String, StatusCode> {
    let as_of_date = report_date(&state, &query)?;
    ensure_rendered(&state).await;
    Ok(state.session.prompt(as_of_date))
}

async fn trigger_report(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<(StatusCode, Json<ReportAccepted>), StatusCode> {
    if !state.session.report_enabled() {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    let as_of_date = report_date(&state, &query)?;
    ensure_rendered(&state).await;

    let request_id = state.session.trigger_report(as_of_date).map_err(|e| {
        tracing::error!(error = %e, "report trigger failed");
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ReportAccepted {
            request_id,
            as_of_date,
        }),
    ))
}

async fn get_report(State(state): State<AppState>) -> Result<Json<ReportState>, StatusCode> {
    if !state.session.report_enabled() {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(state.session.report_state()))
}

async fn cancel_report(State(state): State<AppState>) -> StatusCode {
    if !state.session.report_enabled() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    state.session.cancel_report();
    StatusCode::NO_CONTENT
}

fn report_date(state: &AppState, query: &DateQuery) -> Result<NaiveDate, StatusCode> {
    radar_core::time::resolve_report_date(
        query.as_of_date.as_deref(),
        Utc::now(),
        state.session.settings().utc_offset_hours,
    )
    .map_err(|_| StatusCode::BAD_REQUEST)
}

/// Prompts are built from the last render; make sure there is one.
async fn ensure_rendered(state: &AppState) {
    if state.session.last_rendered().is_empty() {
        state.session.render().await;
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &radar_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
