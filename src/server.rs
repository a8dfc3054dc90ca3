//!
//! certhub HTTP server
//! -------------------
//! Axum-based HTTP API over the in-memory store.
//!
//! Responsibilities:
//! - Bearer-token authentication on every request; missing or invalid tokens
//!   simply resolve to an anonymous actor and protected routes reject them.
//! - Auth endpoints (register/login/me) backed by the `auth` module.
//! - Certificate CRUD, engagement and discovery endpoints.
//! - User directory, manager reports and corpus analytics.
//! - A single collapsed 401 body for every rejection, so clients cannot tell
//!   a missing token from an expired one or from a policy denial.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::certs::{self, CertificateRequest, ListParams};
use crate::error::{AppError, AppResult};
use crate::model::Role;
use crate::policy::Actor;
use crate::store::SharedStore;
use crate::token::TokenSigner;
use crate::upload::{AssetHost, LocalAssetHost};
use crate::{analytics, auth, manager, users};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub signer: Arc<TokenSigner>,
    pub assets: Arc<dyn AssetHost>,
}

/// Runtime configuration resolved from the environment by `main`.
pub struct ServerConfig {
    pub http_port: u16,
    pub secret: Vec<u8>,
    pub token_ttl: std::time::Duration,
    pub asset_root: String,
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "certhub ok" }))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/certs", get(list_certs).post(create_cert))
        .route("/api/certs/{id}", get(get_cert).put(update_cert).delete(delete_cert))
        .route("/api/certs/{id}/like", post(like_cert))
        .route("/api/certs/author/{id}", get(certs_by_author))
        .route("/api/certs/tag/{tag}", get(certs_by_tag))
        .route("/api/certs/trending/liked", get(trending_liked))
        .route("/api/certs/trending/viewed", get(trending_viewed))
        .route("/api/certs/recent", get(recent_certs))
        .route("/api/users", get(list_users))
        .route("/api/users/units", get(units))
        .route("/api/users/job-titles", get(job_titles))
        .route("/api/users/managers", get(managers))
        .route("/api/users/{id}", get(get_user).put(update_profile))
        .route("/api/manager/unit/{unit}/members", get(unit_members))
        .route("/api/manager/unit/{unit}/certs", get(unit_certs))
        .route("/api/manager/unit/{unit}/stats", get(unit_stats))
        .route("/api/manager/unit/{unit}/export", get(export_members))
        .route("/api/manager/unit/{unit}/export/members", get(export_members))
        .route("/api/manager/unit/{unit}/export/certificates", get(export_certs))
        .route("/api/analytics/categories", get(categories))
        .route("/api/analytics/issuers", get(issuers))
        .route("/api/analytics/timeline", get(timeline))
        .route("/api/analytics/units", get(analytics_units))
        .route("/api/analytics/overview", get(overview))
        .route("/api/admin/users/{id}/role", post(set_role))
        .route("/api/admin/users/{id}/enabled", post(set_enabled))
        .with_state(state)
}

/// Start the certhub HTTP server with the given configuration.
pub async fn run_with_config(config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState {
        store: SharedStore::new(),
        signer: Arc::new(TokenSigner::new(config.secret, config.token_ttl)),
        assets: Arc::new(LocalAssetHost::new(&config.asset_root)),
    };
    let app = app_router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// Convenience entry using default port, a fresh random secret and default TTL.
// Tokens will not survive a restart; production sets CERTHUB_SECRET via `main`.
pub async fn run() -> anyhow::Result<()> {
    let mut secret = [0u8; 32];
    getrandom::getrandom(&mut secret)?;
    run_with_config(ServerConfig {
        http_port: 7878,
        secret: secret.to_vec(),
        token_ttl: std::time::Duration::from_secs(crate::token::DEFAULT_TTL_SECS),
        asset_root: "assets".to_string(),
    })
    .await
}

fn actor_of(state: &AppState, headers: &HeaderMap) -> Actor {
    let header = headers.get("authorization").and_then(|v| v.to_str().ok());
    auth::actor_from_bearer(&state.signer, header)
}

/// Every rejection gets the same anonymous 401 body. Other failures carry
/// their code and message.
fn error_response(e: &AppError) -> Response {
    if e.is_rejection() {
        return (StatusCode::UNAUTHORIZED, Json(json!({"status":"unauthorized"}))).into_response();
    }
    if matches!(e, AppError::Internal { .. } | AppError::Io { .. }) {
        error!("request failed: {e}");
    }
    let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({"status":"error","code": e.code_str(),"message": e.message()})),
    )
        .into_response()
}

fn reply<T: Serialize>(status: StatusCode, result: AppResult<T>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(e) => error_response(&e),
    }
}

fn reply_ok<T: Serialize>(result: AppResult<T>) -> Response {
    reply(StatusCode::OK, result)
}

fn csv_response(result: AppResult<Vec<u8>>, filename: &str) -> Response {
    match result {
        Ok(bytes) => (
            StatusCode::OK,
            [
                ("content-type", "text/csv".to_string()),
                (
                    "content-disposition",
                    format!("attachment; filename=\"{filename}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

// --- auth ---

async fn register(State(state): State<AppState>, Json(payload): Json<auth::RegisterRequest>) -> Response {
    reply(StatusCode::CREATED, auth::register(&state.store, &state.signer, &payload))
}

async fn login(State(state): State<AppState>, Json(payload): Json<auth::LoginRequest>) -> Response {
    reply_ok(auth::login(&state.store, &state.signer, &payload))
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(auth::current_user(&state.store, &actor))
}

// --- certificates ---

async fn list_certs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(Ok(certs::list(&state.store, &actor, &params)))
}

async fn create_cert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CertificateRequest>,
) -> Response {
    let actor = actor_of(&state, &headers);
    reply(
        StatusCode::CREATED,
        certs::create(&state.store, state.assets.as_ref(), &actor, &payload),
    )
}

async fn get_cert(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(certs::get_by_id(&state.store, &actor, &id))
}

async fn update_cert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<CertificateRequest>,
) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(certs::update(&state.store, state.assets.as_ref(), &actor, &id, &payload))
}

async fn delete_cert(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    let actor = actor_of(&state, &headers);
    match certs::delete(&state.store, &actor, &id) {
        Ok(()) => (StatusCode::OK, Json(json!({"status":"ok"}))).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn like_cert(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    let actor = actor_of(&state, &headers);
    match certs::toggle_like(&state.store, &actor, &id) {
        Ok((dto, liked)) => (StatusCode::OK, Json(json!({"liked": liked, "certificate": dto}))).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn certs_by_author(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(Ok(certs::by_author(&state.store, &actor, &id)))
}

async fn certs_by_tag(State(state): State<AppState>, headers: HeaderMap, Path(tag): Path<String>) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(Ok(certs::by_tag(&state.store, &actor, &tag)))
}

async fn trending_liked(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(Ok(certs::most_liked(&state.store, &actor)))
}

async fn trending_viewed(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(Ok(certs::most_viewed(&state.store, &actor)))
}

async fn recent_certs(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(Ok(certs::recent(&state.store, &actor)))
}

// --- user directory ---

async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<users::UserQuery>,
) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(users::list_users(&state.store, &actor, &query))
}

async fn get_user(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(users::get_user(&state.store, &actor, &id))
}

async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<users::UpdateProfileRequest>,
) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(users::update_profile(&state.store, &actor, &id, &payload))
}

async fn units(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(users::distinct_units(&state.store, &actor))
}

async fn job_titles(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(users::distinct_job_titles(&state.store, &actor))
}

async fn managers(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(users::managers(&state.store, &actor))
}

// --- manager reports ---

async fn unit_members(State(state): State<AppState>, headers: HeaderMap, Path(unit): Path<String>) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(manager::unit_members(&state.store, &actor, &unit))
}

async fn unit_certs(State(state): State<AppState>, headers: HeaderMap, Path(unit): Path<String>) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(manager::unit_certificates(&state.store, &actor, &unit))
}

async fn unit_stats(State(state): State<AppState>, headers: HeaderMap, Path(unit): Path<String>) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(manager::unit_stats(&state.store, &actor, &unit))
}

async fn export_members(State(state): State<AppState>, headers: HeaderMap, Path(unit): Path<String>) -> Response {
    let actor = actor_of(&state, &headers);
    let result = manager::export_unit_members(&state.store, &actor, &unit);
    csv_response(result, &format!("{unit}-members.csv"))
}

async fn export_certs(State(state): State<AppState>, headers: HeaderMap, Path(unit): Path<String>) -> Response {
    let actor = actor_of(&state, &headers);
    let result = manager::export_unit_certificates(&state.store, &actor, &unit);
    csv_response(result, &format!("{unit}-certificates.csv"))
}

// --- analytics ---

async fn categories(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(analytics::category_stats(&state.store, &actor))
}

async fn issuers(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(analytics::issuer_stats(&state.store, &actor))
}

async fn timeline(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(analytics::timeline_stats(&state.store, &actor))
}

async fn analytics_units(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(analytics::unit_stats(&state.store, &actor))
}

async fn overview(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(analytics::overview(&state.store, &actor))
}

// --- admin ---

#[derive(Debug, Deserialize)]
struct RolePayload {
    role: Role,
}

#[derive(Debug, Deserialize)]
struct EnabledPayload {
    enabled: bool,
}

async fn set_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<RolePayload>,
) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(users::set_role(&state.store, &actor, &id, payload.role))
}

async fn set_enabled(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<EnabledPayload>,
) -> Response {
    let actor = actor_of(&state, &headers);
    reply_ok(users::set_enabled(&state.store, &actor, &id, payload.enabled))
}
