//! HTTP surface of the dashboard: router, shared state, and handlers.
//!
//! The JSON API mirrors what the front-end consumes: a login/session
//! flow, the admin-only CSV upload and user creation, the aggregated
//! summary endpoint, and the downloadable CSV template. Front-end
//! assets are served statically; everything stateful goes through the
//! record store behind one mutex, which is never held across an await.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use log::{error, info};
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};

use crate::auth::{self, AuthError, SessionStore, User};
use crate::config::AppConfig;
use crate::ingest::{self, IngestError};
use crate::normalize::coerce_iso_date;
use crate::store::{RecordFilter, RecordStore};
use crate::summary::{self, Summary};

const SESSION_COOKIE: &str = "session";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<RecordStore>>,
    pub sessions: Arc<SessionStore>,
    pub config: Arc<AppConfig>,
}

pub async fn serve(config: AppConfig) -> Result<()> {
    let store = RecordStore::open(&config.database)?;
    store.init_schema()?;
    auth::ensure_initial_admin(&store, config.admin_code.as_deref())?;

    let bind = config.bind;
    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        sessions: Arc::new(SessionStore::default()),
        config: Arc::new(config),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Binding {bind}"))?;
    info!("Dashboard escuchando en http://{bind}");
    axum::serve(listener, app)
        .await
        .context("HTTP server terminated")?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let static_dir: PathBuf = state.config.static_dir.clone();

    Router::new()
        .route("/health", get(health))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/session", get(session_info))
        .route("/api/users", post(create_user))
        .route("/api/summary", get(api_summary))
        .route("/upload", post(upload))
        .route("/api/download-template", get(download_template))
        .fallback_service(ServeDir::new(static_dir))
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(DefaultBodyLimit::max(state.config.max_upload_bytes)),
        )
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Forbidden,
    InvalidCredentials,
    BadRequest(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Inicia sesion para continuar".to_string(),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Requiere privilegios administrativos".to_string(),
            ),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Credenciales invalidas".to_string(),
            ),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(err) => {
                error!("Request failed: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error interno del servidor".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .map(str::trim)
        .find_map(|part| {
            part.strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .map(String::from)
}

/// Resolves the session cookie to a logged-in user; 401 otherwise.
/// The JSON-API counterpart of the login gate on every dashboard page.
fn require_user(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let token = session_token(headers).ok_or(ApiError::Unauthorized)?;
    let store = state.store.lock().expect("record store poisoned");
    let user = auth::current_user(&store, &state.sessions, &token)?;
    user.ok_or(ApiError::Unauthorized)
}

/// [`require_user`] narrowed to the admin role; 403 otherwise.
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let user = require_user(state, headers)?;
    if user.is_admin() {
        Ok(user)
    } else {
        Err(ApiError::Forbidden)
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let store = state.store.lock().expect("record store poisoned");
    match auth::authenticate(&store, &state.sessions, &payload.username, &payload.password) {
        Ok((token, user)) => {
            let cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax");
            Ok((
                [(header::SET_COOKIE, cookie)],
                Json(json!({ "user": user, "message": "Bienvenido de nuevo" })),
            )
                .into_response())
        }
        Err(AuthError::InvalidCredentials) => Err(ApiError::InvalidCredentials),
        Err(AuthError::Store(err)) => Err(ApiError::Internal(err)),
        Err(err) => Err(ApiError::BadRequest(err.to_string())),
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    require_user(&state, &headers)?;
    if let Some(token) = session_token(&headers) {
        state.sessions.revoke(&token);
    }
    let cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Max-Age=0");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "message": "Sesion finalizada" })),
    )
        .into_response())
}

async fn session_info(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = require_user(&state, &headers)?;
    Ok(Json(json!({ "user": user })))
}

#[derive(Debug, Deserialize)]
struct CreateUserRequest {
    username: String,
    password: String,
    confirm: String,
    #[serde(default)]
    role: String,
}

async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Response, ApiError> {
    require_admin(&state, &headers)?;
    let store = state.store.lock().expect("record store poisoned");
    match auth::create_user(
        &store,
        &payload.username,
        &payload.password,
        &payload.confirm,
        &payload.role,
    ) {
        Ok(user) => Ok((
            StatusCode::CREATED,
            Json(json!({ "user": user, "message": "Usuario creado correctamente" })),
        )
            .into_response()),
        Err(AuthError::Store(err)) => Err(ApiError::Internal(err)),
        Err(err) => Err(ApiError::BadRequest(err.to_string())),
    }
}

#[derive(Debug, Default, Deserialize)]
struct SummaryParams {
    ubicacion: Option<String>,
    nom_sede: Option<String>,
    categoria_trab: Option<String>,
    estado: Option<String>,
    fecha_inicio: Option<String>,
    fecha_fin: Option<String>,
    nombre: Option<String>,
    hostname: Option<String>,
}

/// Blank and whitespace-only parameters mean "no constraint"; date
/// bounds additionally pass through strict ISO coercion so that a
/// non-date never reaches the range comparison.
fn record_filter(params: &SummaryParams) -> RecordFilter {
    fn clean(value: &Option<String>) -> Option<String> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
    }
    fn clean_date(value: &Option<String>) -> Option<String> {
        clean(value)
            .map(|v| coerce_iso_date(&v))
            .filter(|v| !v.is_empty())
    }

    RecordFilter {
        ubicacion: clean(&params.ubicacion),
        nom_sede: clean(&params.nom_sede),
        categoria_trab: clean(&params.categoria_trab),
        estado: clean(&params.estado),
        fecha_inicio: clean_date(&params.fecha_inicio),
        fecha_fin: clean_date(&params.fecha_fin),
        nombre: clean(&params.nombre),
        hostname: clean(&params.hostname),
    }
}

async fn api_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SummaryParams>,
) -> Result<Json<Summary>, ApiError> {
    require_user(&state, &headers)?;
    let filter = record_filter(&params);
    let store = state.store.lock().expect("record store poisoned");
    let summary = summary::build_summary(&store, &filter)?;
    Ok(Json(summary))
}

async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(&state, &headers)?;

    let mut filename: Option<String> = None;
    let mut bytes: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(format!("No se pudo leer el archivo: {err}")))?
    {
        if field.name() == Some("file") {
            filename = field.file_name().map(String::from);
            let data = field
                .bytes()
                .await
                .map_err(|err| ApiError::BadRequest(format!("No se pudo leer el archivo: {err}")))?;
            bytes = Some(data.to_vec());
        }
    }

    let has_name = filename.as_deref().is_some_and(|name| !name.is_empty());
    let Some(bytes) = bytes.filter(|_| has_name) else {
        return Err(ApiError::BadRequest("Selecciona un archivo CSV".to_string()));
    };

    let mut store = state.store.lock().expect("record store poisoned");
    let summary =
        ingest::ingest_csv(&mut store, filename.as_deref(), &bytes).map_err(|err| match err {
            IngestError::Store(err) => ApiError::Internal(err),
            other => ApiError::BadRequest(other.to_string()),
        })?;
    Ok(Json(json!({
        "summary": summary,
        "message": "Carga procesada correctamente",
    })))
}

async fn download_template(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    require_admin(&state, &headers)?;
    let body = ingest::template_csv()?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", ingest::TEMPLATE_FILE_NAME),
            ),
        ],
        body,
    )
        .into_response())
}
