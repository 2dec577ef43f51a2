//! HTTP routes and handlers

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use blightcheck_core::Prediction;
use serde_json::{json, Value};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::state::AppState;

/// Liveness message returned by /ping
pub const PING_MESSAGE: &str = "Hello, I am alive";

/// Multipart field holding the uploaded image
pub const UPLOAD_FIELD: &str = "file";

pub fn create_router(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .route("/ping", get(ping))
        .route("/predict", post(predict))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Any origin, method and header, with credentials
///
/// `*` is not allowed together with credentials, so everything is mirrored
/// back from the request instead.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

async fn ping() -> Json<Value> {
    Json(json!({ "message": PING_MESSAGE }))
}

/// Classify one uploaded leaf photo
async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Prediction>, AppError> {
    let upload = read_upload(&mut multipart).await?;
    debug!(bytes = upload.len(), "Received upload");

    let prediction = state.host.predict(upload).await?;
    Ok(Json(prediction))
}

/// Find the `file` field; other fields are skipped
async fn read_upload(multipart: &mut Multipart) -> Result<Bytes, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(UPLOAD_FIELD) {
            return Ok(field.bytes().await?);
        }
    }
    Err(AppError::MissingField(UPLOAD_FIELD))
}

async fn fallback() -> AppError {
    AppError::NotFound
}

/// Error handling
#[derive(Debug)]
pub enum AppError {
    InvalidRequest(String),
    MissingField(&'static str),
    Multipart(MultipartError),
    NotFound,
    InternalError(String),
}

impl From<blightcheck_core::Error> for AppError {
    fn from(err: blightcheck_core::Error) -> Self {
        if err.is_client_error() {
            AppError::InvalidRequest(err.to_string())
        } else {
            AppError::InternalError(err.to_string())
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::Multipart(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, kind) = match self {
            AppError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg, "invalid_request_error"),
            AppError::MissingField(name) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("missing multipart field `{}`", name),
                "invalid_request_error",
            ),
            AppError::Multipart(err) => (err.status(), err.body_text(), "invalid_request_error"),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string(), "not_found"),
            AppError::InternalError(msg) => {
                error!("Prediction failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    "server_error",
                )
            }
        };

        let body = json!({
            "error": {
                "message": message,
                "type": kind,
            }
        });

        (status, Json(body)).into_response()
    }
}
