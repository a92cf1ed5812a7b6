//! Axum REST API handlers

use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    extract::{State, Multipart, DefaultBodyLimit},
    extract::multipart::{MultipartError, MultipartRejection},
    handler::HandlerWithoutStateExt,
    http::StatusCode,
    response::Json,
};
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::engine::LandmarkExtractor;
use crate::service::{PredictError, SignService};

use super::dto::*;

/// Multipart field carrying the image
const FRAME_FIELD: &str = "frame";

/// Frontend files served from the root of the frontend directory
const FRONTEND_FILES: [&str; 3] = ["index.html", "script.js", "style.css"];

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Application state shared across handlers
pub struct AppState<E: LandmarkExtractor> {
    pub service: Arc<SignService<E>>,
}

/// Create the REST API router
pub fn create_rest_router<E: LandmarkExtractor>(state: Arc<AppState<E>>, server: &ServerConfig) -> Router {
    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/predict", post(predict_handler::<E>));

    let router = if server.frontend_dir.is_dir() {
        info!("Serving frontend from {}", server.frontend_dir.display());
        with_frontend(router, &server.frontend_dir)
    } else {
        warn!("Frontend directory {} not found, serving API only", server.frontend_dir.display());
        router.route("/", get(api_info_handler))
    };

    router
        .fallback(not_found_handler)
        // Middleware
        .layer(DefaultBodyLimit::max(server.max_upload_mb * 1024 * 1024))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Index, the fixed frontend files and everything under `assets/`
fn with_frontend<S: Clone + Send + Sync + 'static>(router: Router<S>, dir: &Path) -> Router<S> {
    let mut router = router.route_service("/", ServeFile::new(dir.join("index.html")));
    for file in FRONTEND_FILES {
        router = router.route_service(&format!("/{}", file), ServeFile::new(dir.join(file)));
    }

    // ServeDir refuses paths that escape the directory
    router.nest_service(
        "/assets",
        ServeDir::new(dir.join("assets")).not_found_service(not_found_handler.into_service()),
    )
}

/// Predict handler
async fn predict_handler<E: LandmarkExtractor>(
    State(state): State<Arc<AppState<E>>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let missing_frame = || (StatusCode::BAD_REQUEST, Json(ErrorResponse::new("missing frame")));

    // Non-multipart bodies cannot carry a frame
    let mut multipart = multipart.map_err(|_| missing_frame())?;

    let mut frame: Option<Vec<u8>> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some(FRAME_FIELD) {
            frame = Some(field.bytes().await.map_err(multipart_error)?.to_vec());
            break;
        }
    }

    let frame = frame.ok_or_else(missing_frame)?;

    let outcome = state.service.predict(frame).await.map_err(|e| match e {
        PredictError::InvalidImage => {
            (StatusCode::BAD_REQUEST, Json(ErrorResponse::new("invalid image")))
        }
        PredictError::Internal(message) => {
            error!("Prediction failed: {}", message);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::new(&message)))
        }
    })?;

    Ok(Json(PredictResponse::from(outcome)))
}

fn multipart_error(e: MultipartError) -> ApiError {
    (e.status(), Json(ErrorResponse::new(&e.body_text())))
}

/// Health check
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn api_info_handler() -> Json<ApiInfoResponse> {
    Json(ApiInfoResponse {
        message: "ASL Translator API",
        docs: "/health, POST /predict",
    })
}

async fn not_found_handler() -> ApiError {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new("Not found")))
}
