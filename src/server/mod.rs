//! Web front end: one page per browser session, translation jobs run in the
//! background and the page polls until they finish.

pub mod routes;
pub mod views;

use crate::state::{AppState, CleanupManager};
use crate::utils::{ErrorCategory, Result, VsdxTranslatorError};
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tracing::{info, warn};

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes();

    Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .route("/info", get(routes::info))
        .route("/session/{id}", get(routes::session_page))
        .route("/session/{id}/credentials", post(routes::upload_credentials))
        .route("/session/{id}/translate", post(routes::translate))
        .route("/session/{id}/progress", get(routes::progress))
        .route("/session/{id}/reset", post(routes::reset))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Serves the UI until Ctrl-C, with idle-session cleanup running alongside.
pub async fn serve(state: AppState, bind_addr: &str, port: u16) -> Result<()> {
    let cleanup_interval = Duration::from_secs(state.config.cleanup.cleanup_interval_minutes.max(1) * 60);
    CleanupManager::from_config(state.clone(), &state.config).start_background_cleanup(cleanup_interval);

    let addr = format!("{}:{}", bind_addr, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("HTTP server listening on http://{}", addr);
    info!("  GET  /                          - Open a translation session");
    info!("  GET  /session/{{id}}/progress     - Job progress as JSON");
    info!("  GET  /health                    - Health check");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

/// Handler error, rendered as an HTML error page.
#[derive(Debug)]
pub enum AppError {
    Pipeline(VsdxTranslatorError),
    BadRequest(String),
}

impl From<VsdxTranslatorError> for AppError {
    fn from(e: VsdxTranslatorError) -> Self {
        AppError::Pipeline(e)
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Pipeline(VsdxTranslatorError::SessionNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Pipeline(VsdxTranslatorError::JobInProgress(_)) => StatusCode::CONFLICT,
            AppError::Pipeline(e) => match e.category() {
                ErrorCategory::Credentials | ErrorCategory::Config => StatusCode::BAD_REQUEST,
                ErrorCategory::Document => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCategory::Translation => StatusCode::BAD_GATEWAY,
                ErrorCategory::Io | ErrorCategory::Session => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Pipeline(e) => e.to_string(),
            AppError::BadRequest(m) => m.clone(),
        };
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %message, "Request failed");
        }
        (status, Html(views::error_page(status.as_u16(), &message))).into_response()
    }
}
