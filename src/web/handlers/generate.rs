use crate::core::sharing::PPTX_MIME_TYPE;
use crate::web::AppState;
use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

const MISSING_ARTIFACT: &str = "Presentation file not found.";
const MISSING_DOWNLOAD: &str = "PPT file not found.";

#[derive(Debug, Serialize)]
struct GenerateSuccess {
    success: bool,
    ppt_url: &'static str,
    slides_link: String,
    /// Some stage fell back to placeholder output.
    degraded: bool,
}

#[derive(Debug, Serialize)]
struct GenerateFailure {
    success: bool,
    error: String,
}

#[derive(Debug, Serialize)]
struct DownloadError {
    error: &'static str,
}

fn failure(error: impl Into<String>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(GenerateFailure {
            success: false,
            error: error.into(),
        }),
    )
        .into_response()
}

/// Runs the whole pipeline, then publishes the deck. Blocks until done.
///
/// The work runs on its own task, so a client that disconnects mid-run
/// does not cancel an upload halfway through.
pub async fn generate(State(state): State<Arc<AppState>>) -> Response {
    let worker = tokio::spawn(run_and_publish(state));
    match worker.await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Generate task failed");
            failure(e.to_string())
        }
    }
}

async fn run_and_publish(state: Arc<AppState>) -> Response {
    let report = match state.pipeline.run().await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "Pipeline failed");
            return failure(e.to_string());
        }
    };

    if !tokio::fs::try_exists(&state.output_path).await.unwrap_or(false) {
        tracing::warn!(output = %state.output_path.display(), "No presentation after pipeline run");
        return failure(MISSING_ARTIFACT);
    }

    match state.publisher.publish(&state.output_path).await {
        Ok(link) => {
            let degraded = report.as_ref().is_some_and(|r| r.degraded());
            tracing::info!(slides_link = %link.url, degraded, "Presentation ready");
            Json(GenerateSuccess {
                success: true,
                ppt_url: "/download",
                slides_link: link.url,
                degraded,
            })
            .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Publishing failed");
            failure(e.to_string())
        }
    }
}

pub async fn download(State(state): State<Arc<AppState>>) -> Response {
    let bytes = match tokio::fs::read(&state.output_path).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (
                StatusCode::NOT_FOUND,
                Json(DownloadError {
                    error: MISSING_DOWNLOAD,
                }),
            )
                .into_response()
        }
    };

    let filename = state
        .output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "presentation.pptx".to_string());

    (
        [
            (CONTENT_TYPE, PPTX_MIME_TYPE.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}
