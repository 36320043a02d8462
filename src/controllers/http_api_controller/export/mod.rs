//! Scheduler-facing export endpoints.
//!
//! Each request runs one pipeline step under a deadline and reports the
//! outcome as a status code: 409 when another controller holds the batching
//! lock, 504 when the deadline passes, 500 for any other failure. A step cut
//! off by the deadline rolls back its open transaction; work items it had
//! already claimed become claimable again once their lease expires.

mod create_batches;
mod create_files;
mod dto;

use std::{
    future::Future,
    time::{Duration, Instant},
};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use keyserver_observability::record_http_request;
use serde::Serialize;

pub(crate) use create_batches::CreateBatchesHttpApiController;
pub(crate) use create_files::CreateFilesHttpApiController;
use dto::ErrorResponse;

use crate::services::ExportError;

async fn respond<F, T>(
    route: &'static str,
    deadline: Duration,
    step: F,
    body: impl FnOnce(u64) -> T,
) -> Response
where
    F: Future<Output = Result<u64, ExportError>>,
    T: Serialize,
{
    let started = Instant::now();

    let response = match tokio::time::timeout(deadline, step).await {
        Ok(Ok(count)) => (StatusCode::OK, Json(body(count))).into_response(),
        Ok(Err(ExportError::Locked(lock_id))) => {
            tracing::info!(route, lock_id = %lock_id, "Rejected: lock held");
            (
                StatusCode::CONFLICT,
                Json(ErrorResponse::new(format!("lock {} is held", lock_id))),
            )
                .into_response()
        }
        Ok(Err(error)) => {
            tracing::error!(route, error = %error, "Export step failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(error.to_string())),
            )
                .into_response()
        }
        Err(_) => {
            tracing::error!(
                route,
                timeout_secs = deadline.as_secs(),
                "Export step timed out"
            );
            (
                StatusCode::GATEWAY_TIMEOUT,
                Json(ErrorResponse::new(format!(
                    "timed out after {}",
                    humantime::format_duration(deadline)
                ))),
            )
                .into_response()
        }
    };

    record_http_request(route, response.status().as_u16(), started.elapsed());
    response
}

#[cfg(test)]
mod tests {
    use keyserver_repository::RepositoryError;

    use super::{dto::CreateFilesResponse, *};

    async fn status_and_body(response: Response) -> (StatusCode, serde_json::Value) {
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_success_serializes_count() {
        let response = respond(
            "/create-files",
            Duration::from_secs(1),
            async { Ok(4) },
            CreateFilesResponse::new,
        )
        .await;

        let (status, body) = status_and_body(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "files_published": 4 }));
    }

    #[tokio::test]
    async fn test_held_lock_is_conflict() {
        let response = respond(
            "/create-batches",
            Duration::from_secs(1),
            async { Err(ExportError::Locked("create_batches".to_string())) },
            CreateFilesResponse::new,
        )
        .await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_failure_is_internal_error() {
        let response = respond(
            "/create-files",
            Duration::from_secs(1),
            async {
                Err(ExportError::Repository(RepositoryError::NotFound(
                    "export batch 7".to_string(),
                )))
            },
            CreateFilesResponse::new,
        )
        .await;

        let (status, body) = status_and_body(response).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["message"].as_str().unwrap().contains("export batch 7"));
    }

    #[tokio::test]
    async fn test_deadline_is_gateway_timeout() {
        let response = respond(
            "/create-files",
            Duration::from_millis(10),
            std::future::pending::<Result<u64, ExportError>>(),
            CreateFilesResponse::new,
        )
        .await;

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
