use std::net::{IpAddr, SocketAddr};

use axum::{Router, routing::post};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::oneshot};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use super::{
    HttpApiDeps,
    export::{CreateBatchesHttpApiController, CreateFilesHttpApiController},
};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct HttpApiConfig {
    pub host: IpAddr,
    /// Overridden by the `PORT` environment variable.
    pub port: u16,
}

pub(crate) struct HttpApiRouter {
    config: HttpApiConfig,
    router: Router,
}

/// Scheduler requests carry no payload.
const MAX_BODY_SIZE: usize = 64 * 1024;

impl HttpApiRouter {
    pub(crate) fn new(config: &HttpApiConfig, deps: HttpApiDeps) -> Self {
        let router = Router::new()
            .route(
                "/create-batches",
                post(CreateBatchesHttpApiController::handle_request),
            )
            .route(
                "/create-files",
                post(CreateFilesHttpApiController::handle_request),
            )
            .with_state(deps)
            .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
            .layer(TraceLayer::new_for_http());

        HttpApiRouter {
            config: config.to_owned(),
            router,
        }
    }

    pub(crate) async fn listen_and_handle_http_requests(
        &self,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> std::io::Result<()> {
        let addr = SocketAddr::new(self.config.host, self.config.port);
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(address = %addr, "HTTP API listening");

        axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
                tracing::info!("HTTP server shutting down gracefully");
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use keyserver_blob_store::InMemoryBlobStore;
    use keyserver_repository::RepositoryManager;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::ExportConfig,
        services::{ExportBatcher, ExportWorker},
    };

    async fn router() -> (RepositoryManager, Router) {
        let repositories = RepositoryManager::connect_in_memory().await.unwrap();
        let export = ExportConfig {
            period: Duration::from_secs(3_600),
            create_batches_timeout: Duration::from_secs(30),
            export_bucket: "exports".to_string(),
            tmp_export_bucket: "exports-tmp".to_string(),
            max_records: 100,
            worker_concurrency: 2,
            lease: Duration::from_secs(60),
            max_ingest_delay: Duration::from_secs(60),
        };
        let deps = HttpApiDeps {
            export_batcher: Arc::new(ExportBatcher::new(&repositories, &export)),
            export_worker: Arc::new(ExportWorker::new(
                &repositories,
                Arc::new(InMemoryBlobStore::new()),
                &export,
            )),
            request_timeout: export.create_batches_timeout,
        };
        let config = HttpApiConfig {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
        };
        (repositories, HttpApiRouter::new(&config, deps).router)
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_create_batches_on_empty_store() {
        let (_repositories, router) = router().await;

        let response = router
            .oneshot(request(Method::POST, "/create-batches"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "batches_created": 0 })
        );
    }

    #[tokio::test]
    async fn test_create_batches_conflicts_while_locked() {
        let (repositories, router) = router().await;
        let _held = repositories
            .lock_repository()
            .acquire("create_batches", Duration::from_secs(60))
            .await
            .unwrap();

        let response = router
            .oneshot(request(Method::POST, "/create-batches"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_create_files_with_no_work() {
        let (_repositories, router) = router().await;

        let response = router
            .oneshot(request(Method::POST, "/create-files"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "files_published": 0 })
        );
    }

    #[tokio::test]
    async fn test_only_post_is_routed() {
        let (_repositories, router) = router().await;

        let response = router
            .clone()
            .oneshot(request(Method::GET, "/create-files"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = router.oneshot(request(Method::POST, "/test")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
