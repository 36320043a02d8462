use axum::{extract::State, response::Response};

use super::{dto::CreateBatchesResponse, respond};
use crate::controllers::http_api_controller::CreateBatchesHttpApiControllerDeps;

pub(crate) const ROUTE: &str = "/create-batches";

pub(crate) struct CreateBatchesHttpApiController;

impl CreateBatchesHttpApiController {
    pub(crate) async fn handle_request(
        State(deps): State<CreateBatchesHttpApiControllerDeps>,
    ) -> Response {
        respond(
            ROUTE,
            deps.request_timeout,
            deps.export_batcher.create_batches(),
            CreateBatchesResponse::new,
        )
        .await
    }
}
