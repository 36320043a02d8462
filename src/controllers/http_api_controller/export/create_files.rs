use axum::{extract::State, response::Response};

use super::{dto::CreateFilesResponse, respond};
use crate::controllers::http_api_controller::CreateFilesHttpApiControllerDeps;

pub(crate) const ROUTE: &str = "/create-files";

pub(crate) struct CreateFilesHttpApiController;

impl CreateFilesHttpApiController {
    pub(crate) async fn handle_request(
        State(deps): State<CreateFilesHttpApiControllerDeps>,
    ) -> Response {
        respond(
            ROUTE,
            deps.request_timeout,
            deps.export_worker.create_files(),
            CreateFilesResponse::new,
        )
        .await
    }
}
