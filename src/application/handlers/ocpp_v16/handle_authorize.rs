//! Authorize handler

use rust_ocpp::v1_6::messages::authorize::{AuthorizeRequest, AuthorizeResponse};
use tracing::info;

use super::accepted_id_tag;
use crate::application::handlers::OcppHandlerV16;
use crate::support::errors::ProtocolError;

pub async fn handle_authorize(
    handler: &OcppHandlerV16,
    req: &AuthorizeRequest,
) -> Result<AuthorizeResponse, ProtocolError> {
    info!(
        charge_point_id = handler.charge_point_id(),
        id_tag = req.id_tag.as_str(),
        "Authorize"
    );

    Ok(AuthorizeResponse {
        id_tag_info: accepted_id_tag(),
    })
}
