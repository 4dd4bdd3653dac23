use crate::{
    proxy::{error_response, request::ProxyParams},
    server::state::AppState,
};
use axum::{
    extract::{Query, State},
    response::Response,
};

/// `GET /proxy?url=<base64>[&type=manifest]`
///
/// Thin adapter: all behavior lives in [`crate::proxy::ProxyService`].
pub async fn serve_proxy(
    Query(params): Query<ProxyParams>,
    State(state): State<AppState>,
) -> Response {
    match state.proxy.handle(params).await {
        Ok(response) => response,
        Err(e) => error_response(e),
    }
}
