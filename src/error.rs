use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// Boxed error type carried by upstream body streams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Request-level failures. Anything that reaches the client as a proxy-made
/// error goes through this enum; upstream 4xx/5xx are relayed, not raised.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Missing or malformed `url` parameter. The message is client-safe.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Transport failure reaching the target (DNS, connect, TLS, timeout).
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(#[from] reqwest::Error),

    /// Body read failed while buffering a manifest.
    #[error("upstream body read failed: {0}")]
    UpstreamBody(BoxError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ProxyError>;

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamUnreachable(_) | ProxyError::UpstreamBody(_) => {
                StatusCode::BAD_GATEWAY
            }
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain-text body shown to the client. Never includes internal detail.
    fn public_message(&self) -> String {
        match self {
            ProxyError::BadRequest(msg) => msg.clone(),
            ProxyError::UpstreamUnreachable(_) | ProxyError::UpstreamBody(_) => {
                "Error fetching target URL".to_string()
            }
            ProxyError::Internal(_) => "Internal proxy error".to_string(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Proxy error: {}", self);
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.public_message(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_text(resp: Response) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn bad_request_is_400_with_message() {
        let resp = ProxyError::BadRequest("Missing url parameter".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(resp).await, "Missing url parameter");
    }

    #[tokio::test]
    async fn body_failure_is_502_without_detail() {
        let err = ProxyError::UpstreamBody("connection reset by peer at 10.1.2.3".into());
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let text = body_text(resp).await;
        assert_eq!(text, "Error fetching target URL");
        assert!(!text.contains("10.1.2.3"));
    }

    #[tokio::test]
    async fn internal_is_500_and_generic() {
        let resp = ProxyError::Internal("response builder exploded".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_text(resp).await, "Internal proxy error");
    }
}
