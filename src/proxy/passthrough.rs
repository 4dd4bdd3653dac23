use crate::{
    error::{ProxyError, Result},
    proxy::upstream::UpstreamResponse,
};
use axum::{
    body::Body,
    http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE},
    response::Response,
};

/// Relay a non-manifest upstream response without buffering it.
///
/// Status is forwarded as-is. Only `Content-Type` and `Content-Length` are
/// copied, and `Content-Length` is dropped whenever `Content-Encoding` is
/// present because the declared length may not match what gets streamed.
///
/// The body is pulled from upstream only as fast as the client consumes it,
/// and dropping the response (client gone) drops the upstream connection.
pub fn stream_response(upstream: UpstreamResponse) -> Result<Response> {
    let mut builder = Response::builder().status(upstream.status);

    if let Some(content_type) = upstream.headers.get(CONTENT_TYPE) {
        builder = builder.header(CONTENT_TYPE, content_type);
    }

    if !upstream.headers.contains_key(CONTENT_ENCODING)
        && let Some(length) = upstream.headers.get(CONTENT_LENGTH)
    {
        builder = builder.header(CONTENT_LENGTH, length);
    }

    builder
        .body(Body::from_stream(upstream.body))
        .map_err(|e| ProxyError::Internal(format!("Failed to build passthrough response: {e}")))
}
