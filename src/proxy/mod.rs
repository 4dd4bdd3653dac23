//! The request-handling core.
//!
//! [`ProxyService::handle`] runs one request end to end: decode the target,
//! fetch it, then either rewrite it as a manifest or stream it through. It
//! keeps no per-request state between calls, so one instance serves every
//! request concurrently, whether hosted by the axum server or anything else
//! that can hand it query parameters.

pub mod classify;
pub mod passthrough;
pub mod request;
pub mod target_policy;
pub mod upstream;

use crate::{
    config::Config,
    error::{ProxyError, Result},
    hls::rewrite::ManifestRewriter,
    metrics,
};
use axum::{
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};
use classify::{BodyKind, classify};
use request::{ProxyParams, ProxyRequest};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use upstream::{HttpUpstream, Upstream, UpstreamResponse};

pub const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Stateless proxy pipeline over an injectable [`Upstream`].
#[derive(Clone)]
pub struct ProxyService {
    upstream: Arc<dyn Upstream>,
    /// Prefix for rewritten proxy URLs
    base_url: String,
    block_private_targets: bool,
}

impl ProxyService {
    pub fn new(upstream: Arc<dyn Upstream>, config: &Config) -> Self {
        Self {
            upstream,
            base_url: config.base_url.clone(),
            block_private_targets: config.block_private_targets,
        }
    }

    /// Build a service backed by the real HTTP upstream.
    pub fn from_config(config: &Config) -> Result<Self> {
        let upstream = HttpUpstream::new(config)?;
        Ok(Self::new(Arc::new(upstream), config))
    }

    /// Handle one `/proxy` request.
    ///
    /// # Errors
    /// `BadRequest` for a missing/invalid `url`, `UpstreamUnreachable` for
    /// transport failures, `UpstreamBody` if a manifest body cannot be read.
    /// Upstream error statuses are relayed, not returned as errors.
    pub async fn handle(&self, params: ProxyParams) -> Result<Response> {
        let start = Instant::now();

        let request = ProxyRequest::from_params(&params, self.block_private_targets)?;
        info!("Proxying {}", request.target);

        let upstream = match self.upstream.fetch(&request.target).await {
            Ok(resp) => resp,
            Err(e) => {
                metrics::record_upstream_error();
                return Err(e);
            }
        };

        let kind = classify(&upstream.headers, &upstream.final_url, request.hint);
        let status = upstream.status.as_u16();
        info!(
            "Upstream {} answered {} ({:?})",
            upstream.final_url, status, kind
        );

        let response = match kind {
            BodyKind::Manifest => {
                let resp = self.rewrite(upstream).await?;
                metrics::record_request("manifest", status);
                metrics::record_duration("manifest", start);
                resp
            }
            BodyKind::Binary => {
                let resp = passthrough::stream_response(upstream)?;
                metrics::record_request("passthrough", status);
                // Time to first byte: the body is still streaming
                metrics::record_duration("passthrough", start);
                resp
            }
        };

        Ok(response)
    }

    /// Buffer the manifest, rewrite every reference against the final URL,
    /// and return it with the upstream status.
    async fn rewrite(&self, upstream: UpstreamResponse) -> Result<Response> {
        let status = upstream.status;
        let base = upstream.final_url.clone();

        let text = upstream.into_text().await.map_err(|e| {
            metrics::record_upstream_error();
            e
        })?;

        let rewritten = ManifestRewriter::new(&base, &self.base_url).rewrite(&text);
        metrics::record_rewritten_references(rewritten.references);
        info!(
            "Rewrote {} references in manifest from {}",
            rewritten.references, base
        );

        Ok((status, [(CONTENT_TYPE, MANIFEST_CONTENT_TYPE)], rewritten.body).into_response())
    }
}

impl std::fmt::Debug for ProxyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyService")
            .field("base_url", &self.base_url)
            .field("block_private_targets", &self.block_private_targets)
            .finish_non_exhaustive()
    }
}

/// Map a core error to a response, counting it.
pub fn error_response(err: ProxyError) -> Response {
    metrics::record_request("error", err.status().as_u16());
    err.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::hls::proxy_url::{decode_target, encode_target};
    use crate::proxy::upstream::BodyStream;
    use async_trait::async_trait;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use futures_util::{StreamExt, stream};
    use http_body_util::BodyExt;
    use url::Url;

    /// Upstream that answers every fetch from a fixed final URL.
    struct Canned {
        final_url: &'static str,
        content_type: Option<&'static str>,
        status: u16,
        body: &'static str,
    }

    #[async_trait]
    impl Upstream for Canned {
        async fn fetch(&self, _target: &Url) -> Result<UpstreamResponse> {
            let mut headers = HeaderMap::new();
            if let Some(ct) = self.content_type {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
            }
            let body: BodyStream = stream::iter(vec![Ok(Bytes::from_static(self.body.as_bytes()))])
                .boxed();
            Ok(UpstreamResponse {
                final_url: Url::parse(self.final_url).unwrap(),
                status: StatusCode::from_u16(self.status).unwrap(),
                headers,
                body,
            })
        }
    }

    /// Upstream whose manifest body breaks mid-read.
    struct BrokenBody;

    #[async_trait]
    impl Upstream for BrokenBody {
        async fn fetch(&self, target: &Url) -> Result<UpstreamResponse> {
            let body: BodyStream = stream::iter(vec![
                Ok(Bytes::from_static(b"#EXTM3U\n")),
                Err::<Bytes, BoxError>("connection reset".into()),
            ])
            .boxed();
            Ok(UpstreamResponse {
                final_url: target.clone(),
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body,
            })
        }
    }

    fn service(upstream: impl Upstream + 'static) -> ProxyService {
        ProxyService::new(Arc::new(upstream), &Config::default())
    }

    fn params(target: &str, kind: Option<&str>) -> ProxyParams {
        ProxyParams {
            url: Some(encode_target(target)),
            kind: kind.map(str::to_string),
        }
    }

    async fn body_text(resp: Response) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn manifest_rewritten_against_redirected_url() {
        let svc = service(Canned {
            final_url: "https://cdn.example.net/abc/master.m3u8",
            content_type: Some("application/vnd.apple.mpegurl"),
            status: 200,
            body: "#EXTM3U\n#EXTINF:4,\nseg0.ts\n",
        });

        let resp = svc
            .handle(params("https://example.com/master.m3u8", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], MANIFEST_CONTENT_TYPE);

        let body = body_text(resp).await;
        let link = body.lines().nth(2).unwrap();
        let encoded = urlencoding::decode(link.trim_start_matches("/proxy?url=")).unwrap();
        assert_eq!(
            decode_target(&encoded).unwrap(),
            "https://cdn.example.net/abc/seg0.ts"
        );
    }

    #[tokio::test]
    async fn hint_forces_rewrite_of_text_plain() {
        let svc = service(Canned {
            final_url: "https://example.com/playlist",
            content_type: Some("text/plain"),
            status: 200,
            body: "seg.ts",
        });

        let resp = svc
            .handle(params("https://example.com/playlist", Some("manifest")))
            .await
            .unwrap();
        assert_eq!(resp.headers()[CONTENT_TYPE], MANIFEST_CONTENT_TYPE);
        assert!(body_text(resp).await.starts_with("/proxy?url="));
    }

    #[tokio::test]
    async fn text_plain_without_hint_streams_raw() {
        let svc = service(Canned {
            final_url: "https://example.com/playlist",
            content_type: Some("text/plain"),
            status: 200,
            body: "seg.ts",
        });

        let resp = svc
            .handle(params("https://example.com/playlist", None))
            .await
            .unwrap();
        assert_eq!(resp.headers()[CONTENT_TYPE], "text/plain");
        assert_eq!(body_text(resp).await, "seg.ts");
    }

    #[tokio::test]
    async fn manifest_keeps_upstream_error_status() {
        let svc = service(Canned {
            final_url: "https://example.com/live.m3u8",
            content_type: None,
            status: 404,
            body: "",
        });

        let resp = svc
            .handle(params("https://example.com/live.m3u8", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers()[CONTENT_TYPE], MANIFEST_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn missing_url_is_bad_request() {
        let svc = service(Canned {
            final_url: "https://example.com/x",
            content_type: None,
            status: 200,
            body: "",
        });

        let err = svc.handle(ProxyParams::default()).await.unwrap_err();
        assert!(matches!(err, ProxyError::BadRequest(_)));
    }

    #[tokio::test]
    async fn broken_manifest_body_is_upstream_error() {
        let err = service(BrokenBody)
            .handle(params("https://example.com/live.m3u8", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::UpstreamBody(_)));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
