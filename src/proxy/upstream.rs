use crate::{
    config::Config,
    error::{BoxError, ProxyError, Result},
    proxy::target_policy::validate_target,
};
use async_trait::async_trait;
use axum::body::Bytes;
use futures_util::{StreamExt, TryStreamExt, stream::BoxStream};
use reqwest::{
    Client,
    header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT},
    redirect,
};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Spoofed request headers sent on every upstream fetch. Hotlink-protected
/// origins check these, so they are fixed rather than configurable.
pub const SPOOF_REFERER: &str = "https://megacloud.com/";
pub const SPOOF_ORIGIN: &str = "https://megacloud.com";
pub const SPOOF_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const SPOOF_ACCEPT: &str = "*/*";
pub const SPOOF_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Upstream response body, read chunk by chunk.
pub type BodyStream = BoxStream<'static, std::result::Result<Bytes, BoxError>>;

/// A fetched upstream response whose body has not been read yet.
pub struct UpstreamResponse {
    /// URL reached after following every redirect.
    pub final_url: Url,
    pub status: reqwest::StatusCode,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl std::fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("final_url", &self.final_url.as_str())
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl UpstreamResponse {
    /// Drain the body into a string. Only used for manifests, which are small.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub async fn into_text(self) -> Result<String> {
        let chunks: Vec<Bytes> = self
            .body
            .try_collect()
            .await
            .map_err(ProxyError::UpstreamBody)?;
        let buf = chunks.concat();
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Something that can fetch a target URL. The HTTP implementation is
/// [`HttpUpstream`]; tests plug in canned responses.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Fetch `target` with GET, following redirects.
    ///
    /// Any HTTP status is a successful fetch. Only transport failures are errors.
    async fn fetch(&self, target: &Url) -> Result<UpstreamResponse>;
}

/// reqwest-backed upstream with the spoofed header set baked into the client.
#[derive(Clone, Debug)]
pub struct HttpUpstream {
    client: Client,
}

impl HttpUpstream {
    /// Build the shared client from config timeouts and redirect limit.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .default_headers(spoofed_headers())
            .redirect(redirect_policy(
                config.max_redirects,
                config.block_private_targets,
            ))
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| ProxyError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(&self, target: &Url) -> Result<UpstreamResponse> {
        debug!("Fetching upstream: {}", target);

        let response = self.client.get(target.clone()).send().await.map_err(|e| {
            warn!("Upstream fetch failed for {}: {}", target, e);
            ProxyError::UpstreamUnreachable(e)
        })?;

        let final_url = response.url().clone();
        if &final_url != target {
            debug!("Redirected {} -> {}", target, final_url);
        }

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map_err(|e| Box::new(e) as BoxError)
            .boxed();

        Ok(UpstreamResponse {
            final_url,
            status,
            headers,
            body,
        })
    }
}

/// Follow up to `max_redirects` hops. With `block_private` set, every hop
/// goes through the same target policy as the requested URL.
fn redirect_policy(max_redirects: usize, block_private: bool) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= max_redirects {
            return attempt.error("too many redirects");
        }
        if let Err(e) = validate_target(attempt.url(), block_private) {
            warn!("Refusing redirect to {}: {}", attempt.url(), e);
            return attempt.error(e);
        }
        attempt.follow()
    })
}

fn spoofed_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(REFERER, HeaderValue::from_static(SPOOF_REFERER));
    headers.insert(ORIGIN, HeaderValue::from_static(SPOOF_ORIGIN));
    headers.insert(USER_AGENT, HeaderValue::from_static(SPOOF_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(SPOOF_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(SPOOF_ACCEPT_LANGUAGE));
    headers
}
