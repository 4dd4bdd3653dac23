use crate::{
    error::{ProxyError, Result},
    hls::proxy_url::{MANIFEST_MARKER, decode_target},
    proxy::target_policy::validate_target,
};
use serde::Deserialize;
use tracing::warn;
use url::Url;

/// Marker accepted from older clients that tag nested playlists `type=m3u8`.
const LEGACY_MANIFEST_MARKER: &str = "m3u8";

/// Raw `/proxy` query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyParams {
    /// Base64-encoded absolute target URL
    pub url: Option<String>,
    /// Optional classification hint
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Client-supplied classification hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeHint {
    Manifest,
}

impl TypeHint {
    /// Unknown values are ignored rather than rejected.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            MANIFEST_MARKER | LEGACY_MANIFEST_MARKER => Some(TypeHint::Manifest),
            _ => None,
        }
    }
}

/// A decoded and validated proxy request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyRequest {
    pub target: Url,
    pub hint: Option<TypeHint>,
}

impl ProxyRequest {
    /// Decode the `url` parameter and validate it as an absolute http(s) URL.
    ///
    /// # Errors
    /// [`ProxyError::BadRequest`] when `url` is missing, empty, not base64,
    /// not UTF-8, not an absolute URL, or refused by the target policy.
    pub fn from_params(params: &ProxyParams, block_private_targets: bool) -> Result<Self> {
        let encoded = params
            .url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ProxyError::BadRequest("Missing url parameter".to_string()))?;

        let decoded = decode_target(encoded).map_err(|e| {
            warn!("Rejecting url parameter: {}", e);
            ProxyError::BadRequest("Invalid url parameter".to_string())
        })?;

        let target = Url::parse(decoded.trim()).map_err(|e| {
            warn!("Decoded target {:?} is not a URL: {}", decoded, e);
            ProxyError::BadRequest("Invalid target URL".to_string())
        })?;

        validate_target(&target, block_private_targets)?;

        let hint = params.kind.as_deref().and_then(TypeHint::parse);

        Ok(Self { target, hint })
    }
}
