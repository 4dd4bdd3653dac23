use crate::proxy::request::TypeHint;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use url::Url;

/// How the upstream body is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// HLS playlist: buffer and rewrite.
    Manifest,
    /// Anything else: stream through untouched.
    Binary,
}

/// Decide whether an upstream response is an HLS manifest.
///
/// Any one signal is enough: an mpegurl content type, `.m3u8` in the final
/// URL path, or an explicit manifest hint from the client. A playlist served
/// as `text/plain` from an extension-less URL without a hint is streamed as
/// binary; the `type=manifest` hint is the way to force it.
pub fn classify(headers: &HeaderMap, final_url: &Url, hint: Option<TypeHint>) -> BodyKind {
    let mpegurl_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("mpegurl"));

    let m3u8_path = final_url.path().contains(".m3u8");

    if mpegurl_type || m3u8_path || hint == Some(TypeHint::Manifest) {
        BodyKind::Manifest
    } else {
        BodyKind::Binary
    }
}
