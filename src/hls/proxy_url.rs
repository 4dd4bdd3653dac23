//! Self-referential proxy URLs: `/proxy?url=<base64(absolute)>[&type=manifest]`.

use base64::{
    Engine as _, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig, general_purpose::STANDARD},
};

/// Route every rewritten reference points back to.
pub const PROXY_PATH: &str = "/proxy";

/// Value of the `type` parameter that forces manifest handling.
pub const MANIFEST_MARKER: &str = "manifest";

/// Standard alphabet, padding optional on decode.
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// URL-safe alphabet, padding optional on decode.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode an absolute URL for the `url` query parameter (standard, padded).
pub fn encode_target(absolute_url: &str) -> String {
    STANDARD.encode(absolute_url.as_bytes())
}

/// Decode a `url` parameter back into the target URL text.
///
/// Accepts standard or URL-safe base64, with or without padding. A space is
/// read as `+`, since form decoding turns an unescaped `+` into a space.
pub fn decode_target(encoded: &str) -> Result<String, String> {
    let cleaned = encoded.replace(' ', "+");

    let bytes = STANDARD_LENIENT
        .decode(&cleaned)
        .or_else(|_| URL_SAFE_LENIENT.decode(&cleaned))
        .map_err(|e| format!("invalid base64: {e}"))?;

    String::from_utf8(bytes).map_err(|e| format!("decoded url is not UTF-8: {e}"))
}

/// Build the proxy URL that fetches `absolute_url` through this service.
///
/// `base_url` is an optional absolute prefix (no trailing slash); empty
/// yields a host-relative reference.
pub fn build_proxy_url(base_url: &str, absolute_url: &str, is_manifest: bool) -> String {
    let encoded = urlencoding::encode(&encode_target(absolute_url)).into_owned();
    let mut out = String::with_capacity(base_url.len() + PROXY_PATH.len() + encoded.len() + 20);
    out.push_str(base_url);
    out.push_str(PROXY_PATH);
    out.push_str("?url=");
    out.push_str(&encoded);
    if is_manifest {
        out.push_str("&type=");
        out.push_str(MANIFEST_MARKER);
    }
    out
}
