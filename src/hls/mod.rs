pub mod proxy_url;
pub mod rewrite;

pub use proxy_url::{MANIFEST_MARKER, PROXY_PATH, build_proxy_url, decode_target, encode_target};
pub use rewrite::{ManifestLine, ManifestRewriter, RewrittenManifest, rewrite_manifest};
