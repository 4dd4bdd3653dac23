//! Line-oriented HLS manifest rewriting.
//!
//! Manifests are never parsed into a playlist model and re-serialized: each
//! line is inspected on its own and only the URL-bearing part is replaced, so
//! tags the proxy does not understand survive byte-for-byte.
//!
//! Every reference is resolved against the URL the manifest was actually
//! served from (after redirects) and turned into a `/proxy?url=...` link, so
//! the player keeps routing segments and nested playlists through the proxy.
//!
//! The transform is forward-only: rewriting an already rewritten manifest
//! wraps each link a second time rather than leaving it alone.

use crate::hls::proxy_url::build_proxy_url;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

/// Quoted `URI="..."` attribute as used by EXT-X-KEY, EXT-X-MAP, EXT-X-MEDIA,
/// EXT-X-I-FRAME-STREAM-INF and friends.
static URI_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"URI="([^"]+)""#).expect("URI attribute pattern is valid"));

/// How a single manifest line is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestLine<'a> {
    /// Empty or whitespace only.
    Blank,
    /// `#`-prefixed tag or comment with nothing to rewrite.
    Tag,
    /// `#`-prefixed tag carrying at least one `URI="..."` attribute.
    TagWithUri,
    /// Segment or playlist reference (trimmed).
    Reference(&'a str),
}

impl<'a> ManifestLine<'a> {
    pub fn classify(line: &'a str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            ManifestLine::Blank
        } else if !trimmed.starts_with('#') {
            ManifestLine::Reference(trimmed)
        } else if trimmed.contains("URI=\"") {
            ManifestLine::TagWithUri
        } else {
            ManifestLine::Tag
        }
    }
}

/// Output of a manifest rewrite.
#[derive(Debug, Clone, PartialEq)]
pub struct RewrittenManifest {
    pub body: String,
    /// Number of references turned into proxy URLs.
    pub references: usize,
}

/// Rewrites manifest references into proxy URLs.
#[derive(Debug, Clone)]
pub struct ManifestRewriter<'a> {
    /// Final (post-redirect) URL the manifest came from.
    base: &'a Url,
    /// Absolute prefix for emitted proxy URLs, empty for host-relative.
    proxy_base: &'a str,
}

impl<'a> ManifestRewriter<'a> {
    pub fn new(base: &'a Url, proxy_base: &'a str) -> Self {
        Self { base, proxy_base }
    }

    /// Rewrite a whole manifest, keeping line order and `\n` terminators.
    pub fn rewrite(&self, manifest: &str) -> RewrittenManifest {
        // A UTF-8 BOM would otherwise turn `#EXTM3U` into a reference line
        let manifest = manifest.strip_prefix('\u{FEFF}').unwrap_or(manifest);
        let mut references = 0;
        let lines: Vec<Cow<'_, str>> = manifest
            .split('\n')
            .map(|line| self.rewrite_line(line, &mut references))
            .collect();

        RewrittenManifest {
            body: lines.join("\n"),
            references,
        }
    }

    fn rewrite_line<'l>(&self, line: &'l str, references: &mut usize) -> Cow<'l, str> {
        match ManifestLine::classify(line) {
            ManifestLine::Blank | ManifestLine::Tag => Cow::Borrowed(line),
            ManifestLine::Reference(reference) => {
                let mut out = self.rewrite_reference(reference, references);
                // Keep CRLF manifests CRLF
                if line.ends_with('\r') {
                    out.push('\r');
                }
                Cow::Owned(out)
            }
            ManifestLine::TagWithUri => URI_ATTR.replace_all(line, |caps: &Captures| {
                format!("URI=\"{}\"", self.rewrite_reference(&caps[1], references))
            }),
        }
    }

    /// Resolve `reference` against the base and wrap it in a proxy URL.
    ///
    /// References that cannot be resolved, or that use a scheme other than
    /// http(s), come back unchanged.
    fn rewrite_reference(&self, reference: &str, references: &mut usize) -> String {
        let (absolute, parsed) = match Url::parse(reference) {
            Ok(url) => (reference.to_string(), url),
            Err(url::ParseError::RelativeUrlWithoutBase) => match self.base.join(reference) {
                Ok(url) => (url.to_string(), url),
                Err(e) => {
                    warn!("Cannot resolve manifest reference {:?}: {}", reference, e);
                    return reference.to_string();
                }
            },
            Err(e) => {
                warn!("Malformed manifest reference {:?}: {}", reference, e);
                return reference.to_string();
            }
        };

        if !matches!(parsed.scheme(), "http" | "https") {
            debug!("Leaving {} reference untouched", parsed.scheme());
            return reference.to_string();
        }

        let is_manifest = parsed.path().contains(".m3u8");
        debug!("Rewriting {} -> {}", reference, absolute);
        *references += 1;
        build_proxy_url(self.proxy_base, &absolute, is_manifest)
    }
}

/// Convenience wrapper: rewrite `manifest` served from `base`.
pub fn rewrite_manifest(manifest: &str, base: &Url, proxy_base: &str) -> RewrittenManifest {
    ManifestRewriter::new(base, proxy_base).rewrite(manifest)
}
