//! Line-oriented HLS playlist rewriting.
//!
//! Replaces every media/playlist URI in an m3u8 body with a proxy reference
//! so clients never learn upstream URLs. Tags, comments, and blank lines pass
//! through untouched — the rewriter detects URIs, it does not parse tag
//! semantics.

use crate::config::RewriteMode;
use crate::token::{TokenStore, TtlClass};
use url::{Url, form_urlencoded};

/// Extensions that mark a playlist line as a media/playlist reference.
const REFERENCE_EXTENSIONS: [&str; 3] = ["ts", "m3u8", "key"];

/// Base reference a playlist body is rewritten against.
#[derive(Clone, Debug)]
pub enum BaseRef {
    /// Full URL of the playlist — relative lines resolve to absolute URLs
    Absolute(String),
    /// Bare relative path of the playlist — relative lines stay relative and
    /// origin selection is deferred to fetch time
    RelativeDir(String),
}

/// Everything the rewriter needs besides the playlist body.
pub struct RewriteContext<'a> {
    /// Proxy endpoint emitted into references, e.g. `/stream`
    pub endpoint: &'a str,
    pub mode: &'a RewriteMode,
    pub tokens: &'a TokenStore,
}

/// True when a path (query string already stripped or not) names a playlist.
pub fn is_playlist_path(path: &str) -> bool {
    extension_of(strip_query(path))
        .map(|ext| ext.eq_ignore_ascii_case("m3u8"))
        .unwrap_or(false)
}

fn strip_query(line: &str) -> &str {
    line.split('?').next().unwrap_or(line)
}

fn extension_of(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() { None } else { Some(ext) }
}

/// True when the line's query-stripped path carries a media/playlist extension.
fn is_media_reference(line: &str) -> bool {
    extension_of(strip_query(line))
        .map(|ext| {
            REFERENCE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn is_absolute(line: &str) -> bool {
    line.starts_with("http://") || line.starts_with("https://")
}

/// Directory component of a relative path, trailing slash included.
/// `movie1/master.m3u8` → `movie1/`; `master.m3u8` → ``.
fn directory_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "",
    }
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Rewrite one reference line into its proxy form.
fn proxy_reference(line: &str, base: &BaseRef, ctx: &RewriteContext<'_>) -> String {
    // Work out the target this line points at: an absolute URL when the base
    // (or the line itself) gives us one, otherwise a new relative path.
    let absolute: Option<String> = if is_absolute(line) {
        Some(line.to_string())
    } else {
        match base {
            BaseRef::Absolute(base_url) => Url::parse(base_url)
                .and_then(|u| u.join(line))
                .map(|u| u.to_string())
                .ok(),
            BaseRef::RelativeDir(_) => None,
        }
    };

    match absolute {
        Some(url) => match ctx.mode {
            RewriteMode::Token => {
                let class = if is_playlist_path(&url) {
                    TtlClass::Master
                } else {
                    TtlClass::Segment
                };
                let token = ctx.tokens.register(url, class);
                format!("{}?t={}", ctx.endpoint, token)
            }
            RewriteMode::Direct => format!("{}?url={}", ctx.endpoint, encode(&url)),
        },
        None => {
            // Origin still unknown — emit a path-keyed reference and let the
            // resolver pick the origin when the segment is fetched.
            let BaseRef::RelativeDir(base_path) = base else {
                // Absolute base that failed to parse; leave the line alone
                // rather than emit a broken reference.
                return line.to_string();
            };
            let joined = format!("{}{}", directory_of(base_path), line);
            let cleaned: String = {
                let mut out = String::with_capacity(joined.len());
                for part in joined.split('/').filter(|p| !p.is_empty()) {
                    if !out.is_empty() {
                        out.push('/');
                    }
                    out.push_str(part);
                }
                out
            };
            format!("{}?path={}", ctx.endpoint, encode(&cleaned))
        }
    }
}

/// Rewrite a playlist body against `base`.
///
/// Splits on `\n`/`\r\n` and joins with `\n`; output line count and order
/// always match the input. Blank lines, `#` tag/comment lines, and lines
/// without a media/playlist extension pass through unchanged — leaking an
/// unrecognized line unrewritten beats breaking playlist syntax.
pub fn rewrite_playlist(body: &str, base: &BaseRef, ctx: &RewriteContext<'_>) -> String {
    let mut out = Vec::new();
    for raw in body.split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || !is_media_reference(trimmed) {
            out.push(line.to_string());
        } else {
            out.push(proxy_reference(trimmed, base, ctx));
        }
    }
    out.join("\n")
}
