//! WordPress block-editor markup.
//!
//! Posts written with the block editor wrap every paragraph, list and
//! heading in `<!-- wp:… -->` comments. Those comments carry no content, so
//! they are stripped; the few blocks with a LaTeX counterpart (headings,
//! embedded video) are translated instead.
//!
//! Image blocks are left alone here: the layout engine matches them whole.

use super::body::{Body, Node};
use super::rewrite::escape_url;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Marker whose presence switches a post to block handling.
pub const BLOCK_MARKER: &str = "<!-- wp:paragraph";

/// True when the body was written with the block editor.
pub fn has_blocks(body: &Body) -> bool {
    body.text_contains(BLOCK_MARKER)
}

static RE_EMPTY_PARAGRAPH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<!-- wp:paragraph[^>]*-->\s*(?:<p[^>]*>\s*</p>)?\s*<!-- /wp:paragraph -->")
        .unwrap()
});

/// A video or embed block up to the first closing block comment after it.
/// Embeds never nest, so that closer is its own unless the markup is broken.
static RE_VIDEO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)<!-- wp:(video|embed|core-embed/[a-z0-9-]+)\b([^>]*?)-->(.*?)<!-- /wp:([a-z0-9/-]+) -->",
    )
    .unwrap()
});

static RE_JSON_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r#""url"\s*:\s*"([^"]+)""#).unwrap());
static RE_ATTR_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?:src|href)="([^"]+)""#).unwrap());
static RE_BARE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^\s<>"]+"#).unwrap());

/// URL of a video block: comment JSON, then `src`/`href`, then bare text.
fn video_url(attrs: &str, inner: &str) -> Option<String> {
    if let Some(caps) = RE_JSON_URL.captures(attrs) {
        return Some(caps[1].replace("\\/", "/"));
    }
    if let Some(caps) = RE_ATTR_URL.captures(inner) {
        return Some(caps[1].to_string());
    }
    RE_BARE_URL.find(inner).map(|m| m.as_str().to_string())
}

static RE_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<!-- wp:heading[^>]*-->\s*<h[1-6][^>]*>(.*?)</h[1-6]>\s*<!-- /wp:heading -->")
        .unwrap()
});

static RE_WRAPPER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<!-- /?wp:(?:paragraph|list|list-item|heading|group|quote|separator)\b[^>]*-->")
        .unwrap()
});

static RE_PARAGRAPH_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<p\b[^>]*>|</p>").unwrap());

/// Strip block wrappers, keeping their content.
pub fn unwrap_blocks(body: &mut Body) {
    let empty = body.rewrite(&RE_EMPTY_PARAGRAPH, |_| Vec::new());
    let videos = body.rewrite(&RE_VIDEO, |caps| {
        if caps[1] != caps[4] {
            // Unclosed block: leave the text for the wrapper pass.
            return vec![Node::Text(caps[0].to_string())];
        }
        match video_url(&caps[2], &caps[3]) {
            Some(url) => vec![Node::Latex(format!(
                "\\href{{{}}}{{Video link}}",
                escape_url(&url)
            ))],
            None => {
                debug!("Dropping {} block without a URL", &caps[1]);
                Vec::new()
            }
        }
    });
    let headings = body.rewrite(&RE_HEADING, |caps| {
        vec![
            Node::Latex("\\subsection*{".into()),
            Node::Text(caps[1].trim().to_string()),
            Node::Latex("}".into()),
        ]
    });
    body.rewrite(&RE_WRAPPER, |_| Vec::new());
    body.rewrite(&RE_PARAGRAPH_TAG, |_| Vec::new());

    debug!(
        "Unwrapped blocks: {} empty paragraphs, {} videos, {} headings",
        empty, videos, headings
    );
}
