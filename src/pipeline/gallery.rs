//! `[gallery ids="…"]` shortcode expansion.
//!
//! Each listed attachment is resolved to a file in the media archive and
//! probed like an inline image. Images are laid out two per figure in the
//! order the shortcode lists them; an odd one out gets its own figure.

use super::body::{Body, Node};
use super::layout::{
    fold_paragraph_break, resolve_image, FigureCounter, ResolvedImage, PAIRED_LANDSCAPE_WIDTH,
};
use super::media::{MediaIndex, Orientation};
use super::wxr::Attachment;
use crate::config::FigureWidths;
use crate::error::FigureError;
use crate::templates;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

static RE_GALLERY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[gallery\b([^\]]*)\]").unwrap());
static RE_IDS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"ids=["']?([\d,\s]+)"#).unwrap());

/// Attachment IDs listed in a shortcode's attribute string.
pub fn gallery_ids(attrs: &str) -> Vec<String> {
    RE_IDS
        .captures(attrs)
        .map(|caps| {
            caps[1]
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Replace every gallery shortcode with figures.
///
/// Unknown IDs and images that fail to resolve are skipped with a warning;
/// without a media archive the shortcode is removed.
pub fn expand_galleries(
    body: &mut Body,
    attachments: &[Attachment],
    media: Option<&MediaIndex>,
    widths: FigureWidths,
    counter: &mut FigureCounter,
) -> Vec<FigureError> {
    let masked = body.masked();
    let text = masked.as_str();
    let by_id: HashMap<&str, &Attachment> =
        attachments.iter().map(|a| (a.id.as_str(), a)).collect();

    let mut warnings = Vec::new();
    let mut replacements = Vec::new();

    for caps in RE_GALLERY.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        let Some(media) = media else {
            warn!("Removing gallery shortcode: no media archive configured");
            warnings.push(FigureError::NoMediaArchive);
            replacements.push((m.range(), Vec::new()));
            continue;
        };

        let ids = gallery_ids(&caps[1]);
        if ids.is_empty() {
            warn!("Gallery shortcode without ids: {}", m.as_str());
            warnings.push(FigureError::MalformedMarker {
                marker: m.as_str().to_string(),
            });
            replacements.push((m.range(), Vec::new()));
            continue;
        }

        let mut images: Vec<(u32, ResolvedImage)> = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(attachment) = by_id.get(id.as_str()) else {
                warn!("Gallery ID {} is not an attachment; skipping", id);
                warnings.push(FigureError::UnknownAttachment { id });
                continue;
            };
            match resolve_image(media, &attachment.url) {
                Ok(image) => {
                    let number = counter.assign();
                    debug!("Gallery figure {}: {}", number, image.path.display());
                    images.push((number, image));
                }
                Err(e) => {
                    warn!("Skipping gallery image {}: {}", attachment.url, e);
                    warnings.push(e);
                }
            }
        }

        if images.is_empty() {
            replacements.push((m.range(), Vec::new()));
        } else {
            replacements.push((
                fold_paragraph_break(text, m.range()),
                gallery_nodes(&images, widths),
            ));
        }
    }

    if !replacements.is_empty() {
        *body = masked.rebuild(replacements);
    }
    warnings
}

fn gallery_nodes(images: &[(u32, ResolvedImage)], widths: FigureWidths) -> Vec<Node> {
    let own_width = |o: Orientation| match o {
        Orientation::Landscape => widths.landscape,
        Orientation::Portrait => widths.portrait,
    };

    let mut nodes: Vec<Node> = images.iter().map(|(n, _)| Node::FigureRef(*n)).collect();
    for chunk in images.chunks(2) {
        let block = match chunk {
            [(a, first), (b, second)] => {
                let both_landscape = first.orientation == Orientation::Landscape
                    && second.orientation == Orientation::Landscape;
                let (wa, wb) = if both_landscape {
                    (PAIRED_LANDSCAPE_WIDTH, PAIRED_LANDSCAPE_WIDTH)
                } else {
                    (own_width(first.orientation), own_width(second.orientation))
                };
                templates::subfigure_block((*a, &first.path, wa), (*b, &second.path, wb))
            }
            [(a, only)] => templates::figure_block(*a, &only.path, own_width(only.orientation)),
            _ => continue,
        };
        nodes.push(Node::Latex("\n\n".into()));
        nodes.push(Node::Figure(block));
    }
    nodes
}
