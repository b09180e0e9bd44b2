//! Image layout engine: image markers → numbered `figure` environments.
//!
//! ## Two decisions, kept apart
//!
//! 1. **Which image goes where** is a pure function of the orientations in
//!    reading order, see [`plan_layout`]. It knows nothing about paths,
//!    markup or numbering and is tested on its own.
//! 2. **What replaces each marker** is decided by [`layout_images`]: every
//!    marker becomes a ` [\ref{fig:N}]` annotation, and the marker that
//!    completes a figure also carries the `figure` block after a blank line.
//!
//! ## Numbering
//!
//! Numbers come from the document-wide [`FigureCounter`] the moment a
//! reference resolves, before any pairing decision. A pair therefore shows
//! the two numbers of its images in reading order. Markers that can't be
//! resolved are dropped and consume no number.
//!
//! ## The `optimal` second pass
//!
//! After the `paired` pass, neighbouring leftover singles are paired
//! regardless of orientation. The pass is greedy and order-sensitive: with
//! an odd run of singles between pairs the last one stays alone, and which
//! one that is depends on where the run starts. It only runs when the first
//! pass paired something.

use super::body::{Body, Node};
use super::media::{file_name_from_url, MediaIndex, Orientation};
use super::rewrite::escape_url;
use crate::config::{FigureLayout, FigureWidths};
use crate::error::FigureError;
use crate::templates;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Width of each half of a landscape pair, in units of `\textwidth`.
pub const PAIRED_LANDSCAPE_WIDTH: f32 = 0.45;

// ── Counter ──────────────────────────────────────────────────────────────────

/// Document-wide figure number source.
///
/// Starts at 1 and only ever moves forward. One counter is threaded by
/// `&mut` through every post of a document so labels never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureCounter {
    next: u32,
}

impl Default for FigureCounter {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl FigureCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue numbering from `next` (e.g. when appending to a document).
    pub fn starting_at(next: u32) -> Self {
        Self { next: next.max(1) }
    }

    /// The number the next figure will get.
    pub fn peek(&self) -> u32 {
        self.next
    }

    /// Hand out the next number.
    pub fn assign(&mut self) -> u32 {
        let n = self.next;
        self.next += 1;
        n
    }
}

// ── Planning ─────────────────────────────────────────────────────────────────

/// Where an image ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Its own `figure`.
    Single,
    /// First half of a pair; the block is emitted at its partner.
    PairedInto,
    /// Second half of a pair; carries the two-subfigure block.
    PairCarrier,
}

/// Placement and width (in `\textwidth`) of one image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub placement: Placement,
    pub width: f32,
}

/// Decide the arrangement of a post's images from their orientations.
///
/// `Paired` joins neighbours of equal orientation. `Optimal` then pairs the
/// leftover singles regardless of orientation, but only when the first pass
/// produced at least one pair: a landscape next to a portrait stays two
/// singles, and so does every image of an alternating `L,P,L,P` sequence.
pub fn plan_layout(
    orientations: &[Orientation],
    layout: FigureLayout,
    widths: FigureWidths,
) -> Vec<Slot> {
    let own_width = |o: Orientation| match o {
        Orientation::Landscape => widths.landscape,
        Orientation::Portrait => widths.portrait,
    };
    let mut slots: Vec<Slot> = orientations
        .iter()
        .map(|&o| Slot {
            placement: Placement::Single,
            width: own_width(o),
        })
        .collect();

    if layout == FigureLayout::Single {
        return slots;
    }

    for i in 1..slots.len() {
        if slots[i - 1].placement == Placement::Single && orientations[i - 1] == orientations[i] {
            let width = match orientations[i] {
                Orientation::Landscape => PAIRED_LANDSCAPE_WIDTH,
                Orientation::Portrait => widths.portrait,
            };
            slots[i - 1] = Slot {
                placement: Placement::PairedInto,
                width,
            };
            slots[i] = Slot {
                placement: Placement::PairCarrier,
                width,
            };
        }
    }

    let paired_any = slots.iter().any(|s| s.placement == Placement::PairCarrier);
    if layout == FigureLayout::Optimal && paired_any {
        let mut i = 0;
        while i + 1 < slots.len() {
            if slots[i].placement == Placement::Single
                && slots[i + 1].placement == Placement::Single
            {
                // Mixed pairs keep each image's own width.
                slots[i].placement = Placement::PairedInto;
                slots[i + 1].placement = Placement::PairCarrier;
                i += 2;
            } else {
                i += 1;
            }
        }
    }

    slots
}

// ── Markers ──────────────────────────────────────────────────────────────────

/// How images appear in a post body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerSyntax {
    /// Classic editor: `<img …>`, optionally wrapped in `<a …>…</a>`.
    Inline,
    /// Block editor: `<!-- wp:image … -->…<!-- /wp:image -->`. Stray inline
    /// images in a block post are matched too.
    Block,
}

static RE_INLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:<a\b[^>]*>\s*)?<img\b[^>]*>(?:\s*</a>)?").unwrap());

static RE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)<!-- wp:image\b.*?-->.*?<!-- /wp:image -->|(?:<a\b[^>]*>\s*)?<img\b[^>]*>(?:\s*</a>)?",
    )
    .unwrap()
});

static RE_SRC: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<img\b[^>]*?\ssrc="([^"]+)""#).unwrap());

static RE_HREF: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<a\b[^>]*?\shref="([^"]+)""#).unwrap());

impl MarkerSyntax {
    fn regex(self) -> &'static Regex {
        match self {
            MarkerSyntax::Inline => &RE_INLINE,
            MarkerSyntax::Block => &RE_BLOCK,
        }
    }
}

/// A resolved, probed image.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImage {
    pub path: PathBuf,
    pub orientation: Orientation,
}

/// Look an image URL up in the archive and read its orientation.
pub fn resolve_image(media: &MediaIndex, url: &str) -> Result<ResolvedImage, FigureError> {
    let path = media.resolve_url(url)?;
    let (w, h) = super::media::probe_dimensions(path)?;
    Ok(ResolvedImage {
        path: path.to_path_buf(),
        orientation: Orientation::from_dimensions(w, h),
    })
}

/// Widen `range` over a paragraph break right before it, so the annotation
/// attaches to the end of the preceding paragraph.
pub(crate) fn fold_paragraph_break(text: &str, range: Range<usize>) -> Range<usize> {
    if text[..range.start].ends_with("\n\n") {
        range.start - 2..range.end
    } else {
        range
    }
}

/// Target of a wrapping anchor, when it points somewhere other than the
/// image itself.
fn outside_link(marker: &str, src: &str) -> Option<String> {
    let href = RE_HREF.captures(marker)?.get(1)?.as_str();
    let same_image = match (file_name_from_url(href), file_name_from_url(src)) {
        (Some(a), Some(b)) => base_name(&a) == base_name(&b),
        _ => false,
    };
    if same_image {
        None
    } else {
        Some(escape_url(href))
    }
}

static RE_SIZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-\d+x\d+(\.[A-Za-z0-9]+)$").unwrap());

fn base_name(file_name: &str) -> String {
    RE_SIZE.replace(file_name, "$1").into_owned()
}

// ── Engine ───────────────────────────────────────────────────────────────────

/// Settings for one layout run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutOptions {
    pub syntax: MarkerSyntax,
    pub layout: FigureLayout,
    pub widths: FigureWidths,
}

struct Placed {
    range: Range<usize>,
    number: u32,
    image: ResolvedImage,
    link: Option<String>,
}

/// Replace every image marker in `body` with annotations and figure blocks.
///
/// Returns one warning per marker that was dropped.
pub fn layout_images(
    body: &mut Body,
    media: &MediaIndex,
    options: LayoutOptions,
    counter: &mut FigureCounter,
) -> Vec<FigureError> {
    let masked = body.masked();
    let text = masked.as_str();

    let mut warnings = Vec::new();
    let mut deletions: Vec<Range<usize>> = Vec::new();
    let mut placed: Vec<Placed> = Vec::new();

    for m in options.syntax.regex().find_iter(text) {
        let marker = m.as_str();
        let Some(src) = RE_SRC.captures(marker).and_then(|c| c.get(1)) else {
            warn!("Dropping image marker without src: {}", marker);
            warnings.push(FigureError::MalformedMarker {
                marker: marker.to_string(),
            });
            deletions.push(m.range());
            continue;
        };
        let src = src.as_str();

        match resolve_image(media, src) {
            Ok(image) => {
                let number = counter.assign();
                debug!(
                    "Figure {}: {} ({:?})",
                    number,
                    image.path.display(),
                    image.orientation
                );
                placed.push(Placed {
                    range: fold_paragraph_break(text, m.range()),
                    number,
                    link: outside_link(marker, src),
                    image,
                });
            }
            Err(e) => {
                warn!("Dropping image {}: {}", src, e);
                warnings.push(e);
                deletions.push(m.range());
            }
        }
    }

    if placed.is_empty() && deletions.is_empty() {
        return warnings;
    }

    let orientations: Vec<Orientation> = placed.iter().map(|p| p.image.orientation).collect();
    let slots = plan_layout(&orientations, options.layout, options.widths);

    let mut replacements: Vec<(Range<usize>, Vec<Node>)> = deletions
        .into_iter()
        .map(|r| (r, Vec::new()))
        .collect();

    for (idx, (p, slot)) in placed.iter().zip(&slots).enumerate() {
        let mut nodes = vec![Node::FigureRef(p.number)];
        if let Some(link) = &p.link {
            nodes.push(Node::ImageLink(link.clone()));
        }
        let partner = idx.checked_sub(1).map(|i| (&placed[i], slots[i].width));
        let block = match (slot.placement, partner) {
            (Placement::PairedInto, _) => None,
            (Placement::PairCarrier, Some((first, first_width))) => {
                Some(templates::subfigure_block(
                    (first.number, &first.image.path, first_width),
                    (p.number, &p.image.path, slot.width),
                ))
            }
            _ => Some(templates::figure_block(p.number, &p.image.path, slot.width)),
        };
        if let Some(block) = block {
            nodes.push(Node::Latex("\n\n".into()));
            nodes.push(Node::Figure(block));
        }
        replacements.push((p.range.clone(), nodes));
    }

    replacements.sort_by_key(|(r, _)| r.start);
    *body = masked.rebuild(replacements);
    body.hoist_trailing_refs();
    warnings
}
