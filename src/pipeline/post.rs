//! Post renderer: one WordPress post → one LaTeX `\section`.
//!
//! ## Stage order
//!
//! ```text
//! breaks/rules ─▶ blocks ─▶ galleries ─▶ images ─▶ URLs ─▶ symbols ─▶ tags
//!     ─▶ reference visibility ─▶ lists ─▶ blank-line collapse ─▶ section
//! ```
//!
//! Galleries and images run before the text rewriters so that their
//! markers are still raw HTML when matched. Their output is opaque from
//! then on, which is what keeps `\includegraphics` paths out of the symbol
//! escaper.

use super::blocks;
use super::body::Body;
use super::gallery;
use super::layout::{self, FigureCounter, LayoutOptions, MarkerSyntax};
use super::media::MediaIndex;
use super::rewrite;
use super::wxr::{Attachment, Post};
use crate::config::ConversionConfig;
use crate::output::PostResult;
use crate::templates;
use tracing::debug;

/// Shared, read-only inputs for rendering every post of a document.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub config: &'a ConversionConfig,
    /// Built once per document; `None` when no media archive is configured.
    pub media: Option<&'a MediaIndex>,
    pub attachments: &'a [Attachment],
}

/// Render `post`, drawing figure numbers from `counter`.
///
/// Never fails: references that can't become figures are dropped and
/// listed in [`PostResult::warnings`]. With `end_document` the section is
/// followed by `\end{document}`.
pub fn render_post(
    post: &Post,
    ctx: &RenderContext<'_>,
    counter: &mut FigureCounter,
    end_document: bool,
) -> PostResult {
    let config = ctx.config;
    let first_figure = counter.peek();
    let mut warnings = Vec::new();

    let mut body = Body::from_html(post.body.as_str());
    rewrite::normalise_breaks(&mut body);

    let uses_blocks = config.detect_blocks && blocks::has_blocks(&body);
    if uses_blocks {
        blocks::unwrap_blocks(&mut body);
    }

    warnings.extend(gallery::expand_galleries(
        &mut body,
        ctx.attachments,
        ctx.media,
        config.figure_widths,
        counter,
    ));

    if let Some(media) = ctx.media {
        let options = LayoutOptions {
            syntax: if uses_blocks {
                MarkerSyntax::Block
            } else {
                MarkerSyntax::Inline
            },
            layout: config.layout,
            widths: config.figure_widths,
        };
        warnings.extend(layout::layout_images(&mut body, media, options, counter));
    }

    rewrite::urls_to_latex(&mut body);
    rewrite::symbols_to_latex(&mut body);
    rewrite::html_tags_to_latex(&mut body);

    if !config.show_references {
        body.strip_references();
    }

    rewrite::lists_to_latex(&mut body);
    let rendered = body.render();

    let title = if post.title.trim().is_empty() {
        "Untitled".to_string()
    } else {
        rewrite::escape_text(post.title.trim())
    };

    let mut latex = templates::section(&title, &post.slug);
    latex.push('\n');
    if let Some(date) = &post.published {
        latex.push_str(&templates::date_line(date));
        latex.push('\n');
    }
    latex.push_str(rendered.trim_matches('\n'));
    latex.push_str("\n\n");

    if config.include_tags && !post.tags.is_empty() {
        let tags: Vec<String> = post.tags.iter().map(|t| rewrite::escape_text(t)).collect();
        latex.push_str(&format!("\\textit{{Tags: {}}}\n\n", tags.join(", ")));
    }
    if end_document {
        latex.push_str(templates::END_DOCUMENT);
    }

    let figures: Vec<u32> = (first_figure..counter.peek()).collect();
    debug!(
        "Rendered post {} '{}': {} figures, {} warnings",
        post.id,
        post.title,
        figures.len(),
        warnings.len()
    );

    PostResult {
        post_id: post.id.clone(),
        title: post.title.clone(),
        slug: post.slug.clone(),
        latex: rewrite::collapse_blank_lines(&latex),
        figures,
        warnings,
    }
}
