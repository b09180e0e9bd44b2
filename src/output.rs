//! Output types returned by the conversion entry points.

use crate::error::FigureError;
use crate::pipeline::wxr::{Author, BlogInfo};
use serde::{Deserialize, Serialize};

/// A finished document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// The complete `.tex` source, from `\documentclass` to `\end{document}`.
    pub latex: String,
    /// One entry per rendered post, in output order.
    pub posts: Vec<PostResult>,
    pub blog: BlogInfo,
    pub stats: ConversionStats,
}

/// Result of rendering a single post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResult {
    pub post_id: String,
    pub title: String,
    pub slug: String,

    /// The post's section, already part of [`ConversionOutput::latex`].
    #[serde(skip)]
    pub latex: String,

    /// Figure numbers assigned while rendering this post, ascending.
    pub figures: Vec<u32>,

    /// Image references and gallery entries that were dropped.
    pub warnings: Vec<FigureError>,
}

impl PostResult {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Counters for a conversion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Posts in the export, before the draft filter.
    pub total_posts: usize,
    /// Posts written to the document.
    pub rendered_posts: usize,
    /// Posts left out (drafts, private, pending).
    pub skipped_posts: usize,
    /// Figure labels issued across the whole document.
    pub total_figures: usize,
    /// Image references and gallery entries that produced no figure.
    pub dropped_references: usize,
    /// Attachments listed in the export.
    pub attachments: usize,
    /// Wall-clock time from parse to assembled document.
    pub duration_ms: u64,
}

/// What an export contains, without rendering anything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportSummary {
    pub blog: BlogInfo,
    pub authors: Vec<Author>,
    pub tags: usize,
    pub posts: usize,
    pub published_posts: usize,
    pub attachments: usize,
    /// `<img` occurrences across all post bodies.
    pub image_markers: usize,
    /// `[gallery` shortcodes across all post bodies.
    pub galleries: usize,
    /// Posts written with the block editor.
    pub block_posts: usize,
    /// Publication date of the oldest post (RFC 3339).
    pub first_post: Option<String>,
    /// Publication date of the newest post (RFC 3339).
    pub last_post: Option<String>,
}
