//! Configuration types for WordPress-to-LaTeX conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Every knob the renderer reads lives
//! here, so two runs with equal configs over the same export and media
//! archive produce byte-identical LaTeX.

use crate::error::Wp2LatexError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Configuration for a WordPress-to-LaTeX conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use wp2latex::{ConversionConfig, FigureLayout};
///
/// let config = ConversionConfig::builder()
///     .media_archive("wp-content/uploads")
///     .layout(FigureLayout::Paired)
///     .figure_widths(0.6, 0.4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Root of the exported media files. Default: None.
    ///
    /// When unset, image markers are left to the inline-tag rewriters and
    /// gallery shortcodes are dropped with a warning.
    pub media_archive: Option<PathBuf>,

    /// Figure widths as fractions of `\textwidth`. Default: 0.5 / 0.4.
    pub figure_widths: FigureWidths,

    /// How consecutive images are arranged. Default: [`FigureLayout::Optimal`].
    pub layout: FigureLayout,

    /// Detect Gutenberg block comments and unwrap them. Default: true.
    ///
    /// When a post contains `<!-- wp:paragraph` the block wrappers are
    /// stripped and images are matched in their block-comment form.
    pub detect_blocks: bool,

    /// Keep ` [\ref{fig:N}]` annotations and image-link anchors in the body.
    /// Default: true.
    pub show_references: bool,

    /// Document title written by `\title{}`. Default: the blog title.
    pub title: Option<String>,

    /// Document author written by `\author{}`. Default: the first author's
    /// display name.
    pub author: Option<String>,

    /// Abstract text. Default: the blog description.
    pub abstract_text: Option<String>,

    /// How posts are grouped into chapters. Default: [`ChapterMode::None`].
    pub chapters: ChapterMode,

    /// Include drafts and private posts, not only published ones. Default: false.
    pub include_drafts: bool,

    /// Order of the sections in the output. Default: [`PostOrder::Document`].
    pub order: PostOrder,

    /// Append a `Tags:` line after each post body. Default: false.
    pub include_tags: bool,

    /// Per-post progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            media_archive: None,
            figure_widths: FigureWidths::default(),
            layout: FigureLayout::default(),
            detect_blocks: true,
            show_references: true,
            title: None,
            author: None,
            abstract_text: None,
            chapters: ChapterMode::default(),
            include_drafts: false,
            order: PostOrder::default(),
            include_tags: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("media_archive", &self.media_archive)
            .field("figure_widths", &self.figure_widths)
            .field("layout", &self.layout)
            .field("detect_blocks", &self.detect_blocks)
            .field("show_references", &self.show_references)
            .field("title", &self.title)
            .field("author", &self.author)
            .field("chapters", &self.chapters)
            .field("include_drafts", &self.include_drafts)
            .field("order", &self.order)
            .field("include_tags", &self.include_tags)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RenderProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn media_archive(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.media_archive = Some(path.into());
        self
    }

    pub fn figure_widths(mut self, landscape: f32, portrait: f32) -> Self {
        self.config.figure_widths = FigureWidths {
            landscape,
            portrait,
        };
        self
    }

    pub fn layout(mut self, layout: FigureLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn detect_blocks(mut self, v: bool) -> Self {
        self.config.detect_blocks = v;
        self
    }

    pub fn show_references(mut self, v: bool) -> Self {
        self.config.show_references = v;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.config.author = Some(author.into());
        self
    }

    pub fn abstract_text(mut self, text: impl Into<String>) -> Self {
        self.config.abstract_text = Some(text.into());
        self
    }

    pub fn chapters(mut self, mode: ChapterMode) -> Self {
        self.config.chapters = mode;
        self
    }

    pub fn include_drafts(mut self, v: bool) -> Self {
        self.config.include_drafts = v;
        self
    }

    pub fn order(mut self, order: PostOrder) -> Self {
        self.config.order = order;
        self
    }

    pub fn include_tags(mut self, v: bool) -> Self {
        self.config.include_tags = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Wp2LatexError> {
        let w = &self.config.figure_widths;
        for (name, v) in [("landscape", w.landscape), ("portrait", w.portrait)] {
            if !(v > 0.0 && v <= 1.0) {
                return Err(Wp2LatexError::InvalidConfig(format!(
                    "{name} figure width must be in (0, 1], got {v}"
                )));
            }
        }
        if let ChapterMode::Single(ref t) = self.config.chapters {
            if t.trim().is_empty() {
                return Err(Wp2LatexError::InvalidConfig(
                    "Chapter title must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Figure widths in units of `\textwidth`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FigureWidths {
    /// Width of a standalone landscape image. Default: 0.5.
    pub landscape: f32,
    /// Width of a standalone portrait image (and of each half of a portrait pair). Default: 0.4.
    pub portrait: f32,
}

impl Default for FigureWidths {
    fn default() -> Self {
        Self {
            landscape: 0.5,
            portrait: 0.4,
        }
    }
}

/// How the layout engine arranges consecutive images.
///
/// | Layout | Behaviour |
/// |--------|-----------|
/// | `Single`  | one figure per image, sized by orientation |
/// | `Paired`  | neighbours with matching orientation share a two-subfigure figure |
/// | `Optimal` | `Paired`, then leftover neighbouring singles are paired regardless of orientation |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FigureLayout {
    Single,
    Paired,
    #[default]
    Optimal,
}

impl FromStr for FigureLayout {
    type Err = Wp2LatexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" => Ok(FigureLayout::Single),
            "paired" => Ok(FigureLayout::Paired),
            "optimal" => Ok(FigureLayout::Optimal),
            other => Err(Wp2LatexError::InvalidConfig(format!(
                "Unknown figure layout '{other}' (expected single, paired or optimal)"
            ))),
        }
    }
}

/// How posts are grouped into `\chapter`s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChapterMode {
    /// No chapters; sections follow the table of contents directly. (default)
    #[default]
    None,
    /// A single chapter with the given title before the first post.
    Single(String),
    /// A new chapter whenever the publication year changes.
    ByYear,
}

/// Order in which posts become sections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostOrder {
    /// Keep the order of the export file. (default)
    #[default]
    Document,
    /// Oldest post first.
    Chronological,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ConversionConfig::default();
        assert_eq!(c.figure_widths.landscape, 0.5);
        assert_eq!(c.figure_widths.portrait, 0.4);
        assert_eq!(c.layout, FigureLayout::Optimal);
        assert!(c.detect_blocks);
        assert!(c.show_references);
        assert!(c.media_archive.is_none());
    }

    #[test]
    fn builder_rejects_zero_width() {
        let err = ConversionConfig::builder()
            .figure_widths(0.0, 0.4)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("landscape"));
    }

    #[test]
    fn builder_rejects_width_above_one() {
        assert!(ConversionConfig::builder()
            .figure_widths(0.5, 1.5)
            .build()
            .is_err());
    }

    #[test]
    fn builder_rejects_blank_chapter() {
        assert!(ConversionConfig::builder()
            .chapters(ChapterMode::Single("  ".into()))
            .build()
            .is_err());
    }

    #[test]
    fn layout_from_str() {
        assert_eq!("single".parse::<FigureLayout>().unwrap(), FigureLayout::Single);
        assert_eq!(" Paired ".parse::<FigureLayout>().unwrap(), FigureLayout::Paired);
        assert_eq!("OPTIMAL".parse::<FigureLayout>().unwrap(), FigureLayout::Optimal);
        assert!("grid".parse::<FigureLayout>().is_err());
    }
}
