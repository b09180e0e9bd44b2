//! # wp2latex
//!
//! Turn a WordPress export (WXR) into a LaTeX book.
//!
//! ## Why typed bodies?
//!
//! A post body goes through a dozen rewrites: HTML tags become LaTeX macros,
//! special characters get escaped, images become numbered figures. Done as
//! plain string substitution, each step would see the output of the previous
//! ones and happily escape the `_` in an `\includegraphics` path or the `#`
//! in an `\href`. Here the body is a sequence of typed nodes and everything
//! a rewriter emits is opaque to the rewriters after it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! WXR
//!  │
//!  ├─ 1. Parse     channel, authors, tags, posts, attachments (quick-xml)
//!  ├─ 2. Download  optional: fetch attachments into a media archive (async)
//!  ├─ 3. Index     walk the media archive once, file name → path
//!  ├─ 4. Render    per post: blocks, galleries, figures, rewriters
//!  └─ 5. Assemble  preamble, chapters, sections, \end{document}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wp2latex::{convert, ConversionConfig, FigureLayout};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .media_archive("uploads/")
//!         .layout(FigureLayout::Optimal)
//!         .build()?;
//!     let output = convert("blog.wordpress.xml", &config)?;
//!     std::fs::write("blog.tex", &output.latex)?;
//!     eprintln!("{} posts, {} figures",
//!         output.stats.rendered_posts,
//!         output.stats.total_figures);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `wp2latex` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! wp2latex = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod templates;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ChapterMode, ConversionConfig, ConversionConfigBuilder, FigureLayout, FigureWidths, PostOrder,
};
pub use convert::{convert, convert_blog, convert_str, convert_to_file, inspect};
pub use error::{FigureError, Wp2LatexError};
pub use output::{ConversionOutput, ConversionStats, ExportSummary, PostResult};
pub use pipeline::download::{download_attachments, DownloadFailure, DownloadReport};
pub use pipeline::layout::FigureCounter;
pub use pipeline::wxr::{parse_wxr, Attachment, Author, Blog, BlogInfo, Post, Tag};
pub use progress::{NoopProgressCallback, ProgressCallback, RenderProgressCallback};
