//! Pipeline stages for WordPress-to-LaTeX conversion.
//!
//! Each submodule implements one transformation step and is tested on its
//! own.
//!
//! ## Data Flow
//!
//! ```text
//! wxr ──▶ (download) ──▶ media ──▶ post
//!                                   │
//!          body ◀── blocks, gallery, layout, rewrite
//! ```
//!
//! 1. [`wxr`]      parse the export into a [`wxr::Blog`]
//! 2. [`download`] fetch attachments into a local directory; the only
//!    stage with network I/O
//! 3. [`media`]    index the media archive and probe image dimensions
//! 4. [`post`]     render one post, driving the stages below over a
//!    [`body::Body`]:
//!    - [`blocks`]  unwrap block-editor comments
//!    - [`gallery`] expand `[gallery]` shortcodes into figures
//!    - [`layout`]  number images and arrange them into figure blocks
//!    - [`rewrite`] HTML and special characters to LaTeX

pub mod blocks;
pub mod body;
pub mod download;
pub mod gallery;
pub mod layout;
pub mod media;
pub mod post;
pub mod rewrite;
pub mod wxr;
