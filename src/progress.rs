//! Progress-callback trait for per-post rendering events.
//!
//! Inject an [`Arc<dyn RenderProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the document assembler renders each post.
//!
//! Rendering is strictly sequential (figure numbers follow reading order),
//! so events always arrive in post order. The trait is still `Send + Sync`
//! because the CLI renders on a blocking worker thread while the progress
//! bar lives on the main thread.
//!
//! # Example
//!
//! ```rust
//! use wp2latex::{ConversionConfig, RenderProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     figures: Arc<AtomicUsize>,
//! }
//!
//! impl RenderProgressCallback for CountingCallback {
//!     fn on_post_complete(&self, post_num: usize, total_posts: usize, figures: usize) {
//!         self.figures.fetch_add(figures, Ordering::SeqCst);
//!         eprintln!("Post {}/{} done", post_num, total_posts);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     figures: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn RenderProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the document assembler as it renders each post.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait RenderProgressCallback: Send + Sync {
    /// Called once after the export is parsed, before any post is rendered.
    ///
    /// # Arguments
    /// * `total_posts`: number of posts that will be rendered
    fn on_render_start(&self, total_posts: usize) {
        let _ = total_posts;
    }

    /// Called just before a post's body enters the rewrite pipeline.
    ///
    /// # Arguments
    /// * `post_num`: 1-indexed position of the post in the output
    /// * `total_posts`: total posts being rendered
    /// * `title`: the post title as found in the export
    fn on_post_start(&self, post_num: usize, total_posts: usize, title: &str) {
        let _ = (post_num, total_posts, title);
    }

    /// Called once per dropped image reference or gallery entry.
    fn on_post_warning(&self, post_num: usize, warning: &str) {
        let _ = (post_num, warning);
    }

    /// Called when a post's section has been written.
    ///
    /// # Arguments
    /// * `figures`: number of figure labels the post consumed
    fn on_post_complete(&self, post_num: usize, total_posts: usize, figures: usize) {
        let _ = (post_num, total_posts, figures);
    }

    /// Called once after the closing `\end{document}` has been written.
    fn on_render_complete(&self, total_posts: usize, total_figures: usize) {
        let _ = (total_posts, total_figures);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RenderProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn RenderProgressCallback>;
