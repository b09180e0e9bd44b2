//! Document assembly entry points.
//!
//! ## Why synchronous?
//!
//! Figure numbers must follow reading order across the whole document, so
//! posts are rendered one after another with a single [`FigureCounter`]
//! threaded through. Nothing here waits on the network; the one async stage
//! (attachment download) lives in [`crate::pipeline::download`] and runs
//! before conversion.

use crate::config::{ChapterMode, ConversionConfig, PostOrder};
use crate::error::Wp2LatexError;
use crate::output::{ConversionOutput, ConversionStats, ExportSummary, PostResult};
use crate::pipeline::blocks::BLOCK_MARKER;
use crate::pipeline::layout::FigureCounter;
use crate::pipeline::media::MediaIndex;
use crate::pipeline::post::{render_post, RenderContext};
use crate::pipeline::rewrite::escape_text;
use crate::pipeline::wxr::{self, Blog, Post};
use crate::templates;
use chrono::Datelike;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Convert a WordPress export file to LaTeX.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ConversionOutput)` on success, even if some images were dropped
/// (check each [`PostResult::warnings`] or `output.stats.dropped_references`).
///
/// # Errors
/// Returns `Err(Wp2LatexError)` only for fatal errors:
/// - File not found / permission denied
/// - Malformed XML, or XML that is not a WordPress export
/// - Configured media archive missing
pub fn convert(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Wp2LatexError> {
    let path = input.as_ref();
    info!("Starting conversion: {}", path.display());
    let xml = read_export(path)?;
    convert_str(&xml, config)
}

/// Convert an export held in memory.
pub fn convert_str(xml: &str, config: &ConversionConfig) -> Result<ConversionOutput, Wp2LatexError> {
    let blog = wxr::parse_wxr(xml)?;
    convert_blog(&blog, config)
}

/// Convert an already parsed export.
pub fn convert_blog(blog: &Blog, config: &ConversionConfig) -> Result<ConversionOutput, Wp2LatexError> {
    let total_start = Instant::now();

    // ── Step 1: Index the media archive once ─────────────────────────────
    let media = config
        .media_archive
        .as_deref()
        .map(MediaIndex::build)
        .transpose()?;

    // ── Step 2: Select and order posts ───────────────────────────────────
    let mut posts: Vec<&Post> = blog
        .posts
        .iter()
        .filter(|p| config.include_drafts || p.is_published())
        .collect();
    if config.order == PostOrder::Chronological {
        // Stable: undated drafts first, ties keep export order.
        posts.sort_by_key(|p| p.published);
    }
    let total = posts.len();
    debug!("Rendering {} of {} posts", total, blog.posts.len());

    if let Some(ref cb) = config.progress_callback {
        cb.on_render_start(total);
    }

    // ── Step 3: Preamble ─────────────────────────────────────────────────
    let mut latex = preamble(blog, config);
    if let ChapterMode::Single(title) = &config.chapters {
        latex.push_str(&templates::chapter(&escape_text(title.trim())));
    }

    // ── Step 4: Posts, in order, sharing one counter ─────────────────────
    let ctx = RenderContext {
        config,
        media: media.as_ref(),
        attachments: &blog.attachments,
    };
    let mut counter = FigureCounter::new();
    let mut results: Vec<PostResult> = Vec::with_capacity(total);
    let mut current_year: Option<Option<i32>> = None;

    for (i, post) in posts.iter().enumerate() {
        let post_num = i + 1;
        if config.chapters == ChapterMode::ByYear {
            let year = post.published.map(|d| d.year());
            if current_year != Some(year) {
                let title = year.map_or_else(|| "Undated".to_string(), |y| y.to_string());
                latex.push_str(&templates::chapter(&title));
                current_year = Some(year);
            }
        }

        if let Some(ref cb) = config.progress_callback {
            cb.on_post_start(post_num, total, &post.title);
        }

        let result = render_post(post, &ctx, &mut counter, post_num == total);

        if let Some(ref cb) = config.progress_callback {
            for w in &result.warnings {
                cb.on_post_warning(post_num, &w.to_string());
            }
            cb.on_post_complete(post_num, total, result.figures.len());
        }

        latex.push_str(&result.latex);
        results.push(result);
    }

    if total == 0 {
        latex.push_str(templates::END_DOCUMENT);
    }

    // ── Step 5: Stats ────────────────────────────────────────────────────
    let total_figures = (counter.peek() - 1) as usize;
    let stats = ConversionStats {
        total_posts: blog.posts.len(),
        rendered_posts: total,
        skipped_posts: blog.posts.len() - total,
        total_figures,
        dropped_references: results.iter().map(|r| r.warnings.len()).sum(),
        attachments: blog.attachments.len(),
        duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {} posts, {} figures, {} dropped references, {}ms",
        stats.rendered_posts, stats.total_figures, stats.dropped_references, stats.duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_render_complete(total, total_figures);
    }

    Ok(ConversionOutput {
        latex,
        posts: results,
        blog: blog.info.clone(),
        stats,
    })
}

/// Convert an export and write the LaTeX directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub fn convert_to_file(
    input: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Wp2LatexError> {
    let output = convert(input, config)?;
    write_atomic(output_path.as_ref(), &output.latex)?;
    Ok(output)
}

/// Write `contents` to `path` through a temp file in the same directory.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), Wp2LatexError> {
    let write_err = |e: std::io::Error| Wp2LatexError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    tmp.write_all(contents.as_bytes()).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Summarise an export without rendering it.
pub fn inspect(input: impl AsRef<Path>) -> Result<ExportSummary, Wp2LatexError> {
    let xml = read_export(input.as_ref())?;
    let blog = wxr::parse_wxr(&xml)?;
    Ok(summarise(&blog))
}

/// Counts and date range of a parsed export.
pub fn summarise(blog: &Blog) -> ExportSummary {
    let dates: Vec<_> = blog.posts.iter().filter_map(|p| p.published).collect();
    ExportSummary {
        blog: blog.info.clone(),
        authors: blog.authors.clone(),
        tags: blog.tags.len(),
        posts: blog.posts.len(),
        published_posts: blog.posts.iter().filter(|p| p.is_published()).count(),
        attachments: blog.attachments.len(),
        image_markers: blog.posts.iter().map(|p| p.body.matches("<img").count()).sum(),
        galleries: blog.posts.iter().map(|p| p.body.matches("[gallery").count()).sum(),
        block_posts: blog
            .posts
            .iter()
            .filter(|p| p.body.contains(BLOCK_MARKER))
            .count(),
        first_post: dates.iter().min().map(|d| d.to_rfc3339()),
        last_post: dates.iter().max().map(|d| d.to_rfc3339()),
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Read an export file, mapping I/O failures to fatal errors.
fn read_export(path: &Path) -> Result<String, Wp2LatexError> {
    if !path.exists() {
        return Err(Wp2LatexError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Wp2LatexError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(Wp2LatexError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    String::from_utf8(bytes).map_err(|e| Wp2LatexError::MalformedXml {
        position: e.utf8_error().valid_up_to() as u64,
        detail: "export is not valid UTF-8".to_string(),
    })
}

/// Preamble with title, author and abstract falling back to the export.
fn preamble(blog: &Blog, config: &ConversionConfig) -> String {
    let title = config
        .title
        .clone()
        .unwrap_or_else(|| blog.info.title.clone());
    let author = config.author.clone().unwrap_or_else(|| {
        blog.authors
            .first()
            .map(|a| {
                if a.display_name.is_empty() {
                    a.login.clone()
                } else {
                    a.display_name.clone()
                }
            })
            .unwrap_or_default()
    });
    let abstract_text = config
        .abstract_text
        .clone()
        .or_else(|| Some(blog.info.description.clone()))
        .filter(|s| !s.trim().is_empty())
        .map(|s| escape_text(s.trim()));

    templates::preamble(
        &escape_text(title.trim()),
        &escape_text(author.trim()),
        abstract_text.as_deref(),
    )
}
