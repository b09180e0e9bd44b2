//! CLI binary for wp2latex.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wp2latex::{
    convert, convert_to_file, download_attachments, inspect, parse_wxr, ChapterMode,
    ConversionConfig, ConversionOutput, FigureLayout, PostOrder, ProgressCallback,
    RenderProgressCallback,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn spinner(prefix: &'static str, msg: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS),
    );
    bar.set_prefix(prefix);
    bar.set_message(msg);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn shorten(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per post.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Dropped references seen so far.
    warnings: AtomicUsize,
}

impl CliProgressCallback {
    /// The bar length is set by `on_render_start` once the post count is known.
    fn new_dynamic() -> Arc<Self> {
        Arc::new(Self {
            bar: spinner("Preparing", "Reading export…"),
            warnings: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} posts  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
    }
}

impl RenderProgressCallback for CliProgressCallback {
    fn on_render_start(&self, total_posts: usize) {
        self.activate_bar(total_posts);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total_posts} posts…"))
        ));
    }

    fn on_post_start(&self, _post_num: usize, _total: usize, title: &str) {
        self.bar.set_message(shorten(title, 40));
    }

    fn on_post_warning(&self, post_num: usize, warning: &str) {
        self.warnings.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Post {:>4}  {}",
            yellow("⚠"),
            post_num,
            dim(&shorten(warning, 90))
        ));
    }

    fn on_post_complete(&self, _post_num: usize, _total: usize, _figures: usize) {
        self.bar.inc(1);
    }

    fn on_render_complete(&self, total_posts: usize, total_figures: usize) {
        self.bar.finish_and_clear();
        let dropped = self.warnings.load(Ordering::SeqCst);
        eprintln!(
            "{} {} posts, {} figures{}",
            if dropped == 0 { green("✔") } else { cyan("⚠") },
            bold(&total_posts.to_string()),
            bold(&total_figures.to_string()),
            if dropped == 0 {
                String::new()
            } else {
                format!("  ({} references dropped)", yellow(&dropped.to_string()))
            }
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (stdout)
  wp2latex blog.wordpress.xml

  # With figures from the uploads folder
  wp2latex blog.wordpress.xml --media-archive wp-content/uploads -o blog.tex

  # Fetch every attachment first, then use them as the media archive
  wp2latex blog.wordpress.xml --download media/ -o blog.tex

  # One figure per image, narrower landscape figures
  wp2latex --layout single --landscape-width 0.4 blog.wordpress.xml

  # Oldest post first, one chapter per year
  wp2latex --chronological --chapters-by-year blog.wordpress.xml -o blog.tex

  # What does this export contain?
  wp2latex --inspect-only blog.wordpress.xml

  # JSON output with per-post figures and warnings
  wp2latex --json --media-archive uploads/ blog.wordpress.xml > output.json

LAYOUTS:
  single    every image is its own figure
  paired    neighbouring images of the same orientation share a figure
  optimal   paired, then leftover neighbours are paired regardless of
            orientation (default)

ENVIRONMENT VARIABLES:
  RUST_LOG                Override the log filter (e.g. wp2latex=debug)
  WP2LATEX_MEDIA_ARCHIVE  Default for --media-archive
  WP2LATEX_LAYOUT         Default for --layout
"#;

/// Convert WordPress exports to LaTeX.
#[derive(Parser, Debug)]
#[command(
    name = "wp2latex",
    version,
    about = "Convert WordPress XML exports to LaTeX",
    long_about = "Convert a WordPress export (WXR) into a single LaTeX document: one section \
per post, images as numbered figures arranged singly or in pairs, HTML markup and special \
characters rewritten for LaTeX.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// WordPress export file (WXR).
    input: PathBuf,

    /// Write LaTeX to this file instead of stdout.
    #[arg(short, long, env = "WP2LATEX_OUTPUT")]
    output: Option<PathBuf>,

    /// Directory holding the exported media files.
    #[arg(long, env = "WP2LATEX_MEDIA_ARCHIVE")]
    media_archive: Option<PathBuf>,

    /// Figure arrangement: single, paired, optimal.
    #[arg(long, env = "WP2LATEX_LAYOUT", value_enum, default_value = "optimal")]
    layout: LayoutArg,

    /// Width of a landscape figure as a fraction of \textwidth.
    #[arg(long, default_value_t = 0.5)]
    landscape_width: f32,

    /// Width of a portrait figure as a fraction of \textwidth.
    #[arg(long, default_value_t = 0.4)]
    portrait_width: f32,

    /// Drop the [\ref{fig:N}] annotations from the text.
    #[arg(long)]
    hide_references: bool,

    /// Treat block-editor posts like classic ones.
    #[arg(long)]
    no_blocks: bool,

    /// Document title (default: the blog title).
    #[arg(long)]
    title: Option<String>,

    /// Document author (default: the first author in the export).
    #[arg(long)]
    author: Option<String>,

    /// Abstract text (default: the blog description).
    #[arg(long = "abstract")]
    abstract_text: Option<String>,

    /// Put every post in one chapter with this title.
    #[arg(long, conflicts_with = "chapters_by_year")]
    chapter: Option<String>,

    /// Start a new chapter whenever the publication year changes.
    #[arg(long)]
    chapters_by_year: bool,

    /// Render drafts and other unpublished posts too.
    #[arg(long)]
    include_drafts: bool,

    /// Oldest post first instead of export order.
    #[arg(long)]
    chronological: bool,

    /// Add a tags line after each post.
    #[arg(long)]
    tags: bool,

    /// Download every attachment into DIR before converting.
    #[arg(long, value_name = "DIR")]
    download: Option<PathBuf>,

    /// Simultaneous downloads.
    #[arg(long, default_value_t = wp2latex::pipeline::download::DEFAULT_CONCURRENCY)]
    download_concurrency: usize,

    /// Print a summary of the export only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Output structured JSON (ConversionOutput) instead of LaTeX.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "WP2LATEX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "WP2LATEX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "WP2LATEX_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LayoutArg {
    Single,
    Paired,
    Optimal,
}

impl From<LayoutArg> for FigureLayout {
    fn from(v: LayoutArg) -> Self {
        match v {
            LayoutArg::Single => FigureLayout::Single,
            LayoutArg::Paired => FigureLayout::Paired,
            LayoutArg::Optimal => FigureLayout::Optimal,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let summary = inspect(&cli.input).context("Failed to inspect export")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
            );
        } else {
            println!("File:         {}", cli.input.display());
            println!("Blog:         {}", summary.blog.title);
            if !summary.blog.link.is_empty() {
                println!("Link:         {}", summary.blog.link);
            }
            for a in &summary.authors {
                println!("Author:       {} <{}>", a.display_name, a.login);
            }
            println!(
                "Posts:        {} ({} published)",
                summary.posts, summary.published_posts
            );
            println!("Block posts:  {}", summary.block_posts);
            println!("Tags:         {}", summary.tags);
            println!("Attachments:  {}", summary.attachments);
            println!("Images:       {}", summary.image_markers);
            println!("Galleries:    {}", summary.galleries);
            if let (Some(first), Some(last)) = (&summary.first_post, &summary.last_post) {
                println!("Published:    {} .. {}", first, last);
            }
        }
        return Ok(());
    }

    // ── Optional attachment download ─────────────────────────────────────
    let mut media_archive = cli.media_archive.clone();
    if let Some(ref dir) = cli.download {
        let xml = tokio::fs::read_to_string(&cli.input)
            .await
            .with_context(|| format!("Failed to read {}", cli.input.display()))?;
        let blog = parse_wxr(&xml).context("Failed to parse export")?;

        let bar = show_progress.then(|| spinner("Downloading", "attachments…"));
        let report = download_attachments(&blog.attachments, dir, cli.download_concurrency)
            .await
            .context("Attachment download failed")?;
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }

        if !cli.quiet {
            eprintln!(
                "{} {} downloaded, {} already present, {} failed",
                if report.failures.is_empty() {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                bold(&report.downloaded.len().to_string()),
                report.already_present,
                report.failures.len()
            );
            for f in &report.failures {
                eprintln!("  {} {}  {}", yellow("✗"), f.url, dim(&f.reason));
            }
        }
        if media_archive.is_none() {
            media_archive = Some(dir.clone());
        }
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn RenderProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, media_archive, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    // Rendering is CPU-bound and synchronous; keep it off the runtime.
    let input = cli.input.clone();
    let output_path = cli.output.clone();
    let output: ConversionOutput = tokio::task::spawn_blocking(move || match output_path {
        Some(path) => convert_to_file(&input, &path, &config),
        None => convert(&input, &config),
    })
    .await
    .context("Conversion task panicked")?
    .context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.output.is_none() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.latex.as_bytes())
            .context("Failed to write to stdout")?;
    }

    // Summary (the callback already printed its own line).
    if !cli.quiet && !show_progress {
        eprintln!(
            "Rendered {}/{} posts, {} figures in {}ms",
            output.stats.rendered_posts,
            output.stats.total_posts,
            output.stats.total_figures,
            output.stats.duration_ms
        );
        if output.stats.dropped_references > 0 {
            eprintln!(
                "  {} image references dropped",
                output.stats.dropped_references
            );
        }
    }
    if !cli.quiet {
        if let Some(ref path) = cli.output {
            eprintln!("   →  {}", bold(&path.display().to_string()));
        }
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(
    cli: &Cli,
    media_archive: Option<PathBuf>,
    progress: Option<ProgressCallback>,
) -> Result<ConversionConfig> {
    let chapters = match (&cli.chapter, cli.chapters_by_year) {
        (Some(title), _) => ChapterMode::Single(title.clone()),
        (None, true) => ChapterMode::ByYear,
        (None, false) => ChapterMode::None,
    };

    let mut builder = ConversionConfig::builder()
        .layout(cli.layout.into())
        .figure_widths(cli.landscape_width, cli.portrait_width)
        .show_references(!cli.hide_references)
        .detect_blocks(!cli.no_blocks)
        .chapters(chapters)
        .include_drafts(cli.include_drafts)
        .include_tags(cli.tags)
        .order(if cli.chronological {
            PostOrder::Chronological
        } else {
            PostOrder::Document
        });

    if let Some(dir) = media_archive {
        builder = builder.media_archive(dir);
    }
    if let Some(ref t) = cli.title {
        builder = builder.title(t.clone());
    }
    if let Some(ref a) = cli.author {
        builder = builder.author(a.clone());
    }
    if let Some(ref a) = cli.abstract_text {
        builder = builder.abstract_text(a.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
