//! End-to-end integration tests for wp2latex.
//!
//! Each test builds a small WXR export in memory and, where figures are
//! involved, a temporary media archive of generated PNGs. Nothing touches
//! the network.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wp2latex::{
    convert, convert_str, convert_to_file, inspect, ChapterMode, ConversionConfig, FigureLayout,
    PostOrder, RenderProgressCallback, Wp2LatexError,
};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// A post item: (title, gmt date, status, body).
fn item(id: u32, title: &str, date: &str, status: &str, body: &str) -> String {
    format!(
        r#"  <item>
    <title>{title}</title>
    <link>https://blog.example/p/{id}</link>
    <dc:creator><![CDATA[ann]]></dc:creator>
    <content:encoded><![CDATA[{body}]]></content:encoded>
    <wp:post_id>{id}</wp:post_id>
    <wp:post_date_gmt>{date}</wp:post_date_gmt>
    <wp:post_name>post-{id}</wp:post_name>
    <wp:status>{status}</wp:status>
    <wp:post_type>post</wp:post_type>
    <category domain="post_tag" nicename="travel"><![CDATA[Travel]]></category>
  </item>
"#
    )
}

fn export(items: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"
  xmlns:content="http://purl.org/rss/1.0/modules/content/"
  xmlns:dc="http://purl.org/dc/elements/1.1/"
  xmlns:wp="http://wordpress.org/export/1.2/">
<channel>
  <title>Field Notes</title>
  <link>https://blog.example</link>
  <description>Notes from the road</description>
  <language>en-GB</language>
  <wp:author>
    <wp:author_login><![CDATA[ann]]></wp:author_login>
    <wp:author_email><![CDATA[ann@blog.example]]></wp:author_email>
    <wp:author_display_name><![CDATA[Ann Example]]></wp:author_display_name>
  </wp:author>
{}</channel>
</rss>
"#,
        items.concat()
    )
}

/// A media archive with two landscape and two portrait images.
fn media_archive() -> TempDir {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("2020/04");
    std::fs::create_dir_all(&nested).unwrap();
    for (name, w, h) in [
        ("wide1.png", 60, 30),
        ("wide2.png", 60, 30),
        ("tall1.png", 30, 60),
        ("tall2.png", 30, 60),
    ] {
        image::RgbImage::new(w, h).save(nested.join(name)).unwrap();
    }
    dir
}

fn img(name: &str) -> String {
    format!("<img class=\"size-large\" src=\"https://blog.example/wp-content/uploads/2020/04/{name}\" alt=\"\" />")
}

fn config(media: &Path, layout: FigureLayout) -> ConversionConfig {
    ConversionConfig::builder()
        .media_archive(media)
        .layout(layout)
        .build()
        .unwrap()
}

/// All `\label{fig:N}` numbers in order of appearance (pair labels excluded).
fn figure_labels(latex: &str) -> Vec<u32> {
    latex
        .match_indices("\\label{fig:")
        .filter_map(|(i, m)| {
            let rest = &latex[i + m.len()..];
            let end = rest.find('}')?;
            rest[..end].parse().ok()
        })
        .collect()
}

// ── Document structure ──────────────────────────────────────────────────────

#[test]
fn test_document_skeleton() {
    let xml = export(&[item(
        1,
        "First",
        "2020-04-04 13:45:00",
        "publish",
        "Hello <strong>world</strong>.",
    )]);
    let out = convert_str(&xml, &ConversionConfig::default()).unwrap();

    assert!(out.latex.starts_with("\\documentclass"));
    assert!(out.latex.contains("\\title{Field Notes}"));
    assert!(out.latex.contains("\\author{Ann Example}"));
    assert!(out.latex.contains("\\begin{abstract}\nNotes from the road\n\\end{abstract}"));
    assert!(out.latex.contains("\\section{First}\\label{post:post-1}"));
    assert!(out
        .latex
        .contains("\\noindent \\emph{Published on 4th Apr 2020, 13:45.}"));
    assert!(out.latex.contains("Hello \\textbf{world}."));
    assert!(out.latex.ends_with("\\end{document}\n"));
    assert_eq!(out.latex.matches("\\end{document}").count(), 1);
    assert_eq!(out.stats.rendered_posts, 1);
    assert_eq!(out.blog.title, "Field Notes");
}

#[test]
fn test_text_rewrites() {
    let body = "<strong>Bold</strong> and <em>soft</em>. It cost 100% & $5.\n\
                <a href=\"http://x.test/\">Label</a> and <a href=\"http://y.test/\"></a>";
    let xml = export(&[item(1, "Rewrites", "2020-01-01 00:00:00", "publish", body)]);
    let out = convert_str(&xml, &ConversionConfig::default()).unwrap();

    assert!(out.latex.contains("\\textbf{Bold} and \\emph{soft}"));
    assert!(out.latex.contains("100\\% \\& \\$5"));
    assert!(out.latex.contains("\\href{http://x.test/}{Label}"));
    assert!(out.latex.contains("\\href{http://y.test/}{http://y.test/}"));
    assert!(!out.latex.contains("<strong>"));
    assert!(!out.latex.contains("<a "));
}

#[test]
fn test_never_three_newlines() {
    let body = format!(
        "One\n\n\n\n\nTwo<br /><br /><br />\n\n\nThree\n\n{}\n\n\n\n{}\n\n\n",
        img("wide1.png"),
        img("tall1.png")
    );
    let media = media_archive();
    let xml = export(&[
        item(1, "A", "2020-01-01 00:00:00", "publish", &body),
        item(2, "B", "2020-01-02 00:00:00", "publish", "\n\n\n\nx\n\n\n\n"),
    ]);
    for layout in [FigureLayout::Single, FigureLayout::Paired, FigureLayout::Optimal] {
        let out = convert_str(&xml, &config(media.path(), layout)).unwrap();
        assert!(!out.latex.contains("\n\n\n"), "layout {layout:?}");
    }
}

// ── Figures ──────────────────────────────────────────────────────────────────

#[test]
fn test_paired_landscapes_share_a_figure() {
    let media = media_archive();
    let body = format!("Look.\n\n{}\n\n{}", img("wide1.png"), img("wide2.png"));
    let xml = export(&[item(1, "Pair", "2020-01-01 00:00:00", "publish", &body)]);

    let paired = convert_str(&xml, &config(media.path(), FigureLayout::Paired)).unwrap();
    assert_eq!(paired.latex.matches("\\begin{subfigure}").count(), 2);
    assert!(paired.latex.contains("\\label{fig:1-2}"));
    assert_eq!(paired.latex.matches("{0.45\\textwidth}").count(), 2);
    assert_eq!(paired.posts[0].figures, vec![1, 2]);

    let single = convert_str(&xml, &config(media.path(), FigureLayout::Single)).unwrap();
    assert!(!single.latex.contains("subfigure"));
    assert_eq!(single.latex.matches("\\begin{figure}\n").count(), 2);
    assert_eq!(figure_labels(&single.latex), vec![1, 2]);
}

#[test]
fn test_optimal_across_two_posts() {
    let media = media_archive();
    let a = format!("Mixed.\n\n{}\n\n{}", img("wide1.png"), img("tall1.png"));
    let b = format!("Wide.\n\n{}\n\n{}", img("wide1.png"), img("wide2.png"));
    let xml = export(&[
        item(1, "A", "2020-01-01 00:00:00", "publish", &a),
        item(2, "B", "2020-01-02 00:00:00", "publish", &b),
    ]);
    let out = convert_str(&xml, &config(media.path(), FigureLayout::Optimal)).unwrap();

    // Landscape + portrait: no pair in the first pass, so two singles.
    assert_eq!(out.posts[0].figures, vec![1, 2]);
    assert!(!out.posts[0].latex.contains("subfigure"));
    assert_eq!(out.posts[0].latex.matches("\\begin{figure}\n").count(), 2);

    // Landscape + landscape: one pair, numbering continues from post A.
    assert_eq!(out.posts[1].figures, vec![3, 4]);
    assert!(out.posts[1].latex.contains("\\label{fig:3-4}"));
    assert_eq!(out.stats.total_figures, 4);
}

#[test]
fn test_numbers_strictly_increase() {
    let media = media_archive();
    let names = ["wide1.png", "tall1.png", "tall2.png", "wide2.png", "wide1.png"];
    let body: Vec<String> = names.iter().map(|n| img(n)).collect();
    let body = body.join("\n\nSome text.\n\n");
    let xml = export(&[
        item(1, "A", "2020-01-01 00:00:00", "publish", &body),
        item(2, "B", "2020-01-02 00:00:00", "publish", &body),
    ]);
    for layout in [FigureLayout::Single, FigureLayout::Paired, FigureLayout::Optimal] {
        let out = convert_str(&xml, &config(media.path(), layout)).unwrap();
        let all: Vec<u32> = out.posts.iter().flat_map(|p| p.figures.clone()).collect();
        assert_eq!(all, (1..=10).collect::<Vec<_>>(), "layout {layout:?}");
        let mut labels = figure_labels(&out.latex);
        labels.sort_unstable();
        assert_eq!(labels, (1..=10).collect::<Vec<_>>(), "layout {layout:?}");
    }
}

#[test]
fn test_missing_image_is_dropped_with_warning() {
    let media = media_archive();
    let body = format!("{}\n\n{}", img("nowhere.png"), img("tall1.png"));
    let xml = export(&[item(1, "A", "2020-01-01 00:00:00", "publish", &body)]);
    let out = convert_str(&xml, &config(media.path(), FigureLayout::Optimal)).unwrap();

    assert_eq!(out.posts[0].figures, vec![1]);
    assert!(out.posts[0].has_warnings());
    assert_eq!(out.stats.dropped_references, 1);
    assert!(!out.latex.contains("nowhere.png"));
    assert!(!out.latex.contains("<img"));
}

#[test]
fn test_resize_suffix_resolves() {
    let media = media_archive();
    let body = img("wide1-1024x512.png");
    let xml = export(&[item(1, "A", "2020-01-01 00:00:00", "publish", &body)]);
    let out = convert_str(&xml, &config(media.path(), FigureLayout::Single)).unwrap();
    assert_eq!(out.posts[0].figures, vec![1]);
    assert!(out.latex.contains("wide1.png}"));
}

#[test]
fn test_missing_media_archive_is_fatal() {
    let xml = export(&[item(1, "A", "2020-01-01 00:00:00", "publish", "x")]);
    let cfg = ConversionConfig::builder()
        .media_archive("/definitely/not/here")
        .build()
        .unwrap();
    let err = convert_str(&xml, &cfg).unwrap_err();
    assert!(matches!(err, Wp2LatexError::MediaArchiveMissing { .. }));
}

#[test]
fn test_block_post_with_embed_paragraph_and_image() {
    let media = media_archive();
    let body = format!(
        "<!-- wp:core-embed/youtube {{\"url\":\"https://www.youtube.com/watch?v=abc\",\"type\":\"video\"}} -->\n\
         <figure class=\"wp-block-embed is-type-video\"><div class=\"wp-block-embed__wrapper\">\n\
         https://www.youtube.com/watch?v=abc\n\
         </div></figure>\n\
         <!-- /wp:core-embed/youtube -->\n\n\
         <!-- wp:paragraph -->\n<p>Read <a href=\"http://link.test/\">more</a> here.</p>\n<!-- /wp:paragraph -->\n\n\
         <!-- wp:image {{\"id\":9}} -->\n<figure class=\"wp-block-image\">{}</figure>\n<!-- /wp:image -->",
        img("wide1.png")
    );
    let xml = export(&[item(1, "Blocks", "2020-01-01 00:00:00", "publish", &body)]);
    let out = convert_str(&xml, &config(media.path(), FigureLayout::Optimal)).unwrap();
    let latex = &out.posts[0].latex;

    assert!(latex.contains("\\href{https://www.youtube.com/watch?v=abc}{Video link}"));
    assert!(latex.contains("Read \\href{http://link.test/}{more} here."));
    assert_eq!(out.posts[0].figures, vec![1]);
    assert!(latex.contains("\\label{fig:1}"));
    assert!(!latex.contains("wp:"));
    assert!(!latex.contains("<figure"));
    assert!(!latex.contains("<div"));
}

// ── Document options ─────────────────────────────────────────────────────────

#[test]
fn test_drafts_and_order() {
    let xml = export(&[
        item(1, "Newer", "2021-06-01 00:00:00", "publish", "n"),
        item(2, "Draft", "2021-07-01 00:00:00", "draft", "d"),
        item(3, "Older", "2019-03-01 00:00:00", "publish", "o"),
    ]);

    let out = convert_str(&xml, &ConversionConfig::default()).unwrap();
    assert!(!out.latex.contains("\\section{Draft}"));
    assert_eq!(out.stats.skipped_posts, 1);

    let cfg = ConversionConfig::builder()
        .include_drafts(true)
        .order(PostOrder::Chronological)
        .build()
        .unwrap();
    let out = convert_str(&xml, &cfg).unwrap();
    let titles: Vec<&str> = out.posts.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Older", "Newer", "Draft"]);
}

#[test]
fn test_chapters_by_year() {
    let xml = export(&[
        item(1, "A", "2019-03-01 00:00:00", "publish", "a"),
        item(2, "B", "2019-09-01 00:00:00", "publish", "b"),
        item(3, "C", "2021-01-01 00:00:00", "publish", "c"),
    ]);
    let cfg = ConversionConfig::builder()
        .chapters(ChapterMode::ByYear)
        .build()
        .unwrap();
    let out = convert_str(&xml, &cfg).unwrap();

    assert_eq!(out.latex.matches("\\chapter{2019}").count(), 1);
    assert_eq!(out.latex.matches("\\chapter{2021}").count(), 1);
    let c2019 = out.latex.find("\\chapter{2019}").unwrap();
    let c2021 = out.latex.find("\\chapter{2021}").unwrap();
    let b = out.latex.find("\\section{B}").unwrap();
    assert!(c2019 < b && b < c2021);
}

#[test]
fn test_tags_and_hidden_references() {
    let media = media_archive();
    let body = format!("Text.\n\n{}", img("wide1.png"));
    let xml = export(&[item(1, "A", "2020-01-01 00:00:00", "publish", &body)]);
    let cfg = ConversionConfig::builder()
        .media_archive(media.path())
        .show_references(false)
        .include_tags(true)
        .build()
        .unwrap();
    let out = convert_str(&xml, &cfg).unwrap();

    assert!(out.latex.contains("\\textit{Tags: Travel}"));
    assert!(!out.latex.contains("\\ref{fig:1}"));
    assert!(out.latex.contains("\\label{fig:1}"));
}

#[test]
fn test_progress_events() {
    #[derive(Default)]
    struct Recorder {
        started: AtomicUsize,
        completed: AtomicUsize,
        titles: Mutex<Vec<String>>,
    }
    impl RenderProgressCallback for Recorder {
        fn on_render_start(&self, total_posts: usize) {
            self.started.store(total_posts, Ordering::SeqCst);
        }
        fn on_post_start(&self, _n: usize, _t: usize, title: &str) {
            self.titles.lock().unwrap().push(title.to_string());
        }
        fn on_post_complete(&self, _n: usize, _t: usize, _figures: usize) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    let recorder = Arc::new(Recorder::default());
    let cfg = ConversionConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let xml = export(&[
        item(1, "A", "2020-01-01 00:00:00", "publish", "a"),
        item(2, "B", "2020-01-02 00:00:00", "publish", "b"),
    ]);
    convert_str(&xml, &cfg).unwrap();

    assert_eq!(recorder.started.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 2);
    assert_eq!(*recorder.titles.lock().unwrap(), vec!["A", "B"]);
}

// ── Files ────────────────────────────────────────────────────────────────────

#[test]
fn test_convert_to_file_and_inspect() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("blog.xml");
    let body = "<!-- wp:paragraph -->\n<p>Block post.</p>\n<!-- /wp:paragraph -->";
    std::fs::write(
        &input,
        export(&[
            item(1, "A", "2020-01-01 00:00:00", "publish", body),
            item(2, "B", "2020-02-01 00:00:00", "draft", "[gallery ids=\"5\"]"),
        ]),
    )
    .unwrap();
    let output = dir.path().join("out/blog.tex");

    let out = convert_to_file(&input, &output, &ConversionConfig::default()).unwrap();
    let written = std::fs::read_to_string(&output).unwrap();
    assert_eq!(written, out.latex);
    assert!(written.contains("Block post."));
    assert!(!written.contains("wp:paragraph"));

    let again = convert(&input, &ConversionConfig::default()).unwrap();
    assert_eq!(again.latex, out.latex);

    let summary = inspect(&input).unwrap();
    assert_eq!(summary.posts, 2);
    assert_eq!(summary.published_posts, 1);
    assert_eq!(summary.block_posts, 1);
    assert_eq!(summary.galleries, 1);
    assert_eq!(summary.authors.len(), 1);
}

#[test]
fn test_missing_input() {
    let err = convert("/no/such/export.xml", &ConversionConfig::default()).unwrap_err();
    assert!(matches!(err, Wp2LatexError::FileNotFound { .. }));
}
