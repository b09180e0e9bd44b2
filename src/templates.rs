//! LaTeX templates for the document skeleton and figure environments.
//!
//! Kept in one file so the generated markup can be tuned (packages, figure
//! placement, date wording) without touching the rewrite pipeline.

use chrono::{DateTime, Datelike, Utc};
use std::path::Path;

/// Packages and page layout. `subcaption` provides `subfigure`, `eurosym`
/// provides `\euro`.
pub const PREAMBLE_PACKAGES: &str = r"\documentclass[10pt,twoside,openright]{memoir}
\usepackage[utf8]{inputenc}
\usepackage[T1]{fontenc}
\usepackage{graphicx}
\usepackage{hyperref}
\usepackage{subcaption}
\usepackage{cleveref}
\captionsetup[subfigure]{subrefformat=simple,labelformat=simple}
\renewcommand\thesubfigure{(\alph{subfigure})}
\usepackage{eurosym}
\setlrmarginsandblock{0.12\paperwidth}{*}{1}
\setulmarginsandblock{0.15\paperwidth}{*}{1}
\checkandfixthelayout

\pagestyle{plain}
";

pub const END_DOCUMENT: &str = "\\end{document}\n";

/// Everything up to and including the table of contents.
///
/// `title`, `author` and `abstract_text` must already be escaped.
pub fn preamble(title: &str, author: &str, abstract_text: Option<&str>) -> String {
    let mut s = String::from(PREAMBLE_PACKAGES);
    s.push_str("\n\\begin{document}\n\n");
    s.push_str(&format!("\\title{{{title}}}\n"));
    s.push_str(&format!("\\author{{{author}}}\n\n"));
    s.push_str("\\maketitle\n\n");
    if let Some(text) = abstract_text {
        s.push_str("\\begin{abstract}\n");
        s.push_str(text);
        s.push_str("\n\\end{abstract}\n\n");
    }
    s.push_str("\\tableofcontents\n\n");
    s
}

pub fn chapter(title: &str) -> String {
    format!("\\chapter{{{title}}}\n\n")
}

pub fn section(title: &str, slug: &str) -> String {
    if slug.is_empty() {
        format!("\\section{{{title}}}\n")
    } else {
        format!("\\section{{{title}}}\\label{{post:{slug}}}\n")
    }
}

/// `\noindent \emph{Published on 4th Apr 2020, 13:45.}`
pub fn date_line(date: &DateTime<Utc>) -> String {
    let day = date.day();
    format!(
        "\\noindent \\emph{{Published on {}{} {}.}}\n",
        day,
        ordinal_suffix(day),
        date.format("%b %Y, %H:%M")
    )
}

fn ordinal_suffix(day: u32) -> &'static str {
    match day {
        4..=20 | 24..=30 => "th",
        _ => match day % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        },
    }
}

/// A standalone figure.
pub fn figure_block(number: u32, path: &Path, width: f32) -> String {
    format!(
        "\\begin{{figure}}\n\
         \x20   \\centering\n\
         \x20   \\includegraphics[width={width}\\textwidth]{{{path}}}\n\
         \x20   \\caption{{}}\n\
         \x20   \\label{{fig:{number}}}\n\
         \\end{{figure}}",
        path = latex_path(path),
    )
}

/// Two images side by side, each with its own label plus a joint label.
pub fn subfigure_block(
    (first, first_path, first_width): (u32, &Path, f32),
    (second, second_path, second_width): (u32, &Path, f32),
) -> String {
    let sub = |number: u32, path: &Path, width: f32| {
        format!(
            "  \\begin{{subfigure}}[b]{{{width}\\textwidth}}\n\
             \x20   \\includegraphics[width=\\textwidth]{{{path}}}\n\
             \x20   \\caption{{}}\n\
             \x20   \\label{{fig:{number}}}\n\
             \x20 \\end{{subfigure}}\n",
            path = latex_path(path),
        )
    };
    let mut s = String::from("\\begin{figure}[htbp!]\n  \\centering\n");
    s.push_str(&sub(first, first_path, first_width));
    s.push_str(&sub(second, second_path, second_width));
    s.push_str(&format!(
        "  \\caption{{}}\n  \\label{{fig:{first}-{second}}}\n\\end{{figure}}"
    ));
    s
}

/// Paths are emitted with forward slashes, which LaTeX accepts everywhere.
fn latex_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
