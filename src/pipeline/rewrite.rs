//! Text rewriters: fixed HTML-tag and symbol substitutions.
//!
//! Each rewriter is a pure pass over a [`Body`]. Matching happens only in
//! [`Node::Text`], so running a pass twice, or running a pass over markup an
//! earlier pass produced, changes nothing.
//!
//! ## Rule Order
//!
//! The post renderer applies: breaks/rules → (blocks, gallery, figures) →
//! URLs → symbols → inline tags → lists → collapse. URLs come before symbols
//! so `&amp;` inside an `href` is never escaped into the link target; inline
//! tags come after symbols so attribute text (e.g. `style="color:#f00"`) is
//! already opaque when a `<span>` is dropped.

use super::body::{Body, Node};
use once_cell::sync::Lazy;
use regex::Regex;

// ── Line breaks and horizontal rules ─────────────────────────────────────────

static RE_BR: Lazy<Regex> = Lazy::new(|| Regex::new(r"<br\s*/?>").unwrap());
static RE_HR_SELF_CLOSING: Lazy<Regex> = Lazy::new(|| Regex::new(r"<hr\s*/>").unwrap());
static RE_HR: Lazy<Regex> = Lazy::new(|| Regex::new(r"<hr\s*>").unwrap());

/// Horizontal rule emitted for `<hr>`.
pub const HORIZONTAL_RULE: &str = "\\noindent\\rule{\\textwidth}{0.4pt}\\vspace{2.5mm}";

/// `<br>` → newline, `<hr />` → nothing, `<hr>` → a visible rule.
pub fn normalise_breaks(body: &mut Body) {
    body.rewrite(&RE_BR, |_| vec![Node::Text("\n".into())]);
    body.rewrite(&RE_HR_SELF_CLOSING, |_| Vec::new());
    body.rewrite(&RE_HR, |_| vec![Node::Latex(HORIZONTAL_RULE.into())]);
}

// ── URLs ─────────────────────────────────────────────────────────────────────

static RE_ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a\s[^>]*?href="([^"]*)"[^>]*>(.*?)</a>"#).unwrap());

/// `<a href="U">D</a>` → `\href{U}{D}`; an empty `D` displays `U`.
pub fn urls_to_latex(body: &mut Body) {
    body.rewrite(&RE_ANCHOR, |caps| {
        let url = caps[1].to_string();
        let display = caps[2].to_string();
        let display = if display.trim().is_empty() {
            url.clone()
        } else {
            display
        };
        vec![
            Node::Latex(format!("\\href{{{}}}{{", escape_url(&url))),
            Node::Text(display),
            Node::Latex("}".into()),
        ]
    });
}

/// Make a URL safe as the first argument of `\href`.
pub fn escape_url(url: &str) -> String {
    url.replace("&amp;", "&")
        .replace('%', "\\%")
        .replace('#', "\\#")
}

// ── Symbols ──────────────────────────────────────────────────────────────────

/// Escape currency, punctuation and entities in every text node.
///
/// A single left-to-right scan: an escape is emitted as [`Node::Latex`] and
/// is never looked at again, so `&` can't double-escape the output of the
/// `%` or `$` rules.
pub fn symbols_to_latex(body: &mut Body) {
    body.map_text(escape_symbols);
}

/// Escape a plain string (titles, tag names) with the same table.
pub fn escape_text(s: &str) -> String {
    let mut body = Body::default();
    for node in escape_symbols(s) {
        body.push(node);
    }
    body.render()
}

fn escape_symbols(s: &str) -> Vec<Node> {
    let mut out = Vec::new();
    let mut plain = String::new();
    let mut rest = s;

    while let Some(c) = rest.chars().next() {
        let (latex, consumed): (Option<String>, usize) = match c {
            '&' => match entity_at(rest) {
                Some((replacement, len)) => (Some(replacement), len),
                None => (Some("\\&".into()), 1),
            },
            '€' => (Some("\\euro{}".into()), c.len_utf8()),
            '¥' => (Some(" yen".into()), c.len_utf8()),
            '$' => (Some("\\$".into()), 1),
            '°' => (Some("$^\\circ$".into()), c.len_utf8()),
            '#' => (Some("\\#".into()), 1),
            '%' => (Some("\\%".into()), 1),
            '_' => (Some("\\_".into()), 1),
            _ => (None, c.len_utf8()),
        };
        match latex {
            Some(l) => {
                if !plain.is_empty() {
                    out.push(Node::Text(std::mem::take(&mut plain)));
                }
                out.push(Node::Latex(l));
            }
            None => plain.push(c),
        }
        rest = &rest[consumed..];
    }
    if !plain.is_empty() {
        out.push(Node::Text(plain));
    }
    out
}

/// Recognise an HTML entity at the start of `s`.
///
/// Returns the LaTeX replacement and the entity's byte length.
fn entity_at(s: &str) -> Option<(String, usize)> {
    let end = s.char_indices().take(12).find(|&(_, c)| c == ';')?.0;
    let name = &s[1..end];
    let replacement = match name {
        "lt" => "$<$".to_string(),
        "gt" => "$>$".to_string(),
        "amp" => "\\&".to_string(),
        "nbsp" => "~".to_string(),
        "quot" => "\"".to_string(),
        "apos" | "#039" | "#39" => "'".to_string(),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x") {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse::<u32>().ok()?
            };
            let c = char::from_u32(code)?;
            // Decoded characters go through the same table.
            let mut body = Body::default();
            for node in escape_symbols(&c.to_string()) {
                body.push(node);
            }
            body.render()
        }
    };
    Some((replacement, end + 1))
}

// ── Inline HTML tags ─────────────────────────────────────────────────────────

static RE_EM: Lazy<Regex> = Lazy::new(|| Regex::new(r"<em>(.+?)</em>").unwrap());
static RE_I: Lazy<Regex> = Lazy::new(|| Regex::new(r"<i>(.+?)</i>").unwrap());
static RE_STRONG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<strong>(.+?)</strong>").unwrap());
static RE_B: Lazy<Regex> = Lazy::new(|| Regex::new(r"<b>(.+?)</b>").unwrap());
static RE_LI: Lazy<Regex> = Lazy::new(|| Regex::new(r"<li>(.+?)</li>").unwrap());
static RE_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<span(.+?)</span>").unwrap());

/// Emphasis, bold and list items become commands; spans disappear with
/// their content.
pub fn html_tags_to_latex(body: &mut Body) {
    for re in [&*RE_EM, &*RE_I] {
        body.rewrite(re, |caps| wrap("\\emph{", &caps[1], "}"));
    }
    for re in [&*RE_STRONG, &*RE_B] {
        body.rewrite(re, |caps| wrap("\\textbf{", &caps[1], "}"));
    }
    body.rewrite(&RE_LI, |caps| {
        vec![Node::Latex("\\item ".into()), Node::Text(caps[1].to_string())]
    });
    body.rewrite(&RE_SPAN, |_| Vec::new());
}

fn wrap(open: &str, inner: &str, close: &str) -> Vec<Node> {
    vec![
        Node::Latex(open.into()),
        Node::Text(inner.to_string()),
        Node::Latex(close.into()),
    ]
}

// ── Lists ────────────────────────────────────────────────────────────────────

static RE_UL_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<ul\b[^>]*>").unwrap());
static RE_OL_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<ol\b[^>]*>").unwrap());

/// `<ul>` → `itemize`, `<ol>` → `enumerate`.
pub fn lists_to_latex(body: &mut Body) {
    body.rewrite(&RE_UL_OPEN, |_| {
        vec![Node::Latex("\\begin{itemize}".into())]
    });
    body.rewrite(&RE_OL_OPEN, |_| {
        vec![Node::Latex("\\begin{enumerate}".into())]
    });
    body.map_text(|t| {
        if !t.contains("</ul>") && !t.contains("</ol>") {
            return vec![Node::Text(t.to_string())];
        }
        let mut out = Vec::new();
        let mut rest = t;
        loop {
            let next = [("</ul>", "\\end{itemize}"), ("</ol>", "\\end{enumerate}")]
                .into_iter()
                .filter_map(|(tag, env)| rest.find(tag).map(|at| (at, tag, env)))
                .min_by_key(|&(at, _, _)| at);
            match next {
                Some((at, tag, env)) => {
                    out.push(Node::Text(rest[..at].to_string()));
                    out.push(Node::Latex(env.into()));
                    rest = &rest[at + tag.len()..];
                }
                None => {
                    out.push(Node::Text(rest.to_string()));
                    break;
                }
            }
        }
        out
    });
}

// ── Collapse excessive blank lines ───────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Any run of three or more newlines becomes one blank line.
pub fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn run(input: &str, pass: fn(&mut Body)) -> String {
        let mut b = Body::from_html(input);
        pass(&mut b);
        b.render()
    }

    #[test]
    fn test_breaks_and_rules() {
        let out = run("a<br>b<br />c<hr />d<hr>e", normalise_breaks);
        assert_eq!(out, format!("a\nb\ncd{HORIZONTAL_RULE}e"));
    }

    #[test]
    fn test_strong() {
        let out = run("x <strong>bold move</strong> y", html_tags_to_latex);
        assert_eq!(out, "x \\textbf{bold move} y");
        assert!(!out.contains("<strong>"));
    }

    #[test]
    fn test_multiple_emphasis_no_cross_match() {
        let out = run("<em>a</em> and <i>b</i> then <em>c</em>", html_tags_to_latex);
        assert_eq!(out, "\\emph{a} and \\emph{b} then \\emph{c}");
    }

    #[test]
    fn test_span_removed_with_content() {
        let out = run(
            "keep <span style=\"color:red\">drop</span> this",
            html_tags_to_latex,
        );
        assert_eq!(out, "keep  this");
    }

    #[test]
    fn test_list_items() {
        let mut b = Body::from_html("<ul>\n<li>one</li>\n<li>two</li>\n</ul>");
        html_tags_to_latex(&mut b);
        lists_to_latex(&mut b);
        assert_eq!(
            b.render(),
            "\\begin{itemize}\n\\item one\n\\item two\n\\end{itemize}"
        );
    }

    #[test]
    fn test_ordered_list() {
        let out = run("<ol class=\"x\"><li>a</li></ol>", |b| {
            html_tags_to_latex(b);
            lists_to_latex(b);
        });
        assert_eq!(out, "\\begin{enumerate}\\item a\\end{enumerate}");
    }

    #[test]
    fn test_url_with_label() {
        let out = run(r#"<a href="http://x.test/">Label</a>"#, urls_to_latex);
        assert_eq!(out, "\\href{http://x.test/}{Label}");
    }

    #[test]
    fn test_url_empty_label_falls_back() {
        let out = run(r#"<a href="http://x.test/"></a>"#, urls_to_latex);
        assert_eq!(out, "\\href{http://x.test/}{http://x.test/}");
    }

    #[test]
    fn test_url_target_escaped_once() {
        let mut b = Body::from_html(r#"<a href="http://x.test/?a=1&amp;b=50%">50% off</a>"#);
        urls_to_latex(&mut b);
        symbols_to_latex(&mut b);
        assert_eq!(b.render(), "\\href{http://x.test/?a=1&b=50\\%}{50\\% off}");
    }

    #[test]
    fn test_symbols_order_stable() {
        let out = run("100% & $5", symbols_to_latex);
        assert_eq!(out, "100\\% \\& \\$5");
    }

    #[test]
    fn test_symbol_table() {
        let out = run("€5 ¥3 20° &lt;x #1 a_b", symbols_to_latex);
        assert_eq!(out, "\\euro{}5  yen3 20$^\\circ$ $<$x \\#1 a\\_b");
    }

    #[test]
    fn test_symbols_idempotent_on_output() {
        let mut b = Body::from_html("5% & more");
        symbols_to_latex(&mut b);
        let once = b.render();
        symbols_to_latex(&mut b);
        assert_eq!(b.render(), once);
    }

    #[test]
    fn test_numeric_entities() {
        assert_eq!(escape_text("it&#8217;s &#x25;"), "it\u{2019}s \\%");
        assert_eq!(escape_text("a&nbsp;b &amp; c"), "a~b \\& c");
    }

    #[test]
    fn test_lone_ampersand() {
        assert_eq!(escape_text("R&D; fun"), "R\\&D; fun");
    }

    #[test]
    fn test_span_attributes_with_symbols() {
        let mut b = Body::from_html("a <span style=\"color:#f00\">x</span> b");
        symbols_to_latex(&mut b);
        html_tags_to_latex(&mut b);
        assert_eq!(b.render(), "a  b");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\n\nb\n\nc"), "a\n\nb\n\nc");
        assert!(!collapse_blank_lines("\n\n\n\n\n\n\n").contains("\n\n\n"));
    }
}
