//! Typed post body: a sequence of source text and already-emitted markup.
//!
//! ## Why not rewrite the string in place?
//!
//! Every rewriter used to be a string-to-string replacement, so the output
//! of one pass was fed back into the next as if it were HTML. That is how
//! `\&` turned into `\\&` and how a `%` inside a generated
//! `\includegraphics` path got escaped. Here a body is a list of [`Node`]s:
//! only [`Node::Text`] is ever matched; anything a rewriter emits is opaque
//! to later passes.
//!
//! ## Matching across nodes
//!
//! Tag pairs frequently straddle generated markup (`<em>see \href{..}</em>`).
//! [`Body::masked`] flattens the body into a single string where each opaque
//! node is replaced by a private-use token (`U+E000 index U+E001`). Regexes
//! run over that string; [`Masked::rebuild`] turns the matched ranges and
//! their replacement nodes back into a `Body`, restoring every token it
//! meets to the node it stands for.

use regex::{Captures, Regex};
use std::ops::Range;

const MASK_OPEN: char = '\u{E000}';
const MASK_CLOSE: char = '\u{E001}';

/// One piece of a post body.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Source text that still needs rewriting (HTML, entities, symbols).
    Text(String),
    /// Emitted LaTeX; never matched again.
    Latex(String),
    /// A complete `figure` environment.
    Figure(String),
    /// Inline cross-reference to a figure label, rendered ` [\ref{fig:N}]`.
    FigureRef(u32),
    /// Target of an anchor that wrapped an inline image.
    ImageLink(String),
}

impl Node {
    fn is_opaque(&self) -> bool {
        !matches!(self, Node::Text(_))
    }

    fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(t) if t.trim().is_empty())
    }

    fn render_into(&self, out: &mut String) {
        match self {
            Node::Text(t) | Node::Latex(t) | Node::Figure(t) => out.push_str(t),
            Node::FigureRef(n) => {
                out.push_str(" [\\ref{fig:");
                out.push_str(&n.to_string());
                out.push_str("}]");
            }
            Node::ImageLink(target) => {
                out.push_str(" \\href{");
                out.push_str(target);
                out.push_str("}{[link]}");
            }
        }
    }
}

/// A post body under rewrite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body {
    nodes: Vec<Node>,
}

impl Body {
    /// Wrap raw HTML from the export.
    pub fn from_html(html: impl Into<String>) -> Self {
        let mut body = Self::default();
        body.push(Node::Text(html.into()));
        body
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Append a node, merging adjacent text and dropping empty text.
    pub fn push(&mut self, node: Node) {
        match node {
            Node::Text(t) if t.is_empty() => {}
            Node::Text(t) => {
                if let Some(Node::Text(last)) = self.nodes.last_mut() {
                    last.push_str(&t);
                } else {
                    self.nodes.push(Node::Text(t));
                }
            }
            other => self.nodes.push(other),
        }
    }

    /// True when any text node contains `needle`.
    pub fn text_contains(&self, needle: &str) -> bool {
        self.nodes
            .iter()
            .any(|n| matches!(n, Node::Text(t) if t.contains(needle)))
    }

    /// Figure numbers referenced by the body, in order.
    pub fn figure_refs(&self) -> Vec<u32> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::FigureRef(num) => Some(*num),
                _ => None,
            })
            .collect()
    }

    /// Flatten into a masked string for cross-node matching.
    pub fn masked(&self) -> Masked {
        let mut text = String::new();
        let mut opaque = Vec::new();
        for node in &self.nodes {
            match node {
                Node::Text(t) => text.push_str(t),
                other => {
                    text.push(MASK_OPEN);
                    text.push_str(&opaque.len().to_string());
                    text.push(MASK_CLOSE);
                    opaque.push(other.clone());
                }
            }
        }
        Masked { text, opaque }
    }

    /// Replace every match of `re` with the nodes returned by `replace`.
    ///
    /// `Node::Text` values returned by the closure may contain captured
    /// (masked) content; it is restored on insertion. Returns the number of
    /// matches.
    pub fn rewrite<F>(&mut self, re: &Regex, mut replace: F) -> usize
    where
        F: FnMut(&Captures<'_>) -> Vec<Node>,
    {
        let masked = self.masked();
        let mut replacements = Vec::new();
        for caps in re.captures_iter(&masked.text) {
            if let Some(m) = caps.get(0) {
                replacements.push((m.range(), replace(&caps)));
            }
        }
        let count = replacements.len();
        if count > 0 {
            *self = masked.rebuild(replacements);
        }
        count
    }

    /// Apply `f` to every text node independently.
    pub fn map_text<F>(&mut self, mut f: F)
    where
        F: FnMut(&str) -> Vec<Node>,
    {
        let nodes = std::mem::take(&mut self.nodes);
        for node in nodes {
            match node {
                Node::Text(t) => {
                    for out in f(&t) {
                        self.push(out);
                    }
                }
                other => self.push(other),
            }
        }
    }

    /// Remove figure annotations and image-link anchors.
    pub fn strip_references(&mut self) {
        self.nodes
            .retain(|n| !matches!(n, Node::FigureRef(_) | Node::ImageLink(_)));
        let nodes = std::mem::take(&mut self.nodes);
        for node in nodes {
            self.push(node);
        }
    }

    /// Move annotations that ended up right after a figure block.
    ///
    /// A reference that directly follows a `figure` environment (only
    /// whitespace in between) is moved next to the nearest annotation before
    /// that figure, so every annotation stays in the running text.
    pub fn hoist_trailing_refs(&mut self) {
        let mut i = 0;
        while i < self.nodes.len() {
            if matches!(self.nodes[i], Node::FigureRef(_)) {
                if let Some(target) = self.hoist_target(i) {
                    let node = self.nodes.remove(i);
                    // Keep chains in order: insert after any refs already hoisted there.
                    let mut at = target + 1;
                    while at < self.nodes.len()
                        && matches!(self.nodes[at], Node::FigureRef(_) | Node::ImageLink(_))
                    {
                        at += 1;
                    }
                    self.nodes.insert(at, node);
                }
            }
            i += 1;
        }
    }

    fn hoist_target(&self, idx: usize) -> Option<usize> {
        let mut j = idx;
        while j > 0 && self.nodes[j - 1].is_blank_text() {
            j -= 1;
        }
        if j == 0 || !matches!(self.nodes[j - 1], Node::Figure(_)) {
            return None;
        }
        (0..j - 1)
            .rev()
            .find(|&k| matches!(self.nodes[k], Node::FigureRef(_)))
    }

    /// Render to a LaTeX string.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node.render_into(&mut out);
        }
        out
    }
}

/// A body flattened for regex matching. See the module docs.
#[derive(Debug, Clone)]
pub struct Masked {
    text: String,
    opaque: Vec<Node>,
}

impl Masked {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Rebuild a body, substituting each range with its nodes.
    ///
    /// Ranges must be ascending and must not overlap.
    pub fn rebuild(self, replacements: Vec<(Range<usize>, Vec<Node>)>) -> Body {
        let mut body = Body::default();
        let mut last = 0;
        for (range, nodes) in replacements {
            if range.start < last {
                continue;
            }
            self.restore_into(&self.text[last..range.start], &mut body);
            for node in nodes {
                match node {
                    Node::Text(t) => self.restore_into(&t, &mut body),
                    Node::Latex(t) => body.push(Node::Latex(self.flatten(&t))),
                    other => body.push(other),
                }
            }
            last = range.end;
        }
        self.restore_into(&self.text[last..], &mut body);
        body
    }

    /// Push `s` into `body`, turning mask tokens back into their nodes.
    fn restore_into(&self, s: &str, body: &mut Body) {
        let mut rest = s;
        while let Some(open) = rest.find(MASK_OPEN) {
            body.push(Node::Text(rest[..open].to_string()));
            let after = &rest[open + MASK_OPEN.len_utf8()..];
            match after.find(MASK_CLOSE) {
                Some(close) => {
                    if let Some(node) = after[..close]
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| self.opaque.get(i))
                    {
                        body.push(node.clone());
                    }
                    rest = &after[close + MASK_CLOSE.len_utf8()..];
                }
                None => {
                    rest = after;
                }
            }
        }
        body.push(Node::Text(rest.to_string()));
    }

    /// Expand mask tokens inline, for markup built from captured text.
    fn flatten(&self, s: &str) -> String {
        if !s.contains(MASK_OPEN) {
            return s.to_string();
        }
        let mut body = Body::default();
        self.restore_into(s, &mut body);
        body.render()
    }
}
