//! WordPress eXtended RSS (WXR) parsing.
//!
//! A WXR export is an RSS 2.0 `<channel>` with WordPress-specific elements
//! in the `wp:` namespace. Everything the converter needs sits either
//! directly under `<channel>` (blog info, authors, tags) or directly under
//! an `<item>` (posts, pages, attachments). Nested structures such as
//! `wp:postmeta` and `wp:comment` are skipped.
//!
//! The parser is a single pull pass with `quick-xml`; element text is
//! accumulated from text, CDATA and entity-reference events so bodies keep
//! their HTML verbatim.

use crate::error::Wp2LatexError;
use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

// ── Model ────────────────────────────────────────────────────────────────────

/// Channel-level information about the blog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlogInfo {
    pub title: String,
    pub link: String,
    pub description: String,
    pub language: String,
    /// `pubDate` of the channel, as written by the exporter.
    pub exported: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub login: String,
    pub email: String,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub slug: String,
    pub name: String,
}

/// One blog post.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub link: String,
    /// Raw HTML from `content:encoded`.
    pub body: String,
    /// Publication time in UTC; `None` for never-published drafts.
    pub published: Option<DateTime<Utc>>,
    /// Login of the author (`dc:creator`).
    pub author: String,
    /// `publish`, `draft`, `private`, …
    pub status: String,
    /// Display names of the post's tags.
    pub tags: Vec<String>,
    pub categories: Vec<String>,
}

impl Post {
    pub fn is_published(&self) -> bool {
        self.status == "publish"
    }
}

/// An uploaded media file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub title: String,
    pub url: String,
    /// ID of the post the file was uploaded to.
    pub parent: Option<String>,
}

/// Everything extracted from one export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Blog {
    pub info: BlogInfo,
    pub authors: Vec<Author>,
    pub tags: Vec<Tag>,
    pub posts: Vec<Post>,
    pub attachments: Vec<Attachment>,
}

// ── Parsing ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct RawItem {
    fields: HashMap<String, String>,
    tags: Vec<String>,
    categories: Vec<String>,
}

/// `(domain, nicename)` of the `<category>` being read.
type OpenCategory = (String, String);

/// Parse a WXR document.
pub fn parse_wxr(xml: &str) -> Result<Blog, Wp2LatexError> {
    let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut blog = Blog::default();
    let mut saw_channel = false;
    let mut skipped_items = 0usize;

    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut item: Option<RawItem> = None;
    let mut author: Option<Author> = None;
    let mut tag: Option<Tag> = None;
    let mut category: Option<OpenCategory> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let parent = stack.last().map(String::as_str);
                match (parent, name.as_str()) {
                    (_, "channel") => saw_channel = true,
                    (Some("channel"), "item") => item = Some(RawItem::default()),
                    (Some("channel"), "wp:author") => author = Some(Author::default()),
                    (Some("channel"), "wp:tag") => tag = Some(Tag::default()),
                    (Some("item"), "category") => {
                        let mut domain = String::new();
                        let mut nicename = String::new();
                        for attr in e.attributes().flatten() {
                            let value = String::from_utf8_lossy(&attr.value).to_string();
                            match attr.key.as_ref() {
                                b"domain" => domain = value,
                                b"nicename" => nicename = value,
                                _ => {}
                            }
                        }
                        category = Some((domain, nicename));
                    }
                    _ => {}
                }
                stack.push(name);
                text.clear();
            }
            Ok(Event::Text(e)) => text.push_str(&String::from_utf8_lossy(&e)),
            Ok(Event::CData(e)) => text.push_str(&String::from_utf8_lossy(&e)),
            Ok(Event::GeneralRef(e)) => {
                let entity = String::from_utf8_lossy(&e);
                match resolve_entity(&entity) {
                    Some(resolved) => text.push_str(&resolved),
                    // HTML entities (`&nbsp;`) are left for the symbol rewriter.
                    None => {
                        text.push('&');
                        text.push_str(&entity);
                        text.push(';');
                    }
                }
            }
            Ok(Event::End(_)) => {
                let Some(name) = stack.pop() else { continue };
                let value = std::mem::take(&mut text);
                let parent = stack.last().map(String::as_str);

                match (parent, name.as_str()) {
                    (Some("channel"), "item") => {
                        if let Some(raw) = item.take() {
                            if !finish_item(raw, &mut blog) {
                                skipped_items += 1;
                            }
                        }
                    }
                    (Some("channel"), "wp:author") => blog.authors.extend(author.take()),
                    (Some("channel"), "wp:tag") => blog.tags.extend(tag.take()),
                    (Some("channel"), field) => set_blog_field(&mut blog.info, field, value),
                    (Some("wp:author"), field) => {
                        if let Some(a) = author.as_mut() {
                            set_author_field(a, field, value);
                        }
                    }
                    (Some("wp:tag"), field) => {
                        if let Some(t) = tag.as_mut() {
                            match field {
                                "wp:tag_slug" => t.slug = value,
                                "wp:tag_name" => t.name = value,
                                _ => {}
                            }
                        }
                    }
                    (Some("item"), "category") => {
                        if let (Some(raw), Some((domain, nicename))) = (item.as_mut(), category.take())
                        {
                            let label = if value.trim().is_empty() { nicename } else { value };
                            match domain.as_str() {
                                "post_tag" => raw.tags.push(label),
                                "category" => raw.categories.push(label),
                                _ => {}
                            }
                        }
                    }
                    (Some("item"), field) => {
                        if let Some(raw) = item.as_mut() {
                            raw.fields.insert(field.to_string(), value);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Wp2LatexError::MalformedXml {
                    position: reader.error_position() as u64,
                    detail: e.to_string(),
                })
            }
            _ => {}
        }
    }

    if !saw_channel {
        return Err(Wp2LatexError::NotAnExport);
    }
    if skipped_items > 0 {
        debug!("Skipped {} items that are neither posts nor attachments", skipped_items);
    }
    if blog.posts.is_empty() {
        warn!("Export contains no posts");
    }
    info!(
        "Parsed '{}': {} posts, {} attachments, {} authors, {} tags",
        blog.info.title,
        blog.posts.len(),
        blog.attachments.len(),
        blog.authors.len(),
        blog.tags.len()
    );
    Ok(blog)
}

fn set_blog_field(info: &mut BlogInfo, field: &str, value: String) {
    match field {
        "title" => info.title = value,
        "link" => info.link = value,
        "description" => info.description = value,
        "language" => info.language = value,
        "pubDate" => info.exported = Some(value),
        _ => {}
    }
}

fn set_author_field(author: &mut Author, field: &str, value: String) {
    match field {
        "wp:author_login" => author.login = value,
        "wp:author_email" => author.email = value,
        "wp:author_display_name" => author.display_name = value,
        "wp:author_first_name" => author.first_name = value,
        "wp:author_last_name" => author.last_name = value,
        _ => {}
    }
}

/// Turn a finished `<item>` into a post or attachment. Returns `false` for
/// other item types (pages, menu items, …).
fn finish_item(mut raw: RawItem, blog: &mut Blog) -> bool {
    let mut take = |key: &str| raw.fields.remove(key).unwrap_or_default();
    let post_type = take("wp:post_type");

    match post_type.as_str() {
        "post" => {
            let published = parse_post_date(&raw.fields);
            let mut take = |key: &str| raw.fields.remove(key).unwrap_or_default();
            let title = take("title");
            let name = take("wp:post_name");
            let slug = if name.trim().is_empty() {
                slugify(&title)
            } else {
                slugify(&name)
            };
            blog.posts.push(Post {
                id: take("wp:post_id"),
                slug,
                link: take("link"),
                body: take("content:encoded"),
                published,
                author: take("dc:creator"),
                status: take("wp:status"),
                tags: std::mem::take(&mut raw.tags),
                categories: std::mem::take(&mut raw.categories),
                title,
            });
            true
        }
        "attachment" => {
            let mut take = |key: &str| raw.fields.remove(key).unwrap_or_default();
            let mut url = take("wp:attachment_url");
            if url.is_empty() {
                url = take("guid");
            }
            let parent = take("wp:post_parent");
            blog.attachments.push(Attachment {
                id: take("wp:post_id"),
                title: take("title"),
                url: url.trim().to_string(),
                parent: match parent.trim() {
                    "" | "0" => None,
                    p => Some(p.to_string()),
                },
            });
            true
        }
        _ => false,
    }
}

const WP_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `wp:post_date_gmt`, else `wp:post_date` taken as UTC, else RFC 2822
/// `pubDate`. Drafts carry `0000-00-00 00:00:00`, which fails all three.
fn parse_post_date(fields: &HashMap<String, String>) -> Option<DateTime<Utc>> {
    ["wp:post_date_gmt", "wp:post_date"]
        .iter()
        .filter_map(|key| fields.get(*key))
        .find_map(|s| NaiveDateTime::parse_from_str(s.trim(), WP_DATE_FORMAT).ok())
        .map(|naive| naive.and_utc())
        .or_else(|| {
            fields
                .get("pubDate")
                .and_then(|s| DateTime::parse_from_rfc2822(s.trim()).ok())
                .map(|d| d.with_timezone(&Utc))
        })
}

static RE_NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").unwrap());

/// ASCII slug: transliterate, lowercase, runs of non-word characters → `-`.
pub fn slugify(s: &str) -> String {
    let ascii = deunicode::deunicode(s).to_lowercase();
    RE_NON_WORD
        .replace_all(&ascii, "-")
        .trim_matches('-')
        .to_string()
}

/// Resolve an XML entity reference (without `&` and `;`).
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    let code = if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        entity.strip_prefix('#')?.parse::<u32>().ok()?
    };
    char::from_u32(code).map(|c| c.to_string())
}
