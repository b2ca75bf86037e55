//! Content extraction from fetched HTML
//!
//! Every page is reduced to the same three fields: title, description and
//! visible body text. Pages that cannot be reduced produce a [`ParseError`] and
//! are skipped by the caller.

use crate::ParseError;
use scraper::{ElementRef, Html, Selector};

/// Elements whose text never counts as visible body text
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Structured content of one page; absent fields are empty strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContent {
    pub title: String,
    pub description: String,
    pub body: String,
}

/// Returns true if a Content-Type header value denotes HTML
pub fn is_html_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    matches!(mime.as_str(), "text/html" | "application/xhtml+xml")
}

/// Extracts title, description and body text from raw page bytes
///
/// # Field Rules
///
/// - **title**: first non-empty `<title>`, else `og:title`, else first `<h1>`
/// - **description**: `<meta name="description">`, else `og:description`
/// - **body**: text of `<body>` minus script, style, noscript and template,
///   with runs of whitespace collapsed to one space
///
/// A missing `content_type` is treated as HTML.
///
/// # Example
///
/// ```
/// use topic_harvester::crawler::extract;
///
/// let html = b"<html><head><title>Plans</title></head><body><p>Fast 5G</p></body></html>";
/// let content = extract(html, Some("text/html; charset=utf-8")).unwrap();
/// assert_eq!(content.title, "Plans");
/// assert_eq!(content.body, "Fast 5G");
/// ```
pub fn extract(raw: &[u8], content_type: Option<&str>) -> Result<PageContent, ParseError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(ParseError::Empty);
    }

    if let Some(content_type) = content_type {
        if !is_html_content_type(content_type) {
            return Err(ParseError::NotHtml {
                content_type: content_type.to_string(),
            });
        }
    }

    let html = String::from_utf8_lossy(raw);
    let document = Html::parse_document(&html);

    let content = PageContent {
        title: extract_title(&document),
        description: extract_description(&document),
        body: extract_body(&document),
    };

    if content.title.is_empty() && content.description.is_empty() && content.body.is_empty() {
        return Err(ParseError::NoContent);
    }

    Ok(content)
}

fn extract_title(document: &Html) -> String {
    first_text(document, "title")
        .or_else(|| meta_property(document, "og:title"))
        .or_else(|| first_text(document, "h1"))
        .unwrap_or_default()
}

fn extract_description(document: &Html) -> String {
    meta_named(document, "description")
        .or_else(|| meta_property(document, "og:description"))
        .unwrap_or_default()
}

fn extract_body(document: &Html) -> String {
    let Ok(selector) = Selector::parse("body") else {
        return String::new();
    };
    let Some(body) = document.select(&selector).next() else {
        return String::new();
    };

    let mut words = Vec::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }

    words.join(" ")
}

/// Whitespace-normalized text of the first non-empty element matching `css`
fn first_text(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;

    document
        .select(&selector)
        .map(collapse)
        .find(|s| !s.is_empty())
}

fn collapse(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `content` of the first `<meta name=...>` whose name matches case-insensitively
fn meta_named(document: &Html, name: &str) -> Option<String> {
    let selector = Selector::parse("meta[name][content]").ok()?;

    document
        .select(&selector)
        .filter(|e| {
            e.value()
                .attr("name")
                .is_some_and(|n| n.trim().eq_ignore_ascii_case(name))
        })
        .filter_map(|e| e.value().attr("content"))
        .map(|c| c.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|c| !c.is_empty())
}

fn meta_property(document: &Html, property: &str) -> Option<String> {
    let selector = Selector::parse("meta[property][content]").ok()?;

    document
        .select(&selector)
        .filter(|e| e.value().attr("property") == Some(property))
        .filter_map(|e| e.value().attr("content"))
        .map(|c| c.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|c| !c.is_empty())
}
