//! Link discovery for seed pages
//!
//! This module extracts candidate links from a fetched page:
//! - `<a href>` references in document order, without duplicates
//! - Relevance filtering through a pluggable [`RelevanceFilter`]
//!
//! Discovery is pure; it fetches nothing. Each candidate carries the outcome of
//! normalizing its href against the page, and the caller decides what to do with
//! rejected ones.

use crate::config::RelevanceMode;
use crate::url::{normalize_with_base, NormalizedUrl};
use crate::UrlError;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;

/// A link found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// The href attribute as written, trimmed
    pub href: String,

    /// Anchor text, whitespace-normalized
    pub text: String,

    /// The href normalized against the page's URL
    pub url: Result<NormalizedUrl, UrlError>,
}

impl Candidate {
    /// Identity used for per-page dedup: the normalized URL, or the raw href
    /// when normalization failed
    pub fn key(&self) -> &str {
        match &self.url {
            Ok(url) => url.as_str(),
            Err(_) => &self.href,
        }
    }
}

/// Decides whether a discovered link relates to a target's topic
pub trait RelevanceFilter: Send + Sync {
    fn is_relevant(&self, candidate: &Candidate, topic: &str) -> bool;
}

/// Keeps links whose host, path or anchor text mention the topic
///
/// Matching is case-insensitive. For the host and path, the topic also matches
/// in slug form: `"Mobile Plans"` matches `mobile-plans`, `mobile_plans` and
/// `mobileplans`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TopicMatch;

impl RelevanceFilter for TopicMatch {
    fn is_relevant(&self, candidate: &Candidate, topic: &str) -> bool {
        let topic = topic.trim().to_lowercase();

        if candidate.text.to_lowercase().contains(&topic) {
            return true;
        }

        let haystack = match &candidate.url {
            Ok(url) => format!("{}{}", url.host(), url.as_url().path()).to_lowercase(),
            Err(_) => candidate.href.to_lowercase(),
        };

        slug_variants(&topic).iter().any(|v| haystack.contains(v.as_str()))
    }
}

/// Keeps every link
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl RelevanceFilter for AcceptAll {
    fn is_relevant(&self, _candidate: &Candidate, _topic: &str) -> bool {
        true
    }
}

/// Returns the filter configured by `mode`
pub fn relevance_filter(mode: RelevanceMode) -> Arc<dyn RelevanceFilter> {
    match mode {
        RelevanceMode::Topic => Arc::new(TopicMatch),
        RelevanceMode::All => Arc::new(AcceptAll),
    }
}

fn slug_variants(topic: &str) -> Vec<String> {
    let words: Vec<&str> = topic.split_whitespace().collect();
    if words.len() < 2 {
        return vec![topic.to_string()];
    }

    vec![
        topic.to_string(),
        words.join("-"),
        words.join("_"),
        words.concat(),
    ]
}

/// Lazy sequence of relevant candidates produced by [`discover`]
pub struct Candidates<'a> {
    anchors: std::vec::IntoIter<Candidate>,
    seen: HashSet<String>,
    topic: &'a str,
    filter: &'a dyn RelevanceFilter,
}

impl Iterator for Candidates<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        for candidate in self.anchors.by_ref() {
            if !self.seen.insert(candidate.key().to_string()) {
                continue;
            }
            if self.filter.is_relevant(&candidate, self.topic) {
                return Some(candidate);
            }
        }
        None
    }
}

/// Discovers candidate links on a page
///
/// # Link Extraction Rules
///
/// **Include:** `<a href="...">` anywhere in the document, `rel="nofollow"` too
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - Empty and fragment-only hrefs (same page anchors)
/// - Repeats of a URL already yielded by this call
/// - Links the relevance filter rejects
///
/// Hrefs are normalized against `base` (the page's final URL). Hrefs that fail
/// normalization, such as `javascript:` links, are still yielded with their
/// error so the caller can record them.
///
/// # Example
///
/// ```
/// use topic_harvester::crawler::{discover, TopicMatch};
/// use topic_harvester::url::normalize_url;
///
/// let html = br#"<a href="/mobile/plans">Plans</a><a href="/about">About</a>"#;
/// let base = normalize_url("https://www.example.ch/en/home").unwrap();
/// let links: Vec<_> = discover(html, &base, "Mobile", &TopicMatch).collect();
///
/// assert_eq!(links.len(), 1);
/// assert_eq!(links[0].href, "/mobile/plans");
/// assert_eq!(links[0].key(), "https://www.example.ch/mobile/plans");
/// ```
pub fn discover<'a>(
    content: &[u8],
    base: &NormalizedUrl,
    topic: &'a str,
    filter: &'a dyn RelevanceFilter,
) -> Candidates<'a> {
    Candidates {
        anchors: extract_anchors(content, base).into_iter(),
        seen: HashSet::new(),
        topic,
        filter,
    }
}

/// Collects every followable anchor; the parsed document does not outlive this call
fn extract_anchors(content: &[u8], base: &NormalizedUrl) -> Vec<Candidate> {
    let html = String::from_utf8_lossy(content);
    let document = Html::parse_document(&html);

    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|element| element.value().attr("download").is_none())
        .filter_map(|element| {
            let href = element.value().attr("href")?.trim();
            if href.is_empty() || href.starts_with('#') {
                return None;
            }

            let url = normalize_with_base(href, base);
            let text = element
                .text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ");

            Some(Candidate {
                href: href.to_string(),
                text,
                url,
            })
        })
        .collect()
}
