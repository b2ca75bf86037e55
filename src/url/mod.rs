//! URL handling module for Topic-Harvester
//!
//! This module provides URL normalization, domain extraction and wildcard
//! matching for the domain blacklist.

mod domain;
mod normalize;

use crate::config::DomainEntry;

pub use domain::{extract_domain, matches_wildcard};
pub use normalize::{normalize_url, normalize_with_base, NormalizedUrl};

/// Returns true if the URL's domain matches any blacklist pattern
///
/// Blacklisted candidates are dropped at discovery time; they are neither
/// fetched nor counted as invalid.
pub fn is_blacklisted(url: &NormalizedUrl, blacklist: &[DomainEntry]) -> bool {
    let Some(domain) = extract_domain(url.as_url()) else {
        return false;
    };

    blacklist
        .iter()
        .any(|entry| matches_wildcard(&entry.domain.to_lowercase(), &domain))
}
