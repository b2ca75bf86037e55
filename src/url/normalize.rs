use crate::UrlError;
use std::fmt;
use url::Url;

/// A canonical absolute HTTP(S) URL
///
/// Equality and hashing are defined on the canonical string form, so two
/// spellings of the same resource compare equal once normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedUrl(Url);

impl NormalizedUrl {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// The lowercase host of this URL
    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Normalizes an absolute URL string
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject any scheme other than http and https
/// 3. Reject URLs without a host
/// 4. Lowercase the scheme and host, drop the default port
/// 5. Remove the fragment (everything after #)
/// 6. Sort query parameters by key then value; drop an empty query
///
/// # Examples
///
/// ```
/// use topic_harvester::url::normalize_url;
///
/// let url = normalize_url("HTTPS://Example.CH:443/mobile?b=2&a=1#plans").unwrap();
/// assert_eq!(url.as_str(), "https://example.ch/mobile?a=1&b=2");
/// ```
pub fn normalize_url(raw: &str) -> Result<NormalizedUrl, UrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Parse("empty URL".to_string()));
    }

    let url = Url::parse(raw).map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;
    canonicalize(url)
}

/// Normalizes a possibly relative URL string, resolving it against `base`
///
/// # Examples
///
/// ```
/// use topic_harvester::url::{normalize_url, normalize_with_base};
///
/// let base = normalize_url("https://example.ch/home").unwrap();
/// let url = normalize_with_base("/mobile/plans", &base).unwrap();
/// assert_eq!(url.as_str(), "https://example.ch/mobile/plans");
/// ```
pub fn normalize_with_base(raw: &str, base: &NormalizedUrl) -> Result<NormalizedUrl, UrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Parse("empty URL".to_string()));
    }

    let url = base
        .as_url()
        .join(raw)
        .map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;
    canonicalize(url)
}

fn canonicalize(mut url: Url) -> Result<NormalizedUrl, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host.to_lowercase(),
        _ => return Err(UrlError::MissingHost),
    };
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Parse(format!("invalid host '{}': {}", host, e)))?;

    // `Url` already omits a port equal to the scheme default; this covers
    // values it kept verbatim.
    if url.port().is_some() && url.port() == default_port(url.scheme()) {
        let _ = url.set_port(None);
    }

    url.set_fragment(None);

    if url.query().is_some() {
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if params.is_empty() {
            url.set_query(None);
        } else {
            params.sort();
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(NormalizedUrl(url))
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_scheme_and_host() {
        let result = normalize_url("HTTPS://EXAMPLE.CH/Mobile").unwrap();
        assert_eq!(result.as_str(), "https://example.ch/Mobile");
    }

    #[test]
    fn test_remove_default_ports() {
        assert_eq!(
            normalize_url("https://example.ch:443/a").unwrap().as_str(),
            "https://example.ch/a"
        );
        assert_eq!(
            normalize_url("http://example.ch:80/a").unwrap().as_str(),
            "http://example.ch/a"
        );
    }

    #[test]
    fn test_keep_non_default_port() {
        let result = normalize_url("http://127.0.0.1:8080/page").unwrap();
        assert_eq!(result.as_str(), "http://127.0.0.1:8080/page");
    }

    #[test]
    fn test_http_is_not_upgraded() {
        let result = normalize_url("http://example.ch/page").unwrap();
        assert_eq!(result.as_str(), "http://example.ch/page");
    }

    #[test]
    fn test_remove_fragment() {
        let result = normalize_url("https://example.ch/page#section").unwrap();
        assert_eq!(result.as_str(), "https://example.ch/page");
    }

    #[test]
    fn test_sort_query_params() {
        let result = normalize_url("https://example.ch/page?b=2&a=1").unwrap();
        assert_eq!(result.as_str(), "https://example.ch/page?a=1&b=2");
    }

    #[test]
    fn test_sort_repeated_keys_by_value() {
        let result = normalize_url("https://example.ch/page?tag=z&tag=a").unwrap();
        assert_eq!(result.as_str(), "https://example.ch/page?tag=a&tag=z");
    }

    #[test]
    fn test_empty_query_removed() {
        let result = normalize_url("https://example.ch/page?").unwrap();
        assert_eq!(result.as_str(), "https://example.ch/page");
    }

    #[test]
    fn test_empty_path_becomes_root() {
        let result = normalize_url("https://example.ch").unwrap();
        assert_eq!(result.as_str(), "https://example.ch/");
    }

    #[test]
    fn test_equivalent_spellings_compare_equal() {
        let a = normalize_url("https://Example.ch:443/mobile?y=2&x=1#top").unwrap();
        let b = normalize_url("https://example.ch/mobile?x=1&y=2").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_resolve_relative_against_base() {
        let base = normalize_url("https://example.ch/home").unwrap();
        let result = normalize_with_base("/mobile/plans", &base).unwrap();
        assert_eq!(result.as_str(), "https://example.ch/mobile/plans");

        let result = normalize_with_base("plans?b=1&a=2", &base).unwrap();
        assert_eq!(result.as_str(), "https://example.ch/plans?a=2&b=1");
    }

    #[test]
    fn test_absolute_link_ignores_base() {
        let base = normalize_url("https://example.ch/home").unwrap();
        let result = normalize_with_base("https://other.ch/x", &base).unwrap();
        assert_eq!(result.as_str(), "https://other.ch/x");
    }

    #[test]
    fn test_javascript_scheme_rejected() {
        let result = normalize_url("javascript:void(0)");
        assert!(matches!(result, Err(UrlError::InvalidScheme(ref s)) if s == "javascript"));

        let base = normalize_url("https://example.ch/home").unwrap();
        let result = normalize_with_base("javascript:void(0)", &base);
        assert!(matches!(result, Err(UrlError::InvalidScheme(_))));
    }

    #[test]
    fn test_other_schemes_rejected() {
        assert!(matches!(
            normalize_url("ftp://example.ch/file"),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(matches!(
            normalize_url("mailto:someone@example.ch"),
            Err(UrlError::InvalidScheme(_))
        ));
    }

    #[test]
    fn test_malformed_url() {
        assert!(matches!(normalize_url("not a url"), Err(UrlError::Parse(_))));
        assert!(matches!(normalize_url(""), Err(UrlError::Parse(_))));
        assert!(normalize_url("http://").is_err());
    }

    #[test]
    fn test_relative_without_base_rejected() {
        assert!(matches!(
            normalize_url("/mobile/plans"),
            Err(UrlError::Parse(_))
        ));
    }
}
