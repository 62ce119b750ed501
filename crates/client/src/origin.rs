//! Origin site addressing.
//!
//! The origin is canonicalized once at startup; request paths are appended
//! to it verbatim to form the page URL handed to the capturer.

use url::Url;

/// Error type for origin URL failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("request path must start with '/': {0:?}")]
    RelativePath(String),
}

impl From<UrlError> for ogsnap_core::Error {
    fn from(err: UrlError) -> Self {
        ogsnap_core::Error::InvalidUrl(err.to_string())
    }
}

/// Canonical base URL of the site being snapshotted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    home: Url,
}

impl Origin {
    /// Canonicalize an origin string.
    ///
    /// Normalization steps:
    /// 1. Trim leading/trailing whitespace
    /// 2. Require an absolute http(s) URL
    /// 3. Lowercase the host
    /// 4. Remove fragment, query and trailing `/` of the path
    pub fn parse(input: &str) -> Result<Self, UrlError> {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return Err(UrlError::Empty);
        }

        let mut parsed = Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

        match parsed.scheme() {
            "http" | "https" => {}
            scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
        }

        if let Some(host) = parsed.host_str() {
            let host = host.to_lowercase();
            parsed
                .set_host(Some(&host))
                .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
        }

        parsed.set_fragment(None);
        parsed.set_query(None);
        let path = parsed.path().trim_end_matches('/').to_string();
        parsed.set_path(&path);

        Ok(Self { home: parsed })
    }

    /// The origin's homepage, target of the root redirect.
    pub fn homepage(&self) -> &Url {
        &self.home
    }

    /// Page URL for a request path (query included).
    pub fn page_url(&self, path: &str) -> Result<Url, UrlError> {
        if !path.starts_with('/') {
            return Err(UrlError::RelativePath(path.to_string()));
        }

        let base = self.home.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{path}")).map_err(|e| UrlError::InvalidUrl(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let origin = Origin::parse("https://changelog.com").unwrap();
        assert_eq!(origin.homepage().as_str(), "https://changelog.com/");
    }

    #[test]
    fn test_parse_requires_scheme() {
        assert!(matches!(Origin::parse("changelog.com"), Err(UrlError::InvalidUrl(_))));
        assert!(matches!(Origin::parse("changelog.com:443"), Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_parse_lowercase_host() {
        let origin = Origin::parse("https://CHANGELOG.com").unwrap();
        assert_eq!(origin.homepage().host_str(), Some("changelog.com"));
    }

    #[test]
    fn test_parse_strips_query_and_fragment() {
        let origin = Origin::parse("https://changelog.com/?ref=x#top").unwrap();
        assert_eq!(origin.homepage().as_str(), "https://changelog.com/");
    }

    #[test]
    fn test_parse_unsupported_scheme() {
        let result = Origin::parse("file:///etc/passwd");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(Origin::parse("   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_page_url() {
        let origin = Origin::parse("https://changelog.com").unwrap();
        let url = origin.page_url("/podcast/550").unwrap();
        assert_eq!(url.as_str(), "https://changelog.com/podcast/550");
    }

    #[test]
    fn test_page_url_keeps_query() {
        let origin = Origin::parse("https://changelog.com").unwrap();
        let url = origin.page_url("/news?page=2").unwrap();
        assert_eq!(url.path(), "/news");
        assert_eq!(url.query(), Some("page=2"));
    }

    #[test]
    fn test_page_url_under_base_path() {
        let origin = Origin::parse("https://example.com/blog/").unwrap();
        let url = origin.page_url("/2023/11/post").unwrap();
        assert_eq!(url.as_str(), "https://example.com/blog/2023/11/post");
    }

    #[test]
    fn test_page_url_relative_rejected() {
        let origin = Origin::parse("https://changelog.com").unwrap();
        assert!(matches!(origin.page_url("podcast"), Err(UrlError::RelativePath(_))));
    }

    #[test]
    fn test_url_error_into_core_error() {
        let err: ogsnap_core::Error = UrlError::Empty.into();
        assert!(matches!(err, ogsnap_core::Error::InvalidUrl(_)));
    }
}
