//! Path-to-key derivation.
//!
//! A key is the request path with exactly one leading `/` stripped and every
//! remaining `/` replaced by `-`. Nothing is escaped, so `/a-b` and `/a/b`
//! both map to `a-b`.

use std::fmt;

/// Storage key for a cached snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key can name a file or object on its own.
    ///
    /// The empty key (derived from `/`) and the relative directory names are
    /// never stored.
    pub fn is_storable(&self) -> bool {
        !matches!(self.0.as_str(), "" | "." | "..")
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the storage key for a request path.
pub fn derive_key(path: &str) -> Key {
    let rest = path.strip_prefix('/').unwrap_or(path);
    Key(rest.replace('/', "-"))
}

/// Whether a request path (query included) addresses the site root.
pub fn is_root(path: &str) -> bool {
    path.split('?').next() == Some("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_nested_path() {
        assert_eq!(derive_key("/2023/11/post").as_str(), "2023-11-post");
    }

    #[test]
    fn test_derive_root() {
        assert_eq!(derive_key("/").as_str(), "");
        assert!(!derive_key("/").is_storable());
    }

    #[test]
    fn test_derive_strips_single_leading_separator() {
        assert_eq!(derive_key("//a").as_str(), "-a");
        assert_eq!(derive_key("/a/").as_str(), "a-");
    }

    #[test]
    fn test_derive_is_stable() {
        assert_eq!(derive_key("/podcast/550"), derive_key("/podcast/550"));
    }

    #[test]
    fn test_key_without_separators_maps_to_itself() {
        let key = derive_key("/2023/11/post");
        assert_eq!(derive_key(key.as_str()), key);
    }

    #[test]
    fn test_dash_and_separator_collide() {
        assert_eq!(derive_key("/a-b"), derive_key("/a/b"));
    }

    #[test]
    fn test_query_is_kept() {
        assert_eq!(derive_key("/news/1?theme=dark").as_str(), "news-1?theme=dark");
    }

    #[test]
    fn test_relative_names_not_storable() {
        assert!(!derive_key("/.").is_storable());
        assert!(!derive_key("/..").is_storable());
        assert!(derive_key("/../etc").is_storable());
        assert_eq!(derive_key("/../etc").as_str(), "..-etc");
    }

    #[test]
    fn test_is_root() {
        assert!(is_root("/"));
        assert!(is_root("/?utm_source=feed"));
        assert!(!is_root("/podcast"));
        assert!(!is_root("//"));
    }
}
