use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// An opaque short identifier issued by the shortener.
///
/// Slugs are treated as opaque strings end to end: the generator decides
/// their shape, the storage keys on them verbatim, and the wire fronts echo
/// them inside short URLs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Wraps an identifier produced by a generator or received on the wire.
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    /// Returns the slug as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Joins the slug onto a base URL, replacing the path component only.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }
}

impl Display for Slug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Slug {
    fn from(slug: String) -> Self {
        Self(slug)
    }
}

impl From<&str> for Slug {
    fn from(slug: &str) -> Self {
        Self(slug.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_url_joins_path_component() {
        let slug = Slug::new("abc123");
        assert_eq!(slug.to_url("http://localhost:8080"), "http://localhost:8080/abc123");
        assert_eq!(slug.to_url("http://localhost:8080/"), "http://localhost:8080/abc123");
    }

    #[test]
    fn serde_is_transparent() {
        let slug = Slug::new("xyz");
        let json = serde_json::to_string(&slug).unwrap();
        assert_eq!(json, "\"xyz\"");
        let back: Slug = serde_json::from_str(&json).unwrap();
        assert_eq!(back, slug);
    }
}
