//! Package paths - the canonical key of every manifest record.
//!
//! PackagePath is an interned import path. Equality is a pointer comparison,
//! ordering is lexicographic on the path text so that sorted collections of
//! paths render deterministically.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{LazyLock, RwLock};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Global package path interner
static PATH_INTERNER: LazyLock<RwLock<HashSet<&'static str>>> =
    LazyLock::new(|| RwLock::new(HashSet::new()));

/// A package path that could not be canonicalised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid package path `{path}`: {reason}")]
pub struct InvalidPackagePath {
    pub path: String,
    pub reason: &'static str,
}

/// A canonical import path (interned).
///
/// PackagePaths are cheap to copy and compare.
#[derive(Clone, Copy)]
pub struct PackagePath {
    inner: &'static str,
}

impl PackagePath {
    /// Parse and canonicalise a package path.
    ///
    /// Surrounding whitespace and trailing slashes are stripped. Empty paths
    /// and paths containing whitespace, backslashes or empty segments are
    /// rejected.
    pub fn parse(raw: &str) -> Result<Self, InvalidPackagePath> {
        let invalid = |reason| InvalidPackagePath {
            path: raw.to_string(),
            reason,
        };

        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(invalid("path is empty"));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(invalid("path contains whitespace"));
        }
        if trimmed.contains('\\') {
            return Err(invalid("path contains a backslash"));
        }
        if trimmed.contains("//") {
            return Err(invalid("path contains an empty segment"));
        }

        Ok(Self::intern(trimmed))
    }

    fn intern(s: &str) -> Self {
        // Fast path: already interned
        {
            let interner = PATH_INTERNER.read().unwrap_or_else(|e| e.into_inner());
            if let Some(&interned) = interner.get(s) {
                return PackagePath { inner: interned };
            }
        }

        let mut interner = PATH_INTERNER.write().unwrap_or_else(|e| e.into_inner());

        // Double-check after acquiring write lock
        if let Some(&interned) = interner.get(s) {
            return PackagePath { inner: interned };
        }

        let leaked: &'static str = Box::leak(s.to_string().into_boxed_str());
        interner.insert(leaked);

        PackagePath { inner: leaked }
    }

    /// Get the path text.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.inner
    }

    /// Iterate over the `/`-separated segments of the path.
    pub fn segments(&self) -> impl Iterator<Item = &'static str> {
        self.inner.split('/')
    }

    /// Whether `self` is `other` or nested below it.
    pub fn starts_with(&self, other: &PackagePath) -> bool {
        self.inner == other.inner
            || (self.inner.starts_with(other.inner)
                && self.inner.as_bytes().get(other.inner.len()) == Some(&b'/'))
    }
}

impl PartialEq for PackagePath {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.inner, other.inner)
    }
}

impl Eq for PackagePath {}

impl PartialOrd for PackagePath {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackagePath {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(other.inner)
    }
}

impl Hash for PackagePath {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state)
    }
}

impl Borrow<str> for PackagePath {
    #[inline]
    fn borrow(&self) -> &str {
        self.inner
    }
}

impl AsRef<str> for PackagePath {
    #[inline]
    fn as_ref(&self) -> &str {
        self.inner
    }
}

impl fmt::Debug for PackagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.inner, f)
    }
}

impl fmt::Display for PackagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.inner, f)
    }
}

impl std::str::FromStr for PackagePath {
    type Err = InvalidPackagePath;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PackagePath::parse(s)
    }
}

impl Serialize for PackagePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.inner.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PackagePath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PackagePath::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_equality() {
        let a = PackagePath::parse("lib/a").unwrap();
        let b = PackagePath::parse("lib/a").unwrap();
        let c = PackagePath::parse("lib/b").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(std::ptr::eq(a.inner, b.inner));
    }

    #[test]
    fn test_canonicalisation() {
        let a = PackagePath::parse("  example.com/lib/a/ ").unwrap();
        assert_eq!(a.as_str(), "example.com/lib/a");
        assert_eq!(a, PackagePath::parse("example.com/lib/a").unwrap());
    }

    #[test]
    fn test_rejects_invalid_paths() {
        assert!(PackagePath::parse("").is_err());
        assert!(PackagePath::parse("   ").is_err());
        assert!(PackagePath::parse("/").is_err());
        assert!(PackagePath::parse("lib/a b").is_err());
        assert!(PackagePath::parse("lib\\a").is_err());
        assert!(PackagePath::parse("lib//a").is_err());

        let err = PackagePath::parse("lib a").unwrap_err();
        assert!(err.to_string().contains("whitespace"));
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let mut paths: Vec<_> = ["lib/b", "app", "lib/a"]
            .iter()
            .map(|p| PackagePath::parse(p).unwrap())
            .collect();
        paths.sort();

        let names: Vec<_> = paths.iter().map(|p| p.as_str()).collect();
        assert_eq!(names, vec!["app", "lib/a", "lib/b"]);
    }

    #[test]
    fn test_starts_with() {
        let lib = PackagePath::parse("lib").unwrap();
        let nested = PackagePath::parse("lib/a").unwrap();
        let sibling = PackagePath::parse("library").unwrap();

        assert!(nested.starts_with(&lib));
        assert!(lib.starts_with(&lib));
        assert!(!sibling.starts_with(&lib));
        assert_eq!(nested.segments().collect::<Vec<_>>(), vec!["lib", "a"]);
    }

    #[test]
    fn test_hash_lookup_by_str() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(PackagePath::parse("lib/a").unwrap(), 1);
        assert_eq!(map.get("lib/a"), Some(&1));
    }
}
