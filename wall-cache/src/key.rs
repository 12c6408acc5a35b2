//! Ordered tuple keys for cached query results.
//!
//! A key identifies a class of cached read (`[messages, recent, 3]`). The
//! same type doubles as an invalidation prefix: `[messages]` matches every
//! key whose first segment is `messages`.

use std::fmt;

/// One component of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeySegment {
    Tag(String),
    Number(u64),
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySegment::Tag(tag) => f.write_str(tag),
            KeySegment::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for KeySegment {
    fn from(tag: &str) -> Self {
        KeySegment::Tag(tag.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(tag: String) -> Self {
        KeySegment::Tag(tag)
    }
}

impl From<u64> for KeySegment {
    fn from(n: u64) -> Self {
        KeySegment::Number(n)
    }
}

/// Ordered tuple identifying a cached read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    segments: Vec<KeySegment>,
}

impl QueryKey {
    /// Start a key from its leading tag.
    pub fn new(tag: impl Into<KeySegment>) -> Self {
        Self {
            segments: vec![tag.into()],
        }
    }

    /// Append a segment.
    pub fn with(mut self, segment: impl Into<KeySegment>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether `prefix` matches the leading segments of this key.
    ///
    /// A key is a prefix of itself.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// The key with its last segment removed, or `None` for single-segment keys.
    ///
    /// Keys sharing a parent form a query family (the pages of one feed).
    pub fn parent(&self) -> Option<QueryKey> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(QueryKey {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", segment)?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_display() {
        let key = QueryKey::new("messages").with("recent").with(3u64);
        assert_eq!(key.to_string(), "[messages, recent, 3]");
    }

    #[test]
    fn test_prefix_matching() {
        let page = QueryKey::new("messages").with("recent").with(1u64);
        assert!(page.starts_with(&QueryKey::new("messages")));
        assert!(page.starts_with(&page));
        assert!(!page.starts_with(&QueryKey::new("votes")));
        assert!(!QueryKey::new("messages").starts_with(&page));
    }

    #[test]
    fn test_tag_does_not_match_number() {
        let numeric = QueryKey::new("users").with(1u64);
        let textual = QueryKey::new("users").with("1");
        assert_ne!(numeric, textual);
        assert!(!numeric.starts_with(&textual));
    }

    #[test]
    fn test_parent() {
        let page = QueryKey::new("messages").with("ranked").with(2u64);
        assert_eq!(
            page.parent(),
            Some(QueryKey::new("messages").with("ranked"))
        );
        assert_eq!(QueryKey::new("votes").parent(), None);
    }

    proptest! {
        #[test]
        fn every_extension_keeps_its_prefix(tags in prop::collection::vec("[a-z]{1,8}", 1..5), page in any::<u64>()) {
            let mut key = QueryKey::new(tags[0].as_str());
            for tag in &tags[1..] {
                key = key.with(tag.as_str());
            }
            let extended = key.clone().with(page);
            prop_assert!(extended.starts_with(&key));
            prop_assert_eq!(extended.parent(), Some(key));
        }
    }
}
