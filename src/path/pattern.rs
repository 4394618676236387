//! Structural Path Patterns
//!
//! A `PathPattern` is an ordered list of components (names, `*`, and gaps
//! written as an empty segment, e.g. `//c`). The same type declares index
//! rules and tracks the current location during a document walk, where it is
//! reset and refilled for every document.
//!
//! Matching is directional: `rule.matches(&location)` asks whether the
//! location satisfies the rule.

use std::fmt;

use memchr::memchr_iter;

use super::namespaces::NamespaceContext;
use super::qname::{NameKind, QName};
use crate::error::{Error, Result};

/// Initial component capacity
pub const DEFAULT_SIZE: usize = 5;

/// `reset()` shrinks the buffer back to `DEFAULT_SIZE` once its capacity
/// exceeds `DEFAULT_SIZE * MAX_OVER_ALLOCATION_FACTOR`
pub const MAX_OVER_ALLOCATION_FACTOR: usize = 16;

/// One step of a structural path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Component {
    /// Literal element or attribute name
    Name(QName),
    /// `*` - exactly one element of any name
    Wildcard,
    /// Empty segment - zero or more levels
    Skip,
}

impl Component {
    #[inline]
    pub fn is_skip(&self) -> bool {
        matches!(self, Component::Skip)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Name(qname) => qname.fmt(f),
            Component::Wildcard => f.write_str("*"),
            Component::Skip => Ok(()),
        }
    }
}

/// Wildcard-aware structural path
#[derive(Debug, Clone)]
pub struct PathPattern {
    components: Vec<Component>,
    closed_at_end: bool,
}

impl PathPattern {
    /// Empty pattern with the default capacity
    pub fn new() -> Self {
        Self::with_closed(false)
    }

    /// Empty pattern with the given end semantics
    pub fn with_closed(closed_at_end: bool) -> Self {
        PathPattern {
            components: Vec::with_capacity(DEFAULT_SIZE),
            closed_at_end,
        }
    }

    /// Parse a pattern whose names carry no namespace prefixes
    pub fn from_str(spec: &str, closed_at_end: bool) -> Result<Self> {
        Self::parse(spec, closed_at_end, &NamespaceContext::new())
    }

    /// Parse a slash-delimited spec, resolving `prefix:name` through `namespaces`
    ///
    /// A leading `/` only marks the path as absolute. Every other empty
    /// segment becomes a gap; consecutive gaps collapse into one.
    pub fn parse(spec: &str, closed_at_end: bool, namespaces: &NamespaceContext) -> Result<Self> {
        let body = spec.strip_prefix('/').unwrap_or(spec);
        let mut pattern = Self::with_closed(closed_at_end);

        let bytes = body.as_bytes();
        let mut start = 0;
        let ends = memchr_iter(b'/', bytes).chain(std::iter::once(bytes.len()));
        for end in ends {
            let segment = body[start..end].trim();
            let last = end == bytes.len();
            start = end + 1;

            let component = match segment {
                "" if last => {
                    if pattern.is_empty() {
                        return Err(Error::parse(spec, "path has no components"));
                    }
                    return Err(Error::parse(spec, "trailing slash"));
                }
                "" => Component::Skip,
                "*" => Component::Wildcard,
                _ => {
                    let (lexical, kind) = match segment.strip_prefix('@') {
                        Some(name) => (name, NameKind::Attribute),
                        None => (segment, NameKind::Element),
                    };
                    if lexical.is_empty() {
                        return Err(Error::parse(spec, "empty attribute name"));
                    }
                    let qname = namespaces
                        .qname(lexical, kind)
                        .ok_or_else(|| Error::parse(spec, format!("unbound prefix in `{}`", lexical)))?;
                    Component::Name(qname)
                }
            };

            if component.is_skip() && pattern.components.last().is_some_and(Component::is_skip) {
                continue;
            }
            pattern.push(component);
        }

        Ok(pattern)
    }

    /// Add one component, doubling the buffer when it is full
    pub fn push(&mut self, component: Component) {
        self.grow_for(1);
        self.components.push(component);
    }

    /// Push a literal name
    pub fn push_name(&mut self, qname: QName) {
        self.push(Component::Name(qname));
    }

    /// Remove the last component
    pub fn pop(&mut self) -> Option<Component> {
        self.components.pop()
    }

    /// Append all of `other`'s components after this pattern's
    pub fn append(&mut self, other: &PathPattern) {
        self.grow_for(other.components.len());
        self.components.extend(other.components.iter().cloned());
    }

    /// Return a new pattern: `self` followed by `other`
    pub fn joined(&self, other: &PathPattern) -> PathPattern {
        let mut path = self.clone();
        path.append(other);
        path
    }

    /// Geometric growth from the current capacity
    fn grow_for(&mut self, additional: usize) {
        let needed = self.components.len() + additional;
        let capacity = self.components.capacity();
        if needed <= capacity {
            return;
        }
        let mut target = capacity.max(DEFAULT_SIZE);
        while target < needed {
            target *= 2;
        }
        self.components.reserve_exact(target - self.components.len());
    }

    /// Clear the pattern for reuse
    ///
    /// Capacity is kept unless it grew past the over-allocation threshold,
    /// in which case the buffer goes back to `DEFAULT_SIZE`.
    pub fn reset(&mut self) {
        if self.components.capacity() > DEFAULT_SIZE * MAX_OVER_ALLOCATION_FACTOR {
            self.components = Vec::with_capacity(DEFAULT_SIZE);
        } else {
            self.components.clear();
        }
    }

    /// Number of components
    #[inline]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Allocated component slots
    #[inline]
    pub fn capacity(&self) -> usize {
        self.components.capacity()
    }

    #[inline]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    #[inline]
    pub fn last(&self) -> Option<&Component> {
        self.components.last()
    }

    #[inline]
    pub fn closed_at_end(&self) -> bool {
        self.closed_at_end
    }

    pub fn set_closed_at_end(&mut self, closed_at_end: bool) {
        self.closed_at_end = closed_at_end;
    }

    /// True if the pattern contains no wildcard or gap
    pub fn is_literal(&self) -> bool {
        self.components
            .iter()
            .all(|c| matches!(c, Component::Name(_)))
    }

    /// Test whether `candidate` satisfies this pattern
    pub fn matches(&self, candidate: &PathPattern) -> bool {
        match_components(&self.components, &candidate.components, self.closed_at_end)
    }
}

/// Does one non-gap pattern component accept one candidate component?
fn component_matches(expected: &Component, actual: &Component) -> bool {
    match (expected, actual) {
        (Component::Wildcard, Component::Name(name)) => !name.is_attribute(),
        (Component::Name(expected), Component::Name(name)) => name == expected,
        _ => false,
    }
}

/// Match over (pattern suffix, candidate suffix) pairs, one row per pattern
/// component; a gap accepts any candidate suffix the rest of the pattern
/// accepts. O(pattern x candidate).
fn match_components(pattern: &[Component], candidate: &[Component], closed_at_end: bool) -> bool {
    if !pattern.iter().any(Component::is_skip) {
        let Some(prefix) = candidate.get(..pattern.len()) else {
            return false;
        };
        return (closed_at_end || candidate.len() == pattern.len())
            && pattern.iter().zip(prefix).all(|(p, c)| component_matches(p, c));
    }

    let width = candidate.len() + 1;
    // next[j]: the components after the current one match candidate[j..]
    let mut next: Vec<bool> = (0..width).map(|j| closed_at_end || j == candidate.len()).collect();
    let mut current = vec![false; width];

    for component in pattern.iter().rev() {
        if component.is_skip() {
            let mut reachable = false;
            for j in (0..width).rev() {
                reachable |= next[j];
                current[j] = reachable;
            }
        } else {
            current[candidate.len()] = false;
            for (j, actual) in candidate.iter().enumerate() {
                current[j] = next[j + 1] && component_matches(component, actual);
            }
        }
        std::mem::swap(&mut current, &mut next);
    }
    next[0]
}

impl Default for PathPattern {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.closed_at_end == other.closed_at_end && self.components == other.components
    }
}

impl Eq for PathPattern {}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        for component in &self.components {
            f.write_str("/")?;
            component.fmt(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn path(spec: &str) -> PathPattern {
        PathPattern::from_str(spec, false).unwrap()
    }

    fn closed(spec: &str) -> PathPattern {
        PathPattern::from_str(spec, true).unwrap()
    }

    #[test]
    fn test_basic_paths() {
        let p = path("/a/b/c");
        assert!(!p.matches(&path("/a/b")));
        assert!(p.matches(&path("/a/b/c")));
        assert!(!p.matches(&path("/a/b/c/d")));

        let p = closed("/a/b/c");
        assert!(!p.matches(&path("/a/b")));
        assert!(p.matches(&path("/a/b/c")));
        assert!(p.matches(&path("/a/b/c/d")));
        assert!(p.matches(&path("/a/b/c/d/e")));

        let p = closed("/a/a/b");
        assert!(p.matches(&path("/a/a/b")));
        assert!(!p.matches(&path("/a/b/c")));

        let p = closed("/a/b/c/c");
        assert!(p.matches(&path("/a/b/c/c")));
        assert!(!p.matches(&path("/a/b/c/d")));
    }

    #[test]
    fn test_wildcards() {
        let p = path("/a//c");
        assert!(p.matches(&path("/a/b/c")));
        assert!(!p.matches(&path("/a/b")));
        assert!(!p.matches(&path("/a/b/c/d")));
        assert!(p.matches(&path("/a/c")));

        let p = closed("//c");
        assert!(p.matches(&path("/a/b/c")));
        assert!(p.matches(&path("/a/b/c/c/c")));
        assert!(!p.matches(&path("/a/b/b")));

        let p = closed("/a/b/*");
        assert!(p.matches(&path("/a/b/c")));
        assert!(p.matches(&path("/a/b/c/d")));
        assert!(!p.matches(&path("/a/b")));

        let p = path("/a/b/*");
        assert!(p.matches(&path("/a/b/c")));
        assert!(!p.matches(&path("/a/b/c/d")));
        assert!(!p.matches(&path("/a/b")));

        let p = closed("/a/b//*");
        assert!(p.matches(&path("/a/b/c")));
        assert!(p.matches(&path("/a/b/c/d")));

        let p = closed("//c/d");
        assert!(p.matches(&path("/a/b/c/c/d")));
    }

    #[test]
    fn test_open_gap_needs_exhausted_candidate() {
        let p = path("//c");
        assert!(p.matches(&path("/a/b/c/c/c")));
        assert!(!p.matches(&path("/a/c/d")));
    }

    #[test]
    fn test_trailing_gap_matches_exhausted_candidate() {
        let mut p = path("/a/b");
        p.push(Component::Skip);
        assert!(p.matches(&path("/a/b")));
        assert!(p.matches(&path("/a/b/c/d")));
    }

    #[test]
    fn test_wildcard_skips_attributes() {
        let p = path("/a/*");
        assert!(!p.matches(&path("/a/@id")));
        assert!(path("/a/@id").matches(&path("/a/@id")));
        assert!(!path("/a/id").matches(&path("/a/@id")));
    }

    #[test]
    fn test_candidate_gap_only_matched_by_gap() {
        let candidate = path("//entry/name");
        assert!(path("//entry/name").matches(&candidate));
        assert!(path("//name").matches(&candidate));
        assert!(!path("/root/entry/name").matches(&candidate));
        assert!(!path("/*/entry/name").matches(&candidate));
    }

    #[test]
    fn test_namespaced_components() {
        let ns = NamespaceContext::new().with("t", "urn:test");
        let p = PathPattern::parse("//t:entry", false, &ns).unwrap();
        let other_prefix = NamespaceContext::new().with("u", "urn:test");
        assert!(p.matches(&PathPattern::parse("/u:root/u:entry", false, &other_prefix).unwrap()));
        assert!(!p.matches(&path("/root/entry")));
        assert!(PathPattern::parse("/x:a", false, &ns).is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(PathPattern::from_str("", false).is_err());
        assert!(PathPattern::from_str("/", false).is_err());
        assert!(PathPattern::from_str("/a/", false).is_err());
        assert!(PathPattern::from_str("/a/@", false).is_err());
    }

    #[test]
    fn test_gaps_collapse() {
        let p = path("/a///b");
        assert_eq!(p.len(), 3);
        assert_eq!(p.to_string(), "/a//b");
    }

    #[test]
    fn test_relative_spec() {
        let p = path("name/@lang");
        assert_eq!(p.len(), 2);
        assert_eq!(p.to_string(), "/name/@lang");
    }

    #[test]
    fn test_append_from_empty() {
        let mut p = PathPattern::new();
        p.append(&path("/a/b/c/d"));
        assert_eq!(p.to_string(), "/a/b/c/d");
        p.append(&path("/1/2/3"));
        assert_eq!(p.to_string(), "/a/b/c/d/1/2/3");

        let mut p = PathPattern::new();
        p.append(&path("/1/2/3"));
        assert_eq!(p.to_string(), "/1/2/3");
        assert_eq!(p.components(), path("/1/2/3").components());
    }

    #[test]
    fn test_append_from_non_empty() {
        let mut p = path("/a");
        p.append(&path("/1/2/3"));
        assert_eq!(p.to_string(), "/a/1/2/3");

        let mut p = path("/a");
        p.append(&path("/1/2/3/4/5/6"));
        assert_eq!(p.to_string(), "/a/1/2/3/4/5/6");

        let mut p = path("/a/b/c/d");
        p.append(&path("/1/2/3"));
        assert_eq!(p.to_string(), "/a/b/c/d/1/2/3");
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(path("/a").capacity(), DEFAULT_SIZE);
    }

    #[test]
    fn test_reset_capacity() {
        let mut p = path("/a");
        p.reset();
        assert_eq!(p.capacity(), DEFAULT_SIZE);
        assert!(p.is_empty());

        let mut p = path("/a/b");
        p.reset();
        assert_eq!(p.capacity(), DEFAULT_SIZE);

        let spec = "/a".repeat(DEFAULT_SIZE * MAX_OVER_ALLOCATION_FACTOR);
        let mut p = path(&spec);
        p.reset();
        assert_eq!(p.capacity(), DEFAULT_SIZE * MAX_OVER_ALLOCATION_FACTOR);

        let spec = "/a".repeat(DEFAULT_SIZE * MAX_OVER_ALLOCATION_FACTOR * 2);
        let mut p = path(&spec);
        p.reset();
        assert_eq!(p.capacity(), DEFAULT_SIZE);
    }

    #[test]
    fn test_cursor_push_pop() {
        let mut cursor = PathPattern::new();
        cursor.push_name(QName::element("a"));
        cursor.push_name(QName::element("b"));
        assert!(path("/a/b").matches(&cursor));
        assert!(cursor.pop().is_some());
        assert!(path("/a").matches(&cursor));
    }

    #[test]
    fn test_many_gaps_deep_candidate() {
        let deep = path(&"/a".repeat(60));
        let started = std::time::Instant::now();
        assert!(!path("//a//a//a//a//a//a//b").matches(&deep));
        assert!(path("//a//a//a//a//a//a").matches(&deep));
        assert!(closed("//a//a//a//a//a//a//a").matches(&deep));
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }

    fn literal_path() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "d"]), 1..8)
            .prop_map(|names| names.into_iter().map(String::from).collect())
    }

    proptest! {
        #[test]
        fn prop_literal_match_is_equality(left in literal_path(), right in literal_path()) {
            let p = path(&format!("/{}", left.join("/")));
            let c = path(&format!("/{}", right.join("/")));
            prop_assert_eq!(p.matches(&c), left == right);
        }

        #[test]
        fn prop_literal_display_inverts_parse(names in literal_path()) {
            let spec = format!("/{}", names.join("/"));
            prop_assert_eq!(path(&spec).to_string(), spec);
        }
    }
}
