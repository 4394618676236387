//! Namespace Resolution
//!
//! Two resolvers:
//! - `NamespaceContext`: a flat prefix map for configuration and query text
//! - `ScopedNamespaces`: a stack-based resolver for document traversal

use std::collections::HashMap;
use std::sync::Arc;

use super::qname::{NameKind, QName};

/// Well-known namespace URIs
pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
}

/// Split `prefix:local` into its parts
#[inline]
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.find(':') {
        Some(pos) => (Some(&name[..pos]), &name[pos + 1..]),
        None => (None, name),
    }
}

/// Static prefix bindings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceContext {
    bindings: HashMap<String, String>,
}

impl NamespaceContext {
    /// Create a context with only the `xml` prefix bound
    pub fn new() -> Self {
        let mut bindings = HashMap::new();
        bindings.insert("xml".to_string(), ns::XML.to_string());
        NamespaceContext { bindings }
    }

    /// Bind a prefix, replacing any previous binding
    pub fn declare(&mut self, prefix: &str, uri: &str) {
        self.bindings.insert(prefix.to_string(), uri.to_string());
    }

    /// Builder form of [`declare`](Self::declare)
    pub fn with(mut self, prefix: &str, uri: &str) -> Self {
        self.declare(prefix, uri);
        self
    }

    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }

    /// Resolve a lexical name. Unprefixed names are in no namespace.
    /// Returns `None` for an unbound prefix.
    pub fn qname(&self, lexical: &str, kind: NameKind) -> Option<QName> {
        match split_qualified(lexical) {
            (Some(prefix), local) => {
                let uri = self.resolve(prefix)?;
                Some(QName::new(Some(uri), local, Some(prefix), kind))
            }
            (None, local) => Some(QName::new(None, local, None, kind)),
        }
    }
}

impl Default for NamespaceContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Namespace binding (prefix -> URI) declared at a depth
#[derive(Debug, Clone)]
struct NsBinding {
    /// Empty for the default namespace
    prefix: Arc<str>,
    uri: Arc<str>,
    depth: u16,
}

/// Stack-based namespace resolver for a document walk
#[derive(Debug)]
pub struct ScopedNamespaces {
    bindings: Vec<NsBinding>,
    depth: u16,
}

impl ScopedNamespaces {
    /// Create a resolver with the `xml` prefix pre-bound
    pub fn new() -> Self {
        let mut bindings = Vec::with_capacity(16);
        bindings.push(NsBinding {
            prefix: Arc::from("xml"),
            uri: Arc::from(ns::XML),
            depth: 0,
        });
        ScopedNamespaces { bindings, depth: 0 }
    }

    /// Enter a new element scope
    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Leave an element scope, removing any bindings declared in it
    pub fn pop_scope(&mut self) {
        while let Some(binding) = self.bindings.last() {
            if binding.depth < self.depth {
                break;
            }
            self.bindings.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Drop every binding except the pre-bound ones
    pub fn clear(&mut self) {
        self.bindings.truncate(1);
        self.depth = 0;
    }

    /// Declare a binding for the current scope; an empty prefix sets the default namespace
    pub fn declare(&mut self, prefix: &str, uri: &str) {
        if prefix == "xml" || prefix == "xmlns" {
            return;
        }
        self.bindings.push(NsBinding {
            prefix: Arc::from(prefix),
            uri: Arc::from(uri),
            depth: self.depth,
        });
    }

    /// Resolve a prefix (empty for the default namespace)
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|b| &*b.prefix == prefix)
            .map(|b| &*b.uri)
            .filter(|uri| !uri.is_empty())
    }

    /// Resolve an element name; unprefixed names take the default namespace
    pub fn element(&self, lexical: &str) -> QName {
        let (prefix, local) = split_qualified(lexical);
        let uri = self.resolve(prefix.unwrap_or(""));
        QName::new(uri, local, prefix, NameKind::Element)
    }

    /// Resolve an attribute name; unprefixed attributes are in no namespace
    pub fn attribute(&self, lexical: &str) -> QName {
        match split_qualified(lexical) {
            (Some(prefix), local) => {
                QName::new(self.resolve(prefix), local, Some(prefix), NameKind::Attribute)
            }
            (None, local) => QName::attribute(local),
        }
    }

    /// Get current depth
    pub fn depth(&self) -> u16 {
        self.depth
    }
}

impl Default for ScopedNamespaces {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_resolution() {
        let ctx = NamespaceContext::new().with("mods", "http://www.loc.gov/mods/v3");
        let q = ctx.qname("mods:title", NameKind::Element).unwrap();
        assert_eq!(q.namespace(), Some("http://www.loc.gov/mods/v3"));
        assert_eq!(q.local_name(), "title");
        assert!(ctx.qname("tei:title", NameKind::Element).is_none());
        assert_eq!(ctx.qname("title", NameKind::Element), Some(QName::element("title")));
    }

    #[test]
    fn test_scope_pop() {
        let mut resolver = ScopedNamespaces::new();

        resolver.push_scope();
        resolver.declare("foo", "http://example.com/foo");
        assert_eq!(resolver.resolve("foo"), Some("http://example.com/foo"));

        resolver.pop_scope();
        assert_eq!(resolver.resolve("foo"), None);
    }

    #[test]
    fn test_shadow_binding() {
        let mut resolver = ScopedNamespaces::new();

        resolver.push_scope();
        resolver.declare("ns", "http://example.com/ns1");

        resolver.push_scope();
        resolver.declare("ns", "http://example.com/ns2");
        assert_eq!(resolver.resolve("ns"), Some("http://example.com/ns2"));

        resolver.pop_scope();
        assert_eq!(resolver.resolve("ns"), Some("http://example.com/ns1"));
    }

    #[test]
    fn test_default_namespace_applies_to_elements_only() {
        let mut resolver = ScopedNamespaces::new();
        resolver.push_scope();
        resolver.declare("", "urn:default");

        assert_eq!(resolver.element("entry").namespace(), Some("urn:default"));
        assert_eq!(resolver.attribute("type").namespace(), None);

        // xmlns="" undeclares the default
        resolver.push_scope();
        resolver.declare("", "");
        assert_eq!(resolver.element("entry").namespace(), None);
    }
}
