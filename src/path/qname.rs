//! Qualified Names
//!
//! Identity of a path component: namespace URI, local name and whether the
//! name addresses an element or an attribute. The prefix is carried only for
//! rendering and never takes part in equality.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Whether a name addresses an element or an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    Element,
    Attribute,
}

/// Qualified name (namespace URI + local name)
#[derive(Debug, Clone)]
pub struct QName {
    namespace: Option<Arc<str>>,
    local: Arc<str>,
    prefix: Option<Arc<str>>,
    kind: NameKind,
}

impl QName {
    /// Element name in no namespace
    pub fn element(local: &str) -> Self {
        Self::new(None, local, None, NameKind::Element)
    }

    /// Attribute name in no namespace
    pub fn attribute(local: &str) -> Self {
        Self::new(None, local, None, NameKind::Attribute)
    }

    /// Build a name; an empty namespace URI means "no namespace"
    pub fn new(namespace: Option<&str>, local: &str, prefix: Option<&str>, kind: NameKind) -> Self {
        QName {
            namespace: namespace.filter(|ns| !ns.is_empty()).map(Arc::from),
            local: Arc::from(local),
            prefix: prefix.filter(|p| !p.is_empty()).map(Arc::from),
            kind,
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn local_name(&self) -> &str {
        &self.local
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn kind(&self) -> NameKind {
        self.kind
    }

    #[inline]
    pub fn is_attribute(&self) -> bool {
        self.kind == NameKind::Attribute
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.local == other.local && self.namespace == other.namespace
    }
}

impl Eq for QName {}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.local.hash(state);
        self.namespace.hash(state);
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_attribute() {
            f.write_str("@")?;
        }
        match (&self.prefix, &self.namespace) {
            (Some(prefix), _) => write!(f, "{}:{}", prefix, self.local),
            (None, Some(ns)) => write!(f, "{{{}}}{}", ns, self.local),
            (None, None) => f.write_str(&self.local),
        }
    }
}
