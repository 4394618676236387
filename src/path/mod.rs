//! Structural Paths
//!
//! Qualified names, namespace resolution and the `PathPattern` value used
//! both for declared index rules and for the live location of a document walk.

pub mod namespaces;
pub mod pattern;
pub mod qname;

pub use namespaces::{NamespaceContext, ScopedNamespaces};
pub use pattern::{Component, PathPattern, DEFAULT_SIZE, MAX_OVER_ALLOCATION_FACTOR};
pub use qname::{NameKind, QName};
