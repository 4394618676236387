//! Field Extraction
//!
//! Index-time side of the range index: collectors that turn the events of
//! a matched node into fields, and the indexer that drives them over a
//! document.

pub mod collector;
pub mod field;
pub mod indexer;

pub use collector::{ComplexTextCollector, SimpleTextCollector, TextCollector};
pub use field::Field;
pub use indexer::{DocumentIndexer, IndexedNode};
