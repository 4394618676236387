//! Query Front End and Optimizer
//!
//! - `lexer` / `parser` / `ast`: the query subset the optimizer inspects
//! - `analyze`: static paths and comparison shapes
//! - `rewrite`: predicate-to-index rewriting and the whole-query pass
//! - `cache`: parsed-query LRU cache

pub mod analyze;
pub mod ast;
pub mod cache;
pub mod lexer;
pub mod parser;
pub mod rewrite;

pub use analyze::{StaticContext, RANGE_NS};
pub use ast::{Axis, BinaryOp, Expr, FieldLookup, NodeTest, Predicate, Step};
pub use cache::{QueryCache, QUERY_CACHE_CAPACITY};
pub use parser::parse;
pub use rewrite::{PredicateRewriter, QueryOptimizer};
