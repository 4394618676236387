//! Batch Strategies
//!
//! - Parallel extraction over many documents of one collection
//! - Parallel optimization of many queries against one registry

pub mod parallel;

pub use parallel::{extract_parallel, optimize_parallel};
