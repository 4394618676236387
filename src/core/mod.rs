//! Core XML scanning primitives
//!
//! - Scanner: SIMD-accelerated delimiter detection using memchr
//! - Entities: entity decoding with Cow (zero-copy when possible)
//! - Events: ScanHandler-based event scanner used by the configuration
//!   loader and the document indexer

pub mod entities;
pub mod events;
pub mod scanner;

pub use events::{EventScanner, RawAttribute, ScanHandler};
