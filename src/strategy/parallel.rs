//! Parallel Batch Processing
//!
//! Uses Rayon to index many documents or optimize many queries at once.
//! Every worker owns its own `DocumentIndexer`, and with it its own path
//! cursor; rule sets are shared read-only.

use std::sync::Arc;

use rayon::prelude::*;

use crate::config::{CollectionRegistry, IndexRuleSet};
use crate::error::Result;
use crate::extract::{DocumentIndexer, IndexedNode};
use crate::query::{QueryCache, QueryOptimizer, StaticContext};

/// Extract the indexed nodes of every document, in input order
pub fn extract_parallel<D>(rule_set: &Arc<IndexRuleSet>, documents: &[D]) -> Vec<Vec<IndexedNode>>
where
    D: AsRef<[u8]> + Sync,
{
    documents
        .par_iter()
        .map_init(
            || DocumentIndexer::new(Arc::clone(rule_set)),
            |indexer, doc| indexer.index(doc.as_ref()),
        )
        .collect()
}

/// Optimize every query and render it back to text, in input order
pub fn optimize_parallel(
    registry: &CollectionRegistry,
    cache: &QueryCache,
    ctx: &StaticContext,
    queries: &[&str],
) -> Vec<Result<String>> {
    let optimizer = QueryOptimizer::new(registry, ctx.clone());
    queries
        .par_iter()
        .map(|query| {
            let expr = cache.get_or_parse(query)?;
            Ok(optimizer.optimize(&expr).to_string())
        })
        .collect()
}
