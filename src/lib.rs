//! RustyRange - Structural path matching and range-index query rewriting
//!
//! Pieces:
//! A: Path patterns (path_matches)
//! B: Collection index configurations (registry_*)
//! C: Predicate rewriting into field lookups (optimize_query)
//! D: Field extraction from documents (extract_fields)
//! E: Parallel batches (extract_fields_parallel, optimize_queries_parallel)

use rustler::{Binary, Encoder, Env, Term};

pub mod config;
pub mod core;
pub mod error;
pub mod extract;
pub mod path;
pub mod query;
mod resource;
pub mod strategy;
mod term;

use config::load_rule_set;
use extract::DocumentIndexer;
use path::{NamespaceContext, PathPattern};
use query::{QueryOptimizer, StaticContext};
use resource::{RegistryRef, RegistryResource};
use rustler::ResourceArc;
use term::{error_to_term, indexed_nodes_to_term, ok_tuple, str_to_binary};

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "memory_tracking")]
mod tracking {
    use std::alloc::{GlobalAlloc, Layout};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub static ALLOCATED: AtomicUsize = AtomicUsize::new(0);
    pub static PEAK_ALLOCATED: AtomicUsize = AtomicUsize::new(0);

    pub struct TrackingAllocator;

    #[cfg(feature = "mimalloc")]
    static UNDERLYING: mimalloc::MiMalloc = mimalloc::MiMalloc;

    #[cfg(not(feature = "mimalloc"))]
    static UNDERLYING: std::alloc::System = std::alloc::System;

    fn record_peak(current: usize) {
        let mut peak = PEAK_ALLOCATED.load(Ordering::Relaxed);
        while current > peak {
            match PEAK_ALLOCATED.compare_exchange_weak(peak, current, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
    }

    unsafe impl GlobalAlloc for TrackingAllocator {
        unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
            let ptr = UNDERLYING.alloc(layout);
            if !ptr.is_null() {
                record_peak(ALLOCATED.fetch_add(layout.size(), Ordering::Relaxed) + layout.size());
            }
            ptr
        }

        unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
            ALLOCATED.fetch_sub(layout.size(), Ordering::Relaxed);
            UNDERLYING.dealloc(ptr, layout)
        }
    }
}

#[cfg(feature = "memory_tracking")]
#[global_allocator]
static GLOBAL: tracking::TrackingAllocator = tracking::TrackingAllocator;

#[cfg(all(feature = "mimalloc", not(feature = "memory_tracking")))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// ============================================================================
// Memory Tracking NIFs
// ============================================================================

#[cfg(feature = "memory_tracking")]
use std::sync::atomic::Ordering;

#[cfg(feature = "memory_tracking")]
#[rustler::nif]
fn get_rust_memory() -> usize {
    tracking::ALLOCATED.load(Ordering::SeqCst)
}

#[cfg(feature = "memory_tracking")]
#[rustler::nif]
fn get_rust_memory_peak() -> usize {
    tracking::PEAK_ALLOCATED.load(Ordering::SeqCst)
}

#[cfg(feature = "memory_tracking")]
#[rustler::nif]
fn reset_rust_memory_stats() -> (usize, usize) {
    let current = tracking::ALLOCATED.load(Ordering::SeqCst);
    let peak = tracking::PEAK_ALLOCATED.swap(current, Ordering::SeqCst);
    (current, peak)
}

#[cfg(not(feature = "memory_tracking"))]
#[rustler::nif]
fn get_rust_memory() -> usize {
    0
}

#[cfg(not(feature = "memory_tracking"))]
#[rustler::nif]
fn get_rust_memory_peak() -> usize {
    0
}

#[cfg(not(feature = "memory_tracking"))]
#[rustler::nif]
fn reset_rust_memory_stats() -> (usize, usize) {
    (0, 0)
}

// ============================================================================
// A: Path Patterns
// ============================================================================

/// Does `pattern` match the concrete path `candidate`?
///
/// `closed` makes the pattern also match every descendant of its last step.
#[rustler::nif]
fn path_matches<'a>(env: Env<'a>, pattern: &str, candidate: &str, closed: bool) -> Term<'a> {
    let parsed = PathPattern::from_str(pattern, closed)
        .and_then(|pattern| PathPattern::from_str(candidate, false).map(|candidate| (pattern, candidate)));
    match parsed {
        Ok((pattern, candidate)) => ok_tuple(env, pattern.matches(&candidate).encode(env)),
        Err(e) => error_to_term(env, &e),
    }
}

// ============================================================================
// B: Collection Registry
// ============================================================================

#[rustler::nif]
fn registry_new() -> RegistryRef {
    ResourceArc::new(RegistryResource::new())
}

/// Load a collection configuration document and publish its rules
///
/// Returns `{:ok, rule_count, errors}`; rules that failed to load are
/// reported in `errors` and left out of the published set.
#[rustler::nif(schedule = "DirtyCpu")]
fn registry_publish<'a>(env: Env<'a>, registry: RegistryRef, collection: &str, config: Binary<'a>) -> Term<'a> {
    let report = load_rule_set(collection, config.as_slice());
    let errors: Vec<Term<'a>> = report
        .errors
        .iter()
        .map(|e| str_to_binary(env, &e.to_string()))
        .collect();
    let published = registry.registry.publish(report.rule_set);
    (term::ok(), published.len(), errors).encode(env)
}

/// Number of rules in effect for a collection (own or inherited)
#[rustler::nif]
fn registry_rule_count(registry: RegistryRef, collection: &str) -> usize {
    registry
        .registry
        .index_configuration(collection)
        .map_or(0, |set| set.len())
}

// ============================================================================
// C: Query Optimization
// ============================================================================

fn static_context(collections: Vec<String>, bindings: Vec<(String, String)>) -> StaticContext {
    let mut namespaces = NamespaceContext::new();
    for (prefix, uri) in &bindings {
        namespaces.declare(prefix, uri);
    }
    StaticContext::new(namespaces, collections)
}

/// Rewrite indexable predicates of a query into field lookups
///
/// `context` is `{default_collections, [{prefix, uri}]}`. Returns the
/// rewritten query text.
#[rustler::nif(schedule = "DirtyCpu")]
fn optimize_query<'a>(
    env: Env<'a>,
    registry: RegistryRef,
    query: &str,
    context: (Vec<String>, Vec<(String, String)>),
) -> Term<'a> {
    let expr = match registry.cache.get_or_parse(query) {
        Ok(expr) => expr,
        Err(e) => return error_to_term(env, &e),
    };
    let optimizer = QueryOptimizer::new(&registry.registry, static_context(context.0, context.1));
    ok_tuple(env, str_to_binary(env, &optimizer.optimize(&expr).to_string()))
}

// ============================================================================
// D: Field Extraction
// ============================================================================

/// Index one document against the configuration of its collection
#[rustler::nif(schedule = "DirtyCpu")]
fn extract_fields<'a>(env: Env<'a>, registry: RegistryRef, collection: &str, document: Binary<'a>) -> Term<'a> {
    match registry.registry.index_configuration(collection) {
        Some(rule_set) => {
            let nodes = DocumentIndexer::new(rule_set).index(document.as_slice());
            ok_tuple(env, indexed_nodes_to_term(env, &nodes))
        }
        None => ok_tuple(env, Term::list_new_empty(env)),
    }
}

// ============================================================================
// E: Parallel Batches
// ============================================================================

#[rustler::nif(schedule = "DirtyCpu")]
fn extract_fields_parallel<'a>(
    env: Env<'a>,
    registry: RegistryRef,
    collection: &str,
    documents: Vec<Binary<'a>>,
) -> Term<'a> {
    let Some(rule_set) = registry.registry.index_configuration(collection) else {
        let empty: Vec<Term<'a>> = documents.iter().map(|_| Term::list_new_empty(env)).collect();
        return ok_tuple(env, empty.encode(env));
    };

    let slices: Vec<&[u8]> = documents.iter().map(|doc| doc.as_slice()).collect();
    let results = strategy::extract_parallel(&rule_set, &slices);
    let terms: Vec<Term<'a>> = results
        .iter()
        .map(|nodes| indexed_nodes_to_term(env, nodes))
        .collect();
    ok_tuple(env, terms.encode(env))
}

/// One `{:ok, text}` or `{:error, message}` per query, in input order
#[rustler::nif(schedule = "DirtyCpu")]
fn optimize_queries_parallel<'a>(
    env: Env<'a>,
    registry: RegistryRef,
    queries: Vec<String>,
    context: (Vec<String>, Vec<(String, String)>),
) -> Term<'a> {
    let ctx = static_context(context.0, context.1);
    let queries: Vec<&str> = queries.iter().map(String::as_str).collect();
    let results = strategy::optimize_parallel(&registry.registry, &registry.cache, &ctx, &queries);
    let terms: Vec<Term<'a>> = results
        .iter()
        .map(|result| match result {
            Ok(text) => ok_tuple(env, str_to_binary(env, text)),
            Err(e) => error_to_term(env, e),
        })
        .collect();
    terms.encode(env)
}

rustler::init!("Elixir.RustyRange.Native");
