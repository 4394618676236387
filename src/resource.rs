//! ResourceArc Wrappers
//!
//! Persistent state handed to the BEAM: the collection registry and the
//! parsed-query cache that goes with it.

use rustler::ResourceArc;

use crate::config::CollectionRegistry;
use crate::query::QueryCache;

/// Registry of published index configurations plus its query cache
#[derive(Default)]
pub struct RegistryResource {
    pub registry: CollectionRegistry,
    pub cache: QueryCache,
}

impl RegistryResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rustler::resource_impl]
impl rustler::Resource for RegistryResource {}

/// Type alias for the ResourceArc
pub type RegistryRef = ResourceArc<RegistryResource>;
