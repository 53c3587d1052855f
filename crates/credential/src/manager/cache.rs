//! Lookup cache for password entries
//!
//! Derived state only: the set of service URIs backed by `password#`
//! entries, plus a map from each lookup candidate to the canonical stored
//! URI. Built lazily from the container on first use and thrown away on
//! every store-change event; it is never persisted.
//!
//! Besides the identity mapping for every stored URI, each fragment-bearing
//! URI contributes a mapping from its fragment-stripped form, so a request
//! without a realm still finds the realm-qualified credential. When two
//! different realms share a fragment-stripped form, that derived mapping is
//! ambiguous and is dropped rather than resolved arbitrarily. Aliases are
//! walked in sorted order, so the outcome is deterministic.

use std::collections::HashMap;

use tracing::{debug, warn};
use url::Url;

use crate::core::alias;
use crate::store::KeyedContainer;

/// Lazily built lookup state.
#[derive(Debug, Default)]
pub(crate) struct LookupCache {
    state: Option<CacheState>,
}

/// The built mappings.
#[derive(Debug)]
pub(crate) struct CacheState {
    /// Service URIs of all `password#` entries, in sorted order
    pub service_uris: Vec<Url>,
    /// Lookup candidate -> canonical stored URI
    pub fragment_map: HashMap<Url, Url>,
}

impl LookupCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Drop the built state; the next use rebuilds from the container.
    pub(crate) fn invalidate(&mut self) {
        if self.state.take().is_some() {
            debug!("lookup cache invalidated");
        }
    }

    /// The built state, building it from the container if needed.
    pub(crate) fn get_or_build(&mut self, container: &KeyedContainer) -> &CacheState {
        self.state.get_or_insert_with(|| build(container))
    }
}

fn build(container: &KeyedContainer) -> CacheState {
    let mut service_uris = Vec::new();
    let mut fragment_map: HashMap<Url, Url> = HashMap::new();

    for entry_alias in container.aliases() {
        if !entry_alias.starts_with(alias::PASSWORD_ENTRY_PREFIX) {
            continue;
        }
        let Some(uri) = alias::password_entry_uri(entry_alias) else {
            warn!(alias = entry_alias, "password alias does not hold a parseable URI");
            continue;
        };

        fragment_map.insert(uri.clone(), uri.clone());
        service_uris.push(uri.clone());

        if uri.fragment().is_none_or(str::is_empty) {
            continue;
        }
        let mut no_fragment = uri.clone();
        no_fragment.set_fragment(None);

        match fragment_map.get(&no_fragment) {
            Some(existing) if existing.fragment().is_some_and(|f| !f.is_empty()) => {
                // Two realms share this base URI; neither wins.
                warn!(
                    base = %no_fragment,
                    first = existing.fragment().unwrap_or_default(),
                    second = uri.fragment().unwrap_or_default(),
                    "ambiguous realm mapping dropped"
                );
                fragment_map.remove(&no_fragment);
            }
            Some(_) => {}
            None => {
                fragment_map.insert(no_fragment, uri.clone());
            }
        }
    }

    debug!(
        uris = service_uris.len(),
        mappings = fragment_map.len(),
        "lookup cache built"
    );
    CacheState {
        service_uris,
        fragment_map,
    }
}
