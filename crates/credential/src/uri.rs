//! Service-URI resolution
//!
//! Credentials are keyed by service URI, but a request for
//! `http://host/a/b/c?q=1#realm` should also match a credential stored for
//! `http://host/a/b/` or for the host root. [`possible_lookups`] produces
//! the ordered candidate list used for both reading and writing the lookup
//! cache: most specific first, fragment (realm) variants ahead of their
//! fragment-free forms, duplicates suppressed with first occurrence winning.
//!
//! The fragment is *not* a document anchor here: it names the authentication
//! realm, so it is preserved through the parent-path walk and only stripped
//! in the trailing no-fragment block.

use indexmap::IndexSet;
use url::Url;

/// Ordered lookup candidates for a service URI.
///
/// The first candidate is always the normalized URI itself (dot segments
/// resolved, user-info stripped). With `use_path_recursion` and a regular
/// absolute URI, the sequence continues with the query-stripped form, each
/// ancestor directory up to the host root, and then a no-fragment variant
/// of every candidate produced so far (if the URI carried a fragment).
#[must_use]
pub fn possible_lookups(service: &Url, use_path_recursion: bool) -> Vec<Url> {
    let uri = strip_user_info(service);

    let mut possibles: IndexSet<Url> = IndexSet::new();
    possibles.insert(uri.clone());

    if !use_path_recursion || uri.cannot_be_a_base() {
        return possibles.into_iter().collect();
    }

    let fragment = realm_fragment(&uri);

    let mut without_query = uri.clone();
    without_query.set_query(None);
    without_query.set_fragment(None);
    insert_with_fragment(&mut possibles, without_query.clone(), fragment.as_deref());

    let Ok(mut parent) = without_query.join(".") else {
        return possibles.into_iter().collect();
    };
    insert_with_fragment(&mut possibles, parent.clone(), fragment.as_deref());

    let mut root = parent.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);

    while parent != root && !parent.path().is_empty() {
        let Ok(next) = parent.join("..") else { break };
        if next == parent {
            break;
        }
        parent = next;
        insert_with_fragment(&mut possibles, parent.clone(), fragment.as_deref());
    }

    // The walk normally ends at the root, but include it explicitly in case
    // it stopped at a fixed point short of equality.
    insert_with_fragment(&mut possibles, root, fragment.as_deref());

    if fragment.is_some() {
        let fragmented: Vec<Url> = possibles.iter().cloned().collect();
        for mut candidate in fragmented {
            candidate.set_fragment(None);
            possibles.insert(candidate);
        }
    }

    possibles.into_iter().collect()
}

/// Canonical "directory" form of a service URI, used when persisting a new
/// credential under a coarser scope than the exact request.
///
/// Strips user-info and query, resolves to the enclosing directory, and
/// keeps the fragment (realm).
#[must_use]
pub fn normalize_service_uri(service: &Url) -> Url {
    let uri = strip_user_info(service);
    if uri.cannot_be_a_base() {
        return uri;
    }

    let fragment = realm_fragment(&uri);
    let mut no_query = uri.clone();
    no_query.set_query(None);
    no_query.set_fragment(None);

    let mut dir = no_query.join(".").unwrap_or(no_query);
    if let Some(fragment) = &fragment {
        dir.set_fragment(Some(fragment));
    }
    dir
}

/// Remove username/password from the URI. Parsing has already resolved
/// dot segments, so the result is the normalized first candidate.
pub(crate) fn strip_user_info(service: &Url) -> Url {
    let mut uri = service.clone();
    if !uri.cannot_be_a_base() {
        let _ = uri.set_username("");
        let _ = uri.set_password(None);
    }
    uri
}

/// The realm fragment, with an empty fragment treated as absent.
fn realm_fragment(uri: &Url) -> Option<String> {
    uri.fragment().filter(|f| !f.is_empty()).map(ToOwned::to_owned)
}

fn insert_with_fragment(possibles: &mut IndexSet<Url>, mut candidate: Url, fragment: Option<&str>) {
    if let Some(fragment) = fragment {
        candidate.set_fragment(Some(fragment));
    }
    possibles.insert(candidate);
}
