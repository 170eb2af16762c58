//! Cache keys.
//!
//! The original design separated the notion of a "key" from a "key
//! printer" capable of rendering it for storage. Rust's trait system
//! lets us fold the two into a single bound: anything that is
//! hashable, comparable, cheap to clone, and knows how to render
//! itself is a valid [`CacheKey`].

use std::hash::Hash;

/// A value usable as a cache key.
///
/// `printable()` produces the string used to derive on-disk file names
/// and remote record identifiers. It need not be unique across types,
/// only within the set of keys a single [`crate::cache::Cache`] sees.
pub trait CacheKey: Hash + Eq + Clone + Send + Sync + 'static {
    fn printable(&self) -> String;
}

impl CacheKey for String {
    fn printable(&self) -> String {
        self.clone()
    }
}

impl CacheKey for &'static str {
    fn printable(&self) -> String {
        (*self).to_string()
    }
}

/// Replaces path and namespace separators so a printable key is safe
/// to use as a single filesystem path component.
pub(crate) fn sanitize(printable: &str) -> String {
    printable
        .chars()
        .map(|c| match c {
            '/' | '\\' => '-',
            ':' => ';',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_path_separators() {
        assert_eq!(sanitize("users/42/avatar"), "users-42-avatar");
        assert_eq!(sanitize("C:\\temp"), "C;-temp");
    }

    #[test]
    fn string_printable_is_itself() {
        let key = "hello".to_string();
        assert_eq!(key.printable(), "hello");
    }
}
