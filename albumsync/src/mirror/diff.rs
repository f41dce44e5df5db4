use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};

/// Anything that can answer "is this name taken".
pub trait NameSet {
    fn contains_name(&self, name: &str) -> bool;
}

impl<S: Borrow<str> + Ord> NameSet for BTreeSet<S> {
    fn contains_name(&self, name: &str) -> bool {
        self.contains(name)
    }
}

impl<S: Borrow<str> + Ord, V> NameSet for BTreeMap<S, V> {
    fn contains_name(&self, name: &str) -> bool {
        self.contains_key(name)
    }
}

/// Every local name missing from `remote`, in `local` order.
///
/// One-directional: names that exist only remotely are never reported.
/// Comparison is exact and case-sensitive.
pub fn diff<'a, L, R>(local: L, remote: &R) -> Vec<String>
where
    L: IntoIterator<Item = &'a String>,
    R: NameSet + ?Sized,
{
    local
        .into_iter()
        .filter(|name| !remote.contains_name(name))
        .inspect(|name| tracing::debug!(%name, "pending for upload"))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn reports_local_only_names_in_local_order() {
        let local = set(&["2021-a", "2022-b", "2023-c"]);
        let remote = set(&["2022-b", "2024-remote-only"]);
        assert_eq!(diff(&local, &remote), vec!["2021-a", "2023-c"]);
    }

    #[test]
    fn identical_sets_have_no_diff() {
        let names = set(&["2021-a", "2022-b"]);
        assert!(diff(&names, &names).is_empty());
    }

    #[test]
    fn subset_has_no_diff() {
        let local = set(&["2022-b"]);
        let remote = set(&["2021-a", "2022-b"]);
        assert!(diff(&local, &remote).is_empty());
    }

    #[test]
    fn empty_remote_returns_everything() {
        let local = set(&["b", "a"]);
        assert_eq!(diff(&local, &BTreeSet::<String>::new()), vec!["a", "b"]);
    }

    #[test]
    fn comparison_is_case_sensitive() {
        let local = set(&["Trip"]);
        let remote = set(&["trip"]);
        assert_eq!(diff(&local, &remote), vec!["Trip"]);
    }

    #[test]
    fn remote_map_keys_are_used() {
        let local = set(&["a", "b"]);
        let mut remote = BTreeMap::new();
        remote.insert("a".to_string(), 7u32);
        assert_eq!(diff(&local, &remote), vec!["b"]);
    }

    #[test]
    fn result_is_exactly_the_set_difference() {
        let local = set(&["a", "b", "c", "d", "e"]);
        let remote = set(&["b", "d", "x"]);
        let pending: BTreeSet<String> = diff(&local, &remote).into_iter().collect();
        let expected: BTreeSet<String> = local.difference(&remote).cloned().collect();
        assert_eq!(pending, expected);
    }
}
