//! Sorted, duplicate-free registry of class names
//!
//! Built once per session from the per-source name lists of a
//! [`NameSource`](crate::reflect::NameSource). Exact and prefix lookups are
//! both expressed through [`NameCatalog::lower_bound`].

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::ops::Range;

use crate::matcher::NameFilter;

/// Character appended to a prefix to form the exclusive upper key of its range
pub const MAX_SENTINEL: char = char::MAX;

/// Sorted, deduplicated sequence of fully qualified names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameCatalog {
    names: Vec<String>,
}

impl NameCatalog {
    /// Merge per-source sorted lists into one sorted, duplicate-free catalog
    ///
    /// Lists are expected to be sorted already. A list that is not is sorted
    /// here (with a warning) so the catalog invariant always holds.
    pub fn build<I>(sources: I) -> Self
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let mut lists: Vec<Vec<String>> = sources.into_iter().collect();
        for (index, list) in lists.iter_mut().enumerate() {
            if !list.windows(2).all(|w| w[0] <= w[1]) {
                tracing::warn!(source = index, len = list.len(), "catalog.source.unsorted");
                list.sort();
            }
        }

        let total = lists.iter().map(Vec::len).sum();
        let mut names: Vec<String> = Vec::with_capacity(total);
        let mut iters: Vec<_> = lists.into_iter().map(Vec::into_iter).collect();

        // k-way merge: heap holds the current head of every list
        let mut heap = BinaryHeap::with_capacity(iters.len());
        for (index, iter) in iters.iter_mut().enumerate() {
            if let Some(name) = iter.next() {
                heap.push(Reverse((name, index)));
            }
        }
        while let Some(Reverse((name, index))) = heap.pop() {
            if let Some(next) = iters[index].next() {
                heap.push(Reverse((next, index)));
            }
            if names.last() != Some(&name) {
                names.push(name);
            }
        }

        tracing::debug!(names = names.len(), merged = total, "catalog.built");
        Self { names }
    }

    /// Index of the first name `>= key`, or `len()` if there is none
    pub fn lower_bound(&self, key: &str) -> usize {
        self.names.partition_point(|name| name.as_str() < key)
    }

    /// Range holding `name` if present, otherwise an empty range
    pub fn exact_range(&self, name: &str) -> Range<usize> {
        let low = self.lower_bound(name);
        if self.names.get(low).map(String::as_str) == Some(name) {
            low..low + 1
        } else {
            low..low
        }
    }

    /// Range of all names starting with `prefix`
    pub fn prefix_range(&self, prefix: &str) -> Range<usize> {
        let mut upper = String::with_capacity(prefix.len() + MAX_SENTINEL.len_utf8());
        upper.push_str(prefix);
        upper.push(MAX_SENTINEL);
        self.lower_bound(prefix)..self.lower_bound(&upper)
    }

    /// Candidate range for an optional name constraint
    ///
    /// An exact name takes precedence over a prefix; without a constraint the
    /// whole catalog is returned.
    pub fn candidates(&self, filter: Option<&NameFilter>) -> Range<usize> {
        match filter {
            Some(NameFilter {
                exact: Some(exact), ..
            }) => self.exact_range(exact),
            Some(NameFilter {
                prefix: Some(prefix),
                ..
            }) => self.prefix_range(prefix),
            _ => 0..self.names.len(),
        }
    }

    /// Name at `index`
    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// All names in order
    pub fn as_slice(&self) -> &[String] {
        &self.names
    }

    /// Number of names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
