//! Bidirectional path <-> directory ID map
//!
//! Both directions live behind one type so they can never drift apart:
//! every insert first evicts any previous pairing of either key.

use std::collections::HashMap;

use crate::path;

/// A one-to-one mapping between canonical paths and provider directory IDs
#[derive(Debug, Default, Clone)]
pub struct PathIdMap {
    by_path: HashMap<String, String>,
    by_id: HashMap<String, String>,
}

impl PathIdMap {
    /// Creates an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs `path` with `id`, replacing any earlier pairing of either side
    pub fn insert(&mut self, path: impl Into<String>, id: impl Into<String>) {
        let path = path.into();
        let id = id.into();

        if let Some(old_id) = self.by_path.remove(&path) {
            self.by_id.remove(&old_id);
        }
        if let Some(old_path) = self.by_id.remove(&id) {
            self.by_path.remove(&old_path);
        }

        self.by_path.insert(path.clone(), id.clone());
        self.by_id.insert(id, path);
    }

    /// Looks up the ID for `path`
    pub fn id(&self, path: &str) -> Option<&str> {
        self.by_path.get(path).map(String::as_str)
    }

    /// Looks up the path for `id`
    pub fn path(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    /// Removes `dir` and every path below it, returning how many pairs went
    pub fn remove_subtree(&mut self, dir: &str) -> usize {
        let doomed: Vec<String> = self
            .by_path
            .keys()
            .filter(|p| path::is_within(p, dir))
            .cloned()
            .collect();

        for p in &doomed {
            if let Some(id) = self.by_path.remove(p) {
                self.by_id.remove(&id);
            }
        }
        doomed.len()
    }

    /// Removes every pair
    pub fn clear(&mut self) {
        self.by_path.clear();
        self.by_id.clear();
    }

    /// Number of pairs in the map
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    /// Returns true if the map holds no pairs
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        self.by_path.len() == self.by_id.len()
            && self
                .by_path
                .iter()
                .all(|(p, id)| self.by_id.get(id).map(String::as_str) == Some(p.as_str()))
    }
}
