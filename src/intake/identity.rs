use std::collections::HashSet;

use crate::config;

/// Stable artifact id: display name and byte length joined by a separator.
///
/// Deliberately coarse. Two different files sharing name and size collide, and
/// a renamed copy of an already processed file does not.
pub fn compute_id(file_name: &str, byte_len: usize) -> String {
    format!("{file_name}{}{byte_len}", config::intake::ID_SEPARATOR)
}

/// Ids already present in history. Owned and kept current by `HistoryStore`.
#[derive(Debug, Default, Clone)]
pub struct ProcessedIds(HashSet<String>);

impl ProcessedIds {
    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// False when the id was already present.
    pub(crate) fn insert(&mut self, id: String) -> bool {
        self.0.insert(id)
    }

    pub(crate) fn remove(&mut self, id: &str) -> bool {
        self.0.remove(id)
    }
}

pub fn is_duplicate(id: &str, processed: &ProcessedIds) -> bool {
    processed.contains(id)
}
