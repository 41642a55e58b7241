use crate::models::normalize_account_id;
use std::collections::{HashMap, HashSet};

/// Per-row bookkeeping for one-click cap resets. Keys are normalized so
/// `act_123` and `123` refer to the same row.
#[derive(Clone, Debug, Default)]
pub(crate) struct RowResets {
    in_flight: HashSet<String>,
    errors: HashMap<String, String>,
}

impl RowResets {
    /// Marks `id` as in flight and clears its last error. Returns `false`
    /// when a reset for the row is already running.
    pub fn begin(&mut self, id: &str) -> bool {
        let key = normalize_account_id(id).to_string();
        self.errors.remove(&key);
        self.in_flight.insert(key)
    }

    pub fn finish(&mut self, id: &str, outcome: Result<(), String>) {
        let key = normalize_account_id(id).to_string();
        self.in_flight.remove(&key);
        if let Err(message) = outcome {
            self.errors.insert(key, message);
        }
    }

    pub fn is_busy(&self, id: &str) -> bool {
        self.in_flight.contains(normalize_account_id(id))
    }

    pub fn error(&self, id: &str) -> Option<String> {
        self.errors.get(normalize_account_id(id)).cloned()
    }

    /// Drops stale errors when a new page replaces the rows.
    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }
}
