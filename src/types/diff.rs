//! State diff result

use serde::{Deserialize, Serialize};

/// State of a view at one offset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffSide<S> {
    pub offset: i64,
    pub state: S,
}

/// Structural difference between two points in a view's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDiff<S> {
    pub from: DiffSide<S>,
    pub to: DiffSide<S>,
    /// Top-level keys whose values differ (`"value"` for non-object states)
    #[serde(rename = "changedKeys")]
    pub changed_keys: Vec<String>,
}

impl<S> StateDiff<S> {
    pub fn is_unchanged(&self) -> bool {
        self.changed_keys.is_empty()
    }
}
