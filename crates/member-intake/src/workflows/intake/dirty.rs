use std::collections::BTreeSet;

use serde::Serialize;

use super::domain::FieldName;

/// What navigating away from the flow requires given the current dirty state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveDecision {
    /// Nothing unsaved; discard without prompting.
    DiscardNow,
    /// Unsaved edits exist; the user must confirm before the record is discarded.
    ConfirmDiscard,
}

/// Records whether tracked fields changed since the last saved marker.
#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    touched: BTreeSet<FieldName>,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_mutation(&mut self, field: FieldName) {
        self.touched.insert(field);
    }

    pub fn mark_saved(&mut self) {
        self.touched.clear();
    }

    pub fn is_dirty(&self) -> bool {
        !self.touched.is_empty()
    }

    pub fn touched(&self) -> impl Iterator<Item = FieldName> + '_ {
        self.touched.iter().copied()
    }

    pub fn leave_decision(&self) -> LeaveDecision {
        if self.is_dirty() {
            LeaveDecision::ConfirmDiscard
        } else {
            LeaveDecision::DiscardNow
        }
    }
}
