//! Resident model.
//!
//! A resident is a person to be scheduled: one rotation per block across
//! the whole horizon. Group memberships scope constraints collectively;
//! the rotation history feeds prerequisite and count-with-history
//! constraints.

use serde::{Deserialize, Serialize};

/// A person occupying one rotation per block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resident {
    /// Unique resident identifier.
    pub id: String,
    /// Group memberships (e.g. a training-year cohort).
    #[serde(default)]
    pub groups: Vec<String>,
    /// Rotations already completed before the scheduling horizon,
    /// one entry per completed instance.
    #[serde(default)]
    pub history: Vec<String>,
}

impl Resident {
    /// Creates a resident with no groups and no history.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            groups: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Adds a group membership.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    /// Adds one completed prior instance of a rotation.
    pub fn with_history(mut self, rotation: impl Into<String>) -> Self {
        self.history.push(rotation.into());
        self
    }

    /// Whether the resident belongs to `group`.
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    /// Number of prior completed instances of `rotation`.
    pub fn prior_count(&self, rotation: &str) -> i64 {
        self.history.iter().filter(|r| *r == rotation).count() as i64
    }
}
