//! Rotation model.
//!
//! A rotation is an assignable duty. Coverage bounds, cooldowns,
//! prerequisites and the like are expressed as constraint specifications
//! referencing the rotation by name; the rotation itself only carries its
//! identity and group structure.

use serde::{Deserialize, Serialize};

/// An assignable duty/task type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rotation {
    /// Unique rotation identifier.
    pub id: String,
    /// Group memberships (e.g. "medicine", "elective").
    #[serde(default)]
    pub groups: Vec<String>,
    /// Resident groups eligible for this rotation. Empty means everyone.
    #[serde(default)]
    pub eligible_groups: Vec<String>,
}

impl Rotation {
    /// Creates a rotation open to all residents.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            groups: Vec::new(),
            eligible_groups: Vec::new(),
        }
    }

    /// Adds a group membership.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    /// Restricts eligibility to a resident group.
    pub fn with_eligible_group(mut self, group: impl Into<String>) -> Self {
        self.eligible_groups.push(group.into());
        self
    }

    /// Whether the rotation belongs to `group`.
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_builder() {
        let r = Rotation::new("ICU")
            .with_group("medicine")
            .with_eligible_group("CA2");

        assert_eq!(r.id, "ICU");
        assert!(r.in_group("medicine"));
        assert_eq!(r.eligible_groups, vec!["CA2".to_string()]);
    }
}
