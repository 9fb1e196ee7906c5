//! Roster: the typed registry of residents, rotations, and blocks.
//!
//! Every entity gets a dense index in declaration order. Declaration order
//! is significant twice over: blocks are *ordered* time units (adjacency
//! and windows follow that order), and index order fixes decision-variable
//! identity, which warm-start hints depend on.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

use super::{Resident, Rotation};

/// An ordered time unit in the scheduling horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Unique block identifier, e.g. "Block 3".
    pub id: String,
}

impl Block {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Immutable registry of all scheduling entities.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    residents: Vec<Resident>,
    rotations: Vec<Rotation>,
    blocks: Vec<Block>,
    resident_idx: HashMap<String, usize>,
    rotation_idx: HashMap<String, usize>,
    block_idx: HashMap<String, usize>,
}

impl Roster {
    /// Builds a roster from its entities, indexing them by name.
    ///
    /// Later duplicates of an id silently lose the index race; use
    /// [`crate::validation::validate`] to surface duplicates as errors.
    pub fn new(residents: Vec<Resident>, rotations: Vec<Rotation>, blocks: Vec<Block>) -> Self {
        let resident_idx = residents
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        let rotation_idx = rotations
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        let block_idx = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.id.clone(), i))
            .collect();
        Self {
            residents,
            rotations,
            blocks,
            resident_idx,
            rotation_idx,
            block_idx,
        }
    }

    pub fn n_residents(&self) -> usize {
        self.residents.len()
    }

    pub fn n_rotations(&self) -> usize {
        self.rotations.len()
    }

    pub fn n_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn residents(&self) -> &[Resident] {
        &self.residents
    }

    pub fn rotations(&self) -> &[Rotation] {
        &self.rotations
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn resident(&self, idx: usize) -> &Resident {
        &self.residents[idx]
    }

    pub fn rotation(&self, idx: usize) -> &Rotation {
        &self.rotations[idx]
    }

    pub fn block(&self, idx: usize) -> &Block {
        &self.blocks[idx]
    }

    /// Index of a resident by id.
    pub fn resident_index(&self, id: &str) -> Result<usize, ConfigError> {
        self.resident_idx
            .get(id)
            .copied()
            .ok_or_else(|| ConfigError::UnknownResident(id.to_string()))
    }

    /// Index of a rotation by id.
    pub fn rotation_index(&self, id: &str) -> Result<usize, ConfigError> {
        self.rotation_idx
            .get(id)
            .copied()
            .ok_or_else(|| ConfigError::UnknownRotation(id.to_string()))
    }

    /// Index of a block by id.
    pub fn block_index(&self, id: &str) -> Result<usize, ConfigError> {
        self.block_idx
            .get(id)
            .copied()
            .ok_or_else(|| ConfigError::UnknownBlock(id.to_string()))
    }

    /// All rotations declaring membership in `group`, in index order.
    ///
    /// A group resolving to no members is a configuration error.
    pub fn rotations_in_group(&self, group: &str) -> Result<Vec<usize>, ConfigError> {
        let members: Vec<usize> = self
            .rotations
            .iter()
            .enumerate()
            .filter(|(_, r)| r.in_group(group))
            .map(|(i, _)| i)
            .collect();
        if members.is_empty() {
            return Err(ConfigError::UnknownGroup(group.to_string()));
        }
        Ok(members)
    }

    /// All residents declaring membership in `group`, in index order.
    pub fn residents_in_group(&self, group: &str) -> Result<Vec<usize>, ConfigError> {
        let members: Vec<usize> = self
            .residents
            .iter()
            .enumerate()
            .filter(|(_, r)| r.in_group(group))
            .map(|(i, _)| i)
            .collect();
        if members.is_empty() {
            return Err(ConfigError::UnknownGroup(group.to_string()));
        }
        Ok(members)
    }

    /// Rotation names, or members of a rotation group, expanded in order.
    ///
    /// Used wherever configuration accepts "a rotation or a group of
    /// rotations" (followers, prerequisites, pool members).
    pub fn expand_rotations(&self, names: &[String]) -> Result<Vec<usize>, ConfigError> {
        let mut out = Vec::new();
        for name in names {
            match self.rotation_idx.get(name) {
                Some(&i) => out.push(i),
                None => out.extend(self.rotations_in_group(name)?),
            }
        }
        Ok(out)
    }

    /// Prior completed instances of a rotation, summed from history.
    pub fn prior_count(&self, resident: usize, rotation: usize) -> i64 {
        self.residents[resident].prior_count(&self.rotations[rotation].id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Roster {
        Roster::new(
            vec![
                Resident::new("A").with_group("CA1"),
                Resident::new("B").with_group("CA2"),
            ],
            vec![
                Rotation::new("ICU").with_group("medicine"),
                Rotation::new("Cards").with_group("medicine"),
                Rotation::new("Elective").with_group("light"),
            ],
            vec![Block::new("Block 1"), Block::new("Block 2")],
        )
    }

    #[test]
    fn test_index_lookup() {
        let r = sample();
        assert_eq!(r.resident_index("A").unwrap(), 0);
        assert_eq!(r.rotation_index("Elective").unwrap(), 2);
        assert_eq!(r.block_index("Block 2").unwrap(), 1);
    }

    #[test]
    fn test_unknown_names() {
        let r = sample();
        assert!(matches!(
            r.resident_index("Z"),
            Err(ConfigError::UnknownResident(_))
        ));
        assert!(matches!(
            r.rotation_index("Derm"),
            Err(ConfigError::UnknownRotation(_))
        ));
        assert!(matches!(
            r.block_index("Block 9"),
            Err(ConfigError::UnknownBlock(_))
        ));
    }

    #[test]
    fn test_group_resolution() {
        let r = sample();
        assert_eq!(r.rotations_in_group("medicine").unwrap(), vec![0, 1]);
        assert_eq!(r.residents_in_group("CA2").unwrap(), vec![1]);
        assert!(matches!(
            r.rotations_in_group("surgery"),
            Err(ConfigError::UnknownGroup(_))
        ));
    }

    #[test]
    fn test_expand_rotations_mixes_names_and_groups() {
        let r = sample();
        let out = r
            .expand_rotations(&["Elective".to_string(), "medicine".to_string()])
            .unwrap();
        assert_eq!(out, vec![2, 0, 1]);
    }
}
