//! Objective composition: scores, weighted terms, named strategies.
//!
//! Preference data enters as per-resident rotation rankings (and optional
//! per-block overrides) and accumulates into a dense [`ScoreTable`]. The
//! [`ObjectiveComposer`] turns the table plus any soft-constraint penalty
//! terms into one linear objective, minimized: lower rank positions mean
//! better-liked rotations, so a smaller score sum is a better schedule.
//!
//! Composition is a plain weighted sum, so registration order never
//! changes the composed objective.

use std::collections::BTreeMap;

use crate::engine::{Direction, LinearExpr};
use crate::error::ConfigError;
use crate::grid::VariableGrid;
use crate::models::Roster;

/// Direction every composed objective is solved in.
pub const OBJECTIVE_DIRECTION: Direction = Direction::Minimize;

/// Dense (resident, block, rotation) → score accumulator.
///
/// Scores are additive: rankings and per-block overrides for the same cell
/// stack rather than overwrite.
#[derive(Debug, Clone)]
pub struct ScoreTable {
    n_blocks: usize,
    n_rotations: usize,
    scores: Vec<i64>,
}

impl ScoreTable {
    /// All-zero table shaped to `roster`.
    pub fn new(roster: &Roster) -> Self {
        Self {
            n_blocks: roster.n_blocks(),
            n_rotations: roster.n_rotations(),
            scores: vec![0; roster.n_residents() * roster.n_blocks() * roster.n_rotations()],
        }
    }

    fn idx(&self, resident: usize, block: usize, rotation: usize) -> usize {
        (resident * self.n_blocks + block) * self.n_rotations + rotation
    }

    pub fn get(&self, resident: usize, block: usize, rotation: usize) -> i64 {
        self.scores[self.idx(resident, block, rotation)]
    }

    /// Adds `delta` to one cell.
    pub fn add(&mut self, resident: usize, block: usize, rotation: usize, delta: i64) {
        let i = self.idx(resident, block, rotation);
        self.scores[i] += delta;
    }

    /// Accumulates a resident's rotation ranking: the rotation listed at
    /// position `k` scores `k` in every block (first choice costs nothing).
    pub fn add_ranking(
        &mut self,
        roster: &Roster,
        resident: &str,
        ranked_rotations: &[String],
    ) -> Result<(), ConfigError> {
        let res = roster.resident_index(resident)?;
        for (position, rotation) in ranked_rotations.iter().enumerate() {
            let rot = roster.rotation_index(rotation)?;
            for block in 0..self.n_blocks {
                self.add(res, block, rot, position as i64);
            }
        }
        Ok(())
    }

    /// Accumulates a per-block score override for one (resident, rotation).
    pub fn add_block_score(
        &mut self,
        roster: &Roster,
        resident: &str,
        block: &str,
        rotation: &str,
        score: i64,
    ) -> Result<(), ConfigError> {
        self.add(
            roster.resident_index(resident)?,
            roster.block_index(block)?,
            roster.rotation_index(rotation)?,
            score,
        );
        Ok(())
    }

    /// A resident's score sum as a linear expression over the grid.
    pub fn resident_expr(&self, grid: &VariableGrid, resident: usize) -> LinearExpr {
        let mut expr = LinearExpr::new();
        for block in 0..self.n_blocks {
            for rotation in 0..self.n_rotations {
                let score = self.get(resident, block, rotation);
                if score != 0 {
                    expr.add_term(grid.var(resident, block, rotation), score);
                }
            }
        }
        expr
    }
}

/// Named objective strategy, selecting how score terms are weighted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectiveStrategy {
    /// Sum every resident's raw rank-derived score.
    RankSum,
    /// Like [`ObjectiveStrategy::RankSum`], with each resident's score
    /// multiplied by the weight of the first of their groups appearing in
    /// the map (weight 1 when none does).
    GroupWeightedRankSum { weights: BTreeMap<String, i64> },
}

impl ObjectiveStrategy {
    fn resident_weight(&self, roster: &Roster, resident: usize) -> i64 {
        match self {
            ObjectiveStrategy::RankSum => 1,
            ObjectiveStrategy::GroupWeightedRankSum { weights } => roster
                .resident(resident)
                .groups
                .iter()
                .find_map(|g| weights.get(g).copied())
                .unwrap_or(1),
        }
    }
}

/// Accumulates weighted linear terms into one objective expression.
#[derive(Debug, Default)]
pub struct ObjectiveComposer {
    terms: Vec<(i64, LinearExpr)>,
}

impl ObjectiveComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one weighted term. Soft constraint handlers contribute
    /// penalties through this; weights are additive by design.
    pub fn register_term(&mut self, weight: i64, expr: LinearExpr) {
        self.terms.push((weight, expr));
    }

    /// Registers every resident's score expression under `strategy`.
    pub fn register_scores(
        &mut self,
        strategy: &ObjectiveStrategy,
        roster: &Roster,
        grid: &VariableGrid,
        scores: &ScoreTable,
    ) {
        for resident in 0..roster.n_residents() {
            let expr = scores.resident_expr(grid, resident);
            if !expr.is_empty() {
                self.register_term(strategy.resident_weight(roster, resident), expr);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Sums all registered terms into the final objective expression.
    pub fn build(&self) -> LinearExpr {
        let mut objective = LinearExpr::new();
        for (weight, expr) in &self.terms {
            objective.add_scaled(expr, *weight);
        }
        objective
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Model;
    use crate::models::{Block, Resident, Rotation};

    fn setup() -> (Roster, Model, VariableGrid) {
        let roster = Roster::new(
            vec![
                Resident::new("A").with_group("CA1"),
                Resident::new("B").with_group("CA2"),
            ],
            vec![Rotation::new("ICU"), Rotation::new("Ward")],
            vec![Block::new("Block 1"), Block::new("Block 2")],
        );
        let mut model = Model::new();
        let grid = VariableGrid::build(&mut model, &roster, &[], None).unwrap();
        (roster, model, grid)
    }

    #[test]
    fn test_ranking_scores_are_rank_positions() {
        let (roster, _, _) = setup();
        let mut scores = ScoreTable::new(&roster);
        scores
            .add_ranking(&roster, "A", &["Ward".to_string(), "ICU".to_string()])
            .unwrap();

        // first choice free, second costs 1, in every block
        assert_eq!(scores.get(0, 0, 1), 0);
        assert_eq!(scores.get(0, 1, 1), 0);
        assert_eq!(scores.get(0, 0, 0), 1);
        assert_eq!(scores.get(1, 0, 0), 0);
    }

    #[test]
    fn test_block_override_stacks_with_ranking() {
        let (roster, _, _) = setup();
        let mut scores = ScoreTable::new(&roster);
        scores
            .add_ranking(&roster, "A", &["Ward".to_string(), "ICU".to_string()])
            .unwrap();
        scores
            .add_block_score(&roster, "A", "Block 2", "ICU", 5)
            .unwrap();

        assert_eq!(scores.get(0, 0, 0), 1);
        assert_eq!(scores.get(0, 1, 0), 6);
    }

    #[test]
    fn test_unknown_rotation_in_ranking() {
        let (roster, _, _) = setup();
        let mut scores = ScoreTable::new(&roster);
        assert!(matches!(
            scores.add_ranking(&roster, "A", &["Derm".to_string()]),
            Err(ConfigError::UnknownRotation(_))
        ));
    }

    #[test]
    fn test_composition_is_order_independent() {
        let (roster, _, grid) = setup();
        let mut scores = ScoreTable::new(&roster);
        scores
            .add_ranking(&roster, "A", &["Ward".to_string(), "ICU".to_string()])
            .unwrap();
        scores
            .add_ranking(&roster, "B", &["ICU".to_string(), "Ward".to_string()])
            .unwrap();

        let mut forward = ObjectiveComposer::new();
        forward.register_term(2, scores.resident_expr(&grid, 0));
        forward.register_term(3, scores.resident_expr(&grid, 1));

        let mut reverse = ObjectiveComposer::new();
        reverse.register_term(3, scores.resident_expr(&grid, 1));
        reverse.register_term(2, scores.resident_expr(&grid, 0));

        let values = vec![true; 8];
        assert_eq!(forward.build().eval(&values), reverse.build().eval(&values));
    }

    #[test]
    fn test_group_weighted_strategy() {
        let (roster, _, grid) = setup();
        let mut scores = ScoreTable::new(&roster);
        scores
            .add_ranking(&roster, "A", &["Ward".to_string(), "ICU".to_string()])
            .unwrap();
        scores
            .add_ranking(&roster, "B", &["Ward".to_string(), "ICU".to_string()])
            .unwrap();

        let strategy = ObjectiveStrategy::GroupWeightedRankSum {
            weights: [("CA1".to_string(), 10)].into_iter().collect(),
        };
        let mut composer = ObjectiveComposer::new();
        composer.register_scores(&strategy, &roster, &grid, &scores);

        // everyone on ICU in every block: A scores 2 blocks * 1 * 10, B 2 * 1
        let values = vec![
            true, false, true, false, // A: ICU both blocks
            true, false, true, false, // B: ICU both blocks
        ];
        assert_eq!(composer.build().eval(&values), 22);
    }
}
