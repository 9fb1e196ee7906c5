//! Score floor handlers: lower bounds on rank-derived score sums.
//!
//! Scores are rank positions, so a "good" schedule has a *low* score sum;
//! these constraints are phrased as lower bounds to cap how much any one
//! resident (or the whole roster) can be favored at others' expense when
//! score tables carry negative reward entries.

use crate::engine::LinearExpr;
use crate::error::ConfigError;

use super::BuildContext;

/// Every resident's accumulated score must be at least `min`.
pub(super) fn min_individual_score(
    ctx: &mut BuildContext<'_>,
    min: i64,
) -> Result<(), ConfigError> {
    for res in 0..ctx.roster.n_residents() {
        let expr = ctx.scores.resident_expr(ctx.grid, res);
        ctx.model.add_linear(min, expr, i64::MAX);
    }
    Ok(())
}

/// The roster-wide score sum must be at least `min`.
pub(super) fn min_total_score(ctx: &mut BuildContext<'_>, min: i64) -> Result<(), ConfigError> {
    let mut total = LinearExpr::new();
    for res in 0..ctx.roster.n_residents() {
        total.add_scaled(&ctx.scores.resident_expr(ctx.grid, res), 1);
    }
    ctx.model.add_linear(min, total, i64::MAX);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::{BuildContext, ConstraintSpec};
    use crate::engine::{BacktrackEngine, Model, Solve, SolveBudget, SolveStatus};
    use crate::grid::VariableGrid;
    use crate::models::{Block, Resident, Rotation, Roster};
    use crate::objective::ScoreTable;

    fn build_with_scores(min_spec: ConstraintSpec) -> (Model, VariableGrid, Roster) {
        let roster = Roster::new(
            vec![Resident::new("A")],
            vec![Rotation::new("ICU"), Rotation::new("Ward")],
            vec![Block::new("Block 1"), Block::new("Block 2")],
        );
        let mut scores = ScoreTable::new(&roster);
        // ICU rewards (negative), Ward is neutral
        for block in 0..2 {
            scores.add(0, block, 0, -3);
        }
        let mut model = Model::new();
        let grid = VariableGrid::build(&mut model, &roster, &[], None).unwrap();
        let mut ctx = BuildContext {
            model: &mut model,
            grid: &grid,
            roster: &roster,
            scores: &scores,
        };
        min_spec.apply(&mut ctx).unwrap();
        (model, grid, roster)
    }

    #[test]
    fn test_min_individual_score_floor() {
        // score floor of -3 allows at most one ICU block
        let (model, grid, _) = build_with_scores(ConstraintSpec::MinIndividualScore { min: -3 });
        let solution =
            BacktrackEngine::new().solve(&model, &SolveBudget::with_decisions(100_000), &[]);
        assert_eq!(solution.status, SolveStatus::Optimal);
        let icu = (0..2).filter(|&b| solution.value(grid.var(0, b, 0))).count();
        assert!(icu <= 1);
    }

    #[test]
    fn test_min_total_score_floor() {
        let (model, grid, _) = build_with_scores(ConstraintSpec::MinTotalScore { min: -3 });
        let solution =
            BacktrackEngine::new().solve(&model, &SolveBudget::with_decisions(100_000), &[]);
        assert_eq!(solution.status, SolveStatus::Optimal);
        let icu = (0..2).filter(|&b| solution.value(grid.var(0, b, 0))).count();
        assert!(icu <= 1);
    }
}
