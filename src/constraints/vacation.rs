//! Vacation pool handler: couples the weekly vacation grid to the block
//! assignment grid and enforces pool capacities and per-resident quotas.

use itertools::Itertools;

use crate::engine::LinearExpr;
use crate::error::ConfigError;

use super::BuildContext;

/// One vacation pool: a named set of rotations sharing capacity limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSpec {
    pub name: String,
    /// Rotation names or rotation groups belonging to the pool.
    pub rotations: Vec<String>,
    /// Cap on concurrent vacations across the pool in any one week.
    pub max_per_week: Option<i64>,
    /// Cap on the pool's vacations across the whole horizon.
    pub max_total: Option<i64>,
}

/// Applies all vacation structure:
///
/// 1. coupling — a vacation slot on (resident, week, rotation) implies the
///    resident is assigned that rotation in the week's block;
/// 2. pool caps — per-week and total vacation counts per pool;
/// 3. quota — each resident takes exactly `n_vacations_per_resident`.
///
/// Every rotation must belong to some pool; otherwise its vacations would
/// escape all capacity accounting.
pub(super) fn vacation_pools(
    ctx: &mut BuildContext<'_>,
    pools: &[PoolSpec],
    n_vacations_per_resident: i64,
) -> Result<(), ConfigError> {
    if ctx.grid.n_weeks() == 0 {
        return Err(ConfigError::Malformed(
            "vacation pools declared but no vacation weeks configured".to_string(),
        ));
    }

    let pool_rotations: Vec<Vec<usize>> = pools
        .iter()
        .map(|p| ctx.roster.expand_rotations(&p.rotations))
        .collect::<Result<_, _>>()?;

    let pooled: Vec<usize> = pool_rotations.iter().flatten().copied().unique().collect();
    for rot in 0..ctx.roster.n_rotations() {
        if !pooled.contains(&rot) {
            return Err(ConfigError::Malformed(format!(
                "rotation '{}' belongs to no vacation pool",
                ctx.roster.rotation(rot).id
            )));
        }
    }

    let n_res = ctx.roster.n_residents();
    let n_weeks = ctx.grid.n_weeks();

    // 1. coupling to the assignment grid
    for res in 0..n_res {
        for week in 0..n_weeks {
            let block = ctx.grid.week_block(week);
            for rot in 0..ctx.roster.n_rotations() {
                let slot = ctx.grid.vacation_slot(res, week, rot);
                let assigned = ctx.grid.var(res, block, rot);
                ctx.model.add_implication(slot.lit(), assigned.lit());
            }
        }
    }

    // 2. pool capacities
    for (pool, rotations) in pools.iter().zip(&pool_rotations) {
        let mut total = LinearExpr::new();
        for week in 0..n_weeks {
            let mut this_week = LinearExpr::new();
            for &rot in rotations {
                for res in 0..n_res {
                    this_week.add_var(ctx.grid.vacation_slot(res, week, rot));
                }
            }
            total.add_scaled(&this_week, 1);
            if let Some(cap) = pool.max_per_week {
                ctx.model.add_linear(i64::MIN, this_week, cap);
            }
        }
        if let Some(cap) = pool.max_total {
            ctx.model.add_linear(i64::MIN, total, cap);
        }
    }

    // 3. per-resident quota, through the aggregated week variables
    for res in 0..n_res {
        let weeks = LinearExpr::sum((0..n_weeks).map(|w| ctx.grid.vacation_variable_for(res, w)));
        ctx.model
            .add_linear(n_vacations_per_resident, weeks, n_vacations_per_resident);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::{BuildContext, ConstraintSpec};
    use super::*;
    use crate::engine::{BacktrackEngine, Model, Solution, Solve, SolveBudget, SolveStatus};
    use crate::grid::VariableGrid;
    use crate::models::{Block, Resident, Rotation, Roster};
    use crate::objective::ScoreTable;

    fn vacation_roster() -> Roster {
        Roster::new(
            vec![Resident::new("A"), Resident::new("B")],
            vec![Rotation::new("ICU"), Rotation::new("Elective")],
            vec![Block::new("Block 1"), Block::new("Block 2")],
        )
    }

    fn weeks() -> Vec<(String, String)> {
        vec![
            ("Week 1".to_string(), "Block 1".to_string()),
            ("Week 2".to_string(), "Block 1".to_string()),
            ("Week 3".to_string(), "Block 2".to_string()),
            ("Week 4".to_string(), "Block 2".to_string()),
        ]
    }

    fn pools() -> Vec<PoolSpec> {
        vec![
            PoolSpec {
                name: "icu".to_string(),
                rotations: vec!["ICU".to_string()],
                max_per_week: Some(1),
                max_total: None,
            },
            PoolSpec {
                name: "light".to_string(),
                rotations: vec!["Elective".to_string()],
                max_per_week: Some(2),
                max_total: Some(3),
            },
        ]
    }

    fn build_vacation(
        roster: &Roster,
        spec: &ConstraintSpec,
    ) -> Result<(Model, VariableGrid), crate::error::ConfigError> {
        let mut model = Model::new();
        let grid = VariableGrid::build(&mut model, roster, &weeks(), None)?;
        let scores = ScoreTable::new(roster);
        let mut ctx = BuildContext {
            model: &mut model,
            grid: &grid,
            roster,
            scores: &scores,
        };
        spec.apply(&mut ctx)?;
        Ok((model, grid))
    }

    fn solve(model: &Model) -> Solution {
        BacktrackEngine::new().solve(model, &SolveBudget::with_decisions(5_000_000), &[])
    }

    #[test]
    fn test_quota_and_coupling_hold() {
        let roster = vacation_roster();
        let spec = ConstraintSpec::VacationPool {
            pools: pools(),
            n_vacations_per_resident: 1,
        };
        let (model, grid) = build_vacation(&roster, &spec).unwrap();
        let solution = solve(&model);
        assert_eq!(solution.status, SolveStatus::Optimal);

        for res in 0..2 {
            let mut taken = 0;
            for week in 0..4 {
                for rot in 0..2 {
                    if solution.value(grid.vacation_slot(res, week, rot)) {
                        taken += 1;
                        // coupled: on that rotation in the week's block
                        assert!(solution.value(grid.var(res, grid.week_block(week), rot)));
                    }
                }
            }
            assert_eq!(taken, 1, "resident {res} vacation quota");
        }
    }

    #[test]
    fn test_week_variable_mirrors_slots() {
        let roster = vacation_roster();
        let spec = ConstraintSpec::VacationPool {
            pools: pools(),
            n_vacations_per_resident: 1,
        };
        let (model, grid) = build_vacation(&roster, &spec).unwrap();
        let solution = solve(&model);
        assert_eq!(solution.status, SolveStatus::Optimal);

        for res in 0..2 {
            for week in 0..4 {
                let any_slot = (0..2).any(|rot| solution.value(grid.vacation_slot(res, week, rot)));
                assert_eq!(
                    solution.value(grid.vacation_variable_for(res, week)),
                    any_slot
                );
            }
        }
    }

    #[test]
    fn test_total_pool_cap_blocks_excess_quota() {
        let roster = vacation_roster();
        // both residents pinned to ICU, whose pool allows one vacation in
        // total; two quotas cannot fit
        let mut tight = pools();
        tight[0].max_total = Some(1);
        let spec = ConstraintSpec::VacationPool {
            pools: tight,
            n_vacations_per_resident: 1,
        };
        let mut model = Model::new();
        let grid = VariableGrid::build(&mut model, &roster, &weeks(), None).unwrap();
        let scores = ScoreTable::new(&roster);
        {
            let mut ctx = BuildContext {
                model: &mut model,
                grid: &grid,
                roster: &roster,
                scores: &scores,
            };
            spec.apply(&mut ctx).unwrap();
            // both residents locked onto ICU everywhere
            for spec in [
                ConstraintSpec::Pin {
                    resident: "A".to_string(),
                    block: "Block 1".to_string(),
                    rotation: "ICU".to_string(),
                },
                ConstraintSpec::Pin {
                    resident: "A".to_string(),
                    block: "Block 2".to_string(),
                    rotation: "ICU".to_string(),
                },
                ConstraintSpec::Pin {
                    resident: "B".to_string(),
                    block: "Block 1".to_string(),
                    rotation: "ICU".to_string(),
                },
                ConstraintSpec::Pin {
                    resident: "B".to_string(),
                    block: "Block 2".to_string(),
                    rotation: "ICU".to_string(),
                },
            ] {
                spec.apply(&mut ctx).unwrap();
            }
        }
        // two vacations must be taken from a pool capped at one in total
        assert_eq!(solve(&model).status, SolveStatus::Infeasible);
    }

    #[test]
    fn test_unpooled_rotation_rejected() {
        let roster = vacation_roster();
        let spec = ConstraintSpec::VacationPool {
            pools: vec![PoolSpec {
                name: "icu".to_string(),
                rotations: vec!["ICU".to_string()],
                max_per_week: Some(1),
                max_total: None,
            }],
            n_vacations_per_resident: 1,
        };
        assert!(matches!(
            build_vacation(&roster, &spec),
            Err(crate::error::ConfigError::Malformed(_))
        ));
    }

    #[test]
    fn test_pools_without_weeks_rejected() {
        let roster = vacation_roster();
        let mut model = Model::new();
        let grid = VariableGrid::build(&mut model, &roster, &[], None).unwrap();
        let scores = ScoreTable::new(&roster);
        let mut ctx = BuildContext {
            model: &mut model,
            grid: &grid,
            roster: &roster,
            scores: &scores,
        };
        let spec = ConstraintSpec::VacationPool {
            pools: pools(),
            n_vacations_per_resident: 1,
        };
        assert!(matches!(
            spec.apply(&mut ctx),
            Err(crate::error::ConfigError::Malformed(_))
        ));
    }
}
