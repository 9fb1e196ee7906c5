//! Sequence handlers: cooldowns, consecutive runs, follower rules,
//! prerequisites, and threshold-based ineligibility along the block axis.

use std::collections::BTreeSet;

use crate::engine::LinearExpr;
use crate::error::ConfigError;

use super::count::add_window_count;
use super::BuildContext;

/// At most `count` instances of the rotation inside any `window`
/// consecutive blocks, per resident; suppressed residents are exempt.
pub(super) fn cool_down(
    ctx: &mut BuildContext<'_>,
    rotation: &str,
    window: usize,
    count: i64,
    suppress_for: &[String],
) -> Result<(), ConfigError> {
    let rot = ctx.roster.rotation_index(rotation)?;
    let suppressed: BTreeSet<usize> = suppress_for
        .iter()
        .map(|r| ctx.roster.resident_index(r))
        .collect::<Result<_, _>>()?;

    for res in 0..ctx.roster.n_residents() {
        if suppressed.contains(&res) {
            continue;
        }
        add_window_count(ctx.model, ctx.grid, ctx.roster, res, &[rot], window, 0, count);
    }
    Ok(())
}

/// Instances of the rotation must come in runs of exactly `count`
/// consecutive blocks.
///
/// Encoded with one run-root indicator per (resident, block): the root is
/// true exactly when the block starts a fresh run (assigned here, not
/// assigned at the previous block). A root forces the next `count - 1`
/// blocks onto the rotation and the block after the run off it. Roots are
/// forbidden where a full run no longer fits, at forbidden-root blocks,
/// and — when `allowed_roots` is declared — anywhere outside that list.
pub(super) fn consecutive_rotation(
    ctx: &mut BuildContext<'_>,
    rotation: &str,
    count: usize,
    forbidden_roots: &[String],
    allowed_roots: &[String],
) -> Result<(), ConfigError> {
    if count == 0 {
        return Err(ConfigError::Malformed(format!(
            "run length on rotation '{rotation}' must be at least 1"
        )));
    }
    let rot = ctx.roster.rotation_index(rotation)?;
    let forbidden: BTreeSet<usize> = forbidden_roots
        .iter()
        .map(|b| ctx.roster.block_index(b))
        .collect::<Result<_, _>>()?;
    let allowed: BTreeSet<usize> = allowed_roots
        .iter()
        .map(|b| ctx.roster.block_index(b))
        .collect::<Result<_, _>>()?;

    let n_blocks = ctx.roster.n_blocks();
    for res in 0..ctx.roster.n_residents() {
        for i in 0..n_blocks {
            let here = ctx.grid.var(res, i, rot);
            let is_root = ctx.model.new_bool_var(format!(
                "root:{}:{rotation}:{}",
                ctx.roster.resident(res).id,
                ctx.roster.block(i).id
            ));

            // root <=> assigned here and not assigned just before
            if i == 0 {
                ctx.model.add_implication(is_root.lit(), here.lit());
                ctx.model.add_implication(here.lit(), is_root.lit());
            } else {
                let before = ctx.grid.var(res, i - 1, rot);
                ctx.model.add_clause(vec![is_root.negated(), here.lit()]);
                ctx.model
                    .add_clause(vec![is_root.negated(), before.negated()]);
                ctx.model
                    .add_clause(vec![is_root.lit(), before.lit(), here.negated()]);
            }

            let root_fits = i + count <= n_blocks;
            let root_allowed = !forbidden.contains(&i) && (allowed.is_empty() || allowed.contains(&i));
            if !root_fits || !root_allowed {
                ctx.model.fix(is_root, false);
                continue;
            }

            // the root drags the rest of the run along, and ends it
            for j in 1..count {
                ctx.model
                    .add_implication(is_root.lit(), ctx.grid.var(res, i + j, rot).lit());
            }
            if i + count < n_blocks {
                ctx.model
                    .add_implication(is_root.lit(), ctx.grid.var(res, i + count, rot).negated());
            }
        }
    }
    Ok(())
}

/// Assignment at a non-final block forces one of the follower rotations
/// (names or groups) at the next block.
pub(super) fn must_be_followed_by(
    ctx: &mut BuildContext<'_>,
    rotation: &str,
    followers: &[String],
) -> Result<(), ConfigError> {
    let rot = ctx.roster.rotation_index(rotation)?;
    let follower_rots = ctx.roster.expand_rotations(followers)?;

    for res in 0..ctx.roster.n_residents() {
        for block in 0..ctx.roster.n_blocks().saturating_sub(1) {
            let mut clause = vec![ctx.grid.var(res, block, rot).negated()];
            for &f in &follower_rots {
                clause.push(ctx.grid.var(res, block + 1, f).lit());
            }
            ctx.model.add_clause(clause);
        }
    }
    Ok(())
}

/// Assignment at block `b` requires every requirement group to have
/// accumulated its count at blocks strictly before `b`, history included.
pub(super) fn prerequisite(
    ctx: &mut BuildContext<'_>,
    rotation: &str,
    requirements: &[(Vec<String>, i64)],
) -> Result<(), ConfigError> {
    let rot = ctx.roster.rotation_index(rotation)?;

    for (names, required) in requirements {
        let group = ctx.roster.expand_rotations(names)?;
        if group.contains(&rot) {
            return Err(ConfigError::Malformed(format!(
                "rotation '{rotation}' lists itself as a prerequisite"
            )));
        }
        for res in 0..ctx.roster.n_residents() {
            let prior: i64 = group.iter().map(|&p| ctx.roster.prior_count(res, p)).sum();
            for block in 0..ctx.roster.n_blocks() {
                let assigned = ctx.grid.var(res, block, rot);
                let mut earlier = LinearExpr::new();
                for j in 0..block {
                    for &p in &group {
                        earlier.add_var(ctx.grid.var(res, j, p));
                    }
                }
                ctx.model
                    .add_linear_if(assigned.lit(), required - prior, earlier, i64::MAX);
            }
        }
    }
    Ok(())
}

/// Assignment at block `b` requires some requirement threshold to still
/// be unmet at `b`; once every threshold is reached the rotation closes.
pub(super) fn ineligible_after(
    ctx: &mut BuildContext<'_>,
    rotation: &str,
    requirements: &[(Vec<String>, i64)],
) -> Result<(), ConfigError> {
    let rot = ctx.roster.rotation_index(rotation)?;
    let groups: Vec<(Vec<usize>, i64)> = requirements
        .iter()
        .map(|(names, required)| Ok((ctx.roster.expand_rotations(names)?, *required)))
        .collect::<Result<_, ConfigError>>()?;

    for res in 0..ctx.roster.n_residents() {
        for block in 0..ctx.roster.n_blocks() {
            let assigned = ctx.grid.var(res, block, rot);
            let mut clause = vec![assigned.negated()];

            for (gi, (group, required)) in groups.iter().enumerate() {
                let prior: i64 = group.iter().map(|&p| ctx.roster.prior_count(res, p)).sum();
                let mut earlier = LinearExpr::new();
                for j in 0..block {
                    for &p in group {
                        earlier.add_var(ctx.grid.var(res, j, p));
                    }
                }

                let unmet = ctx.model.new_bool_var(format!(
                    "unmet:{}:{rotation}:{}:{gi}",
                    ctx.roster.resident(res).id,
                    ctx.roster.block(block).id
                ));
                ctx.model
                    .add_linear_if(unmet.lit(), i64::MIN, earlier.clone(), required - prior - 1);
                ctx.model
                    .add_linear_if(unmet.negated(), required - prior, earlier, i64::MAX);
                clause.push(unmet.lit());
            }
            ctx.model.add_clause(clause);
        }
    }
    Ok(())
}

/// The resident must take the rotation in one of the listed blocks.
pub(super) fn rotation_window(
    ctx: &mut BuildContext<'_>,
    resident: &str,
    rotation: &str,
    blocks: &[String],
) -> Result<(), ConfigError> {
    let res = ctx.roster.resident_index(resident)?;
    let rot = ctx.roster.rotation_index(rotation)?;
    let mut clause = Vec::with_capacity(blocks.len());
    for block in blocks {
        clause.push(ctx.grid.var(res, ctx.roster.block_index(block)?, rot).lit());
    }
    ctx.model.add_clause(clause);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{build, small_roster, solve};
    use super::super::ConstraintSpec;
    use crate::engine::{Solution, SolveStatus};
    use crate::error::ConfigError;
    use crate::grid::VariableGrid;
    use crate::models::{Block, Resident, Rotation, Roster};

    fn icu_blocks(solution: &Solution, grid: &VariableGrid, res: usize, n_blocks: usize) -> Vec<usize> {
        (0..n_blocks)
            .filter(|&b| solution.value(grid.var(res, b, 0)))
            .collect()
    }

    #[test]
    fn test_cooldown_spaces_instances() {
        let roster = small_roster();
        let specs = vec![
            // two ICU blocks each, never adjacent
            ConstraintSpec::RotationCount {
                rotation: "ICU".to_string(),
                counts: [("A".to_string(), (2, 2)), ("B".to_string(), (2, 2))]
                    .into_iter()
                    .collect(),
                include_history: false,
            },
            ConstraintSpec::CoolDown {
                rotation: "ICU".to_string(),
                window: 2,
                count: 1,
                suppress_for: vec![],
            },
        ];
        let (model, grid) = build(&roster, &specs).unwrap();
        let solution = solve(&model);
        assert_eq!(solution.status, SolveStatus::Optimal);
        for res in 0..2 {
            let blocks = icu_blocks(&solution, &grid, res, 4);
            assert_eq!(blocks.len(), 2);
            assert!(blocks[1] - blocks[0] >= 2, "adjacent ICU at {blocks:?}");
        }
    }

    #[test]
    fn test_cooldown_suppression_exempts_resident() {
        let roster = small_roster();
        let specs = vec![
            ConstraintSpec::RotationCount {
                rotation: "ICU".to_string(),
                counts: [("A".to_string(), (3, 3))].into_iter().collect(),
                include_history: false,
            },
            // three ICU blocks in four cannot satisfy the cooldown, so
            // only the suppression keeps this feasible
            ConstraintSpec::CoolDown {
                rotation: "ICU".to_string(),
                window: 2,
                count: 1,
                suppress_for: vec!["A".to_string()],
            },
        ];
        let (model, _) = build(&roster, &specs).unwrap();
        assert_eq!(solve(&model).status, SolveStatus::Optimal);
    }

    #[test]
    fn test_consecutive_runs_have_exact_length() {
        let roster = small_roster();
        let specs = vec![
            ConstraintSpec::RotationCount {
                rotation: "ICU".to_string(),
                counts: [("A".to_string(), (2, 2)), ("B".to_string(), (0, 0))]
                    .into_iter()
                    .collect(),
                include_history: false,
            },
            ConstraintSpec::ConsecutiveRotation {
                rotation: "ICU".to_string(),
                count: 2,
                forbidden_roots: vec![],
                allowed_roots: vec![],
            },
        ];
        let (model, grid) = build(&roster, &specs).unwrap();
        let solution = solve(&model);
        assert_eq!(solution.status, SolveStatus::Optimal);
        let blocks = icu_blocks(&solution, &grid, 0, 4);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1], blocks[0] + 1, "ICU run is not contiguous");
    }

    #[test]
    fn test_forbidden_root_moves_the_run() {
        let roster = small_roster();
        let specs = vec![
            ConstraintSpec::RotationCount {
                rotation: "ICU".to_string(),
                counts: [("A".to_string(), (2, 2)), ("B".to_string(), (0, 0))]
                    .into_iter()
                    .collect(),
                include_history: false,
            },
            ConstraintSpec::ConsecutiveRotation {
                rotation: "ICU".to_string(),
                count: 2,
                forbidden_roots: vec!["Block 1".to_string(), "Block 2".to_string()],
                allowed_roots: vec![],
            },
        ];
        let (model, grid) = build(&roster, &specs).unwrap();
        let solution = solve(&model);
        assert_eq!(solution.status, SolveStatus::Optimal);
        // only a root at Block 3 remains possible
        assert_eq!(icu_blocks(&solution, &grid, 0, 4), vec![2, 3]);
    }

    #[test]
    fn test_allowed_roots_gate_run_starts() {
        let roster = small_roster();
        let specs = vec![
            ConstraintSpec::RotationCount {
                rotation: "ICU".to_string(),
                counts: [("A".to_string(), (2, 2)), ("B".to_string(), (0, 0))]
                    .into_iter()
                    .collect(),
                include_history: false,
            },
            ConstraintSpec::ConsecutiveRotation {
                rotation: "ICU".to_string(),
                count: 2,
                forbidden_roots: vec![],
                allowed_roots: vec!["Block 2".to_string()],
            },
        ];
        let (model, grid) = build(&roster, &specs).unwrap();
        let solution = solve(&model);
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert_eq!(icu_blocks(&solution, &grid, 0, 4), vec![1, 2]);
    }

    #[test]
    fn test_must_be_followed_by() {
        let roster = small_roster();
        let specs = vec![
            ConstraintSpec::RotationCount {
                rotation: "ICU".to_string(),
                counts: [("A".to_string(), (1, 1))].into_iter().collect(),
                include_history: false,
            },
            ConstraintSpec::MustBeFollowedBy {
                rotation: "ICU".to_string(),
                followers: vec!["Elective".to_string()],
            },
        ];
        let (model, grid) = build(&roster, &specs).unwrap();
        let solution = solve(&model);
        assert_eq!(solution.status, SolveStatus::Optimal);
        let blocks = icu_blocks(&solution, &grid, 0, 4);
        let icu_block = blocks[0];
        if icu_block < 3 {
            assert!(solution.value(grid.var(0, icu_block + 1, 2)));
        }
    }

    #[test]
    fn test_prerequisite_orders_rotations() {
        let roster = small_roster();
        let specs = vec![
            ConstraintSpec::RotationCount {
                rotation: "ICU".to_string(),
                counts: [("A".to_string(), (1, 1))].into_iter().collect(),
                include_history: false,
            },
            ConstraintSpec::Prerequisite {
                rotation: "ICU".to_string(),
                requirements: vec![(vec!["Ward".to_string()], 1)],
            },
        ];
        let (model, grid) = build(&roster, &specs).unwrap();
        let solution = solve(&model);
        assert_eq!(solution.status, SolveStatus::Optimal);
        let icu_block = icu_blocks(&solution, &grid, 0, 4)[0];
        let ward_before = (0..icu_block).any(|b| solution.value(grid.var(0, b, 1)));
        assert!(ward_before, "ICU at {icu_block} without prior Ward");
    }

    #[test]
    fn test_prerequisite_satisfied_by_history() {
        let roster = Roster::new(
            vec![Resident::new("A").with_history("Ward")],
            vec![Rotation::new("ICU"), Rotation::new("Ward")],
            vec![Block::new("Block 1")],
        );
        let specs = vec![
            ConstraintSpec::RotationCount {
                rotation: "ICU".to_string(),
                counts: [("A".to_string(), (1, 1))].into_iter().collect(),
                include_history: false,
            },
            ConstraintSpec::Prerequisite {
                rotation: "ICU".to_string(),
                requirements: vec![(vec!["Ward".to_string()], 1)],
            },
        ];
        let (model, _) = build(&roster, &specs).unwrap();
        // ICU at the first block is fine: history covers the requirement
        assert_eq!(solve(&model).status, SolveStatus::Optimal);
    }

    #[test]
    fn test_prerequisite_self_reference_rejected() {
        let roster = small_roster();
        let spec = ConstraintSpec::Prerequisite {
            rotation: "ICU".to_string(),
            requirements: vec![(vec!["ICU".to_string()], 1)],
        };
        assert!(matches!(
            build(&roster, &[spec]),
            Err(ConfigError::Malformed(_))
        ));
    }

    #[test]
    fn test_ineligible_after_threshold_closes_rotation() {
        let roster = small_roster();
        let specs = vec![
            // want three Wards, but Ward closes after two instances
            ConstraintSpec::RotationCount {
                rotation: "Ward".to_string(),
                counts: [("A".to_string(), (3, 3))].into_iter().collect(),
                include_history: false,
            },
            ConstraintSpec::IneligibleAfter {
                rotation: "Ward".to_string(),
                requirements: vec![(vec!["Ward".to_string()], 2)],
            },
        ];
        let (model, _) = build(&roster, &specs).unwrap();
        assert_eq!(solve(&model).status, SolveStatus::Infeasible);

        let specs = vec![
            ConstraintSpec::RotationCount {
                rotation: "Ward".to_string(),
                counts: [("A".to_string(), (2, 2))].into_iter().collect(),
                include_history: false,
            },
            ConstraintSpec::IneligibleAfter {
                rotation: "Ward".to_string(),
                requirements: vec![(vec!["Ward".to_string()], 2)],
            },
        ];
        let (model, _) = build(&roster, &specs).unwrap();
        assert_eq!(solve(&model).status, SolveStatus::Optimal);
    }

    #[test]
    fn test_rotation_window() {
        let roster = small_roster();
        let spec = ConstraintSpec::RotationWindow {
            resident: "A".to_string(),
            rotation: "ICU".to_string(),
            blocks: vec!["Block 2".to_string(), "Block 3".to_string()],
        };
        let (model, grid) = build(&roster, &[spec]).unwrap();
        let solution = solve(&model);
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert!(solution.value(grid.var(0, 1, 0)) || solution.value(grid.var(0, 2, 0)));
    }
}
