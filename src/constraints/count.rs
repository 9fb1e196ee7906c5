//! Count handlers: per-resident instance totals, forbidden exact counts,
//! sliding-window group counts, and time-to-first requirements.

use std::collections::BTreeMap;

use crate::engine::{LinearExpr, Model};
use crate::error::ConfigError;
use crate::grid::VariableGrid;
use crate::models::Roster;

use super::BuildContext;

/// Bounds each listed resident's total instances of a rotation across the
/// horizon. With `include_history`, prior completed instances count
/// toward the bound.
pub(super) fn rotation_count(
    ctx: &mut BuildContext<'_>,
    rotation: &str,
    counts: &BTreeMap<String, (i64, i64)>,
    include_history: bool,
) -> Result<(), ConfigError> {
    let rot = ctx.roster.rotation_index(rotation)?;

    for (resident, &(min, max)) in counts {
        if min > max {
            return Err(ConfigError::InvertedBounds {
                entity: format!("instance count on '{rotation}' for '{resident}'"),
                min,
                max,
            });
        }
        let res = ctx.roster.resident_index(resident)?;
        let prior = if include_history {
            ctx.roster.prior_count(res, rot)
        } else {
            0
        };
        if prior > max {
            return Err(ConfigError::Malformed(format!(
                "resident '{resident}' already has {prior} instances of \
                 '{rotation}', above the declared maximum {max}"
            )));
        }

        let total = horizon_sum(ctx.grid, ctx.roster, res, &[rot]);
        ctx.model.add_linear(min - prior, total, max - prior);
    }
    Ok(())
}

/// Forbids every resident's total instance count from equalling `count`:
/// the total must land strictly below or strictly above.
pub(super) fn rotation_count_not(
    ctx: &mut BuildContext<'_>,
    rotation: &str,
    count: i64,
) -> Result<(), ConfigError> {
    let rot = ctx.roster.rotation_index(rotation)?;

    for res in 0..ctx.roster.n_residents() {
        let total = horizon_sum(ctx.grid, ctx.roster, res, &[rot]);
        let below = ctx.model.new_bool_var(format!(
            "count-below:{}:{rotation}",
            ctx.roster.resident(res).id
        ));
        ctx.model
            .add_linear_if(below.lit(), i64::MIN, total.clone(), count - 1);
        ctx.model
            .add_linear_if(below.negated(), count + 1, total, i64::MAX);
    }
    Ok(())
}

/// Bounds each listed resident's assignments to a rotation group within
/// every window of `window` consecutive blocks. A window larger than the
/// horizon leaves nothing to constrain.
pub(super) fn window_group_count(
    ctx: &mut BuildContext<'_>,
    group: &str,
    counts: &BTreeMap<String, (i64, i64)>,
    window: usize,
    include_history: bool,
) -> Result<(), ConfigError> {
    let rotations = ctx.roster.rotations_in_group(group)?;

    for (resident, &(min, max)) in counts {
        if min > max {
            return Err(ConfigError::InvertedBounds {
                entity: format!("group count on '{group}' for '{resident}'"),
                min,
                max,
            });
        }
        let res = ctx.roster.resident_index(resident)?;
        let prior: i64 = if include_history {
            rotations
                .iter()
                .map(|&rot| ctx.roster.prior_count(res, rot))
                .sum()
        } else {
            0
        };

        add_window_count(
            ctx.model,
            ctx.grid,
            ctx.roster,
            res,
            &rotations,
            window,
            min - prior,
            max - prior,
        );
    }
    Ok(())
}

/// Requires each resident to take a rotation from the group at least once
/// within the first `window` blocks.
pub(super) fn time_to_first(
    ctx: &mut BuildContext<'_>,
    group: &str,
    window: usize,
) -> Result<(), ConfigError> {
    let rotations = ctx.roster.rotations_in_group(group)?;
    if window == 0 {
        return Err(ConfigError::Malformed(format!(
            "time to first '{group}' needs a window of at least one block"
        )));
    }
    let prefix = window.min(ctx.roster.n_blocks());

    for res in 0..ctx.roster.n_residents() {
        let mut clause = Vec::with_capacity(prefix * rotations.len());
        for block in 0..prefix {
            for &rot in &rotations {
                clause.push(ctx.grid.var(res, block, rot).lit());
            }
        }
        ctx.model.add_clause(clause);
    }
    Ok(())
}

/// Sliding-window sum bound for one resident over a rotation set.
pub(super) fn add_window_count(
    model: &mut Model,
    grid: &VariableGrid,
    roster: &Roster,
    resident: usize,
    rotations: &[usize],
    window: usize,
    min: i64,
    max: i64,
) {
    let n_blocks = roster.n_blocks();
    if window == 0 || window > n_blocks {
        return;
    }
    for start in 0..=(n_blocks - window) {
        let mut total = LinearExpr::new();
        for block in start..start + window {
            for &rot in rotations {
                total.add_var(grid.var(resident, block, rot));
            }
        }
        model.add_linear(min, total, max);
    }
}

fn horizon_sum(
    grid: &VariableGrid,
    roster: &Roster,
    resident: usize,
    rotations: &[usize],
) -> LinearExpr {
    let mut total = LinearExpr::new();
    for block in 0..roster.n_blocks() {
        for &rot in rotations {
            total.add_var(grid.var(resident, block, rot));
        }
    }
    total
}
