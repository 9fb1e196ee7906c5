//! Eligibility handlers: fixing assignment variables on or off from group
//! membership, expression masks, block thresholds, and pins.

use crate::engine::LinearExpr;
use crate::error::ConfigError;
use crate::expr::Expr;

use super::BuildContext;

/// Closes a rotation to residents whose groups do not intersect the
/// rotation's `eligible_groups`. A rotation with no declared eligible
/// groups is open to everyone.
pub(super) fn resident_group(
    ctx: &mut BuildContext<'_>,
    rotation: &str,
) -> Result<(), ConfigError> {
    let rot = ctx.roster.rotation_index(rotation)?;
    let eligible_groups = ctx.roster.rotation(rot).eligible_groups.clone();
    if eligible_groups.is_empty() {
        return Ok(());
    }

    for res in 0..ctx.roster.n_residents() {
        let eligible = eligible_groups
            .iter()
            .any(|g| ctx.roster.resident(res).in_group(g));
        if eligible {
            continue;
        }
        for block in 0..ctx.roster.n_blocks() {
            let var = ctx.grid.var(res, block, rot);
            ctx.model.fix(var, false);
        }
    }
    Ok(())
}

/// Listed residents may take the rotation only in blocks strictly after
/// `block`; earlier blocks are fixed off.
pub(super) fn eligible_after_block(
    ctx: &mut BuildContext<'_>,
    rotation: &str,
    residents: &[String],
    block: &str,
) -> Result<(), ConfigError> {
    let rot = ctx.roster.rotation_index(rotation)?;
    let threshold = ctx.roster.block_index(block)?;

    for resident in residents {
        let res = ctx.roster.resident_index(resident)?;
        for b in 0..=threshold {
            let var = ctx.grid.var(res, b, rot);
            ctx.model.fix(var, false);
        }
    }
    Ok(())
}

/// Fixes off every cell outside the eligible expression's mask,
/// optionally narrowed to one resident's rows.
pub(super) fn mark_ineligible(
    ctx: &mut BuildContext<'_>,
    resident: Option<&str>,
    eligible: &str,
) -> Result<(), ConfigError> {
    let mask = Expr::parse(eligible)?.mask(ctx.roster)?;
    let residents = resident_scope(ctx, resident)?;

    for res in residents {
        for block in 0..ctx.roster.n_blocks() {
            for rot in 0..ctx.roster.n_rotations() {
                if !mask.get(res, block, rot) {
                    let var = ctx.grid.var(res, block, rot);
                    ctx.model.fix(var, false);
                }
            }
        }
    }
    Ok(())
}

/// Fixes off every cell the expression's mask selects, optionally
/// narrowed to one resident's rows.
pub(super) fn prohibit(
    ctx: &mut BuildContext<'_>,
    resident: Option<&str>,
    expression: &str,
) -> Result<(), ConfigError> {
    let mask = Expr::parse(expression)?.mask(ctx.roster)?;
    let residents = resident_scope(ctx, resident)?;

    for res in residents {
        for block in 0..ctx.roster.n_blocks() {
            for rot in 0..ctx.roster.n_rotations() {
                if mask.get(res, block, rot) {
                    let var = ctx.grid.var(res, block, rot);
                    ctx.model.fix(var, false);
                }
            }
        }
    }
    Ok(())
}

/// Forbids all listed expressions from being satisfied at once: the sum
/// of matched cells stays below the number of expressions.
pub(super) fn prohibited_combination(
    ctx: &mut BuildContext<'_>,
    expressions: &[String],
) -> Result<(), ConfigError> {
    if expressions.is_empty() {
        return Err(ConfigError::Malformed(
            "prohibited combination lists no expressions".to_string(),
        ));
    }
    let mut total = LinearExpr::new();
    for expression in expressions {
        let mask = Expr::parse(expression)?.mask(ctx.roster)?;
        for res in 0..ctx.roster.n_residents() {
            for block in 0..ctx.roster.n_blocks() {
                for rot in 0..ctx.roster.n_rotations() {
                    if mask.get(res, block, rot) {
                        total.add_var(ctx.grid.var(res, block, rot));
                    }
                }
            }
        }
    }
    ctx.model
        .add_linear(i64::MIN, total, expressions.len() as i64 - 1);
    Ok(())
}

/// At least one cell matched by any of the resident's expressions must be
/// true.
pub(super) fn true_somewhere(
    ctx: &mut BuildContext<'_>,
    resident: &str,
    expressions: &[String],
) -> Result<(), ConfigError> {
    if expressions.is_empty() {
        return Err(ConfigError::Malformed(format!(
            "required assignment for '{resident}' lists no expressions"
        )));
    }
    let res = ctx.roster.resident_index(resident)?;

    let mut union = Expr::parse(&expressions[0])?.mask(ctx.roster)?;
    for expression in &expressions[1..] {
        union = union.or(&Expr::parse(expression)?.mask(ctx.roster)?);
    }

    let mut clause = Vec::new();
    for block in 0..ctx.roster.n_blocks() {
        for rot in 0..ctx.roster.n_rotations() {
            if union.get(res, block, rot) {
                clause.push(ctx.grid.var(res, block, rot).lit());
            }
        }
    }
    ctx.model.add_clause(clause);
    Ok(())
}

/// Forces one (resident, block, rotation) assignment on.
pub(super) fn pin(
    ctx: &mut BuildContext<'_>,
    resident: &str,
    block: &str,
    rotation: &str,
) -> Result<(), ConfigError> {
    let var = ctx.grid.var_by_name(ctx.roster, resident, block, rotation)?;
    ctx.model.fix(var, true);
    Ok(())
}

fn resident_scope(
    ctx: &BuildContext<'_>,
    resident: Option<&str>,
) -> Result<Vec<usize>, ConfigError> {
    match resident {
        Some(id) => Ok(vec![ctx.roster.resident_index(id)?]),
        None => Ok((0..ctx.roster.n_residents()).collect()),
    }
}
