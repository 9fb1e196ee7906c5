//! Coverage handlers: per-block head counts for rotations, rotation
//! groups, and backup slots.

use crate::engine::LinearExpr;
use crate::error::ConfigError;

use super::{resolve_blocks, BuildContext, CoverageBounds};

/// Bounds the number of residents assigned to any of `rotations`, per
/// block. `label` names the rotation or group in diagnostics.
pub(super) fn apply_coverage(
    ctx: &mut BuildContext<'_>,
    label: &str,
    rotations: &[usize],
    blocks: Option<&[String]>,
    coverage: &CoverageBounds,
) -> Result<(), ConfigError> {
    if let CoverageBounds::Range {
        min: Some(min),
        max: Some(max),
    } = coverage
    {
        if min > max {
            return Err(ConfigError::InvertedBounds {
                entity: format!("coverage on '{label}'"),
                min: *min,
                max: *max,
            });
        }
    }

    for block in resolve_blocks(ctx.roster, blocks)? {
        let mut total = LinearExpr::new();
        for res in 0..ctx.roster.n_residents() {
            for &rot in rotations {
                total.add_var(ctx.grid.var(res, block, rot));
            }
        }

        match coverage {
            CoverageBounds::Range { min, max } => {
                ctx.model.add_linear(
                    min.unwrap_or(i64::MIN),
                    total,
                    max.unwrap_or(i64::MAX),
                );
            }
            CoverageBounds::Allowed(values) => {
                // one selector per allowed value; selecting it pins the
                // count to that value, and some selector must hold
                let mut selectors = Vec::with_capacity(values.len());
                for &value in values {
                    let sel = ctx.model.new_bool_var(format!(
                        "cov:{label}:{}={value}",
                        ctx.roster.block(block).id
                    ));
                    ctx.model.add_linear_if(sel.lit(), value, total.clone(), value);
                    selectors.push(sel.lit());
                }
                ctx.model.add_clause(selectors);
            }
        }
    }
    Ok(())
}

/// Bounds the number of backup residents per block.
pub(super) fn backup_coverage(
    ctx: &mut BuildContext<'_>,
    min: i64,
    max: i64,
) -> Result<(), ConfigError> {
    if min > max {
        return Err(ConfigError::InvertedBounds {
            entity: "backup coverage".to_string(),
            min,
            max,
        });
    }
    if !ctx.grid.has_backup() {
        return Err(ConfigError::Malformed(
            "backup coverage declared but no backup slots configured".to_string(),
        ));
    }
    for block in 0..ctx.roster.n_blocks() {
        let mut total = LinearExpr::new();
        for res in 0..ctx.roster.n_residents() {
            if let Some(var) = ctx.grid.backup_var(res, block) {
                total.add_var(var);
            }
        }
        ctx.model.add_linear(min, total, max);
    }
    Ok(())
}
