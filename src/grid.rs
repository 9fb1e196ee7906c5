//! Variable factory: the shared decision-variable grid.
//!
//! One boolean assignment variable exists per (resident, block, rotation)
//! triple, created in roster declaration order so that variable identity is
//! reproducible across runs — the property warm-start hints rely on.
//! Requests for undeclared entities fail here, at translation time, never
//! at solve time.
//!
//! The grid also owns the one global structural rule: for every
//! (resident, block) pair, exactly one rotation variable is true. It is
//! emitted once, centrally, before any optional constraint runs; no
//! constraint handler re-states it.

use serde::{Deserialize, Serialize};

use crate::engine::{BoolVar, LinearExpr, Model};
use crate::error::ConfigError;
use crate::models::Roster;

/// Reproducible identity of a decision variable, independent of the index
/// it happens to get in a particular build. This is the key under which
/// hint entries are persisted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VarKey {
    /// Assignment of `resident` to `rotation` during `block`.
    Assign {
        resident: String,
        block: String,
        rotation: String,
    },
    /// `resident` takes vacation during `week` while on `rotation`.
    Vacation {
        resident: String,
        week: String,
        rotation: String,
    },
    /// `resident` is the backup for `block`.
    Backup { resident: String, block: String },
}

/// The vacation axis: named weeks, each falling inside one block.
#[derive(Debug, Clone, Default)]
pub struct VacationCalendar {
    /// Week names in calendar order.
    pub weeks: Vec<String>,
    /// For each week, the block it falls in (parallel to `weeks`).
    pub week_blocks: Vec<usize>,
}

/// All decision variables of one model build.
#[derive(Debug)]
pub struct VariableGrid {
    n_blocks: usize,
    n_rotations: usize,
    assign: Vec<BoolVar>,
    vacation: VacationCalendar,
    vacation_slots: Vec<BoolVar>,
    vacation_weeks: Vec<BoolVar>,
    backup: Vec<BoolVar>,
}

impl VariableGrid {
    /// Creates every variable and the central structural constraints.
    ///
    /// `vacation_weeks` maps week name to containing block name; `backup`
    /// is the number of backup blocks each resident owes. Both optional
    /// grids are empty when not configured.
    pub fn build(
        model: &mut Model,
        roster: &Roster,
        vacation_weeks: &[(String, String)],
        backup: Option<i64>,
    ) -> Result<Self, ConfigError> {
        let (n_res, n_blk, n_rot) = (
            roster.n_residents(),
            roster.n_blocks(),
            roster.n_rotations(),
        );

        let mut assign = Vec::with_capacity(n_res * n_blk * n_rot);
        for res in roster.residents() {
            for blk in roster.blocks() {
                for rot in roster.rotations() {
                    assign.push(model.new_bool_var(format!(
                        "assign:{}:{}:{}",
                        res.id, blk.id, rot.id
                    )));
                }
            }
        }

        // Exactly one rotation per resident per block. Emitted once, here.
        for r in 0..n_res {
            for b in 0..n_blk {
                let base = (r * n_blk + b) * n_rot;
                model.add_exactly_one(assign[base..base + n_rot].iter().copied());
            }
        }

        let mut vacation = VacationCalendar::default();
        for (week, block) in vacation_weeks {
            vacation.weeks.push(week.clone());
            vacation.week_blocks.push(roster.block_index(block)?);
        }
        let n_weeks = vacation.weeks.len();

        let mut vacation_slots = Vec::with_capacity(n_res * n_weeks * n_rot);
        let mut vacation_week_vars = Vec::with_capacity(n_res * n_weeks);
        for res in roster.residents() {
            for week in &vacation.weeks {
                for rot in roster.rotations() {
                    vacation_slots.push(model.new_bool_var(format!(
                        "vacation:{}:{}:{}",
                        res.id, week, rot.id
                    )));
                }
                vacation_week_vars
                    .push(model.new_bool_var(format!("vacweek:{}:{}", res.id, week)));
            }
        }
        // At most one vacation slot per (resident, week); the aggregated
        // week variable equals the row sum.
        for r in 0..n_res {
            for w in 0..n_weeks {
                let base = (r * n_weeks + w) * n_rot;
                let row = &vacation_slots[base..base + n_rot];
                let mut eq = LinearExpr::sum(row.iter().copied());
                eq.add_term(vacation_week_vars[r * n_weeks + w], -1);
                model.add_linear(0, eq, 0);
            }
        }

        let mut backup_vars = Vec::new();
        if let Some(n_backup) = backup {
            for res in roster.residents() {
                for blk in roster.blocks() {
                    backup_vars.push(model.new_bool_var(format!("backup:{}:{}", res.id, blk.id)));
                }
            }
            for r in 0..n_res {
                let row = &backup_vars[r * n_blk..(r + 1) * n_blk];
                model.add_linear(n_backup, LinearExpr::sum(row.iter().copied()), n_backup);
            }
        }

        Ok(Self {
            n_blocks: n_blk,
            n_rotations: n_rot,
            assign,
            vacation,
            vacation_slots,
            vacation_weeks: vacation_week_vars,
            backup: backup_vars,
        })
    }

    /// The assignment variable for (resident, block, rotation), by index.
    ///
    /// Idempotent by construction: the same triple always yields the same
    /// variable within a build, and the same identity across builds of the
    /// same roster.
    pub fn var(&self, resident: usize, block: usize, rotation: usize) -> BoolVar {
        self.assign[(resident * self.n_blocks + block) * self.n_rotations + rotation]
    }

    /// Name-based lookup, for callers holding configuration strings.
    pub fn var_by_name(
        &self,
        roster: &Roster,
        resident: &str,
        block: &str,
        rotation: &str,
    ) -> Result<BoolVar, ConfigError> {
        Ok(self.var(
            roster.resident_index(resident)?,
            roster.block_index(block)?,
            roster.rotation_index(rotation)?,
        ))
    }

    /// Vacation slot variable for (resident, week, rotation).
    pub fn vacation_slot(&self, resident: usize, week: usize, rotation: usize) -> BoolVar {
        self.vacation_slots
            [(resident * self.n_weeks() + week) * self.n_rotations + rotation]
    }

    /// The aggregated per-week vacation variable: true iff the resident is
    /// on vacation that week (on whatever rotation).
    pub fn vacation_variable_for(&self, resident: usize, week: usize) -> BoolVar {
        self.vacation_weeks[resident * self.n_weeks() + week]
    }

    /// Backup variable for (resident, block); `None` when backup slots are
    /// not configured.
    pub fn backup_var(&self, resident: usize, block: usize) -> Option<BoolVar> {
        if self.backup.is_empty() {
            return None;
        }
        Some(self.backup[resident * self.n_blocks + block])
    }

    pub fn n_weeks(&self) -> usize {
        self.vacation.weeks.len()
    }

    /// Index of the block a vacation week falls in.
    pub fn week_block(&self, week: usize) -> usize {
        self.vacation.week_blocks[week]
    }

    pub fn week_name(&self, week: usize) -> &str {
        &self.vacation.weeks[week]
    }

    pub fn has_backup(&self) -> bool {
        !self.backup.is_empty()
    }

    /// Resolves a persisted variable identity against this grid.
    ///
    /// Returns `None` for identities that no longer exist (renamed
    /// resident, removed rotation) — hint loading drops those silently.
    pub fn lookup(&self, roster: &Roster, key: &VarKey) -> Option<BoolVar> {
        match key {
            VarKey::Assign {
                resident,
                block,
                rotation,
            } => Some(self.var(
                roster.resident_index(resident).ok()?,
                roster.block_index(block).ok()?,
                roster.rotation_index(rotation).ok()?,
            )),
            VarKey::Vacation {
                resident,
                week,
                rotation,
            } => {
                let w = self.vacation.weeks.iter().position(|x| x == week)?;
                Some(self.vacation_slot(
                    roster.resident_index(resident).ok()?,
                    w,
                    roster.rotation_index(rotation).ok()?,
                ))
            }
            VarKey::Backup { resident, block } => self.backup_var(
                roster.resident_index(resident).ok()?,
                roster.block_index(block).ok()?,
            ),
        }
    }

    /// Every (identity, variable) pair of the grid, in deterministic order.
    pub fn keyed_vars(&self, roster: &Roster) -> Vec<(VarKey, BoolVar)> {
        let mut out = Vec::with_capacity(self.assign.len() + self.vacation_slots.len());
        for (r, res) in roster.residents().iter().enumerate() {
            for (b, blk) in roster.blocks().iter().enumerate() {
                for (t, rot) in roster.rotations().iter().enumerate() {
                    out.push((
                        VarKey::Assign {
                            resident: res.id.clone(),
                            block: blk.id.clone(),
                            rotation: rot.id.clone(),
                        },
                        self.var(r, b, t),
                    ));
                }
            }
        }
        for (r, res) in roster.residents().iter().enumerate() {
            for w in 0..self.n_weeks() {
                for (t, rot) in roster.rotations().iter().enumerate() {
                    out.push((
                        VarKey::Vacation {
                            resident: res.id.clone(),
                            week: self.vacation.weeks[w].clone(),
                            rotation: rot.id.clone(),
                        },
                        self.vacation_slot(r, w, t),
                    ));
                }
            }
        }
        if self.has_backup() {
            for (r, res) in roster.residents().iter().enumerate() {
                for (b, blk) in roster.blocks().iter().enumerate() {
                    out.push((
                        VarKey::Backup {
                            resident: res.id.clone(),
                            block: blk.id.clone(),
                        },
                        self.backup[r * self.n_blocks + b],
                    ));
                }
            }
        }
        out
    }
}
