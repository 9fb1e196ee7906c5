//! Constraint builder registry.
//!
//! Every declarative requirement is one [`ConstraintSpec`] value: a closed
//! tagged enum, one variant per constraint kind, each carrying the names
//! and parameters from configuration. [`ConstraintSpec::apply`] resolves
//! names against the roster and emits boolean/linear terms into the shared
//! model. Handlers only append; none removes or rewrites another's terms,
//! so application order never changes the model's meaning.
//!
//! All name resolution and bound checking happens here, at build time. A
//! spec either translates fully or fails with a [`ConfigError`]; nothing
//! is deferred to the solve.

use std::collections::BTreeMap;

use crate::engine::Model;
use crate::error::ConfigError;
use crate::grid::VariableGrid;
use crate::models::Roster;
use crate::objective::ScoreTable;

mod count;
mod coverage;
mod eligibility;
mod score;
mod sequence;
mod vacation;

pub use vacation::PoolSpec;

/// Everything a constraint handler may touch while translating.
///
/// The model is the only mutable piece; grid, roster, and score table are
/// read-only, which is what makes handler order irrelevant.
pub struct BuildContext<'a> {
    pub model: &'a mut Model,
    pub grid: &'a VariableGrid,
    pub roster: &'a Roster,
    pub scores: &'a ScoreTable,
}

/// Coverage bound forms. The two forms are mutually exclusive per
/// rotation; configurations declaring both are rejected upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverageBounds {
    /// `[min, max]` bounds; either side may be open.
    Range { min: Option<i64>, max: Option<i64> },
    /// The count must equal one of these values exactly.
    Allowed(Vec<i64>),
}

/// One declared constraint instance, pre-resolution.
///
/// Resident-count maps are keyed by resident id; group keys are expanded
/// to resident ids when the configuration is translated.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintSpec {
    /// Per-block bound on residents assigned to one rotation.
    RotationCoverage {
        rotation: String,
        blocks: Option<Vec<String>>,
        coverage: CoverageBounds,
    },
    /// Per-block bound on residents assigned to any rotation of a group.
    GroupCoverage {
        group: String,
        blocks: Option<Vec<String>>,
        coverage: CoverageBounds,
    },
    /// Per-resident bound on total instances of a rotation across the
    /// horizon; `include_history` offsets by prior completed instances.
    RotationCount {
        rotation: String,
        counts: BTreeMap<String, (i64, i64)>,
        include_history: bool,
    },
    /// Forbids a resident's total instance count from equalling `count`.
    RotationCountNot { rotation: String, count: i64 },
    /// At most `count` instances of a rotation inside any `window`
    /// consecutive blocks, per resident; `suppress_for` residents exempt.
    CoolDown {
        rotation: String,
        window: usize,
        count: i64,
        suppress_for: Vec<String>,
    },
    /// Instances of a rotation must come in runs of exactly `count`
    /// consecutive blocks. A run may not start at a forbidden root; when
    /// `allowed_roots` is non-empty, runs may start only there.
    ConsecutiveRotation {
        rotation: String,
        count: usize,
        forbidden_roots: Vec<String>,
        allowed_roots: Vec<String>,
    },
    /// Assignment at a non-final block forces one of `followers` (names
    /// or groups) at the next block.
    MustBeFollowedBy {
        rotation: String,
        followers: Vec<String>,
    },
    /// Assignment requires each requirement group to have accumulated its
    /// count at strictly earlier blocks (history included).
    Prerequisite {
        rotation: String,
        requirements: Vec<(Vec<String>, i64)>,
    },
    /// Assignment requires at least one requirement to still be
    /// unsatisfied; once all thresholds are met the rotation is closed.
    IneligibleAfter {
        rotation: String,
        requirements: Vec<(Vec<String>, i64)>,
    },
    /// Listed residents may take the rotation only after `block`.
    EligibleAfterBlock {
        rotation: String,
        residents: Vec<String>,
        block: String,
    },
    /// At least one cell matched by any listed expression must be true,
    /// within the resident's rows.
    TrueSomewhere {
        resident: String,
        expressions: Vec<String>,
    },
    /// Every cell matched by the expression is fixed false, optionally
    /// narrowed to one resident.
    Prohibit {
        resident: Option<String>,
        expression: String,
    },
    /// Not every listed expression may be satisfied simultaneously.
    ProhibitedCombination { expressions: Vec<String> },
    /// Cells outside the eligible expression are fixed false, optionally
    /// narrowed to one resident.
    MarkIneligible {
        resident: Option<String>,
        eligible: String,
    },
    /// Closes a rotation to residents whose groups do not intersect its
    /// `eligible_groups`.
    ResidentGroup { rotation: String },
    /// Per-resident bound on assignments to a rotation group inside any
    /// sliding window of `window` consecutive blocks.
    WindowGroupCount {
        group: String,
        counts: BTreeMap<String, (i64, i64)>,
        window: usize,
        include_history: bool,
    },
    /// Per-resident bound on assignments to a rotation group over the
    /// whole horizon.
    AllGroupCount {
        group: String,
        counts: BTreeMap<String, (i64, i64)>,
        include_history: bool,
    },
    /// Every resident must reach the rotation group within the first
    /// `window` blocks.
    TimeToFirst { group: String, window: usize },
    /// Every resident's accumulated score must be at least `min`.
    MinIndividualScore { min: i64 },
    /// The schedule-wide score sum must be at least `min`.
    MinTotalScore { min: i64 },
    /// Forces one (resident, block, rotation) assignment true. Pins are
    /// applied before every other constraint kind.
    Pin {
        resident: String,
        block: String,
        rotation: String,
    },
    /// The resident must take the rotation in one of the listed blocks.
    RotationWindow {
        resident: String,
        rotation: String,
        blocks: Vec<String>,
    },
    /// Vacation pools: assignment coupling, per-week and total pool caps,
    /// and the per-resident vacation quota.
    VacationPool {
        pools: Vec<PoolSpec>,
        n_vacations_per_resident: i64,
    },
    /// Per-block bound on the number of backup residents.
    BackupCoverage { min: i64, max: i64 },
}

impl ConstraintSpec {
    /// Emits this constraint's terms into the model.
    pub fn apply(&self, ctx: &mut BuildContext<'_>) -> Result<(), ConfigError> {
        match self {
            ConstraintSpec::RotationCoverage {
                rotation,
                blocks,
                coverage,
            } => {
                let rot = ctx.roster.rotation_index(rotation)?;
                coverage::apply_coverage(ctx, rotation, &[rot], blocks.as_deref(), coverage)
            }
            ConstraintSpec::GroupCoverage {
                group,
                blocks,
                coverage,
            } => {
                let rotations = ctx.roster.rotations_in_group(group)?;
                coverage::apply_coverage(ctx, group, &rotations, blocks.as_deref(), coverage)
            }
            ConstraintSpec::RotationCount {
                rotation,
                counts,
                include_history,
            } => count::rotation_count(ctx, rotation, counts, *include_history),
            ConstraintSpec::RotationCountNot { rotation, count } => {
                count::rotation_count_not(ctx, rotation, *count)
            }
            ConstraintSpec::CoolDown {
                rotation,
                window,
                count,
                suppress_for,
            } => sequence::cool_down(ctx, rotation, *window, *count, suppress_for),
            ConstraintSpec::ConsecutiveRotation {
                rotation,
                count,
                forbidden_roots,
                allowed_roots,
            } => sequence::consecutive_rotation(ctx, rotation, *count, forbidden_roots, allowed_roots),
            ConstraintSpec::MustBeFollowedBy {
                rotation,
                followers,
            } => sequence::must_be_followed_by(ctx, rotation, followers),
            ConstraintSpec::Prerequisite {
                rotation,
                requirements,
            } => sequence::prerequisite(ctx, rotation, requirements),
            ConstraintSpec::IneligibleAfter {
                rotation,
                requirements,
            } => sequence::ineligible_after(ctx, rotation, requirements),
            ConstraintSpec::EligibleAfterBlock {
                rotation,
                residents,
                block,
            } => eligibility::eligible_after_block(ctx, rotation, residents, block),
            ConstraintSpec::TrueSomewhere {
                resident,
                expressions,
            } => eligibility::true_somewhere(ctx, resident, expressions),
            ConstraintSpec::Prohibit {
                resident,
                expression,
            } => eligibility::prohibit(ctx, resident.as_deref(), expression),
            ConstraintSpec::ProhibitedCombination { expressions } => {
                eligibility::prohibited_combination(ctx, expressions)
            }
            ConstraintSpec::MarkIneligible { resident, eligible } => {
                eligibility::mark_ineligible(ctx, resident.as_deref(), eligible)
            }
            ConstraintSpec::ResidentGroup { rotation } => {
                eligibility::resident_group(ctx, rotation)
            }
            ConstraintSpec::WindowGroupCount {
                group,
                counts,
                window,
                include_history,
            } => count::window_group_count(ctx, group, counts, *window, *include_history),
            ConstraintSpec::AllGroupCount {
                group,
                counts,
                include_history,
            } => {
                let horizon = ctx.roster.n_blocks();
                count::window_group_count(ctx, group, counts, horizon, *include_history)
            }
            ConstraintSpec::TimeToFirst { group, window } => {
                count::time_to_first(ctx, group, *window)
            }
            ConstraintSpec::MinIndividualScore { min } => score::min_individual_score(ctx, *min),
            ConstraintSpec::MinTotalScore { min } => score::min_total_score(ctx, *min),
            ConstraintSpec::Pin {
                resident,
                block,
                rotation,
            } => eligibility::pin(ctx, resident, block, rotation),
            ConstraintSpec::RotationWindow {
                resident,
                rotation,
                blocks,
            } => sequence::rotation_window(ctx, resident, rotation, blocks),
            ConstraintSpec::VacationPool {
                pools,
                n_vacations_per_resident,
            } => vacation::vacation_pools(ctx, pools, *n_vacations_per_resident),
            ConstraintSpec::BackupCoverage { min, max } => {
                coverage::backup_coverage(ctx, *min, *max)
            }
        }
    }

    /// Whether this spec fixes variables ahead of every other handler.
    pub fn is_pin(&self) -> bool {
        matches!(self, ConstraintSpec::Pin { .. })
    }

    /// Short human description, used when an infeasible model reports its
    /// hard-constraint inventory.
    pub fn describe(&self) -> String {
        match self {
            ConstraintSpec::RotationCoverage { rotation, .. } => {
                format!("coverage on rotation '{rotation}'")
            }
            ConstraintSpec::GroupCoverage { group, .. } => {
                format!("coverage on group '{group}'")
            }
            ConstraintSpec::RotationCount { rotation, include_history, .. } => {
                if *include_history {
                    format!("instance count (with history) on rotation '{rotation}'")
                } else {
                    format!("instance count on rotation '{rotation}'")
                }
            }
            ConstraintSpec::RotationCountNot { rotation, count } => {
                format!("instance count != {count} on rotation '{rotation}'")
            }
            ConstraintSpec::CoolDown { rotation, window, .. } => {
                format!("cooldown (window {window}) on rotation '{rotation}'")
            }
            ConstraintSpec::ConsecutiveRotation { rotation, count, .. } => {
                format!("runs of {count} on rotation '{rotation}'")
            }
            ConstraintSpec::MustBeFollowedBy { rotation, .. } => {
                format!("followers of rotation '{rotation}'")
            }
            ConstraintSpec::Prerequisite { rotation, .. } => {
                format!("prerequisites of rotation '{rotation}'")
            }
            ConstraintSpec::IneligibleAfter { rotation, .. } => {
                format!("ineligibility threshold on rotation '{rotation}'")
            }
            ConstraintSpec::EligibleAfterBlock { rotation, block, .. } => {
                format!("rotation '{rotation}' eligible after '{block}'")
            }
            ConstraintSpec::TrueSomewhere { resident, .. } => {
                format!("required assignment for resident '{resident}'")
            }
            ConstraintSpec::Prohibit { expression, .. } => {
                format!("prohibition '{expression}'")
            }
            ConstraintSpec::ProhibitedCombination { .. } => {
                "prohibited combination".to_string()
            }
            ConstraintSpec::MarkIneligible { eligible, .. } => {
                format!("eligibility restriction '{eligible}'")
            }
            ConstraintSpec::ResidentGroup { rotation } => {
                format!("eligible groups of rotation '{rotation}'")
            }
            ConstraintSpec::WindowGroupCount { group, window, .. } => {
                format!("windowed count (window {window}) on group '{group}'")
            }
            ConstraintSpec::AllGroupCount { group, .. } => {
                format!("horizon count on group '{group}'")
            }
            ConstraintSpec::TimeToFirst { group, window } => {
                format!("time to first '{group}' within {window} blocks")
            }
            ConstraintSpec::MinIndividualScore { min } => {
                format!("per-resident score >= {min}")
            }
            ConstraintSpec::MinTotalScore { min } => {
                format!("total score >= {min}")
            }
            ConstraintSpec::Pin {
                resident,
                block,
                rotation,
            } => format!("pin '{resident}' to '{rotation}' at '{block}'"),
            ConstraintSpec::RotationWindow {
                resident, rotation, ..
            } => format!("window for '{resident}' on rotation '{rotation}'"),
            ConstraintSpec::VacationPool { .. } => "vacation pools".to_string(),
            ConstraintSpec::BackupCoverage { min, max } => {
                format!("backup coverage [{min},{max}]")
            }
        }
    }
}

/// Resolves an optional block-name list, `None` meaning every block.
fn resolve_blocks(roster: &Roster, blocks: Option<&[String]>) -> Result<Vec<usize>, ConfigError> {
    match blocks {
        None => Ok((0..roster.n_blocks()).collect()),
        Some(names) => names.iter().map(|b| roster.block_index(b)).collect(),
    }
}
