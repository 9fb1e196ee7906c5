//! Declarative configuration document.
//!
//! The YAML surface mirrors the constraint vocabulary: `residents`,
//! `rotations`, and `blocks` declare the domain (in order — block order is
//! the time axis), per-entity attributes declare rotation- and
//! resident-scoped constraints, and the remaining sections carry
//! group-level constraints, vacation pools, and backup requirements.
//! [`Config::into_problem`] translates the document into a [`Problem`]:
//! the typed roster, the full constraint list (pins first), and the score
//! table. All reference and bound errors surface here, before any model
//! is built.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::constraints::{ConstraintSpec, CoverageBounds, PoolSpec};
use crate::error::ConfigError;
use crate::models::{Block, Resident, Rotation, Roster};
use crate::objective::ScoreTable;

/// A fully translated scheduling problem, ready for model building.
#[derive(Debug)]
pub struct Problem {
    pub roster: Roster,
    pub constraints: Vec<ConstraintSpec>,
    pub scores: ScoreTable,
    /// (week, containing block) pairs in calendar order.
    pub vacation_weeks: Vec<(String, String)>,
    /// Backup blocks each resident owes, when backup is configured.
    pub backup: Option<i64>,
}

/// Top-level configuration document.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub residents: Vec<ResidentConfig>,
    pub rotations: Vec<RotationConfig>,
    /// Block ids in time order.
    pub blocks: Vec<String>,
    #[serde(default)]
    pub group_constraints: Vec<GroupConstraintConfig>,
    #[serde(default)]
    pub marked_ineligible: Vec<IneligibleConfig>,
    #[serde(default)]
    pub prohibited_combinations: Vec<Vec<String>>,
    #[serde(default)]
    pub vacation: Option<VacationConfig>,
    #[serde(default)]
    pub backup: Option<BackupConfig>,
    #[serde(default)]
    pub min_individual_score: Option<i64>,
    #[serde(default)]
    pub min_total_score: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ResidentConfig {
    #[serde(flatten)]
    pub resident: Resident,
    /// Rotations in preference order; the k-th entry scores k per block.
    #[serde(default)]
    pub rankings: Vec<String>,
    #[serde(default)]
    pub true_somewhere: Vec<String>,
    #[serde(default)]
    pub prohibit: Vec<String>,
    /// rotation → blocks the resident is pinned onto it.
    #[serde(default)]
    pub pin_rotation: BTreeMap<String, Vec<String>>,
    /// rotation → blocks in which it must occur at least once.
    #[serde(default)]
    pub rotation_windows: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct RotationConfig {
    #[serde(flatten)]
    pub rotation: Rotation,
    #[serde(default)]
    pub coverage: Option<CoverageConfig>,
    #[serde(default)]
    pub rot_count: Option<CountConfig>,
    #[serde(default)]
    pub rot_count_including_history: Option<CountConfig>,
    #[serde(default)]
    pub not_rot_count: Option<i64>,
    #[serde(default)]
    pub cool_down: Option<CoolDownConfig>,
    #[serde(default)]
    pub consecutive_count: Option<ConsecutiveConfig>,
    #[serde(default)]
    pub must_be_followed_by: Vec<String>,
    #[serde(default)]
    pub prerequisite: Option<PrerequisiteConfig>,
    #[serde(default)]
    pub ineligible_after: Option<BTreeMap<String, i64>>,
    #[serde(default)]
    pub eligible_after: Option<EligibleAfterConfig>,
}

/// `coverage: [1, 2]` or `coverage: {allowed_values: [0, 2, 4]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CoverageConfig {
    Allowed { allowed_values: Vec<i64> },
    Bounds(Vec<i64>),
}

/// `rot_count: 2`, `rot_count: [0, 2]`, or a map from resident or
/// resident group to either form.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CountConfig {
    Exact(i64),
    Bounds(Vec<i64>),
    PerResident(BTreeMap<String, CountValue>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CountValue {
    Exact(i64),
    Bounds(Vec<i64>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoolDownConfig {
    pub window: usize,
    #[serde(default = "default_cool_down_count")]
    pub count: i64,
    #[serde(default)]
    pub suppress_for: Vec<String>,
}

fn default_cool_down_count() -> i64 {
    1
}

/// `consecutive_count: 2` or the long form with root restrictions.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ConsecutiveConfig {
    Count(usize),
    Full {
        count: usize,
        #[serde(default)]
        forbidden_roots: Vec<String>,
        #[serde(default)]
        allowed_roots: Vec<String>,
    },
}

/// `prerequisite: [Tutorial 1, Tutorial 2]` (each required once) or a map
/// from rotation-or-group to a required count.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PrerequisiteConfig {
    List(Vec<String>),
    Counts(BTreeMap<String, i64>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EligibleAfterConfig {
    pub residents: Vec<String>,
    pub block: String,
}

/// Entries of the `group_constraints` section, dispatched on `kind`.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupConstraintConfig {
    GroupCoverage {
        group: String,
        #[serde(default)]
        count: Option<Vec<i64>>,
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
        #[serde(default)]
        allowed_coverage: Option<Vec<i64>>,
        #[serde(default)]
        blocks: Option<Vec<String>>,
    },
    WindowGroupCountPerResident {
        group: String,
        count: CountConfig,
        window_size: usize,
        #[serde(default)]
        include_history: bool,
    },
    GroupCountPerResident {
        group: String,
        count: CountConfig,
        #[serde(default)]
        include_history: bool,
    },
    TimeToFirst {
        group: String,
        window_size: usize,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IneligibleConfig {
    #[serde(default)]
    pub resident: Option<String>,
    pub eligible: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VacationConfig {
    pub n_vacations_per_resident: i64,
    /// Weeks in calendar order, each inside one block.
    pub weeks: Vec<WeekConfig>,
    pub pools: BTreeMap<String, PoolConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeekConfig {
    pub week: String,
    pub block: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    pub rotations: Vec<String>,
    #[serde(default)]
    pub max_vacation_per_week: Option<i64>,
    #[serde(default)]
    pub max_total_vacation: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupConfig {
    /// Backup blocks each resident owes across the horizon.
    pub n_backup_blocks: i64,
    /// Optional per-block bound on backup head count.
    #[serde(default)]
    pub coverage: Option<Vec<i64>>,
}

impl Config {
    /// Parses a YAML document.
    pub fn from_yaml(input: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(input).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    /// Translates the document into a [`Problem`].
    ///
    /// Pins come first in the constraint list so forced assignments are in
    /// place before any other handler runs.
    pub fn into_problem(self) -> Result<Problem, ConfigError> {
        let roster = Roster::new(
            self.residents.iter().map(|r| r.resident.clone()).collect(),
            self.rotations.iter().map(|r| r.rotation.clone()).collect(),
            self.blocks.iter().map(|b| Block::new(b.as_str())).collect(),
        );

        let mut pins = Vec::new();
        let mut constraints = Vec::new();
        let mut scores = ScoreTable::new(&roster);

        for rc in &self.rotations {
            rotation_constraints(&roster, rc, &mut constraints)?;
        }
        for res in &self.residents {
            resident_constraints(&roster, res, &mut pins, &mut constraints, &mut scores)?;
        }
        for gc in self.group_constraints {
            constraints.push(group_constraint(&roster, gc)?);
        }
        for entry in self.marked_ineligible {
            constraints.push(ConstraintSpec::MarkIneligible {
                resident: entry.resident,
                eligible: entry.eligible,
            });
        }
        for expressions in self.prohibited_combinations {
            constraints.push(ConstraintSpec::ProhibitedCombination { expressions });
        }
        if let Some(min) = self.min_individual_score {
            constraints.push(ConstraintSpec::MinIndividualScore { min });
        }
        if let Some(min) = self.min_total_score {
            constraints.push(ConstraintSpec::MinTotalScore { min });
        }

        let mut vacation_weeks = Vec::new();
        if let Some(vacation) = self.vacation {
            for week in &vacation.weeks {
                roster.block_index(&week.block)?;
                vacation_weeks.push((week.week.clone(), week.block.clone()));
            }
            let pools = vacation
                .pools
                .into_iter()
                .map(|(name, p)| PoolSpec {
                    name,
                    rotations: p.rotations,
                    max_per_week: p.max_vacation_per_week,
                    max_total: p.max_total_vacation,
                })
                .collect();
            constraints.push(ConstraintSpec::VacationPool {
                pools,
                n_vacations_per_resident: vacation.n_vacations_per_resident,
            });
        }

        let mut backup = None;
        if let Some(cfg) = self.backup {
            backup = Some(cfg.n_backup_blocks);
            if let Some(bounds) = cfg.coverage {
                let (min, max) = two_bounds(&bounds, "backup coverage")?;
                constraints.push(ConstraintSpec::BackupCoverage { min, max });
            }
        }

        pins.extend(constraints);
        Ok(Problem {
            roster,
            constraints: pins,
            scores,
            vacation_weeks,
            backup,
        })
    }
}

fn rotation_constraints(
    roster: &Roster,
    rc: &RotationConfig,
    out: &mut Vec<ConstraintSpec>,
) -> Result<(), ConfigError> {
    let id = rc.rotation.id.clone();

    if !rc.rotation.eligible_groups.is_empty() {
        out.push(ConstraintSpec::ResidentGroup {
            rotation: id.clone(),
        });
    }
    if let Some(coverage) = &rc.coverage {
        out.push(ConstraintSpec::RotationCoverage {
            rotation: id.clone(),
            blocks: None,
            coverage: coverage_bounds(coverage, &id)?,
        });
    }
    if let Some(count) = &rc.rot_count {
        out.push(ConstraintSpec::RotationCount {
            rotation: id.clone(),
            counts: resident_counts(roster, count)?,
            include_history: false,
        });
    }
    if let Some(count) = &rc.rot_count_including_history {
        out.push(ConstraintSpec::RotationCount {
            rotation: id.clone(),
            counts: resident_counts(roster, count)?,
            include_history: true,
        });
    }
    if let Some(count) = rc.not_rot_count {
        out.push(ConstraintSpec::RotationCountNot {
            rotation: id.clone(),
            count,
        });
    }
    if rc.cool_down.is_some() && rc.consecutive_count.is_some() {
        return Err(ConfigError::IncompatibleConstraints {
            rotation: id,
            reason: "cool_down cannot be combined with consecutive_count".to_string(),
        });
    }
    if let Some(cd) = &rc.cool_down {
        out.push(ConstraintSpec::CoolDown {
            rotation: id.clone(),
            window: cd.window,
            count: cd.count,
            suppress_for: cd.suppress_for.clone(),
        });
    }
    if let Some(consecutive) = &rc.consecutive_count {
        let (count, forbidden_roots, allowed_roots) = match consecutive {
            ConsecutiveConfig::Count(count) => (*count, Vec::new(), Vec::new()),
            ConsecutiveConfig::Full {
                count,
                forbidden_roots,
                allowed_roots,
            } => (*count, forbidden_roots.clone(), allowed_roots.clone()),
        };
        out.push(ConstraintSpec::ConsecutiveRotation {
            rotation: id.clone(),
            count,
            forbidden_roots,
            allowed_roots,
        });
    }
    if !rc.must_be_followed_by.is_empty() {
        out.push(ConstraintSpec::MustBeFollowedBy {
            rotation: id.clone(),
            followers: rc.must_be_followed_by.clone(),
        });
    }
    if let Some(prerequisite) = &rc.prerequisite {
        let requirements = match prerequisite {
            PrerequisiteConfig::List(names) => {
                names.iter().map(|n| (vec![n.clone()], 1)).collect()
            }
            PrerequisiteConfig::Counts(map) => map
                .iter()
                .map(|(name, count)| (vec![name.clone()], *count))
                .collect(),
        };
        out.push(ConstraintSpec::Prerequisite {
            rotation: id.clone(),
            requirements,
        });
    }
    if let Some(thresholds) = &rc.ineligible_after {
        out.push(ConstraintSpec::IneligibleAfter {
            rotation: id.clone(),
            requirements: thresholds
                .iter()
                .map(|(name, count)| (vec![name.clone()], *count))
                .collect(),
        });
    }
    if let Some(after) = &rc.eligible_after {
        out.push(ConstraintSpec::EligibleAfterBlock {
            rotation: id,
            residents: after.residents.clone(),
            block: after.block.clone(),
        });
    }
    Ok(())
}

fn resident_constraints(
    roster: &Roster,
    rc: &ResidentConfig,
    pins: &mut Vec<ConstraintSpec>,
    out: &mut Vec<ConstraintSpec>,
    scores: &mut ScoreTable,
) -> Result<(), ConfigError> {
    let id = rc.resident.id.clone();

    if !rc.rankings.is_empty() {
        scores.add_ranking(roster, &id, &rc.rankings)?;
    }
    if !rc.true_somewhere.is_empty() {
        out.push(ConstraintSpec::TrueSomewhere {
            resident: id.clone(),
            expressions: rc.true_somewhere.clone(),
        });
    }
    for expression in &rc.prohibit {
        out.push(ConstraintSpec::Prohibit {
            resident: Some(id.clone()),
            expression: expression.clone(),
        });
    }
    for (rotation, blocks) in &rc.pin_rotation {
        for block in blocks {
            pins.push(ConstraintSpec::Pin {
                resident: id.clone(),
                block: block.clone(),
                rotation: rotation.clone(),
            });
        }
    }
    for (rotation, blocks) in &rc.rotation_windows {
        out.push(ConstraintSpec::RotationWindow {
            resident: id.clone(),
            rotation: rotation.clone(),
            blocks: blocks.clone(),
        });
    }
    Ok(())
}

fn group_constraint(
    roster: &Roster,
    gc: GroupConstraintConfig,
) -> Result<ConstraintSpec, ConfigError> {
    match gc {
        GroupConstraintConfig::GroupCoverage {
            group,
            count,
            min,
            max,
            allowed_coverage,
            blocks,
        } => {
            let range_declared = count.is_some() || min.is_some() || max.is_some();
            if allowed_coverage.is_some() && range_declared {
                return Err(ConfigError::AmbiguousCoverage(group));
            }
            let coverage = if let Some(values) = allowed_coverage {
                CoverageBounds::Allowed(values)
            } else if let Some(bounds) = count {
                if min.is_some() || max.is_some() {
                    return Err(ConfigError::AmbiguousCoverage(group));
                }
                let (min, max) = two_bounds(&bounds, &format!("coverage on '{group}'"))?;
                CoverageBounds::Range {
                    min: Some(min),
                    max: Some(max),
                }
            } else if range_declared {
                CoverageBounds::Range { min, max }
            } else {
                return Err(ConfigError::Malformed(format!(
                    "group coverage on '{group}' declares no bounds"
                )));
            };
            Ok(ConstraintSpec::GroupCoverage {
                group,
                blocks,
                coverage,
            })
        }
        GroupConstraintConfig::WindowGroupCountPerResident {
            group,
            count,
            window_size,
            include_history,
        } => Ok(ConstraintSpec::WindowGroupCount {
            counts: resident_counts(roster, &count)?,
            group,
            window: window_size,
            include_history,
        }),
        GroupConstraintConfig::GroupCountPerResident {
            group,
            count,
            include_history,
        } => Ok(ConstraintSpec::AllGroupCount {
            counts: resident_counts(roster, &count)?,
            group,
            include_history,
        }),
        GroupConstraintConfig::TimeToFirst { group, window_size } => {
            Ok(ConstraintSpec::TimeToFirst {
                group,
                window: window_size,
            })
        }
    }
}

/// Expands a count specification into per-resident bounds. Map keys may
/// be resident ids or resident groups; scalars mean an exact count.
fn resident_counts(
    roster: &Roster,
    count: &CountConfig,
) -> Result<BTreeMap<String, (i64, i64)>, ConfigError> {
    let mut counts = BTreeMap::new();
    match count {
        CountConfig::Exact(n) => {
            for res in roster.residents() {
                counts.insert(res.id.clone(), (*n, *n));
            }
        }
        CountConfig::Bounds(bounds) => {
            let (min, max) = two_bounds(bounds, "count")?;
            for res in roster.residents() {
                counts.insert(res.id.clone(), (min, max));
            }
        }
        CountConfig::PerResident(map) => {
            for (key, value) in map {
                let (min, max) = match value {
                    CountValue::Exact(n) => (*n, *n),
                    CountValue::Bounds(bounds) => {
                        two_bounds(bounds, &format!("count for '{key}'"))?
                    }
                };
                if roster.resident_index(key).is_ok() {
                    counts.insert(key.clone(), (min, max));
                } else {
                    for res in roster.residents_in_group(key)? {
                        counts.insert(roster.resident(res).id.clone(), (min, max));
                    }
                }
            }
        }
    }
    Ok(counts)
}

fn coverage_bounds(coverage: &CoverageConfig, rotation: &str) -> Result<CoverageBounds, ConfigError> {
    match coverage {
        CoverageConfig::Allowed { allowed_values } => {
            Ok(CoverageBounds::Allowed(allowed_values.clone()))
        }
        CoverageConfig::Bounds(bounds) => {
            let (min, max) = two_bounds(bounds, &format!("coverage on '{rotation}'"))?;
            Ok(CoverageBounds::Range {
                min: Some(min),
                max: Some(max),
            })
        }
    }
}

fn two_bounds(bounds: &[i64], entity: &str) -> Result<(i64, i64), ConfigError> {
    match bounds {
        [min, max] => Ok((*min, *max)),
        _ => Err(ConfigError::Malformed(format!(
            "{entity} needs exactly two bounds, got {}",
            bounds.len()
        ))),
    }
}
