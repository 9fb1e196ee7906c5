//! Solver orchestration: model assembly, warm-start hints, the solve
//! call, and extraction of a concrete schedule.
//!
//! The flow is a one-way typestate: [`build_model`] produces a
//! [`BuiltModel`]; hints may be folded in with
//! [`BuiltModel::with_hints`]; [`BuiltModel::solve`] hands the model to a
//! [`Solve`] engine and yields a [`SolvedModel`]; extraction reads the
//! valuation back into a [`ScheduleResult`]. A model is never mutated
//! after building — re-solving with changed configuration is a fresh
//! build.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Problem;
use crate::constraints::BuildContext;
use crate::engine::{BoolVar, Model, Solve, SolveBudget, SolveStatus, Solution};
use crate::error::{ConfigError, SolveError};
use crate::grid::{VarKey, VariableGrid};
use crate::objective::{ObjectiveComposer, ObjectiveStrategy, OBJECTIVE_DIRECTION};

/// Persisted warm-start hints: variable identity → previous value.
///
/// Stored by [`VarKey`] rather than raw variable index so a store
/// survives roster edits between runs; entries whose identity no longer
/// resolves are dropped at load time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintStore {
    entries: Vec<(VarKey, bool)>,
}

impl HintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces one entry.
    pub fn insert(&mut self, key: VarKey, value: bool) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &VarKey) -> Option<bool> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(VarKey, bool)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A fully assembled model, not yet solved.
#[derive(Debug)]
pub struct BuiltModel {
    model: Model,
    grid: VariableGrid,
    problem: Problem,
    hints: Vec<(BoolVar, bool)>,
}

/// Assembles the complete model for `problem`: variable grid and central
/// exactly-one first, then pins, then every other constraint, then the
/// composed objective.
pub fn build_model(
    problem: Problem,
    strategy: &ObjectiveStrategy,
) -> Result<BuiltModel, ConfigError> {
    let mut model = Model::new();
    let grid = VariableGrid::build(
        &mut model,
        &problem.roster,
        &problem.vacation_weeks,
        problem.backup,
    )?;

    {
        let mut ctx = BuildContext {
            model: &mut model,
            grid: &grid,
            roster: &problem.roster,
            scores: &problem.scores,
        };
        for spec in problem.constraints.iter().filter(|s| s.is_pin()) {
            spec.apply(&mut ctx)?;
        }
        for spec in problem.constraints.iter().filter(|s| !s.is_pin()) {
            spec.apply(&mut ctx)?;
        }
    }

    let mut composer = ObjectiveComposer::new();
    composer.register_scores(strategy, &problem.roster, &grid, &problem.scores);
    if !composer.is_empty() {
        model.set_objective(OBJECTIVE_DIRECTION, composer.build());
    }

    info!(
        variables = model.var_count(),
        linear = model.linear_count(),
        clauses = model.clause_count(),
        constraints = problem.constraints.len(),
        "model assembled"
    );

    Ok(BuiltModel {
        model,
        grid,
        problem,
        hints: Vec::new(),
    })
}

impl BuiltModel {
    /// Applies warm-start hints. Entries whose identity does not resolve
    /// against the current grid are dropped silently.
    pub fn with_hints(mut self, hints: &HintStore) -> Self {
        let mut applied = 0usize;
        for (key, value) in hints.iter() {
            match self.grid.lookup(&self.problem.roster, key) {
                Some(var) => {
                    self.hints.push((var, *value));
                    applied += 1;
                }
                None => debug!(?key, "dropping hint for unknown variable"),
            }
        }
        info!(applied, total = hints.len(), "hints loaded");
        self
    }

    /// Delegates to the engine within `budget`.
    ///
    /// `Infeasible` is an error carrying the hard-constraint inventory
    /// for diagnosis; an exhausted budget with no incumbent is
    /// [`SolveError::NoSolution`]. A `Feasible` status (budget ran out
    /// with an incumbent in hand) is a success, explicitly non-optimal.
    pub fn solve(
        self,
        engine: &impl Solve,
        budget: &SolveBudget,
    ) -> Result<SolvedModel, SolveError> {
        let solution = engine.solve(&self.model, budget, &self.hints);
        match solution.status {
            SolveStatus::Infeasible => Err(SolveError::Infeasible {
                suspects: self
                    .problem
                    .constraints
                    .iter()
                    .map(|c| c.describe())
                    .collect(),
            }),
            SolveStatus::Unknown => Err(SolveError::NoSolution),
            SolveStatus::Optimal | SolveStatus::Feasible => Ok(SolvedModel {
                grid: self.grid,
                problem: self.problem,
                solution,
            }),
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }
}

/// A solved model holding the engine's valuation.
#[derive(Debug)]
pub struct SolvedModel {
    grid: VariableGrid,
    problem: Problem,
    solution: Solution,
}

impl SolvedModel {
    pub fn status(&self) -> SolveStatus {
        self.solution.status
    }

    pub fn objective_value(&self) -> Option<i64> {
        self.solution.objective_value
    }

    /// Reads the valuation back into a schedule.
    ///
    /// Exactly one rotation must be true per (resident, block); anything
    /// else is an engine-contract breach, not a user error, and fails
    /// extraction outright.
    pub fn extract(&self) -> Result<ScheduleResult, SolveError> {
        let roster = &self.problem.roster;
        let mut rows = Vec::with_capacity(roster.n_residents());

        for (r, res) in roster.residents().iter().enumerate() {
            let mut rotations = Vec::with_capacity(roster.n_blocks());
            for b in 0..roster.n_blocks() {
                let assigned: Vec<usize> = (0..roster.n_rotations())
                    .filter(|&t| self.solution.value(self.grid.var(r, b, t)))
                    .collect();
                match assigned.as_slice() {
                    [only] => rotations.push(roster.rotation(*only).id.clone()),
                    _ => {
                        return Err(SolveError::ExtractionInvariant {
                            resident: res.id.clone(),
                            block: roster.block(b).id.clone(),
                            true_count: assigned.len(),
                        })
                    }
                }
            }

            let mut vacation_weeks = Vec::new();
            for w in 0..self.grid.n_weeks() {
                if self.solution.value(self.grid.vacation_variable_for(r, w)) {
                    vacation_weeks.push(self.grid.week_name(w).to_string());
                }
            }

            let mut backup_blocks = Vec::new();
            for b in 0..roster.n_blocks() {
                if let Some(var) = self.grid.backup_var(r, b) {
                    if self.solution.value(var) {
                        backup_blocks.push(roster.block(b).id.clone());
                    }
                }
            }

            rows.push(ResidentSchedule {
                resident: res.id.clone(),
                rotations,
                vacation_weeks,
                backup_blocks,
            });
        }

        let mut hints = HintStore::new();
        for (key, var) in self.grid.keyed_vars(roster) {
            hints.insert(key, self.solution.value(var));
        }

        Ok(ScheduleResult {
            status: self.solution.status,
            objective: self.solution.objective_value,
            blocks: roster.blocks().iter().map(|b| b.id.clone()).collect(),
            rows,
            hints,
        })
    }
}

/// One resident's extracted schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidentSchedule {
    pub resident: String,
    /// One rotation per block, in block order.
    pub rotations: Vec<String>,
    pub vacation_weeks: Vec<String>,
    pub backup_blocks: Vec<String>,
}

/// The extracted assignment table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleResult {
    pub status: SolveStatus,
    pub objective: Option<i64>,
    pub blocks: Vec<String>,
    pub rows: Vec<ResidentSchedule>,
    hints: HintStore,
}

impl ScheduleResult {
    /// The rotation assigned to a resident in a block, by id.
    pub fn rotation_for(&self, resident: &str, block: &str) -> Option<&str> {
        let row = self.rows.iter().find(|r| r.resident == resident)?;
        let b = self.blocks.iter().position(|x| x == block)?;
        Some(&row.rotations[b])
    }

    /// Tab-delimited rendering: a header of block ids, one row per
    /// resident, with vacation and backup summaries in trailing columns.
    pub fn to_delimited(&self) -> String {
        let mut out = String::from("resident");
        for block in &self.blocks {
            out.push('\t');
            out.push_str(block);
        }
        out.push_str("\tvacation\tbackup\n");

        for row in &self.rows {
            out.push_str(&row.resident);
            for rotation in &row.rotations {
                out.push('\t');
                out.push_str(rotation);
            }
            out.push('\t');
            out.push_str(&row.vacation_weeks.join(","));
            out.push('\t');
            out.push_str(&row.backup_blocks.join(","));
            out.push('\n');
        }
        out
    }

    /// This solution as warm-start hints for a later run.
    pub fn to_hints(&self) -> HintStore {
        self.hints.clone()
    }

    /// Per-block head counts for one rotation, mostly for reporting.
    pub fn coverage_of(&self, rotation: &str) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for (i, block) in self.blocks.iter().enumerate() {
            let n = self
                .rows
                .iter()
                .filter(|row| row.rotations[i] == rotation)
                .count();
            counts.insert(block.as_str(), n);
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::constraints::{ConstraintSpec, CoverageBounds};
    use crate::engine::BacktrackEngine;
    use crate::models::{Block, Resident, Rotation, Roster};
    use crate::objective::ScoreTable;

    fn budget() -> SolveBudget {
        SolveBudget::with_decisions(5_000_000)
    }

    fn four_by_four() -> Problem {
        let roster = Roster::new(
            (1..=4).map(|i| Resident::new(format!("R{i}"))).collect(),
            ["ICU", "Ward", "Cards", "Elective"]
                .into_iter()
                .map(Rotation::new)
                .collect(),
            (1..=4).map(|i| Block::new(format!("Block {i}"))).collect(),
        );
        let constraints = ["ICU", "Ward", "Cards", "Elective"]
            .into_iter()
            .map(|rot| ConstraintSpec::RotationCoverage {
                rotation: rot.to_string(),
                blocks: None,
                coverage: CoverageBounds::Range {
                    min: Some(1),
                    max: Some(1),
                },
            })
            .collect();
        let scores = ScoreTable::new(&roster);
        Problem {
            roster,
            constraints,
            scores,
            vacation_weeks: Vec::new(),
            backup: None,
        }
    }

    #[test]
    fn test_four_residents_four_rotations_feasible() {
        let built = build_model(four_by_four(), &ObjectiveStrategy::RankSum).unwrap();
        let solved = built.solve(&BacktrackEngine::new(), &budget()).unwrap();
        assert_eq!(solved.status(), SolveStatus::Optimal);

        let result = solved.extract().unwrap();
        // every block is a permutation of the four rotations
        for (i, _) in result.blocks.iter().enumerate() {
            let mut seen: Vec<&str> = result.rows.iter().map(|r| r.rotations[i].as_str()).collect();
            seen.sort_unstable();
            assert_eq!(seen, vec!["Cards", "Elective", "ICU", "Ward"]);
        }
    }

    #[test]
    fn test_infeasible_reports_suspects() {
        let mut problem = four_by_four();
        problem.constraints.push(ConstraintSpec::RotationCount {
            rotation: "ICU".to_string(),
            counts: (1..=4).map(|i| (format!("R{i}"), (0, 0))).collect(),
            include_history: false,
        });
        let built = build_model(problem, &ObjectiveStrategy::RankSum).unwrap();
        let err = built.solve(&BacktrackEngine::new(), &budget()).unwrap_err();
        match err {
            SolveError::Infeasible { suspects } => {
                assert!(suspects.iter().any(|s| s.contains("ICU")));
            }
            other => panic!("expected Infeasible, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_budget_exhaustion() {
        let built = build_model(four_by_four(), &ObjectiveStrategy::RankSum).unwrap();
        let err = built
            .solve(&BacktrackEngine::new(), &SolveBudget::with_decisions(0))
            .unwrap_err();
        assert!(matches!(err, SolveError::NoSolution));
    }

    fn ranked_problem() -> Problem {
        let mut problem = four_by_four();
        let ranking: Vec<String> = ["ICU", "Ward", "Cards", "Elective"]
            .into_iter()
            .map(String::from)
            .collect();
        for i in 1..=4 {
            problem
                .scores
                .add_ranking(&problem.roster, &format!("R{i}"), &ranking)
                .unwrap();
        }
        problem
    }

    #[test]
    fn test_hint_idempotence() {
        // solving again from an optimal solution's hints cannot worsen
        // the objective
        let first = build_model(ranked_problem(), &ObjectiveStrategy::RankSum)
            .unwrap()
            .solve(&BacktrackEngine::new(), &budget())
            .unwrap();
        let hints = first.extract().unwrap().to_hints();
        let objective = first.objective_value();
        assert!(objective.is_some());

        let again = build_model(ranked_problem(), &ObjectiveStrategy::RankSum)
            .unwrap()
            .with_hints(&hints)
            .solve(&BacktrackEngine::new(), &budget())
            .unwrap();
        assert_eq!(again.objective_value(), objective);
    }

    #[test]
    fn test_stale_hints_are_dropped() {
        let mut hints = HintStore::new();
        hints.insert(
            VarKey::Assign {
                resident: "R1".to_string(),
                block: "Block 1".to_string(),
                rotation: "Retired".to_string(),
            },
            true,
        );
        let built = build_model(four_by_four(), &ObjectiveStrategy::RankSum)
            .unwrap()
            .with_hints(&hints);
        let solved = built.solve(&BacktrackEngine::new(), &budget()).unwrap();
        assert_eq!(solved.status(), SolveStatus::Optimal);
    }

    #[test]
    fn test_hint_store_round_trips_through_json() {
        let built = build_model(four_by_four(), &ObjectiveStrategy::RankSum).unwrap();
        let solved = built.solve(&BacktrackEngine::new(), &budget()).unwrap();
        let hints = solved.extract().unwrap().to_hints();

        let json = serde_json::to_string(&hints).unwrap();
        let back: HintStore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hints);
    }

    #[test]
    fn test_extraction_invariant_violation_is_fatal() {
        let built = build_model(four_by_four(), &ObjectiveStrategy::RankSum).unwrap();
        let solved = built.solve(&BacktrackEngine::new(), &budget()).unwrap();

        // forge a valuation with two rotations at once for R1, Block 1
        let mut forged = solved;
        for i in 0..4 {
            forged.solution.values[i] = i < 2;
        }
        let err = forged.extract().unwrap_err();
        assert!(matches!(
            err,
            SolveError::ExtractionInvariant { true_count: 2, .. }
        ));
    }

    #[test]
    fn test_delimited_output_shape() {
        let built = build_model(four_by_four(), &ObjectiveStrategy::RankSum).unwrap();
        let result = built
            .solve(&BacktrackEngine::new(), &budget())
            .unwrap()
            .extract()
            .unwrap();

        let text = result.to_delimited();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "resident\tBlock 1\tBlock 2\tBlock 3\tBlock 4\tvacation\tbackup"
        );
        assert_eq!(lines.count(), 4);
    }

    #[test]
    fn test_true_somewhere_forces_exact_assignment() {
        let yaml = r#"
residents:
  - id: "A"
    true_somewhere: ["ICU and Block 2"]
  - id: "B"
rotations:
  - id: ICU
    coverage: [0, 1]
  - id: Ward
blocks: [Block 1, Block 2]
"#;
        let problem = Config::from_yaml(yaml).unwrap().into_problem().unwrap();
        let result = build_model(problem, &ObjectiveStrategy::RankSum)
            .unwrap()
            .solve(&BacktrackEngine::new(), &budget())
            .unwrap()
            .extract()
            .unwrap();
        assert_eq!(result.rotation_for("A", "Block 2"), Some("ICU"));
    }

    #[test]
    fn test_end_to_end_with_vacation_and_backup() {
        let yaml = r#"
residents:
  - id: "A"
  - id: "B"
rotations:
  - id: ICU
    coverage: [1, 1]
  - id: Elective
blocks: [Block 1, Block 2]
vacation:
  n_vacations_per_resident: 1
  weeks:
    - week: Week 1
      block: Block 1
    - week: Week 2
      block: Block 2
  pools:
    everything:
      rotations: [ICU, Elective]
      max_vacation_per_week: 2
backup:
  n_backup_blocks: 1
  coverage: [1, 1]
"#;
        let problem = Config::from_yaml(yaml).unwrap().into_problem().unwrap();
        let result = build_model(problem, &ObjectiveStrategy::RankSum)
            .unwrap()
            .solve(&BacktrackEngine::new(), &budget())
            .unwrap()
            .extract()
            .unwrap();

        for row in &result.rows {
            assert_eq!(row.vacation_weeks.len(), 1);
            assert_eq!(row.backup_blocks.len(), 1);
        }
        // one backup per block, two residents, one block each
        let all_backups: Vec<&str> = result
            .rows
            .iter()
            .flat_map(|r| r.backup_blocks.iter().map(String::as_str))
            .collect();
        assert_eq!(all_backups.len(), 2);
    }
}
