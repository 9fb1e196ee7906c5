//! Solve trait and the bundled reference engine.
//!
//! The trait mirrors the single blocking call an external CP-SAT style
//! service exposes: a model, a budget, warm-start hints in, a status plus
//! valuation out. Running out of budget yields the best incumbent as
//! `Feasible` rather than hanging.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::model::{BoolVar, Direction, Model};

/// Engine status after a solve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    /// Best possible solution found (or any solution, for a pure
    /// satisfaction model with no objective).
    Optimal,
    /// A solution was found but the budget ran out before optimality
    /// was proven.
    Feasible,
    /// Proven: no satisfying assignment exists.
    Infeasible,
    /// Budget exhausted with no solution found either way.
    Unknown,
}

/// Time/resource budget for one solve call.
///
/// Cancellation is expressed only through this budget; there is no
/// mid-solve interrupt.
#[derive(Debug, Clone)]
pub struct SolveBudget {
    /// Wall-clock limit in milliseconds.
    pub max_time_ms: u64,
    /// Decision (branch) limit, for deterministic cutoffs.
    pub max_decisions: u64,
}

impl Default for SolveBudget {
    fn default() -> Self {
        Self {
            max_time_ms: 10_000,
            max_decisions: u64::MAX,
        }
    }
}

impl SolveBudget {
    /// Budget bounded by wall-clock time only.
    pub fn with_time_ms(max_time_ms: u64) -> Self {
        Self {
            max_time_ms,
            ..Self::default()
        }
    }

    /// Budget bounded by decision count only (deterministic).
    pub fn with_decisions(max_decisions: u64) -> Self {
        Self {
            max_time_ms: u64::MAX,
            max_decisions,
        }
    }
}

/// Result of a solve call: status plus (for `Optimal`/`Feasible`) a
/// complete valuation.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Final status.
    pub status: SolveStatus,
    /// Objective value of the returned valuation, if an objective was set.
    pub objective_value: Option<i64>,
    /// Number of branching decisions taken.
    pub decisions: u64,
    pub(crate) values: Vec<bool>,
}

impl Solution {
    fn empty(status: SolveStatus, decisions: u64) -> Self {
        Self {
            status,
            objective_value: None,
            decisions,
            values: Vec::new(),
        }
    }

    /// Whether a usable valuation is present.
    pub fn is_solution_found(&self) -> bool {
        matches!(self.status, SolveStatus::Optimal | SolveStatus::Feasible)
    }

    /// Valuation lookup for one variable.
    ///
    /// Only meaningful when [`Solution::is_solution_found`] is true.
    pub fn value(&self, var: BoolVar) -> bool {
        self.values[var.index()]
    }
}

/// A boolean/linear constraint solving engine.
pub trait Solve {
    /// Solves `model` within `budget`, biased by warm-start `hints`.
    fn solve(&self, model: &Model, budget: &SolveBudget, hints: &[(BoolVar, bool)]) -> Solution;
}

/// Reference engine: deterministic DFS with unit propagation on clauses,
/// interval pruning and tightness forcing on linear constraints, and
/// branch-and-bound on the objective.
///
/// Hinted variables are branched before unhinted ones, with the hinted
/// value tried first, so a hinted re-solve of an already-optimal model
/// reaches an equal-or-better objective. A hint conflicting with the
/// constraints is simply overridden by the search.
#[derive(Debug, Default)]
pub struct BacktrackEngine;

impl BacktrackEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Solve for BacktrackEngine {
    fn solve(&self, model: &Model, budget: &SolveBudget, hints: &[(BoolVar, bool)]) -> Solution {
        if model.is_contradiction() {
            return Solution::empty(SolveStatus::Infeasible, 0);
        }

        let mut search = Searcher::new(model, budget, hints);

        // Seed with builder-level fixed values.
        let seeds: Vec<(BoolVar, bool)> = model
            .fixed
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.map(|v| (BoolVar(i as u32), v)))
            .collect();
        if !search.propagate(seeds) {
            return Solution::empty(SolveStatus::Infeasible, 0);
        }

        search.run();

        let status = match (&search.best, search.aborted) {
            (Some(_), false) => SolveStatus::Optimal,
            (Some(_), true) => SolveStatus::Feasible,
            (None, false) => SolveStatus::Infeasible,
            (None, true) => SolveStatus::Unknown,
        };
        debug!(
            ?status,
            decisions = search.decisions,
            "backtrack engine finished"
        );

        match search.best {
            Some((objective, values)) => Solution {
                status,
                objective_value: model.objective.as_ref().map(|_| objective),
                decisions: search.decisions,
                values,
            },
            None => Solution::empty(status, search.decisions),
        }
    }
}

struct Searcher<'a> {
    model: &'a Model,
    values: Vec<Option<bool>>,
    trail: Vec<BoolVar>,
    // Running [min, max] attainable value per linear constraint.
    lin_min: Vec<i64>,
    lin_max: Vec<i64>,
    var_linears: Vec<Vec<(usize, i64)>>,
    var_clauses: Vec<Vec<usize>>,
    var_obj: Vec<i64>,
    obj_min: i64,
    obj_max: i64,
    direction: Option<Direction>,
    hints: Vec<Option<bool>>,
    best: Option<(i64, Vec<bool>)>,
    decisions: u64,
    max_decisions: u64,
    started: Instant,
    max_time_ms: u64,
    aborted: bool,
}

impl<'a> Searcher<'a> {
    fn new(model: &'a Model, budget: &SolveBudget, hints: &[(BoolVar, bool)]) -> Self {
        let n = model.var_count();

        let mut var_linears = vec![Vec::new(); n];
        let mut lin_min = Vec::with_capacity(model.linears.len());
        let mut lin_max = Vec::with_capacity(model.linears.len());
        for (ci, c) in model.linears.iter().enumerate() {
            lin_min.push(c.expr.min_value());
            lin_max.push(c.expr.max_value());
            for &(var, coef) in &c.expr.terms {
                var_linears[var.index()].push((ci, coef));
            }
        }

        let mut var_clauses = vec![Vec::new(); n];
        for (ci, clause) in model.clauses.iter().enumerate() {
            for lit in clause {
                var_clauses[lit.var().index()].push(ci);
            }
        }

        let mut var_obj = vec![0i64; n];
        let mut obj_min = 0;
        let mut obj_max = 0;
        let mut direction = None;
        if let Some((dir, expr)) = &model.objective {
            direction = Some(*dir);
            obj_min = expr.min_value();
            obj_max = expr.max_value();
            for &(var, coef) in &expr.terms {
                var_obj[var.index()] += coef;
            }
        }

        let mut hint_values = vec![None; n];
        for &(var, value) in hints {
            hint_values[var.index()] = Some(value);
        }

        Self {
            model,
            values: vec![None; n],
            trail: Vec::new(),
            lin_min,
            lin_max,
            var_linears,
            var_clauses,
            var_obj,
            obj_min,
            obj_max,
            direction,
            hints: hint_values,
            best: None,
            decisions: 0,
            max_decisions: budget.max_decisions,
            started: Instant::now(),
            max_time_ms: budget.max_time_ms,
            aborted: false,
        }
    }

    /// Records one assignment and updates running bounds.
    ///
    /// Returns false on a direct contradiction with an earlier assignment.
    fn assign(&mut self, var: BoolVar, value: bool) -> bool {
        let idx = var.index();
        match self.values[idx] {
            Some(v) => return v == value,
            None => {}
        }
        self.values[idx] = Some(value);
        self.trail.push(var);

        for &(ci, coef) in &self.var_linears[idx] {
            if value {
                if coef > 0 {
                    self.lin_min[ci] += coef;
                } else {
                    self.lin_max[ci] += coef;
                }
            } else if coef > 0 {
                self.lin_max[ci] -= coef;
            } else {
                self.lin_min[ci] -= coef;
            }
        }

        let oc = self.var_obj[idx];
        if oc != 0 {
            if value {
                if oc > 0 {
                    self.obj_min += oc;
                } else {
                    self.obj_max += oc;
                }
            } else if oc > 0 {
                self.obj_max -= oc;
            } else {
                self.obj_min -= oc;
            }
        }
        true
    }

    fn undo_to(&mut self, mark: usize) {
        while self.trail.len() > mark {
            let Some(var) = self.trail.pop() else { break };
            let idx = var.index();
            let Some(value) = self.values[idx].take() else {
                continue;
            };

            for &(ci, coef) in &self.var_linears[idx] {
                if value {
                    if coef > 0 {
                        self.lin_min[ci] -= coef;
                    } else {
                        self.lin_max[ci] -= coef;
                    }
                } else if coef > 0 {
                    self.lin_max[ci] += coef;
                } else {
                    self.lin_min[ci] += coef;
                }
            }

            let oc = self.var_obj[idx];
            if oc != 0 {
                if value {
                    if oc > 0 {
                        self.obj_min -= oc;
                    } else {
                        self.obj_max -= oc;
                    }
                } else if oc > 0 {
                    self.obj_max += oc;
                } else {
                    self.obj_min += oc;
                }
            }
        }
    }

    /// Assigns everything in `pending` plus all consequences.
    ///
    /// Returns false on conflict (caller must undo to its own mark).
    fn propagate(&mut self, mut pending: Vec<(BoolVar, bool)>) -> bool {
        while let Some((var, value)) = pending.pop() {
            if self.values[var.index()] == Some(value) {
                continue;
            }
            if !self.assign(var, value) {
                return false;
            }
            let idx = var.index();

            // Linear constraints touching this variable: detect dead ends
            // and force tight assignments.
            for k in 0..self.var_linears[idx].len() {
                let ci = self.var_linears[idx][k].0;
                let c = &self.model.linears[ci];
                if self.lin_min[ci] > c.ub || self.lin_max[ci] < c.lb {
                    return false;
                }
                if self.lin_max[ci] == c.lb {
                    // only reachable by maximizing every open term
                    for &(v, coef) in &c.expr.terms {
                        if self.values[v.index()].is_none() {
                            pending.push((v, coef > 0));
                        }
                    }
                } else if self.lin_min[ci] == c.ub {
                    for &(v, coef) in &c.expr.terms {
                        if self.values[v.index()].is_none() {
                            pending.push((v, coef < 0));
                        }
                    }
                }
            }

            // Clause propagation: unit or conflict.
            for k in 0..self.var_clauses[idx].len() {
                let ci = self.var_clauses[idx][k];
                let clause = &self.model.clauses[ci];
                let mut satisfied = false;
                let mut open = None;
                let mut open_count = 0;
                for &lit in clause {
                    match self.values[lit.var().index()] {
                        Some(v) => {
                            if lit.eval(v) {
                                satisfied = true;
                                break;
                            }
                        }
                        None => {
                            open = Some(lit);
                            open_count += 1;
                        }
                    }
                }
                if satisfied {
                    continue;
                }
                match (open, open_count) {
                    (None, _) => return false,
                    (Some(lit), 1) => pending.push((lit.var(), lit.is_positive())),
                    _ => {}
                }
            }
        }
        true
    }

    fn out_of_budget(&self) -> bool {
        if self.decisions >= self.max_decisions {
            return true;
        }
        if self.max_time_ms != u64::MAX && self.decisions % 256 == 0 {
            return self.started.elapsed().as_millis() as u64 >= self.max_time_ms;
        }
        false
    }

    /// True while the search for better solutions can still pay off.
    fn can_improve(&self) -> bool {
        let Some((best, _)) = &self.best else {
            return true;
        };
        match self.direction {
            Some(Direction::Minimize) => self.obj_min < *best,
            Some(Direction::Maximize) => self.obj_max > *best,
            // No objective: first solution ends the search.
            None => false,
        }
    }

    fn run(&mut self) {
        if self.aborted || !self.can_improve() {
            return;
        }
        if self.out_of_budget() {
            self.aborted = true;
            return;
        }

        // Hinted variables branch first so propagation cannot fix them
        // the other way before the hint is ever tried.
        let next = (0..self.values.len())
            .find(|&i| self.values[i].is_none() && self.hints[i].is_some())
            .or_else(|| (0..self.values.len()).find(|&i| self.values[i].is_none()));
        let Some(idx) = next else {
            // Complete assignment; bounds have collapsed to the exact value.
            let objective = self.obj_min;
            let accepted = match (&self.best, self.direction) {
                (None, _) => true,
                (Some((best, _)), Some(Direction::Minimize)) => objective < *best,
                (Some((best, _)), Some(Direction::Maximize)) => objective > *best,
                (Some(_), None) => false,
            };
            if accepted {
                let values = self.values.iter().map(|v| v.unwrap_or(false)).collect();
                self.best = Some((objective, values));
            }
            return;
        };

        let var = BoolVar(idx as u32);
        let first = self.hints[idx].unwrap_or(match self.direction {
            Some(Direction::Minimize) => self.var_obj[idx] <= 0,
            Some(Direction::Maximize) => self.var_obj[idx] >= 0,
            None => true,
        });

        for value in [first, !first] {
            let mark = self.trail.len();
            self.decisions += 1;
            if self.propagate(vec![(var, value)]) {
                self.run();
            }
            self.undo_to(mark);
            if self.aborted || !self.can_improve() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::LinearExpr;

    fn solve(model: &Model) -> Solution {
        BacktrackEngine::new().solve(model, &SolveBudget::default(), &[])
    }

    #[test]
    fn test_exactly_one_satisfied() {
        let mut m = Model::new();
        let vars: Vec<_> = (0..4).map(|i| m.new_bool_var(format!("x{i}"))).collect();
        m.add_exactly_one(vars.clone());

        let s = solve(&m);
        assert_eq!(s.status, SolveStatus::Optimal);
        let true_count = vars.iter().filter(|&&v| s.value(v)).count();
        assert_eq!(true_count, 1);
    }

    #[test]
    fn test_infeasible_fix_conflict() {
        let mut m = Model::new();
        let a = m.new_bool_var("a");
        let b = m.new_bool_var("b");
        m.fix(a, true);
        m.fix(b, true);
        // a + b <= 1 contradicts both fixes
        m.add_linear(0, LinearExpr::sum([a, b]), 1);

        let s = solve(&m);
        assert_eq!(s.status, SolveStatus::Infeasible);
    }

    #[test]
    fn test_clause_unit_propagation() {
        let mut m = Model::new();
        let a = m.new_bool_var("a");
        let b = m.new_bool_var("b");
        m.fix(a, false);
        m.add_clause(vec![a.lit(), b.lit()]);

        let s = solve(&m);
        assert!(s.is_solution_found());
        assert!(s.value(b));
    }

    #[test]
    fn test_minimize_objective() {
        let mut m = Model::new();
        let a = m.new_bool_var("a");
        let b = m.new_bool_var("b");
        let c = m.new_bool_var("c");
        // at least two of the three
        m.add_linear(2, LinearExpr::sum([a, b, c]), i64::MAX);
        let mut obj = LinearExpr::new();
        obj.add_term(a, 5);
        obj.add_term(b, 1);
        obj.add_term(c, 2);
        m.set_objective(Direction::Minimize, obj);

        let s = solve(&m);
        assert_eq!(s.status, SolveStatus::Optimal);
        assert_eq!(s.objective_value, Some(3)); // b and c
        assert!(!s.value(a));
        assert!(s.value(b));
        assert!(s.value(c));
    }

    #[test]
    fn test_maximize_objective() {
        let mut m = Model::new();
        let a = m.new_bool_var("a");
        let b = m.new_bool_var("b");
        // mutually exclusive
        m.add_linear(0, LinearExpr::sum([a, b]), 1);
        let mut obj = LinearExpr::new();
        obj.add_term(a, 2);
        obj.add_term(b, 7);
        m.set_objective(Direction::Maximize, obj);

        let s = solve(&m);
        assert_eq!(s.status, SolveStatus::Optimal);
        assert_eq!(s.objective_value, Some(7));
        assert!(s.value(b));
    }

    #[test]
    fn test_indicator_constraint() {
        let mut m = Model::new();
        let gate = m.new_bool_var("gate");
        let a = m.new_bool_var("a");
        let b = m.new_bool_var("b");
        m.fix(gate, true);
        m.add_linear_if(gate.lit(), 2, LinearExpr::sum([a, b]), i64::MAX);

        let s = solve(&m);
        assert!(s.is_solution_found());
        assert!(s.value(a) && s.value(b));
    }

    #[test]
    fn test_indicator_vacuous_when_gate_false() {
        let mut m = Model::new();
        let gate = m.new_bool_var("gate");
        let a = m.new_bool_var("a");
        m.fix(gate, false);
        m.fix(a, false);
        m.add_linear_if(gate.lit(), 1, LinearExpr::from_var(a), i64::MAX);

        let s = solve(&m);
        assert!(s.is_solution_found());
    }

    #[test]
    fn test_hints_bias_value_order() {
        let mut m = Model::new();
        let a = m.new_bool_var("a");
        let b = m.new_bool_var("b");
        m.add_exactly_one([a, b]);

        let engine = BacktrackEngine::new();
        let s = engine.solve(&m, &SolveBudget::default(), &[(b, true)]);
        assert!(s.is_solution_found());
        assert!(s.value(b));
        assert!(!s.value(a));
    }

    #[test]
    fn test_hinted_variable_branches_before_unhinted() {
        // without the hint, allocation order would settle a=true and
        // propagation would fix b=false before b is ever branched
        let mut m = Model::new();
        let a = m.new_bool_var("a");
        let b = m.new_bool_var("b");
        let c = m.new_bool_var("c");
        m.add_exactly_one([a, b, c]);

        let s = BacktrackEngine::new().solve(&m, &SolveBudget::default(), &[(c, true)]);
        assert!(s.is_solution_found());
        assert!(s.value(c));
        assert!(!s.value(a) && !s.value(b));
    }

    #[test]
    fn test_conflicting_hint_is_overridden() {
        let mut m = Model::new();
        let a = m.new_bool_var("a");
        let b = m.new_bool_var("b");
        m.add_exactly_one([a, b]);
        m.fix(b, false);

        let s = BacktrackEngine::new().solve(&m, &SolveBudget::default(), &[(b, true)]);
        assert!(s.is_solution_found());
        assert!(s.value(a));
        assert!(!s.value(b));
    }

    #[test]
    fn test_budget_exhaustion_returns_unknown() {
        let mut m = Model::new();
        let vars: Vec<_> = (0..30).map(|i| m.new_bool_var(format!("x{i}"))).collect();
        // pigeonhole-flavored contradiction, expensive to refute
        let half = LinearExpr::sum(vars.iter().copied().take(15));
        let other = LinearExpr::sum(vars.iter().copied().skip(15));
        m.add_linear(8, half, 8);
        m.add_linear(8, other, 8);
        let all = LinearExpr::sum(vars.iter().copied());
        m.add_linear(0, all, 15);

        let s = BacktrackEngine::new().solve(&m, &SolveBudget::with_decisions(3), &[]);
        assert!(matches!(
            s.status,
            SolveStatus::Unknown | SolveStatus::Infeasible
        ));
        assert!(!s.is_solution_found());
    }

    #[test]
    fn test_contradictory_model_short_circuits() {
        let mut m = Model::new();
        let a = m.new_bool_var("a");
        m.fix(a, true);
        m.fix(a, false);
        let s = solve(&m);
        assert_eq!(s.status, SolveStatus::Infeasible);
        assert_eq!(s.decisions, 0);
    }
}
