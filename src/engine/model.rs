//! Model definition: boolean variables, linear constraints, clauses.
//!
//! All decision variables are boolean; linear expressions are integer
//! combinations of them. Indicator ("only enforce if") constraints are
//! lowered to plain linear constraints with a big-M term computed from the
//! boolean bounds of the expression, so the solve surface stays exactly
//! variables + linear + clauses + objective.

use std::fmt;

/// Handle to a boolean decision variable.
///
/// Handles are dense indices allocated in creation order, which makes
/// variable identity reproducible across runs of the same build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoolVar(pub(crate) u32);

impl BoolVar {
    /// Positive literal for this variable.
    pub fn lit(self) -> Lit {
        Lit {
            var: self,
            positive: true,
        }
    }

    /// Negated literal for this variable.
    pub fn negated(self) -> Lit {
        Lit {
            var: self,
            positive: false,
        }
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A literal: a variable or its negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lit {
    pub(crate) var: BoolVar,
    pub(crate) positive: bool,
}

impl Lit {
    /// The underlying variable.
    pub fn var(self) -> BoolVar {
        self.var
    }

    /// Whether this is the positive literal.
    pub fn is_positive(self) -> bool {
        self.positive
    }

    /// The opposite literal.
    pub fn negate(self) -> Lit {
        Lit {
            var: self.var,
            positive: !self.positive,
        }
    }

    /// Truth value of the literal given the variable's value.
    pub fn eval(self, value: bool) -> bool {
        value == self.positive
    }
}

/// An integer linear expression over boolean variables.
#[derive(Debug, Clone, Default)]
pub struct LinearExpr {
    pub(crate) terms: Vec<(BoolVar, i64)>,
    pub(crate) constant: i64,
}

impl LinearExpr {
    /// The zero expression.
    pub fn new() -> Self {
        Self::default()
    }

    /// A single variable with coefficient 1.
    pub fn from_var(var: BoolVar) -> Self {
        let mut e = Self::new();
        e.add_var(var);
        e
    }

    /// Sum of variables, each with coefficient 1.
    pub fn sum(vars: impl IntoIterator<Item = BoolVar>) -> Self {
        let mut e = Self::new();
        for v in vars {
            e.add_var(v);
        }
        e
    }

    /// Adds `var` with coefficient 1.
    pub fn add_var(&mut self, var: BoolVar) {
        self.add_term(var, 1);
    }

    /// Adds `coefficient * var`.
    pub fn add_term(&mut self, var: BoolVar, coefficient: i64) {
        if coefficient != 0 {
            self.terms.push((var, coefficient));
        }
    }

    /// Adds a constant offset.
    pub fn add_constant(&mut self, value: i64) {
        self.constant += value;
    }

    /// Adds `weight * other` term-by-term.
    pub fn add_scaled(&mut self, other: &LinearExpr, weight: i64) {
        for &(var, coef) in &other.terms {
            self.add_term(var, coef * weight);
        }
        self.constant += other.constant * weight;
    }

    /// Smallest value the expression can take over boolean assignments.
    pub fn min_value(&self) -> i64 {
        self.constant + self.terms.iter().map(|&(_, c)| c.min(0)).sum::<i64>()
    }

    /// Largest value the expression can take over boolean assignments.
    pub fn max_value(&self) -> i64 {
        self.constant + self.terms.iter().map(|&(_, c)| c.max(0)).sum::<i64>()
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether the expression has no variable terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluates the expression under a complete valuation.
    pub fn eval(&self, values: &[bool]) -> i64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|&(v, c)| if values[v.index()] { c } else { 0 })
                .sum::<i64>()
    }
}

/// Optimization direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Minimize,
    Maximize,
}

/// A two-sided linear constraint `lb <= expr <= ub`.
#[derive(Debug, Clone)]
pub(crate) struct LinearConstraint {
    pub lb: i64,
    pub ub: i64,
    pub expr: LinearExpr,
}

/// The full boolean/linear model under construction.
///
/// Every builder call only appends; nothing is removed or rewritten, so
/// constraint emission order cannot change the model's semantics. Fixing a
/// variable both ways marks the model contradictory rather than panicking —
/// the engine then reports `Infeasible`.
#[derive(Debug, Default)]
pub struct Model {
    pub(crate) names: Vec<String>,
    pub(crate) fixed: Vec<Option<bool>>,
    pub(crate) clauses: Vec<Vec<Lit>>,
    pub(crate) linears: Vec<LinearConstraint>,
    pub(crate) objective: Option<(Direction, LinearExpr)>,
    pub(crate) contradiction: bool,
}

impl Model {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh boolean variable.
    pub fn new_bool_var(&mut self, name: impl Into<String>) -> BoolVar {
        let var = BoolVar(self.names.len() as u32);
        self.names.push(name.into());
        self.fixed.push(None);
        var
    }

    /// Fixes a variable to a constant value.
    ///
    /// Conflicting fixes make the model contradictory.
    pub fn fix(&mut self, var: BoolVar, value: bool) {
        match self.fixed[var.index()] {
            None => self.fixed[var.index()] = Some(value),
            Some(prev) if prev != value => self.contradiction = true,
            Some(_) => {}
        }
    }

    /// Adds `lb <= expr <= ub`.
    ///
    /// Use `i64::MIN` / `i64::MAX` for a one-sided bound.
    pub fn add_linear(&mut self, lb: i64, expr: LinearExpr, ub: i64) {
        if expr.is_empty() {
            if expr.constant < lb || expr.constant > ub {
                self.contradiction = true;
            }
            return;
        }
        self.linears.push(LinearConstraint { lb, ub, expr });
    }

    /// Adds a disjunction of literals.
    pub fn add_clause(&mut self, lits: Vec<Lit>) {
        if lits.is_empty() {
            self.contradiction = true;
            return;
        }
        self.clauses.push(lits);
    }

    /// Adds `a -> b`.
    pub fn add_implication(&mut self, a: Lit, b: Lit) {
        self.add_clause(vec![a.negate(), b]);
    }

    /// Adds `sum(vars) == 1`.
    pub fn add_exactly_one(&mut self, vars: impl IntoIterator<Item = BoolVar>) {
        self.add_linear(1, LinearExpr::sum(vars), 1);
    }

    /// Adds `lb <= expr <= ub`, enforced only when `lit` holds.
    ///
    /// Lowered with big-M terms sized from the expression's boolean bounds:
    /// when the literal is false the widened constraint is vacuous.
    pub fn add_linear_if(&mut self, lit: Lit, lb: i64, expr: LinearExpr, ub: i64) {
        if lb != i64::MIN {
            let slack = lb - expr.min_value();
            if slack > 0 {
                // expr + slack * (1 - lit) >= lb
                let mut widened = expr.clone();
                if lit.positive {
                    widened.add_term(lit.var, -slack);
                    widened.add_constant(slack);
                } else {
                    widened.add_term(lit.var, slack);
                }
                self.add_linear(lb, widened, i64::MAX);
            }
        }
        if ub != i64::MAX {
            let slack = expr.max_value() - ub;
            if slack > 0 {
                // expr - slack * (1 - lit) <= ub
                let mut widened = expr.clone();
                if lit.positive {
                    widened.add_term(lit.var, slack);
                    widened.add_constant(-slack);
                } else {
                    widened.add_term(lit.var, -slack);
                }
                self.add_linear(i64::MIN, widened, ub);
            }
        }
    }

    /// Constrains `aux` to be true iff at least one of `vars` is true.
    pub fn add_or_equality(&mut self, aux: BoolVar, vars: &[BoolVar]) {
        let mut long = vec![aux.negated()];
        for &v in vars {
            self.add_implication(v.lit(), aux.lit());
            long.push(v.lit());
        }
        self.add_clause(long);
    }

    /// Sets the objective, replacing any previous one.
    pub fn set_objective(&mut self, direction: Direction, expr: LinearExpr) {
        self.objective = Some((direction, expr));
    }

    /// Name of a variable (for diagnostics and hints).
    pub fn var_name(&self, var: BoolVar) -> &str {
        &self.names[var.index()]
    }

    /// Number of variables allocated so far.
    pub fn var_count(&self) -> usize {
        self.names.len()
    }

    /// Number of linear constraints.
    pub fn linear_count(&self) -> usize {
        self.linears.len()
    }

    /// Number of clauses.
    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }

    /// Whether builder calls have already proven the model unsatisfiable.
    pub fn is_contradiction(&self) -> bool {
        self.contradiction
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model: {} vars, {} linear, {} clauses",
            self.var_count(),
            self.linear_count(),
            self.clause_count()
        )
    }
}
