//! Boolean/linear optimization engine surface.
//!
//! The scheduling core never talks to a solver directly; it assembles a
//! [`Model`] through the builder calls on this module's types and hands it
//! to any implementation of the [`Solve`] trait. This is the same shape as
//! consuming an external CP-SAT service: variables, linear constraints,
//! clauses, one objective, one blocking solve call with a budget.
//!
//! [`BacktrackEngine`] is the bundled reference implementation — a
//! deterministic DFS with unit propagation and branch-and-bound. It is a
//! real engine, not a mock, but it is tuned for the model sizes the test
//! suite builds, not for production rosters.

mod model;
mod solver;

pub use model::{BoolVar, Direction, LinearExpr, Lit, Model};
pub use solver::{BacktrackEngine, Solution, Solve, SolveBudget, SolveStatus};
