//! Rotation schedule assignment for residency programs.
//!
//! Translates a declarative YAML description of residents, rotations, and
//! blocks into a boolean optimization model, solves it, and extracts a
//! per-resident schedule. The model is a grid of assignment variables
//! (one per resident, block, and rotation) with exactly one rotation per
//! resident per block; every constraint kind lowers onto that grid as
//! linear bounds and clauses.
//!
//! # Modules
//!
//! - **`config`**: YAML document surface and translation into a `Problem`
//! - **`models`**: Domain types: `Resident`, `Rotation`, `Block`, `Roster`
//! - **`constraints`**: Constraint vocabulary and model lowering
//! - **`expr`**: Boolean cell expressions (`"ICU and Block 2"`)
//! - **`objective`**: Rank-derived score tables and objective composition
//! - **`grid`**: Assignment, vacation, and backup variable grids
//! - **`engine`**: Boolean/linear model and the backtracking solver
//! - **`solve`**: Build, solve, warm-start hints, schedule extraction
//! - **`validation`**: Whole-document integrity checks
//!
//! # Usage
//!
//! ```no_run
//! use rotasched::{BacktrackEngine, Config, ObjectiveStrategy, SolveBudget};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let yaml = std::fs::read_to_string("schedule.yaml")?;
//! let problem = Config::from_yaml(&yaml)?.into_problem()?;
//! let built = rotasched::build_model(problem, &ObjectiveStrategy::RankSum)?;
//! let solved = built.solve(&BacktrackEngine::new(), &SolveBudget::with_time_ms(30_000))?;
//! let result = solved.extract()?;
//! print!("{}", result.to_delimited());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constraints;
pub mod engine;
pub mod error;
pub mod expr;
pub mod grid;
pub mod models;
pub mod objective;
pub mod solve;
pub mod validation;

pub use config::{Config, Problem};
pub use constraints::{ConstraintSpec, CoverageBounds, PoolSpec};
pub use engine::{
    BacktrackEngine, Direction, LinearExpr, Model, Solution, Solve, SolveBudget, SolveStatus,
};
pub use error::{ConfigError, SolveError};
pub use grid::{VarKey, VariableGrid};
pub use models::{Block, Resident, Rotation, Roster};
pub use objective::{ObjectiveStrategy, ScoreTable};
pub use solve::{build_model, BuiltModel, HintStore, ScheduleResult, SolvedModel};
pub use validation::{validate_config, ValidationError, ValidationErrorKind, ValidationResult};
