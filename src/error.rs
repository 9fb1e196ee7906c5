//! Error taxonomy.
//!
//! Two families: [`ConfigError`] covers everything that can go wrong while
//! translating a declarative schedule description into a model (unknown
//! names, inverted bounds, malformed parameters) and is always raised
//! before any solve attempt. [`SolveError`] covers failures of or after the
//! solve call itself. An exhausted time budget is *not* an error: the
//! engine reports the best incumbent as `Feasible`.

use thiserror::Error;

/// A configuration-translation failure.
///
/// Raised while compiling constraint specifications into model terms,
/// never during or after solving.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A constraint references a rotation not declared in the roster.
    #[error("unknown rotation '{0}'")]
    UnknownRotation(String),

    /// A constraint references a resident not declared in the roster.
    #[error("unknown resident '{0}'")]
    UnknownResident(String),

    /// A constraint references a block not declared in the roster.
    #[error("unknown block '{0}'")]
    UnknownBlock(String),

    /// A group name resolved to no members.
    #[error("group '{0}' resolved to no members")]
    UnknownGroup(String),

    /// An identifier in a logical expression matched nothing.
    #[error("'{0}' is not a block, rotation, resident, or group")]
    UnknownName(String),

    /// A `[min, max]` bound with min > max.
    #[error("on {entity}: min {min} > max {max}")]
    InvertedBounds {
        entity: String,
        min: i64,
        max: i64,
    },

    /// Coverage declared both `allowed_values` and `[min, max]`.
    #[error("rotation '{0}': coverage cannot declare both allowed_values and min/max bounds")]
    AmbiguousCoverage(String),

    /// Two constraints that cannot be combined on one rotation.
    #[error("rotation '{rotation}': {reason}")]
    IncompatibleConstraints { rotation: String, reason: String },

    /// A logical expression failed to parse.
    #[error("expression '{input}': {reason}")]
    ExpressionParse { input: String, reason: String },

    /// Any other malformed parameter set.
    #[error("{0}")]
    Malformed(String),
}

/// A failure of the solve step or of solution extraction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SolveError {
    /// The engine proved that no satisfying assignment exists.
    ///
    /// `suspects` lists the hard constraints that were compiled into the
    /// model, as a starting point for relaxing the configuration.
    #[error("model is infeasible ({} hard constraints active)", suspects.len())]
    Infeasible { suspects: Vec<String> },

    /// The budget ran out before any feasible assignment was found.
    ///
    /// Unlike a timeout with an incumbent (which yields `Feasible`), this
    /// carries no usable result.
    #[error("no solution found within the solve budget")]
    NoSolution,

    /// The engine returned a valuation violating the exactly-one
    /// invariant. This is an engine-contract breach, not a user error.
    #[error("extraction invariant violated for resident '{resident}' block '{block}': {true_count} assignments true")]
    ExtractionInvariant {
        resident: String,
        block: String,
        true_count: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let e = ConfigError::InvertedBounds {
            entity: "ICU coverage".into(),
            min: 3,
            max: 1,
        };
        assert_eq!(e.to_string(), "on ICU coverage: min 3 > max 1");
    }

    #[test]
    fn test_solve_error_display() {
        let e = SolveError::Infeasible {
            suspects: vec!["coverage ICU [1,1]".into()],
        };
        assert!(e.to_string().contains("1 hard constraints"));
    }
}
