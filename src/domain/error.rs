use std::fmt;

use thiserror::Error;

use crate::domain::redirect::RedirectError;

/// Why `get_solution` has nothing to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoSolution {
    /// No solve has run since the instance was bound.
    NeverSolved,
    /// The latest solve finished without a feasible point.
    Infeasible,
    /// The model changed after the latest solve.
    Invalidated,
}

impl fmt::Display for NoSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoSolution::NeverSolved => write!(f, "model has never been solved"),
            NoSolution::Infeasible => write!(f, "latest solve found no feasible solution"),
            NoSolution::Invalidated => write!(f, "model was modified after the latest solve"),
        }
    }
}

/// Errors raised by the internal solver layer
#[derive(Error, Debug)]
pub enum SolverError {
    /// Output redirection could not be set up or torn down
    #[error("output redirection failed: {0}")]
    Setup(#[from] RedirectError),

    /// The model, or something added to it, is malformed
    #[error("invalid {construct}: {details}")]
    ModelError { construct: String, details: String },

    #[error("no solution available: {0}")]
    NoSolutionAvailable(NoSolution),

    /// An operation that needs a bound instance was called before `set_instance`
    #[error("{operation} requires an instance; call set_instance first")]
    NotBound { operation: &'static str },

    /// The engine rejected a call after the model was accepted
    #[error("{solver} failed: {details}")]
    Engine { solver: &'static str, details: String },
}

impl SolverError {
    pub fn model(construct: impl Into<String>, details: impl Into<String>) -> Self {
        SolverError::ModelError {
            construct: construct.into(),
            details: details.into(),
        }
    }

    pub fn engine(solver: &'static str, details: impl Into<String>) -> Self {
        SolverError::Engine {
            solver,
            details: details.into(),
        }
    }
}
