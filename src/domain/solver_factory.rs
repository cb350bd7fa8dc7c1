use crate::domain::solver::InternalSolver;
use crate::domain::solvers::HighsSolver;

#[cfg(feature = "gurobi-solver")]
use crate::domain::solvers::GurobiSolver;

/// Available solver backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverType {
    Highs,
    #[cfg(feature = "gurobi-solver")]
    Gurobi,
}

impl SolverType {
    /// Parse solver type from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "highs" => Some(SolverType::Highs),
            #[cfg(feature = "gurobi-solver")]
            "gurobi" => Some(SolverType::Gurobi),
            _ => None,
        }
    }

    /// Backends compiled into this build
    pub fn available() -> Vec<SolverType> {
        vec![
            SolverType::Highs,
            #[cfg(feature = "gurobi-solver")]
            SolverType::Gurobi,
        ]
    }

    /// Lowercase identifier accepted by [`SolverType::from_str`]
    pub fn key(&self) -> &'static str {
        match self {
            SolverType::Highs => "highs",
            #[cfg(feature = "gurobi-solver")]
            SolverType::Gurobi => "gurobi",
        }
    }
}

/// Construction options shared by every backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverOptions {
    pub use_lazy_callbacks: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            use_lazy_callbacks: true,
        }
    }
}

/// Create a solver instance based on the specified type
pub fn create_solver(solver_type: SolverType, options: &SolverOptions) -> Box<dyn InternalSolver> {
    match solver_type {
        SolverType::Highs => Box::new(HighsSolver::with_lazy_callbacks(options.use_lazy_callbacks)),
        #[cfg(feature = "gurobi-solver")]
        SolverType::Gurobi => {
            Box::new(GurobiSolver::with_lazy_callbacks(options.use_lazy_callbacks))
        }
    }
}
