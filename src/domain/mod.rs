pub mod error;
pub mod instance;
pub mod model;
pub mod redirect;
pub mod session;
pub mod solver;
pub mod solver_factory;
pub mod solvers;
pub mod statistics;
pub mod validate;

pub use error::{NoSolution, SolverError};
pub use instance::Instance;
pub use model::{Constraint, Domain, LinExpr, Model, Objective, Sense, VarId, Variable};
pub use redirect::{redirect_output, CaptureBuffer, OutputRedirect, RedirectError, Sink};
pub use session::Solution;
pub use solver::{InternalSolver, IterationCallback};
pub use solver_factory::{create_solver, SolverOptions, SolverType};
pub use statistics::Statistics;
pub use validate::WarmStart;
