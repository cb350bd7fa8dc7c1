use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::error::SolverError;
use crate::domain::instance::Instance;
use crate::domain::model::{Constraint, Model};
use crate::domain::session::Solution;
use crate::domain::statistics::Statistics;
use crate::domain::validate::WarmStart;

/// Called after every MIP round; it may change the model (for example by
/// adding violated constraints) and returns `true` to solve again.
pub type IterationCallback<'a> = &'a mut dyn FnMut(&mut Model) -> bool;

/// Common interface for MIP solver backends
///
/// A session starts unbound. `set_instance` binds a model; every other
/// model operation fails with [`SolverError::NotBound`] until then.
/// Changing the model invalidates the solution of the previous solve.
pub trait InternalSolver: Send + Sync {
    /// Bind `instance` and its `model`, replacing any previous binding
    fn set_instance(&mut self, instance: Arc<dyn Instance>, model: Model)
        -> Result<(), SolverError>;

    /// Bind `instance` using the model it builds itself
    fn load_instance(&mut self, instance: Arc<dyn Instance>) -> Result<(), SolverError> {
        let model = instance.to_model()?;
        self.set_instance(instance, model)
    }

    /// Stage a start for the next solve. Feasibility is left to the solve,
    /// which reports it through `Warm start value`.
    fn set_warm_start(&mut self, warm_start: &WarmStart) -> Result<(), SolverError>;

    fn clear_warm_start(&mut self);

    /// Fix the given variables for every later solve. Unset entries are skipped.
    fn fix(&mut self, assignment: &WarmStart) -> Result<(), SolverError>;

    fn add_constraint(&mut self, constraint: Constraint) -> Result<(), SolverError>;

    fn set_time_limit(&mut self, seconds: f64);

    fn set_threads(&mut self, threads: u32);

    fn set_node_limit(&mut self, nodes: u64);

    fn set_gap_tolerance(&mut self, gap: f64);

    /// Solve the MIP. The engine log is always captured into `Log`; with
    /// `tee` it is also mirrored to the process standard output.
    fn solve(&mut self, tee: bool) -> Result<Statistics, SolverError> {
        self.solve_with(tee, None)
    }

    /// Solve repeatedly while `iteration_cb` asks for another round.
    /// Wallclock time and log accumulate over rounds.
    fn solve_with(
        &mut self,
        tee: bool,
        iteration_cb: Option<IterationCallback<'_>>,
    ) -> Result<Statistics, SolverError>;

    /// Solve the continuous relaxation and store the relaxed values in the model.
    fn solve_lp(&mut self, tee: bool) -> Result<Statistics, SolverError>;

    fn get_solution(&self) -> Result<Solution, SolverError>;

    fn get_value(&self, group: &str, index: usize) -> Result<Option<f64>, SolverError>;

    fn get_variables(&self) -> Result<BTreeMap<String, Vec<usize>>, SolverError>;

    fn get_constraint_ids(&self) -> Vec<String>;

    /// The bound model, if any
    fn model(&self) -> Option<&Model>;

    /// Get the solver name for logging/debugging
    fn name(&self) -> &str;
}
