use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use grb::prelude::*;
use log::debug;

use crate::domain::error::SolverError;
use crate::domain::instance::Instance;
use crate::domain::model::{Constraint, Domain, Model, Sense};
use crate::domain::redirect::{redirect_output, CaptureBuffer, Sink};
use crate::domain::session::{Session, Solution};
use crate::domain::solver::{InternalSolver, IterationCallback};
use crate::domain::solvers::{round_integral, solve_rounds, RunOutcome};
use crate::domain::statistics::{normalize_lp, RawReport, Statistics, GUROBI_PATTERNS};
use crate::domain::validate::WarmStart;

const NAME: &str = "Gurobi";

/// Gurobi solver implementation
pub struct GurobiSolver {
    session: Session,
    use_lazy_callbacks: bool,
}

/// What an engine run produced, read back before the redirect ends.
struct EngineResult {
    primal_bound: Option<f64>,
    dual_bound: Option<f64>,
    engine_time: Option<f64>,
    nodes: Option<u64>,
    values: Option<Vec<f64>>,
}

impl Default for GurobiSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl GurobiSolver {
    pub fn new() -> Self {
        Self::with_lazy_callbacks(true)
    }

    pub fn with_lazy_callbacks(use_lazy_callbacks: bool) -> Self {
        GurobiSolver {
            session: Session::new(),
            use_lazy_callbacks,
        }
    }

    pub fn uses_lazy_callbacks(&self) -> bool {
        self.use_lazy_callbacks
    }

    fn engine_err(context: &'static str) -> impl Fn(grb::Error) -> SolverError {
        move |e| SolverError::engine(NAME, format!("Failed to {}: {}", context, e))
    }

    fn create_env(session: &Session, use_lazy_callbacks: bool) -> Result<Env, SolverError> {
        let mut env = Env::new("").map_err(Self::engine_err("create Gurobi environment"))?;

        // The log has to reach stdout for the redirector to capture it.
        env.set(param::OutputFlag, 1)
            .map_err(Self::engine_err("set output flag"))?;
        env.set(param::LogToConsole, 1)
            .map_err(Self::engine_err("set console logging"))?;

        let params = session.params;
        if let Some(limit) = params.time_limit {
            env.set(param::TimeLimit, limit)
                .map_err(Self::engine_err("set time limit"))?;
        }
        if let Some(threads) = params.threads {
            env.set(param::Threads, threads.min(i32::MAX as u32) as i32)
                .map_err(Self::engine_err("set thread count"))?;
        }
        if let Some(nodes) = params.node_limit {
            env.set(param::NodeLimit, nodes as f64)
                .map_err(Self::engine_err("set node limit"))?;
        }
        if let Some(gap) = params.gap_tolerance {
            env.set(param::MIPGap, gap)
                .map_err(Self::engine_err("set gap tolerance"))?;
        }
        env.set(param::LazyConstraints, i32::from(use_lazy_callbacks))
            .map_err(Self::engine_err("set lazy constraints"))?;
        Ok(env)
    }

    fn build(
        env: &Env,
        model: &Model,
        relax: bool,
    ) -> Result<(grb::Model, Vec<Var>), SolverError> {
        let mut grb_model =
            grb::Model::with_env("internal", env).map_err(Self::engine_err("create model"))?;

        let mut vars: Vec<Var> = Vec::with_capacity(model.num_vars());
        for var in model.variables() {
            let name = var.name();
            let (lower, upper) = var.effective_bounds();
            let (lower, upper) = (to_grb_bound(lower), to_grb_bound(upper));
            let grb_var = match var.domain {
                _ if relax => add_ctsvar!(grb_model, name: &name, bounds: lower..upper),
                Domain::Binary if lower == 0.0 && upper == 1.0 => {
                    add_binvar!(grb_model, name: &name)
                }
                Domain::Binary | Domain::Integer => {
                    add_intvar!(grb_model, name: &name, bounds: lower..upper)
                }
                Domain::Continuous => add_ctsvar!(grb_model, name: &name, bounds: lower..upper),
            }
            .map_err(Self::engine_err("add variable"))?;
            vars.push(grb_var);
        }

        grb_model
            .update()
            .map_err(Self::engine_err("update model after adding variables"))?;

        for constraint in model.constraints() {
            let expr = constraint
                .expr
                .terms()
                .iter()
                .fold(Expr::Constant(0.0), |acc, &(var, coeff)| {
                    acc + coeff * vars[var.index()]
                });
            let (lower, upper) = constraint.row_bounds();
            if lower == upper {
                grb_model
                    .add_constr(&constraint.name, c!(expr == upper))
                    .map_err(Self::engine_err("add constraint"))?;
                continue;
            }
            if lower.is_finite() {
                grb_model
                    .add_constr(&format!("{}_lb", constraint.name), c!(expr.clone() >= lower))
                    .map_err(Self::engine_err("add constraint"))?;
            }
            if upper.is_finite() {
                grb_model
                    .add_constr(&constraint.name, c!(expr <= upper))
                    .map_err(Self::engine_err("add constraint"))?;
            }
        }

        if let Some(objective) = model.objective() {
            let obj_expr = objective
                .expr
                .terms()
                .iter()
                .fold(Expr::Constant(0.0), |acc, &(var, coeff)| {
                    acc + coeff * vars[var.index()]
                });
            let sense = match objective.sense {
                Sense::Max => ModelSense::Maximize,
                Sense::Min => ModelSense::Minimize,
            };
            grb_model
                .set_objective(obj_expr, sense)
                .map_err(Self::engine_err("set objective"))?;
        }

        grb_model
            .update()
            .map_err(Self::engine_err("update model after adding constraints"))?;
        Ok((grb_model, vars))
    }

    /// Build, optimize and read back; everything that may print runs here.
    fn optimize(
        session: &Session,
        use_lazy_callbacks: bool,
        relax: bool,
    ) -> Result<EngineResult, SolverError> {
        let model = session.model(if relax { "solve_lp" } else { "solve" })?;
        let env = Self::create_env(session, use_lazy_callbacks)?;
        let (mut grb_model, vars) = Self::build(&env, model, relax)?;

        if !relax {
            if let Some(start) = session.partial_start() {
                for (var, value) in vars.iter().zip(start) {
                    if let Some(value) = value {
                        grb_model
                            .set_obj_attr(attr::Start, var, *value)
                            .map_err(Self::engine_err("set start value"))?;
                    }
                }
            }
        }

        grb_model
            .optimize()
            .map_err(Self::engine_err("optimize"))?;
        let status = grb_model
            .status()
            .map_err(Self::engine_err("get model status"))?;
        debug!("{} finished with status {:?}", NAME, status);

        let sol_count = grb_model.get_attr(attr::SolCount).unwrap_or(0);
        let mut result = EngineResult {
            primal_bound: None,
            dual_bound: None,
            engine_time: grb_model.get_attr(attr::Runtime).ok(),
            nodes: None,
            values: None,
        };
        if sol_count > 0 {
            result.primal_bound = grb_model.get_attr(attr::ObjVal).ok();
            let mut values = Vec::with_capacity(vars.len());
            for var in &vars {
                values.push(
                    grb_model
                        .get_obj_attr(attr::X, var)
                        .map_err(Self::engine_err("read solution value"))?,
                );
            }
            if !relax {
                round_integral(model, &mut values);
            }
            result.values = Some(values);
        }
        if !relax {
            result.dual_bound = grb_model.get_attr(attr::ObjBound).ok();
            result.nodes = grb_model
                .get_attr(attr::NodeCount)
                .ok()
                .filter(|n: &f64| n.is_finite() && *n >= 0.0)
                .map(|n| n as u64);
        }
        Ok(result)
    }

    fn run(
        session: &Session,
        use_lazy_callbacks: bool,
        relax: bool,
        tee: bool,
    ) -> Result<RunOutcome, SolverError> {
        let objective = session
            .model(if relax { "solve_lp" } else { "solve" })?
            .objective()
            .ok_or_else(|| SolverError::model("objective", "model has no objective"))?;

        let buffer = CaptureBuffer::new();
        let mut sinks = vec![Sink::buffer(&buffer)];
        if tee {
            sinks.push(Sink::Stdout);
        }
        let started = Instant::now();
        let result =
            redirect_output(sinks, || Self::optimize(session, use_lazy_callbacks, relax))??;

        let mut report = RawReport::new(objective.sense);
        report.measured_time = started.elapsed().as_secs_f64();
        report.engine_time = result.engine_time;
        report.primal_bound = result.primal_bound;
        report.dual_bound = result.dual_bound;
        report.nodes = result.nodes;
        report.log = buffer.contents();
        report.objective_offset = objective.expr.constant();

        Ok(RunOutcome {
            report,
            values: result.values,
        })
    }
}

impl InternalSolver for GurobiSolver {
    fn set_instance(
        &mut self,
        instance: Arc<dyn Instance>,
        model: Model,
    ) -> Result<(), SolverError> {
        self.session.bind(instance, model)
    }

    fn set_warm_start(&mut self, warm_start: &WarmStart) -> Result<(), SolverError> {
        self.session.stage_warm_start(warm_start)
    }

    fn clear_warm_start(&mut self) {
        self.session.clear_warm_start();
    }

    fn fix(&mut self, assignment: &WarmStart) -> Result<(), SolverError> {
        self.session.fix(assignment)
    }

    fn add_constraint(&mut self, constraint: Constraint) -> Result<(), SolverError> {
        self.session.add_constraint(constraint)
    }

    fn set_time_limit(&mut self, seconds: f64) {
        self.session.params.time_limit = Some(seconds);
    }

    fn set_threads(&mut self, threads: u32) {
        self.session.params.threads = Some(threads);
    }

    fn set_node_limit(&mut self, nodes: u64) {
        self.session.params.node_limit = Some(nodes);
    }

    fn set_gap_tolerance(&mut self, gap: f64) {
        self.session.params.gap_tolerance = Some(gap);
    }

    fn solve_with(
        &mut self,
        tee: bool,
        iteration_cb: Option<IterationCallback<'_>>,
    ) -> Result<Statistics, SolverError> {
        let use_lazy_callbacks = self.use_lazy_callbacks;
        solve_rounds(&mut self.session, iteration_cb, &GUROBI_PATTERNS, |session| {
            Self::run(session, use_lazy_callbacks, false, tee)
        })
    }

    fn solve_lp(&mut self, tee: bool) -> Result<Statistics, SolverError> {
        debug!("Solving LP relaxation...");
        let RunOutcome { report, values } =
            Self::run(&self.session, self.use_lazy_callbacks, true, tee)?;
        self.session.record(values);
        Ok(normalize_lp(report))
    }

    fn get_solution(&self) -> Result<Solution, SolverError> {
        self.session.solution()
    }

    fn get_value(&self, group: &str, index: usize) -> Result<Option<f64>, SolverError> {
        self.session.value(group, index)
    }

    fn get_variables(&self) -> Result<BTreeMap<String, Vec<usize>>, SolverError> {
        self.session.variables()
    }

    fn get_constraint_ids(&self) -> Vec<String> {
        self.session.constraint_ids()
    }

    fn model(&self) -> Option<&Model> {
        self.session.bound_model()
    }

    fn name(&self) -> &str {
        NAME
    }
}

fn to_grb_bound(value: f64) -> f64 {
    if value.is_infinite() {
        value.signum() * grb::INFINITY
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_and_lazy_flag() {
        let solver = GurobiSolver::new();
        assert_eq!(solver.name(), "Gurobi");
        assert!(solver.uses_lazy_callbacks());
        assert!(!GurobiSolver::with_lazy_callbacks(false).uses_lazy_callbacks());
    }

    #[test]
    fn test_to_grb_bound_maps_infinities() {
        assert_eq!(to_grb_bound(f64::INFINITY), grb::INFINITY);
        assert_eq!(to_grb_bound(f64::NEG_INFINITY), -grb::INFINITY);
        assert_eq!(to_grb_bound(3.5), 3.5);
    }
}
