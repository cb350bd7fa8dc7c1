use std::collections::BTreeMap;
use std::ffi::{c_void, CString};
use std::sync::Arc;
use std::time::Instant;

use ::highs::{Col, HighsModelStatus, RowProblem, Sense as HighsSense};
use log::{debug, warn};

use crate::domain::error::SolverError;
use crate::domain::instance::Instance;
use crate::domain::model::{Constraint, Model, Sense};
use crate::domain::redirect::{redirect_output, CaptureBuffer, Sink};
use crate::domain::session::{Session, SolveParams, Solution};
use crate::domain::solver::{InternalSolver, IterationCallback};
use crate::domain::solvers::{round_integral, solve_rounds, RunOutcome};
use crate::domain::statistics::{normalize_lp, RawReport, Statistics, HIGHS_PATTERNS};
use crate::domain::validate::WarmStart;

const NAME: &str = "HiGHS";

/// `primal_solution_status` value meaning a feasible point is available
const SOLUTION_STATUS_FEASIBLE: i64 = 2;

/// HiGHS solver implementation
pub struct HighsSolver {
    session: Session,
    use_lazy_callbacks: bool,
}

impl Default for HighsSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl HighsSolver {
    pub fn new() -> Self {
        Self::with_lazy_callbacks(true)
    }

    /// With lazy callbacks enabled, branch-and-bound restarts are turned off
    /// so rows added during search stay in the model.
    pub fn with_lazy_callbacks(use_lazy_callbacks: bool) -> Self {
        HighsSolver {
            session: Session::new(),
            use_lazy_callbacks,
        }
    }

    pub fn uses_lazy_callbacks(&self) -> bool {
        self.use_lazy_callbacks
    }

    fn build_problem(model: &Model, relax: bool) -> RowProblem {
        let mut problem = RowProblem::default();

        let mut costs = vec![0.0; model.num_vars()];
        if let Some(objective) = model.objective() {
            for (var, coeff) in objective.expr.terms() {
                costs[var.index()] += coeff;
            }
        }

        let columns: Vec<Col> = model
            .variables()
            .iter()
            .zip(&costs)
            .map(|(var, &cost)| {
                let (lower, upper) = var.effective_bounds();
                if var.domain.is_integral() && !relax {
                    problem.add_integer_column(cost, lower..=upper)
                } else {
                    problem.add_column(cost, lower..=upper)
                }
            })
            .collect();

        for constraint in model.constraints() {
            // HiGHS rejects repeated column indices within a row.
            let mut merged: BTreeMap<usize, f64> = BTreeMap::new();
            for (var, coeff) in constraint.expr.terms() {
                *merged.entry(var.index()).or_insert(0.0) += coeff;
            }
            let factors: Vec<(Col, f64)> = merged
                .into_iter()
                .map(|(index, coeff)| (columns[index], coeff))
                .collect();
            let (lower, upper) = constraint.row_bounds();
            problem.add_row(lower..=upper, factors);
        }

        problem
    }

    fn configure(
        highs: &mut ::highs::Model,
        params: SolveParams,
        use_lazy_callbacks: bool,
        relax: bool,
    ) {
        // The log has to reach stdout for the redirector to capture it.
        highs.set_option("output_flag", true);
        highs.set_option("log_to_console", true);

        if let Some(limit) = params.time_limit {
            highs.set_option("time_limit", limit);
        }
        if let Some(threads) = params.threads {
            highs.set_option("threads", threads.min(i32::MAX as u32) as i32);
        }
        if relax {
            return;
        }
        if let Some(nodes) = params.node_limit {
            highs.set_option("mip_max_nodes", nodes.min(i32::MAX as u64) as i32);
        }
        if let Some(gap) = params.gap_tolerance {
            highs.set_option("mip_rel_gap", gap);
        }
        if use_lazy_callbacks {
            highs.set_option("mip_allow_restart", false);
        }
    }

    fn run(
        session: &Session,
        use_lazy_callbacks: bool,
        relax: bool,
        tee: bool,
    ) -> Result<RunOutcome, SolverError> {
        let model = session.model(if relax { "solve_lp" } else { "solve" })?;
        let objective = model
            .objective()
            .ok_or_else(|| SolverError::model("objective", "model has no objective"))?;
        let sense = objective.sense;

        let problem = Self::build_problem(model, relax);
        let mut highs = problem.optimise(match sense {
            Sense::Max => HighsSense::Maximise,
            Sense::Min => HighsSense::Minimise,
        });
        Self::configure(&mut highs, session.params, use_lazy_callbacks, relax);

        let (start_entries, start_score) = if relax {
            (Vec::new(), None)
        } else {
            (session.start_entries(), session.score_warm_start())
        };

        let buffer = CaptureBuffer::new();
        let mut sinks = vec![Sink::buffer(&buffer)];
        if tee {
            sinks.push(Sink::Stdout);
        }
        let started = Instant::now();
        // HiGHS reports a rejected start on stdout.
        let (warm_start_value, solved) = redirect_output(sinks, move || {
            let warm_start_value = offer_warm_start(&mut highs, &start_entries, start_score);
            (warm_start_value, highs.try_solve())
        })?;
        let solved = solved.map_err(|status| {
            SolverError::engine(NAME, format!("run failed with status {:?}", status))
        })?;
        let measured_time = started.elapsed().as_secs_f64();

        let status = solved.status();
        debug!("{} finished with status {:?}", NAME, status);
        let ptr = solved.as_ptr();
        let has_incumbent =
            int_info(ptr, "primal_solution_status") == Some(SOLUTION_STATUS_FEASIBLE);

        let mut report = RawReport::new(sense);
        report.measured_time = measured_time;
        report.engine_time = Some(unsafe { highs_sys::Highs_getRunTime(ptr) });
        report.log = buffer.contents();
        report.objective_offset = objective.expr.constant();
        report.warm_start_value = warm_start_value;

        let mut values = None;
        if has_incumbent {
            report.primal_bound = Some(solved.objective_value());
            let mut columns = solved.get_solution().columns().to_vec();
            if !relax {
                round_integral(model, &mut columns);
            }
            values = Some(columns);
        }
        if !relax {
            report.nodes = int64_info(ptr, "mip_node_count")
                .filter(|n| *n >= 0)
                .map(|n| n as u64);
            report.dual_bound = double_info(ptr, "mip_dual_bound")
                .filter(|v| v.is_finite())
                .or(match status {
                    // an optimal incumbent is its own dual bound
                    HighsModelStatus::Optimal => report.primal_bound,
                    _ => None,
                });
        }

        Ok(RunOutcome { report, values })
    }
}

impl InternalSolver for HighsSolver {
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
        solve_rounds(&mut self.session, iteration_cb, &HIGHS_PATTERNS, |session| {
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

/// Offer a full or partial start to HiGHS. Returns the value to report
/// for it, which is `scored` only when the engine accepted the start.
fn offer_warm_start(
    highs: &mut ::highs::Model,
    entries: &[(usize, f64)],
    scored: Option<f64>,
) -> Option<f64> {
    if entries.is_empty() {
        return None;
    }
    match set_sparse_solution(highs, entries) {
        Ok(()) => {
            debug!("Offered {} start values to {}", entries.len(), NAME);
            scored
        }
        Err(status) => {
            warn!(
                "{} rejected the warm start (status {}); continuing without it",
                NAME, status
            );
            None
        }
    }
}

fn set_sparse_solution(
    highs: &mut ::highs::Model,
    entries: &[(usize, f64)],
) -> Result<(), highs_sys::HighsInt> {
    let mut index = Vec::with_capacity(entries.len());
    let mut value = Vec::with_capacity(entries.len());
    for &(column, v) in entries {
        index.push(
            highs_sys::HighsInt::try_from(column).map_err(|_| highs_sys::STATUS_ERROR)?,
        );
        value.push(v);
    }
    let count = highs_sys::HighsInt::try_from(index.len()).map_err(|_| highs_sys::STATUS_ERROR)?;
    let status = unsafe {
        highs_sys::Highs_setSparseSolution(
            highs.as_mut_ptr(),
            count,
            index.as_ptr(),
            value.as_ptr(),
        )
    };
    if status == highs_sys::STATUS_ERROR {
        Err(status)
    } else {
        Ok(())
    }
}

fn int_info(highs: *const c_void, name: &str) -> Option<i64> {
    let c_name = CString::new(name).ok()?;
    let mut value: highs_sys::HighsInt = 0;
    let status = unsafe { highs_sys::Highs_getIntInfoValue(highs, c_name.as_ptr(), &mut value) };
    (status == highs_sys::STATUS_OK).then_some(value as i64)
}

fn int64_info(highs: *const c_void, name: &str) -> Option<i64> {
    let c_name = CString::new(name).ok()?;
    let mut value: i64 = 0;
    let status =
        unsafe { highs_sys::Highs_getInt64InfoValue(highs, c_name.as_ptr(), &mut value) };
    (status == highs_sys::STATUS_OK).then_some(value)
}

fn double_info(highs: *const c_void, name: &str) -> Option<f64> {
    let c_name = CString::new(name).ok()?;
    let mut value: f64 = 0.0;
    let status =
        unsafe { highs_sys::Highs_getDoubleInfoValue(highs, c_name.as_ptr(), &mut value) };
    (status == highs_sys::STATUS_OK).then_some(value)
}
