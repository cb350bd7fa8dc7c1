pub mod highs_solver;

#[cfg(feature = "gurobi-solver")]
pub mod gurobi_solver;

pub use highs_solver::HighsSolver;

#[cfg(feature = "gurobi-solver")]
pub use gurobi_solver::GurobiSolver;

use log::debug;

use crate::domain::error::SolverError;
use crate::domain::model::Model;
use crate::domain::session::Session;
use crate::domain::solver::IterationCallback;
use crate::domain::statistics::{normalize_mip, LogPatterns, RawReport, Statistics};

/// Result of one engine run
pub(crate) struct RunOutcome {
    pub report: RawReport,
    pub values: Option<Vec<f64>>,
}

/// Run MIP rounds until `iteration_cb` declines another one. Logs and
/// engine times of all rounds are summed into the final statistics.
pub(crate) fn solve_rounds<F>(
    session: &mut Session,
    mut iteration_cb: Option<IterationCallback<'_>>,
    patterns: &LogPatterns,
    mut run: F,
) -> Result<Statistics, SolverError>
where
    F: FnMut(&Session) -> Result<RunOutcome, SolverError>,
{
    let mut log = String::new();
    let mut wallclock = 0.0;
    let mut round = 1;
    loop {
        debug!(
            "Solving MIP for {} (round {})...",
            session.instance_name().unwrap_or("unbound model"),
            round
        );
        let RunOutcome { mut report, values } = run(session)?;
        log.push_str(&report.log);
        wallclock += report
            .engine_time
            .filter(|t| t.is_finite() && *t >= 0.0)
            .unwrap_or(report.measured_time);
        session.record(values);

        let repeat = match iteration_cb.as_mut() {
            Some(cb) => cb(session.model_mut("solve")?),
            None => false,
        };
        if repeat {
            session.invalidate();
            round += 1;
            continue;
        }

        report.log = log;
        report.engine_time = Some(wallclock);
        report.measured_time = wallclock;
        return Ok(normalize_mip(report, patterns));
    }
}

/// Snap integer variables the engine returned within tolerance of an integer.
pub(crate) fn round_integral(model: &Model, values: &mut [f64]) {
    for (var, value) in model.variables().iter().zip(values.iter_mut()) {
        if var.domain.is_integral() && (*value - value.round()).abs() <= 1e-6 {
            *value = value.round();
        }
    }
}
