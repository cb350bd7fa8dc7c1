#![allow(dead_code)]

use std::collections::BTreeMap;

use mip_bridge::domain::solver_factory::{create_solver, SolverOptions, SolverType};
use mip_bridge::domain::validate::WarmStart;
use mip_bridge::domain::InternalSolver;
use mip_bridge::problems::KnapsackInstance;

/// Four items, capacity 67. MIP optimum 1183 at x = [1, 0, 1, 1];
/// LP optimum 1287.923 at x = [1, 0.923, 1, 0].
pub fn knapsack() -> KnapsackInstance {
    KnapsackInstance::new(
        vec![23.0, 26.0, 20.0, 18.0],
        vec![505.0, 352.0, 458.0, 220.0],
        67.0,
    )
}

/// Assignment for group `x`, one value per index
pub fn assignment(values: &[f64]) -> WarmStart {
    let mut warm_start = WarmStart::new();
    warm_start.insert(
        "x".to_string(),
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (i, Some(*v)))
            .collect::<BTreeMap<_, _>>(),
    );
    warm_start
}

/// One fresh solver per backend compiled into this build
pub fn solvers(options: SolverOptions) -> Vec<Box<dyn InternalSolver>> {
    SolverType::available()
        .into_iter()
        .map(|solver_type| create_solver(solver_type, &options))
        .collect()
}
