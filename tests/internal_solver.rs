mod common;

use std::sync::Arc;

use approx::assert_relative_eq;
use serial_test::serial;

use mip_bridge::domain::error::{NoSolution, SolverError};
use mip_bridge::domain::model::{Constraint, LinExpr, Sense};
use mip_bridge::domain::solver_factory::SolverOptions;
use mip_bridge::domain::Instance;
use mip_bridge::problems::ChallengeA;

use common::{assignment, knapsack, solvers};

#[test]
#[serial]
fn test_internal_solver_warm_starts() {
    for mut solver in solvers(SolverOptions::default()) {
        let instance = Arc::new(knapsack());
        let model = instance.to_model().unwrap();
        solver.set_instance(instance, model).unwrap();

        solver
            .set_warm_start(&assignment(&[1.0, 0.0, 0.0, 1.0]))
            .unwrap();
        let stats = solver.solve(false).unwrap();
        assert_eq!(
            stats.warm_start_value,
            Some(725.0),
            "{} feasible warm start",
            solver.name()
        );

        solver
            .set_warm_start(&assignment(&[1.0, 1.0, 1.0, 1.0]))
            .unwrap();
        let stats = solver.solve(false).unwrap();
        assert_eq!(
            stats.warm_start_value,
            None,
            "{} infeasible warm start",
            solver.name()
        );

        solver.fix(&assignment(&[1.0, 0.0, 0.0, 1.0])).unwrap();
        let stats = solver.solve(false).unwrap();
        assert_relative_eq!(stats.lower_bound.unwrap(), 725.0, epsilon = 1e-6);
        assert_relative_eq!(stats.upper_bound.unwrap(), 725.0, epsilon = 1e-6);
    }
}

#[test]
#[serial]
fn test_internal_solver() {
    for mut solver in solvers(SolverOptions::default()) {
        solver.load_instance(Arc::new(knapsack())).unwrap();

        let stats = solver.solve(false).unwrap();
        assert!(stats.log.len() > 100, "{} log too short", solver.name());
        assert_relative_eq!(stats.lower_bound.unwrap(), 1183.0, epsilon = 1e-6);
        assert_relative_eq!(stats.upper_bound.unwrap(), 1183.0, epsilon = 1e-6);
        assert_eq!(stats.sense, Sense::Max);
        assert!(stats.wallclock_time >= 0.0);
        assert!(stats.nodes.unwrap() >= 1);
        assert_eq!(stats.optimal_value, None);

        let solution = solver.get_solution().unwrap();
        assert_eq!(solution["x"][&0], 1.0);
        assert_eq!(solution["x"][&1], 0.0);
        assert_eq!(solution["x"][&2], 1.0);
        assert_eq!(solution["x"][&3], 1.0);

        let stats = solver.solve_lp(false).unwrap();
        assert_relative_eq!(stats.optimal_value.unwrap(), 1287.923, epsilon = 1e-3);
        assert_eq!(stats.nodes, None);

        let solution = solver.get_solution().unwrap();
        assert_relative_eq!(solution["x"][&0], 1.0, epsilon = 1e-3);
        assert_relative_eq!(solution["x"][&1], 0.923, epsilon = 1e-3);
        assert_relative_eq!(solution["x"][&2], 1.0, epsilon = 1e-3);
        assert_relative_eq!(solution["x"][&3], 0.0, epsilon = 1e-3);

        let x0 = solver.model().unwrap().var("x", 0).unwrap();
        solver
            .add_constraint(Constraint::le("cut", LinExpr::new().term(x0, 1.0), 0.5))
            .unwrap();
        assert!(matches!(
            solver.get_solution(),
            Err(SolverError::NoSolutionAvailable(NoSolution::Invalidated))
        ));
        solver.solve_lp(false).unwrap();
        assert_relative_eq!(
            solver.model().unwrap().var_value("x", 0).unwrap(),
            0.5,
            epsilon = 1e-6
        );
        assert_eq!(solver.get_constraint_ids(), vec!["eq_capacity", "cut"]);
    }
}

#[test]
#[serial]
fn test_node_count() {
    let challenge = ChallengeA::new(42, 0, 1);
    let instance = Arc::new(challenge.test_instances[0].clone());
    for use_lazy_callbacks in [true, false] {
        for mut solver in solvers(SolverOptions { use_lazy_callbacks }) {
            solver.set_time_limit(10.0);
            solver.load_instance(instance.clone()).unwrap();
            let stats = solver.solve(false).unwrap();
            let (lower, upper) = (stats.lower_bound.unwrap(), stats.upper_bound.unwrap());
            assert!(
                lower <= upper + 1e-6,
                "{} reported lower bound {} above upper bound {}",
                solver.name(),
                lower,
                upper
            );
            assert!(
                stats.nodes.unwrap() > 1,
                "{} (lazy callbacks: {}) explored {:?} nodes",
                solver.name(),
                use_lazy_callbacks,
                stats.nodes
            );
        }
    }
}

#[test]
#[serial]
fn test_get_solution_before_solve() {
    for mut solver in solvers(SolverOptions::default()) {
        assert!(matches!(
            solver.get_solution(),
            Err(SolverError::NotBound { .. })
        ));
        solver.load_instance(Arc::new(knapsack())).unwrap();
        assert!(matches!(
            solver.get_solution(),
            Err(SolverError::NoSolutionAvailable(NoSolution::NeverSolved))
        ));
    }
}

#[test]
#[serial]
fn test_fixed_variables_are_left_out_of_solution() {
    for mut solver in solvers(SolverOptions::default()) {
        solver.load_instance(Arc::new(knapsack())).unwrap();
        let mut fix = assignment(&[0.0]);
        fix.get_mut("x").unwrap().insert(1, None);
        solver.fix(&fix).unwrap();

        let stats = solver.solve(false).unwrap();
        // Without item 0 the best is items 1, 2 and 3.
        assert_relative_eq!(stats.lower_bound.unwrap(), 1030.0, epsilon = 1e-6);

        let solution = solver.get_solution().unwrap();
        assert!(!solution["x"].contains_key(&0));
        assert_eq!(solution["x"].len(), 3);
        assert_eq!(solver.get_variables().unwrap()["x"], vec![1, 2, 3]);
        assert_eq!(solver.get_value("x", 0).unwrap(), Some(0.0));
    }
}

#[test]
#[serial]
fn test_infeasible_model_reports_no_solution() {
    for mut solver in solvers(SolverOptions::default()) {
        solver.load_instance(Arc::new(knapsack())).unwrap();
        let x0 = solver.model().unwrap().var("x", 0).unwrap();
        solver
            .add_constraint(Constraint::ge("impossible", LinExpr::new().term(x0, 1.0), 2.0))
            .unwrap();

        let stats = solver.solve(false).unwrap();
        assert_eq!(stats.lower_bound, None);
        assert!(matches!(
            solver.get_solution(),
            Err(SolverError::NoSolutionAvailable(NoSolution::Infeasible))
        ));
    }
}

#[test]
#[serial]
fn test_partial_warm_start() {
    for mut solver in solvers(SolverOptions::default()) {
        solver.load_instance(Arc::new(knapsack())).unwrap();
        let mut warm_start = assignment(&[1.0]);
        warm_start.get_mut("x").unwrap().insert(3, Some(1.0));
        solver.set_warm_start(&warm_start).unwrap();

        let stats = solver.solve(false).unwrap();
        assert_relative_eq!(stats.lower_bound.unwrap(), 1183.0, epsilon = 1e-6);
        // A value is only reported for a start the engine completed itself.
        if let Some(value) = stats.warm_start_value {
            assert!(value <= 1183.0 + 1e-6, "{} warm start value {}", solver.name(), value);
        }
    }
}

#[test]
#[serial]
fn test_relaxation_after_partial_fixing_bounds_mip_optimum() {
    for mut solver in solvers(SolverOptions::default()) {
        solver.load_instance(Arc::new(knapsack())).unwrap();
        let mip = solver.solve(false).unwrap().lower_bound.unwrap();

        let mut fix = assignment(&[]);
        fix.get_mut("x").unwrap().insert(2, Some(1.0));
        solver.fix(&fix).unwrap();
        let lp = solver.solve_lp(false).unwrap().optimal_value.unwrap();
        assert!(
            lp >= mip - 1e-6,
            "{} relaxation {} below MIP optimum {}",
            solver.name(),
            lp,
            mip
        );
        assert_relative_eq!(lp, 1287.923, epsilon = 1e-3);
    }
}

#[test]
#[serial]
fn test_tee_still_captures_log() {
    for mut solver in solvers(SolverOptions::default()) {
        solver.load_instance(Arc::new(knapsack())).unwrap();

        let stats = solver.solve(true).unwrap();
        assert!(stats.log.len() > 100, "{} log too short", solver.name());
        assert_relative_eq!(stats.lower_bound.unwrap(), 1183.0, epsilon = 1e-6);
        assert_relative_eq!(stats.upper_bound.unwrap(), 1183.0, epsilon = 1e-6);

        let stats = solver.solve_lp(true).unwrap();
        assert!(!stats.log.is_empty());
        assert_relative_eq!(stats.optimal_value.unwrap(), 1287.923, epsilon = 1e-3);
    }
}
