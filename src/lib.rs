//! Uniform interface over MIP solver backends, with descriptor-level
//! capture of the log the native engines print to standard output.

pub mod config;
pub mod convert;
pub mod domain;
pub mod models;
pub mod problems;
pub mod solve;

pub use domain::{
    create_solver, redirect_output, CaptureBuffer, Instance, InternalSolver, Model, Sink,
    SolverError, SolverOptions, SolverType, Statistics,
};
