use crate::domain::error::SolverError;
use crate::domain::model::Model;

/// A problem definition that can produce its algebraic [`Model`].
///
/// Instances are read-only to solvers; sessions keep them behind an `Arc`.
pub trait Instance: Send + Sync {
    fn to_model(&self) -> Result<Model, SolverError>;

    /// Short label used in logs
    fn name(&self) -> &str {
        "instance"
    }
}
