use std::collections::BTreeMap;

use crate::domain::error::SolverError;
use crate::domain::model::{Model, VarId};

/// Assignment keyed by variable group, then index. `None` leaves the
/// variable unset.
pub type WarmStart = BTreeMap<String, BTreeMap<usize, Option<f64>>>;

/// Checks a model before a session binds it.
pub fn validate_model(model: &Model) -> Result<(), SolverError> {
    if model.objective().is_none() {
        return Err(SolverError::model("objective", "model has no objective"));
    }
    if model.num_vars() == 0 {
        return Err(SolverError::model("model", "model has no variables"));
    }
    for var in model.variables() {
        if var.lower.is_nan() || var.upper.is_nan() || var.lower > var.upper {
            return Err(SolverError::model(
                format!("variable {}", var.name()),
                format!("bounds [{}, {}] are empty", var.lower, var.upper),
            ));
        }
    }
    Ok(())
}

/// Resolve an assignment against the model, rejecting unknown groups and
/// indices. Unset entries are returned as `None`.
pub fn resolve_assignment(
    model: &Model,
    assignment: &WarmStart,
) -> Result<Vec<(VarId, Option<f64>)>, SolverError> {
    let mut resolved = Vec::new();
    for (group, values) in assignment {
        for (&index, &value) in values {
            let id = model.var(group, index).ok_or_else(|| {
                SolverError::model(
                    format!("variable {}[{}]", group, index),
                    "not found in model",
                )
            })?;
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(SolverError::model(
                        format!("variable {}[{}]", group, index),
                        format!("value {} is not finite", v),
                    ));
                }
            }
            resolved.push((id, value));
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Domain, LinExpr, Sense};

    fn model() -> Model {
        let mut model = Model::new();
        let ids = model
            .add_var_group("x", 0..2, Domain::Binary, 0.0, 1.0)
            .unwrap();
        model
            .set_objective(Sense::Max, ids.iter().map(|&id| (id, 1.0)).collect())
            .unwrap();
        model
    }

    fn assignment(entries: &[(&str, usize, Option<f64>)]) -> WarmStart {
        let mut warm_start = WarmStart::new();
        for (group, index, value) in entries {
            warm_start
                .entry(group.to_string())
                .or_default()
                .insert(*index, *value);
        }
        warm_start
    }

    #[test]
    fn test_validate_model_given_valid_model_should_return_ok() {
        assert!(validate_model(&model()).is_ok());
    }

    #[test]
    fn test_validate_model_given_missing_objective_should_return_error() {
        let mut model = Model::new();
        model.add_var("x", 0, Domain::Binary, 0.0, 1.0).unwrap();
        let err = validate_model(&model).unwrap_err();
        assert!(err.to_string().contains("objective"));
    }

    #[test]
    fn test_validate_model_given_no_variables_should_return_error() {
        let mut model = Model::new();
        model.set_objective(Sense::Min, LinExpr::new()).unwrap();
        assert!(validate_model(&model).is_err());
    }

    #[test]
    fn test_resolve_assignment_given_known_variables_should_keep_unset_entries() {
        let model = model();
        let resolved =
            resolve_assignment(&model, &assignment(&[("x", 0, Some(1.0)), ("x", 1, None)]))
                .unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0], (model.var("x", 0).unwrap(), Some(1.0)));
        assert_eq!(resolved[1].1, None);
    }

    #[test]
    fn test_resolve_assignment_given_missing_variable_should_return_error() {
        let model = model();
        let err = resolve_assignment(&model, &assignment(&[("y", 0, Some(1.0))])).unwrap_err();
        assert!(err.to_string().contains("y[0]"));

        let err = resolve_assignment(&model, &assignment(&[("x", 7, Some(1.0))])).unwrap_err();
        assert!(err.to_string().contains("x[7]"));
    }

    #[test]
    fn test_resolve_assignment_given_nan_should_return_error() {
        let model = model();
        assert!(resolve_assignment(&model, &assignment(&[("x", 0, Some(f64::NAN))])).is_err());
    }
}
