use std::sync::Arc;

use crate::domain::error::SolverError;
use crate::domain::instance::Instance;
use crate::domain::model::{Constraint, Domain, LinExpr, Model};
use crate::models::{ApiInstance, ApiModel, ApiTerm};

/// Turn a request instance into something a solver can bind.
pub fn to_instance(instance: ApiInstance) -> Arc<dyn Instance> {
    match instance {
        ApiInstance::Knapsack(knapsack) => Arc::new(knapsack),
        ApiInstance::MultiKnapsack(multi) => Arc::new(multi),
        ApiInstance::Model(model) => Arc::new(model),
    }
}

impl Instance for ApiModel {
    fn to_model(&self) -> Result<Model, SolverError> {
        let mut model = Model::new();
        for var in &self.variables {
            let lower = var.lower.unwrap_or(0.0);
            let upper = var.upper.unwrap_or(match var.domain {
                Domain::Binary => 1.0,
                _ => f64::INFINITY,
            });
            model.add_var(&var.group, var.index, var.domain, lower, upper)?;
        }

        let objective = to_expr(&model, "objective", &self.objective)?
            .plus_constant(self.objective_constant);
        model.set_objective(self.sense, objective)?;

        for constraint in &self.constraints {
            let expr = to_expr(
                &model,
                &format!("constraint {}", constraint.name),
                &constraint.terms,
            )?;
            model.add_constraint(Constraint::range(
                constraint.name.clone(),
                expr,
                constraint.lower.unwrap_or(f64::NEG_INFINITY),
                constraint.upper.unwrap_or(f64::INFINITY),
            ))?;
        }
        Ok(model)
    }

    fn name(&self) -> &str {
        "model"
    }
}

fn to_expr(model: &Model, construct: &str, terms: &[ApiTerm]) -> Result<LinExpr, SolverError> {
    terms
        .iter()
        .map(|term| {
            model
                .var(&term.group, term.index)
                .map(|id| (id, term.coefficient))
                .ok_or_else(|| {
                    SolverError::model(
                        construct,
                        format!("unknown variable {}[{}]", term.group, term.index),
                    )
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Sense;
    use crate::models::{ApiConstraint, ApiVariable};

    fn term(index: usize, coefficient: f64) -> ApiTerm {
        ApiTerm {
            group: "x".to_string(),
            index,
            coefficient,
        }
    }

    fn api_model() -> ApiModel {
        ApiModel {
            sense: Sense::Min,
            variables: vec![
                ApiVariable {
                    group: "x".to_string(),
                    index: 0,
                    domain: Domain::Binary,
                    lower: None,
                    upper: None,
                },
                ApiVariable {
                    group: "x".to_string(),
                    index: 1,
                    domain: Domain::Continuous,
                    lower: None,
                    upper: Some(4.0),
                },
            ],
            objective: vec![term(0, 1.0), term(1, 2.0)],
            objective_constant: 3.0,
            constraints: vec![ApiConstraint {
                name: "cover".to_string(),
                terms: vec![term(0, 1.0), term(1, 1.0)],
                lower: Some(1.0),
                upper: None,
            }],
        }
    }

    #[test]
    fn test_api_model_to_model_applies_default_bounds() {
        let model = api_model().to_model().unwrap();
        let vars = model.variables();
        assert_eq!((vars[0].lower, vars[0].upper), (0.0, 1.0));
        assert_eq!((vars[1].lower, vars[1].upper), (0.0, 4.0));
        assert_eq!(model.sense(), Some(Sense::Min));
        assert_eq!(model.objective().unwrap().expr.constant(), 3.0);

        let cover = &model.constraints()[0];
        assert_eq!(cover.lower, 1.0);
        assert_eq!(cover.upper, f64::INFINITY);
    }

    #[test]
    fn test_api_model_given_unknown_variable_should_name_construct() {
        let mut api = api_model();
        api.constraints[0].terms.push(term(9, 1.0));
        let err = api.to_model().unwrap_err();
        assert!(err.to_string().contains("constraint cover"));
        assert!(err.to_string().contains("x[9]"));
    }

    #[test]
    fn test_api_instance_deserializes_tagged_variants() {
        let json = r#"{"type": "knapsack", "weights": [1, 2], "prices": [3, 4], "capacity": 2}"#;
        let instance: ApiInstance = serde_json::from_str(json).unwrap();
        assert!(matches!(instance, ApiInstance::Knapsack(_)));
        assert_eq!(to_instance(instance).name(), "knapsack");

        let json = r#"{"type": "model", "sense": "max",
                       "variables": [{"group": "y", "index": 0, "domain": "integer", "upper": 3}],
                       "objective": [{"group": "y", "index": 0, "coefficient": 1}]}"#;
        let instance: ApiInstance = serde_json::from_str(json).unwrap();
        let model = to_instance(instance).to_model().unwrap();
        assert_eq!(model.var_ids().count(), 1);
        assert!(model.constraints().is_empty());
    }
}
