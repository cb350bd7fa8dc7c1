use std::collections::BTreeMap;
use std::sync::Arc;

use log::info;

use crate::domain::error::{NoSolution, SolverError};
use crate::domain::instance::Instance;
use crate::domain::model::{Constraint, Model, VarId};
use crate::domain::validate::{resolve_assignment, validate_model, WarmStart};

/// Tolerance used when scoring warm starts against the model.
pub const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Variable values keyed by group, then index
pub type Solution = BTreeMap<String, BTreeMap<usize, f64>>;

/// Engine parameters applied on every solve
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SolveParams {
    pub time_limit: Option<f64>,
    pub threads: Option<u32>,
    pub node_limit: Option<u64>,
    pub gap_tolerance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
enum Snapshot {
    Missing(NoSolution),
    Available(Vec<f64>),
}

/// State shared by every backend adapter: the bound instance and model,
/// the staged warm start, parameters and the latest solution snapshot.
pub struct Session {
    instance: Option<Arc<dyn Instance>>,
    model: Option<Model>,
    warm_start: Option<Vec<Option<f64>>>,
    pub params: SolveParams,
    snapshot: Snapshot,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            instance: None,
            model: None,
            warm_start: None,
            params: SolveParams::default(),
            snapshot: Snapshot::Missing(NoSolution::NeverSolved),
        }
    }

    pub fn bind(&mut self, instance: Arc<dyn Instance>, model: Model) -> Result<(), SolverError> {
        validate_model(&model)?;
        info!(
            "Binding {} ({} variables, {} constraints)",
            instance.name(),
            model.num_vars(),
            model.constraints().len()
        );
        self.instance = Some(instance);
        self.model = Some(model);
        self.warm_start = None;
        self.snapshot = Snapshot::Missing(NoSolution::NeverSolved);
        Ok(())
    }

    /// Label of the bound instance, used in solve logs
    pub fn instance_name(&self) -> Option<&str> {
        self.instance.as_deref().map(|instance| instance.name())
    }

    pub fn model(&self, operation: &'static str) -> Result<&Model, SolverError> {
        self.model
            .as_ref()
            .ok_or(SolverError::NotBound { operation })
    }

    pub fn model_mut(&mut self, operation: &'static str) -> Result<&mut Model, SolverError> {
        self.model
            .as_mut()
            .ok_or(SolverError::NotBound { operation })
    }

    pub fn bound_model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    pub fn stage_warm_start(&mut self, warm_start: &WarmStart) -> Result<(), SolverError> {
        let model = self.model("set_warm_start")?;
        let resolved = resolve_assignment(model, warm_start)?;
        let mut values = vec![None; model.num_vars()];
        for (id, value) in &resolved {
            values[id.index()] = *value;
        }
        let count_set = values.iter().filter(|v| v.is_some()).count();
        info!(
            "Setting start values for {} variables (out of {})",
            count_set,
            resolved.len()
        );
        self.warm_start = (count_set > 0).then_some(values);
        self.invalidate();
        Ok(())
    }

    pub fn clear_warm_start(&mut self) {
        self.warm_start = None;
    }

    /// Staged start values indexed by [`VarId`], possibly partial.
    pub fn partial_start(&self) -> Option<&[Option<f64>]> {
        self.warm_start.as_deref()
    }

    /// Staged start as `(column, value)` pairs. Fixed variables take their
    /// fixed value and unset free variables are left out.
    pub fn start_entries(&self) -> Vec<(usize, f64)> {
        let (Some(model), Some(staged)) = (self.model.as_ref(), self.warm_start.as_ref()) else {
            return Vec::new();
        };
        model
            .variables()
            .iter()
            .zip(staged)
            .enumerate()
            .filter_map(|(column, (var, value))| {
                var.fixed_value().or(*value).map(|v| (column, v))
            })
            .collect()
    }

    /// Staged start completed with the values of fixed variables. `None`
    /// when some free variable is unset or a staged value contradicts a
    /// fixing.
    pub fn complete_start(&self) -> Option<Vec<f64>> {
        let model = self.model.as_ref()?;
        let staged = self.warm_start.as_ref()?;
        model
            .variables()
            .iter()
            .zip(staged)
            .map(|(var, value)| match (var.fixed_value(), *value) {
                (Some(fixed), Some(v)) if (fixed - v).abs() > FEASIBILITY_TOLERANCE => None,
                (Some(fixed), _) => Some(fixed),
                (None, v) => v,
            })
            .collect()
    }

    /// Objective value (without constant) of the staged start when it is
    /// complete and feasible for the current model.
    pub fn score_warm_start(&self) -> Option<f64> {
        let model = self.model.as_ref()?;
        let start = self.complete_start()?;
        if !model.is_feasible(&start, FEASIBILITY_TOLERANCE) {
            return None;
        }
        model
            .objective()
            .map(|objective| objective.expr.linear_value(&start))
    }

    pub fn fix(&mut self, assignment: &WarmStart) -> Result<(), SolverError> {
        let model = self.model_mut("fix")?;
        let resolved = resolve_assignment(model, assignment)?;
        let count_total = resolved.len();
        let mut fixings: Vec<(VarId, f64)> = Vec::new();
        for (id, value) in resolved {
            let Some(value) = value else { continue };
            if let Some(var) = model.variable(id) {
                if value < var.lower - FEASIBILITY_TOLERANCE
                    || value > var.upper + FEASIBILITY_TOLERANCE
                {
                    return Err(SolverError::model(
                        format!("variable {}", var.name()),
                        format!(
                            "cannot fix to {} outside bounds [{}, {}]",
                            value, var.lower, var.upper
                        ),
                    ));
                }
            }
            fixings.push((id, value));
        }
        for (id, value) in &fixings {
            model.fix_var(*id, *value);
        }
        info!(
            "Fixing values for {} variables (out of {})",
            fixings.len(),
            count_total
        );
        self.invalidate();
        Ok(())
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), SolverError> {
        self.model_mut("add_constraint")?.add_constraint(constraint)?;
        self.invalidate();
        Ok(())
    }

    /// Record the values produced by a solve, or the lack of them.
    pub fn record(&mut self, values: Option<Vec<f64>>) {
        let Some(model) = self.model.as_mut() else {
            return;
        };
        match values {
            Some(values) => {
                model.store_values(&values);
                self.snapshot = Snapshot::Available(values);
            }
            None => {
                model.clear_values();
                self.snapshot = Snapshot::Missing(NoSolution::Infeasible);
            }
        }
    }

    pub fn invalidate(&mut self) {
        if matches!(self.snapshot, Snapshot::Available(_)) {
            self.snapshot = Snapshot::Missing(NoSolution::Invalidated);
        }
    }

    pub fn solution(&self) -> Result<Solution, SolverError> {
        let model = self.model("get_solution")?;
        let values = match &self.snapshot {
            Snapshot::Available(values) => values,
            Snapshot::Missing(reason) => return Err(SolverError::NoSolutionAvailable(*reason)),
        };
        let mut solution = Solution::new();
        for (group, members) in model.groups() {
            let entry = solution.entry(group.to_string()).or_default();
            for (&index, &id) in members {
                if model.variable(id).is_some_and(|var| var.is_fixed()) {
                    continue;
                }
                entry.insert(index, values[id.index()]);
            }
        }
        Ok(solution)
    }

    pub fn value(&self, group: &str, index: usize) -> Result<Option<f64>, SolverError> {
        let model = self.model("get_value")?;
        let id = model.var(group, index).ok_or_else(|| {
            SolverError::model(format!("variable {}[{}]", group, index), "not found in model")
        })?;
        Ok(model.value(id))
    }

    /// Indices of the free (unfixed) variables of every group
    pub fn variables(&self) -> Result<BTreeMap<String, Vec<usize>>, SolverError> {
        let model = self.model("get_variables")?;
        Ok(model
            .groups()
            .map(|(group, members)| {
                let free = members
                    .iter()
                    .filter(|(_, &id)| model.variable(id).is_some_and(|var| !var.is_fixed()))
                    .map(|(&index, _)| index)
                    .collect();
                (group.to_string(), free)
            })
            .collect())
    }

    pub fn constraint_ids(&self) -> Vec<String> {
        self.model
            .as_ref()
            .map(|model| model.constraints().iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }
}
