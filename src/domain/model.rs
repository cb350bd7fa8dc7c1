use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::SolverError;

/// Handle to a variable inside a [`Model`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Binary,
    Integer,
    Continuous,
}

impl Domain {
    pub fn is_integral(self) -> bool {
        !matches!(self, Domain::Continuous)
    }
}

/// Objective direction, serialized as `"min"` / `"max"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sense {
    Min,
    Max,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sense::Min => write!(f, "min"),
            Sense::Max => write!(f, "max"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub group: String,
    pub index: usize,
    pub domain: Domain,
    pub lower: f64,
    pub upper: f64,
    fixed: Option<f64>,
    value: Option<f64>,
}

impl Variable {
    /// Display name, e.g. `x[3]`
    pub fn name(&self) -> String {
        format!("{}[{}]", self.group, self.index)
    }

    pub fn fixed_value(&self) -> Option<f64> {
        self.fixed
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed.is_some()
    }

    /// Value from the most recent solve, or the fixed value
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Bounds handed to the engine: a fixed variable collapses to its value.
    pub fn effective_bounds(&self) -> (f64, f64) {
        match self.fixed {
            Some(value) => (value, value),
            None => (self.lower, self.upper),
        }
    }
}

/// Linear expression `sum(coeff * var) + constant`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn term(mut self, var: VarId, coefficient: f64) -> Self {
        self.terms.push((var, coefficient));
        self
    }

    pub fn plus_constant(mut self, constant: f64) -> Self {
        self.constant += constant;
        self
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    /// Value of the linear part only; `values` is indexed by [`VarId`].
    pub fn linear_value(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coeff)| coeff * values.get(var.0).copied().unwrap_or(0.0))
            .sum()
    }

    pub fn value(&self, values: &[f64]) -> f64 {
        self.linear_value(values) + self.constant
    }
}

impl FromIterator<(VarId, f64)> for LinExpr {
    fn from_iter<I: IntoIterator<Item = (VarId, f64)>>(iter: I) -> Self {
        LinExpr {
            terms: iter.into_iter().collect(),
            constant: 0.0,
        }
    }
}

/// Ranged linear constraint `lower <= expr <= upper`
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub expr: LinExpr,
    pub lower: f64,
    pub upper: f64,
}

impl Constraint {
    pub fn le(name: impl Into<String>, expr: LinExpr, rhs: f64) -> Self {
        Self::range(name, expr, f64::NEG_INFINITY, rhs)
    }

    pub fn ge(name: impl Into<String>, expr: LinExpr, rhs: f64) -> Self {
        Self::range(name, expr, rhs, f64::INFINITY)
    }

    pub fn eq(name: impl Into<String>, expr: LinExpr, rhs: f64) -> Self {
        Self::range(name, expr, rhs, rhs)
    }

    pub fn range(name: impl Into<String>, expr: LinExpr, lower: f64, upper: f64) -> Self {
        Constraint {
            name: name.into(),
            expr,
            lower,
            upper,
        }
    }

    /// Row bounds with the expression constant moved to the right-hand side
    pub fn row_bounds(&self) -> (f64, f64) {
        let constant = self.expr.constant();
        (self.lower - constant, self.upper - constant)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub sense: Sense,
    pub expr: LinExpr,
}

/// Engine-neutral algebraic model
#[derive(Debug, Clone, Default)]
pub struct Model {
    variables: Vec<Variable>,
    groups: BTreeMap<String, BTreeMap<usize, VarId>>,
    constraints: Vec<Constraint>,
    objective: Option<Objective>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one variable per index under `group`, all sharing domain and bounds.
    pub fn add_var_group(
        &mut self,
        group: &str,
        indices: impl IntoIterator<Item = usize>,
        domain: Domain,
        lower: f64,
        upper: f64,
    ) -> Result<Vec<VarId>, SolverError> {
        indices
            .into_iter()
            .map(|index| self.add_var(group, index, domain, lower, upper))
            .collect()
    }

    pub fn add_var(
        &mut self,
        group: &str,
        index: usize,
        domain: Domain,
        lower: f64,
        upper: f64,
    ) -> Result<VarId, SolverError> {
        let name = format!("{}[{}]", group, index);
        if self.var(group, index).is_some() {
            return Err(SolverError::model(
                format!("variable {}", name),
                "declared more than once",
            ));
        }
        if lower.is_nan() || upper.is_nan() {
            return Err(SolverError::model(
                format!("variable {}", name),
                "bounds must be numbers",
            ));
        }
        let (lower, upper) = match domain {
            Domain::Binary => (lower.max(0.0), upper.min(1.0)),
            _ => (lower, upper),
        };
        if lower > upper {
            return Err(SolverError::model(
                format!("variable {}", name),
                format!("bounds [{}, {}] are empty", lower, upper),
            ));
        }

        let id = VarId(self.variables.len());
        self.variables.push(Variable {
            group: group.to_string(),
            index,
            domain,
            lower,
            upper,
            fixed: None,
            value: None,
        });
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(index, id);
        Ok(id)
    }

    pub fn var(&self, group: &str, index: usize) -> Option<VarId> {
        self.groups.get(group)?.get(&index).copied()
    }

    pub fn variable(&self, id: VarId) -> Option<&Variable> {
        self.variables.get(id.0)
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn var_ids(&self) -> impl Iterator<Item = VarId> + '_ {
        (0..self.variables.len()).map(VarId)
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &BTreeMap<usize, VarId>)> {
        self.groups.iter().map(|(name, members)| (name.as_str(), members))
    }

    pub fn num_vars(&self) -> usize {
        self.variables.len()
    }

    /// Append a constraint after checking that every term refers to a
    /// variable of this model.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<usize, SolverError> {
        self.check_expr(&format!("constraint '{}'", constraint.name), &constraint.expr)?;
        if constraint.lower.is_nan() || constraint.upper.is_nan() {
            return Err(SolverError::model(
                format!("constraint '{}'", constraint.name),
                "bound is NaN",
            ));
        }
        if constraint.lower > constraint.upper {
            return Err(SolverError::model(
                format!("constraint '{}'", constraint.name),
                format!(
                    "lower bound {} exceeds upper bound {}",
                    constraint.lower, constraint.upper
                ),
            ));
        }
        self.constraints.push(constraint);
        Ok(self.constraints.len() - 1)
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn set_objective(&mut self, sense: Sense, expr: LinExpr) -> Result<(), SolverError> {
        self.check_expr("objective", &expr)?;
        self.objective = Some(Objective { sense, expr });
        Ok(())
    }

    pub fn objective(&self) -> Option<&Objective> {
        self.objective.as_ref()
    }

    pub fn sense(&self) -> Option<Sense> {
        self.objective.as_ref().map(|objective| objective.sense)
    }

    pub fn value(&self, id: VarId) -> Option<f64> {
        self.variables.get(id.0).and_then(Variable::value)
    }

    /// Latest value of `group[index]`, as a model attribute read would return it.
    pub fn var_value(&self, group: &str, index: usize) -> Option<f64> {
        self.var(group, index).and_then(|id| self.value(id))
    }

    pub(crate) fn fix_var(&mut self, id: VarId, value: f64) {
        if let Some(var) = self.variables.get_mut(id.0) {
            var.fixed = Some(value);
            var.value = Some(value);
        }
    }

    pub(crate) fn store_values(&mut self, values: &[f64]) {
        for (var, value) in self.variables.iter_mut().zip(values) {
            var.value = Some(*value);
        }
    }

    pub(crate) fn clear_values(&mut self) {
        for var in self.variables.iter_mut() {
            var.value = var.fixed;
        }
    }

    /// Whether `values` (indexed by [`VarId`]) satisfies bounds, fixings,
    /// integrality and every constraint within `tolerance`.
    pub fn is_feasible(&self, values: &[f64], tolerance: f64) -> bool {
        if values.len() != self.variables.len() {
            return false;
        }
        let within = |value: f64, lower: f64, upper: f64| {
            let slack = tolerance * value.abs().max(1.0);
            value >= lower - slack && value <= upper + slack
        };

        let vars_ok = self.variables.iter().zip(values).all(|(var, &value)| {
            let (lower, upper) = var.effective_bounds();
            within(value, lower, upper)
                && (!var.domain.is_integral() || (value - value.round()).abs() <= tolerance)
        });

        vars_ok
            && self
                .constraints
                .iter()
                .all(|c| within(c.expr.value(values), c.lower, c.upper))
    }

    fn check_expr(&self, construct: &str, expr: &LinExpr) -> Result<(), SolverError> {
        for (var, coeff) in expr.terms() {
            if var.0 >= self.variables.len() {
                return Err(SolverError::model(
                    construct,
                    format!("refers to unknown variable #{}", var.0),
                ));
            }
            if !coeff.is_finite() {
                let name = self.variables[var.0].name();
                return Err(SolverError::model(
                    construct,
                    format!("coefficient of {} is {}", name, coeff),
                ));
            }
        }
        if !expr.constant().is_finite() {
            return Err(SolverError::model(construct, "constant term is not finite"));
        }
        Ok(())
    }
}
