use serde::{Deserialize, Serialize};

use crate::domain::model::{Domain, Sense};
use crate::domain::session::Solution;
use crate::domain::statistics::Statistics;
use crate::domain::validate::WarmStart;
use crate::problems::{KnapsackInstance, MultiKnapsackInstance};

// ---------- API (wire) types: owned & serde-friendly ----------

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ApiVariable {
    pub group: String,
    pub index: usize,
    pub domain: Domain,
    /// Defaults to 0
    #[serde(default)]
    pub lower: Option<f64>,
    /// Defaults to 1 for binaries, unbounded otherwise
    #[serde(default)]
    pub upper: Option<f64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ApiTerm {
    pub group: String,
    pub index: usize,
    pub coefficient: f64,
}

/// `lower <= sum(terms) <= upper`; a missing side is unbounded.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ApiConstraint {
    pub name: String,
    pub terms: Vec<ApiTerm>,
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ApiModel {
    pub sense: Sense,
    pub variables: Vec<ApiVariable>,
    pub objective: Vec<ApiTerm>,
    #[serde(default)]
    pub objective_constant: f64,
    #[serde(default)]
    pub constraints: Vec<ApiConstraint>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiInstance {
    Knapsack(KnapsackInstance),
    MultiKnapsack(MultiKnapsackInstance),
    Model(ApiModel),
}

#[derive(Deserialize, Debug)]
pub struct SolveRequest {
    pub instance: ApiInstance,
    #[serde(default)]
    pub solver: Option<String>,
    #[serde(default)]
    pub warm_start: Option<WarmStart>,
    #[serde(default)]
    pub fix: Option<WarmStart>,
    #[serde(default)]
    pub time_limit: Option<f64>,
    #[serde(default)]
    pub relaxation: bool,
    #[serde(default)]
    pub use_lazy_callbacks: Option<bool>,
}

// ---------- API response types ----------

#[derive(Serialize, Deserialize, Debug)]
pub struct SolveResponse {
    pub solver: String,
    pub statistics: Statistics,
    /// `null` when the solve produced no feasible point
    pub solution: Option<Solution>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SolversResponse {
    pub solvers: Vec<String>,
    pub default: String,
}
