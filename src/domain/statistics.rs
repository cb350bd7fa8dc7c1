//! Normalization of raw engine reports into [`Statistics`].
//!
//! Field names of [`Statistics`] are an external contract: downstream
//! tooling matches on the serialized keys, so they must not change.

use serde::{Deserialize, Serialize};

use crate::domain::model::Sense;

/// Engines report unbounded values as very large finite numbers (Gurobi
/// uses 1e100); anything at least this large is treated as absent.
const INFINITE_BOUND: f64 = 1e30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(rename = "Lower bound")]
    pub lower_bound: Option<f64>,
    #[serde(rename = "Upper bound")]
    pub upper_bound: Option<f64>,
    #[serde(rename = "Sense")]
    pub sense: Sense,
    #[serde(rename = "Wallclock time")]
    pub wallclock_time: f64,
    #[serde(rename = "Nodes")]
    pub nodes: Option<u64>,
    #[serde(rename = "Log")]
    pub log: String,
    #[serde(rename = "Warm start value")]
    pub warm_start_value: Option<f64>,
    #[serde(
        rename = "Optimal value",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub optimal_value: Option<f64>,
}

/// Whatever an adapter could read back from its engine after one solve.
///
/// Objective-space values are in engine space, i.e. without the
/// objective constant, which is carried separately in `objective_offset`.
#[derive(Debug, Clone)]
pub struct RawReport {
    pub sense: Sense,
    pub primal_bound: Option<f64>,
    pub dual_bound: Option<f64>,
    pub engine_time: Option<f64>,
    pub measured_time: f64,
    pub nodes: Option<u64>,
    pub log: String,
    pub warm_start_value: Option<f64>,
    pub objective_offset: f64,
}

impl RawReport {
    pub fn new(sense: Sense) -> Self {
        RawReport {
            sense,
            primal_bound: None,
            dual_bound: None,
            engine_time: None,
            measured_time: 0.0,
            nodes: None,
            log: String::new(),
            warm_start_value: None,
            objective_offset: 0.0,
        }
    }
}

/// Markers locating numbers in an engine log. The number right after the
/// marker on the last matching line wins.
#[derive(Debug, Clone, Copy)]
pub struct LogPatterns {
    pub warm_start: &'static [&'static str],
    pub node_count: &'static [&'static str],
}

pub const HIGHS_PATTERNS: LogPatterns = LogPatterns {
    warm_start: &[],
    node_count: &["Nodes"],
};

pub const GUROBI_PATTERNS: LogPatterns = LogPatterns {
    warm_start: &[
        "MIP start with objective ",
        "MIP start produced solution with objective ",
    ],
    node_count: &["Explored "],
};

pub fn normalize_mip(raw: RawReport, patterns: &LogPatterns) -> Statistics {
    let offset = raw.objective_offset;
    let primal = raw.primal_bound.and_then(finite).map(|v| v + offset);
    let dual = raw.dual_bound.and_then(finite).map(|v| v + offset);
    let (lower_bound, upper_bound) = match raw.sense {
        Sense::Max => (primal, dual),
        Sense::Min => (dual, primal),
    };

    let nodes = raw
        .nodes
        .or_else(|| {
            extract_last_number(&raw.log, patterns.node_count)
                .filter(|n| *n >= 0.0)
                .map(|n| n as u64)
        })
        .unwrap_or(1)
        .max(1);

    let warm_start_value = raw
        .warm_start_value
        .or_else(|| extract_last_number(&raw.log, patterns.warm_start))
        .and_then(finite)
        .map(|v| v + offset);

    Statistics {
        lower_bound,
        upper_bound,
        sense: raw.sense,
        wallclock_time: wallclock(&raw),
        nodes: Some(nodes),
        log: raw.log,
        warm_start_value,
        optimal_value: None,
    }
}

pub fn normalize_lp(raw: RawReport) -> Statistics {
    Statistics {
        lower_bound: None,
        upper_bound: None,
        sense: raw.sense,
        wallclock_time: wallclock(&raw),
        nodes: None,
        optimal_value: raw
            .primal_bound
            .and_then(finite)
            .map(|v| v + raw.objective_offset),
        log: raw.log,
        warm_start_value: None,
    }
}

/// Number following any of `markers` on the last line where one parses.
pub fn extract_last_number(log: &str, markers: &[&str]) -> Option<f64> {
    let mut value = None;
    for line in log.lines() {
        for marker in markers {
            if let Some(pos) = line.find(marker) {
                if let Some(number) = leading_number(&line[pos + marker.len()..]) {
                    value = Some(number);
                }
            }
        }
    }
    value
}

fn leading_number(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let end = text
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')))
        .unwrap_or(text.len());
    text[..end].parse().ok()
}

fn finite(value: f64) -> Option<f64> {
    (value.is_finite() && value.abs() < INFINITE_BOUND).then_some(value)
}

fn wallclock(raw: &RawReport) -> f64 {
    raw.engine_time
        .filter(|t| t.is_finite() && *t >= 0.0)
        .unwrap_or(raw.measured_time)
}
