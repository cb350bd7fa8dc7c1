use std::env;

use log::warn;

use crate::domain::solver_factory::SolverType;

const DEFAULT_PORT: u16 = 9000;
const DEFAULT_JSON_PAYLOAD_LIMIT: usize = 2 * 1024 * 1024; // 2 MB

/// Server settings, read from the environment (and `.env`, loaded in `main`).
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub json_payload_limit: usize,
    pub default_solver: SolverType,
    pub solve_time_limit: Option<f64>,
    pub use_lazy_callbacks: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: DEFAULT_PORT,
            json_payload_limit: DEFAULT_JSON_PAYLOAD_LIMIT,
            default_solver: SolverType::Highs,
            solve_time_limit: None,
            use_lazy_callbacks: true,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unparsable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = ServerConfig::default();

        let port = lookup("PORT")
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(defaults.port);

        let json_payload_limit = lookup("JSON_PAYLOAD_LIMIT")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.json_payload_limit);

        let default_solver = match lookup("DEFAULT_SOLVER") {
            Some(name) => SolverType::from_str(&name).unwrap_or_else(|| {
                warn!(
                    "DEFAULT_SOLVER '{}' is not available in this build, using {}",
                    name,
                    defaults.default_solver.key()
                );
                defaults.default_solver
            }),
            None => defaults.default_solver,
        };

        let solve_time_limit = lookup("SOLVE_TIME_LIMIT")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v > 0.0);

        let use_lazy_callbacks = lookup("USE_LAZY_CALLBACKS")
            .and_then(|v| match v.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            })
            .unwrap_or(defaults.use_lazy_callbacks);

        ServerConfig {
            port,
            json_payload_limit,
            default_solver,
            solve_time_limit,
            use_lazy_callbacks,
        }
    }
}
