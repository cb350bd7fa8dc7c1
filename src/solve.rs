use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder, ResponseError};
use log::{info, warn};
use thiserror::Error;

use crate::config::ServerConfig;
use crate::convert::to_instance;
use crate::domain::error::SolverError;
use crate::domain::solver_factory::{create_solver, SolverOptions, SolverType};
use crate::models::{SolveRequest, SolveResponse, SolversResponse};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("unknown solver '{0}'")]
    UnknownSolver(String),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error("solve task failed: {0}")]
    Blocking(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::UnknownSolver(_) | ApiError::Solver(SolverError::ModelError { .. }) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "error": self.to_string() }))
    }
}

/// Bind the request instance to a fresh solver, apply fixings and warm
/// start, and solve once. Blocking.
pub fn run_request(req: SolveRequest, config: &ServerConfig) -> Result<SolveResponse, ApiError> {
    let solver_type = match &req.solver {
        Some(name) => {
            SolverType::from_str(name).ok_or_else(|| ApiError::UnknownSolver(name.clone()))?
        }
        None => config.default_solver,
    };
    let options = SolverOptions {
        use_lazy_callbacks: req.use_lazy_callbacks.unwrap_or(config.use_lazy_callbacks),
    };

    let mut solver = create_solver(solver_type, &options);
    solver.load_instance(to_instance(req.instance))?;
    if let Some(limit) = req.time_limit.or(config.solve_time_limit) {
        solver.set_time_limit(limit);
    }
    if let Some(fix) = &req.fix {
        solver.fix(fix)?;
    }
    if let Some(warm_start) = &req.warm_start {
        solver.set_warm_start(warm_start)?;
    }

    let statistics = if req.relaxation {
        solver.solve_lp(false)?
    } else {
        solver.solve(false)?
    };
    let solution = match solver.get_solution() {
        Ok(solution) => Some(solution),
        Err(SolverError::NoSolutionAvailable(reason)) => {
            warn!("{} returned no solution: {}", solver.name(), reason);
            None
        }
        Err(err) => return Err(err.into()),
    };

    Ok(SolveResponse {
        solver: solver.name().to_string(),
        statistics,
        solution,
    })
}

// ---------- Route handlers ----------

/// POST /solve
pub async fn solve(
    config: web::Data<ServerConfig>,
    req: web::Json<SolveRequest>,
) -> Result<HttpResponse, ApiError> {
    let config = config.get_ref().clone();
    let request = req.into_inner();
    info!(
        "Solve request (solver: {}, relaxation: {})",
        request.solver.as_deref().unwrap_or(config.default_solver.key()),
        request.relaxation
    );
    let response = web::block(move || run_request(request, &config))
        .await
        .map_err(|e| ApiError::Blocking(e.to_string()))??;
    Ok(HttpResponse::Ok().json(response))
}

/// GET /solvers
pub async fn solvers(config: web::Data<ServerConfig>) -> impl Responder {
    HttpResponse::Ok().json(SolversResponse {
        solvers: SolverType::available()
            .iter()
            .map(|s| s.key().to_string())
            .collect(),
        default: config.default_solver.key().to_string(),
    })
}

/// GET /health
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("OK")
}

/// JSON extractor config; malformed bodies become `400 {"error": ...}`.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _| {
            let err_string = err.to_string();
            actix_web::error::InternalError::from_response(
                err,
                HttpResponse::BadRequest().json(serde_json::json!({ "error": err_string })),
            )
            .into()
        })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/solve", web::post().to(solve))
        .route("/solvers", web::get().to(solvers))
        .route("/health", web::get().to(health_check));
}
