use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use log::info;

use mip_bridge::config::ServerConfig;
use mip_bridge::domain::solver_factory::SolverType;
use mip_bridge::solve::{configure, json_config};

// ---------- Server bootstrap ----------
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env();
    let port = config.port;
    let json_limit = config.json_payload_limit;

    info!(
        "Available solvers: {:?}, default: {}",
        SolverType::available(),
        config.default_solver.key()
    );
    info!("Starting server on http://127.0.0.1:{}", port);

    let config = web::Data::new(config);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(config.clone())
            .app_data(json_config(json_limit))
            .configure(configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
