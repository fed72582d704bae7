//! HTTP surface (§4.13): actix-web with a shared `web::Data<AppState>`, CORS permissive
//! for local tooling.

use std::collections::HashMap;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer};
use chrono::Utc;
use evocrate::config::Config;
use evocrate::context::AppContext;
use evocrate::data::interval::Interval;
use evocrate::error::EvoError;
use evocrate::evolution::driver::EvolutionDriver;
use evocrate::model::population::Population;
use evocrate::report::format_generation_report;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{error, info};

struct AppState {
    context: Arc<AppContext>,
    autonomous: Mutex<HashMap<i64, Arc<EvolutionDriver>>>,
}

#[derive(Debug, Deserialize)]
struct CreatePopulationRequest {
    name: String,
    symbol: String,
    interval: String,
    size: usize,
    rng_seed: u64,
}

async fn create_population(
    state: web::Data<AppState>,
    body: web::Json<CreatePopulationRequest>,
) -> actix_web::Result<HttpResponse> {
    let interval: Interval = body
        .interval
        .parse()
        .map_err(|e: EvoError| actix_web::error::ErrorBadRequest(e.to_string()))?;

    let population = Population::new(&body.name, &body.symbol, interval, body.size, body.rng_seed, Utc::now());
    let id = state
        .context
        .repository
        .create_population(&population)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    Ok(HttpResponse::Created().json(serde_json::json!({ "id": id })))
}

async fn get_population(state: web::Data<AppState>, path: web::Path<i64>) -> actix_web::Result<HttpResponse> {
    let population_id = path.into_inner();
    let population = state
        .context
        .repository
        .load_population(population_id)
        .await
        .map_err(map_repository_error)?;
    Ok(HttpResponse::Ok().json(population))
}

async fn run_generation(state: web::Data<AppState>, path: web::Path<i64>) -> actix_web::Result<HttpResponse> {
    let population_id = path.into_inner();
    let driver = EvolutionDriver::new(state.context.clone());
    let stats = driver
        .run_generation(population_id)
        .await
        .map_err(map_repository_error)?;

    let population = state
        .context
        .repository
        .load_population(population_id)
        .await
        .map_err(map_repository_error)?;
    let report = format_generation_report(&population.name, &stats);

    Ok(HttpResponse::Ok().json(serde_json::json!({ "stats": stats, "report": report })))
}

async fn start_autonomous(state: web::Data<AppState>, path: web::Path<i64>) -> actix_web::Result<HttpResponse> {
    let population_id = path.into_inner();
    let driver = Arc::new(EvolutionDriver::new(state.context.clone()));

    {
        let mut running = state.autonomous.lock().await;
        if running.contains_key(&population_id) {
            return Ok(HttpResponse::Conflict().json(serde_json::json!({
                "error": "autonomous loop already running for this population"
            })));
        }
        running.insert(population_id, driver.clone());
    }

    tokio::spawn(async move {
        if let Err(e) = driver.run_autonomous(population_id).await {
            error!(population_id, error = %e, "autonomous loop exited with error");
        }
    });

    info!(population_id, "started autonomous evolution loop");
    Ok(HttpResponse::Accepted().finish())
}

async fn stop_autonomous(state: web::Data<AppState>, path: web::Path<i64>) -> actix_web::Result<HttpResponse> {
    let population_id = path.into_inner();
    let mut running = state.autonomous.lock().await;
    match running.remove(&population_id) {
        Some(driver) => {
            driver.request_stop();
            Ok(HttpResponse::Ok().finish())
        }
        None => Ok(HttpResponse::NotFound().finish()),
    }
}

fn map_repository_error(e: EvoError) -> actix_web::Error {
    match &e {
        EvoError::PopulationNotFound(_) | EvoError::ChromosomeNotFound(_) => actix_web::error::ErrorNotFound(e.to_string()),
        _ => actix_web::error::ErrorInternalServerError(e.to_string()),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = Config::read_config(Some("config.yml")).expect("failed to load configuration");
    let _log_guard = evocrate::logging::init_logging(&config.log_dir).expect("failed to initialize logging");

    let context = AppContext::build(config)
        .await
        .expect("failed to build application context");

    let state = web::Data::new(AppState {
        context,
        autonomous: Mutex::new(HashMap::new()),
    });

    info!("starting evocrate-server on 0.0.0.0:8080");

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(state.clone())
            .route("/populations", web::post().to(create_population))
            .route("/populations/{id}", web::get().to(get_population))
            .route("/populations/{id}/generations", web::post().to(run_generation))
            .route("/populations/{id}/autonomous/start", web::post().to(start_autonomous))
            .route("/populations/{id}/autonomous/stop", web::post().to(stop_autonomous))
    })
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}
