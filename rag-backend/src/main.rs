use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware::Logger, web};
use dotenv::dotenv;
use std::sync::Arc;

mod ai;
mod config;
mod controllers;
mod history;
mod http;
mod models;
mod retrieval;
mod tools;
mod workflow;

use ai::{ModelFactory, OpenAiFactory};
use config::Config;
use history::{Database, HistoryStore, SqliteHistoryStore};
use retrieval::{ContextProvider, HttpContextProvider};
use workflow::StreamOrchestrator;

pub struct AppState {
    pub config: Config,
    pub history: Arc<dyn HistoryStore>,
    pub orchestrator: Arc<StreamOrchestrator>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let port = config.port;

    log::info!("Initializing database at {}", config.database_url);
    let db = Arc::new(Database::new(&config.database_url).expect("Failed to initialize database"));
    let history: Arc<dyn HistoryStore> = Arc::new(SqliteHistoryStore::new(db));

    let retrieval: Arc<dyn ContextProvider> = Arc::new(HttpContextProvider::new(
        &config.embedding_service_url,
        &config.embedding_service_endpoint,
    ));

    log::info!("Initializing tool registry");
    let registry = Arc::new(tools::create_default_registry(
        retrieval.clone(),
        config.retrieval_k,
    ));
    log::info!("Registered {} tools", registry.len());

    let factory: Arc<dyn ModelFactory> = Arc::new(OpenAiFactory::from_config(&config));

    let orchestrator = Arc::new(StreamOrchestrator::new(
        &config,
        factory,
        history.clone(),
        retrieval,
        registry,
    ));

    log::info!(
        "Starting chat server on port {} (answer strategy: {})",
        port,
        config.answer_strategy.as_str()
    );

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .expose_headers(["X-Conversation-Id"])
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(AppState {
                config: config.clone(),
                history: Arc::clone(&history),
                orchestrator: Arc::clone(&orchestrator),
            }))
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::chat::config)
            .configure(controllers::health::config)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
