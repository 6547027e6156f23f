use actix_web::HttpServer;

use nilhub::config::Config;
use nilhub::db;
use nilhub::state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;

    let database = db::connect(&config).await.map_err(|e| {
        log::error!("Failed to connect to MongoDB: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e)
    })?;
    if let Err(e) = db::ensure_indexes(&database).await {
        log::error!("Failed to create indexes: {}", e);
    }

    let state = AppState::new(&config, &database);
    let address = config.bind_address();
    log::info!("Starting server on {} ({:?})", address, config.environment);

    HttpServer::new(move || nilhub::app(state.clone()))
        .bind(address)?
        .run()
        .await
}
