use std::io;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod balance;
mod config;
mod error;
mod exchange;
mod export;
mod mongo;
mod repository;
mod routes;
mod schemas;
mod summary;

use config::Config;
use mongo::MongoRepository;
use repository::{MemoryRepository, Repository};

async fn serve<R>(repo: R, config: &Config) -> io::Result<()>
where
    R: Repository + Send + Sync + 'static,
{
    let repo = web::Data::new(repo);
    info!("Listening on {}:{}", config.bind_address, config.port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(repo.clone())
            .configure(routes::configure::<R>)
    })
    .bind((config.bind_address.as_str(), config.port))?
    .run()
    .await
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

    match &config.mongodb_uri {
        Some(uri) => {
            let repo = MongoRepository::connect(uri, &config.database)
                .await
                .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
            serve(repo, &config).await
        }
        None => {
            warn!("MONGODB_URI is not set, members and expenses are kept in memory only");
            serve(MemoryRepository::new(), &config).await
        }
    }
}
