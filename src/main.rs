use std::io;
use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use iperfnet::config::Config;
use iperfnet::runner::NetnsRunner;
use iperfnet::server::{self, AppState};
use iperfnet::session::NetworkSession;
use iperfnet::topology::Topology;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let session = NetworkSession::start(
        Topology::lab(),
        Arc::new(NetnsRunner::new()),
        !config.no_provision,
    )
    .map_err(io::Error::other)?;
    let session = Arc::new(session);

    let state = web::Data::new(AppState {
        session: session.clone(),
        settings: config.run_settings(),
    });

    info!("listening on {}:{}", config.bind, config.port);
    let bound = HttpServer::new(move || App::new().app_data(state.clone()).configure(server::routes))
        .bind((config.bind.as_str(), config.port));
    let served = match bound {
        Ok(server) => server.run().await,
        Err(e) => Err(e),
    };

    session.stop();
    served
}
