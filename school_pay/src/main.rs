mod config;
mod error;
mod handlers;
mod state;
#[cfg(test)]
mod test_support;
mod verification;

use actix_web::{App, HttpServer, middleware::Logger, web};
use dotenv::dotenv;
use pretty_env_logger::env_logger::{Builder, Env};

use crate::config::AppConfig;

fn startup_error(stage: &str, e: anyhow::Error) -> std::io::Error {
    log::error!("{} failed: {:#}", stage, e);
    std::io::Error::other(e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let logger_env = Env::default().default_filter_or("info");
    let mut logger_builder = Builder::from_env(logger_env);
    logger_builder.init();

    if cli::run_cli().await {
        return Ok(());
    }

    let config =
        AppConfig::from_env().map_err(|e| startup_error("Application initialization", e))?;

    let state = config
        .create_app_state()
        .await
        .map_err(|e| startup_error("Application initialization", e))?;

    log::info!("App state initialized successfully");

    if let Some(payments_csv) = &config.payments_csv {
        state
            .initialize_data_from_files(payments_csv)
            .await
            .map_err(|e| startup_error("Data initialization", e))?;
        log::info!("Initial payments loaded successfully");
    }

    let data = web::Data::new(state);

    log::info!(
        "Listening on {}:{}, verifying against {}",
        config.bind_addr,
        config.port,
        config.gateway.base_url
    );

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(Logger::new("%a %t %r %s  %{Referer}i %Dms"))
            .configure(handlers::configure)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}
