use std::sync::Arc;

use actix_web::web;
use colored::Colorize;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::{
    config::{build_config, IngestConfig},
    telemetry::initialize_telemetry,
    ServiceProvider,
};
use crate::api::{self, file_ingest::WholeUploadLimit};

pub fn run() {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(x) => x,
        Err(e) => {
            return eprintln!("{}: {}", "Cannot build tokio runtime".red(), e);
        }
    };
    runtime.block_on(async_run());
}

pub async fn async_run() {
    let config = match build_config().and_then(|c| Ok(c.try_deserialize::<IngestConfig>()?)) {
        Ok(x) => x,
        Err(e) => {
            return eprintln!("{}: {}", "Cannot build config".red(), e);
        }
    };
    if let Err(e) = initialize_telemetry(&config.telemetry) {
        return eprintln!("{}: {}", "Cannot build logger".red(), e);
    };

    let service_provider = match ServiceProvider::from_config(config).await {
        Ok(x) => Arc::new(x),
        Err(e) => {
            return eprintln!("{}: {}", "Cannot build Service Provider".red(), e);
        }
    };
    let handles = service_provider
        .background_services
        .iter()
        .cloned()
        .map(|x| tokio::spawn(async move { x.run().await }))
        .collect::<Vec<JoinHandle<()>>>();
    tokio::select! {
        _ = initialize_web_host(service_provider) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Stopping services (ctrl-c handling).");
        }
    }
    for handle in handles {
        handle.abort()
    }
}

pub async fn initialize_web_host(sp: Arc<ServiceProvider>) {
    let host = sp.config.host.clone();
    // Leaves headroom so that oversized chunks reach the service and get a
    // proper `ChunkTooLarge` instead of a bare 413.
    let chunk_limit = (sp.config.upload.max_chunk_size as usize).saturating_mul(2);
    let service = web::Data::from(sp.ingestion_service.clone());
    let whole_limit = web::Data::new(WholeUploadLimit(host.max_whole_size));

    let server = match actix_web::HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_header()
            .allow_any_method()
            .max_age(86400);

        actix_web::App::new()
            .wrap(tracing_actix_web::TracingLogger::default())
            .wrap(cors)
            .app_data(service.clone())
            .app_data(whole_limit.clone())
            .app_data(web::PayloadConfig::new(chunk_limit))
            .configure(api::configure)
    })
    .bind((host.bind_address.to_owned(), host.bind_port))
    {
        Ok(x) => x,
        Err(e) => {
            return error!("Cannot bind {}:{}: {}", host.bind_address, host.bind_port, e);
        }
    };
    info!("Listening on {}:{}.", host.bind_address, host.bind_port);
    match server.disable_signals().run().await {
        Ok(_) => info!("Web server stopped successfully."),
        Err(e) => error!("Web server into error: {}", e),
    }
}
