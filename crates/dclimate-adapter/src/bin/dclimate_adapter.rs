//! dClimate adapter server
//!
//! Loads the API description documents, binds every endpoint to the data
//! provider gateway and serves `POST /api` until Ctrl+C.

use argh::FromArgs;
use dclimate_adapter::provider::GatewayCapability;
use dclimate_adapter::{Adapter, AdapterConfig, ApiDocument, CapabilityRegistry, SchemaTable};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(FromArgs)]
/// dClimate oracle adapter
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// address to listen on (overrides the configuration)
    #[argh(option, short = 'l')]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    let args: Args = argh::from_env();

    let mut config = match &args.config {
        Some(path) => match AdapterConfig::from_file(path) {
            Ok(config) => {
                log::info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                log::error!("Failed to load config {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => AdapterConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.listen = listen;
        config.validate()?;
    }
    let addr = config.listen_addr()?;

    let gateway = GatewayCapability::new(&config.gateway.url, config.gateway.timeout())?;
    let registry = CapabilityRegistry::with_defaults(Arc::new(gateway));
    log::info!("Data provider gateway: {}", config.gateway.url);

    let mut documents = Vec::with_capacity(config.api_documents.len());
    for path in &config.api_documents {
        match ApiDocument::from_file(path) {
            Ok(document) => documents.push(document),
            Err(e) => {
                log::error!("Failed to load API document: {}", e);
                std::process::exit(1);
            }
        }
    }
    let table = match SchemaTable::build(&documents, &registry, Some(config.v4_base_path.as_str())) {
        Ok(table) => table,
        Err(e) => {
            log::error!("Failed to build schema table: {}", e);
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C, shutting down gracefully...");
        shutdown_tx.send(()).ok();
    })?;

    let adapter = Arc::new(Adapter::new(table));
    dclimate_adapter::api::serve(adapter, addr, shutdown_rx).await?;
    Ok(())
}
