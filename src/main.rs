// src/main.rs
use actix_web::{App, HttpServer, middleware, web};
use anyhow::Context;
use log::{info, warn};
use mailsketch::config::{AppConfig, CompilerSettings};
use mailsketch::{AppState, configure};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting MailSketch service...");

    let config = AppConfig::from_env().context("invalid configuration")?;

    for provider in config.providers.iter().filter(|p| p.api_key.is_none()) {
        warn!(
            "{} API key not set; requests naming it will fall through",
            provider.name
        );
    }
    if config.figma_token.is_none() {
        warn!("FIGMA_ACCESS_TOKEN not set; Figma conversions are disabled");
    }
    match &config.compiler {
        CompilerSettings::Api { base_url, .. } => {
            info!("Compiling through the MJML API at {}", base_url)
        }
        CompilerSettings::Cli { binary } => info!("Compiling with the local '{}' binary", binary),
    }
    info!(
        "Provider order: {} (then synthesized)",
        config.provider_order.join(", ")
    );

    let bind_address = config.bind_address.clone();
    let app_state = AppState::from_config(config);

    info!("Starting HTTP server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("failed to bind {}", bind_address))?
    .run()
    .await
    .context("HTTP server stopped with an error")?;

    Ok(())
}
