//! Session gated demo service
//!
//! Serves the registration and login pages under `/auth` and a single gated page at `/`.

use std::io::read_to_string;
use std::sync::Arc;

use actix_web::middleware::from_fn;
use actix_web::web::{self, ReqData};
use actix_web::{App, HttpServer};
use clap::Parser;
use color_eyre::Result;
use sessiongate::{Email, Model, StaticViews, gate, service};
use tracing::info;
use tracing_actix_web::TracingLogger;

use crate::config::{Config, LogFormat};
use crate::opt::Opt;

mod config;
mod opt;

/// Filter used when `RUST_LOG` is not set; sqlx reports every statement at info level
const DEFAULT_FILTER: &str = "info,sqlx=warn";

/// Initializes tracing collection
fn setup_tracing(config: config::Logging) -> Result<()> {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let fmt_layer = match config.format {
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    let filter_layer =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;

    let filter_layer = config
        .filters
        .into_iter()
        .fold(filter_layer, |layer, filter| layer.add_directive(filter));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .init();

    Ok(())
}

/// The gated page
async fn index(owner: ReqData<Email>) -> String {
    format!("Logged in as {}", owner.into_inner())
}

#[tokio::main]
async fn main() -> Result<()> {
    let Opt {
        config: mut config_file,
    } = Opt::parse();

    let config = read_to_string(&mut config_file)?;
    let config: Config = toml::from_str(&config)?;

    setup_tracing(config.logging)?;
    color_eyre::install()?;

    info!(
        config = ?config_file.path().path(),
        "Tracing initialized, setting up a service"
    );

    let cleanup_on_start = config.auth.session.cleanup_on_start;
    let model = Model::with_config(config.db, config.auth).await?;
    if cleanup_on_start {
        let purged = model.cleanup().await?;
        info!(purged, "Expired sessions purged");
    }

    let auth_config = service::configure(model, Arc::new(StaticViews::new()));
    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .configure(auth_config.clone())
            .service(web::resource("/").wrap(from_fn(gate)).to(index))
    })
    .bind(config.host)?
    .run()
    .await?;

    info!("Service stopped, tearing down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::EnvFilter;

    use super::DEFAULT_FILTER;

    #[test]
    fn default_filter_quiets_queries() {
        let filter = EnvFilter::try_new(DEFAULT_FILTER).unwrap().to_string();
        assert!(filter.contains("sqlx=warn"));
    }
}
