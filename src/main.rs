//! Entitlement sandbox
//!
//! Runs the entitlement engine against the in-memory sandbox provider
//! configured in `[sandbox]`.
//!
//! Usage:
//!   entitlement-sandbox --config sandbox.toml --purchase nonconsumable.unlock
//!   entitlement-sandbox --config sandbox.toml --restore --watch

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use entitlement_engine::adapters::provider::InMemoryPurchaseProvider;
use entitlement_engine::config::AppConfig;
use entitlement_engine::domain::foundation::ProductId;
use entitlement_engine::engine::EntitlementEngine;
use entitlement_engine::telemetry;

#[derive(Parser, Debug)]
#[command(name = "entitlement-sandbox")]
#[command(about = "Run the entitlement engine against the sandbox store")]
struct Args {
    /// Configuration file; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Product to purchase after startup (repeatable)
    #[arg(short, long)]
    purchase: Vec<String>,

    /// Resync purchase history after startup
    #[arg(long)]
    restore: bool,

    /// Keep listening for transaction updates until Ctrl-C
    #[arg(short, long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::load().context("loading configuration from environment")?,
    };
    config.validate().context("invalid configuration")?;
    telemetry::init(&config.telemetry);

    let sandbox = config
        .sandbox
        .as_ref()
        .context("the sandbox binary needs a [sandbox] section")?;
    let provider = Arc::new(InMemoryPurchaseProvider::from_config(sandbox)?);
    let engine = EntitlementEngine::new(provider, &config.store)?;

    let catalog = engine.start().await?;
    tracing::info!(
        non_consumables = catalog.non_consumables.len(),
        subscriptions = catalog.subscriptions.len(),
        offer_eligible = catalog.offer_eligible,
        "Sandbox store ready"
    );

    for raw in &args.purchase {
        let product_id: ProductId = raw.parse()?;
        match engine.purchase_product(&product_id).await {
            Ok(result) => match result.transaction() {
                Some(_) => tracing::info!(product_id = %product_id, "Purchased"),
                None => tracing::info!(product_id = %product_id, "Purchase did not complete"),
            },
            Err(error) => {
                tracing::error!(product_id = %product_id, error = %error, code = %error.code(), "Purchase failed")
            }
        }
    }

    if args.restore {
        engine.restore().await?;
    }

    if args.watch {
        tracing::info!("Listening for transaction updates, press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
    }

    println!("{}", serde_json::to_string_pretty(engine.snapshot().as_ref())?);
    engine.shutdown().await;
    Ok(())
}
