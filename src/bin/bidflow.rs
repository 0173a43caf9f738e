// Auction bid submission demo
// Validate/quote/sign/submit per bid, then seq, par, or best-effort over the batch

use anyhow::Result;
use outcome::bidflow::{self, Backend};
use outcome::config::Config;
use std::sync::Arc;
use std::time::Instant;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("🚀 Starting bidflow");

    // Load configuration (CLI > Env > File > Defaults)
    let config = Config::load()?;
    config.print_summary();

    if config.bids.is_empty() {
        log::warn!("No bids given. Pass --bid bidder:lot:amount one or more times");
        return Ok(());
    }

    let backend = Arc::new(Backend::from_config(&config));
    let batch = bidflow::submit_all(config.bids.clone(), Arc::clone(&backend), config.mode());

    log::info!("📤 Submitting {} bid(s) in {} mode", config.bids.len(), config.mode());
    let started = Instant::now();
    let outcome = batch.await;
    log::info!(
        "✅ Batch settled in {}ms ({} accepted by backend)",
        started.elapsed().as_millis(),
        backend.submissions()
    );

    if config.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", bidflow::alert(outcome));
    }

    Ok(())
}
