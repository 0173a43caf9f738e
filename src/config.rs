// Configuration for the bidflow demo
// Priority: CLI args > Environment variables > Config file > Defaults

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::bidflow::{BidForm, SubmitMode};

pub const DEFAULT_LATENCY_MS: u64 = 50;
pub const MAX_LATENCY_MS: u64 = 10_000;
pub const DEFAULT_MIN_BID_LOVELACE: u64 = 1_000_000;
pub const DEFAULT_RESERVE_LOVELACE: u64 = 5_000_000;

#[derive(Debug, Clone, Parser)]
#[command(name = "bidflow")]
#[command(about = "Submit auction bids through a validate/quote/sign/submit pipeline")]
pub struct Config {
    /// Bid to submit as bidder:lot:amount (amount in lovelace, may be empty)
    #[arg(long = "bid")]
    pub bids: Vec<BidForm>,

    /// Simulated backend latency per call in milliseconds
    #[arg(long, env = "BIDFLOW_LATENCY_MS")]
    pub latency_ms: Option<u64>,

    /// Smallest amount the form accepts
    #[arg(long, env = "BIDFLOW_MIN_BID_LOVELACE")]
    pub min_bid_lovelace: Option<u64>,

    /// Reserve price quoted for every lot
    #[arg(long, env = "BIDFLOW_RESERVE_LOVELACE")]
    pub reserve_lovelace: Option<u64>,

    /// Lots that no longer take bids
    #[arg(long, env = "BIDFLOW_CLOSED_LOTS", value_delimiter = ',')]
    pub closed_lots: Option<Vec<String>>,

    /// Lots whose quote endpoint is unreachable
    #[arg(long, env = "BIDFLOW_OFFLINE_LOTS", value_delimiter = ',')]
    pub offline_lots: Option<Vec<String>>,

    /// Bidders whose wallet refuses to sign
    #[arg(long, env = "BIDFLOW_REJECTING_BIDDERS", value_delimiter = ',')]
    pub rejecting_bidders: Option<Vec<String>>,

    /// Drop the first submission attempt of every bid (`--flaky-network false` turns it off)
    #[arg(
        long,
        env = "BIDFLOW_FLAKY_NETWORK",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub flaky_network: Option<bool>,

    /// Submission mode: seq, par, or best-effort
    #[arg(long, env = "BIDFLOW_MODE")]
    pub mode: Option<SubmitMode>,

    /// Print the batch outcome as JSON instead of an alert line
    #[arg(long)]
    pub json: bool,

    /// Optional config file path (TOML format)
    #[arg(long, env = "BIDFLOW_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,
}

/// Configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub submit: SubmitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackendConfig {
    pub latency_ms: Option<u64>,
    pub reserve_lovelace: Option<u64>,
    pub closed_lots: Option<Vec<String>>,
    pub offline_lots: Option<Vec<String>>,
    pub rejecting_bidders: Option<Vec<String>>,
    pub flaky_network: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SubmitConfig {
    pub mode: Option<SubmitMode>,
    pub min_bid_lovelace: Option<u64>,
}

impl Config {
    /// Load configuration with full priority chain: CLI > Env > File > Defaults
    pub fn load() -> Result<Self> {
        Self::resolve(Self::parse())
    }

    /// Same as [`Config::load`] with explicit arguments instead of `std::env::args`
    pub fn load_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let parsed = Self::try_parse_from(args).context("Failed to parse arguments")?;
        Self::resolve(parsed)
    }

    fn resolve(mut config: Self) -> Result<Self> {
        if let Some(config_file) = config.config_file.clone() {
            log::info!("📄 Loading configuration from {}", config_file.display());
            let file_config = Self::load_from_file(&config_file)?;
            config.merge_with_file(file_config);
        }

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<ConfigFile> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }

    /// Merge with file configuration (only if CLI/env not set)
    fn merge_with_file(&mut self, file: ConfigFile) {
        if self.latency_ms.is_none() {
            self.latency_ms = file.backend.latency_ms;
        }
        if self.reserve_lovelace.is_none() {
            self.reserve_lovelace = file.backend.reserve_lovelace;
        }
        if self.closed_lots.is_none() {
            self.closed_lots = file.backend.closed_lots;
        }
        if self.offline_lots.is_none() {
            self.offline_lots = file.backend.offline_lots;
        }
        if self.rejecting_bidders.is_none() {
            self.rejecting_bidders = file.backend.rejecting_bidders;
        }
        if self.flaky_network.is_none() {
            self.flaky_network = file.backend.flaky_network;
        }
        if self.mode.is_none() {
            self.mode = file.submit.mode;
        }
        if self.min_bid_lovelace.is_none() {
            self.min_bid_lovelace = file.submit.min_bid_lovelace;
        }
    }

    /// Apply default values for missing configuration
    fn apply_defaults(&mut self) {
        self.latency_ms.get_or_insert(DEFAULT_LATENCY_MS);
        self.min_bid_lovelace.get_or_insert(DEFAULT_MIN_BID_LOVELACE);
        self.reserve_lovelace.get_or_insert(DEFAULT_RESERVE_LOVELACE);
        self.mode.get_or_insert(SubmitMode::Par);
        self.flaky_network.get_or_insert(false);

        // `--closed-lots ""` is an explicit empty list
        for list in [
            &mut self.closed_lots,
            &mut self.offline_lots,
            &mut self.rejecting_bidders,
        ] {
            list.get_or_insert_with(Vec::new)
                .retain(|entry| !entry.trim().is_empty());
        }
    }

    fn validate(&self) -> Result<()> {
        let latency = self.latency_ms();
        if latency > MAX_LATENCY_MS {
            anyhow::bail!(
                "BIDFLOW_LATENCY_MS must be in [0, {}], got {}",
                MAX_LATENCY_MS,
                latency
            );
        }
        if self.min_bid_lovelace() == 0 {
            anyhow::bail!("BIDFLOW_MIN_BID_LOVELACE must be > 0");
        }
        if let Some(lot) = self
            .closed_lots()
            .iter()
            .find(|lot| self.offline_lots().contains(lot))
        {
            anyhow::bail!("Lot {} cannot be both closed and offline", lot);
        }
        Ok(())
    }

    pub fn print_summary(&self) {
        log::info!("⚙️  Configuration:");
        log::info!("  ⏱️  Latency: {}ms", self.latency_ms());
        log::info!("  💰 Min Bid: {} lovelace", self.min_bid_lovelace());
        log::info!("  🏷️  Reserve: {} lovelace", self.reserve_lovelace());
        log::info!("  🎬 Mode: {}", self.mode());

        if !self.closed_lots().is_empty() {
            log::info!("  🔒 Closed Lots: {}", self.closed_lots().join(", "));
        }
        if !self.offline_lots().is_empty() {
            log::info!("  📴 Offline Lots: {}", self.offline_lots().join(", "));
        }
        if !self.rejecting_bidders().is_empty() {
            log::info!("  🚫 Rejecting Wallets: {}", self.rejecting_bidders().join(", "));
        }
        if self.flaky_network() {
            log::info!("  📡 Flaky Network: ENABLED");
        }
    }

    pub fn latency_ms(&self) -> u64 {
        self.latency_ms.unwrap_or(DEFAULT_LATENCY_MS)
    }

    pub fn min_bid_lovelace(&self) -> u64 {
        self.min_bid_lovelace.unwrap_or(DEFAULT_MIN_BID_LOVELACE)
    }

    pub fn reserve_lovelace(&self) -> u64 {
        self.reserve_lovelace.unwrap_or(DEFAULT_RESERVE_LOVELACE)
    }

    pub fn closed_lots(&self) -> &[String] {
        self.closed_lots.as_deref().unwrap_or_default()
    }

    pub fn offline_lots(&self) -> &[String] {
        self.offline_lots.as_deref().unwrap_or_default()
    }

    pub fn rejecting_bidders(&self) -> &[String] {
        self.rejecting_bidders.as_deref().unwrap_or_default()
    }

    pub fn flaky_network(&self) -> bool {
        self.flaky_network.unwrap_or(false)
    }

    pub fn mode(&self) -> SubmitMode {
        self.mode.unwrap_or(SubmitMode::Par)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_toml(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("bidflow-{}-{name}.toml", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = Config::load_from(["bidflow"]).unwrap();
        assert_eq!(config.min_bid_lovelace(), DEFAULT_MIN_BID_LOVELACE);
        assert_eq!(config.reserve_lovelace(), DEFAULT_RESERVE_LOVELACE);
        assert!(config.bids.is_empty());
    }

    #[test]
    fn test_bids_and_lists_from_cli() {
        let config = Config::load_from([
            "bidflow",
            "--bid",
            "alice:lot-1:7000000",
            "--bid",
            "bob:lot-2:",
            "--closed-lots",
            "lot-3,lot-4",
            "--mode",
            "seq",
        ])
        .unwrap();
        assert_eq!(config.bids.len(), 2);
        assert_eq!(config.bids[1].amount_lovelace, None);
        assert_eq!(config.closed_lots(), ["lot-3", "lot-4"]);
        assert_eq!(config.mode(), SubmitMode::Seq);
    }

    #[test]
    fn test_file_fills_gaps_but_cli_wins() {
        let path = temp_toml(
            "merge",
            r#"
[backend]
latency_ms = 5
reserve_lovelace = 2000000
closed_lots = ["lot-7"]
flaky_network = true

[submit]
mode = "best-effort"
"#,
        );
        let config = Config::load_from([
            "bidflow",
            "--reserve-lovelace",
            "3000000",
            "--config-file",
            path.to_str().unwrap(),
        ])
        .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.latency_ms(), 5);
        assert_eq!(config.reserve_lovelace(), 3_000_000);
        assert_eq!(config.closed_lots(), ["lot-7"]);
        assert!(config.flaky_network());
        assert_eq!(config.mode(), SubmitMode::BestEffort);
    }

    #[test]
    fn test_explicit_cli_values_beat_the_file() {
        let path = temp_toml(
            "override",
            r#"
[backend]
closed_lots = ["lot-7"]
rejecting_bidders = ["mallory"]
flaky_network = true
"#,
        );
        let config = Config::load_from([
            "bidflow",
            "--flaky-network",
            "false",
            "--closed-lots",
            "",
            "--config-file",
            path.to_str().unwrap(),
        ])
        .unwrap();
        std::fs::remove_file(&path).ok();

        assert!(!config.flaky_network());
        assert!(config.closed_lots().is_empty());
        // not given on the CLI, so the file still applies
        assert_eq!(config.rejecting_bidders(), ["mallory"]);
    }

    #[test]
    fn test_bare_flag_turns_flaky_network_on() {
        let config = Config::load_from(["bidflow", "--flaky-network", "--mode", "seq"]).unwrap();
        assert!(config.flaky_network());
        assert_eq!(config.mode(), SubmitMode::Seq);
    }

    #[test]
    fn test_latency_out_of_range_is_rejected() {
        let err = Config::load_from(["bidflow", "--latency-ms", "10001"]).unwrap_err();
        assert!(err.to_string().contains("BIDFLOW_LATENCY_MS"));
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        let err = Config::load_from(["bidflow", "--config-file", "/nonexistent/bidflow.toml"])
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
