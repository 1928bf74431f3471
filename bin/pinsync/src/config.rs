//! Configuration loading.
//!
//! Priority (highest wins):
//! 1. CLI flags
//! 2. Config file (TOML)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Result, WrapErr};
use pinsync_client::{IpfsApiConfig, LedgerConfig};
use pinsync_engine::ReconcilerConfig;
use serde::Deserialize;

use crate::cli::RunArgs;

/// Default seconds between reconciliation cycles.
const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Default data directory.
const DEFAULT_DATA_DIR: &str = "pinsync-data";

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Storage daemon connection.
    pub daemon: DaemonSection,
    /// Ledger gateway connection.
    pub ledger: LedgerSection,
    /// Reconciliation policy.
    pub sync: SyncSection,
}

/// `[daemon]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonSection {
    /// Base URL of the daemon RPC API.
    pub api_url: String,
    /// Timeout per pin/unpin/fetch call, in seconds.
    pub call_timeout_secs: u64,
    /// Timeout for garbage collection, in seconds.
    pub gc_timeout_secs: u64,
    /// Cap on fetched profile-document size, in bytes.
    pub max_fetch_bytes: usize,
}

impl Default for DaemonSection {
    fn default() -> Self {
        let defaults = IpfsApiConfig::default();
        Self {
            api_url: defaults.api_url,
            call_timeout_secs: defaults.call_timeout.as_secs(),
            gc_timeout_secs: defaults.gc_timeout.as_secs(),
            max_fetch_bytes: defaults.max_fetch_bytes,
        }
    }
}

/// `[ledger]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerSection {
    /// Base URL of the ledger gateway. Required.
    pub gateway_url: String,
    /// This node's identity as registered on the ledger. Required.
    pub node_id: String,
    /// Timeout per resolution call, in seconds.
    pub call_timeout_secs: u64,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            gateway_url: String::new(),
            node_id: String::new(),
            call_timeout_secs: 30,
        }
    }
}

/// `[sync]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSection {
    /// Seconds between reconciliation cycles.
    pub interval_secs: u64,
    /// Failed pin attempts before a CID is quarantined.
    pub max_pin_retries: u32,
    /// Trigger daemon garbage collection every N cycles (0 disables).
    pub gc_interval_cycles: u64,
    /// Bound on concurrent pin/unpin calls within one cycle.
    pub max_concurrent_ops: usize,
    /// Re-probe quarantined CIDs every N cycles (unset never re-probes).
    pub probe_quarantined_after_cycles: Option<u64>,
    /// How long removed records are kept for audit, in seconds.
    pub removed_retention_secs: u64,
    /// Data directory for the pin-state database.
    pub data_dir: PathBuf,
    /// Path of the quarantine report artifact. Defaults to
    /// `<data_dir>/quarantine.json`.
    pub report_path: Option<PathBuf>,
}

impl Default for SyncSection {
    fn default() -> Self {
        let defaults = ReconcilerConfig::default();
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            max_pin_retries: defaults.max_pin_retries,
            gc_interval_cycles: defaults.gc_interval_cycles,
            max_concurrent_ops: defaults.max_concurrent_ops,
            probe_quarantined_after_cycles: defaults.probe_quarantined_after_cycles,
            removed_retention_secs: defaults.removed_retention_secs,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            report_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the given TOML file, or defaults if `None`.
    /// CLI overrides are applied separately after loading.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let Some(path) = config_path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&raw)
            .wrap_err_with(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Apply CLI flag overrides on top of the loaded configuration.
    pub fn apply_args(&mut self, args: &RunArgs) {
        if let Some(url) = &args.daemon.api_url {
            self.daemon.api_url = url.clone();
        }
        if let Some(url) = &args.ledger.gateway_url {
            self.ledger.gateway_url = url.clone();
        }
        if let Some(id) = &args.ledger.node_id {
            self.ledger.node_id = id.clone();
        }
        if let Some(secs) = args.sync.interval_secs {
            self.sync.interval_secs = secs;
        }
        if let Some(retries) = args.sync.max_pin_retries {
            self.sync.max_pin_retries = retries;
        }
        if let Some(cycles) = args.sync.gc_interval_cycles {
            self.sync.gc_interval_cycles = cycles;
        }
        if let Some(ops) = args.sync.max_concurrent_ops {
            self.sync.max_concurrent_ops = ops;
        }
        if let Some(cycles) = args.sync.probe_quarantined_after_cycles {
            self.sync.probe_quarantined_after_cycles = Some(cycles);
        }
        if let Some(dir) = &args.sync.data_dir {
            self.sync.data_dir = dir.clone();
        }
        if let Some(path) = &args.sync.report_path {
            self.sync.report_path = Some(path.clone());
        }
    }

    /// Storage daemon client configuration.
    pub fn ipfs_config(&self) -> IpfsApiConfig {
        IpfsApiConfig {
            api_url: self.daemon.api_url.clone(),
            call_timeout: Duration::from_secs(self.daemon.call_timeout_secs),
            gc_timeout: Duration::from_secs(self.daemon.gc_timeout_secs),
            max_fetch_bytes: self.daemon.max_fetch_bytes,
        }
    }

    /// Ledger client configuration.
    ///
    /// Fails when the gateway URL or node id is missing: there is no
    /// sensible default for either.
    pub fn ledger_config(&self) -> Result<LedgerConfig> {
        if self.ledger.gateway_url.is_empty() {
            eyre::bail!("ledger gateway URL is required (--ledger.gateway-url or [ledger] gateway_url)");
        }
        if self.ledger.node_id.is_empty() {
            eyre::bail!("ledger node id is required (--ledger.node-id or [ledger] node_id)");
        }
        Ok(LedgerConfig {
            gateway_url: self.ledger.gateway_url.clone(),
            node_id: self.ledger.node_id.clone(),
            call_timeout: Duration::from_secs(self.ledger.call_timeout_secs),
        })
    }

    /// Reconciler policy configuration.
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            max_pin_retries: self.sync.max_pin_retries,
            gc_interval_cycles: self.sync.gc_interval_cycles,
            max_concurrent_ops: self.sync.max_concurrent_ops,
            probe_quarantined_after_cycles: self.sync.probe_quarantined_after_cycles,
            removed_retention_secs: self.sync.removed_retention_secs,
        }
    }

    /// Interval between reconciliation cycles.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    /// Path of the pin-state database.
    pub fn db_path(&self) -> PathBuf {
        self.sync.data_dir.join("pins.redb")
    }

    /// Path of the quarantine report artifact.
    pub fn report_path(&self) -> PathBuf {
        self.sync
            .report_path
            .clone()
            .unwrap_or_else(|| self.sync.data_dir.join("quarantine.json"))
    }
}
