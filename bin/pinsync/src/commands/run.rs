//! The `run` command: startup audit, then reconciliation cycles until
//! shutdown.

use eyre::{Result, WrapErr};
use pinsync_client::{HttpProfileSource, IpfsApiClient};
use pinsync_engine::Reconciler;
use pinsync_report::QuarantineReporter;
use pinsync_store::RedbPinStore;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::config::AppConfig;

pub async fn run(args: RunArgs) -> Result<()> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    config.apply_args(&args);
    let ledger_config = config.ledger_config()?;

    std::fs::create_dir_all(&config.sync.data_dir).wrap_err_with(|| {
        format!(
            "failed to create data directory: {}",
            config.sync.data_dir.display()
        )
    })?;
    let db_path = config.db_path();
    let store = RedbPinStore::open(&db_path)
        .wrap_err_with(|| format!("failed to open pin store: {}", db_path.display()))?;

    let node = IpfsApiClient::new(config.ipfs_config())?;
    let profiles = HttpProfileSource::new(ledger_config)?;
    let reporter = QuarantineReporter::new(config.report_path())?;

    let mut reconciler = Reconciler::new(
        store,
        node,
        profiles,
        reporter,
        config.reconciler_config(),
    );

    info!(
        daemon = %config.daemon.api_url,
        gateway = %config.ledger.gateway_url,
        node_id = %config.ledger.node_id,
        interval_secs = config.sync.interval_secs,
        "starting pin reconciliation"
    );

    let audit = reconciler.audit().await?;
    if audit.strays_released > 0 || audit.repins_scheduled > 0 {
        info!(
            strays = audit.strays_released,
            repins = audit.repins_scheduled,
            "startup audit reconciled daemon state"
        );
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "failed to listen for shutdown signal");
            return;
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    reconciler.run(config.interval(), shutdown_rx).await;
    Ok(())
}
