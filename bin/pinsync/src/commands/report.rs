//! The `report` command: print the current quarantine report.

use eyre::Result;
use pinsync_report::QuarantineReporter;

use crate::cli::ReportArgs;
use crate::config::AppConfig;

pub fn run(args: ReportArgs) -> Result<()> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(path) = args.report_path {
        config.sync.report_path = Some(path);
    }

    let reporter = QuarantineReporter::new(config.report_path())?;
    let entries = reporter.read()?;
    if entries.is_empty() {
        println!("no quarantined CIDs");
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}
