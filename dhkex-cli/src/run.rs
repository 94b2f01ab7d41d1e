//! Listen and connect modes.

use anyhow::{Context, Result};
use dhkex::{Config, SessionReport};

use crate::OutputFormat;

/// Serves sessions until the process is killed.
pub(crate) fn listen(config: Config, format: OutputFormat) -> Result<()> {
    let addr = format!("{}:{}", config.bind(), config.port());
    let never = dhkex::run_as_listener(config, move |report| print_report(&report, format))
        .with_context(|| format!("cannot listen on {addr}"))?;
    match never {}
}

/// Runs one session against `host` and prints its secret.
pub(crate) fn connect(config: &Config, host: &str, format: OutputFormat) -> Result<()> {
    let report = dhkex::run_as_connector(config, host, config.port())
        .with_context(|| format!("key exchange with {host}:{} failed", config.port()))?;
    print_report(&report, format);
    Ok(())
}

fn print_report(report: &SessionReport, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("Shared secret: {}", report.shared_secret),
        OutputFormat::Json => match serde_json::to_string(report) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::error!(error = %e, "cannot serialise session report"),
        },
    }
}
