mod bootstrap;
mod report;

use anyhow::{bail, Result};
use pulse_core::settings::Settings;
use pulse_core::time_utils::TimezoneHandler;
use pulse_runtime::data_store::DataStore;
use report::ReportQuery;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Mail Pulse v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "View: {}, Range: {}, Timezone: {}",
        settings.view,
        settings.range,
        settings.timezone
    );

    if !settings.has_inputs() {
        bail!("no exports given; pass --campaigns, --flows, --subscribers or --dir");
    }
    let query = ReportQuery::from_settings(&settings)?;

    let files = bootstrap::collect_inputs(&settings);
    if files.is_empty() {
        bail!("no recognisable CSV exports found");
    }

    let mut store = DataStore::new(TimezoneHandler::new(&settings.timezone));

    // Ctrl+C stops the load at the next chunk boundary.
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received; cancelling load");
            signal_token.cancel();
        }
    });

    let load = store
        .load_files_with_cancel(
            &files,
            |p| tracing::debug!("{}: {:.0}%", p.kind.label(), p.percent),
            cancel,
        )
        .await;
    signal.abort();

    if load.cancelled {
        eprintln!("Load cancelled");
        return Ok(());
    }
    for error in &load.errors {
        eprintln!("error: {}", error);
    }
    for warning in &load.warnings {
        eprintln!("warning: {}", warning);
    }
    if load.loaded.is_empty() {
        bail!("none of the exports could be loaded");
    }

    let output = report::render(&store, &query, settings.wants_json())?;
    println!("{}", output);

    Ok(())
}
