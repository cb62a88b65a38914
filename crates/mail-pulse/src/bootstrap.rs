use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use pulse_core::models::RecordKind;
use pulse_core::settings::Settings;
use pulse_data::reader::{detect_kind, find_csv_files};
use pulse_runtime::loader::InputFile;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a `--log-level` name to an [`EnvFilter`] directive.
pub fn level_directive(log_level: &str) -> &'static str {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" | "WARN" => "warn",
        "ERROR" => "error",
        _ => "info",
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Output goes to stderr, or is appended to `log_file` when one is given.
/// `RUST_LOG` takes precedence over `log_level` when set.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(log_level)));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()?;
        }
        None => {
            let layer = fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()?;
        }
    }

    Ok(())
}

// ── Input discovery ────────────────────────────────────────────────────────────

/// Find one export of each kind under `dir`, sniffing kinds from headers.
///
/// When several files match a kind, the first in path order wins.
pub fn discover_files(dir: &Path) -> Vec<InputFile> {
    let mut found: Vec<InputFile> = Vec::new();

    for path in find_csv_files(dir) {
        let text = match std::fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!("Skipping unreadable file {}: {}", path.display(), e);
                continue;
            }
        };

        let Some(kind) = detect_kind(&text) else {
            debug!("No export kind recognised for {}", path.display());
            continue;
        };

        if let Some(existing) = found.iter().find(|f| f.kind == kind) {
            warn!(
                "Ignoring {}: {} already provided by {}",
                path.display(),
                kind.label(),
                existing.path.display()
            );
            continue;
        }
        debug!("Discovered {} at {}", kind.label(), path.display());
        found.push(InputFile::new(kind, path));
    }

    found
}

/// The files to load, in load order.
///
/// Explicit `--campaigns` / `--flows` / `--subscribers` paths override what
/// `--dir` discovery finds for the same kind.
pub fn collect_inputs(settings: &Settings) -> Vec<InputFile> {
    let mut by_kind: HashMap<RecordKind, PathBuf> = HashMap::new();

    if let Some(dir) = &settings.dir {
        for file in discover_files(dir) {
            by_kind.insert(file.kind, file.path);
        }
    }

    let explicit = [
        (RecordKind::Campaigns, &settings.campaigns),
        (RecordKind::Flows, &settings.flows),
        (RecordKind::Subscribers, &settings.subscribers),
    ];
    for (kind, path) in explicit {
        if let Some(path) = path {
            by_kind.insert(kind, path.clone());
        }
    }

    RecordKind::all()
        .into_iter()
        .filter_map(|kind| by_kind.remove(&kind).map(|path| InputFile::new(kind, path)))
        .collect()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
