//! Async export loading.
//!
//! Files are read in fixed-size chunks so a caller can show progress and
//! cancel between chunks. Each file succeeds or fails on its own.

use std::path::{Path, PathBuf};

use pulse_core::error::{IngestError, PulseError};
use pulse_core::models::RecordKind;
use pulse_data::reader::{parse_csv, ParsedFile};
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Bytes read per chunk.
pub const CHUNK_SIZE: usize = 64 * 1024;

// ── Public types ──────────────────────────────────────────────────────────────

/// One export to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub kind: RecordKind,
    pub path: PathBuf,
}

impl InputFile {
    pub fn new(kind: RecordKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Read progress of the file currently loading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadProgress {
    pub kind: RecordKind,
    /// 0–100, by bytes read.
    pub percent: f64,
}

/// Outcome of one load.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    /// No file failed and the load was not cancelled.
    pub success: bool,
    /// One labelled message per failed file.
    pub errors: Vec<String>,
    /// One summary per file that had rows dropped.
    pub warnings: Vec<String>,
    pub cancelled: bool,
    /// Kinds that loaded successfully, in load order.
    pub loaded: Vec<RecordKind>,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Read and parse `files` in order.
///
/// A cancelled load stops at the next chunk boundary and returns the files
/// parsed so far together with a report marked `cancelled`.
pub async fn read_and_parse<F>(
    files: &[InputFile],
    mut on_progress: F,
    cancel: &CancellationToken,
) -> (Vec<ParsedFile>, LoadReport)
where
    F: FnMut(LoadProgress),
{
    let mut parsed = Vec::new();
    let mut report = LoadReport::default();

    for file in files {
        let result = match read_chunked(file, &mut on_progress, cancel).await {
            Ok(text) => parse_csv(file.kind, &text).map_err(PulseError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(parsed_file) => {
                if !parsed_file.warnings.is_empty() {
                    report.warnings.push(format!(
                        "{}: {} rows skipped due to validation errors",
                        file.kind.label(),
                        parsed_file.warnings.len()
                    ));
                }
                debug!(
                    "{}: parsed {} rows from {}",
                    file.kind.label(),
                    parsed_file.rows.len(),
                    file.path.display()
                );
                report.loaded.push(file.kind);
                parsed.push(parsed_file);
            }
            Err(PulseError::Ingest(IngestError::Cancelled)) => {
                info!("Load cancelled while reading {}", file.path.display());
                report.cancelled = true;
                return (parsed, report);
            }
            Err(e) => {
                warn!("{}: {}", file.kind.label(), e);
                report.errors.push(format!("{}: {}", file.kind.label(), e));
            }
        }
    }

    report.success = report.errors.is_empty();
    (parsed, report)
}

/// Percentage of `read` out of `size`, clamped to 100. Empty files are done.
pub fn progress_percent(read: u64, size: u64) -> f64 {
    if size == 0 {
        return 100.0;
    }
    (read as f64 / size as f64 * 100.0).min(100.0)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn read_error(path: &Path, source: std::io::Error) -> PulseError {
    PulseError::FileRead {
        path: path.to_path_buf(),
        source,
    }
}

async fn read_chunked<F>(
    file: &InputFile,
    on_progress: &mut F,
    cancel: &CancellationToken,
) -> Result<String, PulseError>
where
    F: FnMut(LoadProgress),
{
    let mut handle = tokio::fs::File::open(&file.path)
        .await
        .map_err(|e| read_error(&file.path, e))?;
    let size = handle.metadata().await.map(|m| m.len()).unwrap_or(0);

    let mut bytes: Vec<u8> = Vec::with_capacity(size as usize);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    on_progress(LoadProgress {
        kind: file.kind,
        percent: 0.0,
    });

    loop {
        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled.into());
        }
        let n = handle
            .read(&mut chunk)
            .await
            .map_err(|e| read_error(&file.path, e))?;
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..n]);
        on_progress(LoadProgress {
            kind: file.kind,
            percent: progress_percent(bytes.len() as u64, size),
        });
        tokio::task::yield_now().await;
    }

    on_progress(LoadProgress {
        kind: file.kind,
        percent: 100.0,
    });

    Ok(String::from_utf8(bytes).unwrap_or_else(|e| {
        warn!(
            "{}: {} is not valid UTF-8; replacing invalid bytes",
            file.kind.label(),
            file.path.display()
        );
        String::from_utf8_lossy(e.as_bytes()).into_owned()
    }))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CAMPAIGNS: &str = "Send Time,Total Recipients,Unique Opens,Unique Clicks,Revenue\n\
2024-03-01 10:00:00,1000,250,40,500\n\
,1000,250,40,500\n";

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(0, 0), 100.0);
        assert_eq!(progress_percent(50, 200), 25.0);
        assert_eq!(progress_percent(300, 200), 100.0);
    }

    #[tokio::test]
    async fn test_read_and_parse_reports_row_warnings() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "campaigns.csv", CAMPAIGNS);
        let files = vec![InputFile::new(RecordKind::Campaigns, path)];

        let (parsed, report) = read_and_parse(&files, |_| {}, &CancellationToken::new()).await;

        assert!(report.success);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].rows.len(), 1);
        assert_eq!(
            report.warnings,
            vec!["Campaigns file: 1 rows skipped due to validation errors"]
        );
        assert_eq!(report.loaded, vec![RecordKind::Campaigns]);
    }

    #[tokio::test]
    async fn test_failed_file_does_not_block_others() {
        let dir = TempDir::new().unwrap();
        let campaigns = write(&dir, "campaigns.csv", CAMPAIGNS);
        let flows = write(&dir, "flows.csv", "just,some\nmetadata,rows\n");
        let files = vec![
            InputFile::new(RecordKind::Flows, flows),
            InputFile::new(RecordKind::Campaigns, campaigns),
        ];

        let (parsed, report) = read_and_parse(&files, |_| {}, &CancellationToken::new()).await;

        assert!(!report.success);
        assert_eq!(parsed.len(), 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0]
            .starts_with("Flows file: file does not contain enough rows / headers not found"));
    }

    #[tokio::test]
    async fn test_missing_file_is_labelled_error() {
        let dir = TempDir::new().unwrap();
        let files = vec![InputFile::new(
            RecordKind::Subscribers,
            dir.path().join("absent.csv"),
        )];
        let (parsed, report) = read_and_parse(&files, |_| {}, &CancellationToken::new()).await;
        assert!(parsed.is_empty());
        assert!(report.errors[0].starts_with("Subscribers file: Failed to read file"));
    }

    #[tokio::test]
    async fn test_progress_reaches_100_monotonically() {
        let dir = TempDir::new().unwrap();
        // Several chunks worth of rows.
        let mut content = String::from("Send Time,Total Recipients,Unique Opens,Unique Clicks,Revenue\n");
        while content.len() < CHUNK_SIZE * 3 {
            content.push_str("2024-03-01 10:00:00,1000,250,40,500\n");
        }
        let path = write(&dir, "campaigns.csv", &content);
        let files = vec![InputFile::new(RecordKind::Campaigns, path)];

        let mut seen: Vec<f64> = Vec::new();
        let (_, report) =
            read_and_parse(&files, |p| seen.push(p.percent), &CancellationToken::new()).await;

        assert!(report.success);
        assert!(seen.len() >= 4);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last().copied(), Some(100.0));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "campaigns.csv", CAMPAIGNS);
        let files = vec![InputFile::new(RecordKind::Campaigns, path)];

        let cancel = CancellationToken::new();
        cancel.cancel();
        let (parsed, report) = read_and_parse(&files, |_| {}, &cancel).await;

        assert!(parsed.is_empty());
        assert!(report.cancelled);
        assert!(!report.success);
    }
}
