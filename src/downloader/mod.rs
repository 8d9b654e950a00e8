// ─── Download Orchestrator ───
// Executes a batch of file transfers under bounded concurrency, feeding a
// typed event channel with throttled progress/speed/ETA telemetry.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::instance::ContentType;

const USER_AGENT: &str = concat!("modkeep/", env!("CARGO_PKG_VERSION"));

/// Telemetry cadence. Terminal events are never throttled.
const TELEMETRY_INTERVAL: Duration = Duration::from_millis(500);

const MIN_CONCURRENCY: usize = 1;
const MAX_CONCURRENCY: usize = 30;

/// One planned file transfer.
#[derive(Debug, Clone)]
pub struct DownloadEntry {
    pub url: String,
    /// Final on-disk location of the file.
    pub path: PathBuf,
    /// Directory containing `path`; also the extraction target for archives.
    pub folder: PathBuf,
    /// Expected byte length, used by the pre-check and progress math.
    pub size: u64,
    /// Collection the file belongs to; drives post-processing.
    pub kind: ContentType,
}

/// Events emitted while a batch runs. Payloads are preformatted strings so
/// any server-push transport can relay them verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    /// Percent with two decimals, e.g. "42.31". Non-decreasing; ends at a
    /// single "100.00" when the batch completes.
    Progress(String),
    /// Rolling transfer rate, e.g. "3.52MB/s".
    Speed(String),
    /// Remaining time, e.g. "1m 12s".
    Estimated(String),
    /// An archive is being unpacked after the transfers finished.
    Extract(String),
    /// Terminal: every file landed (and extraction ran).
    Done(String),
    /// Terminal: the batch was cancelled; partial files stay on disk.
    Cancelled,
    /// A single transfer failed. The rest of the batch continues; the caller
    /// retries by re-submitting, relying on the size pre-check.
    Error(String),
}

/// Handle to a running batch: the event stream plus cooperative cancellation.
pub struct DownloadBatch {
    events: mpsc::UnboundedReceiver<DownloadEvent>,
    cancel: CancellationToken,
}

impl DownloadBatch {
    /// Next event; `None` once the batch task has finished and drained.
    pub async fn recv(&mut self) -> Option<DownloadEvent> {
        self.events.recv().await
    }

    /// Request cancellation. No new connections are opened afterwards;
    /// in-flight transfers run to completion and partial files are kept.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Concurrent batch downloader with size-based skip of completed files.
pub struct Downloader {
    client: Client,
    concurrency: usize,
}

impl Downloader {
    pub fn new(concurrency: usize) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            concurrency: concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY),
        }
    }

    /// Start a batch. Entries whose on-disk file already matches the
    /// expected size are excluded up front; when nothing remains, `None` is
    /// returned and no batch is started at all.
    pub async fn start(&self, entries: Vec<DownloadEntry>) -> CoreResult<Option<DownloadBatch>> {
        let mut pending = Vec::with_capacity(entries.len());
        for entry in entries {
            if needs_download(&entry.path, entry.size).await {
                pending.push(entry);
            } else {
                debug!("Skipping {:?}: already complete", entry.path);
            }
        }

        if pending.is_empty() {
            return Ok(None);
        }

        info!(
            "Starting batch download: {} files, concurrency={}",
            pending.len(),
            self.concurrency
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tokio::spawn(run_batch(
            self.client.clone(),
            self.concurrency,
            pending,
            tx,
            cancel.clone(),
        ));

        Ok(Some(DownloadBatch { events: rx, cancel }))
    }
}

/// A file is downloaded again unless it exists with exactly the expected
/// size. Partial files from a cancelled or failed run fail this check and
/// get re-fetched; complete ones are skipped.
async fn needs_download(path: &Path, expected_size: u64) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.len() != expected_size,
        Err(_) => true,
    }
}

async fn run_batch(
    client: Client,
    concurrency: usize,
    entries: Vec<DownloadEntry>,
    tx: mpsc::UnboundedSender<DownloadEvent>,
    cancel: CancellationToken,
) {
    let total: u64 = entries.iter().map(|e| e.size).sum();
    let downloaded = Arc::new(AtomicU64::new(0));
    let failures = Arc::new(AtomicUsize::new(0));

    let ticker_stop = CancellationToken::new();
    let ticker = tokio::spawn(telemetry_loop(
        downloaded.clone(),
        total,
        tx.clone(),
        ticker_stop.clone(),
    ));

    let results_entries = entries.clone();
    stream::iter(entries)
        .map(|entry| {
            let client = client.clone();
            let tx = tx.clone();
            let cancel = cancel.clone();
            let downloaded = downloaded.clone();
            let failures = failures.clone();
            async move {
                // Cooperative cancellation: nothing new starts once the
                // token flips, but the transfer below is never aborted
                // mid-flight.
                if cancel.is_cancelled() {
                    return;
                }
                if let Err(e) = download_one(&client, &entry, &downloaded).await {
                    failures.fetch_add(1, Ordering::SeqCst);
                    warn!("Download failed for {}: {}", entry.url, e);
                    let _ = tx.send(DownloadEvent::Error(e.to_string()));
                }
            }
        })
        .buffer_unordered(concurrency)
        .collect::<Vec<_>>()
        .await;

    ticker_stop.cancel();
    let _ = ticker.await;

    if cancel.is_cancelled() {
        let _ = tx.send(DownloadEvent::Cancelled);
        return;
    }

    if failures.load(Ordering::SeqCst) > 0 {
        // Error events already went out per file; no Done for a batch that
        // did not fully land. A re-submitted batch skips the finished files.
        return;
    }

    extract_world_archives(&results_entries, &tx).await;

    let _ = tx.send(DownloadEvent::Progress("100.00".to_string()));
    let _ = tx.send(DownloadEvent::Done("Download complete".to_string()));
}

/// Emits Progress/Speed/Estimated roughly every 500ms until stopped.
async fn telemetry_loop(
    downloaded: Arc<AtomicU64>,
    total: u64,
    tx: mpsc::UnboundedSender<DownloadEvent>,
    stop: CancellationToken,
) {
    let mut interval = tokio::time::interval(TELEMETRY_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick is immediate; consume it so the first report has a delta.
    interval.tick().await;

    let mut last_bytes = 0u64;
    loop {
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = interval.tick() => {}
        }

        let bytes = downloaded.load(Ordering::Relaxed);
        let _ = tx.send(DownloadEvent::Progress(format_percent(bytes, total)));

        let bytes_per_sec =
            (bytes - last_bytes) as f64 / TELEMETRY_INTERVAL.as_secs_f64();
        last_bytes = bytes;

        if let Some(speed) = format_speed(bytes_per_sec) {
            let _ = tx.send(DownloadEvent::Speed(speed));
        }
        let remaining = total.saturating_sub(bytes) as f64 / bytes_per_sec;
        if let Some(eta) = format_estimated(remaining) {
            let _ = tx.send(DownloadEvent::Estimated(eta));
        }
    }
}

async fn download_one(
    client: &Client,
    entry: &DownloadEntry,
    downloaded: &AtomicU64,
) -> CoreResult<()> {
    tokio::fs::create_dir_all(&entry.folder)
        .await
        .map_err(|e| CoreError::io(&entry.folder, e))?;

    let response = client.get(&entry.url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CoreError::DownloadFailed {
            url: entry.url.clone(),
            status: status.as_u16(),
        });
    }

    let mut file = tokio::fs::File::create(&entry.path)
        .await
        .map_err(|e| CoreError::io(&entry.path, e))?;

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| CoreError::io(&entry.path, e))?;
        downloaded.fetch_add(chunk.len() as u64, Ordering::Relaxed);
    }
    file.flush()
        .await
        .map_err(|e| CoreError::io(&entry.path, e))?;

    debug!("Downloaded: {} -> {:?}", entry.url, entry.path);
    Ok(())
}

/// World archives unpack into their containing folder once the batch is
/// done. Extraction failures are logged and never fail the batch.
async fn extract_world_archives(
    entries: &[DownloadEntry],
    tx: &mpsc::UnboundedSender<DownloadEvent>,
) {
    for entry in entries {
        if entry.kind != ContentType::Worlds {
            continue;
        }
        if entry.path.extension().and_then(|e| e.to_str()) != Some("zip") {
            continue;
        }

        let file_name = entry
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let _ = tx.send(DownloadEvent::Extract(format!("Extracting {}", file_name)));

        let archive_path = entry.path.clone();
        let target = entry.folder.clone();
        let result =
            tokio::task::spawn_blocking(move || extract_zip(&archive_path, &target)).await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to extract {}: {}", file_name, e),
            Err(e) => warn!("Extraction task panicked for {}: {}", file_name, e),
        }
    }
}

/// Unpack a zip, preserving its internal tree under `target`. Entries that
/// escape the target directory are rejected.
fn extract_zip(archive_path: &Path, target: &Path) -> CoreResult<()> {
    let file = std::fs::File::open(archive_path).map_err(|e| CoreError::io(archive_path, e))?;
    let mut archive = zip::ZipArchive::new(file)?;

    for index in 0..archive.len() {
        let mut zipped = archive.by_index(index)?;
        let rel_path = zipped
            .enclosed_name()
            .ok_or_else(|| CoreError::Other("Invalid zip entry path".into()))?;
        let out_path = target.join(rel_path);

        if zipped.name().ends_with('/') {
            std::fs::create_dir_all(&out_path).map_err(|e| CoreError::io(&out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }
        let mut out = std::fs::File::create(&out_path).map_err(|e| CoreError::io(&out_path, e))?;
        std::io::copy(&mut zipped, &mut out).map_err(|e| CoreError::io(&out_path, e))?;
    }

    Ok(())
}

fn format_percent(done: u64, total: u64) -> String {
    if total == 0 {
        return "100.00".to_string();
    }
    format!("{:.2}", done as f64 / total as f64 * 100.0)
}

/// `None` for anything non-finite or non-positive — bad values are
/// suppressed, never forwarded raw.
fn format_speed(bytes_per_sec: f64) -> Option<String> {
    if !bytes_per_sec.is_finite() || bytes_per_sec <= 0.0 {
        return None;
    }
    Some(format!("{:.2}MB/s", bytes_per_sec / 1024.0 / 1024.0))
}

fn format_estimated(seconds: f64) -> Option<String> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    let minutes = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    Some(format!("{}m {}s", minutes, secs))
}
