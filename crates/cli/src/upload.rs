//! `mapasctl upload`.

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use mapas_client::{
    Backend, BatchUploader, CategoryManager, QueueHandle, UploadEvents, UploadQueue,
    UploadSettings,
};
use mapas_core::UploadStatus;
use mapas_core::config::AppConfig;
use mapas_core::naming::farm_from_file_name;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Prints batch progress to stderr.
struct ConsoleEvents;

impl UploadEvents for ConsoleEvents {
    fn batch_started(&self, index: usize, batches: usize, files: usize) {
        eprintln!("Batch {index}/{batches}: uploading {files} file(s)...");
    }

    fn progress(&self, percent: u8) {
        eprintln!("  {percent}% done");
    }

    fn uploads_completed(&self, succeeded: usize) {
        eprintln!("{succeeded} map(s) uploaded.");
    }

    fn uploads_failed(&self, failed: usize) {
        eprintln!("{failed} upload(s) failed.");
    }
}

pub struct UploadArgs {
    pub category: String,
    pub farm: Option<String>,
    pub files: Vec<PathBuf>,
    pub retry_failed: bool,
}

pub async fn handle_upload_command(
    backend: &Backend,
    config: &AppConfig,
    args: UploadArgs,
) -> Result<()> {
    if args.files.is_empty() {
        bail!("select at least one file to upload");
    }

    // Read and check every file before touching the backend.
    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("invalid file name: {}", path.display()))?
            .to_string();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            bail!("not a PDF file: {}", path.display());
        }
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        files.push((file_name, Bytes::from(data)));
    }

    let manager = CategoryManager::new(backend.metadata.clone());
    let category = crate::resolve_category(&manager, &args.category).await?.id;

    let queue = QueueHandle::new();
    for (file_name, data) in files {
        let farm = match &args.farm {
            Some(farm) => farm.clone(),
            None => farm_from_file_name(&file_name),
        };
        queue.add_file(&file_name, &farm, data);
    }

    let uploader = BatchUploader::new(
        backend.clone(),
        queue.clone(),
        UploadSettings::from(&config.upload),
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling...");
            ctrl_c.cancel();
        }
    });

    let report = uploader.run(Some(category), &ConsoleEvents, &cancel).await?;
    if args.retry_failed && report.failed > 0 && !cancel.is_cancelled() {
        eprintln!("Retrying {} failed upload(s)...", report.failed);
        uploader
            .retry_failed(Some(category), &ConsoleEvents, &cancel)
            .await?;
    }

    // The queue holds the outcome of both runs.
    let snapshot = queue.snapshot();
    print_queue(&snapshot);
    finish(&snapshot)
}

fn print_queue(snapshot: &UploadQueue) {
    println!("{:<10} {:<8} {:<32} {:<20} Result", "Status", "Attempts", "Name", "Farm");
    println!("{}", "-".repeat(90));
    for entry in snapshot.entries() {
        let result = match (entry.status, &entry.map_id, &entry.error) {
            (UploadStatus::Success, Some(id), _) => id.to_string(),
            (_, _, Some(error)) => error.clone(),
            _ => String::new(),
        };
        println!(
            "{:<10} {:<8} {:<32} {:<20} {}",
            entry.status.as_str(),
            entry.attempts,
            entry.name,
            entry.farm,
            result
        );
    }
}

fn finish(snapshot: &UploadQueue) -> Result<()> {
    let pending = snapshot.count(UploadStatus::Pending);
    let failed = snapshot.count(UploadStatus::Error);
    if pending > 0 {
        bail!("upload cancelled; {pending} file(s) not uploaded");
    }
    if failed > 0 {
        bail!("{failed} of {} upload(s) failed", snapshot.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapas_client::QueueAction;
    use mapas_core::MapId;

    fn queue_with(files: usize) -> QueueHandle {
        let queue = QueueHandle::new();
        for n in 1..=files {
            queue.add_file(&format!("talhao_{n}.pdf"), "Santa Rita", Bytes::from_static(b"%PDF"));
        }
        queue
    }

    #[test]
    fn finish_counts_successes_from_every_run() {
        let queue = queue_with(3);
        let ids: Vec<_> = queue.snapshot().entries().iter().map(|e| e.id).collect();

        // First run: two succeed, one fails.
        for id in &ids[..2] {
            queue.apply(QueueAction::Started { id: *id, attempt: 1 });
            queue.apply(QueueAction::Succeeded {
                id: *id,
                map_id: MapId::new(),
            });
        }
        queue.apply(QueueAction::Started {
            id: ids[2],
            attempt: 1,
        });
        queue.apply(QueueAction::Failed {
            id: ids[2],
            error: "503".into(),
        });

        // Retry: the failed one fails again.
        assert_eq!(queue.reset_failed(), 1);
        queue.apply(QueueAction::Started {
            id: ids[2],
            attempt: 1,
        });
        queue.apply(QueueAction::Failed {
            id: ids[2],
            error: "503".into(),
        });

        let err = finish(&queue.snapshot()).unwrap_err();
        assert_eq!(err.to_string(), "1 of 3 upload(s) failed");
    }

    #[test]
    fn finish_reports_entries_left_pending() {
        let queue = queue_with(2);
        let err = finish(&queue.snapshot()).unwrap_err();
        assert_eq!(err.to_string(), "upload cancelled; 2 file(s) not uploaded");
    }

    #[test]
    fn finish_succeeds_when_everything_uploaded() {
        let queue = queue_with(1);
        let id = queue.snapshot().entries()[0].id;
        queue.apply(QueueAction::Started { id, attempt: 1 });
        queue.apply(QueueAction::Succeeded {
            id,
            map_id: MapId::new(),
        });
        assert!(finish(&queue.snapshot()).is_ok());
    }
}
