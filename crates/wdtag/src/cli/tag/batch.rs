//! Running a batch with a progress bar, then writing records, sidecars and a summary.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use wdtag_core::output::write_caption_sidecar;
use wdtag_core::{
    BatchEvent, BatchSummary, BatchTagger, Config, ImageRecord, OutputFormat, OutputWriter,
    TaggerSession,
};

/// Load the model and tag `files` on blocking threads.
pub async fn run_batch(
    config: Config,
    files: Vec<PathBuf>,
    skip_hashes: HashSet<String>,
) -> anyhow::Result<(Vec<ImageRecord>, BatchSummary)> {
    let session = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || TaggerSession::from_config(&config)).await??
    };
    tracing::info!(
        "Tagging with {} ({} labels, {})",
        config.general.model,
        session.labels().len(),
        session.backend_name()
    );

    let progress = create_progress_bar(files.len() as u64);
    let pb = progress.clone();
    let limits = config.limits.clone();
    let include_ratings = config.output.include_ratings;

    let result = tokio::task::spawn_blocking(move || {
        let tagger = BatchTagger::new(&session, limits)
            .with_skip_hashes(skip_hashes)
            .with_ratings(include_ratings);
        let start = Instant::now();
        let mut failed = 0usize;

        tagger.run(&files, |event| match event {
            BatchEvent::Progress { completed, .. } => {
                pb.set_position(completed as u64);
                let elapsed = start.elapsed().as_secs_f64();
                if elapsed > 0.0 {
                    let rate = completed as f64 / elapsed;
                    if failed > 0 {
                        pb.set_message(format!("{rate:.1} img/sec, {failed} failed"));
                    } else {
                        pb.set_message(format!("{rate:.1} img/sec"));
                    }
                }
            }
            BatchEvent::Failed { .. } => failed += 1,
            BatchEvent::Skipped { path } => tracing::debug!("Skipping {:?}", path),
        })
    })
    .await?;

    progress.finish_and_clear();
    Ok(result)
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
    ) {
        pb.set_style(style.progress_chars("##-"));
    }
    pb.set_message("starting...");
    pb
}

/// Write caption files for every successful record; failures only warn.
pub fn write_sidecars(records: &[ImageRecord], separator: &str) -> usize {
    let mut written = 0;
    for record in records {
        match write_caption_sidecar(record, separator) {
            Ok(Some(_)) => written += 1,
            Ok(None) => {}
            Err(e) => tracing::warn!("Could not write caption for {:?}: {e}", record.file_path),
        }
    }
    tracing::info!("Wrote {written} caption file(s)");
    written
}

/// Where and how records are written.
pub struct RecordSink<'a> {
    /// Output file; stdout when `None`
    pub path: Option<&'a Path>,
    pub format: OutputFormat,
    pub pretty: bool,
    /// Keep records already in the output file (skip-existing runs)
    pub keep_existing: bool,
}

/// Write records to the sink.
///
/// On a resumed run, earlier records for the same file paths are replaced, so
/// an image that failed before and succeeds now ends up with a single record.
pub fn write_records(records: &[ImageRecord], sink: &RecordSink<'_>) -> anyhow::Result<()> {
    let Some(path) = sink.path else {
        let stdout = io::stdout();
        let mut writer = OutputWriter::new(stdout.lock(), sink.format, sink.pretty);
        writer.write_all(records)?;
        writer.flush()?;
        return Ok(());
    };

    let resume = sink.keep_existing && path.exists();
    let replaced: HashSet<&Path> = records.iter().map(|r| r.file_path.as_path()).collect();

    let (written, kept) = match sink.format {
        OutputFormat::JsonLines => {
            let kept_lines = if resume {
                read_jsonl_lines(path, &replaced)?
            } else {
                Vec::new()
            };
            let mut file = BufWriter::new(File::create(path)?);
            for line in &kept_lines {
                writeln!(file, "{line}")?;
            }
            let mut writer = OutputWriter::new(file, sink.format, false);
            writer.write_all(records)?;
            writer.flush()?;
            (writer.records_written(), kept_lines.len())
        }
        OutputFormat::Json => {
            // A JSON array cannot be appended to, so old and new records are rewritten together.
            let mut all = if resume {
                read_json_records(path)?
            } else {
                Vec::new()
            };
            all.retain(|r| !replaced.contains(r.file_path.as_path()));
            let kept = all.len();
            all.extend_from_slice(records);
            let file = File::create(path)?;
            let mut writer = OutputWriter::new(BufWriter::new(file), sink.format, sink.pretty);
            writer.write_all(&all)?;
            writer.flush()?;
            (writer.records_written() - kept, kept)
        }
    };

    if kept > 0 {
        tracing::info!("Output written to {:?} ({written} new, {kept} kept)", path);
    } else {
        tracing::info!("Output written to {:?} ({written} records)", path);
    }
    Ok(())
}

/// Lines of an existing JSONL file that stay on resume.
///
/// Lines that do not parse as records are kept verbatim.
fn read_jsonl_lines(path: &Path, replaced: &HashSet<&Path>) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    let lines = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| match serde_json::from_str::<ImageRecord>(line) {
            Ok(record) => !replaced.contains(record.file_path.as_path()),
            Err(_) => true,
        })
        .map(str::to_string)
        .collect();
    Ok(lines)
}

fn read_json_records(path: &Path) -> anyhow::Result<Vec<ImageRecord>> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&content).map_err(|e| {
        anyhow::anyhow!(
            "Existing output {} is not a JSON array of records ({e}); \
             refusing to overwrite it",
            path.display()
        )
    })
}

/// Print the end-of-run table to stderr.
pub fn print_summary(summary: &BatchSummary) {
    let total = summary.succeeded + summary.failed + summary.skipped;

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Tagged:       {:>8}", summary.succeeded);
    if summary.failed > 0 {
        eprintln!("    Failed:       {:>8}", summary.failed);
    }
    if summary.skipped > 0 {
        eprintln!("    Skipped:      {:>8}", summary.skipped);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", total);
    eprintln!("    TTA:          {:>8}", if summary.tta_applied { "on" } else { "off" });
    eprintln!("    Duration:     {:>7.1}s", summary.total_seconds);
    eprintln!("    Rate:         {:>7.1} img/sec", summary.images_per_second());
    eprintln!("  ====================================");
}
