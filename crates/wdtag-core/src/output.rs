//! Writing tagging results: JSON / JSONL records and caption sidecars.

use std::collections::HashSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::types::{ImageRecord, Tag};

/// Record serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One JSON array holding every record
    Json,
    /// One JSON object per line
    JsonLines,
}

impl OutputFormat {
    /// Parse a format name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// Serializes records to an underlying writer.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    records_written: usize,
}

impl<W: Write> OutputWriter<W> {
    /// `pretty` only affects [`OutputFormat::Json`]; JSONL is always compact.
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            records_written: 0,
        }
    }

    /// Write one record as its own JSON document or line.
    pub fn write<T: Serialize>(&mut self, record: &T) -> io::Result<()> {
        self.write_value(record, self.pretty && self.format == OutputFormat::Json)?;
        self.records_written += 1;
        Ok(())
    }

    /// Write a batch: a single array for JSON, one line each for JSONL.
    pub fn write_all<T: Serialize>(&mut self, records: &[T]) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                self.write_value(&records, self.pretty)?;
                self.records_written += records.len();
            }
            OutputFormat::JsonLines => {
                for record in records {
                    self.write(record)?;
                }
            }
        }
        Ok(())
    }

    fn write_value<T: Serialize + ?Sized>(&mut self, value: &T, pretty: bool) -> io::Result<()> {
        if pretty {
            serde_json::to_writer_pretty(&mut self.writer, value).map_err(io::Error::other)?;
        } else {
            serde_json::to_writer(&mut self.writer, value).map_err(io::Error::other)?;
        }
        writeln!(self.writer)
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Sidecar caption path for an image: same stem, `.txt` extension.
pub fn caption_path(image_path: &Path) -> PathBuf {
    image_path.with_extension("txt")
}

/// Join tag names into a single caption line.
pub fn caption_text(tags: &[Tag], separator: &str) -> String {
    tags.iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Write the caption sidecar next to a tagged image.
///
/// Returns the sidecar path, or `None` for failed records, which never get
/// a caption file.
pub fn write_caption_sidecar(record: &ImageRecord, separator: &str) -> io::Result<Option<PathBuf>> {
    if !record.is_ok() {
        return Ok(None);
    }
    let path = caption_path(&record.file_path);
    let mut text = caption_text(&record.tags, separator);
    text.push('\n');
    std::fs::write(&path, text)?;
    tracing::trace!("Wrote caption {:?}", path);
    Ok(Some(path))
}

/// Content hashes of successfully tagged images in an earlier output file.
///
/// Accepts a JSON array or JSONL. A missing file yields an empty set. JSONL
/// lines that fail to parse are skipped with a warning, so those images are
/// tagged again.
pub fn load_existing_hashes(path: &Path) -> io::Result<HashSet<String>> {
    let mut hashes = HashSet::new();
    if !path.exists() {
        return Ok(hashes);
    }

    let content = std::fs::read_to_string(path)?;
    let mut keep = |record: ImageRecord| {
        if record.is_ok() && !record.content_hash.is_empty() {
            hashes.insert(record.content_hash);
        }
    };

    if let Ok(records) = serde_json::from_str::<Vec<ImageRecord>>(&content) {
        records.into_iter().for_each(&mut keep);
        return Ok(hashes);
    }

    tracing::debug!("Output file is not a JSON array, reading it as JSONL");
    let mut bad_lines = 0usize;
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match serde_json::from_str::<ImageRecord>(line) {
            Ok(record) => keep(record),
            Err(_) => bad_lines += 1,
        }
    }
    if bad_lines > 0 {
        tracing::warn!(
            "{bad_lines} lines in {:?} could not be parsed; those images will be tagged again",
            path
        );
    }

    Ok(hashes)
}
