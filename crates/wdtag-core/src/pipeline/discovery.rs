//! Finding image files to tag.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Discovers image files by extension.
pub struct FileDiscovery {
    extensions: Vec<String>,
}

impl FileDiscovery {
    /// Create a discovery instance for the given extensions (case-insensitive).
    pub fn new(extensions: &[String]) -> Self {
        Self {
            extensions: extensions.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    /// Discover all supported image files at a path.
    ///
    /// A file path is returned as-is when supported. Directories are walked
    /// recursively, skipping hidden entries, and results are sorted so batch
    /// order is deterministic.
    pub fn discover(&self, path: &Path) -> Vec<PathBuf> {
        if path.is_file() {
            return if self.is_supported(path) {
                vec![path.to_path_buf()]
            } else {
                vec![]
            };
        }

        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && self.is_supported(e.path()))
            .map(DirEntry::into_path)
            .collect();

        files.sort();
        files
    }

    /// Check if a file has a supported extension.
    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}
