//! The looping play queue

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use walkdir::WalkDir;

/// Ordered, immutable list of media files
#[derive(Clone, Debug, Default)]
pub struct PlayQueue {
    items: Vec<PathBuf>,
}

impl PlayQueue {
    /// Recursively collects every file under `root` whose name ends with
    /// `.{extension}`, sorted by the full path string.
    pub fn scan(root: &Path, extension: &str) -> Result<Self> {
        if !root.is_dir() {
            bail!("Input directory does not exist: {}", root.display());
        }
        std::fs::read_dir(root)
            .with_context(|| format!("Input directory is not readable: {}", root.display()))?;

        let suffix = format!(".{extension}");
        let mut items = Vec::new();

        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let matches = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(&suffix));
            if matches {
                items.push(entry.into_path());
            }
        }

        // Byte-wise order of the whole path, not per-component ordering.
        items.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));

        let queue = Self { items };
        for (index, path) in queue.iter().enumerate() {
            tracing::debug!(index, path = %path.display(), "Queued");
        }
        tracing::info!(root = %root.display(), count = queue.len(), "Play queue built");
        Ok(queue)
    }

    #[cfg(test)]
    pub fn from_paths(items: Vec<PathBuf>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Path> {
        self.items.get(index).map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.items.iter().map(PathBuf::as_path)
    }

    /// The queue in play order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_scan_keeps_only_matching_files_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "b.mp4");
        touch(root, "a.mp4");
        touch(root, "notes.txt");
        touch(root, "season/02.mp4");
        touch(root, "season/01.mp4");
        touch(root, "season/cover.jpg");
        touch(root, "clip.MP4");
        touch(root, "archive.mp4.bak");

        let queue = PlayQueue::scan(root, "mp4").unwrap();

        let expected: Vec<PathBuf> = ["a.mp4", "b.mp4", "season/01.mp4", "season/02.mp4"]
            .iter()
            .map(|p| root.join(p))
            .collect();
        assert_eq!(queue.paths(), expected.as_slice());
        let found: Vec<&Path> = queue.iter().collect();
        assert_eq!(found, expected.iter().map(PathBuf::as_path).collect::<Vec<_>>());
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn test_scan_sorts_by_full_path_string() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        // '-' sorts before '/', so "a-b/..." comes before "a/..." as a string
        touch(root, "a/z.mp4");
        touch(root, "a-b/c.mp4");

        let queue = PlayQueue::scan(root, "mp4").unwrap();

        assert_eq!(queue.get(0), Some(root.join("a-b/c.mp4").as_path()));
        assert_eq!(queue.get(1), Some(root.join("a/z.mp4").as_path()));
        assert_eq!(queue.get(2), None);
    }

    #[test]
    fn test_scan_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(PlayQueue::scan(&missing, "mp4").is_err());
    }

    #[test]
    fn test_scan_file_instead_of_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "single.mp4");
        assert!(PlayQueue::scan(&dir.path().join("single.mp4"), "mp4").is_err());
    }

    #[test]
    fn test_scan_empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "readme.md");
        let queue = PlayQueue::scan(dir.path(), "mp4").unwrap();
        assert!(queue.is_empty());
    }
}
