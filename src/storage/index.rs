//! File index snapshots
//!
//! The index records the complete recursive file listing of the data
//! directory at the last successful configuration. It is stored in
//! `<out_dir>/.databuild/index.jsonl` with one JSON string per line.
//!
//! Only the set of paths is compared. Editing a file in place without
//! adding, removing or renaming anything is not a change.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use walkdir::WalkDir;

/// Directory inside the output directory holding databuild state
pub const STATE_DIR: &str = ".databuild";

/// File name of the persisted index
pub const INDEX_FILE: &str = "index.jsonl";

/// Absolute paths of every regular file under the data directory
pub type Snapshot = BTreeSet<PathBuf>;

/// Lists every regular file under `data_dir`, recursively, as absolute paths
pub fn snapshot(data_dir: &Path) -> Result<Snapshot> {
    let root = data_dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve data directory: {}", data_dir.display()))?;

    let mut files = Snapshot::new();
    for entry in WalkDir::new(&root).follow_links(true) {
        let entry = entry
            .with_context(|| format!("Failed to walk data directory: {}", root.display()))?;
        if entry.file_type().is_file() {
            files.insert(entry.into_path());
        }
    }

    Ok(files)
}

/// Compares the data directory against the index at `index_path`.
///
/// Returns `None` when nothing changed. Otherwise the new snapshot is
/// persisted and returned as the full file list to configure against.
pub fn check(data_dir: &Path, index_path: &Path) -> Result<Option<Snapshot>> {
    FileIndex::new(index_path).check(data_dir)
}

/// Persisted snapshot of the data directory
pub struct FileIndex {
    path: PathBuf,
}

impl FileIndex {
    /// Creates an index stored at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates the default index for an output directory
    pub fn for_output_dir(out_dir: &Path) -> Self {
        Self::new(out_dir.join(STATE_DIR).join(INDEX_FILE))
    }

    /// Returns the path to the index file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock file next to the index; it outlives every rename of the index
    pub fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn open_lock(&self) -> Result<File> {
        let lock_path = self.lock_path();
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))
    }

    /// Reads the persisted snapshot.
    ///
    /// A missing, unreadable or malformed index reads as `None`.
    pub fn read(&self) -> Option<Snapshot> {
        // Without a lock file no writer has ever run here
        let lock = File::open(self.lock_path()).ok();
        if let Some(lock) = &lock {
            lock.lock_shared().ok()?;
        }

        let file = File::open(&self.path).ok()?;
        let reader = BufReader::new(&file);
        let mut files = Snapshot::new();

        for line in reader.lines() {
            let line = line.ok()?;
            if line.trim().is_empty() {
                continue;
            }
            let path: PathBuf = serde_json::from_str(&line).ok()?;
            files.insert(path);
        }

        Some(files)
    }

    /// Writes the snapshot (temp file + rename)
    pub fn write(&self, files: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let lock = self.open_lock()?;
        lock.lock_exclusive()
            .context("Failed to acquire write lock on file index")?;

        let temp_path = self.path.with_extension("jsonl.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            let mut writer = BufWriter::new(&file);
            for path in files {
                let line = serde_json::to_string(path)
                    .with_context(|| format!("Failed to serialize path: {}", path.display()))?;
                writeln!(writer, "{}", line).context("Failed to write file index")?;
            }

            writer.flush().context("Failed to flush file index")?;
        }

        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }

    /// Deletes the index so the next check reports a change
    pub fn invalidate(&self) -> Result<()> {
        let lock = File::open(self.lock_path()).ok();
        if let Some(lock) = &lock {
            lock.lock_exclusive()
                .context("Failed to acquire write lock on file index")?;
        }

        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove file index: {}", self.path.display())),
        }
    }

    /// See [`check`]
    pub fn check(&self, data_dir: &Path) -> Result<Option<Snapshot>> {
        let current = snapshot(data_dir)?;

        if self.read().as_ref() == Some(&current) {
            return Ok(None);
        }

        self.write(&current)?;
        Ok(Some(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_data() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("textures")).unwrap();
        fs::write(dir.path().join("textures/a.png"), b"png").unwrap();
        fs::write(dir.path().join("b.hlsl"), b"float4 main() {}").unwrap();
        dir
    }

    #[test]
    fn snapshot_lists_files_only() {
        let data = setup_data();
        let files = snapshot(data.path()).unwrap();
        let root = data.path().canonicalize().unwrap();

        assert_eq!(files.len(), 2);
        assert!(files.contains(&root.join("textures/a.png")));
        assert!(files.contains(&root.join("b.hlsl")));
        assert!(!files.contains(&root.join("textures")));
        assert!(files.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn snapshot_of_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        assert!(snapshot(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn read_missing_index() {
        let dir = TempDir::new().unwrap();
        let index = FileIndex::new(dir.path().join("index.jsonl"));
        assert!(index.read().is_none());
    }

    #[test]
    fn write_and_read() {
        let dir = TempDir::new().unwrap();
        let index = FileIndex::for_output_dir(dir.path());

        let files: Snapshot = ["/data/a b.png", "/data/x/y.fbx"]
            .iter()
            .map(PathBuf::from)
            .collect();
        index.write(&files).unwrap();

        assert_eq!(index.read(), Some(files));
        assert!(!index.path().with_extension("jsonl.tmp").exists());
    }

    #[test]
    fn corrupt_index_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.jsonl");
        fs::write(&path, "\"/data/a.png\"\nnot json at all\n").unwrap();

        assert!(FileIndex::new(&path).read().is_none());
    }

    #[test]
    fn check_reports_change_then_nothing() {
        let data = setup_data();
        let out = TempDir::new().unwrap();
        let index_path = out.path().join("index.jsonl");

        let first = check(data.path(), &index_path).unwrap();
        assert_eq!(first.map(|s| s.len()), Some(2));

        let second = check(data.path(), &index_path).unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn check_returns_full_listing_after_change() {
        let data = setup_data();
        let out = TempDir::new().unwrap();
        let index_path = out.path().join("index.jsonl");

        check(data.path(), &index_path).unwrap();
        fs::write(data.path().join("c.tga"), b"tga").unwrap();

        let changed = check(data.path(), &index_path).unwrap().unwrap();
        assert_eq!(changed, snapshot(data.path()).unwrap());
        assert_eq!(changed.len(), 3);
    }

    #[test]
    fn check_ignores_content_edits() {
        let data = setup_data();
        let out = TempDir::new().unwrap();
        let index_path = out.path().join("index.jsonl");

        check(data.path(), &index_path).unwrap();
        fs::write(data.path().join("b.hlsl"), b"different content").unwrap();

        assert!(check(data.path(), &index_path).unwrap().is_none());
    }

    #[test]
    fn check_leaves_index_untouched_when_unchanged() {
        let data = setup_data();
        let out = TempDir::new().unwrap();
        let index_path = out.path().join("index.jsonl");

        check(data.path(), &index_path).unwrap();
        let before = fs::metadata(&index_path).unwrap().modified().unwrap();
        let content = fs::read(&index_path).unwrap();

        check(data.path(), &index_path).unwrap();
        assert_eq!(fs::metadata(&index_path).unwrap().modified().unwrap(), before);
        assert_eq!(fs::read(&index_path).unwrap(), content);
    }

    #[test]
    fn corrupt_index_triggers_regeneration() {
        let data = setup_data();
        let out = TempDir::new().unwrap();
        let index_path = out.path().join("index.jsonl");
        fs::write(&index_path, "{{{").unwrap();

        let changed = check(data.path(), &index_path).unwrap();
        assert!(changed.is_some());
        assert!(FileIndex::new(&index_path).read().is_some());
    }

    #[test]
    fn invalidate_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let index = FileIndex::for_output_dir(dir.path());
        index.write(&Snapshot::new()).unwrap();

        index.invalidate().unwrap();
        assert!(!index.path().exists());
        index.invalidate().unwrap();
    }

    #[test]
    fn write_locks_a_stable_file() {
        let dir = TempDir::new().unwrap();
        let index = FileIndex::for_output_dir(dir.path());
        let files: Snapshot = [PathBuf::from("/data/a.png")].into_iter().collect();

        index.write(&files).unwrap();
        assert!(index.lock_path().is_file());

        // Readers share the lock with each other
        let holder = File::open(index.lock_path()).unwrap();
        fs2::FileExt::lock_shared(&holder).unwrap();
        assert_eq!(index.read(), Some(files.clone()));
        fs2::FileExt::unlock(&holder).unwrap();

        index.write(&files).unwrap();
        assert!(index.lock_path().is_file());
        assert_eq!(index.read(), Some(files));
    }
}
