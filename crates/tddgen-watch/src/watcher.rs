//! Intake folder watcher
//!
//! Reports newly created source documents once they have gone quiet.

use anyhow::Result;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Default settle duration (1s)
const DEFAULT_SETTLE_MS: u64 = 1000;

/// Non-recursive watcher for files with one extension.
///
/// A created file is held back until no event has touched it for the settle
/// duration. There is no way to know when the writer is done, so this is a
/// best-effort wait: a writer that pauses longer than the settle duration
/// will still be picked up early.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    rx: mpsc::Receiver<Result<Event, notify::Error>>,
    watched_paths: Vec<PathBuf>,
    /// Created files waiting to settle, with the time of their last event
    pending: HashMap<PathBuf, Instant>,
    settle: Duration,
    /// Lowercase, without the dot
    extension: String,
}

impl FileWatcher {
    /// Create a watcher with the default settle duration
    pub fn new(extension: &str) -> Result<Self> {
        Self::with_settle(extension, Duration::from_millis(DEFAULT_SETTLE_MS))
    }

    pub fn with_settle(extension: &str, settle: Duration) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let watcher = notify::recommended_watcher(tx)?;

        Ok(Self {
            watcher,
            rx,
            watched_paths: Vec::new(),
            pending: HashMap::new(),
            settle,
            extension: extension.trim_start_matches('.').to_ascii_lowercase(),
        })
    }

    /// Start watching a directory (not its subdirectories)
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if self.watched_paths.contains(&canonical) {
            return Ok(());
        }

        self.watcher.watch(&canonical, RecursiveMode::NonRecursive)?;
        self.watched_paths.push(canonical);
        Ok(())
    }

    pub fn unwatch(&mut self, path: &Path) -> Result<()> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if !self.watched_paths.contains(&canonical) {
            return Ok(());
        }
        self.watcher.unwatch(&canonical)?;
        self.watched_paths.retain(|p| p != &canonical);
        Ok(())
    }

    pub fn watched_paths(&self) -> &[PathBuf] {
        &self.watched_paths
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Wait up to `timeout` for activity, then return settled documents.
    pub fn next_events(&mut self, timeout: Duration) -> Vec<PathBuf> {
        let wait = if self.pending.is_empty() {
            timeout
        } else {
            // wake up in time for the earliest pending file to settle
            self.time_to_next_ready(Instant::now()).min(timeout)
        };

        if let Ok(result) = self.rx.recv_timeout(wait) {
            self.handle_result(result, Instant::now());
        }
        self.poll_events()
    }

    /// Drain queued raw events and return settled documents without blocking.
    pub fn poll_events(&mut self) -> Vec<PathBuf> {
        while let Ok(result) = self.rx.try_recv() {
            self.handle_result(result, Instant::now());
        }
        self.take_ready(Instant::now())
    }

    fn handle_result(&mut self, result: Result<Event, notify::Error>, now: Instant) {
        match result {
            Ok(event) => self.process_raw_event(event, now),
            Err(err) => tracing::warn!("Watch error: {}", err),
        }
    }

    fn time_to_next_ready(&self, now: Instant) -> Duration {
        self.pending
            .values()
            .map(|last_seen| (*last_seen + self.settle).saturating_duration_since(now))
            .min()
            .unwrap_or(self.settle)
    }

    fn take_ready(&mut self, now: Instant) -> Vec<PathBuf> {
        let settle = self.settle;
        let mut ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, last_seen)| now.duration_since(**last_seen) >= settle)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &ready {
            self.pending.remove(path);
        }
        ready.sort();
        ready
    }

    /// Fold one raw notify event into the pending map.
    ///
    /// Only creations start tracking a file. Writes to a tracked file push
    /// its settle deadline back; removal forgets it.
    pub(crate) fn process_raw_event(&mut self, event: Event, now: Instant) {
        use notify::EventKind;

        for path in event.paths {
            match event.kind {
                EventKind::Create(_) => {
                    if self.is_source_document(&path) {
                        tracing::debug!("Detected {}", path.display());
                        self.pending.insert(path, now);
                    }
                }
                EventKind::Modify(_) => {
                    if let Some(last_seen) = self.pending.get_mut(&path) {
                        *last_seen = now;
                    }
                }
                EventKind::Remove(_) => {
                    self.pending.remove(&path);
                }
                _ => {}
            }
        }
    }

    /// Files with the watched extension, compared case-insensitively.
    fn is_source_document(&self, path: &Path) -> bool {
        if path.is_dir() {
            return false;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind};
    use notify::EventKind;

    fn created(path: &str) -> Event {
        Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from(path))
    }

    fn modified(path: &str) -> Event {
        Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from(path))
    }

    fn removed(path: &str) -> Event {
        Event::new(EventKind::Remove(RemoveKind::File)).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_source_document_extension() {
        let watcher = FileWatcher::new("pdf").unwrap();
        assert!(watcher.is_source_document(Path::new("/intake/a.pdf")));
        assert!(watcher.is_source_document(Path::new("/intake/B.PDF")));
        assert!(!watcher.is_source_document(Path::new("/intake/a.tdd")));
        assert!(!watcher.is_source_document(Path::new("/intake/pdf")));
        assert!(!watcher.is_source_document(Path::new("/intake/a.pdf.part")));
    }

    #[test]
    fn test_extension_normalized() {
        let watcher = FileWatcher::new(".PDF").unwrap();
        assert!(watcher.is_source_document(Path::new("/intake/a.pdf")));
    }

    #[test]
    fn test_created_file_waits_for_settle() {
        let mut watcher = FileWatcher::with_settle("pdf", Duration::from_millis(100)).unwrap();
        let start = Instant::now();
        watcher.process_raw_event(created("/intake/a.pdf"), start);

        assert!(watcher.take_ready(start).is_empty());
        assert!(watcher.has_pending());

        let ready = watcher.take_ready(start + Duration::from_millis(100));
        assert_eq!(ready, vec![PathBuf::from("/intake/a.pdf")]);
        assert!(!watcher.has_pending());
    }

    #[test]
    fn test_modify_pushes_settle_back() {
        let mut watcher = FileWatcher::with_settle("pdf", Duration::from_millis(100)).unwrap();
        let start = Instant::now();
        watcher.process_raw_event(created("/intake/a.pdf"), start);
        watcher.process_raw_event(modified("/intake/a.pdf"), start + Duration::from_millis(80));

        assert!(watcher
            .take_ready(start + Duration::from_millis(120))
            .is_empty());
        assert_eq!(
            watcher.take_ready(start + Duration::from_millis(180)).len(),
            1
        );
    }

    #[test]
    fn test_modify_alone_is_ignored() {
        let mut watcher = FileWatcher::with_settle("pdf", Duration::ZERO).unwrap();
        let now = Instant::now();
        watcher.process_raw_event(modified("/intake/existing.pdf"), now);
        assert!(!watcher.has_pending());
    }

    #[test]
    fn test_removed_before_settle_is_dropped() {
        let mut watcher = FileWatcher::with_settle("pdf", Duration::from_millis(100)).unwrap();
        let start = Instant::now();
        watcher.process_raw_event(created("/intake/a.pdf"), start);
        watcher.process_raw_event(removed("/intake/a.pdf"), start);
        assert!(watcher
            .take_ready(start + Duration::from_secs(1))
            .is_empty());
    }

    #[test]
    fn test_duplicate_creation_reported_once() {
        let mut watcher = FileWatcher::with_settle("pdf", Duration::ZERO).unwrap();
        let now = Instant::now();
        watcher.process_raw_event(created("/intake/a.pdf"), now);
        watcher.process_raw_event(created("/intake/a.pdf"), now);
        assert_eq!(watcher.take_ready(now).len(), 1);
    }

    #[test]
    fn test_other_extensions_ignored() {
        let mut watcher = FileWatcher::with_settle("pdf", Duration::ZERO).unwrap();
        let now = Instant::now();
        watcher.process_raw_event(created("/intake/notes.txt"), now);
        assert!(watcher.take_ready(now).is_empty());
    }

    #[test]
    fn test_watch_prevents_duplicate_paths() {
        let mut watcher = FileWatcher::new("pdf").unwrap();
        let temp_dir = tempfile::TempDir::new().unwrap();

        watcher.watch(temp_dir.path()).unwrap();
        watcher.watch(temp_dir.path()).unwrap();
        assert_eq!(watcher.watched_paths().len(), 1);

        watcher.unwatch(temp_dir.path()).unwrap();
        assert!(watcher.watched_paths().is_empty());
    }

    #[test]
    fn test_unwatch_unknown_path_is_noop() {
        let mut watcher = FileWatcher::new("pdf").unwrap();
        let temp_dir = tempfile::TempDir::new().unwrap();
        assert!(watcher.unwatch(temp_dir.path()).is_ok());
    }

    #[test]
    fn test_real_creation_is_reported() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut watcher = FileWatcher::with_settle("pdf", Duration::from_millis(50)).unwrap();
        watcher.watch(temp_dir.path()).unwrap();

        let path = temp_dir.path().canonicalize().unwrap().join("intake.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        std::fs::write(temp_dir.path().join("ignored.txt"), b"x").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        while seen.is_empty() && Instant::now() < deadline {
            seen = watcher.next_events(Duration::from_millis(100));
        }
        assert_eq!(seen, vec![path]);
    }
}
