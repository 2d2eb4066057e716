//! Directory-backed document
//!
//! Lets the CLI host a page without a browser: a directory stands in for the
//! page, media files in it stand in for media elements, and file creation,
//! removal or renaming are reported as structural mutations.

use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use voicefocus_core::domain::media::{Document, DocumentEvent, MediaElement, MUTATION_CHANNEL_CAPACITY};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// A watched directory acting as a hosted page
pub struct WatchedDirectory {
    url: String,
    root: PathBuf,
    extensions: Vec<String>,
    events: broadcast::Sender<DocumentEvent>,
    _watcher: RecommendedWatcher,
}

impl WatchedDirectory {
    /// Start watching `root`; files with one of `extensions` count as media
    pub fn open(
        root: impl Into<PathBuf>,
        url: impl Into<String>,
        extensions: &[String],
    ) -> Result<Self, DocumentError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        let (events, _) = broadcast::channel(MUTATION_CHANNEL_CAPACITY);
        let tx = events.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) if is_structural(&event.kind) => {
                    debug!(kind = ?event.kind, paths = ?event.paths, "Directory changed");
                    // No receivers simply means nobody is observing yet
                    let _ = tx.send(DocumentEvent::Mutated);
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Directory watch error"),
            }
        })?;
        watcher.watch(&root, RecursiveMode::NonRecursive)?;

        info!(path = %root.display(), "Watching directory for media files");

        Ok(Self {
            url: url.into(),
            root,
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
            events,
            _watcher: watcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_media(&self, path: &Path) -> bool {
        path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| self.extensions.contains(&e.to_ascii_lowercase()))
    }
}

fn is_structural(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
    )
}

impl Document for WatchedDirectory {
    fn url(&self) -> &str {
        &self.url
    }

    /// First media file in name order
    fn find_media(&self) -> Option<MediaElement> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.root.display(), error = %e, "Failed to list directory");
                return None;
            }
        };

        let mut media: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| self.is_media(path))
            .collect();
        media.sort();

        let path = media.into_iter().next()?;
        let name = path.file_name()?.to_string_lossy().into_owned();
        Some(MediaElement::new(name, path.display().to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn extensions() -> Vec<String> {
        vec!["webm".to_string(), "mp4".to_string()]
    }

    #[tokio::test]
    async fn test_find_media_by_extension() {
        let temp_dir = TempDir::new().unwrap();
        let doc = WatchedDirectory::open(temp_dir.path(), "https://www.youtube.com/watch", &extensions())
            .unwrap();
        assert!(doc.find_media().is_none());

        std::fs::write(temp_dir.path().join("notes.txt"), "x").unwrap();
        std::fs::write(temp_dir.path().join("b.MP4"), "x").unwrap();
        std::fs::write(temp_dir.path().join("a.webm"), "x").unwrap();

        let media = doc.find_media().unwrap();
        assert_eq!(media.id.as_str(), "a.webm");
        assert!(media.source.ends_with("a.webm"));
        assert_eq!(doc.url(), "https://www.youtube.com/watch");
    }

    #[tokio::test]
    async fn test_new_file_is_reported_as_mutation() {
        let temp_dir = TempDir::new().unwrap();
        let doc = WatchedDirectory::open(temp_dir.path(), "about:blank", &extensions()).unwrap();
        let mut events = doc.subscribe();

        std::fs::write(temp_dir.path().join("clip.webm"), "x").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("no mutation reported")
            .unwrap();
        assert_eq!(event, DocumentEvent::Mutated);
    }
}
