//! Hosted documents and the media elements they contain
//!
//! A [`Document`] is the page a processor is attached to. It can be queried
//! for its main media element and observed for structural changes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::trace;

/// Capacity of document mutation channels
pub const MUTATION_CHANNEL_CAPACITY: usize = 32;

/// Unique identifier of a media element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaId(String);

impl MediaId {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A playable media element found in a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaElement {
    pub id: MediaId,
    /// Where the element's audio comes from (URL or file path)
    pub source: String,
}

impl MediaElement {
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: MediaId::new(id.into()),
            source: source.into(),
        }
    }
}

/// Structural change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentEvent {
    /// Children were added or removed somewhere in the document
    Mutated,
}

/// A hosted page
pub trait Document: Send {
    /// Page URL, matched against the coordinator's site pattern
    fn url(&self) -> &str;

    /// The page's main media element, if one is present right now
    fn find_media(&self) -> Option<MediaElement>;

    /// Subscribe to structural mutations
    fn subscribe(&self) -> broadcast::Receiver<DocumentEvent>;
}

/// Document held entirely in memory
///
/// Clones share the same element list and mutation channel, so a test or a
/// driver can mutate the document while a page runtime observes it.
#[derive(Debug, Clone)]
pub struct InMemoryDocument {
    url: String,
    elements: Arc<Mutex<Vec<MediaElement>>>,
    events: broadcast::Sender<DocumentEvent>,
}

impl InMemoryDocument {
    pub fn new(url: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(MUTATION_CHANNEL_CAPACITY);
        Self {
            url: url.into(),
            elements: Arc::new(Mutex::new(Vec::new())),
            events,
        }
    }

    /// Document that already contains `media` before anyone observes it
    pub fn with_media(url: impl Into<String>, media: MediaElement) -> Self {
        let doc = Self::new(url);
        doc.lock().push(media);
        doc
    }

    /// Append a media element and notify observers
    pub fn insert_media(&self, media: MediaElement) {
        trace!(media = %media.id, "Media element inserted");
        self.lock().push(media);
        self.notify();
    }

    /// Remove a media element and notify observers
    pub fn remove_media(&self, id: &MediaId) {
        self.lock().retain(|m| &m.id != id);
        self.notify();
    }

    /// Signal an unrelated structural change
    pub fn touch(&self) {
        self.notify();
    }

    fn notify(&self) {
        // No receivers simply means nobody is observing yet
        let _ = self.events.send(DocumentEvent::Mutated);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<MediaElement>> {
        self.elements.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Document for InMemoryDocument {
    fn url(&self) -> &str {
        &self.url
    }

    fn find_media(&self) -> Option<MediaElement> {
        self.lock().first().cloned()
    }

    fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_first_media() {
        let doc = InMemoryDocument::new("https://www.youtube.com/watch?v=1");
        assert!(doc.find_media().is_none());

        doc.insert_media(MediaElement::new("main", "blob:1"));
        doc.insert_media(MediaElement::new("ad", "blob:2"));
        assert_eq!(doc.find_media().unwrap().id.as_str(), "main");

        doc.remove_media(&MediaId::new("main".to_string()));
        assert_eq!(doc.find_media().unwrap().id.as_str(), "ad");
    }

    #[tokio::test]
    async fn test_mutations_are_broadcast() {
        let doc = InMemoryDocument::new("https://www.youtube.com/");
        let mut rx = doc.subscribe();

        let driver = doc.clone();
        driver.insert_media(MediaElement::new("v", "blob:v"));
        driver.touch();

        assert_eq!(rx.recv().await.unwrap(), DocumentEvent::Mutated);
        assert_eq!(rx.recv().await.unwrap(), DocumentEvent::Mutated);
        assert!(doc.find_media().is_some());
    }
}
