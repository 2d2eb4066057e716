//! Playback attachment monitor
//!
//! Builds the audio graph as soon as a media element shows up in the hosted
//! document, so that later toggles only have to rewire. The continuous
//! observation itself (subscribing to document mutations) is done by the page
//! runtime, which calls [`AttachmentMonitor::on_mutation`] for every event.

use crate::domain::control::ControlSurface;
use crate::domain::graph::{AudioBackend, Construction};
use crate::domain::media::Document;
use tracing::{debug, info, warn};

/// Result of one detection pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    /// Graph built on this pass; `enabled` is the state it was left in
    Constructed { enabled: bool },
    AlreadyConstructed,
    NoMedia,
    Failed(String),
}

/// Detects the page's media element and triggers first-time construction
#[derive(Debug, Default)]
pub struct AttachmentMonitor {
    started: bool,
    passes: u64,
}

impl AttachmentMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Immediate check in case the element is already present
    pub fn start<B: AudioBackend, D: Document>(
        &mut self,
        surface: &mut ControlSurface<B, D>,
    ) -> Attachment {
        self.started = true;
        info!(url = surface.document().url(), "Watching document for media elements");
        self.check(surface)
    }

    /// Called for every structural change of the document
    pub fn on_mutation<B: AudioBackend, D: Document>(
        &mut self,
        surface: &mut ControlSurface<B, D>,
    ) -> Attachment {
        self.check(surface)
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Number of detection passes run so far
    pub fn passes(&self) -> u64 {
        self.passes
    }

    fn check<B: AudioBackend, D: Document>(&mut self, surface: &mut ControlSurface<B, D>) -> Attachment {
        self.passes += 1;

        if surface.graph().is_constructed() {
            return Attachment::AlreadyConstructed;
        }

        let Some(media) = surface.document().find_media() else {
            return Attachment::NoMedia;
        };

        info!(media = %media.id, "Video element detected");
        let enabled = surface.last_enabled();
        let graph = surface.graph_mut();

        match graph.construct(Some(&media)) {
            Ok(Construction::Constructed) => {}
            Ok(Construction::AlreadyConstructed) => return Attachment::AlreadyConstructed,
            Err(e) => {
                warn!(error = %e, "Graph construction failed");
                return Attachment::Failed(e.to_string());
            }
        }

        if enabled {
            if let Err(e) = graph.set_enabled(true) {
                warn!(error = %e, "Failed to apply last known enabled state");
                return Attachment::Failed(e.to_string());
            }
        }

        debug!(enabled, "Graph prepared by attachment monitor");
        Attachment::Constructed { enabled }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::testing::RecordingBackend;
    use crate::domain::graph::GraphBuilder;
    use crate::domain::media::{InMemoryDocument, MediaElement};
    use crate::domain::message::Command;
    use crate::domain::stage::ChainParams;

    const URL: &str = "https://www.youtube.com/watch?v=xyz";

    fn surface(doc: InMemoryDocument) -> ControlSurface<RecordingBackend, InMemoryDocument> {
        ControlSurface::new(
            GraphBuilder::new(RecordingBackend::default(), ChainParams::default()),
            doc,
        )
    }

    fn attach_count(surface: &ControlSurface<RecordingBackend, InMemoryDocument>) -> usize {
        surface
            .graph()
            .backend()
            .calls
            .iter()
            .filter(|c| c.starts_with("attach"))
            .count()
    }

    #[test]
    fn test_immediate_check_finds_existing_video() {
        let doc = InMemoryDocument::with_media(URL, MediaElement::new("v", "blob:v"));
        let mut surface = surface(doc);
        let mut monitor = AttachmentMonitor::new();

        assert_eq!(
            monitor.start(&mut surface),
            Attachment::Constructed { enabled: false }
        );
        assert!(monitor.is_started());
        assert!(surface.graph().is_constructed());
        assert!(!surface.graph().is_connected());
    }

    #[test]
    fn test_detection_after_mutation() {
        let doc = InMemoryDocument::new(URL);
        let mut surface = surface(doc.clone());
        let mut monitor = AttachmentMonitor::new();

        assert_eq!(monitor.start(&mut surface), Attachment::NoMedia);
        doc.touch();
        assert_eq!(monitor.on_mutation(&mut surface), Attachment::NoMedia);

        doc.insert_media(MediaElement::new("v", "blob:v"));
        assert_eq!(
            monitor.on_mutation(&mut surface),
            Attachment::Constructed { enabled: false }
        );
        assert_eq!(monitor.passes(), 3);
    }

    #[test]
    fn test_constructs_at_most_once() {
        let doc = InMemoryDocument::with_media(URL, MediaElement::new("v", "blob:v"));
        let mut surface = surface(doc.clone());
        let mut monitor = AttachmentMonitor::new();

        monitor.start(&mut surface);
        for i in 0..5 {
            doc.insert_media(MediaElement::new(format!("extra-{i}"), "blob:x"));
            assert_eq!(
                monitor.on_mutation(&mut surface),
                Attachment::AlreadyConstructed
            );
        }
        assert_eq!(attach_count(&surface), 1);
    }

    #[test]
    fn test_uses_last_known_enabled_state() {
        let doc = InMemoryDocument::new(URL);
        let mut surface = surface(doc.clone());
        let mut monitor = AttachmentMonitor::new();
        monitor.start(&mut surface);

        // Toggle arrives before the player exists
        let ack = surface.handle(&Command::VoiceFocusToggle {
            enabled: true,
            deesser_enabled: true,
            reverb_enabled: false,
        });
        assert!(!ack.ok);

        doc.insert_media(MediaElement::new("v", "blob:v"));
        assert_eq!(
            monitor.on_mutation(&mut surface),
            Attachment::Constructed { enabled: true }
        );
        assert!(surface.graph().is_connected());
        assert!(surface.graph().options().deesser);
    }
}
