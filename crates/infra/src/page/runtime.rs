//! Page runtime
//!
//! One event loop per hosted page. The loop exclusively owns the page's
//! [`ControlSurface`] and [`AttachmentMonitor`] and reacts to two inputs:
//! forwarded commands from its mailbox (each answered through a oneshot) and
//! structural mutations of the document.

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use voicefocus_core::domain::control::ControlSurface;
use voicefocus_core::domain::graph::AudioBackend;
use voicefocus_core::domain::media::{Document, DocumentEvent};
use voicefocus_core::domain::message::{Command, PageAck};
use voicefocus_core::domain::monitor::{Attachment, AttachmentMonitor};
use voicefocus_core::domain::relay::{DeliveryError, PageId};

/// A command waiting in a page mailbox
struct PageEnvelope {
    command: Command,
    reply: oneshot::Sender<PageAck>,
}

/// Sending side of a page mailbox
#[derive(Debug, Clone)]
pub struct PageHandle {
    id: PageId,
    mailbox: mpsc::Sender<PageEnvelope>,
}

impl std::fmt::Debug for PageEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageEnvelope").field("command", &self.command).finish()
    }
}

impl PageHandle {
    pub fn id(&self) -> PageId {
        self.id
    }

    /// Whether the runtime has stopped
    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }

    /// Queue `command` and wait for the page's acknowledgement
    pub async fn send(&self, command: Command) -> Result<PageAck, DeliveryError> {
        let (reply, ack) = oneshot::channel();
        self.mailbox
            .send(PageEnvelope { command, reply })
            .await
            .map_err(|_| DeliveryError::NotReady(self.id))?;
        ack.await.map_err(|_| DeliveryError::NoAck(self.id))
    }
}

/// Event loop hosting one page
pub struct PageRuntime<B, D> {
    id: PageId,
    surface: ControlSurface<B, D>,
    monitor: AttachmentMonitor,
    mailbox: mpsc::Receiver<PageEnvelope>,
    mutations: broadcast::Receiver<DocumentEvent>,
}

impl<B, D> PageRuntime<B, D>
where
    B: AudioBackend + 'static,
    D: Document + 'static,
{
    /// Create the runtime and the handle used to reach it
    ///
    /// The document subscription is taken here, so mutations that happen
    /// before the loop starts are not missed.
    pub fn new(id: PageId, surface: ControlSurface<B, D>, capacity: usize) -> (Self, PageHandle) {
        let (tx, mailbox) = mpsc::channel(capacity.max(1));
        let mutations = surface.document().subscribe();

        let runtime = Self {
            id,
            surface,
            monitor: AttachmentMonitor::new(),
            mailbox,
            mutations,
        };
        (runtime, PageHandle { id, mailbox: tx })
    }

    pub fn spawn(self) -> JoinHandle<ControlSurface<B, D>> {
        tokio::spawn(self.run())
    }

    /// Run until every handle is dropped, then give the surface back
    #[instrument(skip(self), fields(page = %self.id))]
    pub async fn run(mut self) -> ControlSurface<B, D> {
        let first = self.monitor.start(&mut self.surface);
        debug!(?first, "Initial media check");

        let mut observing = true;
        loop {
            tokio::select! {
                biased;

                event = self.mutations.recv(), if observing => match event {
                    Ok(DocumentEvent::Mutated) => self.on_mutation(),
                    Err(RecvError::Lagged(missed)) => {
                        debug!(missed, "Mutation events lagged");
                        self.on_mutation();
                    }
                    Err(RecvError::Closed) => {
                        warn!("Document stopped reporting mutations");
                        observing = false;
                    }
                },

                envelope = self.mailbox.recv() => match envelope {
                    Some(PageEnvelope { command, reply }) => {
                        let ack = self.surface.handle(&command);
                        if !ack.ok {
                            debug!(kind = command.kind(), error = ?ack.error, "Command rejected");
                        }
                        // The sender may have given up waiting
                        let _ = reply.send(ack);
                    }
                    None => break,
                },
            }
        }

        info!("Page runtime stopped");
        self.surface
    }

    fn on_mutation(&mut self) {
        match self.monitor.on_mutation(&mut self.surface) {
            Attachment::Constructed { enabled } => {
                info!(enabled, "Audio graph attached to media element")
            }
            Attachment::Failed(error) => warn!(%error, "Media attachment failed"),
            Attachment::AlreadyConstructed | Attachment::NoMedia => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::RenderGraph;
    use voicefocus_core::domain::graph::GraphBuilder;
    use voicefocus_core::domain::media::{InMemoryDocument, MediaElement};
    use voicefocus_core::domain::stage::ChainParams;

    const URL: &str = "https://www.youtube.com/watch?v=runtime";

    fn runtime(
        doc: InMemoryDocument,
    ) -> (PageRuntime<RenderGraph, InMemoryDocument>, PageHandle) {
        let graph = GraphBuilder::new(RenderGraph::new(8000), ChainParams::default());
        PageRuntime::new(PageId::new(1), ControlSurface::new(graph, doc), 8)
    }

    fn toggle(enabled: bool) -> Command {
        Command::VoiceFocusToggle {
            enabled,
            deesser_enabled: false,
            reverb_enabled: false,
        }
    }

    #[tokio::test]
    async fn test_commands_are_acknowledged_in_order() {
        let doc = InMemoryDocument::with_media(URL, MediaElement::new("v", "blob:v"));
        let (runtime, handle) = runtime(doc);
        let task = runtime.spawn();

        assert!(handle.send(toggle(true)).await.unwrap().ok);
        assert!(handle.send(Command::VolumeChange { volume: 120 }).await.unwrap().ok);
        assert!(handle.send(toggle(false)).await.unwrap().ok);

        drop(handle);
        let surface = task.await.unwrap();
        assert!(!surface.graph().is_connected());
        assert_eq!(surface.graph().volume_percent(), 120);
    }

    #[tokio::test]
    async fn test_missing_video_is_reported() {
        let (runtime, handle) = runtime(InMemoryDocument::new(URL));
        let task = runtime.spawn();

        let ack = handle.send(toggle(true)).await.unwrap();
        assert_eq!(ack.error.as_deref(), Some("No video element"));

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_late_video_picks_up_last_toggle() {
        let doc = InMemoryDocument::new(URL);
        let (runtime, handle) = runtime(doc.clone());
        let task = runtime.spawn();

        assert!(!handle.send(toggle(true)).await.unwrap().ok);
        doc.insert_media(MediaElement::new("v", "blob:v"));

        // Mutations are polled first, so this ack proves the insertion was seen
        assert!(handle.send(Command::VolumeChange { volume: 100 }).await.unwrap().ok);

        drop(handle);
        let surface = task.await.unwrap();
        assert!(surface.graph().is_constructed());
        assert!(surface.graph().is_connected());
    }

    #[tokio::test]
    async fn test_stopped_runtime_is_not_ready() {
        let (runtime, handle) = runtime(InMemoryDocument::new(URL));
        drop(runtime);

        assert!(handle.is_closed());
        assert!(matches!(
            handle.send(Command::GetState).await,
            Err(DeliveryError::NotReady(_))
        ));
    }
}
