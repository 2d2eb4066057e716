//! Integration tests for the voice focus flow
//!
//! These tests drive the complete path a toggle takes: client → coordinator →
//! page hub → page runtime → graph builder → render backend, then inspect the
//! page's audio graph after the runtimes shut down.

use std::collections::HashSet;
use tokio::task::JoinHandle;
use voicefocus_core::domain::control::ControlSurface;
use voicefocus_core::domain::graph::GraphBuilder;
use voicefocus_core::domain::media::{Document, InMemoryDocument, MediaElement};
use voicefocus_core::domain::message::{BroadcastSummary, Command, FeatureState, Reply};
use voicefocus_core::domain::relay::{PageId, StateRelay, UrlPattern};
use voicefocus_core::domain::signal_path::{plan, ChainOptions, Connection, RoutingState};
use voicefocus_core::domain::stage::{ChainParams, StageId};
use voicefocus_infra::audio::RenderGraph;
use voicefocus_infra::coordinator::{CoordinatorHandle, CoordinatorRuntime};
use voicefocus_infra::page::{PageHub, PageRuntime};

const SAMPLE_RATE: u32 = 8000;
const WATCH_URL: &str = "https://www.youtube.com/watch?v=integration";

type Surface = ControlSurface<RenderGraph, InMemoryDocument>;

/// One coordinator plus any number of hosted pages
struct Harness {
    hub: PageHub,
    client: CoordinatorHandle,
    coordinator: JoinHandle<StateRelay<PageHub>>,
    pages: Vec<(PageId, JoinHandle<Surface>)>,
}

impl Harness {
    fn new() -> Self {
        let hub = PageHub::new();
        let (runtime, client) =
            CoordinatorRuntime::new(hub.clone(), UrlPattern::default(), FeatureState::default(), 16);
        Self {
            hub,
            client,
            coordinator: runtime.spawn(),
            pages: Vec::new(),
        }
    }

    fn open_page(&mut self, doc: InMemoryDocument) -> PageId {
        let id = self.hub.register(doc.url());
        let graph = GraphBuilder::new(RenderGraph::new(SAMPLE_RATE), ChainParams::default());
        let (runtime, handle) = PageRuntime::new(id, ControlSurface::new(graph, doc), 16);
        self.pages.push((id, runtime.spawn()));
        self.hub.attach(handle);
        id
    }

    fn open_video_page(&mut self) -> PageId {
        self.open_page(InMemoryDocument::with_media(
            WATCH_URL,
            MediaElement::new("movie_player", "blob:https://www.youtube.com/1"),
        ))
    }

    async fn send(&self, command: Command) -> Reply {
        self.client.send(command).await.unwrap()
    }

    async fn toggle(&self, enabled: bool, deesser: bool, reverb: bool) -> Reply {
        self.send(Command::VoiceFocusToggle {
            enabled,
            deesser_enabled: deesser,
            reverb_enabled: reverb,
        })
        .await
    }

    /// Stop every runtime and return each page's control surface
    async fn shutdown(self) -> Vec<Surface> {
        drop(self.client);
        self.coordinator.await.unwrap();

        let mut surfaces = Vec::new();
        for (id, task) in self.pages {
            self.hub.remove(id);
            surfaces.push(task.await.unwrap());
        }
        surfaces
    }
}

fn wired(surface: &Surface) -> HashSet<Connection> {
    StageId::ALL
        .iter()
        .flat_map(|from| StageId::ALL.iter().map(move |to| Connection::new(*from, *to)))
        .filter(|c| surface.graph().backend().is_wired(*c))
        .collect()
}

fn planned(state: RoutingState) -> HashSet<Connection> {
    plan(state).into_iter().collect()
}

fn has_edges(surface: &Surface, id: StageId) -> bool {
    wired(surface).iter().any(|c| c.from == id || c.to == id)
}

fn summary(reply: &Reply) -> BroadcastSummary {
    match reply {
        Reply::Toggled { broadcast, .. } => *broadcast,
        Reply::State(_) => panic!("expected a toggle reply"),
    }
}

// ============================================================================
// CHAIN SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_voice_focus_on_wires_base_chain() {
    let mut harness = Harness::new();
    harness.open_video_page();

    let reply = harness.toggle(true, false, false).await;
    assert_eq!(summary(&reply).delivered, 1);

    let surfaces = harness.shutdown().await;
    let surface = &surfaces[0];

    use StageId::*;
    let expected: HashSet<_> = [
        (Source, HighPass),
        (HighPass, NotchLow),
        (NotchLow, NotchMid),
        (NotchMid, NotchHigh),
        (NotchHigh, Compressor),
        (Compressor, DryGain),
        (DryGain, OutputGain),
        (OutputGain, VolumeGain),
        (VolumeGain, Destination),
    ]
    .into_iter()
    .map(|(from, to)| Connection::new(from, to))
    .collect();

    assert_eq!(wired(surface), expected);
    assert!(!has_edges(surface, Deesser));
    assert!(!has_edges(surface, Convolver));
}

#[tokio::test]
async fn test_deesser_inserted_between_last_notch_and_compressor() {
    let mut harness = Harness::new();
    harness.open_video_page();

    harness.toggle(true, false, false).await;
    harness.send(Command::DeesserToggle { enabled: true }).await;

    let surfaces = harness.shutdown().await;
    let after = wired(&surfaces[0]);
    let before = planned(RoutingState::Connected(ChainOptions::new(false, false)));

    let added: HashSet<_> = after.difference(&before).copied().collect();
    let removed: HashSet<_> = before.difference(&after).copied().collect();
    assert_eq!(
        added,
        HashSet::from([
            Connection::new(StageId::NotchHigh, StageId::Deesser),
            Connection::new(StageId::Deesser, StageId::Compressor),
        ])
    );
    assert_eq!(
        removed,
        HashSet::from([Connection::new(StageId::NotchHigh, StageId::Compressor)])
    );
}

#[tokio::test]
async fn test_reverb_adds_parallel_wet_path() {
    let mut harness = Harness::new();
    harness.open_video_page();

    harness.toggle(true, false, false).await;
    harness.send(Command::ReverbToggle { enabled: true }).await;

    let surfaces = harness.shutdown().await;
    let wiring = wired(&surfaces[0]);

    let from_compressor: HashSet<_> = wiring
        .iter()
        .filter(|c| c.from == StageId::Compressor)
        .map(|c| c.to)
        .collect();
    assert_eq!(
        from_compressor,
        HashSet::from([StageId::DryGain, StageId::Convolver])
    );
    assert!(wiring.contains(&Connection::new(StageId::Convolver, StageId::WetGain)));
    assert!(wiring.contains(&Connection::new(StageId::WetGain, StageId::OutputGain)));
    assert!(wiring.contains(&Connection::new(StageId::DryGain, StageId::OutputGain)));
}

#[tokio::test]
async fn test_voice_focus_off_returns_to_bypass() {
    let mut harness = Harness::new();
    harness.open_video_page();

    harness.toggle(true, true, true).await;
    harness.toggle(false, true, true).await;

    let surfaces = harness.shutdown().await;
    let surface = &surfaces[0];
    assert_eq!(wired(surface), planned(RoutingState::Bypassed));
    for id in StageId::processing() {
        assert!(!has_edges(surface, id), "{id} still wired");
    }
}

#[tokio::test]
async fn test_volume_change_keeps_wiring() {
    let mut reference = Harness::new();
    reference.open_video_page();
    reference.toggle(true, false, false).await;
    let reference = reference.shutdown().await;

    let mut harness = Harness::new();
    harness.open_video_page();
    harness.toggle(true, false, false).await;
    harness.send(Command::VolumeChange { volume: 150 }).await;
    let surfaces = harness.shutdown().await;

    let backend = surfaces[0].graph().backend();
    assert_eq!(backend.gain(StageId::VolumeGain), Some(1.5));
    assert_eq!(wired(&surfaces[0]), wired(&reference[0]));
}

#[tokio::test]
async fn test_even_number_of_toggles_renders_input_unchanged() {
    let mut harness = Harness::new();
    harness.open_video_page();

    for i in 0..6 {
        harness.toggle(i % 2 == 0, i % 3 == 0, i % 4 == 0).await;
    }

    let mut surfaces = harness.shutdown().await;
    let input: Vec<f32> = (0..256).map(|i| (i as f32 * 0.2).sin() * 0.4).collect();
    let output = surfaces[0].graph_mut().backend_mut().render(&input);
    assert_eq!(output, input);
}

// ============================================================================
// COORDINATOR AND BROADCAST
// ============================================================================

#[tokio::test]
async fn test_broadcast_reaches_only_matching_pages() {
    let mut harness = Harness::new();
    harness.open_video_page();
    harness.open_video_page();
    // Matching page whose player has not loaded
    harness.open_page(InMemoryDocument::new("https://www.youtube.com/feed/subscriptions"));
    // Different site
    harness.open_page(InMemoryDocument::with_media(
        "https://example.com/video",
        MediaElement::new("v", "blob:v"),
    ));
    // Registered but its runtime never started
    harness.hub.register("https://www.youtube.com/watch?v=loading");

    let reply = harness.toggle(true, true, false).await;
    assert_eq!(
        summary(&reply),
        BroadcastSummary {
            targeted: 4,
            delivered: 2,
            rejected: 1,
            unreachable: 1,
        }
    );

    let surfaces = harness.shutdown().await;
    assert!(surfaces[0].graph().is_connected());
    assert!(surfaces[1].graph().is_connected());
    // The non-matching page never heard about it
    assert!(!surfaces[3].graph().is_connected());
}

#[tokio::test]
async fn test_state_reported_after_toggles() {
    let mut harness = Harness::new();
    harness.open_video_page();

    harness.toggle(true, false, false).await;
    harness.send(Command::ReverbToggle { enabled: true }).await;
    harness.send(Command::VolumeChange { volume: 175 }).await;

    let reply = harness.send(Command::GetState).await;
    assert_eq!(
        reply,
        Reply::State(FeatureState {
            voice_focus_enabled: true,
            deesser_enabled: false,
            reverb_enabled: true,
            volume_boost: 175,
        })
    );

    let json = serde_json::to_value(&reply).unwrap();
    assert_eq!(json["enabled"], true);
    assert_eq!(json["reverbEnabled"], true);
    assert_eq!(json["volumeBoost"], 175);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_late_player_catches_up_with_last_toggle() {
    let mut harness = Harness::new();
    let doc = InMemoryDocument::new(WATCH_URL);
    harness.open_page(doc.clone());

    let reply = harness.toggle(true, false, true).await;
    assert_eq!(summary(&reply).rejected, 1);

    doc.insert_media(MediaElement::new("movie_player", "blob:late"));
    // Processed after the mutation by the page's event loop
    harness.send(Command::VolumeChange { volume: 100 }).await;

    let surfaces = harness.shutdown().await;
    assert_eq!(
        wired(&surfaces[0]),
        planned(RoutingState::Connected(ChainOptions::new(false, true)))
    );
}
