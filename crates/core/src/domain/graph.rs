//! Audio graph builder
//!
//! Owns the per-page audio graph: creates the stages once per media source,
//! then realises routing states by diffing the desired wiring (from the
//! signal path model) against the wiring it knows to be in place.
//!
//! Sample processing is delegated to an [`AudioBackend`]; the builder only
//! issues node creation, connection and gain commands.

use crate::domain::impulse::ImpulseResponse;
use crate::domain::media::{MediaElement, MediaId};
use crate::domain::signal_path::{plan, ChainOptions, Connection, RoutingState, WiringDelta};
use crate::domain::stage::{volume_factor, ChainParams, ProcessingStage, StageId};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised by the audio graph or its backend
#[derive(Debug, Error)]
pub enum GraphError {
    /// No media element to attach to
    #[error("No media source available")]
    NoMediaSource,

    /// Operation needs the stages to exist first
    #[error("Audio graph has not been constructed")]
    NotConstructed,

    /// The backend has no node with this identity
    #[error("Stage not created: {0}")]
    UnknownStage(StageId),

    /// Disconnect of an edge that is not in place
    #[error("Connection not wired: {0}")]
    NotWired(Connection),

    /// Connect of an edge that is already in place
    #[error("Connection already wired: {0}")]
    AlreadyWired(Connection),

    /// Edge the backend cannot represent
    #[error("Invalid connection: {0}")]
    InvalidConnection(Connection),

    /// Source already attached to another element
    #[error("Media source already attached: {0}")]
    SourceAlreadyAttached(MediaId),

    #[error("Backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;

/// Audio context the graph builder drives
///
/// Implementations own the actual nodes. `Source` and `Destination` always
/// exist; every other [`StageId`] exists once created.
pub trait AudioBackend: Send {
    /// Output sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Bind the `Source` node to a media element
    fn attach_source(&mut self, media: &MediaElement) -> Result<()>;

    /// Create a processing node
    fn create_stage(&mut self, stage: ProcessingStage) -> Result<()>;

    fn connect(&mut self, connection: Connection) -> Result<()>;

    fn disconnect(&mut self, connection: Connection) -> Result<()>;

    /// Update the factor of a gain node
    fn set_gain(&mut self, stage: StageId, factor: f32) -> Result<()>;
}

/// Outcome of [`GraphBuilder::construct`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Construction {
    Constructed,
    AlreadyConstructed,
}

/// Counts of wiring operations performed by one transition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WiringReport {
    pub connected: usize,
    pub disconnected: usize,
    /// Backend rejections, logged and skipped
    pub failures: usize,
}

impl WiringReport {
    pub fn is_noop(&self) -> bool {
        self.connected == 0 && self.disconnected == 0 && self.failures == 0
    }
}

/// Builds and rewires the voice focus chain for one page
pub struct GraphBuilder<B> {
    backend: B,
    params: ChainParams,
    /// Set once construction succeeded
    media: Option<MediaId>,
    routing: RoutingState,
    /// Flags used the next time the chain is connected
    options: ChainOptions,
    volume_percent: u32,
    /// Connections currently in place, in plan order
    wiring: Vec<Connection>,
}

impl<B: AudioBackend> GraphBuilder<B> {
    pub fn new(backend: B, params: ChainParams) -> Self {
        Self {
            backend,
            params,
            media: None,
            routing: RoutingState::Bypassed,
            options: ChainOptions::default(),
            volume_percent: 100,
            wiring: Vec::new(),
        }
    }

    /// Create every stage and wire the source straight to the destination
    ///
    /// Runs at most once; later calls report [`Construction::AlreadyConstructed`]
    /// without touching the backend.
    pub fn construct(&mut self, media: Option<&MediaElement>) -> Result<Construction> {
        let Some(media) = media else {
            warn!("No media element found, deferring graph construction");
            return Err(GraphError::NoMediaSource);
        };

        if let Some(existing) = &self.media {
            debug!(media = %existing, "Audio graph already constructed");
            return Ok(Construction::AlreadyConstructed);
        }

        self.backend.attach_source(media)?;

        let impulse = ImpulseResponse::generate(self.backend.sample_rate(), self.params.reverb_seconds);
        for stage in self.params.stages(impulse, self.volume_percent) {
            self.backend.create_stage(stage)?;
        }

        self.media = Some(media.id.clone());
        self.wiring.clear();
        self.routing = RoutingState::Bypassed;
        self.reconcile(RoutingState::Bypassed);

        info!(
            media = %media.id,
            sample_rate = self.backend.sample_rate(),
            "Audio graph constructed"
        );
        Ok(Construction::Constructed)
    }

    /// Route the source through the chain (`true`) or straight to output
    pub fn set_enabled(&mut self, enabled: bool) -> Result<WiringReport> {
        if self.media.is_none() {
            return Err(GraphError::NotConstructed);
        }

        let target = RoutingState::target(enabled, self.options);
        if target == self.routing {
            debug!(?target, "Routing already in target state");
            return Ok(WiringReport::default());
        }

        if enabled {
            info!(deesser = self.options.deesser, reverb = self.options.reverb, "Enabling voice focus");
        } else {
            info!("Disabling voice focus");
        }

        Ok(self.reconcile(target))
    }

    /// Store new branch flags and rewire if currently connected
    ///
    /// While bypassed the flags only take effect on the next connection.
    pub fn rebuild(&mut self, options: ChainOptions) -> WiringReport {
        self.options = options;

        match self.routing {
            RoutingState::Connected(current) if current != options => {
                let report = self.reconcile(RoutingState::Connected(options));
                debug!(?options, ?report, "Chain rebuilt");
                report
            }
            _ => WiringReport::default(),
        }
    }

    /// Store branch flags without rewiring
    pub fn set_options(&mut self, options: ChainOptions) {
        self.options = options;
    }

    /// Set the volume stage to `percent / 100`, connected or not
    pub fn set_volume(&mut self, percent: u32) -> f32 {
        self.volume_percent = percent;
        let factor = volume_factor(percent);

        if self.media.is_some() {
            if let Err(e) = self.backend.set_gain(StageId::VolumeGain, factor) {
                warn!(error = %e, "Failed to update volume gain");
            }
        }

        debug!(percent, factor, "Volume updated");
        factor
    }

    /// Apply the delta between the current wiring and the plan for `target`
    fn reconcile(&mut self, target: RoutingState) -> WiringReport {
        let desired = plan(target);
        let delta = WiringDelta::between(&self.wiring, &desired);
        let mut report = WiringReport::default();

        for connection in &delta.disconnect {
            match self.backend.disconnect(*connection) {
                Ok(()) => report.disconnected += 1,
                Err(e) => {
                    warn!(%connection, error = %e, "Disconnect failed, continuing");
                    report.failures += 1;
                }
            }
        }

        let mut failed = HashSet::new();
        for connection in &delta.connect {
            match self.backend.connect(*connection) {
                Ok(()) => report.connected += 1,
                Err(e) => {
                    warn!(%connection, error = %e, "Connect failed, continuing");
                    report.failures += 1;
                    failed.insert(*connection);
                }
            }
        }

        self.wiring = desired
            .into_iter()
            .filter(|c| !failed.contains(c))
            .collect();
        self.routing = target;
        report
    }

    pub fn is_constructed(&self) -> bool {
        self.media.is_some()
    }

    pub fn media_id(&self) -> Option<&MediaId> {
        self.media.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.routing.is_connected()
    }

    pub fn routing(&self) -> RoutingState {
        self.routing
    }

    pub fn options(&self) -> ChainOptions {
        self.options
    }

    pub fn volume_percent(&self) -> u32 {
        self.volume_percent
    }

    pub fn volume_factor(&self) -> f32 {
        volume_factor(self.volume_percent)
    }

    /// Connections currently in place
    pub fn wiring(&self) -> &[Connection] {
        &self.wiring
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
