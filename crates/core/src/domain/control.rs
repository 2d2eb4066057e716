//! Page-side control surface
//!
//! Receives the toggle commands forwarded by the coordinator and drives the
//! page's [`GraphBuilder`]. One control surface exists per hosted page and is
//! owned by that page's event loop.

use crate::domain::graph::{AudioBackend, GraphBuilder};
use crate::domain::media::Document;
use crate::domain::message::{Command, PageAck};
use crate::domain::signal_path::ChainOptions;
use tracing::{debug, info, warn};

/// Failure reported when a voice focus toggle finds no media element
pub const NO_MEDIA_ERROR: &str = "No video element";

/// Dispatches page commands to the audio graph
pub struct ControlSurface<B, D> {
    graph: GraphBuilder<B>,
    document: D,
    /// Most recent enabled state requested from outside
    last_enabled: bool,
}

impl<B: AudioBackend, D: Document> ControlSurface<B, D> {
    pub fn new(graph: GraphBuilder<B>, document: D) -> Self {
        Self {
            graph,
            document,
            last_enabled: false,
        }
    }

    /// Handle one forwarded command
    pub fn handle(&mut self, command: &Command) -> PageAck {
        match *command {
            Command::VoiceFocusToggle {
                enabled,
                deesser_enabled,
                reverb_enabled,
            } => self.toggle_voice_focus(enabled, ChainOptions::new(deesser_enabled, reverb_enabled)),
            Command::DeesserToggle { enabled } => {
                info!(enabled, "De-esser toggled");
                let options = ChainOptions {
                    deesser: enabled,
                    ..self.graph.options()
                };
                self.graph.rebuild(options);
                PageAck::ok()
            }
            Command::ReverbToggle { enabled } => {
                info!(enabled, "Reverb toggled");
                let options = ChainOptions {
                    reverb: enabled,
                    ..self.graph.options()
                };
                self.graph.rebuild(options);
                PageAck::ok()
            }
            Command::VolumeChange { volume } => {
                let factor = self.graph.set_volume(volume);
                info!(volume, factor, "Volume changed");
                PageAck::ok()
            }
            Command::GetState => PageAck::failure("get-state is answered by the coordinator"),
        }
    }

    fn toggle_voice_focus(&mut self, enabled: bool, options: ChainOptions) -> PageAck {
        self.graph.set_options(options);
        self.last_enabled = enabled;

        let Some(media) = self.document.find_media() else {
            warn!(url = self.document.url(), "Video element not found when toggling");
            return PageAck::failure(NO_MEDIA_ERROR);
        };

        if let Err(e) = self.graph.construct(Some(&media)) {
            warn!(error = %e, "Graph construction failed");
            return PageAck::failure(e.to_string());
        }

        match self.graph.set_enabled(enabled) {
            Ok(report) => {
                debug!(?report, "Voice focus routing applied");
                PageAck::ok()
            }
            Err(e) => {
                warn!(error = %e, "Voice focus toggle failed");
                PageAck::failure(e.to_string())
            }
        }
    }

    pub fn last_enabled(&self) -> bool {
        self.last_enabled
    }

    pub fn graph(&self) -> &GraphBuilder<B> {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut GraphBuilder<B> {
        &mut self.graph
    }

    pub fn document(&self) -> &D {
        &self.document
    }
}
