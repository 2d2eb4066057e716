//! Offline render backend
//!
//! [`RenderGraph`] is the [`AudioBackend`] the page runtimes drive. It keeps
//! one DSP node per created stage plus the set of wired edges, and renders
//! mono buffers by walking the stages in topological order: each node
//! processes the sum of its wired inputs, so merge points (the output gain
//! fed by the dry and wet paths) mix naturally.

use super::convolver::FftConvolver;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};
use voicefocus_core::domain::dsp::{BiquadCoeffs, BiquadFilter, Compressor, Effect, Gain};
use voicefocus_core::domain::graph::{AudioBackend, GraphError, Result};
use voicefocus_core::domain::media::MediaElement;
use voicefocus_core::domain::signal_path::Connection;
use voicefocus_core::domain::stage::{ProcessingStage, StageId, StageKind};

/// DSP state of one created stage
enum Node {
    Filter(BiquadFilter),
    Compressor(Compressor),
    Gain(Gain),
    Convolver(Box<FftConvolver>),
}

impl Node {
    fn build(kind: StageKind, sample_rate: u32) -> Self {
        let rate = sample_rate as f32;
        match kind {
            StageKind::HighPass { frequency_hz, q } => {
                Node::Filter(BiquadFilter::new(BiquadCoeffs::high_pass(rate, frequency_hz, q)))
            }
            // Peaking gain is not part of a notch response
            StageKind::Notch { frequency_hz, q, .. } => {
                Node::Filter(BiquadFilter::new(BiquadCoeffs::notch(rate, frequency_hz, q)))
            }
            StageKind::Compressor(params) => Node::Compressor(Compressor::new(params, sample_rate)),
            StageKind::Gain { factor } => Node::Gain(Gain::new(factor)),
            StageKind::Convolver(impulse) => {
                Node::Convolver(Box::new(FftConvolver::from_impulse(&impulse)))
            }
        }
    }

    fn effect(&mut self) -> &mut dyn Effect {
        match self {
            Node::Filter(f) => f,
            Node::Compressor(c) => c,
            Node::Gain(g) => g,
            Node::Convolver(c) => c.as_mut(),
        }
    }
}

/// Mono render graph over the voice focus stages
pub struct RenderGraph {
    sample_rate: u32,
    source: Option<MediaElement>,
    nodes: HashMap<StageId, Node>,
    edges: HashSet<Connection>,
}

impl RenderGraph {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            source: None,
            nodes: HashMap::new(),
            edges: HashSet::new(),
        }
    }

    /// Media element bound to the source node
    pub fn source(&self) -> Option<&MediaElement> {
        self.source.as_ref()
    }

    pub fn has_stage(&self, id: StageId) -> bool {
        self.exists(id)
    }

    pub fn is_wired(&self, connection: Connection) -> bool {
        self.edges.contains(&connection)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Current factor of a gain stage
    pub fn gain(&self, id: StageId) -> Option<f32> {
        match self.nodes.get(&id) {
            Some(Node::Gain(g)) => Some(g.factor()),
            _ => None,
        }
    }

    /// Push `input` through the wired graph and return what reaches the destination
    ///
    /// Stages without a wired input are skipped; a destination without inputs
    /// yields silence.
    pub fn render(&mut self, input: &[f32]) -> Vec<f32> {
        let mut outputs: HashMap<StageId, Vec<f32>> = HashMap::new();
        outputs.insert(StageId::Source, input.to_vec());

        for id in StageId::ALL.into_iter().skip(1) {
            let mut mixed: Option<Vec<f32>> = None;
            for edge in self.edges.iter().filter(|e| e.to == id) {
                let Some(upstream) = outputs.get(&edge.from) else {
                    continue;
                };
                match mixed.as_mut() {
                    Some(acc) => acc.iter_mut().zip(upstream).for_each(|(a, s)| *a += s),
                    None => mixed = Some(upstream.clone()),
                }
            }

            let Some(mut buffer) = mixed else {
                continue;
            };

            if let Some(node) = self.nodes.get_mut(&id) {
                node.effect().process(&mut buffer);
            }
            outputs.insert(id, buffer);
        }

        trace!(samples = input.len(), edges = self.edges.len(), "Rendered block");
        outputs
            .remove(&StageId::Destination)
            .unwrap_or_else(|| vec![0.0; input.len()])
    }

    /// Clear filter memory, envelopes and reverb tails
    pub fn reset(&mut self) {
        for node in self.nodes.values_mut() {
            node.effect().reset();
        }
    }

    fn exists(&self, id: StageId) -> bool {
        matches!(id, StageId::Source | StageId::Destination) || self.nodes.contains_key(&id)
    }

    fn check_endpoints(&self, connection: Connection) -> Result<()> {
        for id in [connection.from, connection.to] {
            if !self.exists(id) {
                return Err(GraphError::UnknownStage(id));
            }
        }
        // Backward edges would form cycles
        if connection.from >= connection.to {
            return Err(GraphError::InvalidConnection(connection));
        }
        Ok(())
    }
}

impl AudioBackend for RenderGraph {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn attach_source(&mut self, media: &MediaElement) -> Result<()> {
        if let Some(existing) = &self.source {
            if existing.id != media.id {
                return Err(GraphError::SourceAlreadyAttached(existing.id.clone()));
            }
        }
        debug!(media = %media.id, source = %media.source, "Source attached");
        self.source = Some(media.clone());
        Ok(())
    }

    fn create_stage(&mut self, stage: ProcessingStage) -> Result<()> {
        if matches!(stage.id, StageId::Source | StageId::Destination) {
            return Err(GraphError::Backend(format!("{} is not a processing stage", stage.id)));
        }
        trace!(stage = %stage.id, "Stage created");
        self.nodes.insert(stage.id, Node::build(stage.kind, self.sample_rate));
        Ok(())
    }

    fn connect(&mut self, connection: Connection) -> Result<()> {
        self.check_endpoints(connection)?;
        if !self.edges.insert(connection) {
            return Err(GraphError::AlreadyWired(connection));
        }
        Ok(())
    }

    fn disconnect(&mut self, connection: Connection) -> Result<()> {
        if !self.edges.remove(&connection) {
            return Err(GraphError::NotWired(connection));
        }
        Ok(())
    }

    fn set_gain(&mut self, stage: StageId, factor: f32) -> Result<()> {
        match self.nodes.get_mut(&stage) {
            Some(Node::Gain(g)) => {
                g.set_factor(factor);
                Ok(())
            }
            Some(_) => Err(GraphError::Backend(format!("{stage} is not a gain stage"))),
            None => Err(GraphError::UnknownStage(stage)),
        }
    }
}
