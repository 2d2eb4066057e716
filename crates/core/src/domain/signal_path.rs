//! Signal path model
//!
//! Pure policy: turns a [`RoutingState`] into the exact ordered list of
//! connections the graph builder must realise, and computes the delta between
//! two wirings. Nothing here touches an audio backend.

use crate::domain::stage::StageId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Optional branches of the chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainOptions {
    /// De-esser notch between the last music notch and the compressor
    pub deesser: bool,
    /// Parallel convolution (wet) path summed with the dry path
    pub reverb: bool,
}

impl ChainOptions {
    pub fn new(deesser: bool, reverb: bool) -> Self {
        Self { deesser, reverb }
    }
}

/// Where the media source is currently routed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoutingState {
    /// Source wired straight to the destination
    #[default]
    Bypassed,
    /// Source routed through the processing chain
    Connected(ChainOptions),
}

impl RoutingState {
    pub fn is_connected(&self) -> bool {
        matches!(self, RoutingState::Connected(_))
    }

    /// Target state for an enabled flag and the current options
    pub fn target(enabled: bool, options: ChainOptions) -> Self {
        if enabled {
            RoutingState::Connected(options)
        } else {
            RoutingState::Bypassed
        }
    }
}

/// A directed edge between two graph nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub from: StageId,
    pub to: StageId,
}

impl Connection {
    pub fn new(from: StageId, to: StageId) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Ordered connection list realising `state`
///
/// Mandatory stages come first in chain order; the reverb branch is appended
/// after the dry path so that the merge point (output gain) gets both inputs
/// before it is wired onward.
pub fn plan(state: RoutingState) -> Vec<Connection> {
    use StageId::*;

    let options = match state {
        RoutingState::Bypassed => return vec![Connection::new(Source, Destination)],
        RoutingState::Connected(options) => options,
    };

    let mut wiring = vec![
        Connection::new(Source, HighPass),
        Connection::new(HighPass, NotchLow),
        Connection::new(NotchLow, NotchMid),
        Connection::new(NotchMid, NotchHigh),
    ];

    if options.deesser {
        wiring.push(Connection::new(NotchHigh, Deesser));
        wiring.push(Connection::new(Deesser, Compressor));
    } else {
        wiring.push(Connection::new(NotchHigh, Compressor));
    }

    wiring.push(Connection::new(Compressor, DryGain));
    wiring.push(Connection::new(DryGain, OutputGain));

    if options.reverb {
        wiring.push(Connection::new(Compressor, Convolver));
        wiring.push(Connection::new(Convolver, WetGain));
        wiring.push(Connection::new(WetGain, OutputGain));
    }

    wiring.push(Connection::new(OutputGain, VolumeGain));
    wiring.push(Connection::new(VolumeGain, Destination));

    wiring
}

/// Connections to remove and add to move from one wiring to another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WiringDelta {
    /// In the order they appear in the current wiring
    pub disconnect: Vec<Connection>,
    /// In the order they appear in the desired wiring
    pub connect: Vec<Connection>,
}

impl WiringDelta {
    pub fn between(actual: &[Connection], desired: &[Connection]) -> Self {
        let wanted: HashSet<_> = desired.iter().collect();
        let present: HashSet<_> = actual.iter().collect();

        Self {
            disconnect: actual
                .iter()
                .filter(|c| !wanted.contains(c))
                .copied()
                .collect(),
            connect: desired
                .iter()
                .filter(|c| !present.contains(c))
                .copied()
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.disconnect.is_empty() && self.connect.is_empty()
    }
}
