//! Processing stages of the voice focus chain
//!
//! Stages are created once per media source with fixed parameters. Only the
//! volume stage's factor changes afterwards; everything else is a matter of
//! wiring (see [`crate::domain::signal_path`]).

use crate::domain::dsp::CompressorParams;
use crate::domain::impulse::ImpulseResponse;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a node in the audio graph
///
/// Variants are declared in topological order: every connection the signal
/// path model ever plans goes from an earlier identity to a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Source,
    HighPass,
    NotchLow,
    NotchMid,
    NotchHigh,
    Deesser,
    Compressor,
    DryGain,
    Convolver,
    WetGain,
    OutputGain,
    VolumeGain,
    Destination,
}

impl StageId {
    /// All identities in topological order
    pub const ALL: [StageId; 13] = [
        StageId::Source,
        StageId::HighPass,
        StageId::NotchLow,
        StageId::NotchMid,
        StageId::NotchHigh,
        StageId::Deesser,
        StageId::Compressor,
        StageId::DryGain,
        StageId::Convolver,
        StageId::WetGain,
        StageId::OutputGain,
        StageId::VolumeGain,
        StageId::Destination,
    ];

    /// Processing stages, i.e. everything except the source and destination
    pub fn processing() -> impl Iterator<Item = StageId> {
        Self::ALL
            .into_iter()
            .filter(|id| !matches!(id, StageId::Source | StageId::Destination))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Source => "source",
            StageId::HighPass => "highpass",
            StageId::NotchLow => "notch_low",
            StageId::NotchMid => "notch_mid",
            StageId::NotchHigh => "notch_high",
            StageId::Deesser => "deesser",
            StageId::Compressor => "compressor",
            StageId::DryGain => "dry_gain",
            StageId::Convolver => "convolver",
            StageId::WetGain => "wet_gain",
            StageId::OutputGain => "output_gain",
            StageId::VolumeGain => "volume_gain",
            StageId::Destination => "destination",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audio transform performed by a stage
#[derive(Debug, Clone, PartialEq)]
pub enum StageKind {
    HighPass { frequency_hz: f32, q: f32 },
    /// `gain_db` is carried for the de-esser but a notch response ignores it
    Notch { frequency_hz: f32, q: f32, gain_db: f32 },
    Compressor(CompressorParams),
    Gain { factor: f32 },
    Convolver(ImpulseResponse),
}

/// A named, typed audio transform with fixed parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingStage {
    pub id: StageId,
    pub kind: StageKind,
}

impl ProcessingStage {
    pub fn new(id: StageId, kind: StageKind) -> Self {
        Self { id, kind }
    }
}

/// Notch filter parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NotchParams {
    pub frequency_hz: f32,
    pub q: f32,
    #[serde(default)]
    pub gain_db: f32,
}

impl NotchParams {
    const fn new(frequency_hz: f32, q: f32) -> Self {
        Self {
            frequency_hz,
            q,
            gain_db: 0.0,
        }
    }
}

/// Fixed parameters of every stage in the chain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainParams {
    pub high_pass_hz: f32,
    pub high_pass_q: f32,
    pub notch_low: NotchParams,
    pub notch_mid: NotchParams,
    pub notch_high: NotchParams,
    pub deesser: NotchParams,
    pub compressor: CompressorParams,
    pub output_gain: f32,
    pub wet_gain: f32,
    pub dry_gain: f32,
    pub reverb_seconds: f32,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            high_pass_hz: 80.0,
            high_pass_q: std::f32::consts::FRAC_1_SQRT_2,
            // Bass lines and kick drums
            notch_low: NotchParams::new(160.0, 2.0),
            // Guitars and synth pads
            notch_mid: NotchParams::new(600.0, 2.0),
            // Upper-mid instruments, slightly wider to keep some clarity
            notch_high: NotchParams::new(1500.0, 1.5),
            // Sibilants
            deesser: NotchParams {
                frequency_hz: 5000.0,
                q: 2.5,
                gain_db: -8.0,
            },
            compressor: CompressorParams::default(),
            output_gain: 2.5,
            wet_gain: 0.15,
            dry_gain: 1.0,
            reverb_seconds: 2.0,
        }
    }
}

impl ChainParams {
    /// Build every processing stage with its fixed parameters
    ///
    /// The volume stage starts at `volume_percent / 100`.
    pub fn stages(&self, impulse: ImpulseResponse, volume_percent: u32) -> Vec<ProcessingStage> {
        let notch = |id, p: NotchParams| {
            ProcessingStage::new(
                id,
                StageKind::Notch {
                    frequency_hz: p.frequency_hz,
                    q: p.q,
                    gain_db: p.gain_db,
                },
            )
        };
        let gain = |id, factor| ProcessingStage::new(id, StageKind::Gain { factor });

        vec![
            ProcessingStage::new(
                StageId::HighPass,
                StageKind::HighPass {
                    frequency_hz: self.high_pass_hz,
                    q: self.high_pass_q,
                },
            ),
            notch(StageId::NotchLow, self.notch_low),
            notch(StageId::NotchMid, self.notch_mid),
            notch(StageId::NotchHigh, self.notch_high),
            notch(StageId::Deesser, self.deesser),
            ProcessingStage::new(StageId::Compressor, StageKind::Compressor(self.compressor)),
            gain(StageId::DryGain, self.dry_gain),
            ProcessingStage::new(StageId::Convolver, StageKind::Convolver(impulse)),
            gain(StageId::WetGain, self.wet_gain),
            gain(StageId::OutputGain, self.output_gain),
            gain(StageId::VolumeGain, volume_factor(volume_percent)),
        ]
    }
}

/// Linear mapping from a volume percentage to a gain factor
pub fn volume_factor(percent: u32) -> f32 {
    percent as f32 / 100.0
}
