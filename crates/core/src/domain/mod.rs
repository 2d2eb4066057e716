//! Domain entities and business rules

pub mod config;
pub mod control;
pub mod dsp;
pub mod graph;
pub mod impulse;
pub mod media;
pub mod message;
pub mod monitor;
pub mod relay;
pub mod signal_path;
pub mod stage;

// Re-export specific items to avoid ambiguous glob imports
pub use config::{ConfigError, ConfigManager, VoiceFocusConfig};
pub use control::{ControlSurface, NO_MEDIA_ERROR};
pub use dsp::{BiquadCoeffs, BiquadFilter, Compressor, CompressorParams, Effect, Gain};
pub use graph::{AudioBackend, Construction, GraphBuilder, GraphError, WiringReport};
pub use impulse::ImpulseResponse;
pub use media::{Document, DocumentEvent, InMemoryDocument, MediaElement, MediaId};
pub use message::{BroadcastSummary, Command, FeatureState, PageAck, Reply};
pub use monitor::{Attachment, AttachmentMonitor};
pub use relay::{DeliveryError, PageDirectory, PageId, PageInfo, StateRelay, UrlPattern};
pub use signal_path::{plan, ChainOptions, Connection, RoutingState, WiringDelta};
pub use stage::{ChainParams, ProcessingStage, StageId, StageKind};
