//! Message contract between control clients, the coordinator and pages
//!
//! Messages travel as JSON objects tagged by `type`
//! (`{"type":"DEESSER_TOGGLE","enabled":true}`), with camelCase fields.

use serde::{Deserialize, Serialize};

/// Default volume boost in percent
pub const DEFAULT_VOLUME: u32 = 100;

/// Commands understood by the coordinator and, except `GetState`, by pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Connect or bypass the whole chain
    #[serde(rename_all = "camelCase")]
    VoiceFocusToggle {
        enabled: bool,
        #[serde(default)]
        deesser_enabled: bool,
        #[serde(default)]
        reverb_enabled: bool,
    },
    DeesserToggle {
        enabled: bool,
    },
    ReverbToggle {
        enabled: bool,
    },
    VolumeChange {
        volume: u32,
    },
    GetState,
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::VoiceFocusToggle { .. } => "voice-focus-toggle",
            Command::DeesserToggle { .. } => "deesser-toggle",
            Command::ReverbToggle { .. } => "reverb-toggle",
            Command::VolumeChange { .. } => "volume-change",
            Command::GetState => "get-state",
        }
    }
}

/// Extension-wide feature toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureState {
    #[serde(rename = "enabled")]
    pub voice_focus_enabled: bool,
    pub deesser_enabled: bool,
    pub reverb_enabled: bool,
    pub volume_boost: u32,
}

impl Default for FeatureState {
    fn default() -> Self {
        Self {
            voice_focus_enabled: false,
            deesser_enabled: false,
            reverb_enabled: false,
            volume_boost: DEFAULT_VOLUME,
        }
    }
}

impl FeatureState {
    /// Fold a toggle command into the state
    ///
    /// Returns `false` for commands that do not change state.
    pub fn apply(&mut self, command: &Command) -> bool {
        match *command {
            Command::VoiceFocusToggle {
                enabled,
                deesser_enabled,
                reverb_enabled,
            } => {
                self.voice_focus_enabled = enabled;
                self.deesser_enabled = deesser_enabled;
                self.reverb_enabled = reverb_enabled;
            }
            Command::DeesserToggle { enabled } => self.deesser_enabled = enabled,
            Command::ReverbToggle { enabled } => self.reverb_enabled = enabled,
            Command::VolumeChange { volume } => self.volume_boost = volume,
            Command::GetState => return false,
        }
        true
    }

    /// The command a page needs to catch up with this state's voice focus flags
    pub fn voice_focus_command(&self) -> Command {
        Command::VoiceFocusToggle {
            enabled: self.voice_focus_enabled,
            deesser_enabled: self.deesser_enabled,
            reverb_enabled: self.reverb_enabled,
        }
    }
}

/// Page acknowledgement of a forwarded command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageAck {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageAck {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Per-broadcast delivery counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastSummary {
    /// Pages matching the site pattern
    pub targeted: usize,
    /// Acknowledged with `ok: true`
    pub delivered: usize,
    /// Acknowledged with `ok: false`
    pub rejected: usize,
    /// Not loaded or gone before acknowledging
    pub unreachable: usize,
}

/// Coordinator reply to a client command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Toggled {
        success: bool,
        state: FeatureState,
        broadcast: BroadcastSummary,
    },
    State(FeatureState),
}
