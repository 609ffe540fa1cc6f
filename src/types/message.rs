//! Decoded signaling message as delivered by the upstream decoder/binder.

use serde::{Deserialize, Serialize};

/// Transfer direction of a signaling message relative to the UE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// UE → network
    Ul,
    /// Network → UE
    Dl,
    #[default]
    Unknown,
}

/// Decoded payload facts the flow handlers gate on.
///
/// Everything here is optional: a field the decoder did not extract is
/// `None` and never blocks a phase start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    /// Number of dedicated NAS PDUs carried inside an RRC container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nas_pdu_count: Option<u32>,
}

/// One UE-addressed signaling event.
///
/// `ue_id` is the stable subscriber identity produced by the binder;
/// `timestamp` is epoch milliseconds from the capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalingMessage {
    #[serde(default)]
    pub ue_id: String,
    #[serde(default)]
    pub msg_type: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub iface: String,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub protocol_layer: String,
    #[serde(default)]
    pub payload: MessagePayload,
}

impl SignalingMessage {
    pub fn new(ue_id: impl Into<String>, msg_type: impl Into<String>, timestamp: i64) -> Self {
        Self {
            ue_id: ue_id.into(),
            msg_type: msg_type.into(),
            timestamp,
            iface: String::new(),
            direction: Direction::Unknown,
            protocol_layer: String::new(),
            payload: MessagePayload::default(),
        }
    }

    /// Set the capture interface (`Uu`, `N2`, `Xn`, `F1`) and protocol layer.
    #[must_use]
    pub fn on(mut self, iface: impl Into<String>, protocol_layer: impl Into<String>) -> Self {
        self.iface = iface.into();
        self.protocol_layer = protocol_layer.into();
        self
    }

    #[must_use]
    pub const fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    #[must_use]
    pub const fn with_nas_pdu_count(mut self, count: u32) -> Self {
        self.payload.nas_pdu_count = Some(count);
        self
    }

    /// Case-insensitive interface/layer match used by affinity scoring.
    pub fn is_on(&self, iface: &str, protocol_layer: &str) -> bool {
        self.iface.eq_ignore_ascii_case(iface)
            && self.protocol_layer.eq_ignore_ascii_case(protocol_layer)
    }
}
