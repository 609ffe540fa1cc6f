//! Classification-time values: phase lookups, scores and per-message results.

use serde::{Deserialize, Serialize};

use super::procedure::{CloseReason, ProcedureType};

/// Position of a message type inside a phase model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseLocation {
    pub phase_index: i32,
    pub order_index: i32,
    pub is_phase_start: bool,
    pub is_key_message: bool,
}

/// Transient outcome of scoring one candidate against one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub value: i32,
    /// Phase the message would move the candidate to.
    pub phase_index: i32,
    pub order_index: i32,
}

impl Score {
    /// Value for a message this candidate's type does not know at all.
    pub const INELIGIBLE: i32 = -100;

    pub const fn new(value: i32, phase_index: i32, order_index: i32) -> Self {
        Self {
            value,
            phase_index,
            order_index,
        }
    }
}

/// Wire status of a [`MatchResult`]; see [`MatchStatus::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Matched,
    NotMatched,
    Error,
}

impl MatchStatus {
    pub const fn code(self) -> u8 {
        match self {
            Self::Matched => 0,
            Self::NotMatched => 1,
            Self::Error => 2,
        }
    }
}

/// Outcome of classifying one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub status: MatchStatus,
    pub procedure_id: Option<String>,
    pub procedure_type: Option<ProcedureType>,
    pub new_procedure: bool,
    pub message: Option<String>,
    /// Set when this message closed the procedure it matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed: Option<CloseReason>,
}

impl MatchResult {
    pub fn matched_existing(
        procedure_id: impl Into<String>,
        procedure_type: ProcedureType,
        closed: Option<CloseReason>,
    ) -> Self {
        Self {
            status: MatchStatus::Matched,
            procedure_id: Some(procedure_id.into()),
            procedure_type: Some(procedure_type),
            new_procedure: false,
            message: None,
            closed,
        }
    }

    pub fn matched_new(procedure_id: impl Into<String>, procedure_type: ProcedureType) -> Self {
        Self {
            status: MatchStatus::Matched,
            procedure_id: Some(procedure_id.into()),
            procedure_type: Some(procedure_type),
            new_procedure: true,
            message: None,
            closed: None,
        }
    }

    pub fn not_matched(message: impl Into<String>) -> Self {
        Self {
            status: MatchStatus::NotMatched,
            procedure_id: None,
            procedure_type: None,
            new_procedure: false,
            message: Some(message.into()),
            closed: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: MatchStatus::Error,
            procedure_id: None,
            procedure_type: None,
            new_procedure: false,
            message: Some(message.into()),
            closed: None,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.status == MatchStatus::Matched
    }
}

/// Role a message type plays across all registered flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageCategory {
    /// Key or end message of at least one flow.
    ProcedureDriving,
    /// Appears in a phase model but carries no completion evidence.
    ProcedureAux,
    NonProcedure,
}

impl std::fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProcedureDriving => write!(f, "PROCEDURE_DRIVING"),
            Self::ProcedureAux => write!(f, "PROCEDURE_AUX"),
            Self::NonProcedure => write!(f, "NON_PROCEDURE"),
        }
    }
}
