//! Tracked procedure instances and their lifecycle records.

use serde::{Deserialize, Serialize};

/// Cursor value of a procedure that has not advanced into any phase yet.
pub const PHASE_UNSET: i32 = -1;

/// Fixed set of procedure types; serialized as their short codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProcedureType {
    #[serde(rename = "IA")]
    InitialAccess,
    #[serde(rename = "XHO")]
    XnHandover,
    #[serde(rename = "N2H")]
    N2Handover,
    #[serde(rename = "RRE")]
    RrcReestablishment,
    #[serde(rename = "RST")]
    RrcStateTransfer,
    #[serde(rename = "GCI")]
    CuInternalHandover,
    /// Catch-all for messages no typed flow could claim.
    #[serde(rename = "UNK")]
    Unknown,
}

impl ProcedureType {
    pub const ALL: [Self; 7] = [
        Self::InitialAccess,
        Self::XnHandover,
        Self::N2Handover,
        Self::RrcReestablishment,
        Self::RrcStateTransfer,
        Self::CuInternalHandover,
        Self::Unknown,
    ];

    /// Short tag used in procedure ids, archive records and results.
    pub const fn code(self) -> &'static str {
        match self {
            Self::InitialAccess => "IA",
            Self::XnHandover => "XHO",
            Self::N2Handover => "N2H",
            Self::RrcReestablishment => "RRE",
            Self::RrcStateTransfer => "RST",
            Self::CuInternalHandover => "GCI",
            Self::Unknown => "UNK",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.code().eq_ignore_ascii_case(code.trim()))
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::InitialAccess => "Initial Access",
            Self::XnHandover => "Xn Handover",
            Self::N2Handover => "N2 Handover",
            Self::RrcReestablishment => "RRC Re-establishment",
            Self::RrcStateTransfer => "RRC State Transfer",
            Self::CuInternalHandover => "gNB-CU Internal Handover",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ProcedureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Why a procedure left the active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    /// End message seen and the required key mask is complete.
    Success,
    /// A failure key bit was observed.
    Failure,
    /// End message seen, mask still incomplete after the grace window.
    EndTimeout,
    /// Idle beyond the store's active TTL (reaper only).
    Expired,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Failure => write!(f, "FAILURE"),
            Self::EndTimeout => write!(f, "END_TIMEOUT"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Snapshot of one tracked procedure instance.
///
/// `last_phase_index`/`last_order_index` and `key_mask` only ever move
/// forward; `end_seen_at_ms` is written once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Procedure {
    pub procedure_id: String,
    pub ue_id: String,
    pub procedure_type: ProcedureType,
    pub last_phase_index: i32,
    pub last_order_index: i32,
    pub key_mask: u32,
    pub end_seen: bool,
    pub end_seen_at_ms: Option<i64>,
    pub last_message_type: String,
    pub activate_time_ms: i64,
    pub last_update_time_ms: i64,
    pub message_count: u64,
    /// Set only on the archived record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<CloseReason>,
}

impl Procedure {
    /// Fresh record as written by `ProcedureStore::create`.
    pub fn new(
        procedure_id: impl Into<String>,
        ue_id: impl Into<String>,
        procedure_type: ProcedureType,
        first_msg_type: impl Into<String>,
        now_ms: i64,
    ) -> Self {
        Self {
            procedure_id: procedure_id.into(),
            ue_id: ue_id.into(),
            procedure_type,
            last_phase_index: PHASE_UNSET,
            last_order_index: PHASE_UNSET,
            key_mask: 0,
            end_seen: false,
            end_seen_at_ms: None,
            last_message_type: first_msg_type.into(),
            activate_time_ms: now_ms,
            last_update_time_ms: now_ms,
            message_count: 1,
            end_time_ms: None,
            close_reason: None,
        }
    }

    pub const fn is_started(&self) -> bool {
        self.last_phase_index >= 0
    }

    pub const fn idle_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.last_update_time_ms)
    }

    /// Merge a persisted update into this record.
    ///
    /// Monotone regardless of the update's contents: the cursor never
    /// rewinds, mask bits are only added, the first end timestamp sticks.
    pub fn apply(&mut self, update: &ProcedureUpdate) {
        let (phase, order) = advance_cursor(
            (self.last_phase_index, self.last_order_index),
            (update.last_phase_index, update.last_order_index),
        );
        self.last_phase_index = phase;
        self.last_order_index = order;
        self.key_mask |= update.key_mask;
        if update.end_seen && !self.end_seen {
            self.end_seen = true;
            self.end_seen_at_ms = update.end_seen_at_ms.or(Some(update.updated_at_ms));
        }
        self.last_message_type.clone_from(&update.msg_type);
        self.last_update_time_ms = update.updated_at_ms;
        self.message_count = self.message_count.max(update.message_count);
    }

    /// Seal the record for archival.
    pub fn close(&mut self, reason: CloseReason, end_time_ms: i64) {
        self.end_time_ms = Some(end_time_ms);
        self.close_reason = Some(reason);
    }
}

/// Monotone cursor advance.
///
/// Negative targets are ignored. A later phase moves both indices; the same
/// phase only moves the order index forward.
pub const fn advance_cursor(current: (i32, i32), target: (i32, i32)) -> (i32, i32) {
    let (last_phase, last_order) = current;
    let (phase, order) = target;
    if phase < 0 || order < 0 {
        return current;
    }
    if last_phase < 0 || phase > last_phase {
        return (phase, order);
    }
    if phase == last_phase && order > last_order {
        return (last_phase, order);
    }
    current
}

/// Field set written by `ProcedureStore::update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureUpdate {
    pub msg_type: String,
    pub last_phase_index: i32,
    pub last_order_index: i32,
    pub end_seen: bool,
    pub end_seen_at_ms: Option<i64>,
    pub key_mask: u32,
    pub updated_at_ms: i64,
    pub message_count: u64,
}

impl ProcedureUpdate {
    /// Update carrying the progress state of `next`.
    pub fn from_snapshot(next: &Procedure, msg_type: &str, updated_at_ms: i64) -> Self {
        Self {
            msg_type: msg_type.to_string(),
            last_phase_index: next.last_phase_index,
            last_order_index: next.last_order_index,
            end_seen: next.end_seen,
            end_seen_at_ms: next.end_seen_at_ms,
            key_mask: next.key_mask,
            updated_at_ms,
            message_count: next.message_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(phase: i32, order: i32, mask: u32, end: bool, at: i64, count: u64) -> ProcedureUpdate {
        ProcedureUpdate {
            msg_type: "X".to_string(),
            last_phase_index: phase,
            last_order_index: order,
            end_seen: end,
            end_seen_at_ms: end.then_some(at),
            key_mask: mask,
            updated_at_ms: at,
            message_count: count,
        }
    }

    #[test]
    fn test_codes_round_trip() {
        for t in ProcedureType::ALL {
            assert_eq!(ProcedureType::from_code(t.code()), Some(t));
        }
        assert_eq!(ProcedureType::from_code(" xho "), Some(ProcedureType::XnHandover));
        assert_eq!(ProcedureType::from_code("SR"), None);
    }

    #[test]
    fn test_type_serializes_as_code() {
        let json = serde_json::to_string(&ProcedureType::N2Handover).unwrap();
        assert_eq!(json, "\"N2H\"");
    }

    #[test]
    fn test_advance_cursor_rules() {
        assert_eq!(advance_cursor((-1, -1), (2, 3)), (2, 3));
        assert_eq!(advance_cursor((2, 3), (4, 0)), (4, 0));
        assert_eq!(advance_cursor((2, 3), (2, 5)), (2, 5));
        assert_eq!(advance_cursor((2, 3), (2, 1)), (2, 3));
        assert_eq!(advance_cursor((2, 3), (1, 9)), (2, 3));
        assert_eq!(advance_cursor((2, 3), (-1, -1)), (2, 3));
    }

    #[test]
    fn test_apply_is_monotone() {
        let mut p = Procedure::new("p1", "U1", ProcedureType::InitialAccess, "A", 0);
        p.apply(&update(3, 1, 0b0101, true, 100, 2));
        p.apply(&update(1, 0, 0b0010, true, 200, 3));

        assert_eq!((p.last_phase_index, p.last_order_index), (3, 1));
        assert_eq!(p.key_mask, 0b0111);
        assert_eq!(p.end_seen_at_ms, Some(100));
        assert_eq!(p.message_count, 3);
        assert_eq!(p.last_update_time_ms, 200);
    }
}
