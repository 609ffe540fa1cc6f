//! Xn handover (XHO): Xn preparation, the two Uu handover commands, N2 path
//! switch and the RRC completion on the target cell.
//!
//! `HANDOVER COMMAND` legitimately appears twice per procedure. The first
//! occurrence is command-1 (phase 2); once that bit is recorded the same
//! literal resolves to command-2 (phase 5).

use super::handler::{FlowHandler, FlowTuning, Resolution};
use super::key_bits::{FuzzyBit, KeyBit, KeyBitRegistry};
use super::phases::{classify_start, matches_any, PhaseDef, PhaseEntry, PhaseModel, StartType};
use super::scoring::{Affinity, ScoringProfile};
use crate::config::defaults::XHO_MERGE_THRESHOLD;
use crate::types::{ProcedureType, SignalingMessage};

pub mod bits {
    pub const HO_REQUEST: u32 = 1 << 0;
    pub const HO_CMD_1: u32 = 1 << 1;
    pub const PATH_SWITCH_REQ: u32 = 1 << 2;
    pub const PATH_SWITCH_ACK: u32 = 1 << 3;
    pub const HO_CMD_2: u32 = 1 << 4;
    pub const RRC_RECFG_COMPLETE: u32 = 1 << 5;
    pub const PREP_FAILURE: u32 = 1 << 6;
    pub const HO_CANCEL: u32 = 1 << 7;
    pub const REEST_REQ: u32 = 1 << 8;
    pub const N2_HO_FAILURE: u32 = 1 << 9;

    pub const REQUIRED_WEAK: u32 = HO_CMD_1 | PATH_SWITCH_ACK | RRC_RECFG_COMPLETE;
    pub const REQUIRED_STRONG: u32 = REQUIRED_WEAK | HO_REQUEST | PATH_SWITCH_REQ | HO_CMD_2;
    pub const FAILURE_ANY: u32 = PREP_FAILURE | HO_CANCEL | REEST_REQ | N2_HO_FAILURE;
}

pub const PH_HO_COMMAND_1: usize = 2;
pub const PH_HO_COMMAND_2: usize = 5;

const HO_COMMANDS: &[&str] = &["HANDOVER COMMAND", "HANDOVERCOMMAND"];

static PHASES: [PhaseDef; 9] = [
    PhaseDef {
        name: "xn-ho-request",
        entries: &[PhaseEntry::anchor("HANDOVER REQUEST", 0)],
    },
    PhaseDef {
        name: "xn-fail-or-cancel",
        entries: &[
            PhaseEntry::anchor("HANDOVER PREPARATION FAILURE", 0),
            PhaseEntry::anchor("HANDOVER CANCEL", 0),
        ],
    },
    PhaseDef {
        name: "uu-ho-command-1",
        entries: &[
            PhaseEntry::anchor("HANDOVER COMMAND", 0),
            PhaseEntry::anchor("HANDOVERCOMMAND", 0),
        ],
    },
    PhaseDef {
        name: "n2-path-switch-request",
        entries: &[PhaseEntry::anchor("N2 PATH SWITCH REQUEST", 0)],
    },
    PhaseDef {
        name: "n2-path-switch-ack",
        entries: &[
            PhaseEntry::anchor("N2 PATH SWITCH REQUEST ACK", 0),
            PhaseEntry::anchor("N2 PATH SWITCH REQUEST ACKNOWLEDGE", 0),
        ],
    },
    PhaseDef {
        name: "uu-ho-command-2",
        entries: &[
            PhaseEntry::anchor("HANDOVER COMMAND", 0),
            PhaseEntry::anchor("HANDOVERCOMMAND", 0),
        ],
    },
    PhaseDef {
        name: "uu-rrc-reconfiguration-complete",
        entries: &[
            PhaseEntry::anchor("RRCRECONFIGURATIONCOMPLETE", 0),
            PhaseEntry::anchor("RRC RECONFIGURATION COMPLETE", 0),
            PhaseEntry::anchor("RRCRECONFIGURATION COMPLETE", 0),
        ],
    },
    PhaseDef {
        name: "uu-rrc-reestablishment-request",
        entries: &[
            PhaseEntry::anchor("RRCREESTABLISHMENTREQUEST", 0),
            PhaseEntry::anchor("RRC REESTABLISHMENT REQUEST", 0),
            PhaseEntry::anchor("RRCREESTABLISHMENT REQUEST", 0),
        ],
    },
    PhaseDef {
        name: "n2-ho-failure",
        entries: &[
            PhaseEntry::anchor("N2 PATH SWITCH REQUEST FAILURE", 0),
            PhaseEntry::anchor("PATH SWITCH REQUEST FAILURE", 0),
        ],
    },
];

static MODEL: PhaseModel = PhaseModel::new(&PHASES);

static KEY_BITS: KeyBitRegistry = KeyBitRegistry::new(
    &[
        KeyBit::new("HANDOVER REQUEST", bits::HO_REQUEST),
        KeyBit::new("HANDOVER COMMAND", bits::HO_CMD_1),
        KeyBit::new("HANDOVERCOMMAND", bits::HO_CMD_1),
        KeyBit::new("N2 PATH SWITCH REQUEST", bits::PATH_SWITCH_REQ),
        KeyBit::new("N2 PATH SWITCH REQUEST ACK", bits::PATH_SWITCH_ACK),
        KeyBit::new("N2 PATH SWITCH REQUEST ACKNOWLEDGE", bits::PATH_SWITCH_ACK),
        KeyBit::new("RRCRECONFIGURATIONCOMPLETE", bits::RRC_RECFG_COMPLETE),
        KeyBit::new("RRC RECONFIGURATION COMPLETE", bits::RRC_RECFG_COMPLETE),
        KeyBit::new("RRCRECONFIGURATION COMPLETE", bits::RRC_RECFG_COMPLETE),
        KeyBit::new("HANDOVER PREPARATION FAILURE", bits::PREP_FAILURE),
        KeyBit::new("HANDOVER CANCEL", bits::HO_CANCEL),
        KeyBit::new("RRCREESTABLISHMENTREQUEST", bits::REEST_REQ),
        KeyBit::new("RRC REESTABLISHMENT REQUEST", bits::REEST_REQ),
        KeyBit::new("RRCREESTABLISHMENT REQUEST", bits::REEST_REQ),
        KeyBit::new("N2 PATH SWITCH REQUEST FAILURE", bits::N2_HO_FAILURE),
        KeyBit::new("PATH SWITCH REQUEST FAILURE", bits::N2_HO_FAILURE),
    ],
    &[FuzzyBit {
        all_of: &["N2", "FAIL"],
        bit: bits::N2_HO_FAILURE,
    }],
    bits::REQUIRED_WEAK,
    bits::REQUIRED_STRONG,
    bits::FAILURE_ANY,
);

const END_MESSAGES: &[&str] = &[
    "HANDOVER PREPARATION FAILURE",
    "HANDOVER CANCEL",
    "RRCREESTABLISHMENTREQUEST",
    "RRC REESTABLISHMENT REQUEST",
    "RRCREESTABLISHMENT REQUEST",
    "N2 PATH SWITCH REQUEST FAILURE",
    "PATH SWITCH REQUEST FAILURE",
    "RRCRECONFIGURATIONCOMPLETE",
    "RRC RECONFIGURATION COMPLETE",
    "RRCRECONFIGURATION COMPLETE",
];

const AFFINITY: &[Affinity] = &[
    Affinity::new("Xn", "XNAP", 5),
    Affinity::new("Uu", "RRC", 3),
    Affinity::new("N2", "NGAP", 3),
];

pub struct XnHandoverFlow {
    tuning: FlowTuning,
}

impl XnHandoverFlow {
    pub const DEFAULT_TUNING: FlowTuning = FlowTuning::with_threshold(XHO_MERGE_THRESHOLD);

    pub const fn new(tuning: FlowTuning) -> Self {
        Self { tuning }
    }
}

impl Default for XnHandoverFlow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TUNING)
    }
}

impl FlowHandler for XnHandoverFlow {
    fn procedure_type(&self) -> ProcedureType {
        ProcedureType::XnHandover
    }

    fn phase_model(&self) -> &PhaseModel {
        &MODEL
    }

    fn key_bits(&self) -> &KeyBitRegistry {
        &KEY_BITS
    }

    fn end_messages(&self) -> &[&'static str] {
        END_MESSAGES
    }

    fn tuning(&self) -> &FlowTuning {
        &self.tuning
    }

    fn scoring_profile(&self) -> ScoringProfile {
        ScoringProfile::STRICT
    }

    fn affinity(&self) -> &[Affinity] {
        AFFINITY
    }

    /// An Xn handover never starts from an N2 (NGAP) handover request.
    fn has_valid_payload_for_phase_start(&self, msg: &SignalingMessage, phase_index: i32) -> bool {
        phase_index != 0 || !msg.iface.eq_ignore_ascii_case("N2")
    }

    fn check_start_type(&self, msg: &SignalingMessage) -> StartType {
        match classify_start(&msg.msg_type, HO_COMMANDS, &["HANDOVER REQUEST"]) {
            StartType::PendingStart if !self.has_valid_payload_for_phase_start(msg, 0) => {
                StartType::NotStart
            }
            other => other,
        }
    }

    fn resolve(&self, msg_type: &str, key_mask: u32) -> Resolution {
        if matches_any(HO_COMMANDS, msg_type) {
            let (phase, bit) = if key_mask & bits::HO_CMD_1 == 0 {
                (PH_HO_COMMAND_1, bits::HO_CMD_1)
            } else {
                (PH_HO_COMMAND_2, bits::HO_CMD_2)
            };
            return Resolution {
                location: MODEL.entry_at(phase, msg_type),
                key_bit: bit,
                is_end: false,
            };
        }
        Resolution {
            location: MODEL.locate(msg_type),
            key_bit: KEY_BITS.bit_for_msg_type(msg_type),
            is_end: self.is_end_message(msg_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::phases::normalize_msg_type;
    use crate::types::Procedure;

    fn xho(mask: u32, phase: i32) -> Procedure {
        let mut p = Procedure::new("p", "U1", ProcedureType::XnHandover, "X", 0);
        p.key_mask = mask;
        p.last_phase_index = phase;
        p.last_order_index = 0;
        p
    }

    #[test]
    fn test_tables_are_normalized() {
        for t in MODEL.msg_types().chain(END_MESSAGES.iter().copied()) {
            assert_eq!(normalize_msg_type(t), t);
        }
    }

    #[test]
    fn test_command_resolves_by_mask() {
        let flow = XnHandoverFlow::default();
        let first = flow.resolve("HandoverCommand", 0);
        assert_eq!(first.key_bit, bits::HO_CMD_1);
        assert_eq!(first.location.map(|l| l.phase_index), Some(2));

        let second = flow.resolve("HANDOVER COMMAND", bits::HO_CMD_1);
        assert_eq!(second.key_bit, bits::HO_CMD_2);
        assert_eq!(second.location.map(|l| l.phase_index), Some(5));
    }

    #[test]
    fn test_second_command_scores_forward_not_regression() {
        let flow = XnHandoverFlow::default();
        let p = xho(bits::HO_CMD_1 | bits::PATH_SWITCH_ACK, 4);
        let msg = SignalingMessage::new("U1", "HANDOVER COMMAND", 500);
        let c = flow.evaluate(&p, &msg, 500);
        // 30 + 20 key + 8 start + 25 next phase + 10 recency
        assert_eq!(c.score.value, 93);
        assert_eq!(c.score.phase_index, 5);
        assert_eq!(c.resolution.key_bit, bits::HO_CMD_2);
    }

    #[test]
    fn test_failure_variants_map_to_failure_bits() {
        assert_eq!(KEY_BITS.bit_for_msg_type("N2 Handover Failure"), bits::N2_HO_FAILURE);
        assert_eq!(KEY_BITS.bit_for_msg_type("HANDOVER CANCEL"), bits::HO_CANCEL);
        assert!(KEY_BITS.is_failure_bit(bits::REEST_REQ));
    }

    #[test]
    fn test_start_types_respect_interface() {
        let flow = XnHandoverFlow::default();
        let req = SignalingMessage::new("U1", "HANDOVER REQUEST", 0);
        assert_eq!(flow.check_start_type(&req.clone().on("Xn", "XNAP")), StartType::PendingStart);
        assert_eq!(flow.check_start_type(&req.on("N2", "NGAP")), StartType::NotStart);
        let cmd = SignalingMessage::new("U1", "HandoverCommand", 0);
        assert_eq!(flow.check_start_type(&cmd), StartType::ConfirmedStart);
    }

    #[test]
    fn test_success_needs_completion_and_end() {
        let flow = XnHandoverFlow::default();
        let policy = flow.close_policy();
        let mut p = xho(bits::HO_CMD_1 | bits::PATH_SWITCH_ACK | bits::RRC_RECFG_COMPLETE, 6);
        assert_eq!(policy.evaluate(&p, 0), None);
        p.end_seen = true;
        p.end_seen_at_ms = Some(0);
        assert_eq!(policy.evaluate(&p, 0), Some(crate::types::CloseReason::Success));
    }
}
