//! N2 handover (N2H): AMF-relocated handover driven over NGAP.

use super::handler::{FlowHandler, FlowTuning};
use super::key_bits::{FuzzyBit, KeyBit, KeyBitRegistry};
use super::phases::{classify_start, PhaseDef, PhaseEntry, PhaseModel, StartType};
use super::scoring::{Affinity, ScoringProfile};
use crate::config::defaults::N2H_MERGE_THRESHOLD;
use crate::types::{ProcedureType, SignalingMessage};

pub mod bits {
    pub const N14_CONTEXT_REQ: u32 = 1 << 0;
    pub const HO_REQUEST: u32 = 1 << 1;
    pub const RRC_RECONFIG: u32 = 1 << 2;
    pub const HO_NOTIFY: u32 = 1 << 3;
    pub const HO_FAILURE: u32 = 1 << 4;

    pub const REQUIRED_WEAK: u32 = HO_REQUEST | RRC_RECONFIG | HO_NOTIFY;
    pub const REQUIRED_STRONG: u32 = REQUIRED_WEAK | N14_CONTEXT_REQ;
    pub const FAILURE_ANY: u32 = HO_FAILURE;
}

const CONTEXT_REQUESTS: &[&str] = &[
    "NAMF_COMMUNICATION_CREATE UECONTEXT REQUEST",
    "NAMF COMMUNICATION CREATE UECONTEXT REQUEST",
    "UECONTEXT REQUEST",
    "UE CONTEXT REQUEST",
];

static PHASES: [PhaseDef; 5] = [
    PhaseDef {
        name: "n14-context-transfer",
        entries: &[
            PhaseEntry::anchor("NAMF_COMMUNICATION_CREATE UECONTEXT REQUEST", 0),
            PhaseEntry::anchor("NAMF COMMUNICATION CREATE UECONTEXT REQUEST", 0),
            PhaseEntry::anchor("UECONTEXT REQUEST", 0),
            PhaseEntry::anchor("UE CONTEXT REQUEST", 0),
        ],
    },
    PhaseDef {
        name: "ngap-ho-request",
        entries: &[PhaseEntry::anchor("HANDOVER REQUEST", 0)],
    },
    PhaseDef {
        name: "uu-rrc-reconfiguration",
        entries: &[
            PhaseEntry::anchor("RRCRECONFIGURATION", 0),
            PhaseEntry::anchor("RRC RECONFIGURATION", 0),
        ],
    },
    PhaseDef {
        name: "ngap-ho-notify",
        entries: &[PhaseEntry::anchor("HANDOVER NOTIFY", 0)],
    },
    PhaseDef {
        name: "ngap-ho-failure",
        entries: &[PhaseEntry::anchor("HANDOVER FAILURE", 0)],
    },
];

static MODEL: PhaseModel = PhaseModel::new(&PHASES);

static KEY_BITS: KeyBitRegistry = KeyBitRegistry::new(
    &[
        KeyBit::new("NAMF_COMMUNICATION_CREATE UECONTEXT REQUEST", bits::N14_CONTEXT_REQ),
        KeyBit::new("NAMF COMMUNICATION CREATE UECONTEXT REQUEST", bits::N14_CONTEXT_REQ),
        KeyBit::new("UECONTEXT REQUEST", bits::N14_CONTEXT_REQ),
        KeyBit::new("UE CONTEXT REQUEST", bits::N14_CONTEXT_REQ),
        KeyBit::new("HANDOVER REQUEST", bits::HO_REQUEST),
        KeyBit::new("RRCRECONFIGURATION", bits::RRC_RECONFIG),
        KeyBit::new("RRC RECONFIGURATION", bits::RRC_RECONFIG),
        KeyBit::new("HANDOVER NOTIFY", bits::HO_NOTIFY),
        KeyBit::new("HANDOVER FAILURE", bits::HO_FAILURE),
    ],
    &[
        FuzzyBit {
            all_of: &["HANDOVER", "FAIL"],
            bit: bits::HO_FAILURE,
        },
        FuzzyBit {
            all_of: &["N2", "FAIL"],
            bit: bits::HO_FAILURE,
        },
    ],
    bits::REQUIRED_WEAK,
    bits::REQUIRED_STRONG,
    bits::FAILURE_ANY,
);

const END_MESSAGES: &[&str] = &["HANDOVER NOTIFY", "HANDOVER FAILURE"];

const AFFINITY: &[Affinity] = &[Affinity::new("N2", "NGAP", 5), Affinity::new("Uu", "RRC", 3)];

pub struct N2HandoverFlow {
    tuning: FlowTuning,
}

impl N2HandoverFlow {
    pub const DEFAULT_TUNING: FlowTuning = FlowTuning::with_threshold(N2H_MERGE_THRESHOLD);

    pub const fn new(tuning: FlowTuning) -> Self {
        Self { tuning }
    }
}

impl Default for N2HandoverFlow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TUNING)
    }
}

impl FlowHandler for N2HandoverFlow {
    fn procedure_type(&self) -> ProcedureType {
        ProcedureType::N2Handover
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

    /// The NGAP handover request is not an N2 anchor when captured on Xn.
    fn has_valid_payload_for_phase_start(&self, msg: &SignalingMessage, phase_index: i32) -> bool {
        phase_index != 1 || !msg.iface.eq_ignore_ascii_case("Xn")
    }

    fn check_start_type(&self, msg: &SignalingMessage) -> StartType {
        match classify_start(&msg.msg_type, &["HANDOVER REQUEST"], CONTEXT_REQUESTS) {
            StartType::ConfirmedStart if !self.has_valid_payload_for_phase_start(msg, 1) => {
                StartType::NotStart
            }
            other => other,
        }
    }
}
