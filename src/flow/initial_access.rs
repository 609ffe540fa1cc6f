//! Initial Access (IA): RRC setup, registration, 5G-AKA, NAS/RRC security
//! and initial context setup.

use super::handler::{Candidate, FlowHandler, FlowTuning};
use super::key_bits::{KeyBit, KeyBitRegistry};
use super::phases::{classify_start, normalize_msg_type, PhaseDef, PhaseEntry, PhaseModel, StartType};
use super::scoring::Affinity;
use crate::config::defaults::IA_MERGE_THRESHOLD;
use crate::types::{ProcedureType, SignalingMessage};

pub mod bits {
    pub const RRC_SETUP_COMPLETE: u32 = 1 << 0;
    pub const INITIAL_UE_MESSAGE: u32 = 1 << 1;
    pub const NAUSF_AUTH_RESP: u32 = 1 << 2;
    pub const NAS_SMC: u32 = 1 << 3;
    pub const ICS_REQ: u32 = 1 << 4;
    pub const RRC_SMC: u32 = 1 << 5;

    pub const REQUIRED_STRONG: u32 =
        RRC_SETUP_COMPLETE | INITIAL_UE_MESSAGE | NAUSF_AUTH_RESP | NAS_SMC | ICS_REQ | RRC_SMC;
    /// Lossy-capture tolerant success mask: Kseaf derived, NAS secured, context set up.
    pub const REQUIRED_WEAK: u32 = NAUSF_AUTH_RESP | NAS_SMC | ICS_REQ;
}

const RRC_SETUP_COMPLETE: &str = "RRCSETUPCOMPLETE";

static PHASES: [PhaseDef; 7] = [
    PhaseDef {
        name: "rrc-setup",
        entries: &[PhaseEntry::anchor(RRC_SETUP_COMPLETE, 0)],
    },
    PhaseDef {
        name: "registration-auth",
        entries: &[
            PhaseEntry::anchor("INITIAL UE MESSAGE", 0),
            PhaseEntry::step("NAUSF_UEAUTHENTICATION_AUTHENTICATE REQUEST", 1),
            PhaseEntry::step("NUDM_UEAUTHENTICATION_GET REQUEST", 2),
            PhaseEntry::step("NUDM_UEAUTHENTICATION_GET RESPONSE", 3),
            PhaseEntry::step("NAUSF_UEAUTHENTICATION RESPONSE", 4),
            PhaseEntry::step("AUTHENTICATION REQUEST", 5),
            PhaseEntry::step("AUTHENTICATION RESPONSE", 6),
            PhaseEntry::step("AUTHENTICATION FAILURE", 7),
            PhaseEntry::step("AUTHENTICATION REJECT", 8),
        ],
    },
    PhaseDef {
        name: "kseaf",
        entries: &[PhaseEntry::anchor("NAUSF_UEAUTHENTICATION_AUTHENTICATE RESPONSE", 0)],
    },
    PhaseDef {
        name: "nas-security",
        entries: &[
            PhaseEntry::anchor("NAS SECURITYMODECOMMAND", 0),
            PhaseEntry::step("NAS SECURITYMODECOMPLETE", 1),
            PhaseEntry::step("NAS SECURITYMODEREJECT", 2),
            PhaseEntry::step("NUDM_UEAUTENTICATION_RESULTCONFIRMATION REQUEST", 3),
            PhaseEntry::step("NUDM_UEAUTENTICATION_RESULTCONFIRMATION RESPONSE", 4),
            PhaseEntry::step("IDENTITY REQUEST", 5),
            PhaseEntry::step("IDENTITY RESPONSE", 6),
        ],
    },
    PhaseDef {
        name: "context-setup",
        entries: &[PhaseEntry::anchor("INITIAL CONTEXT SETUP REQUEST", 0)],
    },
    PhaseDef {
        name: "rrc-security",
        entries: &[
            PhaseEntry::anchor("RRC SECURITYMODECOMMAND", 0),
            PhaseEntry::step("RRC SECURITYMODECOMPLETE", 1),
            PhaseEntry::step("RRC SECURITYMODEFAILURE", 2),
        ],
    },
    PhaseDef {
        name: "rrc-reconfiguration",
        entries: &[PhaseEntry::anchor("RRCRECONFIGURATION", 0)],
    },
];

static MODEL: PhaseModel = PhaseModel::new(&PHASES);

static KEY_BITS: KeyBitRegistry = KeyBitRegistry::new(
    &[
        KeyBit::new(RRC_SETUP_COMPLETE, bits::RRC_SETUP_COMPLETE),
        KeyBit::new("INITIAL UE MESSAGE", bits::INITIAL_UE_MESSAGE),
        KeyBit::new("NAUSF_UEAUTHENTICATION_AUTHENTICATE RESPONSE", bits::NAUSF_AUTH_RESP),
        KeyBit::new("NAS SECURITYMODECOMMAND", bits::NAS_SMC),
        KeyBit::new("INITIAL CONTEXT SETUP REQUEST", bits::ICS_REQ),
        KeyBit::new("RRC SECURITYMODECOMMAND", bits::RRC_SMC),
    ],
    &[],
    bits::REQUIRED_WEAK,
    bits::REQUIRED_STRONG,
    0,
);

const END_MESSAGES: &[&str] = &[
    "INITIAL CONTEXT SETUP RESPONSE",
    "INITIAL CONTEXT SETUP FAILURE",
    "RRCRECONFIGURATIONCOMPLETE",
    "REGISTRATION COMPLETE",
    "REGISTRATION REJECT",
];

const PENDING_STARTS: &[&str] = &["RRCSETUPREQUEST", "RRCSETUP"];

const AFFINITY: &[Affinity] = &[Affinity::new("Uu", "RRC", 5), Affinity::new("N2", "NGAP", 3)];

pub struct InitialAccessFlow {
    tuning: FlowTuning,
}

impl InitialAccessFlow {
    pub const DEFAULT_TUNING: FlowTuning = FlowTuning::with_threshold(IA_MERGE_THRESHOLD);

    pub const fn new(tuning: FlowTuning) -> Self {
        Self { tuning }
    }
}

impl Default for InitialAccessFlow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TUNING)
    }
}

impl FlowHandler for InitialAccessFlow {
    fn procedure_type(&self) -> ProcedureType {
        ProcedureType::InitialAccess
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

    fn affinity(&self) -> &[Affinity] {
        AFFINITY
    }

    /// `RRCSetupComplete` only anchors IA when it carries the NAS
    /// registration; a decoder-reported empty NAS list disqualifies it.
    fn has_valid_payload_for_phase_start(&self, msg: &SignalingMessage, phase_index: i32) -> bool {
        phase_index != 0 || msg.payload.nas_pdu_count != Some(0)
    }

    fn check_start_type(&self, msg: &SignalingMessage) -> StartType {
        if normalize_msg_type(&msg.msg_type) == RRC_SETUP_COMPLETE {
            return if self.has_valid_payload_for_phase_start(msg, 0) {
                StartType::ConfirmedStart
            } else {
                StartType::NotStart
            };
        }
        classify_start(&msg.msg_type, &[], PENDING_STARTS)
    }

    /// Confirmed anchor, or a repeat of a key message the best candidate
    /// has already recorded (treated as a fresh attempt).
    fn should_create(&self, best: Option<&Candidate>, msg: &SignalingMessage) -> bool {
        if self.check_start_type(msg) == StartType::ConfirmedStart {
            return true;
        }
        best.is_some_and(|b| {
            let bit = b.resolution.key_bit;
            bit != 0 && b.procedure.key_mask & bit != 0
        })
    }
}
