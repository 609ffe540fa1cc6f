//! RRC re-establishment (RRE), including the Xn context fetch from the
//! last serving gNB.

use super::handler::{FlowHandler, FlowTuning};
use super::key_bits::{KeyBit, KeyBitRegistry};
use super::phases::{classify_start, PhaseDef, PhaseEntry, PhaseModel, StartType};
use super::scoring::Affinity;
use crate::config::defaults::RRE_MERGE_THRESHOLD;
use crate::types::{ProcedureType, SignalingMessage};

pub mod bits {
    pub const REEST_REQUEST: u32 = 1 << 0;
    pub const CTX_REQUEST: u32 = 1 << 1;
    pub const CTX_RESPONSE: u32 = 1 << 2;
    pub const REESTABLISHMENT: u32 = 1 << 3;
    pub const REEST_COMPLETE: u32 = 1 << 4;
    pub const CTX_FAILURE: u32 = 1 << 5;

    pub const REQUIRED: u32 = REEST_REQUEST | CTX_RESPONSE | REEST_COMPLETE;
    pub const FAILURE_ANY: u32 = CTX_FAILURE;
}

const REEST_REQUESTS: &[&str] = &[
    "RRCREESTABLISHMENTREQUEST",
    "RRC REESTABLISHMENT REQUEST",
    "RRCREESTABLISHMENT REQUEST",
];

static PHASES: [PhaseDef; 5] = [
    PhaseDef {
        name: "uu-reestablishment-request",
        entries: &[
            PhaseEntry::anchor("RRCREESTABLISHMENTREQUEST", 0),
            PhaseEntry::anchor("RRC REESTABLISHMENT REQUEST", 0),
            PhaseEntry::anchor("RRCREESTABLISHMENT REQUEST", 0),
        ],
    },
    PhaseDef {
        name: "xn-retrieve-context-request",
        entries: &[PhaseEntry::anchor("RETRIEVE UE CONTEXT REQUEST", 0)],
    },
    PhaseDef {
        name: "xn-retrieve-context-result",
        entries: &[
            PhaseEntry::anchor("RETRIEVE UE CONTEXT RESPONSE", 0),
            PhaseEntry::anchor("RETRIEVE UE CONTEXT FAILURE", 0),
        ],
    },
    PhaseDef {
        name: "uu-reestablishment",
        entries: &[PhaseEntry::anchor("RRCREESTABLISHMENT", 0)],
    },
    PhaseDef {
        name: "uu-reestablishment-complete",
        entries: &[PhaseEntry::anchor("RRCREESTABLISHMENTCOMPLETE", 0)],
    },
];

static MODEL: PhaseModel = PhaseModel::new(&PHASES);

static KEY_BITS: KeyBitRegistry = KeyBitRegistry::new(
    &[
        KeyBit::new("RRCREESTABLISHMENTREQUEST", bits::REEST_REQUEST),
        KeyBit::new("RRC REESTABLISHMENT REQUEST", bits::REEST_REQUEST),
        KeyBit::new("RRCREESTABLISHMENT REQUEST", bits::REEST_REQUEST),
        KeyBit::new("RETRIEVE UE CONTEXT REQUEST", bits::CTX_REQUEST),
        KeyBit::new("RETRIEVE UE CONTEXT RESPONSE", bits::CTX_RESPONSE),
        KeyBit::new("RRCREESTABLISHMENT", bits::REESTABLISHMENT),
        KeyBit::new("RRCREESTABLISHMENTCOMPLETE", bits::REEST_COMPLETE),
        KeyBit::new("RETRIEVE UE CONTEXT FAILURE", bits::CTX_FAILURE),
    ],
    &[],
    bits::REQUIRED,
    bits::REQUIRED,
    bits::FAILURE_ANY,
);

const END_MESSAGES: &[&str] = &["RRCREESTABLISHMENTCOMPLETE", "RETRIEVE UE CONTEXT FAILURE"];

const AFFINITY: &[Affinity] = &[Affinity::new("Uu", "RRC", 5), Affinity::new("Xn", "XNAP", 3)];

pub struct RrcReestablishmentFlow {
    tuning: FlowTuning,
}

impl RrcReestablishmentFlow {
    pub const DEFAULT_TUNING: FlowTuning = FlowTuning::with_threshold(RRE_MERGE_THRESHOLD);

    pub const fn new(tuning: FlowTuning) -> Self {
        Self { tuning }
    }
}

impl Default for RrcReestablishmentFlow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TUNING)
    }
}

impl FlowHandler for RrcReestablishmentFlow {
    fn procedure_type(&self) -> ProcedureType {
        ProcedureType::RrcReestablishment
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

    fn check_start_type(&self, msg: &SignalingMessage) -> StartType {
        classify_start(&msg.msg_type, REEST_REQUESTS, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::phases::normalize_msg_type;
    use crate::types::Procedure;

    #[test]
    fn test_tables_are_normalized() {
        for t in MODEL.msg_types().chain(END_MESSAGES.iter().copied()) {
            assert_eq!(normalize_msg_type(t), t);
        }
    }

    #[test]
    fn test_request_variants_are_confirmed_starts() {
        let flow = RrcReestablishmentFlow::default();
        for t in ["RRCReestablishmentRequest", "RRC Reestablishment Request", "rrcreestablishment request"] {
            let msg = SignalingMessage::new("U1", t, 0);
            assert_eq!(flow.check_start_type(&msg), StartType::ConfirmedStart, "{t}");
        }
        let msg = SignalingMessage::new("U1", "RRCReestablishment", 0);
        assert_eq!(flow.check_start_type(&msg), StartType::NotStart);
    }

    #[test]
    fn test_context_fetch_scores_next_phase() {
        let flow = RrcReestablishmentFlow::default();
        let mut p = Procedure::new("p", "U1", ProcedureType::RrcReestablishment, "X", 0);
        p.key_mask = bits::REEST_REQUEST;
        p.last_phase_index = 0;
        p.last_order_index = 0;
        let msg = SignalingMessage::new("U1", "RETRIEVE UE CONTEXT REQUEST", 200).on("Xn", "XNAP");
        // 30 + 20 key + 5 start + 20 next + 10 recency + 3 affinity
        assert_eq!(flow.evaluate(&p, &msg, 200).score.value, 88);
    }

    #[test]
    fn test_context_failure_is_terminal() {
        let flow = RrcReestablishmentFlow::default();
        assert!(flow.is_end_message("Retrieve UE Context Failure"));
        assert!(KEY_BITS.is_failure_bit(bits::CTX_FAILURE));
        assert_eq!(flow.close_policy().required_success, bits::REQUIRED);
    }
}
