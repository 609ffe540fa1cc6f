//! RRC state transfer (RST): release to inactive, then resume with an Xn
//! context fetch, or a reject.

use super::handler::{FlowHandler, FlowTuning};
use super::key_bits::{KeyBit, KeyBitRegistry};
use super::phases::{classify_start, PhaseDef, PhaseEntry, PhaseModel, StartType};
use super::scoring::Affinity;
use crate::config::defaults::RST_MERGE_THRESHOLD;
use crate::types::{ProcedureType, SignalingMessage};

pub mod bits {
    pub const RELEASE: u32 = 1 << 0;
    pub const RESUME_REQUEST: u32 = 1 << 1;
    pub const CTX_REQUEST: u32 = 1 << 2;
    pub const CTX_RESPONSE: u32 = 1 << 3;
    pub const RESUME_COMPLETE: u32 = 1 << 4;
    pub const REJECT: u32 = 1 << 5;

    pub const REQUIRED_WEAK: u32 = RESUME_REQUEST | CTX_RESPONSE | RESUME_COMPLETE;
    pub const REQUIRED_STRONG: u32 = REQUIRED_WEAK | RELEASE | CTX_REQUEST;
    pub const FAILURE_ANY: u32 = REJECT;
}

static PHASES: [PhaseDef; 6] = [
    PhaseDef {
        name: "uu-release",
        entries: &[PhaseEntry::anchor("RRCRELEASE", 0)],
    },
    PhaseDef {
        name: "uu-resume-request",
        entries: &[PhaseEntry::anchor("RRCRESUMEREQUEST", 0)],
    },
    PhaseDef {
        name: "xn-retrieve-context-request",
        entries: &[PhaseEntry::anchor("RETRIEVE UE CONTEXT REQUEST", 0)],
    },
    PhaseDef {
        name: "xn-retrieve-context-response",
        entries: &[PhaseEntry::anchor("RETRIEVE UE CONTEXT RESPONSE", 0)],
    },
    PhaseDef {
        name: "uu-resume-complete",
        entries: &[PhaseEntry::anchor("RRCRESUMECOMPLETE", 0)],
    },
    PhaseDef {
        name: "uu-reject",
        entries: &[PhaseEntry::anchor("RRCREJECT", 0)],
    },
];

static MODEL: PhaseModel = PhaseModel::new(&PHASES);

static KEY_BITS: KeyBitRegistry = KeyBitRegistry::new(
    &[
        KeyBit::new("RRCRELEASE", bits::RELEASE),
        KeyBit::new("RRCRESUMEREQUEST", bits::RESUME_REQUEST),
        KeyBit::new("RETRIEVE UE CONTEXT REQUEST", bits::CTX_REQUEST),
        KeyBit::new("RETRIEVE UE CONTEXT RESPONSE", bits::CTX_RESPONSE),
        KeyBit::new("RRCRESUMECOMPLETE", bits::RESUME_COMPLETE),
        KeyBit::new("RRCREJECT", bits::REJECT),
    ],
    &[],
    bits::REQUIRED_WEAK,
    bits::REQUIRED_STRONG,
    bits::FAILURE_ANY,
);

/// `RRCRelease` ends a plain release as well as opening a suspend/resume
/// cycle; it is both a pending start and an end message.
const END_MESSAGES: &[&str] = &["RRCRELEASE", "RRCRESUMECOMPLETE", "RRCREJECT"];

const AFFINITY: &[Affinity] = &[Affinity::new("Uu", "RRC", 5), Affinity::new("Xn", "XNAP", 3)];

pub struct RrcStateTransferFlow {
    tuning: FlowTuning,
}

impl RrcStateTransferFlow {
    pub const DEFAULT_TUNING: FlowTuning = FlowTuning::with_threshold(RST_MERGE_THRESHOLD);

    pub const fn new(tuning: FlowTuning) -> Self {
        Self { tuning }
    }
}

impl Default for RrcStateTransferFlow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TUNING)
    }
}

impl FlowHandler for RrcStateTransferFlow {
    fn procedure_type(&self) -> ProcedureType {
        ProcedureType::RrcStateTransfer
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
        classify_start(&msg.msg_type, &["RRCRESUMEREQUEST"], &["RRCRELEASE"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::close::CloseDecider;
    use crate::flow::phases::normalize_msg_type;
    use crate::types::{CloseReason, Procedure};

    #[test]
    fn test_tables_are_normalized() {
        for t in MODEL.msg_types().chain(END_MESSAGES.iter().copied()) {
            assert_eq!(normalize_msg_type(t), t);
        }
    }

    #[test]
    fn test_start_types() {
        let flow = RrcStateTransferFlow::default();
        let msg = |t: &str| SignalingMessage::new("U1", t, 0);
        assert_eq!(flow.check_start_type(&msg("RRCResumeRequest")), StartType::ConfirmedStart);
        assert_eq!(flow.check_start_type(&msg("RRCRelease")), StartType::PendingStart);
        assert_eq!(flow.check_start_type(&msg("RRCResumeComplete")), StartType::NotStart);
    }

    #[test]
    fn test_reject_closes_as_failure() {
        let flow = RrcStateTransferFlow::default();
        let decider = CloseDecider::default().with_policy(ProcedureType::RrcStateTransfer, flow.close_policy());
        let mut p = Procedure::new("p", "U1", ProcedureType::RrcStateTransfer, "X", 0);
        p.key_mask = bits::RESUME_REQUEST;
        p.last_phase_index = 1;
        p.last_order_index = 0;
        let msg = SignalingMessage::new("U1", "RRCReject", 50);
        let c = flow.evaluate(&p, &msg, 50);
        let t = flow.apply_update(&c, &msg, 50, &decider);
        assert_eq!(t.closed, Some(CloseReason::Failure));
    }
}
