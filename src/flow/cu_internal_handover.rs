//! gNB-CU internal handover (GCI): a handover between DUs of one CU, seen
//! only as the Uu command and its completion or a re-establishment.

use super::handler::{FlowHandler, FlowTuning};
use super::key_bits::{KeyBit, KeyBitRegistry};
use super::phases::{classify_start, PhaseDef, PhaseEntry, PhaseModel, StartType};
use super::scoring::{Affinity, ScoringProfile};
use crate::config::defaults::GCI_MERGE_THRESHOLD;
use crate::types::{ProcedureType, SignalingMessage};

pub mod bits {
    pub const HO_COMMAND: u32 = 1 << 0;
    pub const RECFG_COMPLETE: u32 = 1 << 1;
    pub const REEST_REQUEST: u32 = 1 << 2;

    pub const REQUIRED: u32 = HO_COMMAND | RECFG_COMPLETE;
    pub const FAILURE_ANY: u32 = REEST_REQUEST;
}

/// Combined label some decoders emit for the CU-internal reconfiguration
/// carrying a handover command.
const HO_COMMAND_RECONFIG: &str = "HANDOVERCOMMAND/RRCRECONFIGURATION";

static PHASES: [PhaseDef; 3] = [
    PhaseDef {
        name: "uu-ho-command",
        entries: &[PhaseEntry::anchor(HO_COMMAND_RECONFIG, 0)],
    },
    PhaseDef {
        name: "uu-reconfiguration-complete",
        entries: &[PhaseEntry::anchor("RRCRECONFIGURATIONCOMPLETE", 0)],
    },
    PhaseDef {
        name: "uu-reestablishment-request",
        entries: &[PhaseEntry::anchor("RRCREESTABLISHMENTREQUEST", 0)],
    },
];

static MODEL: PhaseModel = PhaseModel::new(&PHASES);

static KEY_BITS: KeyBitRegistry = KeyBitRegistry::new(
    &[
        KeyBit::new(HO_COMMAND_RECONFIG, bits::HO_COMMAND),
        KeyBit::new("RRCRECONFIGURATIONCOMPLETE", bits::RECFG_COMPLETE),
        KeyBit::new("RRCREESTABLISHMENTREQUEST", bits::REEST_REQUEST),
    ],
    &[],
    bits::REQUIRED,
    bits::REQUIRED,
    bits::FAILURE_ANY,
);

const END_MESSAGES: &[&str] = &["RRCRECONFIGURATIONCOMPLETE", "RRCREESTABLISHMENTREQUEST"];

const AFFINITY: &[Affinity] = &[Affinity::new("Uu", "RRC", 5), Affinity::new("F1", "F1AP", 3)];

pub struct CuInternalHandoverFlow {
    tuning: FlowTuning,
}

impl CuInternalHandoverFlow {
    pub const DEFAULT_TUNING: FlowTuning = FlowTuning::with_threshold(GCI_MERGE_THRESHOLD);

    pub const fn new(tuning: FlowTuning) -> Self {
        Self { tuning }
    }
}

impl Default for CuInternalHandoverFlow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TUNING)
    }
}

impl FlowHandler for CuInternalHandoverFlow {
    fn procedure_type(&self) -> ProcedureType {
        ProcedureType::CuInternalHandover
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

    fn check_start_type(&self, msg: &SignalingMessage) -> StartType {
        classify_start(&msg.msg_type, &[HO_COMMAND_RECONFIG], &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::phases::normalize_msg_type;

    #[test]
    fn test_tables_are_normalized() {
        for t in MODEL.msg_types().chain(END_MESSAGES.iter().copied()) {
            assert_eq!(normalize_msg_type(t), t);
        }
    }

    #[test]
    fn test_combined_label_starts() {
        let flow = CuInternalHandoverFlow::default();
        let msg = SignalingMessage::new("U1", "HandoverCommand/RRCReconfiguration", 0);
        assert_eq!(flow.check_start_type(&msg), StartType::ConfirmedStart);
        assert_eq!(
            flow.check_start_type(&SignalingMessage::new("U1", "RRCReconfiguration", 0)),
            StartType::NotStart
        );
    }

    #[test]
    fn test_masks() {
        let flow = CuInternalHandoverFlow::default();
        let policy = flow.close_policy();
        assert_eq!(policy.required_success, bits::HO_COMMAND | bits::RECFG_COMPLETE);
        assert_eq!(policy.failure_any, bits::REEST_REQUEST);
    }
}
