//! Per-type procedure state machines
//!
//! Each procedure type is a [`FlowHandler`] built from a static
//! [`PhaseModel`] and [`KeyBitRegistry`], scored with a [`ScoringProfile`]
//! and closed through one shared [`CloseDecider`].
//!
//! ## Flows (registry priority)
//!
//! 1. **IA** - Initial access / registration
//! 2. **RRE** - RRC re-establishment
//! 3. **RST** - RRC release / resume
//! 4. **N2H** - N2 (NGAP) handover
//! 5. **XHO** - Xn handover (strict scoring)
//! 6. **GCI** - gNB-CU internal handover (strict scoring)

pub mod close;
pub mod handler;
pub mod key_bits;
pub mod phases;
pub mod registry;
pub mod scoring;
pub mod transition;

pub mod cu_internal_handover;
pub mod initial_access;
pub mod n2_handover;
pub mod rrc_reestablishment;
pub mod rrc_state_transfer;
pub mod xn_handover;

pub use close::{CloseDecider, ClosePolicy};
pub use cu_internal_handover::CuInternalHandoverFlow;
pub use handler::{Candidate, FlowHandler, FlowTuning, Resolution};
pub use initial_access::InitialAccessFlow;
pub use key_bits::{FuzzyBit, KeyBit, KeyBitRegistry};
pub use n2_handover::N2HandoverFlow;
pub use phases::{normalize_msg_type, PhaseDef, PhaseEntry, PhaseModel, StartType};
pub use registry::{default_flows, FlowRegistry};
pub use rrc_reestablishment::RrcReestablishmentFlow;
pub use rrc_state_transfer::RrcStateTransferFlow;
pub use scoring::{score_candidate, score_untyped, Affinity, ScoringContext, ScoringProfile};
pub use transition::{StoreCommand, Transition};
pub use xn_handover::XnHandoverFlow;
