//! Ordered handler registry.
//!
//! Position is dispatch priority: the first handler whose trigger fires
//! claims the message, even when it then declines to create a procedure.

use super::close::CloseDecider;
use super::handler::FlowHandler;
use super::{
    CuInternalHandoverFlow, InitialAccessFlow, N2HandoverFlow, RrcReestablishmentFlow,
    RrcStateTransferFlow, XnHandoverFlow,
};
use crate::config::FlowsConfig;
use crate::types::{MessageCategory, ProcedureType};

/// Default priority: IA, RRE, RST, N2H, XHO, GCI.
pub fn default_flows() -> Vec<Box<dyn FlowHandler>> {
    flows_from_config(&FlowsConfig::default())
}

/// Default order with each flow's tuning overridden from config.
pub fn flows_from_config(flows: &FlowsConfig) -> Vec<Box<dyn FlowHandler>> {
    vec![
        Box::new(InitialAccessFlow::new(
            flows.initial_access.resolve(InitialAccessFlow::DEFAULT_TUNING),
        )),
        Box::new(RrcReestablishmentFlow::new(
            flows
                .rrc_reestablishment
                .resolve(RrcReestablishmentFlow::DEFAULT_TUNING),
        )),
        Box::new(RrcStateTransferFlow::new(
            flows
                .rrc_state_transfer
                .resolve(RrcStateTransferFlow::DEFAULT_TUNING),
        )),
        Box::new(N2HandoverFlow::new(
            flows.n2_handover.resolve(N2HandoverFlow::DEFAULT_TUNING),
        )),
        Box::new(XnHandoverFlow::new(
            flows.xn_handover.resolve(XnHandoverFlow::DEFAULT_TUNING),
        )),
        Box::new(CuInternalHandoverFlow::new(
            flows
                .cu_internal_handover
                .resolve(CuInternalHandoverFlow::DEFAULT_TUNING),
        )),
    ]
}

pub struct FlowRegistry {
    handlers: Vec<Box<dyn FlowHandler>>,
}

impl FlowRegistry {
    /// Registry over `handlers` in the given priority order.
    pub fn new(handlers: Vec<Box<dyn FlowHandler>>) -> Self {
        Self { handlers }
    }

    pub fn from_config(flows: &FlowsConfig) -> Self {
        Self::new(flows_from_config(flows))
    }

    pub fn handlers(&self) -> impl Iterator<Item = &dyn FlowHandler> + '_ {
        self.handlers.iter().map(AsRef::as_ref)
    }

    /// First handler, in priority order, whose trigger fires.
    pub fn first_trigger(&self, msg: &crate::types::SignalingMessage) -> Option<&dyn FlowHandler> {
        self.handlers().find(|h| h.is_trigger(msg))
    }

    pub fn handler_for(&self, procedure_type: ProcedureType) -> Option<&dyn FlowHandler> {
        self.handlers()
            .find(|h| h.procedure_type() == procedure_type)
    }

    /// One close policy per registered type.
    pub fn close_decider(&self) -> CloseDecider {
        self.handlers().fold(CloseDecider::default(), |d, h| {
            d.with_policy(h.procedure_type(), h.close_policy())
        })
    }

    /// Relevance of a message type to the registered flows.
    pub fn categorize(&self, msg_type: &str) -> MessageCategory {
        if self
            .handlers()
            .any(|h| h.is_end_message(msg_type) || h.key_bits().is_key(msg_type))
        {
            MessageCategory::ProcedureDriving
        } else if self.handlers().any(|h| h.phase_model().contains(msg_type)) {
            MessageCategory::ProcedureAux
        } else {
            MessageCategory::NonProcedure
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for FlowRegistry {
    fn default() -> Self {
        Self::new(default_flows())
    }
}

impl std::fmt::Debug for FlowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers().map(|h| h.procedure_type()))
            .finish()
    }
}
