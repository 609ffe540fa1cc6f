//! Async classification pipeline
//!
//! - [`MessageSource`]: where messages come from (vector replay, JSON lines)
//! - [`ClassifierPool`]: UE-partitioned workers around one engine
//! - [`ProcessingLoop`]: source → pool → [`PipelineStats`], with cancellation

pub mod pool;
pub mod processing_loop;
pub mod source;

pub use pool::{ClassifierPool, PoolHandle};
pub use processing_loop::{ClassifiedMessage, ProcessingLoop};
pub use source::{JsonLinesSource, MessageSource, SourceEvent, VecSource};

use serde::Serialize;

use crate::types::{MatchResult, MatchStatus, MessageCategory, ProcedureType};

/// Pipeline statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub messages: u64,
    pub matched_existing: u64,
    /// Typed procedures opened.
    pub created: u64,
    /// Catch-all (`UNK`) procedures opened.
    pub unknown_created: u64,
    pub not_matched: u64,
    pub errors: u64,
    /// Procedures closed by the message that matched them.
    pub closed: u64,
    pub procedure_driving: u64,
    pub procedure_aux: u64,
    pub non_procedure: u64,
}

impl PipelineStats {
    pub fn record(&mut self, category: MessageCategory, result: &MatchResult) {
        self.messages += 1;
        match category {
            MessageCategory::ProcedureDriving => self.procedure_driving += 1,
            MessageCategory::ProcedureAux => self.procedure_aux += 1,
            MessageCategory::NonProcedure => self.non_procedure += 1,
        }
        match result.status {
            MatchStatus::Error => self.errors += 1,
            MatchStatus::NotMatched => self.not_matched += 1,
            MatchStatus::Matched if !result.new_procedure => self.matched_existing += 1,
            MatchStatus::Matched if result.procedure_type == Some(ProcedureType::Unknown) => {
                self.unknown_created += 1;
            }
            MatchStatus::Matched => self.created += 1,
        }
        if result.closed.is_some() {
            self.closed += 1;
        }
    }
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} messages: {} merged, {} created, {} unclassified, {} closed, {} errors",
            self.messages,
            self.matched_existing,
            self.created,
            self.unknown_created,
            self.closed,
            self.errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CloseReason;

    #[test]
    fn test_record_buckets() {
        let mut s = PipelineStats::default();
        s.record(
            MessageCategory::ProcedureDriving,
            &MatchResult::matched_new("a", ProcedureType::InitialAccess),
        );
        s.record(
            MessageCategory::ProcedureDriving,
            &MatchResult::matched_existing("a", ProcedureType::InitialAccess, Some(CloseReason::Success)),
        );
        s.record(
            MessageCategory::NonProcedure,
            &MatchResult::matched_new("b", ProcedureType::Unknown),
        );
        s.record(MessageCategory::ProcedureAux, &MatchResult::error("boom"));
        assert_eq!(s.messages, 4);
        assert_eq!((s.created, s.matched_existing, s.unknown_created, s.errors), (1, 1, 1, 1));
        assert_eq!(s.closed, 1);
        assert_eq!((s.procedure_driving, s.procedure_aux, s.non_procedure), (2, 1, 1));
    }
}
