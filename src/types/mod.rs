//! Shared data structures for signaling procedure classification
//!
//! - `SignalingMessage`: one decoded, UE-bound signaling event (input)
//! - `Procedure` / `ProcedureUpdate`: tracked flow instances and their writes
//! - `PhaseLocation`, `Score`: per-message lookups during scoring
//! - `MatchResult`: per-message classification output

mod classification;
mod message;
mod procedure;

pub use classification::*;
pub use message::*;
pub use procedure::*;
