//! Procedure identifiers: `{ue}-{type}-{seq}-{rand6}`.

use rand::Rng;

use crate::types::ProcedureType;

/// Id for the `seq`-th procedure of `procedure_type` on `ue_id`.
///
/// The random suffix keeps ids unique when a sequence restarts (for example
/// an in-memory store after a restart writing into the same archive).
pub fn new_procedure_id(ue_id: &str, procedure_type: ProcedureType, seq: u64) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..0x100_0000);
    format!("{ue_id}-{}-{seq}-{suffix:06x}", procedure_type.code())
}
