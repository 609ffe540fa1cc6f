//! Key-bit registries: completion evidence per procedure type.

use super::phases::normalize_msg_type;

/// Exact message type → single completion bit.
#[derive(Debug, Clone, Copy)]
pub struct KeyBit {
    pub msg_type: &'static str,
    pub bit: u32,
}

impl KeyBit {
    pub const fn new(msg_type: &'static str, bit: u32) -> Self {
        Self { msg_type, bit }
    }
}

/// Token fallback for failure variants that have no fixed spelling.
///
/// Matches when the normalized message type contains every token.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyBit {
    pub all_of: &'static [&'static str],
    pub bit: u32,
}

/// Bit table plus the closure masks of one procedure type.
#[derive(Debug, Clone, Copy)]
pub struct KeyBitRegistry {
    bits: &'static [KeyBit],
    fuzzy: &'static [FuzzyBit],
    /// Minimum mask that, with an end message, authorizes success.
    pub required_success: u32,
    /// Stricter success mask for deployments that want full evidence.
    pub required_strong: u32,
    /// Any one of these bits closes the procedure as failed.
    pub failure_any: u32,
}

impl KeyBitRegistry {
    pub const fn new(
        bits: &'static [KeyBit],
        fuzzy: &'static [FuzzyBit],
        required_success: u32,
        required_strong: u32,
        failure_any: u32,
    ) -> Self {
        Self {
            bits,
            fuzzy,
            required_success,
            required_strong,
            failure_any,
        }
    }

    /// Pure literal mapping; 0 for non-key messages.
    pub fn bit_for_msg_type(&self, msg_type: &str) -> u32 {
        let key = normalize_msg_type(msg_type);
        if let Some(kb) = self.bits.iter().find(|kb| kb.msg_type == key.as_ref()) {
            return kb.bit;
        }
        self.fuzzy
            .iter()
            .find(|f| f.all_of.iter().all(|tok| key.contains(tok)))
            .map_or(0, |f| f.bit)
    }

    pub fn is_key(&self, msg_type: &str) -> bool {
        self.bit_for_msg_type(msg_type) != 0
    }

    pub fn is_failure_bit(&self, bit: u32) -> bool {
        bit & self.failure_any != 0
    }

    /// Union of every bit the registry can hand out.
    pub fn all_bits(&self) -> u32 {
        self.bits
            .iter()
            .map(|kb| kb.bit)
            .chain(self.fuzzy.iter().map(|f| f.bit))
            .fold(0, |acc, b| acc | b)
    }

    pub fn entries(&self) -> &'static [KeyBit] {
        self.bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REG: KeyBitRegistry = KeyBitRegistry::new(
        &[KeyBit::new("START", 1 << 0), KeyBit::new("DONE", 1 << 1)],
        &[FuzzyBit {
            all_of: &["N2", "FAIL"],
            bit: 1 << 2,
        }],
        0b011,
        0b011,
        0b100,
    );

    #[test]
    fn test_exact_then_fuzzy() {
        assert_eq!(REG.bit_for_msg_type("start"), 1);
        assert_eq!(REG.bit_for_msg_type("N2 PATH SWITCH FAILURE"), 4);
        assert_eq!(REG.bit_for_msg_type("PATH SWITCH FAILURE"), 0);
        assert_eq!(REG.bit_for_msg_type("OTHER"), 0);
    }

    #[test]
    fn test_all_bits_and_failure() {
        assert_eq!(REG.all_bits(), 0b111);
        assert!(REG.is_failure_bit(4));
        assert!(!REG.is_failure_bit(1));
    }
}
