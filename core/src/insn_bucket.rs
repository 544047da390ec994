//! Instruction buckets
//!
//! A bucket is a named category of instruction mnemonics that is counted on its own, next to the
//! total number of executed instructions. Buckets are mutually exclusive: a mnemonic belongs to
//! zero or one bucket.
//!
//! Classification is a substring search over an ordered rule list, and the first matching rule
//! wins:
//!
//! | Order | Pattern     | Bucket     | Typical mnemonics                 |
//! |-------|-------------|------------|-----------------------------------|
//! | 1     | `czero.eqz` | `CzeroEqz` | RISC-V Zicond `czero.eqz rd,rs1`  |
//! | 2     | `czero.nez` | `CzeroNez` | RISC-V Zicond `czero.nez rd,rs1`  |
//! | 3     | `cmov`      | `Cmov`     | x86 `cmovne`, `cmovz`, `cmovl`... |
//!
//! Matching is case sensitive, in the same way disassemblers print lower case mnemonics.

use std::fmt;

/// Number of instruction buckets
pub const BUCKET_COUNT: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum InsnBucket {
    /// Zicond conditional zero, when the condition register is equal to zero
    CzeroEqz = 0,
    /// Zicond conditional zero, when the condition register is not equal to zero
    CzeroNez = 1,
    /// x86 conditional move family
    Cmov = 2,
}

/// Classification rules, checked in this order
pub const CLASSIFY_RULES: [(&str, InsnBucket); BUCKET_COUNT] = [
    ("czero.eqz", InsnBucket::CzeroEqz),
    ("czero.nez", InsnBucket::CzeroNez),
    ("cmov", InsnBucket::Cmov),
];

impl InsnBucket {
    /// All buckets, in report order
    pub const ALL: [InsnBucket; BUCKET_COUNT] =
        [InsnBucket::CzeroEqz, InsnBucket::CzeroNez, InsnBucket::Cmov];

    /// Position of the bucket inside per-bucket arrays
    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Name used in reports
    pub const fn name(self) -> &'static str {
        match self {
            InsnBucket::CzeroEqz => "czero.eqz",
            InsnBucket::CzeroNez => "czero.nez",
            InsnBucket::Cmov => "cmov",
        }
    }
}

impl fmt::Display for InsnBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the bucket of a disassembled instruction, if any
pub fn classify(mnemonic: &str) -> Option<InsnBucket> {
    CLASSIFY_RULES
        .iter()
        .find(|(pattern, _)| mnemonic.contains(pattern))
        .map(|(_, bucket)| *bucket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_zicond_mnemonics() {
        assert_eq!(classify("czero.eqz a0,a1,a2"), Some(InsnBucket::CzeroEqz));
        assert_eq!(classify("czero.nez t0,t1,t2"), Some(InsnBucket::CzeroNez));
    }

    #[test]
    fn classifies_x86_conditional_moves() {
        assert_eq!(classify("cmovne %eax,%ebx"), Some(InsnBucket::Cmov));
        assert_eq!(classify("cmovz rax, rcx"), Some(InsnBucket::Cmov));
    }

    #[test]
    fn unmatched_mnemonics_have_no_bucket() {
        assert_eq!(classify("add a0,a0,a1"), None);
        assert_eq!(classify("czero a0,a1"), None);
        assert_eq!(classify(""), None);
        // Case sensitive
        assert_eq!(classify("CMOVNE %eax,%ebx"), None);
    }

    #[test]
    fn first_matching_rule_wins() {
        // Matches both the `czero.nez` and the `cmov` patterns
        assert_eq!(classify("cmov.czero.nez a0,a1"), Some(InsnBucket::CzeroNez));
        // Matches both `czero.eqz` and `czero.nez`
        assert_eq!(classify("czero.nez czero.eqz"), Some(InsnBucket::CzeroEqz));
    }

    #[test]
    fn bucket_indexes_follow_report_order() {
        for (i, bucket) in InsnBucket::ALL.iter().enumerate() {
            assert_eq!(bucket.index(), i);
            assert_eq!(CLASSIFY_RULES[i].1, *bucket);
        }
        assert_eq!(InsnBucket::Cmov.to_string(), "cmov");
    }
}
