//! Static instruction of a translated code unit

use std::fmt;

use crate::{classify, InsnBucket};

/// Instruction as seen at translation time: its guest address and its disassembly
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StaticInsn {
    pub address: u64,
    pub mnemonic: String,
}

impl StaticInsn {
    pub fn new<S: Into<String>>(address: u64, mnemonic: S) -> Self {
        Self { address, mnemonic: mnemonic.into() }
    }

    /// Bucket this instruction is counted in, if any
    pub fn bucket(&self) -> Option<InsnBucket> {
        classify(&self.mnemonic)
    }
}

impl<S: Into<String>> From<(u64, S)> for StaticInsn {
    fn from((address, mnemonic): (u64, S)) -> Self {
        Self::new(address, mnemonic)
    }
}

/// Formats the instruction as a listing line, e.g. `0x1000: czero.eqz a0,a1`
impl fmt::Display for StaticInsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}: {}", self.address, self.mnemonic)
    }
}
