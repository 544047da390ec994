//! Contains the static instruction model shared by the profiler crates: translated instructions,
//! mnemonic buckets and their classification rules
//!
//! ```text
//! translated code unit --> (address, mnemonic)* --> classify() --> Option<InsnBucket>
//! ```
mod insn_bucket;
mod static_insn;
pub mod tb_definitions;

pub use insn_bucket::*;
pub use static_insn::*;
pub use tb_definitions::*;
