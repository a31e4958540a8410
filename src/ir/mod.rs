//! The typed three-address intermediate representation.

pub mod block;
pub mod instr;
pub mod module;
pub mod operand;
pub mod optimize;
pub mod proc;
pub mod types;

pub use block::{BasicBlock, BlockId, FlowSets};
pub use instr::{InstrFlags, Instruction, Opcode, Operator};
pub use module::{Module, Variable};
pub use operand::{Operand, Temp, INVALID_TEMPORARY};
pub use proc::{ProcFlags, Procedure};
pub use types::{IrType, MemoryClass};

#[cfg(test)]
mod tests;
