//! Static relevance (spec 4.2 step 12): a two-pass mark-and-sweep over
//! static (global) reads/writes. A static is "relevant" if at least one
//! observable read anywhere in the module depends on it (directly, or
//! transitively through a call); irrelevant static stores are then removed.
//!
//! This operates per-module rather than per-procedure because relevance is
//! a whole-program property (a store might only be read by a different
//! procedure).

use crate::common::Set;
use crate::ir::instr::Opcode;
use crate::ir::module::Module;
use crate::ir::types::MemoryClass;

fn mark_relevant(module: &Module) -> Set<i32> {
    let mut relevant = Set::new();
    // A global is relevant if it is ever read. Reads through IC_LOAD with
    // global memory class, or anything that takes its address (the value
    // could escape and be read elsewhere), mark it.
    for proc in &module.procedures {
        for b in &proc.blocks {
            for ins in &b.instructions {
                if matches!(ins.code, Opcode::Load | Opcode::Lea) {
                    for s in &ins.src {
                        if s.memory == MemoryClass::Global {
                            relevant.insert(s.var_index);
                        }
                    }
                }
            }
        }
    }
    relevant
}

/// Remove `IC_STORE` instructions that target a global never found relevant
/// by `mark_relevant`. Returns whether anything changed.
pub fn remove_irrelevant_static_stores(module: &mut Module) -> bool {
    let relevant = mark_relevant(module);
    let mut changed = false;

    for proc in &mut module.procedures {
        for b in &mut proc.blocks {
            let before = b.instructions.len();
            b.instructions.retain(|ins| {
                if ins.code == Opcode::Store && ins.dst.memory == MemoryClass::Global {
                    relevant.contains(&ins.dst.var_index)
                } else {
                    true
                }
            });
            if b.instructions.len() != before {
                changed = true;
            }
        }
    }

    changed
}
