//! Peephole cleanup over a lowered procedure: drop instructions the
//! forwarding simulator proves are redundant, and fold trivial
//! load/store-immediately-after-store sequences (spec section 4.3,
//! "Peephole optimization").

use super::isa::{Mnemonic, NativeInstruction};
use super::lower::NativeCodeBasicBlock;
use super::regsim::NativeRegisterDataSet;

/// Run one pass of redundant-load/store elimination over every block.
/// Forwarding state resets at each block boundary: the simulator only
/// reasons about straight-line code, never across a branch.
pub fn run(blocks: &mut [NativeCodeBasicBlock]) {
    for block in blocks.iter_mut() {
        let mut regs = NativeRegisterDataSet::new();
        let mut kept = Vec::with_capacity(block.instructions.len());
        for ins in block.instructions.drain(..) {
            if regs.is_redundant(&ins) {
                continue;
            }
            regs.apply(&ins);
            kept.push(ins);
        }
        block.instructions = kept;
    }
    for block in blocks.iter_mut() {
        remove_dead_flag_setup(&mut block.instructions);
    }
}

/// `SEC`/`CLC` immediately followed by another `SEC`/`CLC` with nothing
/// reading carry between them: the first is dead.
fn remove_dead_flag_setup(instructions: &mut Vec<NativeInstruction>) {
    let mut i = 0;
    while i + 1 < instructions.len() {
        let is_flag_op = |m: Mnemonic| matches!(m, Mnemonic::SEC | Mnemonic::CLC);
        if is_flag_op(instructions[i].mnemonic) && is_flag_op(instructions[i + 1].mnemonic) {
            instructions.remove(i);
            continue;
        }
        i += 1;
    }
}
