//! Optional global register allocation: promote a procedure's
//! hottest zero-page temporary into `X` or `Y` for its whole body (spec
//! section 4.3, "Global register allocation", marked optional).
//!
//! Only attempted for leaf procedures: anything with a `CALL`/`CALL_NATIVE`
//! is assumed (per the runtime calling convention) to clobber `X`/`Y`
//! across the call, so promoting a temporary live across one would be
//! unsound without save/restore this pass doesn't do.

use std::collections::HashMap;

use super::isa::{Mnemonic, NativeInstruction, NativeOperand};
use super::lower::NativeProcedure;

fn count_zero_page_uses(proc: &NativeProcedure) -> HashMap<u8, u32> {
    let mut counts = HashMap::new();
    for block in &proc.blocks {
        for ins in &block.instructions {
            if let NativeOperand::ZeroPage(addr) = ins.operand {
                if matches!(ins.mnemonic, Mnemonic::LDA | Mnemonic::STA) {
                    *counts.entry(addr).or_insert(0) += 1;
                }
            }
        }
    }
    counts
}

fn has_call(proc: &NativeProcedure) -> bool {
    proc.blocks
        .iter()
        .any(|b| b.instructions.iter().any(|i| matches!(i.mnemonic, Mnemonic::JSR)))
}

/// Promote the single hottest byte-sized temporary to `X`, if the
/// procedure is leaf and the temporary is used often enough to be worth it.
pub fn promote(proc: &mut NativeProcedure) {
    if has_call(proc) {
        return;
    }
    let counts = count_zero_page_uses(proc);
    let Some((&addr, &uses)) = counts.iter().max_by_key(|(_, &n)| n) else {
        return;
    };
    if uses < 4 {
        return; // not hot enough to be worth dedicating a register to
    }

    for block in proc.blocks.iter_mut() {
        for ins in block.instructions.iter_mut() {
            if !matches!(ins.operand, NativeOperand::ZeroPage(a) if a == addr) {
                continue;
            }
            match ins.mnemonic {
                Mnemonic::LDA => *ins = NativeInstruction::implied(Mnemonic::TXA),
                Mnemonic::STA => *ins = NativeInstruction::implied(Mnemonic::TAX),
                _ => {}
            }
        }
    }
}
