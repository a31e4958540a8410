//! Dead-code and dead-branch elimination (spec 4.2 steps 6–7).

use crate::ir::instr::{InstrFlags, Opcode};
use crate::ir::optimize::dataflow;
use crate::ir::proc::Procedure;

/// Remove instructions whose result temporary is never subsequently
/// required, iterating per-block to a fixed point. `mVolatile`-flagged
/// instructions are never removed.
pub fn remove_unused_results(proc: &mut Procedure) -> bool {
    dataflow::run_temps(proc);
    let mut changed = false;

    for b in &mut proc.blocks {
        // Walk backwards accumulating the set of temps required by
        // everything seen so far (i.e. by the block's tail and exit).
        let mut required = b.temps.exit_required.clone();
        let mut keep = vec![true; b.instructions.len()];

        for (i, ins) in b.instructions.iter().enumerate().rev() {
            let has_side_effect = matches!(
                ins.code,
                Opcode::Store
                    | Opcode::Strcpy
                    | Opcode::Branch
                    | Opcode::Jump
                    | Opcode::Call
                    | Opcode::CallNative
                    | Opcode::Return
                    | Opcode::ReturnValue
                    | Opcode::ReturnStruct
                    | Opcode::PushFrame
                    | Opcode::PopFrame
                    | Opcode::Assembler
                    | Opcode::HostCall
            );
            let volatile = ins.flags.contains(InstrFlags::VOLATILE);

            let result_live = match ins.defines_temp() {
                Some(t) => required.contains(&t),
                None => true,
            };

            if !has_side_effect && !volatile && !result_live {
                keep[i] = false;
                changed = true;
                continue;
            }

            if let Some(t) = ins.defines_temp() {
                required.remove(&t);
            }
            for u in ins.uses_temps() {
                required.insert(u);
            }
        }

        if keep.iter().any(|k| !k) {
            let mut it = keep.into_iter();
            b.instructions.retain(|_| it.next().unwrap());
        }
    }

    changed
}

/// If a conditional branch's boolean input folds to a known constant,
/// replace the block terminator with an unconditional jump to the taken
/// edge and drop the other edge; then prune blocks no longer reachable
/// from the entry.
pub fn eliminate_dead_branches(proc: &mut Procedure) -> bool {
    let mut changed = false;

    for i in 0..proc.blocks.len() {
        let taken = {
            let b = &proc.blocks[i];
            if !b.is_conditional() {
                None
            } else if let Some(last) = b.instructions.last() {
                if last.code == Opcode::Branch && last.src.len() == 1 && last.src[0].is_constant() {
                    Some(last.src[0].int_const != 0)
                } else {
                    None
                }
            } else {
                None
            }
        };

        if let Some(cond) = taken {
            let b = &mut proc.blocks[i];
            let target = if cond { b.true_jump } else { b.false_jump };
            b.instructions.pop(); // drop the now-unconditional branch instruction
            b.true_jump = target;
            b.false_jump = None;
            changed = true;
        }
    }

    if prune_unreachable(proc) {
        changed = true;
    }

    changed
}

/// Drop blocks unreachable from the entry. Reachable indices are kept in
/// place (never renumbered) so outstanding `BlockId`s elsewhere stay valid;
/// unreachable blocks are simply emptied of instructions and detached.
fn prune_unreachable(proc: &mut Procedure) -> bool {
    let reachable: std::collections::HashSet<usize> = proc.reachable_blocks().into_iter().collect();
    let mut changed = false;
    for i in 0..proc.blocks.len() {
        if !reachable.contains(&i) && !proc.blocks[i].instructions.is_empty() {
            proc.blocks[i].instructions.clear();
            proc.blocks[i].true_jump = None;
            proc.blocks[i].false_jump = None;
            changed = true;
        }
    }
    changed
}
