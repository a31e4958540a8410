//! IR-level peephole rewrites and block merging (spec 4.2 step 13).
//!
//! - Pattern-based block-local cleanups: a store immediately followed by a
//!   load of the same temp/location becomes a direct copy.
//! - Adjacent basic blocks merge when the predecessor's only successor is
//!   the successor's only entry.
//! - Jumps through empty blocks are bypassed (the empty block's single
//!   successor is substituted directly).

use crate::ir::instr::{Opcode, Operator};
use crate::ir::optimize::dataflow::entry_counts;
use crate::ir::proc::Procedure;

/// Fold `STORE_TEMPORARY t, x; LOAD_TEMPORARY y, t` pairs (with nothing
/// between that could invalidate `t`) into `COPY y, x`.
fn local_peephole(proc: &mut Procedure) -> bool {
    let mut changed = false;
    for b in &mut proc.blocks {
        let mut i = 0;
        while i + 1 < b.instructions.len() {
            let (can_fold, src) = {
                let a = &b.instructions[i];
                let c = &b.instructions[i + 1];
                if a.code == Opcode::StoreTemporary
                    && c.code == Opcode::LoadTemporary
                    && c.src.len() == 1
                    && c.src[0].has_temp()
                    && a.dst.has_temp()
                    && c.src[0].temp == a.dst.temp
                    && !a.src.is_empty()
                {
                    (true, a.src[0].clone())
                } else {
                    (false, Default::default())
                }
            };
            if can_fold {
                let c = &mut b.instructions[i + 1];
                c.code = Opcode::Copy;
                c.op = Operator::None;
                c.src = vec![src];
                changed = true;
            }
            i += 1;
        }
    }
    changed
}

/// Replace a block's jump target with its transitive target when that
/// target block is itself empty (just an unconditional jump).
fn bypass_empty_blocks(proc: &mut Procedure) -> bool {
    let mut changed = false;
    let n = proc.blocks.len();

    let empty_target: Vec<Option<usize>> = (0..n)
        .map(|i| {
            let b = &proc.blocks[i];
            if b.instructions.is_empty() && b.is_unconditional_jump() {
                b.true_jump
            } else {
                None
            }
        })
        .collect();

    for i in 0..n {
        if let Some(t) = proc.blocks[i].true_jump {
            if let Some(bypass) = empty_target[t] {
                if bypass != t {
                    proc.blocks[i].true_jump = Some(bypass);
                    changed = true;
                }
            }
        }
        if let Some(f) = proc.blocks[i].false_jump {
            if let Some(bypass) = empty_target[f] {
                if bypass != f {
                    proc.blocks[i].false_jump = Some(bypass);
                    changed = true;
                }
            }
        }
    }

    changed
}

/// Merge a block into its unique predecessor when the predecessor's only
/// successor is this block and this block's only entry is the predecessor.
fn merge_blocks(proc: &mut Procedure) -> bool {
    let counts = entry_counts(proc);
    let mut changed = false;

    for i in 0..proc.blocks.len() {
        let sole_successor = if proc.blocks[i].is_unconditional_jump() {
            proc.blocks[i].true_jump
        } else {
            None
        };
        if let Some(s) = sole_successor {
            if s != i && counts[s] == 1 && !proc.blocks[s].instructions.is_empty() {
                let moved = std::mem::take(&mut proc.blocks[s].instructions);
                let true_jump = proc.blocks[s].true_jump;
                let false_jump = proc.blocks[s].false_jump;
                proc.blocks[i].instructions.extend(moved);
                proc.blocks[i].true_jump = true_jump;
                proc.blocks[i].false_jump = false_jump;
                proc.blocks[s].true_jump = None;
                proc.blocks[s].false_jump = None;
                changed = true;
            }
        }
    }

    changed
}

pub fn peephole(proc: &mut Procedure) -> bool {
    let a = local_peephole(proc);
    let b = bypass_empty_blocks(proc);
    let c = merge_blocks(proc);
    a || b || c
}
