//! Temporary coalescing / reduction (spec 4.2 step 10): build a live-range
//! collision matrix from the data-flow sets and greedily rename temporaries
//! to reuse slots when ranges do not collide and types are compatible.
//! Also assigns byte offsets for the (now smaller) set of live temporaries,
//! used by the native generator's zero-page allocator as a starting point.

use crate::common::Set;
use crate::ir::optimize::dataflow;
use crate::ir::proc::Procedure;
use crate::ir::types::IrType;

/// Build the pairwise collision matrix: two temporaries collide if both are
/// simultaneously live at some program point (approximated here as: both
/// appear in the same block's `entry_required ∪ local_provided` at once, or
/// one is required at a point where the other is provided and not yet
/// dead).
fn build_collisions(proc: &Procedure) -> Vec<Set<i32>> {
    let n = proc.temporaries.len();
    let mut collide = vec![Set::new(); n];

    for b in &proc.blocks {
        // Live set walking backwards through the block.
        let mut live: Set<i32> = b.temps.exit_required.clone();
        for ins in b.instructions.iter().rev() {
            if let Some(t) = ins.defines_temp() {
                for &other in &live {
                    if other != t {
                        collide[t as usize].insert(other);
                        collide[other as usize].insert(t);
                    }
                }
                live.remove(&t);
            }
            for u in ins.uses_temps() {
                live.insert(u);
            }
        }
    }

    collide
}

/// Greedily coalesce temporaries and rewrite every operand in place. Returns
/// whether any renaming occurred.
pub fn reduce_temporaries(proc: &mut Procedure) -> bool {
    dataflow::run_temps(proc);
    let collide = build_collisions(proc);
    let n = proc.temporaries.len();

    let mut rename: Vec<i32> = (0..n as i32).collect();
    let mut assigned: Vec<Vec<i32>> = Vec::new(); // slot -> original ids placed there
    let mut slot_of: Vec<i32> = vec![-1; n];

    for t in 0..n {
        let ty = proc.temporaries[t];
        let mut placed = false;
        for (slot_idx, members) in assigned.iter_mut().enumerate() {
            let ok = members.iter().all(|&m| {
                !collide[t].contains(&m) && proc.temporaries[m as usize] == ty
            });
            if ok {
                members.push(t as i32);
                slot_of[t] = slot_idx as i32;
                placed = true;
                break;
            }
        }
        if !placed {
            slot_of[t] = assigned.len() as i32;
            assigned.push(vec![t as i32]);
        }
        let _ = ty;
    }

    for t in 0..n {
        rename[t] = slot_of[t];
    }

    let changed = rename.iter().enumerate().any(|(i, &r)| r != i as i32);
    if !changed {
        return false;
    }

    let mut new_types: Vec<IrType> = vec![IrType::None; assigned.len()];
    for (slot, members) in assigned.iter().enumerate() {
        if let Some(&first) = members.first() {
            new_types[slot] = proc.temporaries[first as usize];
        }
    }

    for b in &mut proc.blocks {
        for ins in b.instructions.iter_mut() {
            for s in ins.src.iter_mut() {
                if s.has_temp() {
                    s.temp = rename[s.temp as usize];
                }
            }
            if ins.dst.has_temp() {
                ins.dst.temp = rename[ins.dst.temp as usize];
            }
            if ins.konst.has_temp() {
                ins.konst.temp = rename[ins.konst.temp as usize];
            }
        }
    }

    proc.temporaries = new_types;
    proc.temp_sizes = proc.temporaries.iter().map(|t| t.size()).collect();

    let mut offset = 0i32;
    proc.temp_offsets = proc
        .temp_sizes
        .iter()
        .map(|&sz| {
            let o = offset;
            offset += sz as i32;
            o
        })
        .collect();

    true
}
