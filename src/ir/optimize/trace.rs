//! Trace building (spec 4.2 step 1): reorder blocks into an extended-basic-
//! block layout so that long fall-through chains are contiguous. Rather than
//! physically moving blocks in the arena (which would invalidate every
//! index already held by instructions/relocations), we record the preferred
//! linear order in `Procedure::trace_order`; the native generator consults
//! it when deciding fall-through vs. explicit jumps.

use crate::common::Set;
use crate::ir::optimize::dataflow::entry_counts;
use crate::ir::proc::Procedure;

/// Build the trace order. When `expand` is true, single-entry blocks are
/// still placed adjacent to their sole predecessor (inlining into the
/// predecessor's trace is a code-generation concern handled downstream by
/// the native block-merge pass; here we only guarantee adjacency).
pub fn build_traces(proc: &mut Procedure, _expand: bool) -> bool {
    let counts = entry_counts(proc);
    let n = proc.blocks.len();
    let mut placed = vec![false; n];
    let mut order = Vec::with_capacity(n);

    let mut worklist = vec![proc.entry_block];
    while let Some(start) = worklist.pop() {
        if placed[start] {
            continue;
        }
        let mut cur = start;
        loop {
            if placed[cur] {
                break;
            }
            placed[cur] = true;
            order.push(cur);

            // Prefer the true-jump successor as the fall-through target if
            // it has exactly one entry (this block is its only predecessor)
            // and has not been placed yet; otherwise queue both successors
            // for later traces.
            let succs: Vec<usize> = proc.blocks[cur].successors().collect();
            let mut next = None;
            for s in &succs {
                if !placed[*s] && counts[*s] <= 1 && next.is_none() {
                    next = Some(*s);
                } else if !placed[*s] {
                    worklist.push(*s);
                }
            }
            match next {
                Some(n) => cur = n,
                None => break,
            }
        }
    }

    // Append any unreached-by-the-above (should not normally happen once
    // dead-block elimination has run, but trace building must be robust to
    // running before it).
    let seen: Set<usize> = order.iter().cloned().collect();
    for b in 0..n {
        if !seen.contains(&b) {
            order.push(b);
        }
    }

    let changed = proc.trace_order != order;
    proc.trace_order = order;
    changed
}
