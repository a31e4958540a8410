//! Data-flow fixed points (spec 4.2 step 2).
//!
//! For every block we compute `local_required`/`local_provided` from the
//! instructions it contains, then propagate `entry_/exit_required` and
//! `entry_/exit_provided` to a fixed point. The same machinery below is used
//! for temporaries, local variables, static variables and parameters — only
//! the per-instruction extraction differs, so it is passed in as a closure.

use crate::common::Set;
use crate::ir::block::FlowSets;
use crate::ir::instr::Instruction;
use crate::ir::proc::Procedure;

/// Compute predecessor lists for every block (needed to propagate `exit_*`
/// sets backwards and `entry_*` sets forwards).
pub fn predecessors(proc: &Procedure) -> Vec<Vec<usize>> {
    let mut preds = vec![Vec::new(); proc.blocks.len()];
    for (i, b) in proc.blocks.iter().enumerate() {
        for s in b.successors() {
            preds[s].push(i);
        }
    }
    preds
}

pub fn entry_counts(proc: &Procedure) -> Vec<u32> {
    let mut counts = vec![0u32; proc.blocks.len()];
    for b in &proc.blocks {
        for s in b.successors() {
            counts[s] += 1;
        }
    }
    counts
}

/// Run one data-flow computation, selecting the target `FlowSets` field via
/// `select`, and per-instruction required/provided items via `req`/`prov`.
pub fn run<S, R, P>(proc: &mut Procedure, mut select: S, req: R, prov: P)
where
    S: FnMut(&mut crate::ir::block::BasicBlock) -> &mut FlowSets,
    R: Fn(&Instruction) -> Vec<i32>,
    P: Fn(&Instruction) -> Vec<i32>,
{
    let n = proc.blocks.len();

    // Local sets: walk each block backwards so that a later use of a value
    // produced earlier in the same block is correctly excluded from
    // "required" once it has a local provider.
    for b in &mut proc.blocks {
        let fs = select(b);
        fs.local_required.clear();
        fs.local_provided.clear();
        for ins in b.instructions.iter().rev() {
            for item in prov(ins) {
                fs.local_provided.insert(item);
                fs.local_required.remove(&item);
            }
            for item in req(ins) {
                fs.local_required.insert(item);
            }
        }
    }

    let preds = predecessors(proc);

    // entry_provided(b) = intersection over predecessors p of
    // (local_provided(p) ∪ entry_provided(p)), empty for the entry block.
    // exit_required(b) = union over successors s of
    // entry_required(s) (entry_required = local_required ∪ (exit_required \ local_provided)).
    let mut changed = true;
    while changed {
        changed = false;
        for i in 0..n {
            let successors: Vec<usize> = proc.blocks[i].successors().collect();
            let mut exit_req: Set<i32> = Set::new();
            for s in &successors {
                let entry_req_s: Set<i32> = {
                    let fs = select(&mut proc.blocks[*s]);
                    fs.local_required
                        .iter()
                        .cloned()
                        .chain(fs.exit_required.iter().cloned().filter(|x| !fs.local_provided.contains(x)))
                        .collect()
                };
                exit_req.extend(entry_req_s);
            }
            let fs = select(&mut proc.blocks[i]);
            if fs.exit_required != exit_req {
                fs.exit_required = exit_req;
                changed = true;
            }
            let entry_req: Set<i32> = fs
                .local_required
                .iter()
                .cloned()
                .chain(fs.exit_required.iter().cloned().filter(|x| !fs.local_provided.contains(x)))
                .collect();
            if fs.entry_required != entry_req {
                fs.entry_required = entry_req;
                changed = true;
            }

            let preds_i = &preds[i];
            let entry_prov: Set<i32> = if preds_i.is_empty() {
                Set::new()
            } else {
                let mut iter = preds_i.iter();
                let first = *iter.next().unwrap();
                let fsf = select(&mut proc.blocks[first]);
                let mut acc: Set<i32> = fsf
                    .local_provided
                    .iter()
                    .cloned()
                    .chain(fsf.entry_provided.iter().cloned())
                    .collect();
                for p in iter {
                    let fsp = select(&mut proc.blocks[*p]);
                    let prov_p: Set<i32> = fsp
                        .local_provided
                        .iter()
                        .cloned()
                        .chain(fsp.entry_provided.iter().cloned())
                        .collect();
                    acc = acc.intersection(&prov_p).cloned().collect();
                }
                acc
            };
            let fs = select(&mut proc.blocks[i]);
            if fs.entry_provided != entry_prov {
                fs.entry_provided = entry_prov;
                changed = true;
            }
            let exit_prov: Set<i32> = fs
                .local_provided
                .iter()
                .cloned()
                .chain(fs.entry_provided.iter().cloned())
                .collect();
            if fs.exit_provided != exit_prov {
                fs.exit_provided = exit_prov;
                changed = true;
            }
        }
    }
}

/// Data-flow over temporaries: required = used before locally defined;
/// provided = defined locally.
pub fn run_temps(proc: &mut Procedure) {
    run(
        proc,
        |b| &mut b.temps,
        |ins| ins.uses_temps().collect(),
        |ins| ins.defines_temp().into_iter().collect(),
    );
}
