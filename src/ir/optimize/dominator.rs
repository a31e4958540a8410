//! Dominator construction (spec 4.2 step 8): classic iterative dominator
//! algorithm (Cooper/Harvey/Kennedy), refined to a fixed point.

use crate::ir::optimize::dataflow::predecessors;
use crate::ir::proc::Procedure;

/// Reverse-postorder numbering from the entry block.
fn reverse_postorder(proc: &Procedure) -> Vec<usize> {
    let n = proc.blocks.len();
    let mut visited = vec![false; n];
    let mut post = Vec::with_capacity(n);

    fn visit(proc: &Procedure, b: usize, visited: &mut Vec<bool>, post: &mut Vec<usize>) {
        if visited[b] {
            return;
        }
        visited[b] = true;
        for s in proc.blocks[b].successors() {
            visit(proc, s, visited, post);
        }
        post.push(b);
    }

    visit(proc, proc.entry_block, &mut visited, &mut post);
    post.reverse();
    post
}

fn intersect(doms: &[Option<usize>], rpo_index: &[i32], mut a: usize, mut b: usize) -> usize {
    while a != b {
        while rpo_index[a] > rpo_index[b] {
            a = doms[a].unwrap();
        }
        while rpo_index[b] > rpo_index[a] {
            b = doms[b].unwrap();
        }
    }
    a
}

/// Compute immediate dominators for every reachable block and store them in
/// `BasicBlock::dominator`. Unreachable blocks keep `None`.
pub fn build_dominators(proc: &mut Procedure) {
    let rpo = reverse_postorder(proc);
    let n = proc.blocks.len();
    let mut rpo_index = vec![i32::MAX; n];
    for (i, &b) in rpo.iter().enumerate() {
        rpo_index[b] = i as i32;
    }

    let preds = predecessors(proc);
    let mut doms: Vec<Option<usize>> = vec![None; n];
    doms[proc.entry_block] = Some(proc.entry_block);

    let mut changed = true;
    while changed {
        changed = false;
        for &b in rpo.iter().filter(|&&b| b != proc.entry_block) {
            let mut new_idom: Option<usize> = None;
            for &p in &preds[b] {
                if doms[p].is_none() {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => p,
                    Some(cur) => intersect(&doms, &rpo_index, cur, p),
                });
            }
            if new_idom.is_some() && doms[b] != new_idom {
                doms[b] = new_idom;
                changed = true;
            }
        }
    }

    for (i, b) in proc.blocks.iter_mut().enumerate() {
        b.dominator = if i == proc.entry_block { None } else { doms[i] };
    }
}

/// Does `a` dominate `b`?
pub fn dominates(proc: &Procedure, a: usize, b: usize) -> bool {
    if a == b {
        return true;
    }
    let mut cur = b;
    loop {
        match proc.blocks[cur].dominator {
            Some(d) if d == cur => return false,
            Some(d) => {
                if d == a {
                    return true;
                }
                cur = d;
            }
            None => return false,
        }
    }
}
