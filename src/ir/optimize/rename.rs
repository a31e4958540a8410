//! Temporary renaming (spec 4.2 step 3): walk the CFG assigning a fresh
//! temporary number to every definition, and a union-find over the fresh
//! numbers (`mRenameUnionTable` in the source) to collapse the versions that
//! a join point cannot otherwise distinguish.
//!
//! The front end's lowering (see `crate::front::lower`) never reuses a
//! temporary id across two definitions that can reach a common use from
//! different paths — user variables that need that are kept in LOCAL/GLOBAL
//! storage until simple-locals promotion proves it is safe to fold them
//! into a temporary — so in practice the union-find below rarely fires, but
//! it is still needed to make this pass correct for arbitrary IR producers.

use crate::common::Map;
use crate::ir::operand::INVALID_TEMPORARY;
use crate::ir::proc::Procedure;
use crate::ir::types::IrType;

struct UnionFind {
    parent: Vec<i32>,
}

impl UnionFind {
    fn new() -> Self {
        UnionFind { parent: Vec::new() }
    }

    fn make(&mut self) -> i32 {
        let id = self.parent.len() as i32;
        self.parent.push(id);
        id
    }

    fn find(&mut self, x: i32) -> i32 {
        if self.parent[x as usize] != x {
            let root = self.find(self.parent[x as usize]);
            self.parent[x as usize] = root;
        }
        self.parent[x as usize]
    }

    fn union(&mut self, a: i32, b: i32) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // Keep the lower id canonical so earlier definitions win,
            // mirroring the source picking the predecessor already visited.
            if ra < rb {
                self.parent[rb as usize] = ra;
            } else {
                self.parent[ra as usize] = rb;
            }
        }
    }
}

/// Renumber every temporary so each is defined by exactly one static
/// instruction where the IR allows it (see module doc). Returns whether
/// anything changed.
pub fn rename_temporaries(proc: &mut Procedure) -> bool {
    let order = proc.reachable_blocks();
    let mut uf = UnionFind::new();
    let mut new_types: Vec<IrType> = Vec::new();
    let mut exit_env: Map<usize, Map<i32, i32>> = Map::new();

    // fresh(old) allocates a new canonical temp carrying old's declared type.
    let mut fresh = |old: i32, types: &[IrType], uf: &mut UnionFind, new_types: &mut Vec<IrType>| -> i32 {
        let ty = types.get(old as usize).copied().unwrap_or(IrType::None);
        let id = uf.make();
        new_types.push(ty);
        id
    };

    let old_types = proc.temporaries.clone();

    for &b in &order {
        // Seed this block's environment from predecessor exit environments.
        // A block with several already-processed predecessors unions their
        // mappings for the same old temp into one canonical id.
        let mut env: Map<i32, i32> = Map::new();
        let preds = super::dataflow::predecessors(proc);
        for &p in &preds[b] {
            if let Some(penv) = exit_env.get(&p) {
                for (&old, &nw) in penv {
                    match env.get(&old) {
                        None => {
                            env.insert(old, nw);
                        }
                        Some(&existing) => {
                            uf.union(existing, nw);
                        }
                    }
                }
            }
        }

        for ins in proc.blocks[b].instructions.iter_mut() {
            for s in ins.src.iter_mut() {
                if s.has_temp() {
                    if let Some(&mapped) = env.get(&s.temp) {
                        s.temp = mapped;
                    }
                }
            }
            if ins.konst.has_temp() {
                if let Some(&mapped) = env.get(&ins.konst.temp) {
                    ins.konst.temp = mapped;
                }
            }
            if ins.dst.has_temp() {
                let old = ins.dst.temp;
                let new_id = fresh(old, &old_types, &mut uf, &mut new_types);
                env.insert(old, new_id);
                ins.dst.temp = new_id;
            }
        }

        exit_env.insert(b, env);
    }

    // Resolve union-find roots and compact to a dense id space.
    let mut root_to_dense: Map<i32, i32> = Map::new();
    let mut dense_types: Vec<IrType> = Vec::new();
    let mut remap = |t: i32, uf: &mut UnionFind, root_to_dense: &mut Map<i32, i32>, dense_types: &mut Vec<IrType>, new_types: &[IrType]| -> i32 {
        if t == INVALID_TEMPORARY {
            return INVALID_TEMPORARY;
        }
        let root = uf.find(t);
        *root_to_dense.entry(root).or_insert_with(|| {
            let id = dense_types.len() as i32;
            dense_types.push(new_types[root as usize]);
            id
        })
    };

    let mut changed = false;
    for b in &mut proc.blocks {
        for ins in b.instructions.iter_mut() {
            for s in ins.src.iter_mut() {
                if s.has_temp() {
                    let r = remap(s.temp, &mut uf, &mut root_to_dense, &mut dense_types, &new_types);
                    if r != s.temp {
                        changed = true;
                    }
                    s.temp = r;
                }
            }
            if ins.dst.has_temp() {
                let r = remap(ins.dst.temp, &mut uf, &mut root_to_dense, &mut dense_types, &new_types);
                if r != ins.dst.temp {
                    changed = true;
                }
                ins.dst.temp = r;
            }
            if ins.konst.has_temp() {
                ins.konst.temp = remap(ins.konst.temp, &mut uf, &mut root_to_dense, &mut dense_types, &new_types);
            }
        }
    }

    proc.temporaries = dense_types;
    proc.temp_sizes = proc.temporaries.iter().map(|t| t.size()).collect();
    proc.temp_offsets = vec![0; proc.temporaries.len()];

    changed || !order.is_empty()
}

/// Verify the SSA-after-rename invariant (spec section 8, property 1): every
/// temporary is written by at most one instruction.
pub fn verify_single_writer(proc: &Procedure) -> bool {
    let mut writers = vec![0u32; proc.temporaries.len()];
    for b in &proc.blocks {
        for ins in &b.instructions {
            if let Some(t) = ins.defines_temp() {
                writers[t as usize] += 1;
            }
        }
    }
    writers.iter().all(|&c| c <= 1)
}
