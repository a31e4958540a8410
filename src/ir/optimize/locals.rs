//! Simple-locals promotion (spec 4.2 step 11): locals whose address is
//! never taken and that fit in one temporary are rewritten so every load
//! becomes a move from a dedicated temp and every store becomes a move into
//! it, eliminating the memory traffic entirely.

use crate::common::Map;
use crate::ir::instr::{Opcode, Operator};
use crate::ir::operand::Operand;
use crate::ir::proc::Procedure;
use crate::ir::types::MemoryClass;

fn addressed_locals(proc: &Procedure) -> std::collections::HashSet<i32> {
    let mut out = std::collections::HashSet::new();
    for b in &proc.blocks {
        for ins in &b.instructions {
            if ins.code == Opcode::Lea {
                for s in &ins.src {
                    if matches!(s.memory, MemoryClass::Local | MemoryClass::Frame) {
                        out.insert(s.var_index);
                    }
                }
            }
        }
    }
    out
}

/// Promote every local variable whose address is never taken into a fresh
/// temporary, rewriting `IC_LOAD`/`IC_STORE` of that variable into
/// `IC_LOAD_TEMPORARY`/`IC_STORE_TEMPORARY`. Returns whether anything
/// changed.
pub fn promote_simple_locals(proc: &mut Procedure) -> bool {
    let addressed = addressed_locals(proc);
    let mut temp_for: Map<i32, i32> = Map::new();

    for (idx, local) in proc.local_vars.iter().enumerate() {
        if !addressed.contains(&(idx as i32)) {
            let t = proc.add_temporary(local.ty);
            temp_for.insert(idx as i32, t);
        }
    }

    if temp_for.is_empty() {
        return false;
    }

    let mut changed = false;
    for b in &mut proc.blocks {
        for ins in b.instructions.iter_mut() {
            match ins.code {
                Opcode::Load if ins.src.len() == 1 && ins.src[0].memory == MemoryClass::Local => {
                    if let Some(&t) = temp_for.get(&ins.src[0].var_index) {
                        let ty = ins.dst.ty;
                        ins.code = Opcode::LoadTemporary;
                        ins.op = Operator::None;
                        ins.src = vec![Operand::temp(t, ty)];
                        changed = true;
                    }
                }
                Opcode::Store if ins.dst.memory == MemoryClass::Local => {
                    if let Some(&t) = temp_for.get(&ins.dst.var_index) {
                        let ty = ins.dst.ty;
                        ins.code = Opcode::StoreTemporary;
                        ins.op = Operator::None;
                        ins.dst = Operand::temp(t, ty);
                        changed = true;
                    }
                }
                _ => {}
            }
        }
    }

    changed
}
