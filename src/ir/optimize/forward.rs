//! Temp forwarding, value forwarding and constant propagation (spec 4.2
//! steps 4–5), combined into one block-local pass that iterates to a
//! fixed point across the procedure.
//!
//! - *Temp forwarding*: `IC_LOAD_TEMPORARY`/`IC_STORE_TEMPORARY` copies are
//!   eliminated by rewriting later uses of the copy to its source, for as
//!   long as the source is not redefined.
//! - *Value forwarding*: a live set of "already computed" expressions
//!   (fingerprinted by opcode + canonicalized operands) lets a later,
//!   syntactically identical instruction be rewritten into a copy of the
//!   earlier result.
//! - *Constant folding*: when every operand of an arithmetic/relational
//!   instruction is a constant, the instruction is replaced by a constant
//!   load. Folding is performed in 64-bit signed host arithmetic and then
//!   masked to the destination's operand width (spec section 9).
//!
//! Aliasing: a call flushes forwarded values that could be touched through
//! globals or indirection (`FlushCallAliases`); entering/leaving a frame
//! flushes values backed by stack-relative storage (`FlushFrameAliases`).
//! Locals/params whose address has been taken (seen as the source of an
//! `IC_LEA`) are never forwarded through memory.

use crate::common::Map;
use crate::ir::instr::{Instruction, Opcode, Operator};
use crate::ir::operand::Operand;
use crate::ir::proc::Procedure;
use crate::ir::types::MemoryClass;

/// A canonical fingerprint for an instruction's computed value: stable
/// across renaming because it only depends on the opcode/operator and the
/// operand fingerprints, not on instruction identity.
type ValueKey = (u8, u8, Vec<<Operand as OperandFp>::Fp>);

trait OperandFp {
    type Fp;
    fn fp(&self) -> Self::Fp;
}

impl OperandFp for Operand {
    type Fp = (i32, u8, i64, u64, i32, u8);
    fn fp(&self) -> Self::Fp {
        let (temp, ty, ic, fc, vi, mem) = self.fingerprint();
        (temp, ty as u8, ic, fc, vi, mem as u8)
    }
}

fn opcode_tag(code: Opcode) -> u8 {
    code as u8
}

fn value_key(ins: &Instruction) -> Option<ValueKey> {
    match ins.code {
        Opcode::BinaryOperator | Opcode::UnaryOperator | Opcode::RelationalOperator | Opcode::ConversionOperator => {
            let ops = ins.src.iter().map(|o| o.fp()).collect();
            Some((opcode_tag(ins.code), ins.op as u8, ops))
        }
        _ => None,
    }
}

fn is_address_taken(proc: &Procedure) -> (std::collections::HashSet<i32>, std::collections::HashSet<i32>) {
    let mut locals = std::collections::HashSet::new();
    let mut params = std::collections::HashSet::new();
    for b in &proc.blocks {
        for ins in &b.instructions {
            if matches!(ins.code, Opcode::Lea) {
                for s in &ins.src {
                    match s.memory {
                        MemoryClass::Local | MemoryClass::Frame => {
                            locals.insert(s.var_index);
                        }
                        MemoryClass::Param | MemoryClass::FParam => {
                            params.insert(s.var_index);
                        }
                        _ => {}
                    }
                }
            }
        }
    }
    (locals, params)
}

/// Run temp forwarding + value forwarding + constant folding once per
/// block, iterating the whole procedure to a fixed point. Returns whether
/// anything changed.
pub fn forward_and_fold(proc: &mut Procedure) -> bool {
    let (aliased_locals, aliased_params) = is_address_taken(proc);
    let mut any_changed = false;
    let mut changed = true;
    while changed {
        changed = false;
        for b in &mut proc.blocks {
            // temp-copy forwarding table: old temp -> forwarding source temp
            let mut copy_of: Map<i32, i32> = Map::new();
            // known-constant table: temp defined by IC_CONSTANT -> its value
            let mut const_of: Map<i32, Operand> = Map::new();
            // value table: fingerprint -> producing instruction's dst
            let mut values: Map<ValueKey, Operand> = Map::new();

            for ins in b.instructions.iter_mut() {
                // Rewrite uses through the copy-forwarding table first.
                for s in ins.src.iter_mut() {
                    if s.has_temp() {
                        if let Some(&src) = copy_of.get(&s.temp) {
                            if s.temp != src {
                                s.temp = src;
                                changed = true;
                            }
                        }
                    }
                }

                // A use of a temp known to hold a literal constant becomes the
                // constant itself, so later folding/value-forwarding can see it.
                for s in ins.src.iter_mut() {
                    if s.has_temp() {
                        if let Some(k) = const_of.get(&s.temp) {
                            let ty = s.ty;
                            *s = Operand { ty, ..k.clone() };
                            changed = true;
                        }
                    }
                }

                // Aliasing flushes.
                match ins.code {
                    Opcode::Call | Opcode::CallNative | Opcode::HostCall => {
                        values.clear(); // FlushCallAliases
                    }
                    Opcode::PushFrame | Opcode::PopFrame => {
                        values.clear(); // FlushFrameAliases
                    }
                    Opcode::Store if matches!(ins.dst.memory, MemoryClass::Local | MemoryClass::Global | MemoryClass::Indirect) => {
                        // A store through memory invalidates any cached
                        // loads/expressions that could alias it, unless the
                        // destination is a local/param never address-taken.
                        let safe_local = ins.dst.memory == MemoryClass::Local
                            && !aliased_locals.contains(&ins.dst.var_index);
                        let safe_param = ins.dst.memory == MemoryClass::Param
                            && !aliased_params.contains(&ins.dst.var_index);
                        if !(safe_local || safe_param) {
                            values.clear();
                        }
                    }
                    _ => {}
                }

                // Constant folding.
                if try_fold(ins) {
                    changed = true;
                }

                // Value forwarding: an identical prior expression becomes a
                // copy from its result.
                if let Some(key) = value_key(ins) {
                    if let Some(prior) = values.get(&key).cloned() {
                        if ins.dst.has_temp() && prior.has_temp() {
                            ins.code = Opcode::LoadTemporary;
                            ins.op = Operator::None;
                            let dst_ty = ins.dst.ty;
                            ins.src = vec![Operand {
                                ty: dst_ty,
                                ..prior
                            }];
                            changed = true;
                        }
                    } else if ins.dst.has_temp() {
                        values.insert(key, ins.dst.clone());
                    }
                }

                // Temp-copy table maintenance for LOAD_TEMPORARY/COPY.
                if matches!(ins.code, Opcode::LoadTemporary | Opcode::Copy) && ins.dst.has_temp() && ins.src.len() == 1 && ins.src[0].has_temp() {
                    let src_temp = copy_of.get(&ins.src[0].temp).copied().unwrap_or(ins.src[0].temp);
                    copy_of.insert(ins.dst.temp, src_temp);
                } else if let Some(t) = ins.defines_temp() {
                    copy_of.remove(&t);
                }

                // Known-constant table maintenance for IC_CONSTANT.
                if ins.code == Opcode::Constant && ins.dst.has_temp() {
                    const_of.insert(ins.dst.temp, Operand::int_const(ins.dst.ty, ins.dst.int_const));
                } else if let Some(t) = ins.defines_temp() {
                    const_of.remove(&t);
                }
            }
        }
        any_changed |= changed;
    }
    any_changed
}

/// Fold a binary/unary/relational instruction whose operands are all
/// constants. Returns true if the instruction was rewritten.
fn try_fold(ins: &mut Instruction) -> bool {
    match ins.code {
        Opcode::BinaryOperator if ins.src.len() == 2 && ins.src[0].is_constant() && ins.src[1].is_constant() => {
            let a = ins.src[0].int_const;
            let b = ins.src[1].int_const;
            let r = ins.dst.ty.wrap(ins.op.eval_int(a, b));
            ins.code = Opcode::Constant;
            ins.op = Operator::None;
            ins.dst.int_const = r;
            ins.src.clear();
            true
        }
        Opcode::UnaryOperator if ins.src.len() == 1 && ins.src[0].is_constant() => {
            let a = ins.src[0].int_const;
            let r = ins.dst.ty.wrap(ins.op.eval_unary(a));
            ins.code = Opcode::Constant;
            ins.op = Operator::None;
            ins.dst.int_const = r;
            ins.src.clear();
            true
        }
        Opcode::RelationalOperator if ins.src.len() == 2 && ins.src[0].is_constant() && ins.src[1].is_constant() => {
            let a = ins.src[0].int_const;
            let b = ins.src[1].int_const;
            let r = ins.op.eval_int(a, b);
            ins.code = Opcode::Constant;
            ins.op = Operator::None;
            ins.dst.int_const = r;
            ins.src.clear();
            true
        }
        _ => false,
    }
}
