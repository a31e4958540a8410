//! Assembly: turn a lowered, peephole-cleaned, zero-page-remapped
//! procedure into bytes and linker relocations (spec section 4.3,
//! "Assembly").
//!
//! Branches between a procedure's own blocks are resolved locally (the
//! target is always within the same object); everything that crosses an
//! object boundary — calls, globals, runtime helpers — becomes a
//! [`LinkerReference`].

use crate::common::{CompileContext, DiagKind, Location};
use crate::link::{ObjectType, ReferenceFlags};

use super::isa::{Mnemonic, NativeInstruction, NativeOperand};
use super::lower::{HelperBindings, NativeCodeBasicBlock, NativeProcedure};

/// Control-flow instructions synthesized once block addresses are known:
/// a conditional branch to the true side, falling through or jumping to
/// the false side, and an unconditional jump elided when its target is
/// the very next block in layout order.
fn close_block(block: &NativeCodeBasicBlock, next_in_layout: Option<usize>, out: &mut Vec<NativeInstruction>) {
    match (block.true_jump, block.false_jump) {
        (Some(t), Some(f)) => {
            out.push(NativeInstruction::new(
                Mnemonic::BNE,
                super::isa::AddrMode::Relative,
                NativeOperand::Block(t),
            ));
            if next_in_layout != Some(f) {
                out.push(NativeInstruction::new(
                    Mnemonic::JMP,
                    super::isa::AddrMode::Absolute,
                    NativeOperand::Block(f),
                ));
            }
        }
        (Some(t), None) => {
            if next_in_layout != Some(t) {
                out.push(NativeInstruction::new(
                    Mnemonic::JMP,
                    super::isa::AddrMode::Absolute,
                    NativeOperand::Block(t),
                ));
            }
        }
        (None, _) => {}
    }
}

/// Assemble one procedure, returning its [`LinkerObject`] (already added to
/// `linker` under `section`).
pub fn assemble_procedure(
    linker: &mut crate::link::Linker,
    section: crate::common::Id,
    native: &NativeProcedure,
    helpers: &HelperBindings,
    ctx: &mut CompileContext,
) -> crate::common::ObjectId {
    // Layout: lay blocks out in trace order, closing each with its
    // control-flow tail, and note each block's starting instruction index
    // in the flattened stream.
    let order = if native.trace_order.is_empty() {
        (0..native.blocks.len()).collect::<Vec<_>>()
    } else {
        native.trace_order.clone()
    };

    let mut flat: Vec<NativeInstruction> = Vec::new();
    let mut block_start_instr: Vec<(usize, usize)> = Vec::new(); // (block index, flat offset)

    for (pos, &block_idx) in order.iter().enumerate() {
        let block = &native.blocks[block_idx];
        block_start_instr.push((block_idx, flat.len()));
        flat.extend(block.instructions.iter().cloned());
        let next = order.get(pos + 1).copied();
        close_block(block, next, &mut flat);
    }

    // Byte offsets per instruction, then per block (from the recorded
    // instruction index into that same table).
    let mut instr_byte_offset = Vec::with_capacity(flat.len() + 1);
    let mut cursor = 0u32;
    for ins in &flat {
        instr_byte_offset.push(cursor);
        cursor += ins.len();
    }
    instr_byte_offset.push(cursor);

    let block_byte_offset: std::collections::HashMap<usize, u32> = block_start_instr
        .iter()
        .map(|&(block_idx, instr_idx)| (block_idx, instr_byte_offset[instr_idx]))
        .collect();

    let object_id = linker.add_object(native.ident, ObjectType::NativeCode, section);

    for (i, ins) in flat.iter().enumerate() {
        let at = instr_byte_offset[i];
        let opcode = ins.mnemonic.opcode_byte(ins.mode).unwrap_or(0xEA);
        match &ins.operand {
            NativeOperand::None => {
                linker.object_mut(object_id).add_data(&[opcode]);
            }
            NativeOperand::Immediate(v) => {
                linker.object_mut(object_id).add_data(&[opcode, *v]);
            }
            NativeOperand::ZeroPage(addr) => {
                linker.object_mut(object_id).add_data(&[opcode, *addr]);
            }
            NativeOperand::Symbol(ident, offset) => {
                let target = linker.find_object(*ident).or_else(|| helpers.0.get(ident).copied());
                linker.object_mut(object_id).add_data(&[opcode, 0, 0]);
                match target {
                    Some(t) => {
                        linker
                            .object_mut(object_id)
                            .add_reference(at + 1, t, *offset, ReferenceFlags::LOW_BYTE | ReferenceFlags::HIGH_BYTE);
                    }
                    None => ctx.diags.push(
                        Location::synthetic(),
                        DiagKind::Link,
                        format!("'{}' references unresolved symbol '{}'", native.ident, ident),
                    ),
                }
            }
            NativeOperand::Block(target_block) => {
                let target_off = block_byte_offset.get(target_block).copied();
                match target_off {
                    Some(target_off) if ins.mode == super::isa::AddrMode::Relative => {
                        let from = at as i64 + 2;
                        let delta = target_off as i64 - from;
                        if (-128..=127).contains(&delta) {
                            linker.object_mut(object_id).add_data(&[opcode, delta as u8]);
                        } else {
                            // Out of branch range: invert the condition and
                            // jump instead (BNE<->BEQ only case emitted here).
                            let inverted = match ins.mnemonic {
                                Mnemonic::BNE => 0xF0, // BEQ
                                Mnemonic::BEQ => 0xD0, // BNE
                                other => other.opcode_byte(super::isa::AddrMode::Relative).unwrap_or(opcode),
                            };
                            linker.object_mut(object_id).add_data(&[inverted, 3, 0x4C, 0, 0]);
                            linker
                                .object_mut(object_id)
                                .add_reference(at + 3, object_id, target_off as i32, ReferenceFlags::LOW_BYTE | ReferenceFlags::HIGH_BYTE);
                        }
                    }
                    Some(target_off) => {
                        linker.object_mut(object_id).add_data(&[opcode, 0, 0]);
                        linker
                            .object_mut(object_id)
                            .add_reference(at + 1, object_id, target_off as i32, ReferenceFlags::LOW_BYTE | ReferenceFlags::HIGH_BYTE);
                    }
                    None => ctx.diags.push(
                        Location::synthetic(),
                        DiagKind::Link,
                        format!("'{}' branches to an unknown block", native.ident),
                    ),
                }
            }
        }
    }

    object_id
}

/// Ensure a runtime-helper symbol is registered before any procedure that
/// calls it is assembled (spec section 6: a missing binding is fatal, not
/// silently skipped).
pub fn check_helpers_registered(native: &NativeProcedure, helpers: &HelperBindings, ctx: &mut CompileContext) {
    for helper in &native.helpers_used {
        if !helpers.0.contains_key(helper) {
            ctx.diags.push(
                Location::synthetic(),
                DiagKind::Link,
                format!("procedure '{}' calls unregistered runtime helper '{}'", native.ident, helper),
            );
        }
    }
}
