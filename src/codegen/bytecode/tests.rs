//! Unit tests for the byte-code backend (spec section 8).

use crate::common::{id, CompileContext, Location};
use crate::ir::instr::{Instruction, Opcode};
use crate::ir::operand::Operand;
use crate::ir::proc::Procedure;
use crate::ir::types::IrType;
use crate::link::linker::Linker;
use crate::link::object::ObjectType;
use crate::link::section::SectionType;

use super::dispatch::{self, ByteCodeUsage};
use super::lower::lower_procedure;
use super::opcode;

fn here() -> Location {
    Location::synthetic()
}

/// `return 7` should lower to a constant push and a return, with the
/// opcode use counts reflecting exactly those two ops.
#[test]
fn lower_procedure_emits_return_constant() {
    let mut proc = Procedure::new("main", here());
    let mut ret = Instruction::new(here(), Opcode::ReturnValue);
    ret.src = vec![Operand::int_const(IrType::Int16, 7)];
    proc.block_mut(0).append(ret);

    let stream = lower_procedure(&proc, &[]);

    assert_eq!(stream.bytes, vec![opcode::CONST16.0, 7, 0, opcode::RETURN_VALUE.0]);
    assert_eq!(stream.core_used[opcode::CONST16.0 as usize], 1);
    assert_eq!(stream.core_used[opcode::RETURN_VALUE.0 as usize], 1);
}

/// A conditional block whose true side is not the next block in layout
/// emits both a `BRANCH` (false-side patch) and a synthesized `JUMP`
/// (true-side patch) from the very same block. Each must resolve to its
/// own target, not whichever one a naive block-id lookup would pick.
#[test]
fn branch_and_synthesized_jump_patch_independently() {
    let mut proc = Procedure::new("main", here());
    let else_block = proc.alloc_block();
    let then_block = proc.alloc_block();

    let mut branch = Instruction::new(here(), Opcode::Branch);
    branch.src = vec![Operand::int_const(IrType::Bool, 1)];
    proc.block_mut(0).append(branch);
    // true -> then_block (idx 2, NOT idx + 1), false -> else_block (idx 1,
    // which IS idx + 1) so only the JUMP is synthesized, not a fallthrough.
    proc.block_mut(0).close(Some(then_block), Some(else_block));

    let mut ret_else = Instruction::new(here(), Opcode::ReturnValue);
    ret_else.src = vec![Operand::int_const(IrType::Int16, 0)];
    proc.block_mut(else_block).append(ret_else);

    let mut ret_then = Instruction::new(here(), Opcode::ReturnValue);
    ret_then.src = vec![Operand::int_const(IrType::Int16, 1)];
    proc.block_mut(then_block).append(ret_then);

    let stream = lower_procedure(&proc, &[]);

    // Block 0: CONST16(cond) [3 bytes] + BRANCH [1] + u16 patch [2] = 6
    // bytes, then JUMP [1] + u16 patch [2] = 3 more bytes -> 9 bytes total.
    // Block 1 (else) starts at offset 9: CONST16(0) [3] + RETURN_VALUE [1].
    // Block 2 (then) starts at offset 13.
    let branch_patch = 4;
    let jump_patch = 7;
    assert_eq!(&stream.bytes[branch_patch..branch_patch + 2], &[9, 0], "BRANCH must patch to the else block's offset");
    assert_eq!(&stream.bytes[jump_patch..jump_patch + 2], &[13, 0], "JUMP must patch to the then block's offset, not the else block's");
}

/// The dispatch table only references routines for opcodes actually used
/// somewhere in the module; an unused routine is never pulled in.
#[test]
fn dispatch_table_links_only_used_opcodes() {
    let mut linker = Linker::new();
    linker.add_region(id("main"), 0x0801, 0x2000, -1);
    linker.add_section(id("code"), SectionType::Data);
    linker.add_section(id("table"), SectionType::Data);
    linker.bind_section(id("main"), id("table"));
    linker.bind_section(id("main"), id("code"));

    let used_routine = linker.add_object(id("const16_routine"), ObjectType::Runtime, id("code"));
    linker.object_mut(used_routine).add_data(&[0xEA]);
    let unused_routine = linker.add_object(id("add16_routine"), ObjectType::Runtime, id("code"));
    linker.object_mut(unused_routine).add_data(&[0xEA]);

    let mut routines = crate::common::Map::new();
    routines.insert(opcode::CONST16.0, used_routine);
    routines.insert(opcode::ADD16.0, unused_routine);

    let mut usage = ByteCodeUsage::default();
    usage.core_used[opcode::CONST16.0 as usize] = 3;
    // ADD16 never used; its routine must stay unreferenced.

    let table = dispatch::build_dispatch_table(&mut linker, id("table"), id("dispatch"), &usage, &routines);

    linker.mark_reachable(&[table]);
    let mut ctx = CompileContext::new();
    linker.place(&mut ctx);

    assert!(linker.object(used_routine).is_referenced());
    assert!(!linker.object(unused_routine).is_referenced(), "an opcode with zero uses must not pull in its routine");
    assert!(!ctx.diags.has_errors());
}
