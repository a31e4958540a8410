//! Unit tests for the native 6502 backend (spec section 8).

use crate::common::{id, CompileContext, Location};
use crate::ir::instr::{Instruction, Opcode};
use crate::ir::operand::Operand;
use crate::ir::proc::Procedure;
use crate::ir::types::IrType;
use crate::link::linker::Linker;
use crate::link::object::ObjectType;
use crate::link::section::SectionType;

use super::isa::{AddrMode, Mnemonic, NativeInstruction, NativeOperand};
use super::lower::{lower_procedure, HelperBindings, NativeCodeBasicBlock, NativeProcedure};
use super::{assemble, zeropage};

fn here() -> Location {
    Location::synthetic()
}

/// A procedure that just returns the literal 42 should lower to a single
/// immediate load followed by `RTS` (spec's "return 42" scenario).
#[test]
fn lower_procedure_emits_return_42() {
    let mut proc = Procedure::new("main", here());
    let mut ret = Instruction::new(here(), Opcode::ReturnValue);
    ret.src = vec![Operand::int_const(IrType::Int16, 42)];
    proc.block_mut(0).append(ret);

    let native = lower_procedure(&mut proc, &[]);

    assert_eq!(native.blocks.len(), 1);
    let instrs = &native.blocks[0].instructions;
    assert_eq!(instrs.len(), 2, "expected LDA #42 then RTS, got {instrs:?}");
    match &instrs[0].operand {
        NativeOperand::Immediate(v) => assert_eq!(*v, 42),
        other => panic!("expected an immediate operand, got {other:?}"),
    }
    assert_eq!(instrs[0].mnemonic, Mnemonic::LDA);
    assert_eq!(instrs[1].mnemonic, Mnemonic::RTS);
}

fn bare_native(ident: &str, zp_size: u8) -> NativeProcedure {
    NativeProcedure {
        ident: id(ident),
        entry_block: 0,
        blocks: Vec::new(),
        zp_base: 0,
        zp_size,
        helpers_used: Default::default(),
        trace_order: Vec::new(),
    }
}

/// Two procedures with no caller/callee relationship can never be live on
/// the call stack at the same time, so they may share zero-page bytes.
#[test]
fn non_interfering_procedures_share_a_window() {
    let mut procs = vec![bare_native("a", 4), bare_native("b", 4)];
    let call_graph = crate::common::Map::new();

    zeropage::remap(&mut procs, &call_graph);

    assert_eq!(procs[0].zp_base, procs[1].zp_base, "unrelated procedures should overlap to save space");
}

/// A caller and its callee can both be live at once, so they must get
/// disjoint windows.
#[test]
fn calling_procedures_get_disjoint_windows() {
    let mut procs = vec![bare_native("caller", 4), bare_native("callee", 4)];
    let mut call_graph = crate::common::Map::new();
    call_graph.insert(id("caller"), crate::common::Set::from([id("callee")]));
    call_graph.insert(id("callee"), crate::common::Set::new());

    zeropage::remap(&mut procs, &call_graph);

    let a_start = procs[0].zp_base as u32;
    let a_end = a_start + procs[0].zp_size as u32;
    let b_start = procs[1].zp_base as u32;
    let b_end = b_start + procs[1].zp_size as u32;
    let disjoint = a_end <= b_start || b_end <= a_start;
    assert!(disjoint, "caller and callee windows must not overlap: {a_start}..{a_end} vs {b_start}..{b_end}");
}

/// Shifting only rewrites zero-page addresses that fall within the
/// procedure's own footprint, leaving the fixed frame/scratch pointers at
/// 0xFA/0xFC untouched.
#[test]
fn remap_does_not_disturb_addresses_outside_the_procedure_footprint() {
    let mut native = bare_native("p", 2);
    native.blocks.push(NativeCodeBasicBlock {
        index: 0,
        instructions: vec![
            NativeInstruction::zero_page(Mnemonic::LDA, 0),
            NativeInstruction::zero_page(Mnemonic::STA, super::lower::FRAME_PTR),
        ],
        true_jump: None,
        false_jump: None,
    });
    let mut procs = vec![native];
    let call_graph = crate::common::Map::new();

    zeropage::remap(&mut procs, &call_graph);

    let instrs = &procs[0].blocks[0].instructions;
    match instrs[0].operand {
        NativeOperand::ZeroPage(addr) => assert_eq!(addr, procs[0].zp_base),
        ref other => panic!("unexpected operand {other:?}"),
    }
    match instrs[1].operand {
        NativeOperand::ZeroPage(addr) => assert_eq!(addr, super::lower::FRAME_PTR, "frame pointer must stay fixed"),
        ref other => panic!("unexpected operand {other:?}"),
    }
}

fn small_linker() -> Linker {
    let mut linker = Linker::new();
    linker.add_region(id("main"), 0x0801, 0x2000, -1);
    linker.add_section(id("code"), SectionType::Data);
    linker.bind_section(id("main"), id("code"));
    linker
}

/// A conditional block whose false side is not the next block in layout
/// must assemble to a `BNE` with a correct short relative delta followed by
/// an absolute `JMP`, and the `JMP`'s target must round-trip through the
/// placed image.
#[test]
fn conditional_branch_resolves_to_correct_offsets() {
    let block0 = NativeCodeBasicBlock {
        index: 0,
        instructions: Vec::new(),
        true_jump: Some(1),
        false_jump: Some(2),
    };
    let block1 = NativeCodeBasicBlock {
        index: 1,
        instructions: vec![NativeInstruction::implied(Mnemonic::NOP), NativeInstruction::implied(Mnemonic::RTS)],
        true_jump: None,
        false_jump: None,
    };
    let block2 = NativeCodeBasicBlock {
        index: 2,
        instructions: vec![NativeInstruction::implied(Mnemonic::RTS)],
        true_jump: None,
        false_jump: None,
    };

    let native = NativeProcedure {
        ident: id("main"),
        entry_block: 0,
        blocks: vec![block0, block1, block2],
        zp_base: 0,
        zp_size: 0,
        helpers_used: Default::default(),
        trace_order: vec![0, 1, 2],
    };

    let mut linker = small_linker();
    let helpers = HelperBindings::default();
    let mut ctx = CompileContext::new();
    let object_id = assemble::assemble_procedure(&mut linker, id("code"), &native, &helpers, &mut ctx);
    assert!(!ctx.diags.has_errors());

    linker.mark_reachable(&[object_id]);
    linker.place(&mut ctx);
    let image = linker.write_image(&mut ctx);
    assert!(!ctx.diags.has_errors());

    let base = linker.object(object_id).address.unwrap() as usize;

    // [0]=BNE opcode, [1]=delta, [2]=JMP opcode, [3..5]=lo/hi of block2.
    assert_eq!(image.main[base], Mnemonic::BNE.opcode_byte(AddrMode::Relative).unwrap());
    assert_eq!(image.main[base + 1], 3, "branch target is 3 bytes past the end of the BNE's own operand");
    assert_eq!(image.main[base + 2], Mnemonic::JMP.opcode_byte(AddrMode::Absolute).unwrap());

    let lo = image.main[base + 3];
    let hi = image.main[base + 4];
    let patched = (hi as u32) << 8 | lo as u32;
    assert_eq!(patched, base as u32 + 7, "JMP must target block 2, 7 bytes into this object");
}

/// A procedure that calls a runtime helper nobody registered is a link
/// error, not a silent no-op (spec section 6).
#[test]
fn unregistered_helper_is_diagnosed() {
    let mut native = bare_native("needs_mul", 0);
    native.helpers_used.insert(id("mul16"));

    let helpers = HelperBindings::default();
    let mut ctx = CompileContext::new();
    assemble::check_helpers_registered(&native, &helpers, &mut ctx);

    assert!(ctx.diags.has_errors());
}
