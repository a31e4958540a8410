//! `.asm` output: a disassembly of every placed `NativeCode`/`ByteCode`
//! object, with cross-object references resolved to symbol names (spec
//! section 6).

use std::fmt::Write as _;

use crate::codegen::bytecode::opcode::ByteCodeOp;
use crate::link::{Linker, LinkerObject, ObjectType};

/// A minimal reverse lookup over the 6502 opcode bytes this backend
/// actually emits (see `codegen::native::isa::Mnemonic::opcode_byte`).
fn decode_native(byte: u8) -> (&'static str, usize) {
    match byte {
        0xA9 => ("lda #$", 2),
        0xA5 => ("lda $", 2),
        0xAD => ("lda $$", 3),
        0xA2 => ("ldx #$", 2),
        0xA0 => ("ldy #$", 2),
        0x85 => ("sta $", 2),
        0x8D => ("sta $$", 3),
        0x69 => ("adc #$", 2),
        0x65 => ("adc $", 2),
        0xE9 => ("sbc #$", 2),
        0xE5 => ("sbc $", 2),
        0x29 => ("and #$", 2),
        0x25 => ("and $", 2),
        0x09 => ("ora #$", 2),
        0x05 => ("ora $", 2),
        0x49 => ("eor #$", 2),
        0x45 => ("eor $", 2),
        0xC9 => ("cmp #$", 2),
        0xC5 => ("cmp $", 2),
        0x18 => ("clc", 1),
        0x38 => ("sec", 1),
        0x20 => ("jsr $$", 3),
        0x4C => ("jmp $$", 3),
        0x60 => ("rts", 1),
        0xD0 => ("bne $", 2),
        0xF0 => ("beq $", 2),
        0xEA => ("nop", 1),
        _ => ("?byte $", 2),
    }
}

fn disassemble_native(out: &mut String, obj: &LinkerObject) {
    let mut i = 0usize;
    while i < obj.bytes.len() {
        let (mnemonic, len) = decode_native(obj.bytes[i]);
        let operand = match len {
            2 if i + 1 < obj.bytes.len() => format!("{:02X}", obj.bytes[i + 1]),
            3 if i + 2 < obj.bytes.len() => format!("{:02X}{:02X}", obj.bytes[i + 2], obj.bytes[i + 1]),
            _ => String::new(),
        };
        let _ = writeln!(out, "  {:04X}: {}{}", i, mnemonic, operand);
        i += len.max(1);
    }
}

fn bytecode_operand_len(op: u8) -> usize {
    // Mirrors codegen::bytecode::lower's emission shapes.
    match ByteCodeOp(op) {
        o if o == crate::codegen::bytecode::opcode::CONST16 => 2,
        o if o == crate::codegen::bytecode::opcode::LOAD_ZP16 || o == crate::codegen::bytecode::opcode::STORE_ZP16 => 1,
        o if o == crate::codegen::bytecode::opcode::LOAD_GLOBAL16 || o == crate::codegen::bytecode::opcode::STORE_GLOBAL16 => 2,
        o if o == crate::codegen::bytecode::opcode::LOAD_LOCAL16 || o == crate::codegen::bytecode::opcode::STORE_LOCAL16 => 2,
        o if o == crate::codegen::bytecode::opcode::BRANCH
            || o == crate::codegen::bytecode::opcode::JUMP
            || o == crate::codegen::bytecode::opcode::CALL
            || o == crate::codegen::bytecode::opcode::LEA =>
        {
            2
        }
        o if o == crate::codegen::bytecode::opcode::PUSH_FRAME || o == crate::codegen::bytecode::opcode::POP_FRAME => 2,
        _ => 0,
    }
}

fn disassemble_bytecode(out: &mut String, obj: &LinkerObject) {
    let mut i = 0usize;
    while i < obj.bytes.len() {
        let op = obj.bytes[i];
        let name = crate::runtime::ALL_OPCODES.iter().find(|&&(_, v)| v == op).map(|&(n, _)| n).unwrap_or("?op");
        let operand_len = bytecode_operand_len(op).min(obj.bytes.len().saturating_sub(i + 1));
        let operand: Vec<String> = obj.bytes[i + 1..i + 1 + operand_len].iter().map(|b| format!("{b:02X}")).collect();
        let _ = writeln!(out, "  {:04X}: {} {}", i, name, operand.join(" "));
        i += 1 + operand_len;
    }
}

pub fn write(linker: &Linker) -> String {
    let mut out = String::new();
    for obj in &linker.objects {
        if !obj.is_referenced() || !obj.is_placed() {
            continue;
        }
        match obj.kind {
            ObjectType::NativeCode => {
                let _ = writeln!(out, ".{}", obj.ident);
                disassemble_native(&mut out, obj);
            }
            ObjectType::ByteCode => {
                let _ = writeln!(out, ".{}", obj.ident);
                disassemble_bytecode(&mut out, obj);
            }
            _ => {}
        }
    }
    out
}
