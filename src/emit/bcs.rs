//! `.bcs` output: byte-code opcode usage statistics, the same data that
//! decides which dispatch-table entries (and therefore which routines) are
//! linked into the image (spec section 6).

use std::fmt::Write as _;

use crate::codegen::bytecode::ByteCodeUsage;
use crate::runtime::ALL_OPCODES;

pub fn write(usage: &ByteCodeUsage) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "core opcodes:");
    for (name, value) in ALL_OPCODES.iter().filter(|(_, v)| *v < 128) {
        let count = usage.core_used[*value as usize];
        if count > 0 {
            let _ = writeln!(out, "  {name:<16} used {count}");
        }
    }
    let _ = writeln!(out, "extended opcodes:");
    for (name, value) in ALL_OPCODES.iter().filter(|(_, v)| *v >= 128) {
        if usage.extended_used.contains(value) {
            let _ = writeln!(out, "  {name:<16} used");
        }
    }
    out
}
