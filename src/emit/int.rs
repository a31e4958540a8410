//! `.int` output: a textual disassembly of the final (post-optimization)
//! IR module, one procedure and block at a time (spec section 6).

use std::fmt::Write as _;

use crate::ir::module::Module;
use crate::ir::operand::Operand;
use crate::ir::types::MemoryClass;

fn fmt_operand(op: &Operand) -> String {
    if op.is_constant() {
        match op.ty {
            crate::ir::types::IrType::Float => format!("{}", op.float_const),
            _ => format!("{}", op.int_const),
        }
    } else if op.has_temp() {
        format!("t{}", op.temp)
    } else {
        match op.memory {
            MemoryClass::Global => format!("global[{}]", op.var_index),
            MemoryClass::Local | MemoryClass::Frame => format!("local[{}]", op.var_index),
            MemoryClass::Param => format!("param[{}]", op.var_index),
            other => format!("{other:?}[{}]", op.var_index),
        }
    }
}

pub fn write(module: &Module) -> String {
    let mut out = String::new();
    for proc in &module.procedures {
        let _ = writeln!(out, "proc {} (entry block{})", proc.ident, proc.entry_block);
        for block in &proc.blocks {
            let _ = writeln!(out, "  block{}:", block.index);
            for ins in &block.instructions {
                let dst = if ins.dst.has_temp() { format!("t{} = ", ins.dst.temp) } else { String::new() };
                let srcs: Vec<String> = ins.src.iter().map(fmt_operand).collect();
                let _ = writeln!(out, "    {}{:?} {:?} {}", dst, ins.code, ins.op, srcs.join(", "));
            }
            match (block.true_jump, block.false_jump) {
                (Some(t), Some(f)) => {
                    let _ = writeln!(out, "    -> block{} / block{}", t, f);
                }
                (Some(t), None) => {
                    let _ = writeln!(out, "    -> block{}", t);
                }
                (None, _) => {
                    let _ = writeln!(out, "    -> exit");
                }
            }
        }
    }
    out
}
