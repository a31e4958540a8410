//! The native 6502 code generator: IR procedures in, 6502 machine code
//! (as linker objects + relocations) out (spec section 4.3).
//!
//! Pipeline: [`lower::lower_procedure`] walks the IR and emits a mirrored
//! CFG of [`isa::NativeInstruction`]s addressing zero page relative to the
//! procedure; [`peephole::run`] drops instructions the forwarding
//! simulator in [`regsim`] proves redundant; [`globalreg::promote`]
//! optionally hoists one hot temporary into `X`; [`zeropage::remap`] gives
//! every procedure its real window in the shared zero page; finally
//! [`assemble::assemble_procedure`] resolves control flow and emits bytes
//! and relocations into the linker.

pub mod assemble;
pub mod globalreg;
pub mod isa;
pub mod lower;
pub mod peephole;
pub mod regsim;
pub mod zeropage;

use crate::common::{CompileContext, Id, Map, Set};
use crate::ir::Module;
use crate::link::Linker;

use lower::{HelperBindings, NativeProcedure};

/// Derive the static call graph (ident -> idents it calls) by scanning
/// every procedure's `Opcode::Call`/`Opcode::CallNative` instructions. Used
/// by [`zeropage::remap`] to decide which procedures may share zero page.
pub fn build_call_graph(module: &Module) -> Map<Id, Set<Id>> {
    let proc_idents: Vec<Id> = module.procedures.iter().map(|p| p.ident).collect();
    let mut graph = Map::new();
    for proc in &module.procedures {
        let mut callees = Set::new();
        for block in &proc.blocks {
            for ins in &block.instructions {
                if matches!(ins.code, crate::ir::Opcode::Call | crate::ir::Opcode::CallNative) {
                    if let Some(&target) = proc_idents.get(ins.konst.var_index as usize) {
                        callees.insert(target);
                    }
                }
            }
        }
        graph.insert(proc.ident, callees);
    }
    graph
}

/// Run the full native pipeline over every procedure in `module`, emitting
/// one linker object per procedure into `section`.
pub fn generate(
    module: &mut Module,
    linker: &mut Linker,
    section: Id,
    helpers: &HelperBindings,
    ctx: &mut CompileContext,
) -> Vec<NativeProcedure> {
    let call_graph = build_call_graph(module);
    let proc_idents: Vec<Id> = module.procedures.iter().map(|p| p.ident).collect();

    let mut natives: Vec<NativeProcedure> = module
        .procedures
        .iter_mut()
        .map(|proc| lower::lower_procedure(proc, &proc_idents))
        .collect();

    for native in natives.iter_mut() {
        peephole::run(&mut native.blocks);
        globalreg::promote(native);
    }

    zeropage::remap(&mut natives, &call_graph);

    for native in &natives {
        assemble::check_helpers_registered(native, helpers, ctx);
        assemble::assemble_procedure(linker, section, native, helpers, ctx);
    }

    natives
}

#[cfg(test)]
mod tests;
