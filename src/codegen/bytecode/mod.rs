//! The byte-code generator: used in place of [`super::native`] when native
//! code generation is disabled (spec section 4.4). Each IR procedure
//! becomes a flat stream of opcode bytes interpreted at runtime by the
//! `bcexec` routine, dispatched through a 256-entry table built once every
//! procedure has been lowered.

pub mod dispatch;
pub mod lower;
pub mod opcode;

use crate::common::{CompileContext, Id, Map, ObjectId};
use crate::ir::Module;
use crate::link::Linker;

pub use dispatch::ByteCodeUsage;

/// Run the byte-code pipeline over every procedure in `module`, emitting
/// one linker object per procedure plus the shared dispatch table.
pub fn generate(
    module: &Module,
    linker: &mut Linker,
    section: Id,
    dispatch_ident: Id,
    dispatch_section: Id,
    helpers: &Map<Id, ObjectId>,
    routines: &Map<u8, ObjectId>,
    ctx: &mut CompileContext,
) -> ObjectId {
    let proc_idents: Vec<Id> = module.procedures.iter().map(|p| p.ident).collect();
    let mut usage = ByteCodeUsage::default();

    for proc in &module.procedures {
        let stream = lower::lower_procedure(proc, &proc_idents);
        usage.merge(&stream);
        dispatch::assemble_procedure(linker, section, proc.ident, &stream, helpers, ctx);
    }

    dispatch::build_dispatch_table(linker, dispatch_section, dispatch_ident, &usage, routines)
}

#[cfg(test)]
mod tests;
