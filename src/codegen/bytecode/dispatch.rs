//! Turn lowered byte-code streams into linker objects, and build the
//! 256-entry dispatch table (spec section 4.4).
//!
//! The generator tracks how many times each of the 128 core opcodes was
//! emitted (`mByteCodeUsed`); only the ones actually used get a dispatch
//! entry pointing at their routine, so an unreferenced routine is never
//! pulled into the image. Extended opcodes (128..255) are linked the same
//! way, keyed by the exact byte value rather than an aggregate count.

use crate::common::{CompileContext, DiagKind, Id, Location, Map, ObjectId};
use crate::link::{Linker, ObjectType, ReferenceFlags};

use super::lower::{ByteCodeStream, PendingRelocation};

/// Byte-code opcode usage aggregated across every procedure in the module;
/// also the source data for the `.bcs` usage-statistics output.
#[derive(Debug, Default, Clone)]
pub struct ByteCodeUsage {
    pub core_used: [u32; 128],
    pub extended_used: std::collections::BTreeSet<u8>,
}

impl ByteCodeUsage {
    pub fn merge(&mut self, stream: &ByteCodeStream) {
        for i in 0..128 {
            self.core_used[i] += stream.core_used[i];
        }
        self.extended_used.extend(stream.extended_used.iter().copied());
    }
}

/// Assemble one procedure's byte-code stream into a linker object, wiring
/// up its pending relocations (calls, globals, runtime helpers).
pub fn assemble_procedure(
    linker: &mut Linker,
    section: Id,
    ident: Id,
    stream: &ByteCodeStream,
    helpers: &Map<Id, ObjectId>,
    ctx: &mut CompileContext,
) -> ObjectId {
    let object_id = linker.add_object(ident, ObjectType::ByteCode, section);
    linker.object_mut(object_id).add_data(&stream.bytes);

    for reloc in &stream.relocations {
        let (offset, target_ident) = match reloc {
            PendingRelocation::Call { offset, target } => (*offset, *target),
            PendingRelocation::Global { offset, ident, .. } => (*offset, *ident),
            PendingRelocation::Helper { offset, ident } => (*offset, *ident),
        };
        let target = linker.find_object(target_ident).or_else(|| helpers.get(&target_ident).copied());
        match target {
            Some(t) => {
                linker
                    .object_mut(object_id)
                    .add_reference(offset, t, 0, ReferenceFlags::LOW_BYTE | ReferenceFlags::HIGH_BYTE);
            }
            None => ctx.diags.push(
                Location::synthetic(),
                DiagKind::Link,
                format!("byte-code object '{}' references unresolved symbol '{}'", ident, target_ident),
            ),
        }
    }

    object_id
}

/// Build the 256-entry dispatch table: each used opcode gets a low/high
/// reference to its routine object; unused ones are left as zero bytes and
/// never referenced, so `mark_reachable` leaves their routine unlinked.
pub fn build_dispatch_table(
    linker: &mut Linker,
    section: Id,
    ident: Id,
    usage: &ByteCodeUsage,
    routines: &Map<u8, ObjectId>,
) -> ObjectId {
    let table = linker.add_object(ident, ObjectType::Basic, section);
    linker.object_mut(table).add_space(512); // 256 entries * 2 bytes

    for op in 0u16..256 {
        let used = if op < 128 {
            usage.core_used[op as usize] > 0
        } else {
            usage.extended_used.contains(&(op as u8))
        };
        if !used {
            continue;
        }
        if let Some(&routine) = routines.get(&(op as u8)) {
            linker
                .object_mut(table)
                .add_reference(op as u32 * 2, routine, 0, ReferenceFlags::LOW_BYTE | ReferenceFlags::HIGH_BYTE);
        }
    }

    table
}
