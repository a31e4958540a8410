//! Linker objects: opaque byte blobs with relocations, grouped into a
//! section and (after placement) given an address.

use bitflags::bitflags;

use crate::common::{Id, ObjectId};
use crate::link::reference::{LinkerReference, ReferenceFlags};

/// What kind of thing an object holds (spec section 3, "Linker Object").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectType {
    None,
    Pad,
    Basic,
    ByteCode,
    NativeCode,
    Runtime,
    Data,
    Bss,
    Heap,
    Stack,
    /// Bound to its section's start address once placed.
    SectionStart,
    /// Bound to its section's end address once placed.
    SectionEnd,
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct ObjectFlags: u8 {
        const REFERENCED = 0b01;
        const PLACED     = 0b10;
    }
}

#[derive(Clone, Debug)]
pub struct LinkerObject {
    pub id: ObjectId,
    pub ident: Id,
    pub kind: ObjectType,
    pub section: Id,
    pub region: Option<Id>,
    pub address: Option<u32>,
    pub bytes: Vec<u8>,
    pub references: Vec<LinkerReference>,
    /// Dynamic per-instance offsets a `TEMPORARY`-flagged reference can add
    /// (e.g. a call site's stack-frame depth at the point of the call).
    pub temporaries: Vec<i32>,
    pub flags: ObjectFlags,
    /// `-1` for main memory, `0..63` for a cartridge bank.
    pub cartridge_bank: i32,
}

impl LinkerObject {
    pub fn new(id: ObjectId, ident: Id, kind: ObjectType, section: Id) -> Self {
        LinkerObject {
            id,
            ident,
            kind,
            section,
            region: None,
            address: None,
            bytes: Vec::new(),
            references: Vec::new(),
            temporaries: Vec::new(),
            flags: ObjectFlags::empty(),
            cartridge_bank: -1,
        }
    }

    pub fn size(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn add_data(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    /// Reserve `size` zeroed bytes (spec's `AddSpace`).
    pub fn add_space(&mut self, size: u32) {
        self.bytes.resize(self.bytes.len() + size as usize, 0);
    }

    pub fn add_reference(&mut self, offset: u32, ref_object: ObjectId, ref_offset: i32, flags: ReferenceFlags) {
        self.references.push(LinkerReference {
            object: self.id,
            offset,
            ref_object,
            ref_offset,
            flags,
        });
    }

    pub fn is_referenced(&self) -> bool {
        self.flags.contains(ObjectFlags::REFERENCED)
    }

    pub fn is_placed(&self) -> bool {
        self.flags.contains(ObjectFlags::PLACED)
    }
}
