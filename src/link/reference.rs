//! Linker references: deferred one-or-two-byte patches of an object's bytes
//! that name another object's eventual address.

use bitflags::bitflags;

use crate::common::ObjectId;

bitflags! {
    /// Which bytes of the referenced address to write, and how.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct ReferenceFlags: u8 {
        const LOW_BYTE  = 0b001;
        const HIGH_BYTE = 0b010;
        /// Add `object.temporaries[ref_offset]` into the written byte(s) —
        /// used for per-call-site stack-frame offsets baked into immediates.
        const TEMPORARY = 0b100;
    }
}

/// `(object, offset-in-object, ref-object, ref-offset, flags)` (spec
/// section 3, "Linker Reference").
#[derive(Clone, Copy, Debug)]
pub struct LinkerReference {
    pub object: ObjectId,
    pub offset: u32,
    pub ref_object: ObjectId,
    pub ref_offset: i32,
    pub flags: ReferenceFlags,
}
