//! Linker unit tests (spec section 8, properties 4 and 5).

use crate::common::{id, CompileContext};
use crate::link::linker::Linker;
use crate::link::object::ObjectType;
use crate::link::reference::ReferenceFlags;
use crate::link::section::SectionType;

fn small_linker() -> Linker {
    let mut linker = Linker::new();
    linker.add_region(id("main"), 0x0801, 0x1000, -1);
    linker.add_section(id("code"), SectionType::Data);
    linker.bind_section(id("main"), id("code"));
    linker
}

/// Placed objects in the same region must never overlap.
#[test]
fn placement_is_disjoint() {
    let mut linker = small_linker();
    let a = linker.add_object(id("a"), ObjectType::Basic, id("code"));
    linker.object_mut(a).add_data(&[1, 2, 3, 4]);
    let b = linker.add_object(id("b"), ObjectType::Basic, id("code"));
    linker.object_mut(b).add_data(&[5, 6]);
    let c = linker.add_object(id("c"), ObjectType::Basic, id("code"));
    linker.object_mut(c).add_data(&[7, 8, 9]);

    linker.mark_reachable(&[a, b, c]);
    let mut ctx = CompileContext::new();
    linker.place(&mut ctx);

    let addr_a = linker.object(a).address.unwrap();
    let addr_b = linker.object(b).address.unwrap();
    let addr_c = linker.object(c).address.unwrap();

    let ranges = [
        (addr_a, addr_a + linker.object(a).size()),
        (addr_b, addr_b + linker.object(b).size()),
        (addr_c, addr_c + linker.object(c).size()),
    ];
    for i in 0..ranges.len() {
        for j in (i + 1)..ranges.len() {
            let disjoint = ranges[i].1 <= ranges[j].0 || ranges[j].1 <= ranges[i].0;
            assert!(disjoint, "ranges {:?} and {:?} overlap", ranges[i], ranges[j]);
        }
    }
}

/// A low/high byte relocation must read back as the referenced object's
/// placed address after image write.
#[test]
fn relocation_round_trips_through_the_image() {
    let mut linker = small_linker();
    let target = linker.add_object(id("target"), ObjectType::Basic, id("code"));
    linker.object_mut(target).add_data(&[0xEA]); // single NOP byte, arbitrary payload

    let caller = linker.add_object(id("caller"), ObjectType::Basic, id("code"));
    linker.object_mut(caller).add_data(&[0x4C, 0x00, 0x00]); // JMP $0000 (patched below)
    linker.object_mut(caller).add_reference(1, target, 0, ReferenceFlags::LOW_BYTE);
    linker.object_mut(caller).add_reference(2, target, 0, ReferenceFlags::HIGH_BYTE);

    linker.mark_reachable(&[caller]);
    let mut ctx = CompileContext::new();
    linker.place(&mut ctx);
    let image = linker.write_image(&mut ctx);

    let target_addr = linker.object(target).address.unwrap();
    let caller_addr = linker.object(caller).address.unwrap() as usize;

    let lo = image.main[caller_addr + 1];
    let hi = image.main[caller_addr + 2];
    let patched = (hi as u32) << 8 | lo as u32;
    assert_eq!(patched, target_addr);
    assert!(!ctx.diags.has_errors());
}

/// A referenced object with no room left in its region is reported, not
/// silently dropped (spec section 9's open question, resolved).
#[test]
fn unplaceable_referenced_object_is_diagnosed() {
    let mut linker = Linker::new();
    linker.add_region(id("tiny"), 0x0801, 0x0803, -1);
    linker.add_section(id("code"), SectionType::Data);
    linker.bind_section(id("tiny"), id("code"));

    let big = linker.add_object(id("big"), ObjectType::Basic, id("code"));
    linker.object_mut(big).add_data(&[0, 1, 2, 3, 4, 5, 6, 7]);

    linker.mark_reachable(&[big]);
    let mut ctx = CompileContext::new();
    linker.place(&mut ctx);

    assert!(!linker.object(big).is_placed());
    assert!(ctx.diags.has_errors());
}
