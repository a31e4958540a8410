//! `.map` output: a human-readable listing of every region, the sections
//! bound to it, and each section's placed objects with their hex address
//! ranges (spec section 6).

use std::fmt::Write as _;

use crate::link::Linker;

pub fn write(linker: &Linker) -> String {
    let mut out = String::new();
    for region in &linker.regions {
        let _ = writeln!(out, "region {:<16} ${:04X}..${:04X} bank {}", region.ident, region.start, region.end, region.cartridge_bank);
        for section_ident in &region.sections {
            let Some(section) = linker.sections.get(section_ident) else { continue };
            let _ = writeln!(out, "  section {:<14} {:?} ${:04X}..${:04X}", section.ident, section.kind, section.start, section.end);
            for &oid in &section.objects {
                let obj = linker.object(oid);
                if !obj.is_placed() {
                    continue;
                }
                let addr = obj.address.unwrap_or(0);
                let _ = writeln!(out, "    ${:04X}..${:04X} {:<8?} .{}", addr, addr + obj.size(), obj.kind, obj.ident);
            }
        }
    }
    out
}
