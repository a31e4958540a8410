//! `.lbl` output: a VICE-format label file, one `al <hex-address> .<ident>`
//! line per referenced, placed object (spec section 6).

use std::fmt::Write as _;

use crate::link::Linker;

pub fn write(linker: &Linker) -> String {
    let mut out = String::new();
    for obj in &linker.objects {
        if !obj.is_referenced() || !obj.is_placed() {
            continue;
        }
        let addr = obj.address.unwrap();
        let _ = writeln!(out, "al {:04X} .{}", addr, obj.ident);
    }
    out
}
