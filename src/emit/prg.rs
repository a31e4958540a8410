//! `.prg` output: a C64 program file — a two-byte little-endian load
//! address followed by the bytes from `program_start` to `program_end`.

use crate::link::{Image, Linker};

pub fn write(linker: &Linker, image: &Image) -> Vec<u8> {
    let start = linker.program_start;
    let end = linker.program_end.max(start);
    let mut out = Vec::with_capacity(2 + (end - start) as usize);
    out.push((start & 0xFF) as u8);
    out.push((start >> 8) as u8);
    out.extend_from_slice(&image.main[start as usize..end as usize]);
    out
}
