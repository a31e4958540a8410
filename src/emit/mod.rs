//! Output writers: turn a placed, written [`crate::link::Image`] (plus the
//! [`crate::link::Linker`] it came from, and the [`crate::ir::Module`] that
//! fed the code generators) into the on-disk artifacts a build produces
//! (spec section 6).

pub mod asm;
pub mod bcs;
pub mod crt;
pub mod int;
pub mod lbl;
pub mod map;
pub mod prg;
