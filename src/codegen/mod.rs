//! Code generation: the native 6502 backend and the byte-code backend
//! (spec sections 4.3 and 4.4). The driver picks exactly one per build,
//! selected by `CompilerSettings::native`.

pub mod bytecode;
pub mod native;
