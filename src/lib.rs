//! This is the compiler as a library. See `src/bin` directory for the
//! executable program using this library.

// Because this is a library, allow dead code to make in-class exercises easier
// to develop.
#![allow(dead_code)]

pub mod codegen;
pub mod common;
pub mod emit;
pub mod front;
pub mod ir;
pub mod link;
pub mod runtime;
