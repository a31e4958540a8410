//! The front end: a lexer, recursive-descent parser, and AST-to-IR
//! lowering pass for a small imperative language (assignment, `print`,
//! `read`, `if`, `while`, integer/float expressions, a single top-level
//! program). This stands in for a user's source language; the rest of the
//! pipeline only ever sees [`crate::ir::module::Module`].

pub mod ast;
pub mod lex;
pub mod lower;
pub mod parse;

#[cfg(test)]
mod tests;
