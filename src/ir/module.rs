//! The IR module: the top-level container of procedures and globals.

use crate::common::{id, Id, ObjectId};
use crate::ir::proc::Procedure;
use crate::ir::types::IrType;

/// A global or local variable slot (spec's `InterVariable`).
#[derive(Clone, Debug)]
pub struct Variable {
    pub ident: Id,
    pub ty: IrType,
    pub size: u32,
    pub offset: i32,
    pub index: i32,
    pub used: bool,
    pub aliased: bool,
    pub linker_object: Option<ObjectId>,
}

impl Variable {
    pub fn new(ident: impl Into<String>, ty: IrType, index: i32) -> Self {
        Variable {
            ident: id(ident),
            size: ty.size(),
            ty,
            offset: 0,
            index,
            used: false,
            aliased: false,
            linker_object: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Module {
    pub procedures: Vec<Procedure>,
    pub global_vars: Vec<Variable>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_procedure(&mut self, proc: Procedure) -> usize {
        self.procedures.push(proc);
        self.procedures.len() - 1
    }

    pub fn add_global(&mut self, var: Variable) -> i32 {
        let idx = self.global_vars.len() as i32;
        self.global_vars.push(var);
        idx
    }

    pub fn find_procedure(&self, ident: Id) -> Option<&Procedure> {
        self.procedures.iter().find(|p| p.ident == ident)
    }
}
