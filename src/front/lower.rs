//! AST-to-IR lowering: walks [`super::ast::Program`] and builds a single
//! `main` [`crate::ir::proc::Procedure`] inside a fresh
//! [`crate::ir::module::Module`].
//!
//! Type inference is deliberately minimal (spec section 1's front end is
//! "intentionally thin"): every variable is `Int16` unless some literal
//! assigned to it anywhere in the program is a float literal, in which case
//! it is `Float` for the whole program. `print`/`read` only ever operate on
//! `Int16` values, matching the `print16`/`read16` runtime helpers.

use crate::codegen::native::lower::{HOST_CALL_PRINT, HOST_CALL_READ};
use crate::common::{id, Id, Location, Map};
use crate::front::ast::{BinOp, Expr, Program, Stmt};
use crate::ir::instr::{Instruction, Opcode, Operator};
use crate::ir::module::{Module, Variable};
use crate::ir::operand::Operand;
use crate::ir::proc::Procedure;
use crate::ir::types::IrType;

fn infer_types(program: &Program) -> Map<Id, IrType> {
    let mut types = Map::new();
    fn visit(stmts: &[Stmt], types: &mut Map<Id, IrType>) {
        for stmt in stmts {
            match stmt {
                Stmt::Assign(name, expr) => {
                    let ty = if expr.has_float_literal() { IrType::Float } else { IrType::Int16 };
                    let entry = types.entry(*name).or_insert(ty);
                    if ty == IrType::Float {
                        *entry = IrType::Float;
                    }
                }
                Stmt::Read(name) => {
                    types.entry(*name).or_insert(IrType::Int16);
                }
                Stmt::Print(_) => {}
                Stmt::If { then, els, .. } => {
                    visit(then, types);
                    visit(els, types);
                }
                Stmt::While { body, .. } => visit(body, types),
            }
        }
    }
    visit(&program.stmts, &mut types);
    types
}

struct Lowering<'a> {
    proc: Procedure,
    cur: usize,
    var_index: Map<Id, i32>,
    var_types: &'a Map<Id, IrType>,
    module: &'a mut Module,
}

impl<'a> Lowering<'a> {
    fn loc(&self) -> Location {
        self.proc.location
    }

    fn var_operand(&mut self, name: Id) -> Operand {
        let ty = *self.var_types.get(&name).unwrap_or(&IrType::Int16);
        let idx = if let Some(&idx) = self.var_index.get(&name) {
            idx
        } else {
            let idx = self.module.add_global(Variable::new(name.to_string(), ty, 0));
            self.module.global_vars[idx as usize].index = idx;
            self.var_index.insert(name, idx);
            idx
        };
        Operand::global(idx, ty)
    }

    fn append(&mut self, ins: Instruction) {
        self.proc.block_mut(self.cur).append(ins);
    }

    fn jump_to(&mut self, target: usize) {
        self.append(Instruction::new(self.loc(), Opcode::Jump));
        self.proc.block_mut(self.cur).close(Some(target), None);
    }

    /// Lower an expression to an operand usable directly as another
    /// instruction's source (a constant, or a freshly loaded temporary).
    fn lower_expr(&mut self, expr: &Expr) -> Operand {
        match expr {
            Expr::Int(v) => Operand::int_const(IrType::Int16, *v),
            Expr::Float(v) => Operand::float_const(*v),
            Expr::Var(name) => {
                let src = self.var_operand(*name);
                let t = self.proc.add_temporary(src.ty);
                let dst = Operand::temp(t, src.ty);
                let mut ins = Instruction::new(self.loc(), Opcode::Load);
                ins.src = vec![src];
                ins.dst = dst.clone();
                self.append(ins);
                dst
            }
            Expr::Neg(inner) => {
                let src = self.lower_expr(inner);
                let t = self.proc.add_temporary(src.ty);
                let dst = Operand::temp(t, src.ty);
                let mut ins = Instruction::new(self.loc(), Opcode::UnaryOperator);
                ins.op = Operator::Neg;
                ins.src = vec![src];
                ins.dst = dst.clone();
                self.append(ins);
                dst
            }
            Expr::Bin(op, lhs, rhs) => {
                let l = self.lower_expr(lhs);
                let r = self.lower_expr(rhs);
                let operand_ty = if l.ty == IrType::Float || r.ty == IrType::Float { IrType::Float } else { IrType::Int16 };
                let dst_ty = if op.is_relational() { IrType::Bool } else { operand_ty };
                let t = self.proc.add_temporary(dst_ty);
                let dst = Operand::temp(t, dst_ty);
                let code = if op.is_relational() { Opcode::RelationalOperator } else { Opcode::BinaryOperator };
                let operator = match op {
                    BinOp::Add => Operator::Add,
                    BinOp::Sub => Operator::Sub,
                    BinOp::Mul => Operator::Mul,
                    BinOp::Div => Operator::DivS,
                    BinOp::Lt => Operator::CmpLS,
                    BinOp::Le => Operator::CmpLeS,
                    BinOp::Gt => Operator::CmpGS,
                    BinOp::Ge => Operator::CmpGeS,
                    BinOp::Eq => Operator::CmpEq,
                    BinOp::Ne => Operator::CmpNe,
                };
                let mut ins = Instruction::new(self.loc(), code);
                ins.op = operator;
                ins.src = vec![l, r];
                ins.dst = dst.clone();
                self.append(ins);
                dst
            }
        }
    }

    fn lower_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.lower_stmt(stmt);
        }
    }

    fn lower_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assign(name, expr) => {
                let value = self.lower_expr(expr);
                let dst = self.var_operand(*name);
                let mut ins = Instruction::new(self.loc(), Opcode::Store);
                ins.src = vec![value];
                ins.dst = dst;
                self.append(ins);
            }
            Stmt::Print(expr) => {
                let value = self.lower_expr(expr);
                let mut ins = Instruction::new(self.loc(), Opcode::HostCall);
                ins.src = vec![value];
                ins.konst.var_index = HOST_CALL_PRINT;
                self.append(ins);
            }
            Stmt::Read(name) => {
                let t = self.proc.add_temporary(IrType::Int16);
                let mut ins = Instruction::new(self.loc(), Opcode::HostCall);
                ins.dst = Operand::temp(t, IrType::Int16);
                ins.konst.var_index = HOST_CALL_READ;
                self.append(ins);

                let dst = self.var_operand(*name);
                let mut store = Instruction::new(self.loc(), Opcode::Store);
                store.src = vec![Operand::temp(t, IrType::Int16)];
                store.dst = dst;
                self.append(store);
            }
            Stmt::If { cond, then, els } => {
                let cond_operand = self.lower_expr(cond);
                let cond_block = self.cur;
                let mut branch = Instruction::new(self.loc(), Opcode::Branch);
                branch.src = vec![cond_operand];
                self.append(branch);

                let then_block = self.proc.alloc_block();
                let merge_block = self.proc.alloc_block();

                if els.is_empty() {
                    self.proc.block_mut(cond_block).close(Some(then_block), Some(merge_block));
                } else {
                    let else_block = self.proc.alloc_block();
                    self.proc.block_mut(cond_block).close(Some(then_block), Some(else_block));

                    self.cur = else_block;
                    self.lower_stmts(els);
                    self.jump_to(merge_block);
                }

                self.cur = then_block;
                self.lower_stmts(then);
                self.jump_to(merge_block);

                self.cur = merge_block;
            }
            Stmt::While { cond, body } => {
                let header = self.proc.alloc_block();
                self.jump_to(header);

                self.cur = header;
                let cond_operand = self.lower_expr(cond);
                let mut branch = Instruction::new(self.loc(), Opcode::Branch);
                branch.src = vec![cond_operand];
                self.append(branch);

                let body_block = self.proc.alloc_block();
                let exit_block = self.proc.alloc_block();
                self.proc.block_mut(header).close(Some(body_block), Some(exit_block));

                self.cur = body_block;
                self.lower_stmts(body);
                self.jump_to(header);

                self.cur = exit_block;
            }
        }
    }
}

/// Lower a parsed program into an IR module with a single `main` procedure.
pub fn lower_program(program: &Program, file: impl Into<String>) -> Module {
    let location = Location::new(id(file.into()), 0);
    let var_types = infer_types(program);
    let mut module = Module::new();

    let proc = Procedure::new("main", location);
    let proc = {
        let mut lowering = Lowering {
            proc,
            cur: 0,
            var_index: Map::new(),
            var_types: &var_types,
            module: &mut module,
        };
        lowering.lower_stmts(&program.stmts);
        lowering.append(Instruction::new(location, Opcode::Return));
        lowering.proc
    };

    module.add_procedure(proc);
    module
}
