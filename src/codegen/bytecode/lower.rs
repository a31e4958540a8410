//! Byte-code lowering: translate one IR procedure into a flat opcode
//! stream (spec section 4.4). Unlike the native generator, control flow
//! within a procedure is just an offset into the same stream — no
//! relocation needed — so jumps are patched locally; calls, globals and
//! runtime helpers still cross object boundaries and are recorded as
//! pending relocations for the caller to resolve against the linker.

use crate::common::Id;
use crate::ir::instr::{Instruction, Opcode, Operator};
use crate::ir::operand::Operand;
use crate::ir::proc::Procedure;
use crate::ir::types::MemoryClass;

use super::opcode::{self, ByteCodeOp};

/// What a byte written as a placeholder actually refers to; resolved into
/// a [`crate::link::LinkerReference`] once the containing object exists.
#[derive(Clone, Debug)]
pub enum PendingRelocation {
    Call { offset: u32, target: Id },
    Global { offset: u32, ident: Id, ref_offset: i32 },
    Helper { offset: u32, ident: Id },
}

#[derive(Debug, Default)]
pub struct ByteCodeStream {
    pub bytes: Vec<u8>,
    pub core_used: [u32; 128],
    pub extended_used: std::collections::BTreeSet<u8>,
    pub relocations: Vec<PendingRelocation>,
}

impl ByteCodeStream {
    fn push_op(&mut self, op: ByteCodeOp) {
        if op.is_extended() {
            self.extended_used.insert(op.0);
        } else {
            self.core_used[op.0 as usize] += 1;
        }
        self.bytes.push(op.0);
    }

    fn push_u8(&mut self, v: u8) {
        self.bytes.push(v);
    }

    fn push_u16(&mut self, v: u16) {
        self.bytes.push((v & 0xFF) as u8);
        self.bytes.push((v >> 8) as u8);
    }

    fn push_i32(&mut self, v: i32) {
        for i in 0..4 {
            self.bytes.push(((v as u32) >> (i * 8)) as u8);
        }
    }
}

fn core_op_for_binary(op: Operator, size: u32) -> Option<ByteCodeOp> {
    use opcode::*;
    Some(match (op, size) {
        (Operator::Add, 1) => ADD8,
        (Operator::Add, _) => ADD16,
        (Operator::Sub, 1) => SUB8,
        (Operator::Sub, _) => SUB16,
        (Operator::And, 1) => AND8,
        (Operator::And, _) => AND16,
        (Operator::Or, 1) => OR8,
        (Operator::Or, _) => OR16,
        (Operator::Xor, 1) => XOR8,
        (Operator::Xor, _) => XOR16,
        (Operator::Shl, _) => SHL16,
        (Operator::Shr, _) => SHR16,
        (Operator::Sar, _) => SAR16,
        _ => return None,
    })
}

struct Lowering<'a> {
    proc: &'a Procedure,
    proc_idents: &'a [Id],
    stream: ByteCodeStream,
}

impl<'a> Lowering<'a> {
    fn zp(&self, t: i32) -> u8 {
        self.proc.temp_offsets[t as usize] as u8
    }

    fn emit_operand(&mut self, op: &Operand) {
        if op.is_constant() {
            self.stream.push_op(opcode::CONST16);
            self.stream.push_u16(op.int_const as u16);
        } else if op.has_temp() {
            self.stream.push_op(opcode::LOAD_ZP16);
            self.stream.push_u8(self.zp(op.temp));
        } else {
            match op.memory {
                MemoryClass::Global => {
                    self.stream.push_op(opcode::LOAD_GLOBAL16);
                    let at = self.stream.bytes.len() as u32;
                    self.stream.push_u16(0);
                    self.stream.relocations.push(PendingRelocation::Global {
                        offset: at,
                        ident: crate::common::id(format!("global@{}", op.var_index)),
                        ref_offset: 0,
                    });
                }
                MemoryClass::Local | MemoryClass::Frame => {
                    self.stream.push_op(opcode::LOAD_LOCAL16);
                    let local = &self.proc.local_vars[op.var_index as usize];
                    self.stream.push_u16(local.offset as u16);
                }
                _ => {
                    self.stream.push_op(opcode::CONST16);
                    self.stream.push_u16(0);
                }
            }
        }
    }

    fn store_result(&mut self, dst: &Operand) {
        if dst.has_temp() {
            self.stream.push_op(opcode::STORE_ZP16);
            self.stream.push_u8(self.zp(dst.temp));
        }
    }

    fn lower_instruction(&mut self, ins: &Instruction, patch_sites: &mut Vec<(usize, u32)>, block_id: usize) {
        match ins.code {
            Opcode::Constant => {
                self.stream.push_op(opcode::CONST16);
                self.stream.push_u16(ins.dst.int_const as u16);
                self.store_result(&ins.dst);
            }
            Opcode::BinaryOperator => {
                let size = ins.dst.ty.size();
                self.emit_operand(&ins.src[0]);
                self.emit_operand(&ins.src[1]);
                match core_op_for_binary(ins.op, size) {
                    Some(op) => self.stream.push_op(op),
                    None => {
                        let (op, ident) = match (ins.op, size) {
                            (Operator::Mul, 4) => (opcode::MUL32, "mul32"),
                            (Operator::Mul, _) => (opcode::MUL16, "mul16"),
                            (Operator::DivS, 4) => (opcode::DIVS32, "divs32"),
                            (Operator::DivS, _) => (opcode::DIVS16, "divs16"),
                            (Operator::DivU, 4) => (opcode::DIVU32, "divu32"),
                            (Operator::DivU, _) => (opcode::DIVU16, "divu16"),
                            (Operator::ModS, 4) => (opcode::MODS32, "mods32"),
                            (Operator::ModS, _) => (opcode::MODS16, "mods16"),
                            (Operator::ModU, 4) => (opcode::MODU32, "modu32"),
                            (Operator::ModU, _) => (opcode::MODU16, "modu16"),
                            _ => (opcode::FLOAT_ADD, "faddsub"),
                        };
                        self.stream.push_op(op);
                        let at = self.stream.bytes.len() as u32;
                        self.stream.relocations.push(PendingRelocation::Helper {
                            offset: at,
                            ident: crate::common::id(ident),
                        });
                    }
                }
                self.store_result(&ins.dst);
            }
            Opcode::UnaryOperator => {
                self.emit_operand(&ins.src[0]);
                let op = match ins.op {
                    Operator::Neg => opcode::NEG16,
                    Operator::Not => opcode::NOT16,
                    _ => opcode::NOP,
                };
                self.stream.push_op(op);
                self.store_result(&ins.dst);
            }
            Opcode::RelationalOperator => {
                self.emit_operand(&ins.src[0]);
                self.emit_operand(&ins.src[1]);
                let op = match ins.op {
                    Operator::CmpEq => opcode::CMP_EQ,
                    Operator::CmpNe => opcode::CMP_NE,
                    Operator::CmpLS | Operator::CmpLU => opcode::CMP_LT_S,
                    Operator::CmpGeS | Operator::CmpGeU => opcode::CMP_GE_S,
                    _ => opcode::CMP_EQ,
                };
                self.stream.push_op(op);
                self.store_result(&ins.dst);
            }
            Opcode::ConversionOperator => {
                self.emit_operand(&ins.src[0]);
                let op = match ins.op {
                    Operator::Ext8To16U => opcode::EXT8_16_U,
                    Operator::Ext8To16S => opcode::EXT8_16_S,
                    Operator::Ext16To32U => opcode::EXT16_32_U,
                    Operator::Ext16To32S => opcode::EXT16_32_S,
                    Operator::Float2Int => opcode::FLOAT_TO_INT,
                    Operator::Int2Float => opcode::INT_TO_FLOAT,
                    _ => opcode::NOP,
                };
                self.stream.push_op(op);
                self.store_result(&ins.dst);
            }
            Opcode::Load | Opcode::Copy | Opcode::LoadTemporary | Opcode::StoreTemporary => {
                self.emit_operand(&ins.src[0]);
                self.store_result(&ins.dst);
            }
            Opcode::Store => {
                self.emit_operand(&ins.src[0]);
                match ins.dst.memory {
                    MemoryClass::Global => {
                        self.stream.push_op(opcode::STORE_GLOBAL16);
                        let at = self.stream.bytes.len() as u32;
                        self.stream.push_u16(0);
                        self.stream.relocations.push(PendingRelocation::Global {
                            offset: at,
                            ident: crate::common::id(format!("global@{}", ins.dst.var_index)),
                            ref_offset: 0,
                        });
                    }
                    MemoryClass::Local | MemoryClass::Frame => {
                        self.stream.push_op(opcode::STORE_LOCAL16);
                        let local = &self.proc.local_vars[ins.dst.var_index as usize];
                        self.stream.push_u16(local.offset as u16);
                    }
                    _ => {}
                }
            }
            Opcode::Lea => {
                self.stream.push_op(opcode::LEA);
                let local = &self.proc.local_vars[ins.src[0].var_index as usize];
                self.stream.push_u16(local.offset as u16);
                self.store_result(&ins.dst);
            }
            Opcode::Branch => {
                self.emit_operand(&ins.src[0]);
                self.stream.push_op(opcode::BRANCH);
                let target = self.proc.blocks[block_id].false_jump.unwrap_or(block_id);
                patch_sites.push((target, self.stream.bytes.len() as u32));
                self.stream.push_u16(0); // patched once block offsets are known
            }
            Opcode::Jump => {
                self.stream.push_op(opcode::JUMP);
                let target = self.proc.blocks[block_id].true_jump.unwrap_or(block_id);
                patch_sites.push((target, self.stream.bytes.len() as u32));
                self.stream.push_u16(0);
            }
            Opcode::Call | Opcode::CallNative => {
                self.stream.push_op(opcode::CALL);
                let target = self
                    .proc_idents
                    .get(ins.konst.var_index as usize)
                    .copied()
                    .unwrap_or_else(|| crate::common::id(format!("proc@{}", ins.konst.var_index)));
                let at = self.stream.bytes.len() as u32;
                self.stream.push_u16(0);
                self.stream.relocations.push(PendingRelocation::Call { offset: at, target });
                if ins.dst.has_temp() {
                    self.store_result(&ins.dst);
                }
            }
            Opcode::PushFrame => {
                self.stream.push_op(opcode::PUSH_FRAME);
                self.stream.push_u16(self.proc.common_frame_size as u16);
            }
            Opcode::PopFrame => {
                self.stream.push_op(opcode::POP_FRAME);
                self.stream.push_u16(self.proc.common_frame_size as u16);
            }
            Opcode::ReturnValue | Opcode::ReturnStruct => {
                if !ins.src.is_empty() {
                    self.emit_operand(&ins.src[0]);
                }
                self.stream.push_op(opcode::RETURN_VALUE);
            }
            Opcode::Return => self.stream.push_op(opcode::RETURN),
            Opcode::HostCall => match ins.konst.var_index {
                crate::codegen::native::lower::HOST_CALL_PRINT => {
                    self.emit_operand(&ins.src[0]);
                    self.stream.push_op(opcode::PRINT16);
                    let at = self.stream.bytes.len() as u32;
                    self.stream.relocations.push(PendingRelocation::Helper {
                        offset: at,
                        ident: crate::common::id("print16"),
                    });
                }
                crate::codegen::native::lower::HOST_CALL_READ => {
                    self.stream.push_op(opcode::READ16);
                    let at = self.stream.bytes.len() as u32;
                    self.stream.relocations.push(PendingRelocation::Helper {
                        offset: at,
                        ident: crate::common::id("read16"),
                    });
                    self.store_result(&ins.dst);
                }
                _ => {}
            },
            Opcode::Assembler | Opcode::None => {}
        }
    }
}

/// Lower `proc` to a flat byte-code stream. `proc_idents` resolves
/// `Call`/`CallNative` targets the same way the native generator does.
pub fn lower_procedure(proc: &Procedure, proc_idents: &[Id]) -> ByteCodeStream {
    let mut lowering = Lowering {
        proc,
        proc_idents,
        stream: ByteCodeStream::default(),
    };

    // Pass 1: emit bytes, recording where each block starts and where each
    // branch/jump operand needs patching.
    let mut block_start: Vec<u32> = vec![0; proc.blocks.len()];
    let mut patch_sites: Vec<(usize, u32)> = Vec::new();

    for (idx, block) in proc.blocks.iter().enumerate() {
        block_start[idx] = lowering.stream.bytes.len() as u32;
        for ins in &block.instructions {
            lowering.lower_instruction(ins, &mut patch_sites, idx);
        }
        // A conditional block's BRANCH already encoded the false-side
        // target; the true side falls through only if it is the very next
        // block in this layout, otherwise emit an explicit JUMP to it.
        if let (Some(t), Some(_)) = (block.true_jump, block.false_jump) {
            if t != idx + 1 {
                lowering.stream.push_op(opcode::JUMP);
                patch_sites.push((t, lowering.stream.bytes.len() as u32));
                lowering.stream.push_u16(0);
            }
        }
    }

    let mut stream = lowering.stream;
    for &(target_block, patch_offset) in &patch_sites {
        let target = block_start[target_block];
        stream.bytes[patch_offset as usize] = (target & 0xFF) as u8;
        stream.bytes[patch_offset as usize + 1] = (target >> 8) as u8;
    }

    stream
}
