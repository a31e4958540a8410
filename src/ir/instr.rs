//! IR instructions: opcodes, operators, and the flat per-instruction record.

use bitflags::bitflags;

use crate::common::Location;
use crate::ir::operand::Operand;

/// IR opcodes (spec section 3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    None,
    LoadTemporary,
    StoreTemporary,
    BinaryOperator,
    UnaryOperator,
    RelationalOperator,
    ConversionOperator,
    Store,
    Load,
    Lea,
    Copy,
    Strcpy,
    Typecast,
    Constant,
    Branch,
    Jump,
    PushFrame,
    PopFrame,
    Call,
    CallNative,
    ReturnValue,
    ReturnStruct,
    Return,
    Assembler,
    HostCall,
}

/// Operators used by binary/unary/relational/conversion instructions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    None,
    Add,
    Sub,
    Mul,
    DivU,
    DivS,
    ModU,
    ModS,
    Or,
    And,
    Xor,
    Neg,
    Abs,
    Floor,
    Ceil,
    Not,
    Shl,
    Shr,
    Sar,
    CmpEq,
    CmpNe,
    CmpGeS,
    CmpLeS,
    CmpGS,
    CmpLS,
    CmpGeU,
    CmpLeU,
    CmpGU,
    CmpLU,
    Float2Int,
    Int2Float,
    Ext8To16U,
    Ext8To32U,
    Ext16To32U,
    Ext8To16S,
    Ext8To32S,
    Ext16To32S,
}

impl Operator {
    pub fn is_relational(self) -> bool {
        matches!(
            self,
            Operator::CmpEq
                | Operator::CmpNe
                | Operator::CmpGeS
                | Operator::CmpLeS
                | Operator::CmpGS
                | Operator::CmpLS
                | Operator::CmpGeU
                | Operator::CmpLeU
                | Operator::CmpGU
                | Operator::CmpLU
        )
    }

    /// Evaluate this operator over two 64-bit host integers (constant
    /// folding is done in 64-bit signed host semantics, then the result is
    /// masked to the destination's operand width by the caller).
    pub fn eval_int(self, a: i64, b: i64) -> i64 {
        match self {
            Operator::Add => a.wrapping_add(b),
            Operator::Sub => a.wrapping_sub(b),
            Operator::Mul => a.wrapping_mul(b),
            Operator::DivS => {
                if b == 0 {
                    0
                } else {
                    a.wrapping_div(b)
                }
            }
            Operator::DivU => {
                if b == 0 {
                    0
                } else {
                    ((a as u64).wrapping_div(b as u64)) as i64
                }
            }
            Operator::ModS => {
                if b == 0 {
                    0
                } else {
                    a.wrapping_rem(b)
                }
            }
            Operator::ModU => {
                if b == 0 {
                    0
                } else {
                    ((a as u64).wrapping_rem(b as u64)) as i64
                }
            }
            Operator::Or => a | b,
            Operator::And => a & b,
            Operator::Xor => a ^ b,
            Operator::Shl => a.wrapping_shl(b as u32),
            Operator::Shr => ((a as u64).wrapping_shr(b as u32)) as i64,
            Operator::Sar => a.wrapping_shr(b as u32),
            Operator::CmpEq => (a == b) as i64,
            Operator::CmpNe => (a != b) as i64,
            Operator::CmpGeS => (a >= b) as i64,
            Operator::CmpLeS => (a <= b) as i64,
            Operator::CmpGS => (a > b) as i64,
            Operator::CmpLS => (a < b) as i64,
            Operator::CmpGeU => ((a as u64) >= (b as u64)) as i64,
            Operator::CmpLeU => ((a as u64) <= (b as u64)) as i64,
            Operator::CmpGU => ((a as u64) > (b as u64)) as i64,
            Operator::CmpLU => ((a as u64) < (b as u64)) as i64,
            _ => a,
        }
    }

    pub fn eval_unary(self, a: i64) -> i64 {
        match self {
            Operator::Neg => a.wrapping_neg(),
            Operator::Not => !a,
            Operator::Abs => a.wrapping_abs(),
            _ => a,
        }
    }
}

bitflags! {
    /// Per-instruction flags (spec section 3).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct InstrFlags: u8 {
        const IN_USE    = 0b001;
        const INVARIANT = 0b010;
        const VOLATILE  = 0b100;
    }
}

/// `(opcode, operator, src[0..7], dst, const, location, flags)`.
#[derive(Clone, Debug)]
pub struct Instruction {
    pub code: Opcode,
    pub op: Operator,
    pub src: Vec<Operand>,
    pub dst: Operand,
    pub konst: Operand,
    pub location: Location,
    pub flags: InstrFlags,
}

impl Instruction {
    pub fn new(location: Location, code: Opcode) -> Self {
        Instruction {
            code,
            op: Operator::None,
            src: Vec::new(),
            dst: Operand::default(),
            konst: Operand::default(),
            location,
            flags: InstrFlags::IN_USE,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self.code, Opcode::Branch)
    }

    pub fn is_jump(&self) -> bool {
        matches!(self.code, Opcode::Jump)
    }

    pub fn is_return(&self) -> bool {
        matches!(
            self.code,
            Opcode::Return | Opcode::ReturnValue | Opcode::ReturnStruct
        )
    }

    /// All temporaries this instruction reads.
    pub fn uses_temps(&self) -> impl Iterator<Item = i32> + '_ {
        self.src.iter().filter(|o| o.has_temp()).map(|o| o.temp)
    }

    /// The temporary this instruction writes, if any.
    pub fn defines_temp(&self) -> Option<i32> {
        if self.dst.has_temp() {
            Some(self.dst.temp)
        } else {
            None
        }
    }

    pub fn references_temp(&self, t: i32) -> bool {
        self.defines_temp() == Some(t) || self.uses_temps().any(|u| u == t)
    }
}
