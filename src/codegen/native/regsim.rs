//! Register/zero-page forwarding simulation (spec section 4.3:
//! `NativeRegisterDataSet`, "261 modeled cells").
//!
//! The simulator tracks what value or address each of `A`, `X`, `Y` and the
//! 256 zero-page bytes is currently known to hold, so the peephole pass can
//! drop a load/store that would only reproduce a value already sitting
//! where it's needed. It never executes anything; it just propagates the
//! same "known value" fact an assembler-level optimizer would track by eye.

use crate::common::Id;

use super::isa::{AddrMode, Mnemonic, NativeInstruction, NativeOperand};

/// What a single cell (a register or a zero-page byte) is known to hold.
#[derive(Clone, Debug)]
pub enum CellMode {
    /// Nothing known; any use must reload.
    Unknown,
    /// A literal byte value.
    Immediate(u8),
    /// The low or high byte of a symbol's address plus a constant offset,
    /// as written by a `LDA #<sym` / `LDA #>sym` pair.
    ImmediateAddress(Id, i32, bool),
    /// A mirror of another zero-page cell (set by a `STA`/`LDA` pair between
    /// two zero-page locations).
    ZeroPage(u8),
    /// A mirror of an absolute (non-zero-page) memory location.
    Absolute(Id, i32),
}

#[derive(Clone, Debug)]
pub struct NativeRegisterDataSet {
    pub a: CellMode,
    pub x: CellMode,
    pub y: CellMode,
    pub carry: Option<bool>,
    pub zp: Vec<CellMode>,
}

impl Default for NativeRegisterDataSet {
    fn default() -> Self {
        NativeRegisterDataSet {
            a: CellMode::Unknown,
            x: CellMode::Unknown,
            y: CellMode::Unknown,
            carry: None,
            zp: vec![CellMode::Unknown; 256],
        }
    }
}

impl NativeRegisterDataSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything; used at block entry (forwarding never crosses a
    /// block boundary here, mirroring the source's conservative join) and
    /// after any instruction whose full effect isn't modeled below (a call,
    /// for instance, clobbers all of it).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn invalidate_mirrors_of_zero_page(&mut self, addr: u8) {
        if let CellMode::ZeroPage(a) = self.a {
            if a == addr {
                self.a = CellMode::Unknown;
            }
        }
        if let CellMode::ZeroPage(x) = self.x {
            if x == addr {
                self.x = CellMode::Unknown;
            }
        }
        if let CellMode::ZeroPage(y) = self.y {
            if y == addr {
                self.y = CellMode::Unknown;
            }
        }
        for cell in self.zp.iter_mut() {
            if let CellMode::ZeroPage(a) = cell {
                if *a == addr {
                    *cell = CellMode::Unknown;
                }
            }
        }
    }

    /// `true` if `ins` is provably redundant given the current state (its
    /// effect would be a no-op), so the peephole pass can drop it outright.
    pub fn is_redundant(&self, ins: &NativeInstruction) -> bool {
        match (ins.mnemonic, ins.mode, &ins.operand) {
            (Mnemonic::LDA, AddrMode::Immediate, NativeOperand::Immediate(v)) => self.a == CellMode::Immediate(*v),
            (Mnemonic::LDA, AddrMode::ZeroPage, NativeOperand::ZeroPage(addr)) => {
                self.a == CellMode::ZeroPage(*addr) || self.zp[*addr as usize] == self.a && self.a != CellMode::Unknown
            }
            (Mnemonic::LDX, AddrMode::Immediate, NativeOperand::Immediate(v)) => self.x == CellMode::Immediate(*v),
            (Mnemonic::LDY, AddrMode::Immediate, NativeOperand::Immediate(v)) => self.y == CellMode::Immediate(*v),
            (Mnemonic::STA, AddrMode::ZeroPage, NativeOperand::ZeroPage(addr)) => self.zp[*addr as usize] == self.a && self.a != CellMode::Unknown,
            _ => false,
        }
    }

    /// Update the simulated state to reflect `ins` having executed. Call
    /// this regardless of whether [`is_redundant`] said to drop it — a
    /// dropped instruction's effect already holds, a kept one just made it
    /// true.
    pub fn apply(&mut self, ins: &NativeInstruction) {
        match (ins.mnemonic, ins.mode, &ins.operand) {
            (Mnemonic::LDA, AddrMode::Immediate, NativeOperand::Immediate(v)) => self.a = CellMode::Immediate(*v),
            (Mnemonic::LDX, AddrMode::Immediate, NativeOperand::Immediate(v)) => self.x = CellMode::Immediate(*v),
            (Mnemonic::LDY, AddrMode::Immediate, NativeOperand::Immediate(v)) => self.y = CellMode::Immediate(*v),
            (Mnemonic::LDA, AddrMode::ZeroPage, NativeOperand::ZeroPage(addr)) => {
                self.a = self.zp[*addr as usize].clone();
                if self.a == CellMode::Unknown {
                    self.a = CellMode::ZeroPage(*addr);
                }
            }
            (Mnemonic::LDX, AddrMode::ZeroPage, NativeOperand::ZeroPage(addr)) => self.x = CellMode::ZeroPage(*addr),
            (Mnemonic::LDY, AddrMode::ZeroPage, NativeOperand::ZeroPage(addr)) => self.y = CellMode::ZeroPage(*addr),
            (Mnemonic::STA, AddrMode::ZeroPage, NativeOperand::ZeroPage(addr)) => {
                self.invalidate_mirrors_of_zero_page(*addr);
                self.zp[*addr as usize] = if self.a == CellMode::Unknown {
                    CellMode::ZeroPage(*addr)
                } else {
                    self.a.clone()
                };
            }
            (Mnemonic::STX, AddrMode::ZeroPage, NativeOperand::ZeroPage(addr)) => {
                self.invalidate_mirrors_of_zero_page(*addr);
                self.zp[*addr as usize] = self.x.clone();
            }
            (Mnemonic::STY, AddrMode::ZeroPage, NativeOperand::ZeroPage(addr)) => {
                self.invalidate_mirrors_of_zero_page(*addr);
                self.zp[*addr as usize] = self.y.clone();
            }
            (Mnemonic::TAX, ..) => self.x = self.a.clone(),
            (Mnemonic::TAY, ..) => self.y = self.a.clone(),
            (Mnemonic::TXA, ..) => self.a = self.x.clone(),
            (Mnemonic::TYA, ..) => self.a = self.y.clone(),
            (Mnemonic::JSR, ..) | (Mnemonic::JMP, ..) => self.reset(),
            (m, ..) if m.clobbers_carry() => {
                self.carry = None;
                self.a = CellMode::Unknown;
            }
            _ => {
                // Any other mnemonic that writes A/X/Y without a case above
                // is conservatively treated as clobbering it.
                match ins.mnemonic {
                    Mnemonic::ADC | Mnemonic::SBC | Mnemonic::AND | Mnemonic::ORA | Mnemonic::EOR => self.a = CellMode::Unknown,
                    Mnemonic::INX | Mnemonic::DEX => self.x = CellMode::Unknown,
                    Mnemonic::INY | Mnemonic::DEY => self.y = CellMode::Unknown,
                    _ => {}
                }
            }
        }
    }
}

impl PartialEq for CellMode {
    fn eq(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (CellMode::Unknown, CellMode::Unknown)
        ) || match (self, other) {
            (CellMode::Immediate(a), CellMode::Immediate(b)) => a == b,
            (CellMode::ImmediateAddress(ia, oa, ha), CellMode::ImmediateAddress(ib, ob, hb)) => ia == ib && oa == ob && ha == hb,
            (CellMode::ZeroPage(a), CellMode::ZeroPage(b)) => a == b,
            (CellMode::Absolute(ia, oa), CellMode::Absolute(ib, ob)) => ia == ib && oa == ob,
            _ => false,
        }
    }
}
