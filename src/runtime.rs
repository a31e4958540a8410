//! Runtime helper registration (spec section 6, "Runtime helper contract"):
//! every identifier a code generator may emit a call to must resolve to a
//! linker object before assembly, or linking fails with a diagnostic.
//!
//! This reimplementation does not carry hand-written 6502 microcode for the
//! arithmetic/float helpers or the byte-code opcode routines — writing and
//! verifying that microcode is out of scope here. Instead every helper and
//! every byte-code opcode routine gets a minimal placeholder object (a
//! single `RTS`) so the pipeline links and produces a real, addressable
//! image end to end; see `DESIGN.md` for this as a recorded simplification.

use crate::codegen::bytecode::opcode;
use crate::codegen::native::lower::{HelperBindings, RUNTIME_HELPERS};
use crate::common::{id, Id, Map, ObjectId};
use crate::link::{Linker, ObjectType};

const RTS: u8 = 0x60;

fn stub_object(linker: &mut Linker, ident: Id, section: Id) -> ObjectId {
    let obj = linker.add_object(ident, ObjectType::Runtime, section);
    linker.object_mut(obj).add_data(&[RTS]);
    obj
}

/// Register a placeholder native-code object for every identifier in
/// [`RUNTIME_HELPERS`], for the native backend.
pub fn register_native_helpers(linker: &mut Linker, section: Id) -> HelperBindings {
    let mut bindings = Map::new();
    for name in RUNTIME_HELPERS {
        let obj = stub_object(linker, id(*name), section);
        bindings.insert(id(*name), obj);
    }
    HelperBindings(bindings)
}

/// Register the same placeholder helpers for the byte-code backend's named
/// relocations (`mul16`, `faddsub`, `print16`, ...).
pub fn register_bytecode_helpers(linker: &mut Linker, section: Id) -> Map<Id, ObjectId> {
    let mut bindings = Map::new();
    for name in RUNTIME_HELPERS {
        let obj = stub_object(linker, id(format!("bc_helper_{name}")), section);
        bindings.insert(id(*name), obj);
    }
    bindings
}

/// Every core (0..128) and extended (128..256) byte-code opcode, by name
/// and value, in table order. Used to populate both the dispatch-table
/// routine map and the `.bcs`/`.asm` human-readable naming.
pub const ALL_OPCODES: &[(&str, u8)] = &[
    ("nop", opcode::NOP.0),
    ("const8", opcode::CONST8.0),
    ("const16", opcode::CONST16.0),
    ("load_zp8", opcode::LOAD_ZP8.0),
    ("load_zp16", opcode::LOAD_ZP16.0),
    ("store_zp8", opcode::STORE_ZP8.0),
    ("store_zp16", opcode::STORE_ZP16.0),
    ("load_global8", opcode::LOAD_GLOBAL8.0),
    ("load_global16", opcode::LOAD_GLOBAL16.0),
    ("store_global8", opcode::STORE_GLOBAL8.0),
    ("store_global16", opcode::STORE_GLOBAL16.0),
    ("load_local8", opcode::LOAD_LOCAL8.0),
    ("load_local16", opcode::LOAD_LOCAL16.0),
    ("store_local8", opcode::STORE_LOCAL8.0),
    ("store_local16", opcode::STORE_LOCAL16.0),
    ("add8", opcode::ADD8.0),
    ("add16", opcode::ADD16.0),
    ("sub8", opcode::SUB8.0),
    ("sub16", opcode::SUB16.0),
    ("and8", opcode::AND8.0),
    ("and16", opcode::AND16.0),
    ("or8", opcode::OR8.0),
    ("or16", opcode::OR16.0),
    ("xor8", opcode::XOR8.0),
    ("xor16", opcode::XOR16.0),
    ("neg8", opcode::NEG8.0),
    ("neg16", opcode::NEG16.0),
    ("not8", opcode::NOT8.0),
    ("not16", opcode::NOT16.0),
    ("shl16", opcode::SHL16.0),
    ("shr16", opcode::SHR16.0),
    ("sar16", opcode::SAR16.0),
    ("cmp_eq", opcode::CMP_EQ.0),
    ("cmp_ne", opcode::CMP_NE.0),
    ("cmp_lt_s", opcode::CMP_LT_S.0),
    ("cmp_ge_s", opcode::CMP_GE_S.0),
    ("cmp_lt_u", opcode::CMP_LT_U.0),
    ("cmp_ge_u", opcode::CMP_GE_U.0),
    ("branch", opcode::BRANCH.0),
    ("jump", opcode::JUMP.0),
    ("call", opcode::CALL.0),
    ("return", opcode::RETURN.0),
    ("return_value", opcode::RETURN_VALUE.0),
    ("push_frame", opcode::PUSH_FRAME.0),
    ("pop_frame", opcode::POP_FRAME.0),
    ("lea", opcode::LEA.0),
    ("ext8_16_u", opcode::EXT8_16_U.0),
    ("ext8_16_s", opcode::EXT8_16_S.0),
    ("mul16", opcode::MUL16.0),
    ("divs16", opcode::DIVS16.0),
    ("divu16", opcode::DIVU16.0),
    ("mods16", opcode::MODS16.0),
    ("modu16", opcode::MODU16.0),
    ("mul32", opcode::MUL32.0),
    ("divs32", opcode::DIVS32.0),
    ("divu32", opcode::DIVU32.0),
    ("mods32", opcode::MODS32.0),
    ("modu32", opcode::MODU32.0),
    ("const32", opcode::CONST32.0),
    ("load_zp32", opcode::LOAD_ZP32.0),
    ("store_zp32", opcode::STORE_ZP32.0),
    ("add32", opcode::ADD32.0),
    ("sub32", opcode::SUB32.0),
    ("ext16_32_u", opcode::EXT16_32_U.0),
    ("ext16_32_s", opcode::EXT16_32_S.0),
    ("float_add", opcode::FLOAT_ADD.0),
    ("float_sub", opcode::FLOAT_SUB.0),
    ("float_mul", opcode::FLOAT_MUL.0),
    ("float_div", opcode::FLOAT_DIV.0),
    ("float_cmp", opcode::FLOAT_CMP.0),
    ("float_to_int", opcode::FLOAT_TO_INT.0),
    ("int_to_float", opcode::INT_TO_FLOAT.0),
    ("print16", opcode::PRINT16.0),
    ("read16", opcode::READ16.0),
];

/// Register one placeholder routine object per byte-code opcode, for the
/// dispatch table the byte-code generator builds.
pub fn register_bytecode_routines(linker: &mut Linker, section: Id) -> Map<u8, ObjectId> {
    let mut routines = Map::new();
    for (name, value) in ALL_OPCODES {
        let obj = stub_object(linker, id(format!("bc_op_{name}")), section);
        routines.insert(*value, obj);
    }
    routines
}
