//! Procedures: a CFG of basic blocks plus the temporary/local/param tables.

use bitflags::bitflags;

use crate::common::{id, Id, Location, ObjectId};
use crate::ir::block::{BasicBlock, BlockId};
use crate::ir::module::Variable;
use crate::ir::types::IrType;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct ProcFlags: u16 {
        const LEAF                  = 0b0000001;
        const NATIVE_ONLY           = 0b0000010;
        const CALLS_FUNCTION_POINTER= 0b0000100;
        const HAS_DYNAMIC_STACK     = 0b0001000;
        const HAS_INLINE_ASM        = 0b0010000;
        const CALLS_BYTE_CODE       = 0b0100000;
        const FAST_CALL             = 0b1000000;
    }
}

#[derive(Debug)]
pub struct Procedure {
    pub ident: Id,
    pub location: Location,
    pub entry_block: BlockId,
    pub blocks: Vec<BasicBlock>,

    pub temporaries: Vec<IrType>,
    pub temp_sizes: Vec<u32>,
    pub temp_offsets: Vec<i32>,

    pub local_vars: Vec<Variable>,
    pub param_vars: Vec<Variable>,

    pub section: Id,
    pub linker_object: Option<ObjectId>,
    pub flags: ProcFlags,

    pub common_frame_size: i32,

    /// Extended-basic-block trace order computed by the optimizer's trace
    /// pass; used by the native generator to decide fall-through layout.
    pub trace_order: Vec<BlockId>,
}

impl Procedure {
    pub fn new(ident: impl Into<String>, location: Location) -> Self {
        let mut proc = Procedure {
            ident: id(ident),
            location,
            entry_block: 0,
            blocks: Vec::new(),
            temporaries: Vec::new(),
            temp_sizes: Vec::new(),
            temp_offsets: Vec::new(),
            local_vars: Vec::new(),
            param_vars: Vec::new(),
            section: id("code"),
            linker_object: None,
            flags: ProcFlags::LEAF,
            common_frame_size: 0,
            trace_order: Vec::new(),
        };
        proc.alloc_block();
        proc
    }

    /// Allocate a fresh block at the next arena index and append it.
    pub fn alloc_block(&mut self) -> BlockId {
        let idx = self.blocks.len();
        self.blocks.push(BasicBlock::new(idx));
        idx
    }

    pub fn add_temporary(&mut self, ty: IrType) -> i32 {
        let t = self.temporaries.len() as i32;
        self.temp_sizes.push(ty.size());
        self.temp_offsets.push(0);
        self.temporaries.push(ty);
        t
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id]
    }

    pub fn entry(&self) -> &BasicBlock {
        &self.blocks[self.entry_block]
    }

    /// Blocks reachable from the entry block, in discovery order.
    pub fn reachable_blocks(&self) -> Vec<BlockId> {
        let mut seen = vec![false; self.blocks.len()];
        let mut order = Vec::new();
        let mut stack = vec![self.entry_block];
        while let Some(b) = stack.pop() {
            if seen[b] {
                continue;
            }
            seen[b] = true;
            order.push(b);
            for s in self.blocks[b].successors() {
                if !seen[s] {
                    stack.push(s);
                }
            }
        }
        order
    }

    pub fn is_leaf(&self) -> bool {
        self.flags.contains(ProcFlags::LEAF)
    }
}
