//! Basic blocks: maximal straight-line instruction sequences, indexed within
//! their owning procedure's block arena. Cross-block links (successors,
//! dominator) are indices, never owning references, so the CFG's cycles
//! never need `Rc`/unsafe.

use crate::common::Set;
use crate::ir::instr::Instruction;

pub type BlockId = usize;

/// Per-class data-flow sets computed by `build_dataflow` (spec 4.2 step 2).
#[derive(Clone, Debug, Default)]
pub struct FlowSets {
    pub local_required: Set<i32>,
    pub local_provided: Set<i32>,
    pub entry_required: Set<i32>,
    pub entry_provided: Set<i32>,
    pub exit_required: Set<i32>,
    pub exit_provided: Set<i32>,
}

#[derive(Clone, Debug, Default)]
pub struct BasicBlock {
    pub index: BlockId,
    pub instructions: Vec<Instruction>,
    pub true_jump: Option<BlockId>,
    pub false_jump: Option<BlockId>,
    pub dominator: Option<BlockId>,

    pub num_entries: u32,
    pub loop_head: bool,
    pub visited: bool,

    pub temps: FlowSets,
    pub locals: FlowSets,
    pub statics: FlowSets,
    pub params: FlowSets,
}

impl BasicBlock {
    pub fn new(index: BlockId) -> Self {
        BasicBlock {
            index,
            ..Default::default()
        }
    }

    pub fn append(&mut self, ins: Instruction) {
        self.instructions.push(ins);
    }

    pub fn close(&mut self, true_jump: Option<BlockId>, false_jump: Option<BlockId>) {
        self.true_jump = true_jump;
        self.false_jump = false_jump;
    }

    /// Successor blocks in CFG order (true branch first).
    pub fn successors(&self) -> impl Iterator<Item = BlockId> {
        self.true_jump.into_iter().chain(self.false_jump)
    }

    /// A block with both successors ends in a conditional branch; with only
    /// `true_jump` it ends in an unconditional jump; with neither, a return.
    pub fn is_conditional(&self) -> bool {
        self.true_jump.is_some() && self.false_jump.is_some()
    }

    pub fn is_unconditional_jump(&self) -> bool {
        self.true_jump.is_some() && self.false_jump.is_none()
    }

    pub fn is_exit(&self) -> bool {
        self.true_jump.is_none() && self.false_jump.is_none()
    }
}
