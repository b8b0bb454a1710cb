//! Instruction tree shared by the emitter and the interpreter.
//!
//! Nodes live in one arena owned by [`Program`] and link to each other by
//! [`NodeId`]: `body` points at the first statement of a nested block and
//! `next` at the following statement of the same block. Links are only ever
//! set to freshly allocated nodes, so every node has exactly one owner.

use std::ops::{Index, IndexMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    SetConstant,
    CopyVariable,
    Add,
    SubtractSaturating,
    Multiply,
    DivideInteger,
    Modulo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl Relation {
    pub fn holds(self, left: u64, right: u64) -> bool {
        match self {
            Relation::Equal => left == right,
            Relation::NotEqual => left != right,
            Relation::Greater => left > right,
            Relation::GreaterOrEqual => left >= right,
            Relation::Less => left < right,
            Relation::LessOrEqual => left <= right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    /// Placeholder allocated ahead of parsing the statement that fills it.
    Unfilled,
    Assignment(AssignOp),
    BoundedLoop,
    ConditionalLoop(Relation),
    IfBranchStart(Relation),
    IfBranchElse,
}

impl InstructionKind {
    pub fn is_block_opener(self) -> bool {
        matches!(
            self,
            InstructionKind::BoundedLoop
                | InstructionKind::ConditionalLoop(_)
                | InstructionKind::IfBranchStart(_)
                | InstructionKind::IfBranchElse
        )
    }
}

/// Right-hand operand of a binary assignment or relational test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Constant(u64),
    Variable(u64),
}

impl Default for Operand {
    fn default() -> Self {
        Operand::Constant(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub kind: InstructionKind,
    /// Variable written by an assignment, or bounded/tested by a block opener.
    pub target: u64,
    /// Left operand variable of a binary assignment, or the copied variable.
    pub source: u64,
    pub operand: Operand,
    pub body: Option<NodeId>,
    pub next: Option<NodeId>,
}

impl Instruction {
    pub fn unfilled() -> Self {
        Self {
            kind: InstructionKind::Unfilled,
            target: 0,
            source: 0,
            operand: Operand::default(),
            body: None,
            next: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    nodes: Vec<Instruction>,
    /// Highest `x<n>` index referenced anywhere in the source.
    pub highest_index: u64,
}

impl Program {
    /// Creates a program holding a single unfilled root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Instruction::unfilled()],
            highest_index: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Instruction> {
        self.nodes.iter()
    }

    /// Allocates a fresh placeholder as the body of `parent`.
    pub fn open_body(&mut self, parent: NodeId) -> NodeId {
        let child = self.alloc();
        self[parent].body = Some(child);
        child
    }

    /// Allocates a fresh placeholder as the statement following `previous`.
    pub fn append_next(&mut self, previous: NodeId) -> NodeId {
        let next = self.alloc();
        self[previous].next = Some(next);
        next
    }

    pub fn note_index(&mut self, index: u64) {
        self.highest_index = self.highest_index.max(index);
    }

    fn alloc(&mut self) -> NodeId {
        self.nodes.push(Instruction::unfilled());
        NodeId(self.nodes.len() - 1)
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<NodeId> for Program {
    type Output = Instruction;

    fn index(&self, id: NodeId) -> &Instruction {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for Program {
    fn index_mut(&mut self, id: NodeId) -> &mut Instruction {
        &mut self.nodes[id.0]
    }
}
