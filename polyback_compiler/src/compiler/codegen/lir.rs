use crate::compiler::common::{expr::*, types::*};
use std::fmt::Display;

pub type Slot = usize;
pub type LabelId = usize;

/// Where an array lives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Storage {
    Local(Slot),
    Global(String),
}
impl Display for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Storage::Local(slot) => write!(f, "%{}", slot),
            Storage::Global(name) => write!(f, "@{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    /// Entry name of a routine in the module
    Routine(String),
    /// Routine provided by the run-time library
    Runtime(String),
}
impl Display for CallTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallTarget::Routine(name) => write!(f, "{}", name),
            CallTarget::Runtime(name) => write!(f, "[{}]", name),
        }
    }
}

// Instructions of a stack machine. Every routine has a frame of numbered slots, parameters
// occupy the first slots. Binary operators pop the right operand first.
#[derive(Debug, Clone, PartialEq)]
pub enum Lir {
    LoadConst(Literal),
    LoadLocal(Slot),
    Store(Slot),
    LoadGlobal(String),
    StoreGlobal(String),

    // array, rank: pops rank subscripts
    LoadElement(Storage, usize),
    // array, rank: pops the value then rank subscripts
    StoreElement(Storage, usize),
    // array, dimension: traps if the subscript on top of the stack is out of range
    CheckBounds(Storage, usize),
    // array, element type, rank: pops rank extents
    AllocArray(Storage, BaseType, usize),

    // operator, operand type
    Binary(BinaryOp, BaseType),
    Unary(UnaryOp, BaseType),
    Convert(Promotion),

    // target, number of arguments, if a value is returned
    Call(CallTarget, usize, bool),

    Dup,
    Pop,

    Label(LabelId),
    Branch(LabelId),
    // branches if the popped boolean equals the flag
    BranchIf(bool, LabelId),
    Return(bool),
}

impl Lir {
    /// Number of values popped and pushed
    pub fn stack_effect(&self) -> (usize, usize) {
        match self {
            Lir::LoadConst(_) | Lir::LoadLocal(_) | Lir::LoadGlobal(_) => (0, 1),
            Lir::Store(_) | Lir::StoreGlobal(_) | Lir::Pop => (1, 0),
            Lir::LoadElement(_, rank) => (*rank, 1),
            Lir::StoreElement(_, rank) => (rank + 1, 0),
            Lir::CheckBounds(..) | Lir::Label(_) | Lir::Branch(_) => (0, 0),
            Lir::AllocArray(_, _, rank) => (*rank, 0),
            Lir::Binary(..) => (2, 1),
            Lir::Unary(..) | Lir::Convert(_) => (1, 1),
            Lir::Call(_, argc, returns) => (*argc, *returns as usize),
            Lir::Dup => (1, 2),
            Lir::BranchIf(..) => (1, 0),
            Lir::Return(value) => (*value as usize, 0),
        }
    }

    pub fn slot(&self) -> Option<Slot> {
        match self {
            Lir::LoadLocal(slot)
            | Lir::Store(slot)
            | Lir::LoadElement(Storage::Local(slot), _)
            | Lir::StoreElement(Storage::Local(slot), _)
            | Lir::CheckBounds(Storage::Local(slot), _)
            | Lir::AllocArray(Storage::Local(slot), ..) => Some(*slot),
            _ => None,
        }
    }
    pub fn slot_mut(&mut self) -> Option<&mut Slot> {
        match self {
            Lir::LoadLocal(slot)
            | Lir::Store(slot)
            | Lir::LoadElement(Storage::Local(slot), _)
            | Lir::StoreElement(Storage::Local(slot), _)
            | Lir::CheckBounds(Storage::Local(slot), _)
            | Lir::AllocArray(Storage::Local(slot), ..) => Some(slot),
            _ => None,
        }
    }
    /// Slot whose whole value is replaced, element stores only change the array's contents
    pub fn defined_slot(&self) -> Option<Slot> {
        match self {
            Lir::Store(slot) | Lir::AllocArray(Storage::Local(slot), ..) => Some(*slot),
            _ => None,
        }
    }
    /// Slot whose value is read
    pub fn used_slot(&self) -> Option<Slot> {
        match self {
            Lir::Store(_) | Lir::AllocArray(..) => None,
            _ => self.slot(),
        }
    }

    pub fn branch_target(&self) -> Option<LabelId> {
        match self {
            Lir::Branch(label) | Lir::BranchIf(_, label) => Some(*label),
            _ => None,
        }
    }
    /// Control never falls through to the next instruction
    pub fn ends_flow(&self) -> bool {
        matches!(self, Lir::Branch(_) | Lir::Return(_))
    }
    pub fn is_block_boundary(&self) -> bool {
        matches!(
            self,
            Lir::Label(_) | Lir::Branch(_) | Lir::BranchIf(..) | Lir::Return(_)
        )
    }
}

impl Display for Lir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lir::LoadConst(literal) => write!(f, "\tldc     {}", literal),
            Lir::LoadLocal(slot) => write!(f, "\tld      %{}", slot),
            Lir::Store(slot) => write!(f, "\tst      %{}", slot),
            Lir::LoadGlobal(name) => write!(f, "\tld      @{}", name),
            Lir::StoreGlobal(name) => write!(f, "\tst      @{}", name),
            Lir::LoadElement(array, rank) => write!(f, "\tlde     {}, {}", array, rank),
            Lir::StoreElement(array, rank) => write!(f, "\tste     {}, {}", array, rank),
            Lir::CheckBounds(array, dim) => write!(f, "\tbounds  {}, {}", array, dim + 1),
            Lir::AllocArray(array, base, rank) => {
                write!(f, "\talloc   {}, {}, {}", array, base, rank)
            }
            Lir::Binary(op, ty) => write!(f, "\t{:<8}{}", op.mnemonic(), ty),
            Lir::Unary(UnaryOp::Neg, ty) => write!(f, "\tneg     {}", ty),
            Lir::Unary(UnaryOp::Not, ty) => write!(f, "\tnot     {}", ty),
            Lir::Convert(promotion) => write!(f, "\t{}", promotion),
            Lir::Call(target, argc, returns) => write!(
                f,
                "\tcall    {}, {}{}",
                target,
                argc,
                if *returns { ", value" } else { "" }
            ),
            Lir::Dup => write!(f, "\tdup"),
            Lir::Pop => write!(f, "\tpop"),
            Lir::Label(label) => write!(f, "L{}:", label),
            Lir::Branch(label) => write!(f, "\tjmp     L{}", label),
            Lir::BranchIf(true, label) => write!(f, "\tjt      L{}", label),
            Lir::BranchIf(false, label) => write!(f, "\tjf      L{}", label),
            Lir::Return(true) => write!(f, "\tret     value"),
            Lir::Return(false) => write!(f, "\tret"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_instructions() {
        assert_eq!(Lir::LoadConst(Literal::Integer(20)).to_string(), "\tldc     20");
        assert_eq!(Lir::Binary(BinaryOp::Div, BaseType::Double).to_string(), "\tdiv     DOUBLE");
        assert_eq!(
            Lir::StoreElement(Storage::Global("GRID".to_string()), 2).to_string(),
            "\tste     @GRID, 2"
        );
        assert_eq!(
            Lir::Call(CallTarget::Runtime("rt.sqrt".to_string()), 1, true).to_string(),
            "\tcall    [rt.sqrt], 1, value"
        );
        assert_eq!(Lir::Label(3).to_string(), "L3:");
    }

    #[test]
    fn slot_accessors() {
        let mut store = Lir::StoreElement(Storage::Local(4), 1);
        assert_eq!(store.slot(), Some(4));
        assert_eq!(store.defined_slot(), None);
        assert_eq!(store.used_slot(), Some(4));

        *store.slot_mut().unwrap() = 1;
        assert_eq!(store, Lir::StoreElement(Storage::Local(1), 1));

        assert_eq!(Lir::Store(2).defined_slot(), Some(2));
        assert_eq!(Lir::Store(2).used_slot(), None);
        assert_eq!(Lir::LoadGlobal("X".to_string()).slot(), None);
    }

    #[test]
    fn stack_effects() {
        assert_eq!(Lir::StoreElement(Storage::Local(0), 2).stack_effect(), (3, 0));
        assert_eq!(Lir::Call(CallTarget::Routine("F".to_string()), 2, true).stack_effect(), (2, 1));
        assert_eq!(Lir::Return(false).stack_effect(), (0, 0));
        assert_eq!(Lir::Dup.stack_effect(), (1, 2));
    }
}
