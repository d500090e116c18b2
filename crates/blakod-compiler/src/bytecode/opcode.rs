//! Bytecode operation codes.
//!
//! This module defines the instruction set of the Blakod interpreter. Each
//! opcode is a single byte followed by inline operands, all little-endian.
//!
//! ## Operands
//!
//! - *dest*: `u32` slot. Whether it is a local or a property is part of the
//!   opcode (`…L` / `…P`).
//! - *source*: a [`SourceKind`] byte followed by a `u32`, either a tagged
//!   literal or a slot.
//! - *offset*: `i32` jump distance, relative to the position of the branch
//!   opcode.
//!
//! ## Layouts
//!
//! ```text
//! Move / unary        op dest src
//! binary              op dest src src
//! IsClassConst        op dest src u32 class_id
//! Goto                op offset
//! GotoIf…             op offset src-value
//! Call…               op u8 fn [dest] u8 nargs src* [u8 nsettings (u32 param src)*]
//! Return              op src
//! ReturnNull, Propagate
//! ```

use bitflags::bitflags;
use blakod_core::{BinaryOp, UnaryOp};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Bytecode operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Moves
    // =========================================================================
    /// dest(local) = src
    MoveL = 0,
    /// dest(property) = src
    MoveP,

    // =========================================================================
    // Unary operators
    // =========================================================================
    NotL,
    NotP,
    NegL,
    NegP,
    BitNotL,
    BitNotP,
    /// dest = ++src; the operand is written back.
    PreIncL,
    PreIncP,
    PreDecL,
    PreDecP,
    /// dest = src++; the operand is written back.
    PostIncL,
    PostIncP,
    PostDecL,
    PostDecP,
    /// dest = first element of a list.
    FirstL,
    FirstP,
    /// dest = list without its first element.
    RestL,
    RestP,
    /// dest = class of an object.
    GetClassL,
    GetClassP,

    // =========================================================================
    // Binary operators
    // =========================================================================
    AddL,
    AddP,
    SubL,
    SubP,
    MulL,
    MulP,
    DivL,
    DivP,
    ModL,
    ModP,
    EqL,
    EqP,
    NeqL,
    NeqP,
    LtL,
    LtP,
    GtL,
    GtP,
    LeqL,
    LeqP,
    GeqL,
    GeqP,
    BitAndL,
    BitAndP,
    BitOrL,
    BitOrP,
    /// dest = object is an instance of a class held in a variable.
    IsClassL,
    IsClassP,
    /// dest = object is an instance of a class known at compile time.
    IsClassConstL,
    IsClassConstP,

    // =========================================================================
    // Control flow
    // =========================================================================
    /// Unconditional jump.
    Goto,
    /// Jump if the value is non-zero. The suffix is the value's kind:
    /// constant, local, property, classvar.
    GotoIfTrueC,
    GotoIfTrueL,
    GotoIfTrueP,
    GotoIfTrueV,
    GotoIfFalseC,
    GotoIfFalseL,
    GotoIfFalseP,
    GotoIfFalseV,
    /// Jump if the value is `$`.
    GotoIfNullC,
    GotoIfNullL,
    GotoIfNullP,
    GotoIfNullV,
    /// Jump if the value is not `$`.
    GotoIfNotNullC,
    GotoIfNotNullL,
    GotoIfNotNullP,
    GotoIfNotNullV,

    // =========================================================================
    // Calls
    // =========================================================================
    /// Call a builtin, discarding the result.
    CallNoStore,
    CallNoStoreSettings,
    /// Call a builtin, storing the result in a local.
    CallStoreL,
    CallStoreLSettings,
    /// Call a builtin, storing the result in a property.
    CallStoreP,
    CallStorePSettings,

    // =========================================================================
    // Handler exit
    // =========================================================================
    /// Return a value.
    Return,
    /// Return `$`.
    ReturnNull,
    /// Pass the current message to the superclass's handler and return its
    /// result.
    Propagate,
}

/// Kind of a source operand, written as the byte before its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SourceKind {
    Constant = 0,
    Local = 1,
    Property = 2,
    ClassVar = 3,
}

/// Where an instruction stores its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestKind {
    Local,
    Property,
}

/// What a conditional branch tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchTest {
    True,
    False,
    Null,
    NotNull,
}

bitflags! {
    /// Shape of a call instruction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CallShape: u8 {
        /// The result is stored; a destination slot follows the function.
        const STORE = 1 << 0;
        /// Named arguments follow the positional ones.
        const SETTINGS = 1 << 1;
    }
}

/// A binary operator with a store instruction of its own. `AND` and `OR`
/// are compiled to branches and have none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Gt,
    Leq,
    Geq,
    BitAnd,
    BitOr,
    IsClass,
}

impl TryFrom<BinaryOp> for StoreOp {
    /// The short-circuit operator that was passed in.
    type Error = BinaryOp;

    fn try_from(op: BinaryOp) -> Result<Self, BinaryOp> {
        Ok(match op {
            BinaryOp::And | BinaryOp::Or => return Err(op),
            BinaryOp::Add => StoreOp::Add,
            BinaryOp::Sub => StoreOp::Sub,
            BinaryOp::Mul => StoreOp::Mul,
            BinaryOp::Div => StoreOp::Div,
            BinaryOp::Mod => StoreOp::Mod,
            BinaryOp::Eq => StoreOp::Eq,
            BinaryOp::Neq => StoreOp::Neq,
            BinaryOp::Lt => StoreOp::Lt,
            BinaryOp::Gt => StoreOp::Gt,
            BinaryOp::Leq => StoreOp::Leq,
            BinaryOp::Geq => StoreOp::Geq,
            BinaryOp::BitAnd => StoreOp::BitAnd,
            BinaryOp::BitOr => StoreOp::BitOr,
            BinaryOp::IsClass => StoreOp::IsClass,
        })
    }
}

/// Operand layout of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Move,
    Unary,
    Binary,
    IsClassConst,
    Goto,
    GotoIf,
    Call(CallShape),
    Return,
    Bare,
}

impl OpCode {
    /// Decode an opcode byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// The move into a destination of this kind.
    pub fn mov(dest: DestKind) -> Self {
        pick(dest, OpCode::MoveL, OpCode::MoveP)
    }

    pub fn unary(op: UnaryOp, dest: DestKind) -> Self {
        use OpCode::*;
        let (local, property) = match op {
            UnaryOp::Not => (NotL, NotP),
            UnaryOp::Neg => (NegL, NegP),
            UnaryOp::BitNot => (BitNotL, BitNotP),
            UnaryOp::PreInc => (PreIncL, PreIncP),
            UnaryOp::PreDec => (PreDecL, PreDecP),
            UnaryOp::PostInc => (PostIncL, PostIncP),
            UnaryOp::PostDec => (PostDecL, PostDecP),
            UnaryOp::First => (FirstL, FirstP),
            UnaryOp::Rest => (RestL, RestP),
            UnaryOp::GetClass => (GetClassL, GetClassP),
        };
        pick(dest, local, property)
    }

    pub fn binary(op: StoreOp, dest: DestKind) -> Self {
        use OpCode::*;
        let (local, property) = match op {
            StoreOp::Add => (AddL, AddP),
            StoreOp::Sub => (SubL, SubP),
            StoreOp::Mul => (MulL, MulP),
            StoreOp::Div => (DivL, DivP),
            StoreOp::Mod => (ModL, ModP),
            StoreOp::Eq => (EqL, EqP),
            StoreOp::Neq => (NeqL, NeqP),
            StoreOp::Lt => (LtL, LtP),
            StoreOp::Gt => (GtL, GtP),
            StoreOp::Leq => (LeqL, LeqP),
            StoreOp::Geq => (GeqL, GeqP),
            StoreOp::BitAnd => (BitAndL, BitAndP),
            StoreOp::BitOr => (BitOrL, BitOrP),
            StoreOp::IsClass => (IsClassL, IsClassP),
        };
        pick(dest, local, property)
    }

    pub fn is_class_const(dest: DestKind) -> Self {
        pick(dest, OpCode::IsClassConstL, OpCode::IsClassConstP)
    }

    pub fn goto_if(test: BranchTest, kind: SourceKind) -> Self {
        use OpCode::*;
        let row = match test {
            BranchTest::True => [GotoIfTrueC, GotoIfTrueL, GotoIfTrueP, GotoIfTrueV],
            BranchTest::False => [GotoIfFalseC, GotoIfFalseL, GotoIfFalseP, GotoIfFalseV],
            BranchTest::Null => [GotoIfNullC, GotoIfNullL, GotoIfNullP, GotoIfNullV],
            BranchTest::NotNull => [
                GotoIfNotNullC,
                GotoIfNotNullL,
                GotoIfNotNullP,
                GotoIfNotNullV,
            ],
        };
        row[u8::from(kind) as usize]
    }

    /// The call opcode for a destination (`None` discards the result).
    pub fn call(dest: Option<DestKind>, settings: bool) -> Self {
        use OpCode::*;
        match (dest, settings) {
            (None, false) => CallNoStore,
            (None, true) => CallNoStoreSettings,
            (Some(DestKind::Local), false) => CallStoreL,
            (Some(DestKind::Local), true) => CallStoreLSettings,
            (Some(DestKind::Property), false) => CallStoreP,
            (Some(DestKind::Property), true) => CallStorePSettings,
        }
    }

    pub fn layout(&self) -> Layout {
        use OpCode::*;
        match self {
            MoveL | MoveP => Layout::Move,
            NotL | NotP | NegL | NegP | BitNotL | BitNotP | PreIncL | PreIncP | PreDecL
            | PreDecP | PostIncL | PostIncP | PostDecL | PostDecP | FirstL | FirstP | RestL
            | RestP | GetClassL | GetClassP => Layout::Unary,
            IsClassConstL | IsClassConstP => Layout::IsClassConst,
            Goto => Layout::Goto,
            GotoIfTrueC | GotoIfTrueL | GotoIfTrueP | GotoIfTrueV | GotoIfFalseC
            | GotoIfFalseL | GotoIfFalseP | GotoIfFalseV | GotoIfNullC | GotoIfNullL
            | GotoIfNullP | GotoIfNullV | GotoIfNotNullC | GotoIfNotNullL | GotoIfNotNullP
            | GotoIfNotNullV => Layout::GotoIf,
            CallNoStore => Layout::Call(CallShape::empty()),
            CallNoStoreSettings => Layout::Call(CallShape::SETTINGS),
            CallStoreL | CallStoreP => Layout::Call(CallShape::STORE),
            CallStoreLSettings | CallStorePSettings => Layout::Call(CallShape::all()),
            Return => Layout::Return,
            ReturnNull | Propagate => Layout::Bare,
            _ => Layout::Binary,
        }
    }

    /// Whether this is a jump.
    pub fn is_branch(&self) -> bool {
        matches!(self.layout(), Layout::Goto | Layout::GotoIf)
    }

    /// Whether control never falls through to the next instruction.
    pub fn ends_flow(&self) -> bool {
        matches!(
            self,
            OpCode::Goto | OpCode::Return | OpCode::ReturnNull | OpCode::Propagate
        )
    }

    /// Human-readable name for disassembly and test output.
    pub fn name(&self) -> String {
        format!("{self:?}")
    }
}

fn pick(dest: DestKind, local: OpCode, property: OpCode) -> OpCode {
    match dest {
        DestKind::Local => local,
        DestKind::Property => property,
    }
}
