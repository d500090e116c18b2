//! Expression nodes.

use blakod_core::{BinaryOp, Literal, LiteralKind, UnaryOp};
use blakod_registry::IdRef;

use crate::functions::{ArgShape, BuiltinFunction};

/// A constant operand.
///
/// Class and message references hold the identifier rather than its id so
/// that forward references pick up the id once the definition is seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constant {
    Value(Literal),
    /// `&Name`
    Class(IdRef),
    /// `@Name`
    Message(IdRef),
}

impl Constant {
    pub fn kind(&self) -> LiteralKind {
        match self {
            Constant::Value(literal) => literal.kind(),
            Constant::Class(_) => LiteralKind::Class,
            Constant::Message(_) => LiteralKind::Message,
        }
    }

    /// The literal, if it does not depend on an identifier.
    pub fn as_literal(&self) -> Option<Literal> {
        match self {
            Constant::Value(literal) => Some(*literal),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i32> {
        self.as_literal().and_then(|l| l.as_number())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Constant::Value(Literal::Nil))
    }
}

impl From<Literal> for Constant {
    fn from(literal: Literal) -> Self {
        Constant::Value(literal)
    }
}

/// An expression with the line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// A local, parameter, property or classvar.
    Identifier(IdRef),
    Constant(Constant),
    Call(Box<CallExpr>),
}

impl Expr {
    pub fn new(kind: ExprKind, line: u32) -> Self {
        Self { kind, line }
    }

    pub fn constant(constant: impl Into<Constant>, line: u32) -> Self {
        Self::new(ExprKind::Constant(constant.into()), line)
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match &self.kind {
            ExprKind::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        self.as_constant().is_some_and(Constant::is_nil)
    }

    /// Whether the value is available without computing anything.
    pub fn is_simple(&self) -> bool {
        matches!(self.kind, ExprKind::Identifier(_) | ExprKind::Constant(_))
    }
}

/// A call to a builtin function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallExpr {
    pub function: &'static BuiltinFunction,
    pub args: Vec<Arg>,
}

impl CallExpr {
    pub fn expressions(&self) -> impl Iterator<Item = &Expr> {
        self.args.iter().filter_map(|arg| match arg {
            Arg::Expr(expr) => Some(expr),
            Arg::Setting { .. } => None,
        })
    }

    pub fn settings(&self) -> impl Iterator<Item = (IdRef, &Expr)> {
        self.args.iter().filter_map(|arg| match arg {
            Arg::Setting { param, value } => Some((*param, value)),
            Arg::Expr(_) => None,
        })
    }

    pub fn has_settings(&self) -> bool {
        self.settings().next().is_some()
    }
}

/// A call argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Positional argument.
    Expr(Expr),
    /// Named argument `#name = value`; `param` is the global parameter.
    Setting { param: IdRef, value: Expr },
}

impl Arg {
    pub fn shape(&self) -> ArgShape {
        match self {
            Arg::Expr(_) => ArgShape::Expression,
            Arg::Setting { .. } => ArgShape::Setting,
        }
    }

    pub fn value(&self) -> &Expr {
        match self {
            Arg::Expr(expr) | Arg::Setting { value: expr, .. } => expr,
        }
    }

    pub(crate) fn value_mut(&mut self) -> &mut Expr {
        match self {
            Arg::Expr(expr) | Arg::Setting { value: expr, .. } => expr,
        }
    }
}

/// The condition of a branch or loop.
///
/// The builder only produces [`Condition::Expr`]; the optimizer rewrites a
/// lone comparison against `$` into one of the null tests, which the code
/// generator turns into a single null-test branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Expr(Expr),
    /// True when the operand is `$`.
    IsNull(Expr),
    /// True when the operand is not `$`.
    NotNull(Expr),
}

impl Condition {
    pub fn line(&self) -> u32 {
        match self {
            Condition::Expr(e) | Condition::IsNull(e) | Condition::NotNull(e) => e.line,
        }
    }
}
