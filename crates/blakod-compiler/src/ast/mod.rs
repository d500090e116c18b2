//! Syntax tree built by the session's builder operations.
//!
//! - [`expr`]: expressions, constants, calls and branch conditions
//! - [`stmt`]: statements and statement lists
//! - [`class`]: classes, declarations and message handlers

mod class;
mod expr;
mod stmt;

pub use class::{Class, ConstantTable, MemberDecl, MessageHandler, Param, ResourceDecl};
pub use expr::{Arg, CallExpr, Condition, Constant, Expr, ExprKind};
pub use stmt::{ElseClause, IfStmt, Stmt, StmtKind, StmtList, SwitchCase};
