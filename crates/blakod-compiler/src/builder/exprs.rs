//! Expressions and calls.

use blakod_core::limits::{MAXARGS, MAXFNAME};
use blakod_core::{BinaryOp, CompilationError, IdKind, LiteralKind, UnaryOp};
use blakod_registry::{Definition, Scope};
use log::trace;

use super::{NameRef, Result};
use crate::ast::{Arg, CallExpr, Constant, Expr, ExprKind};
use crate::functions::{self, ArgShape};
use crate::session::CompilationSession;

impl CompilationSession {
    /// A bare name used as a value.
    pub fn make_expr_from_id(&mut self, name: &str, line: u32) -> Result<Expr> {
        match self.resolve_name(name, line)? {
            NameRef::Variable(id) => {
                self.symbols.mark_referenced(id);
                Ok(Expr::new(ExprKind::Identifier(id), line))
            }
            NameRef::Value(constant) => Ok(Expr::constant(constant, line)),
            NameRef::Other(_, kind) => self.fail(CompilationError::NotAValue {
                name: name.to_string(),
                kind,
                line,
            }),
            NameRef::Unknown => self.fail(CompilationError::UndefinedIdentifier {
                name: name.to_string(),
                line,
            }),
        }
    }

    pub fn make_expr_from_constant(&self, constant: Constant, line: u32) -> Expr {
        Expr::constant(constant, line)
    }

    /// A binary operation. Literal operands are checked against what the
    /// operator accepts.
    pub fn make_bin_op(&mut self, op: BinaryOp, left: Expr, right: Expr, line: u32) -> Result<Expr> {
        if op == BinaryOp::IsClass {
            return self.make_isclass_op(left, right, line);
        }
        for operand in [&left, &right] {
            let Some(kind) = literal_kind(operand) else {
                continue;
            };
            let accepted = if op.is_numeric() {
                kind == LiteralKind::Number
            } else {
                kind != LiteralKind::String
            };
            if !accepted {
                return self.fail(invalid_operand(op.as_str(), kind, line));
            }
        }
        Ok(Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            line,
        ))
    }

    /// `IsClass(object, class)`.
    pub fn make_isclass_op(&mut self, object: Expr, class: Expr, line: u32) -> Result<Expr> {
        let op = BinaryOp::IsClass.as_str();
        if let Some(kind) = literal_kind(&object) {
            if matches!(kind, LiteralKind::Number | LiteralKind::String) {
                return self.fail(invalid_operand(op, kind, line));
            }
        }
        if let Some(kind) = literal_kind(&class) {
            if kind != LiteralKind::Class {
                return self.fail(invalid_operand(op, kind, line));
            }
        }
        Ok(Expr::new(
            ExprKind::Binary {
                op: BinaryOp::IsClass,
                left: Box::new(object),
                right: Box::new(class),
            },
            line,
        ))
    }

    /// A unary operation.
    pub fn make_un_op(&mut self, op: UnaryOp, operand: Expr, line: u32) -> Result<Expr> {
        if op.is_increment() {
            self.check_increment(op, &operand, line)?;
        } else if let Some(kind) = literal_kind(&operand) {
            let accepted = match op {
                UnaryOp::First | UnaryOp::Rest | UnaryOp::GetClass => {
                    !matches!(kind, LiteralKind::Number | LiteralKind::String)
                }
                UnaryOp::Not => kind != LiteralKind::String,
                _ => kind == LiteralKind::Number,
            };
            if !accepted {
                return self.fail(invalid_operand(op.as_str(), kind, line));
            }
        }
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            line,
        ))
    }

    fn check_increment(&mut self, op: UnaryOp, operand: &Expr, line: u32) -> Result<()> {
        match &operand.kind {
            ExprKind::Identifier(id) => {
                let ident = self.symbols.get(*id);
                // Deferred members are checked against the layout later.
                if ident.kind.is_lvalue() || ident.kind == IdKind::Missing {
                    return Ok(());
                }
                let error = CompilationError::NotAnLvalue {
                    name: ident.name.clone(),
                    kind: ident.kind,
                    line,
                };
                self.fail(error)
            }
            ExprKind::Constant(constant) => self.fail(invalid_operand(op.as_str(), constant.kind(), line)),
            _ => self.fail(CompilationError::NotAnLvalue {
                name: "expression".to_string(),
                kind: IdKind::Undefined,
                line,
            }),
        }
    }

    pub fn make_arg_from_expr(&self, expr: Expr) -> Arg {
        Arg::Expr(expr)
    }

    /// A named argument `#name = value`. The name is a global parameter,
    /// defined on first use.
    pub fn make_arg_from_setting(&mut self, name: &str, value: Expr, line: u32) -> Result<Arg> {
        let param = self.define(Definition::new(name, IdKind::Parameter, Scope::Global, line))?;
        self.symbols.mark_referenced(param);
        Ok(Arg::Setting { param, value })
    }

    /// A call to a builtin function, checked against its signature.
    pub fn make_call(&mut self, name: &str, args: Vec<Arg>, line: u32) -> Result<CallExpr> {
        if name.len() > MAXFNAME {
            return self.fail(CompilationError::NameTooLong {
                name: name.to_string(),
                limit: MAXFNAME,
                line,
            });
        }
        let Some(function) = functions::lookup(name) else {
            return self.fail(CompilationError::UnknownFunction {
                name: name.to_string(),
                line,
            });
        };
        if args.len() > MAXARGS {
            return self.fail(CompilationError::TooManyArguments {
                function: function.name.to_string(),
                count: args.len(),
                limit: MAXARGS,
                line,
            });
        }
        let shapes: Vec<ArgShape> = args.iter().map(Arg::shape).collect();
        if let Err(detail) = function.check_arguments(&shapes) {
            return self.fail(CompilationError::ArityMismatch {
                function: function.name.to_string(),
                detail,
                line,
            });
        }
        trace!("call {} with {} argument(s)", function.name, args.len());
        Ok(CallExpr { function, args })
    }

    /// A list literal `[a, b, ...]`, built with the `List` builtin.
    pub fn make_list_call(&mut self, items: Vec<Expr>, line: u32) -> Result<Expr> {
        let args = items.into_iter().map(Arg::Expr).collect();
        let call = self.make_call("List", args, line)?;
        Ok(self.make_expr_from_call(call, line))
    }

    pub fn make_expr_from_call(&self, call: CallExpr, line: u32) -> Expr {
        Expr::new(ExprKind::Call(Box::new(call)), line)
    }
}

/// Kind of a literal operand, or `None` for anything computed at runtime.
fn literal_kind(expr: &Expr) -> Option<LiteralKind> {
    expr.as_constant().map(Constant::kind)
}

fn invalid_operand(op: &str, operand: LiteralKind, line: u32) -> CompilationError {
    CompilationError::InvalidOperand {
        op: op.to_string(),
        operand,
        line,
    }
}
