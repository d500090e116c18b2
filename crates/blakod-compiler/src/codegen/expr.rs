//! Expression compilation.
//!
//! An expression is compiled either into a source operand, when its value
//! is already available (a variable or a constant), or into a destination
//! chosen by the caller. Assignments pass their target down so that the
//! operator stores straight into it:
//!
//! ```text
//! x = a + b * 2         MulL  t0 b 2
//!                       AddL  x  a t0
//! ```
//!
//! `and`/`or` short-circuit and always produce 0 or 1:
//!
//! ```text
//! a and b               GotoIfFalse a -> false
//!                       GotoIfFalse b -> false
//!                       Move dest 1
//!                       Goto end
//!               false:  Move dest 0
//!               end:
//! ```

use blakod_core::{BinaryOp, CompilationError, IdKind, Literal, UnaryOp};

use super::{HandlerCompiler, Place, Result, const_literal, soft_error};
use crate::ast::{Condition, Constant, Expr, ExprKind};
use crate::bytecode::{BranchTest, OpCode, StoreOp};
use crate::emit::{Dest, Label, Operand};

impl<'a> HandlerCompiler<'a> {
    /// The value of `expr` as a source operand, computing it into a
    /// temporary if it is not simple.
    pub(super) fn operand(&mut self, expr: &Expr) -> Result<Operand> {
        match &expr.kind {
            ExprKind::Identifier(id) => Ok(self
                .place(*id, expr.line)?
                .map_or(Operand::constant(Literal::Nil), Place::operand)),
            ExprKind::Constant(constant) => {
                let literal = const_literal(self.session, constant, expr.line)?;
                Ok(Operand::constant(literal))
            }
            _ => {
                let slot = self.temp();
                self.gen_into(expr, Dest::Local(slot))?;
                Ok(Operand::local(slot))
            }
        }
    }

    /// Compute `expr` and store it in `dest`.
    pub(super) fn gen_into(&mut self, expr: &Expr, dest: Dest) -> Result<()> {
        match &expr.kind {
            ExprKind::Identifier(_) | ExprKind::Constant(_) => {
                let src = self.operand(expr)?;
                self.emitter.emit_move(dest, src);
                Ok(())
            }
            ExprKind::Unary { op, operand } => self.gen_unary(*op, operand, dest),
            ExprKind::Binary { op, left, right } => match StoreOp::try_from(*op) {
                Err(logical) => self.gen_logical(logical, left, right, dest),
                Ok(StoreOp::IsClass) => self.gen_is_class(left, right, dest),
                Ok(op) => {
                    let left = self.operand(left)?;
                    let right = self.operand(right)?;
                    self.store_binary(op, dest, left, right);
                    Ok(())
                }
            },
            ExprKind::Call(call) => self.gen_call(call, Some(dest), expr.line),
        }
    }

    fn store_binary(&mut self, op: StoreOp, dest: Dest, left: Operand, right: Operand) {
        let code = OpCode::binary(op, dest.kind());
        self.emitter.emit_store(code, dest, &[left, right]);
    }

    fn gen_unary(&mut self, op: UnaryOp, operand: &Expr, dest: Dest) -> Result<()> {
        let src = if op.is_increment() {
            // Increments update the variable itself.
            match self.increment_target(operand)? {
                Some(place) => place,
                None => {
                    self.emitter.emit_move(dest, Operand::constant(Literal::Nil));
                    return Ok(());
                }
            }
        } else {
            self.operand(operand)?
        };
        self.emitter
            .emit_store(OpCode::unary(op, dest.kind()), dest, &[src]);
        Ok(())
    }

    fn increment_target(&mut self, operand: &Expr) -> Result<Option<Operand>> {
        let ExprKind::Identifier(id) = operand.kind else {
            soft_error(
                self.session,
                CompilationError::NotAnLvalue {
                    name: "expression".to_string(),
                    kind: IdKind::Undefined,
                    line: operand.line,
                },
            )?;
            return Ok(None);
        };
        Ok(self.target(id, operand.line)?.map(|dest| dest.as_operand()))
    }

    fn gen_logical(&mut self, op: BinaryOp, left: &Expr, right: &Expr, dest: Dest) -> Result<()> {
        // AND leaves early on a false operand, OR on a true one.
        let (test, early, late) = match op {
            BinaryOp::And => (BranchTest::False, 0, 1),
            _ => (BranchTest::True, 1, 0),
        };
        let short = self.emitter.new_label();
        let end = self.emitter.new_label();

        let value = self.operand(left)?;
        self.emitter.emit_goto_if(test, value, short);
        let value = self.operand(right)?;
        self.emitter.emit_goto_if(test, value, short);
        self.emitter.emit_move(dest, Operand::number(late));
        self.emitter.emit_goto(end);
        self.emitter.bind_label(short);
        self.emitter.emit_move(dest, Operand::number(early));
        self.emitter.bind_label(end);
        Ok(())
    }

    fn gen_is_class(&mut self, object: &Expr, class: &Expr, dest: Dest) -> Result<()> {
        let object = self.operand(object)?;
        if let ExprKind::Constant(constant @ Constant::Class(_)) = &class.kind {
            if let Literal::Class(id) = const_literal(self.session, constant, class.line)? {
                self.emitter.emit_is_class_const(dest, object, id);
                return Ok(());
            }
            self.store_binary(StoreOp::IsClass, dest, object, Operand::constant(Literal::Nil));
            return Ok(());
        }
        let class = self.operand(class)?;
        self.store_binary(StoreOp::IsClass, dest, object, class);
        Ok(())
    }

    /// Jump to `target` when `condition` evaluates to `when`.
    ///
    /// Null tests fused by the optimizer become a single null-test branch.
    pub(super) fn branch(&mut self, condition: &Condition, when: bool, target: Label) -> Result<()> {
        let (expr, test) = match condition {
            Condition::Expr(expr) => (expr, if when { BranchTest::True } else { BranchTest::False }),
            Condition::IsNull(expr) => (expr, if when { BranchTest::Null } else { BranchTest::NotNull }),
            Condition::NotNull(expr) => (expr, if when { BranchTest::NotNull } else { BranchTest::Null }),
        };
        let value = self.operand(expr)?;
        self.emitter.emit_goto_if(test, value, target);
        Ok(())
    }
}
