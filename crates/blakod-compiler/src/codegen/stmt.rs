//! Statement compilation.
//!
//! Control flow is built from labels; the emitter resolves them when the
//! handler is finished. Temporaries allocated by a statement are released
//! when it ends.
//!
//! ## If
//!
//! ```text
//!     GotoIfFalse cond -> else
//!     then_body
//!     Goto end                  ; only with an else part
//! else:
//!     else_body
//! end:
//! ```
//!
//! ## While / Do-while / For
//!
//! ```text
//! top:                          top:                      init
//!     GotoIfFalse cond -> end       body                  top:
//!     body                      continue:                     GotoIfFalse cond -> end
//!     Goto top                      GotoIfTrue cond -> top    body
//! end:                          end:                      continue:
//!                                                             step
//!                                                             Goto top
//!                                                         end:
//! ```
//!
//! ## Foreach
//!
//! ```text
//!     Move cursor list
//! top:
//!     GotoIfNull cursor -> end    ; or EqL t cursor $ / GotoIfTrue t -> end
//!     First var cursor
//!     body
//! continue:
//!     Rest cursor cursor
//!     Goto top
//! end:
//! ```
//!
//! ## Switch
//!
//! Each case value is compared in order; bodies fall through.
//!
//! ```text
//!     EqL t value case1
//!     GotoIfTrue t -> body1
//!     ...
//!     Goto default              ; or end
//! body1:
//!     ...
//! end:
//! ```

use blakod_core::{CompilationError, Literal, UnaryOp};
use blakod_registry::IdRef;
use log::trace;

use super::{HandlerCompiler, Result};
use crate::ast::{Condition, ElseClause, Expr, IfStmt, Stmt, StmtKind, StmtList, SwitchCase};
use crate::bytecode::{BranchTest, DestKind, OpCode, StoreOp};
use crate::emit::{Dest, Operand};

impl<'a> HandlerCompiler<'a> {
    pub(super) fn stmts(&mut self, list: &StmtList) -> Result<()> {
        for stmt in list {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<()> {
        self.emitter.set_line(stmt.line);
        let mark = self.temps;
        let result = match &stmt.kind {
            StmtKind::If(if_stmt) => self.if_stmt(if_stmt),
            StmtKind::Assign { target, value } => match self.target(*target, stmt.line)? {
                Some(dest) => self.gen_into(value, dest),
                None => Ok(()),
            },
            StmtKind::Call(call) => self.gen_call_stmt(call, stmt.line),
            StmtKind::Foreach {
                var,
                list,
                body,
                fused_null_test,
            } => self.foreach_stmt(*var, list, body, *fused_null_test, stmt.line),
            StmtKind::While { condition, body } => self.while_stmt(condition, body),
            StmtKind::DoWhile { body, condition } => self.do_while_stmt(body, condition),
            StmtKind::For {
                init,
                condition,
                step,
                body,
            } => self.for_stmt(init, condition, step, body),
            StmtKind::Switch { value, cases } => self.switch_stmt(value, cases),
            StmtKind::Propagate => {
                self.emitter.emit_propagate();
                Ok(())
            }
            StmtKind::Return(Some(value)) => {
                let value = self.operand(value)?;
                self.emitter.emit_return(value);
                Ok(())
            }
            StmtKind::Return(None) => {
                self.emitter.emit_return_null();
                Ok(())
            }
            StmtKind::Break => match self.emitter.emit_break() {
                Ok(()) => Ok(()),
                Err(_) => self
                    .session
                    .fail(CompilationError::BreakOutsideLoop { line: stmt.line }),
            },
            StmtKind::Continue => match self.emitter.emit_continue() {
                Ok(()) => Ok(()),
                Err(_) => self
                    .session
                    .fail(CompilationError::ContinueOutsideLoop { line: stmt.line }),
            },
        };
        self.temps = mark;
        result
    }

    fn if_stmt(&mut self, if_stmt: &IfStmt) -> Result<()> {
        let else_label = self.emitter.new_label();
        self.branch(&if_stmt.condition, false, else_label)?;
        self.stmts(&if_stmt.then_body)?;

        match &if_stmt.else_clause {
            ElseClause::None => self.emitter.bind_label(else_label),
            ElseClause::ElseIf(chained) => {
                let end = self.emitter.new_label();
                self.emitter.emit_goto(end);
                self.emitter.bind_label(else_label);
                self.stmt(chained)?;
                self.emitter.bind_label(end);
            }
            ElseClause::Else(body) => {
                let end = self.emitter.new_label();
                self.emitter.emit_goto(end);
                self.emitter.bind_label(else_label);
                self.stmts(body)?;
                self.emitter.bind_label(end);
            }
        }
        Ok(())
    }

    fn while_stmt(&mut self, condition: &Condition, body: &StmtList) -> Result<()> {
        let top = self.emitter.new_label();
        let end = self.emitter.new_label();

        self.emitter.bind_label(top);
        self.branch(condition, false, end)?;
        self.emitter.enter_loop(end, top);
        self.stmts(body)?;
        self.emitter.exit_breakable();
        self.emitter.emit_goto(top);
        self.emitter.bind_label(end);
        Ok(())
    }

    fn do_while_stmt(&mut self, body: &StmtList, condition: &Condition) -> Result<()> {
        let top = self.emitter.new_label();
        let cont = self.emitter.new_label();
        let end = self.emitter.new_label();

        self.emitter.bind_label(top);
        self.emitter.enter_loop(end, cont);
        self.stmts(body)?;
        self.emitter.exit_breakable();
        self.emitter.bind_label(cont);
        self.branch(condition, true, top)?;
        self.emitter.bind_label(end);
        Ok(())
    }

    fn for_stmt(
        &mut self,
        init: &StmtList,
        condition: &Condition,
        step: &StmtList,
        body: &StmtList,
    ) -> Result<()> {
        self.stmts(init)?;

        let top = self.emitter.new_label();
        let cont = self.emitter.new_label();
        let end = self.emitter.new_label();

        self.emitter.bind_label(top);
        self.branch(condition, false, end)?;
        self.emitter.enter_loop(end, cont);
        self.stmts(body)?;
        self.emitter.exit_breakable();
        self.emitter.bind_label(cont);
        self.stmts(step)?;
        self.emitter.emit_goto(top);
        self.emitter.bind_label(end);
        Ok(())
    }

    fn foreach_stmt(
        &mut self,
        var: IdRef,
        list: &Expr,
        body: &StmtList,
        fused_null_test: bool,
        line: u32,
    ) -> Result<()> {
        // The cursor lives for the whole loop.
        let cursor = self.temp();
        self.gen_into(list, Dest::Local(cursor))?;
        let var = match self.target(var, line)? {
            Some(dest) => dest,
            None => Dest::Local(self.temp()),
        };

        let top = self.emitter.new_label();
        let cont = self.emitter.new_label();
        let end = self.emitter.new_label();

        self.emitter.bind_label(top);
        if fused_null_test {
            self.emitter
                .emit_goto_if(BranchTest::Null, Operand::local(cursor), end);
        } else {
            let mark = self.temps;
            let test = self.temp();
            self.emitter.emit_store(
                OpCode::binary(StoreOp::Eq, DestKind::Local),
                Dest::Local(test),
                &[Operand::local(cursor), Operand::constant(Literal::Nil)],
            );
            self.emitter
                .emit_goto_if(BranchTest::True, Operand::local(test), end);
            self.temps = mark;
        }
        self.emitter.emit_store(
            OpCode::unary(UnaryOp::First, var.kind()),
            var,
            &[Operand::local(cursor)],
        );

        self.emitter.enter_loop(end, cont);
        self.stmts(body)?;
        self.emitter.exit_breakable();

        self.emitter.bind_label(cont);
        self.emitter.emit_store(
            OpCode::RestL,
            Dest::Local(cursor),
            &[Operand::local(cursor)],
        );
        self.emitter.emit_goto(top);
        self.emitter.bind_label(end);
        Ok(())
    }

    fn switch_stmt(&mut self, value: &Expr, cases: &[SwitchCase]) -> Result<()> {
        let value = self.operand(value)?;
        let end = self.emitter.new_label();
        let labels: Vec<_> = cases.iter().map(|_| self.emitter.new_label()).collect();

        let mark = self.temps;
        let mut default = None;
        for (case, &label) in cases.iter().zip(&labels) {
            let Some(case_value) = &case.value else {
                default = Some(label);
                continue;
            };
            self.emitter.set_line(case.line);
            let case_value = self.operand(case_value)?;
            let test = self.temp();
            self.emitter.emit_store(
                OpCode::binary(StoreOp::Eq, DestKind::Local),
                Dest::Local(test),
                &[value, case_value],
            );
            self.emitter
                .emit_goto_if(BranchTest::True, Operand::local(test), label);
            self.temps = mark;
        }
        self.emitter.emit_goto(default.unwrap_or(end));

        self.emitter.enter_switch(end);
        for (case, &label) in cases.iter().zip(&labels) {
            self.emitter.bind_label(label);
            self.stmts(&case.body)?;
        }
        self.emitter.exit_breakable();
        self.emitter.bind_label(end);
        trace!("switch with {} cases", cases.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use blakod_core::{BinaryOp, CompilationError, Literal};

    use crate::ast::{ElseClause, Expr, Stmt, StmtKind, StmtList};
    use crate::bytecode::{BofImage, OpCode};
    use crate::session::CompilationSession;

    fn number(n: i32) -> Expr {
        Expr::constant(Literal::Number(n), 4)
    }

    fn compile_go(
        locals: &[&str],
        body: impl FnOnce(&mut CompilationSession) -> StmtList,
    ) -> (CompilationSession, BofImage) {
        let mut s = CompilationSession::default();
        s.begin_class("Foo", None, 1).unwrap();
        s.begin_message("Go", 3).unwrap();
        for name in locals {
            s.add_local(name, 3).unwrap();
        }
        let stmts = body(&mut s);
        s.finish_message(None, stmts, 9).unwrap();
        s.finish_class(10).unwrap();
        s.resolve_hierarchy().unwrap();
        s.optimize();
        let image = s.generate().unwrap();
        (s, image)
    }

    fn opcodes(image: &BofImage) -> Vec<OpCode> {
        image.classes[0].handlers[0].chunk.opcodes()
    }

    #[test]
    fn if_else_jumps_over_else_part() {
        let (_, image) = compile_go(&["a"], |s| {
            let a = s.make_expr_from_id("a", 4).unwrap();
            let then_body = [s.make_assign_stmt("a", number(1), 5).unwrap()].into_iter().collect();
            let else_body = [s.make_assign_stmt("a", number(2), 6).unwrap()].into_iter().collect();
            let stmt = s.make_if_stmt(a, then_body, ElseClause::Else(else_body), 4);
            [stmt].into_iter().collect()
        });
        assert_eq!(
            opcodes(&image),
            vec![
                OpCode::GotoIfFalseL,
                OpCode::MoveL,
                OpCode::Goto,
                OpCode::MoveL,
                OpCode::ReturnNull,
            ]
        );
        let chunk = &image.classes[0].handlers[0].chunk;
        // GotoIfFalse lands on the else move, Goto on the return
        assert_eq!(chunk.jump_target(0), Some(25));
        assert_eq!(chunk.jump_target(20), Some(35));
    }

    #[test]
    fn while_loop_with_break_and_continue() {
        let (_, image) = compile_go(&["i"], |s| {
            let i = s.make_expr_from_id("i", 4).unwrap();
            s.enter_loop();
            let body = [s.make_continue(5).unwrap(), s.make_break(6).unwrap()]
                .into_iter()
                .collect();
            s.leave_loop();
            [s.make_while_stmt(i, body, 4)].into_iter().collect()
        });
        let chunk = &image.classes[0].handlers[0].chunk;
        chunk.assert_opcodes(&[
            OpCode::GotoIfFalseL,
            OpCode::Goto,
            OpCode::Goto,
            OpCode::Goto,
            OpCode::ReturnNull,
        ]);
        // continue goes back to the test, break past the loop
        assert_eq!(chunk.jump_target(10), Some(0));
        assert_eq!(chunk.jump_target(15), Some(25));
        assert_eq!(chunk.jump_target(20), Some(0));
        assert_eq!(chunk.jump_target(0), Some(25));
    }

    #[test]
    fn nil_comparison_becomes_null_branch() {
        let (_, image) = compile_go(&["x"], |s| {
            let x = s.make_expr_from_id("x", 4).unwrap();
            let nil = Expr::constant(Literal::Nil, 4);
            let cond = s.make_bin_op(BinaryOp::Neq, x, nil, 4).unwrap();
            let body = [s.make_assign_stmt("x", Expr::constant(Literal::Nil, 5), 5).unwrap()]
                .into_iter()
                .collect();
            [s.make_while_stmt(cond, body, 4)].into_iter().collect()
        });
        assert_eq!(
            opcodes(&image),
            vec![OpCode::GotoIfNullL, OpCode::MoveL, OpCode::Goto, OpCode::ReturnNull]
        );
    }

    #[test]
    fn foreach_walks_the_list() {
        let (_, image) = compile_go(&["item", "items"], |s| {
            let items = s.make_expr_from_id("items", 4).unwrap();
            let stmt = s
                .make_foreach_stmt("item", items, StmtList::new(), 4)
                .unwrap();
            [stmt].into_iter().collect()
        });
        assert_eq!(
            opcodes(&image),
            vec![
                OpCode::MoveL,
                OpCode::GotoIfNullL,
                OpCode::FirstL,
                OpCode::RestL,
                OpCode::Goto,
                OpCode::ReturnNull,
            ]
        );
        // cursor is a temporary after the two locals
        assert_eq!(image.classes[0].handlers[0].num_locals, 3);
    }

    #[test]
    fn switch_compares_then_falls_through() {
        let (_, image) = compile_go(&["v", "r"], |s| {
            let v = s.make_expr_from_id("v", 4).unwrap();
            s.enter_switch();
            let one_body = [s.make_assign_stmt("r", number(10), 5).unwrap(), s.make_break(5).unwrap()]
                .into_iter()
                .collect();
            let one = s.make_case(number(1), one_body, 5).unwrap();
            let other_body = [s.make_assign_stmt("r", number(0), 6).unwrap()].into_iter().collect();
            let other = s.make_default_case(other_body, 6);
            s.leave_switch();
            [s.make_switch_stmt(v, vec![one, other], 4).unwrap()]
                .into_iter()
                .collect()
        });
        assert_eq!(
            opcodes(&image),
            vec![
                OpCode::EqL,
                OpCode::GotoIfTrueL,
                OpCode::Goto,
                OpCode::MoveL,
                OpCode::Goto,
                OpCode::MoveL,
                OpCode::ReturnNull,
            ]
        );
    }

    #[test]
    fn break_outside_loop_drops_handler() {
        let (s, image) = compile_go(&[], |_| {
            [Stmt::new(StmtKind::Break, 4)].into_iter().collect()
        });
        assert!(image.classes[0].handlers.is_empty());
        let error = s.diagnostics().errors().next().and_then(|d| d.error.clone());
        assert_eq!(error, Some(CompilationError::BreakOutsideLoop { line: 4 }));
    }

    #[test]
    fn trailing_return_is_not_doubled() {
        let (_, image) = compile_go(&[], |s| [s.make_return_stmt(Some(number(1)), 4)].into_iter().collect());
        assert_eq!(opcodes(&image), vec![OpCode::Return]);
    }
}
