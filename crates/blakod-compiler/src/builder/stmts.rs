//! Statements and loop/switch nesting.

use blakod_core::{CompilationError, IdKind};
use blakod_registry::IdRef;

use super::literals::fold_number;
use super::{NameRef, Result};
use crate::ast::{
    CallExpr, Condition, ElseClause, Expr, IfStmt, Stmt, StmtKind, StmtList, SwitchCase,
};
use crate::session::{CompilationSession, Nesting};

impl CompilationSession {
    pub fn make_if_stmt(
        &self,
        condition: Expr,
        then_body: StmtList,
        else_clause: ElseClause,
        line: u32,
    ) -> Stmt {
        Stmt::new(
            StmtKind::If(IfStmt {
                condition: Condition::Expr(condition),
                then_body,
                else_clause,
            }),
            line,
        )
    }

    /// `name = value`.
    pub fn make_assign_stmt(&mut self, name: &str, value: Expr, line: u32) -> Result<Stmt> {
        let target = self.lvalue(name, line)?;
        Ok(Stmt::new(StmtKind::Assign { target, value }, line))
    }

    /// Resolve the target of an assignment or a `foreach` variable.
    fn lvalue(&mut self, name: &str, line: u32) -> Result<IdRef> {
        let kind = match self.resolve_name(name, line)? {
            NameRef::Variable(id) => {
                let kind = self.symbols.get(id).kind;
                // Deferred members are checked against the layout later.
                if kind.is_lvalue() || kind == IdKind::Missing {
                    self.symbols.mark_referenced(id);
                    return Ok(id);
                }
                kind
            }
            NameRef::Value(_) => match self.symbols.lookup(name) {
                Some(id) => self.symbols.get(id).kind,
                None => IdKind::Constant,
            },
            NameRef::Other(_, kind) => kind,
            NameRef::Unknown => {
                return self.fail(CompilationError::UndefinedIdentifier {
                    name: name.to_string(),
                    line,
                });
            }
        };
        self.fail(CompilationError::NotAnLvalue {
            name: name.to_string(),
            kind,
            line,
        })
    }

    /// A call whose result is discarded.
    pub fn make_call_stmt(&self, call: CallExpr, line: u32) -> Stmt {
        Stmt::new(StmtKind::Call(call), line)
    }

    /// `foreach var in list`.
    pub fn make_foreach_stmt(
        &mut self,
        var: &str,
        list: Expr,
        body: StmtList,
        line: u32,
    ) -> Result<Stmt> {
        let var = self.lvalue(var, line)?;
        Ok(Stmt::new(
            StmtKind::Foreach {
                var,
                list,
                body,
                fused_null_test: false,
            },
            line,
        ))
    }

    pub fn make_while_stmt(&self, condition: Expr, body: StmtList, line: u32) -> Stmt {
        Stmt::new(
            StmtKind::While {
                condition: Condition::Expr(condition),
                body,
            },
            line,
        )
    }

    pub fn make_do_while_stmt(&self, body: StmtList, condition: Expr, line: u32) -> Stmt {
        Stmt::new(
            StmtKind::DoWhile {
                body,
                condition: Condition::Expr(condition),
            },
            line,
        )
    }

    /// `for (init; condition; step)`.
    pub fn make_for_stmt(
        &self,
        init: StmtList,
        condition: Expr,
        step: StmtList,
        body: StmtList,
        line: u32,
    ) -> Stmt {
        Stmt::new(
            StmtKind::For {
                init,
                condition: Condition::Expr(condition),
                step,
                body,
            },
            line,
        )
    }

    /// `case value:`. The value must be a constant.
    pub fn make_case(&mut self, value: Expr, body: StmtList, line: u32) -> Result<SwitchCase> {
        let value = match fold_number(&value) {
            Some(number) => Expr::constant(blakod_core::Literal::Number(number), value.line),
            None if value.as_constant().is_some() => value,
            None => {
                return self.fail(CompilationError::NotConstant {
                    name: "case".to_string(),
                    line,
                });
            }
        };
        Ok(SwitchCase {
            value: Some(value),
            body,
            line,
        })
    }

    pub fn make_default_case(&self, body: StmtList, line: u32) -> SwitchCase {
        SwitchCase {
            value: None,
            body,
            line,
        }
    }

    pub fn make_switch_stmt(&mut self, value: Expr, cases: Vec<SwitchCase>, line: u32) -> Result<Stmt> {
        if let Some(extra) = cases.iter().filter(|c| c.is_default()).nth(1) {
            let extra_line = extra.line;
            return self.fail(CompilationError::Misplaced {
                detail: "switch has more than one default case".to_string(),
                line: extra_line,
            });
        }
        Ok(Stmt::new(StmtKind::Switch { value, cases }, line))
    }

    /// `propagate`
    pub fn make_prop_stmt(&self, line: u32) -> Stmt {
        Stmt::new(StmtKind::Propagate, line)
    }

    pub fn make_return_stmt(&self, value: Option<Expr>, line: u32) -> Stmt {
        Stmt::new(StmtKind::Return(value), line)
    }

    /// `break`. Marks the handler failed when not inside a loop or switch.
    pub fn make_break(&mut self, line: u32) -> Result<Stmt> {
        if self.unit.nesting.is_empty() {
            return self.fail(CompilationError::BreakOutsideLoop { line });
        }
        Ok(Stmt::new(StmtKind::Break, line))
    }

    /// `continue`. Looks through enclosing switches to the nearest loop.
    pub fn make_continue(&mut self, line: u32) -> Result<Stmt> {
        if !self.unit.nesting.contains(&Nesting::Loop) {
            return self.fail(CompilationError::ContinueOutsideLoop { line });
        }
        Ok(Stmt::new(StmtKind::Continue, line))
    }

    pub fn enter_loop(&mut self) {
        self.unit.nesting.push(Nesting::Loop);
    }

    pub fn leave_loop(&mut self) {
        if self.unit.nesting.last() == Some(&Nesting::Loop) {
            self.unit.nesting.pop();
        }
    }

    pub fn enter_switch(&mut self) {
        self.unit.nesting.push(Nesting::Switch);
    }

    pub fn leave_switch(&mut self) {
        if self.unit.nesting.last() == Some(&Nesting::Switch) {
            self.unit.nesting.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use blakod_core::Literal;

    use super::*;

    fn session_in_handler() -> CompilationSession {
        let mut session = CompilationSession::default();
        session.begin_class("Foo", None, 1).unwrap();
        session
            .add_classvar("viKind", Expr::constant(Literal::Number(1), 2), 2)
            .unwrap();
        session.make_constant_id("LIMIT", Expr::constant(Literal::Number(9), 3), 3).unwrap();
        session.begin_message("Go", 4).unwrap();
        session.add_local("i", 5).unwrap();
        session
    }

    fn number(n: i32) -> Expr {
        Expr::constant(Literal::Number(n), 1)
    }

    #[test]
    fn assignment_targets() {
        let mut session = session_in_handler();
        assert!(session.make_assign_stmt("i", number(1), 6).is_ok());
        assert!(session.make_assign_stmt("self", number(1), 6).is_ok());
        assert!(matches!(
            session.make_assign_stmt("viKind", number(1), 7),
            Err(CompilationError::NotAnLvalue { kind: IdKind::ClassVar, .. })
        ));
        assert!(matches!(
            session.make_assign_stmt("LIMIT", number(1), 8),
            Err(CompilationError::NotAnLvalue { kind: IdKind::Constant, .. })
        ));
        assert!(matches!(
            session.make_assign_stmt("Foo", number(1), 9),
            Err(CompilationError::NotAnLvalue { kind: IdKind::Class, .. })
        ));
        assert!(matches!(
            session.make_assign_stmt("ghost", number(1), 10),
            Err(CompilationError::UndefinedIdentifier { .. })
        ));
    }

    #[test]
    fn break_needs_enclosing_loop_or_switch() {
        let mut session = session_in_handler();
        assert!(matches!(
            session.make_break(6),
            Err(CompilationError::BreakOutsideLoop { line: 6 })
        ));
        session.finish_message(None, StmtList::new(), 7).unwrap();
        assert!(session.classes()[0].handlers[0].failed);
    }

    #[test]
    fn continue_looks_through_switch() {
        let mut session = session_in_handler();
        session.enter_switch();
        assert!(session.make_break(6).is_ok());
        assert!(session.make_continue(6).is_err());
        session.leave_switch();

        session.enter_loop();
        session.enter_switch();
        assert!(session.make_continue(7).is_ok());
        session.leave_switch();
        session.leave_loop();
        assert!(session.make_break(8).is_err());
    }

    #[test]
    fn case_values_fold() {
        let mut session = session_in_handler();
        let limit = session.make_expr_from_id("LIMIT", 6).unwrap();
        let case = session.make_case(limit, StmtList::new(), 6).unwrap();
        assert_eq!(case.value, Some(Expr::constant(Literal::Number(9), 6)));

        let i = session.make_expr_from_id("i", 7).unwrap();
        assert!(matches!(
            session.make_case(i, StmtList::new(), 7),
            Err(CompilationError::NotConstant { .. })
        ));
    }

    #[test]
    fn one_default_per_switch() {
        let mut session = session_in_handler();
        let cases = vec![
            session.make_default_case(StmtList::new(), 6),
            session.make_default_case(StmtList::new(), 8),
        ];
        let i = session.make_expr_from_id("i", 5).unwrap();
        assert!(matches!(
            session.make_switch_stmt(i, cases, 5),
            Err(CompilationError::Misplaced { line: 8, .. })
        ));
    }

    #[test]
    fn foreach_variable_must_be_assignable() {
        let mut session = session_in_handler();
        let list = session.make_list_call(vec![number(1)], 6).unwrap();
        assert!(session.make_foreach_stmt("i", list.clone(), StmtList::new(), 6).is_ok());
        assert!(session.make_foreach_stmt("viKind", list, StmtList::new(), 7).is_err());
    }
}
