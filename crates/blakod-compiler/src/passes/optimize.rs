//! Optimizer - peephole rewrites on handler bodies.
//!
//! Three rewrites, applied bottom-up over every statement list:
//!
//! 1. Operators on numeric literals are folded into a constant, as are
//!    `=`/`<>` between two literals of the same kind. Division or modulo by
//!    zero is left for the runtime.
//! 2. An `if` whose condition is now a constant is replaced by the branch
//!    it always takes.
//! 3. A condition that is only a comparison against `$` becomes a null
//!    test, and every `foreach` walks its list with a null test.
//!
//! Running the optimizer again on its own output changes nothing.

use blakod_core::{BinaryOp, Literal};
use log::debug;

use crate::ast::{
    Condition, Constant, ElseClause, Expr, ExprKind, Stmt, StmtKind, StmtList, SwitchCase,
};
use crate::session::CompilationSession;

/// Rewrites handler bodies in place.
#[derive(Debug, Default)]
pub struct Optimizer {
    folded: usize,
    pruned: usize,
    fused: usize,
}

impl Optimizer {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self, session: &mut CompilationSession) {
        for class in &mut session.classes {
            for handler in &mut class.handlers {
                self.list(&mut handler.body);
            }
        }
        debug!(
            "optimizer: {} folds, {} branches pruned, {} null tests",
            self.folded, self.pruned, self.fused
        );
    }

    /// Optimize a statement list in place.
    pub fn list(&mut self, list: &mut StmtList) {
        let mut out = Vec::with_capacity(list.len());
        for stmt in list.take() {
            self.stmt(stmt, &mut out);
        }
        list.replace(out);
    }

    /// Optimize one statement, appending what replaces it.
    fn stmt(&mut self, mut stmt: Stmt, out: &mut Vec<Stmt>) {
        let taken = match &mut stmt.kind {
            StmtKind::If(if_stmt) => {
                self.condition(&mut if_stmt.condition);
                constant_truth(&if_stmt.condition)
            }
            _ => None,
        };
        if let Some(taken) = taken {
            let StmtKind::If(if_stmt) = stmt.kind else {
                return;
            };
            self.pruned += 1;
            if taken {
                self.splice(if_stmt.then_body, out);
            } else {
                match if_stmt.else_clause {
                    ElseClause::None => {}
                    ElseClause::Else(body) => self.splice(body, out),
                    ElseClause::ElseIf(chained) => self.stmt(*chained, out),
                }
            }
            return;
        }

        match &mut stmt.kind {
            StmtKind::If(if_stmt) => {
                self.list(&mut if_stmt.then_body);
                if_stmt.else_clause = self.else_clause(std::mem::take(&mut if_stmt.else_clause));
            }
            StmtKind::Assign { value, .. } => self.expr(value),
            StmtKind::Call(call) => {
                for arg in &mut call.args {
                    self.expr(arg.value_mut());
                }
            }
            StmtKind::Foreach {
                list,
                body,
                fused_null_test,
                ..
            } => {
                self.expr(list);
                self.list(body);
                if !*fused_null_test {
                    self.fused += 1;
                    *fused_null_test = true;
                }
            }
            StmtKind::While { condition, body } | StmtKind::DoWhile { body, condition } => {
                self.condition(condition);
                self.list(body);
            }
            StmtKind::For {
                init,
                condition,
                step,
                body,
            } => {
                self.list(init);
                self.condition(condition);
                self.list(step);
                self.list(body);
            }
            StmtKind::Switch { value, cases } => {
                self.expr(value);
                for SwitchCase { body, .. } in cases {
                    self.list(body);
                }
            }
            StmtKind::Return(Some(value)) => self.expr(value),
            StmtKind::Return(None)
            | StmtKind::Propagate
            | StmtKind::Break
            | StmtKind::Continue => {}
        }
        out.push(stmt);
    }

    fn splice(&mut self, mut body: StmtList, out: &mut Vec<Stmt>) {
        self.list(&mut body);
        out.extend(body.take());
    }

    fn else_clause(&mut self, clause: ElseClause) -> ElseClause {
        match clause {
            ElseClause::None => ElseClause::None,
            ElseClause::Else(mut body) => {
                self.list(&mut body);
                ElseClause::Else(body)
            }
            ElseClause::ElseIf(chained) => {
                let mut replaced = Vec::new();
                self.stmt(*chained, &mut replaced);
                match replaced.len() {
                    0 => ElseClause::None,
                    1 if matches!(replaced[0].kind, StmtKind::If(_)) => {
                        ElseClause::ElseIf(Box::new(replaced.remove(0)))
                    }
                    _ => ElseClause::Else(replaced.into_iter().collect()),
                }
            }
        }
    }

    fn condition(&mut self, condition: &mut Condition) {
        let expr = match condition {
            Condition::Expr(expr) => expr,
            Condition::IsNull(expr) | Condition::NotNull(expr) => {
                self.expr(expr);
                return;
            }
        };
        self.expr(expr);
        if let Some(fused) = null_test(expr) {
            self.fused += 1;
            *condition = fused;
        }
    }

    /// Fold constant subexpressions.
    pub fn expr(&mut self, expr: &mut Expr) {
        let folded = match &mut expr.kind {
            ExprKind::Binary { op, left, right } => {
                self.expr(left);
                self.expr(right);
                fold_binary(*op, left, right)
            }
            ExprKind::Unary { op, operand } => {
                self.expr(operand);
                operand.as_constant().and_then(Constant::as_number).and_then(|n| op.evaluate(n))
            }
            ExprKind::Call(call) => {
                for arg in &mut call.args {
                    self.expr(arg.value_mut());
                }
                None
            }
            ExprKind::Identifier(_) | ExprKind::Constant(_) => None,
        };
        if let Some(value) = folded {
            self.folded += 1;
            expr.kind = ExprKind::Constant(Literal::Number(value).into());
        }
    }
}

fn fold_binary(op: BinaryOp, left: &Expr, right: &Expr) -> Option<i32> {
    let (l, r) = (left.as_constant()?, right.as_constant()?);
    if let (Some(a), Some(b)) = (l.as_number(), r.as_number()) {
        return op.evaluate(a, b);
    }
    if op.is_equality() && l.kind() == r.kind() {
        let equal = l == r;
        return Some(((op == BinaryOp::Eq) == equal) as i32);
    }
    None
}

/// Whether a condition is known to be true or false.
fn constant_truth(condition: &Condition) -> Option<bool> {
    match condition {
        Condition::Expr(expr) => expr.as_constant()?.as_literal()?.truthiness(),
        _ => None,
    }
}

/// `x = $` or `x <> $` (either way round) as a null test on `x`.
fn null_test(expr: &Expr) -> Option<Condition> {
    let ExprKind::Binary { op, left, right } = &expr.kind else {
        return None;
    };
    if !op.is_equality() {
        return None;
    }
    let operand = match (left.is_nil(), right.is_nil()) {
        (false, true) => left,
        (true, false) => right,
        _ => return None,
    };
    let operand = (**operand).clone();
    Some(if *op == BinaryOp::Eq {
        Condition::IsNull(operand)
    } else {
        Condition::NotNull(operand)
    })
}

#[cfg(test)]
mod tests {
    use blakod_core::UnaryOp;
    use blakod_registry::IdRef;

    use super::*;
    use crate::ast::IfStmt;

    fn number(n: i32) -> Expr {
        Expr::constant(Literal::Number(n), 1)
    }

    fn nil() -> Expr {
        Expr::constant(Literal::Nil, 1)
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            1,
        )
    }

    fn var() -> Expr {
        // Identifiers are opaque to the optimizer.
        Expr::new(ExprKind::Identifier(test_ref()), 1)
    }

    fn test_ref() -> IdRef {
        let mut table = blakod_registry::IdentifierTable::new();
        table
            .define(blakod_registry::Definition::new(
                "x",
                blakod_core::IdKind::Local,
                blakod_registry::Scope::Local,
                1,
            ))
            .unwrap()
    }

    fn if_stmt(condition: Expr, then_body: StmtList, else_clause: ElseClause) -> Stmt {
        Stmt::new(
            StmtKind::If(IfStmt {
                condition: Condition::Expr(condition),
                then_body,
                else_clause,
            }),
            1,
        )
    }

    fn ret(n: i32) -> Stmt {
        Stmt::new(StmtKind::Return(Some(number(n))), 1)
    }

    #[test]
    fn folds_nested_arithmetic() {
        let mut expr = binary(
            BinaryOp::Add,
            number(2),
            binary(BinaryOp::Mul, number(3), number(4)),
        );
        Optimizer::new().expr(&mut expr);
        assert_eq!(expr, number(14));

        let mut neg = Expr::new(
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(number(5)),
            },
            1,
        );
        Optimizer::new().expr(&mut neg);
        assert_eq!(neg, number(-5));
    }

    #[test]
    fn division_by_zero_is_kept() {
        let mut expr = binary(BinaryOp::Div, number(1), number(0));
        let before = expr.clone();
        Optimizer::new().expr(&mut expr);
        assert_eq!(expr, before);
    }

    #[test]
    fn equal_literals_of_one_kind_fold() {
        let mut expr = binary(BinaryOp::Eq, nil(), nil());
        Optimizer::new().expr(&mut expr);
        assert_eq!(expr, number(1));
    }

    #[test]
    fn constant_if_is_replaced_by_taken_branch() {
        let mut list: StmtList = [
            if_stmt(
                number(0),
                [ret(1)].into_iter().collect(),
                ElseClause::Else([ret(2), ret(3)].into_iter().collect()),
            ),
            ret(4),
        ]
        .into_iter()
        .collect();
        Optimizer::new().list(&mut list);
        let expected: StmtList = [ret(2), ret(3), ret(4)].into_iter().collect();
        assert_eq!(list, expected);
    }

    #[test]
    fn pruned_else_if_chain_keeps_its_shape() {
        let inner = if_stmt(var(), [ret(2)].into_iter().collect(), ElseClause::None);
        let outer = if_stmt(
            var(),
            [ret(1)].into_iter().collect(),
            ElseClause::ElseIf(Box::new(if_stmt(
                number(0),
                StmtList::new(),
                ElseClause::ElseIf(Box::new(inner.clone())),
            ))),
        );
        let mut list: StmtList = [outer].into_iter().collect();
        Optimizer::new().list(&mut list);
        let StmtKind::If(top) = &list.iter().next().unwrap().kind else {
            panic!("expected if");
        };
        assert_eq!(top.else_clause, ElseClause::ElseIf(Box::new(inner)));
    }

    #[test]
    fn nil_comparison_becomes_null_test() {
        let mut list: StmtList = [
            if_stmt(binary(BinaryOp::Eq, nil(), var()), StmtList::new(), ElseClause::None),
            Stmt::new(
                StmtKind::While {
                    condition: Condition::Expr(binary(BinaryOp::Neq, var(), nil())),
                    body: StmtList::new(),
                },
                1,
            ),
        ]
        .into_iter()
        .collect();
        Optimizer::new().list(&mut list);
        let mut stmts = list.iter();
        let Some(StmtKind::If(first)) = stmts.next().map(|s| &s.kind) else {
            panic!("expected if");
        };
        assert_eq!(first.condition, Condition::IsNull(var()));
        let Some(StmtKind::While { condition, .. }) = stmts.next().map(|s| &s.kind) else {
            panic!("expected while");
        };
        assert_eq!(*condition, Condition::NotNull(var()));
    }

    #[test]
    fn second_run_changes_nothing() {
        let mut list: StmtList = [
            if_stmt(
                binary(BinaryOp::Eq, var(), nil()),
                [ret(1)].into_iter().collect(),
                ElseClause::None,
            ),
            Stmt::new(
                StmtKind::Foreach {
                    var: test_ref(),
                    list: var(),
                    body: [if_stmt(number(1), [ret(5)].into_iter().collect(), ElseClause::None)]
                        .into_iter()
                        .collect(),
                    fused_null_test: false,
                },
                1,
            ),
        ]
        .into_iter()
        .collect();
        Optimizer::new().list(&mut list);
        let once = list.clone();
        Optimizer::new().list(&mut list);
        assert_eq!(list, once);
    }
}
