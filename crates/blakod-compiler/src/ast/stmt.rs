//! Statement nodes.

use blakod_registry::IdRef;

use super::expr::{CallExpr, Condition, Expr};

/// An ordered list of statements.
///
/// Statements are only ever appended, in source order, through
/// [`StmtList::add_statement`]. The optimizer is the only code that
/// rewrites a list after it is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StmtList(Vec<Stmt>);

impl StmtList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_statement(&mut self, stmt: Stmt) {
        self.0.push(stmt);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Stmt> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&Stmt> {
        self.0.last()
    }

    pub(crate) fn take(&mut self) -> Vec<Stmt> {
        std::mem::take(&mut self.0)
    }

    pub(crate) fn replace(&mut self, stmts: Vec<Stmt>) {
        self.0 = stmts;
    }
}

impl FromIterator<Stmt> for StmtList {
    fn from_iter<I: IntoIterator<Item = Stmt>>(iter: I) -> Self {
        let mut list = StmtList::new();
        for stmt in iter {
            list.add_statement(stmt);
        }
        list
    }
}

impl<'a> IntoIterator for &'a StmtList {
    type Item = &'a Stmt;
    type IntoIter = std::slice::Iter<'a, Stmt>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A statement with the line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: u32,
}

impl Stmt {
    pub fn new(kind: StmtKind, line: u32) -> Self {
        Self { kind, line }
    }

    /// Whether control never continues past this statement.
    pub fn is_return(&self) -> bool {
        matches!(self.kind, StmtKind::Return(_) | StmtKind::Propagate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    If(IfStmt),
    Assign {
        target: IdRef,
        value: Expr,
    },
    Call(CallExpr),
    Foreach {
        var: IdRef,
        list: Expr,
        body: StmtList,
        /// Test for the end of the list with a null-test branch.
        fused_null_test: bool,
    },
    While {
        condition: Condition,
        body: StmtList,
    },
    DoWhile {
        body: StmtList,
        condition: Condition,
    },
    For {
        init: StmtList,
        condition: Condition,
        step: StmtList,
        body: StmtList,
    },
    Switch {
        value: Expr,
        cases: Vec<SwitchCase>,
    },
    /// `propagate`: pass the current message on to the superclass.
    Propagate,
    Return(Option<Expr>),
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfStmt {
    pub condition: Condition,
    pub then_body: StmtList,
    pub else_clause: ElseClause,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ElseClause {
    #[default]
    None,
    /// `else if ...`; holds the chained `if` statement.
    ElseIf(Box<Stmt>),
    Else(StmtList),
}

/// One arm of a switch. `value` is `None` for the default case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchCase {
    pub value: Option<Expr>,
    pub body: StmtList,
    pub line: u32,
}

impl SwitchCase {
    pub fn is_default(&self) -> bool {
        self.value.is_none()
    }
}
