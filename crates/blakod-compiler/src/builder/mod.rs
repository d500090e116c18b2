//! Builder operations called by the parser.
//!
//! The parser drives a [`CompilationSession`] with one call per construct,
//! in source order, each annotated with the construct's line. Every
//! operation validates what it can see locally, records any error in the
//! session diagnostics and also returns it, so the parser can substitute a
//! placeholder and keep going.
//!
//! - [`literals`]: constants, resources and literal references
//! - [`classes`]: classes, members, message handlers and parameters
//! - [`exprs`]: expressions and calls
//! - [`stmts`]: statements and loop/switch nesting
//!
//! A typical sequence for one class:
//!
//! ```
//! use blakod_compiler::{CompilationSession, ast::{StmtList, Expr}};
//!
//! let mut s = CompilationSession::default();
//! s.begin_class("Monster", None, 1).unwrap();
//! let hits = s.make_numeric_constant(10, 3).unwrap();
//! s.add_property("piHits", Expr::constant(hits, 3), 3).unwrap();
//! s.begin_message("GetHits", 5).unwrap();
//! let value = s.make_expr_from_id("piHits", 6).unwrap();
//! let mut body = StmtList::new();
//! body.add_statement(s.make_return_stmt(Some(value), 6));
//! s.finish_message(None, body, 7).unwrap();
//! s.finish_class(8).unwrap();
//!
//! let output = s.compile().unwrap();
//! assert_eq!(output.image.classes.len(), 1);
//! ```
//!
//! [`literals`]: self::literals
//! [`classes`]: self::classes
//! [`exprs`]: self::exprs
//! [`stmts`]: self::stmts

mod classes;
mod exprs;
mod literals;
mod stmts;

use blakod_core::{CompilationError, IdKind, Literal};
use blakod_registry::{Definition, IdRef, Scope};
use unicase::UniCase;

use crate::ast::{Class, Constant};
use crate::session::{CompilationSession, HandlerState};

type Result<T> = std::result::Result<T, CompilationError>;

/// What a bare name in an expression refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NameRef {
    /// A local, parameter or class member.
    Variable(IdRef),
    /// A named constant or a resource.
    Value(Constant),
    /// A name that exists but does not denote a value.
    Other(IdRef, IdKind),
    Unknown,
}

impl CompilationSession {
    /// The class being built.
    pub(crate) fn open_class(&mut self, what: &str, line: u32) -> Result<&mut Class> {
        match self.unit.class {
            Some(index) => Ok(&mut self.classes[index]),
            None => self.fail(CompilationError::Misplaced {
                detail: format!("{what} outside a class"),
                line,
            }),
        }
    }

    /// The message handler being built.
    pub(crate) fn open_handler(&mut self, what: &str, line: u32) -> Result<&mut HandlerState> {
        match self.unit.handler {
            Some(ref mut handler) => Ok(handler),
            None => self.fail(CompilationError::Misplaced {
                detail: format!("{what} outside a message handler"),
                line,
            }),
        }
    }

    /// Define an identifier, recording a failure.
    pub(crate) fn define(&mut self, def: Definition<'_>) -> Result<IdRef> {
        self.symbols.define(def).or_else(|error| self.fail(error))
    }

    /// Resolve a name as an expression would see it: local scope, then the
    /// class's own members, then inherited members, then global names.
    pub(crate) fn resolve_name(&mut self, name: &str, line: u32) -> Result<NameRef> {
        if let Some(id) = self.symbols.resolve(name, Scope::Local) {
            return Ok(self.classify(id));
        }
        if let Some(id) = self.symbols.resolve(name, Scope::Class) {
            return Ok(self.classify(id));
        }
        if self.unit.class.is_some() {
            let inherited = self
                .unit
                .inherited
                .get(&UniCase::new(name.to_string()))
                .copied();
            if let Some(kind) = inherited {
                let id = self.define(Definition::new(name, kind, Scope::Class, line))?;
                return Ok(NameRef::Variable(id));
            }
        }
        if let Some(id) = self.symbols.resolve(name, Scope::Global) {
            // A global parameter only names a slot inside a handler that
            // declares it.
            let named = match self.symbols.get(id).kind {
                IdKind::Parameter => NameRef::Other(id, IdKind::Parameter),
                _ => self.classify(id),
            };
            if matches!(named, NameRef::Other(..)) && self.deferring_members() {
                return self.defer_member(name, line);
            }
            return Ok(named);
        }
        if self.deferring_members() {
            return self.defer_member(name, line);
        }
        Ok(NameRef::Unknown)
    }

    fn classify(&mut self, id: IdRef) -> NameRef {
        let ident = self.symbols.get(id);
        match ident.kind {
            // Class-scope placeholders are members of an undeclared ancestor.
            IdKind::Local
            | IdKind::Parameter
            | IdKind::Property
            | IdKind::ClassVar
            | IdKind::Missing => NameRef::Variable(id),
            IdKind::Constant => NameRef::Value(Literal::Number(self.constant_value(id)).into()),
            IdKind::Resource => {
                let value = Literal::Resource(ident.id);
                self.symbols.mark_referenced(id);
                NameRef::Value(value.into())
            }
            kind => NameRef::Other(id, kind),
        }
    }

    /// Whether unknown names may be members of an ancestor that has not
    /// been declared yet.
    fn deferring_members(&self) -> bool {
        self.unit.class.is_some() && !self.unit.ancestors_known
    }

    /// Treat `name` as a member of an ancestor that is not known yet. It is
    /// looked up in the class layout during code generation.
    fn defer_member(&mut self, name: &str, line: u32) -> Result<NameRef> {
        let id = self.define(Definition::new(name, IdKind::Missing, Scope::Class, line))?;
        Ok(NameRef::Variable(id))
    }

    /// Value of a class or global constant identifier.
    fn constant_value(&self, id: IdRef) -> i32 {
        let ident = self.symbols.get(id);
        let table = match self.unit.class {
            Some(index) if self.symbols.resolve(&ident.name, Scope::Class) == Some(id) => {
                &self.classes[index].constants
            }
            _ => &self.global_constants,
        };
        table.get(&ident.name).unwrap_or_default()
    }
}
