//! Classes, members, message handlers and parameters.

use blakod_core::{CompilationError, IdKind};
use blakod_registry::{Definition, IdRef, Scope};
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};
use unicase::UniCase;

use super::Result;
use crate::ast::{Class, Expr, MemberDecl, MessageHandler, Param, StmtList};
use crate::layout::SELF_NAME;
use crate::session::{CompilationSession, HandlerState, PendingSuperclass, UnitState};

impl CompilationSession {
    /// Start a class.
    ///
    /// A superclass that is not a known class yet is recorded on the
    /// recompilation worklist and linked once every class has been seen.
    pub fn begin_class(&mut self, name: &str, superclass: Option<&str>, line: u32) -> Result<IdRef> {
        if let Some(index) = self.unit.class {
            let open = self.classes[index].name.clone();
            return self.fail(CompilationError::Misplaced {
                detail: format!("class '{name}' declared inside class '{open}'"),
                line,
            });
        }
        debug!("class {name} (line {line})");
        let id = self.define(Definition::new(name, IdKind::Class, Scope::Global, line))?;
        if self.class_index.contains_key(&id) {
            return self.fail(CompilationError::DuplicateDefinition {
                name: name.to_string(),
                kind: IdKind::Class,
                line,
            });
        }

        self.symbols.reset_scope(Scope::Class);
        self.symbols.reset_scope(Scope::Local);
        self.unit = UnitState::default();

        let superclass = match superclass {
            None => None,
            Some(super_name) => self.link_superclass(id, super_name, line)?,
        };
        let index = self.classes.len();
        self.classes.push(Class::new(id, name, superclass, line));
        self.class_index.insert(id, index);
        self.unit.class = Some(index);

        let class_id = self.symbols.get(id).id;
        self.define(
            Definition::new(SELF_NAME, IdKind::Property, Scope::Class, line).with_owner(class_id),
        )?;
        let (inherited, known) = self.collect_inherited(superclass);
        self.unit.inherited = inherited;
        self.unit.ancestors_known = known;
        Ok(id)
    }

    fn link_superclass(&mut self, class: IdRef, name: &str, line: u32) -> Result<Option<IdRef>> {
        let Some(id) = self.symbols.resolve(name, Scope::Global) else {
            let placeholder = self
                .symbols
                .declare_missing(name, line)
                .or_else(|error| self.fail(error))?;
            self.worklist.push(PendingSuperclass {
                class,
                superclass: placeholder,
                name: name.to_string(),
                line,
            });
            return Ok(Some(placeholder));
        };
        if self.symbols.get(id).kind != IdKind::Class {
            let class = self.symbols.get(class).name.clone();
            self.report(CompilationError::UndefinedSuperclass {
                class,
                superclass: name.to_string(),
                line,
            });
            self.check_aborted()?;
            return Ok(None);
        }
        Ok(Some(id))
    }

    /// Member names visible from the known part of the ancestor chain,
    /// nearest first. The flag is false when the chain reaches a class that
    /// has not been declared yet.
    fn collect_inherited(
        &self,
        superclass: Option<IdRef>,
    ) -> (FxHashMap<UniCase<String>, IdKind>, bool) {
        let mut names = FxHashMap::default();
        let mut seen = FxHashSet::default();
        let mut current = superclass;
        while let Some(id) = current {
            if !seen.insert(id) {
                // cycle; reported by the hierarchy resolver
                break;
            }
            if let Some(class) = self.class(id) {
                for decl in &class.properties {
                    names.entry(UniCase::new(decl.name.clone())).or_insert(IdKind::Property);
                }
                for decl in &class.classvars {
                    names.entry(UniCase::new(decl.name.clone())).or_insert(IdKind::ClassVar);
                }
                current = class.superclass;
                continue;
            }
            let ident = self.symbols.get(id);
            let Some(stored) = self.database.class(ident.id).filter(|_| ident.kind == IdKind::Class)
            else {
                return (names, false);
            };
            // Stored layouts already include every ancestor.
            for (name, _) in &stored.properties {
                names.entry(UniCase::new(name.clone())).or_insert(IdKind::Property);
            }
            for (name, _) in &stored.classvars {
                names.entry(UniCase::new(name.clone())).or_insert(IdKind::ClassVar);
            }
            break;
        }
        (names, true)
    }

    /// Declare a classvar with its initial value.
    pub fn add_classvar(&mut self, name: &str, value: Expr, line: u32) -> Result<IdRef> {
        self.add_member(name, IdKind::ClassVar, value, line)
    }

    /// Declare a property with its initial value.
    pub fn add_property(&mut self, name: &str, value: Expr, line: u32) -> Result<IdRef> {
        self.add_member(name, IdKind::Property, value, line)
    }

    fn add_member(&mut self, name: &str, kind: IdKind, value: Expr, line: u32) -> Result<IdRef> {
        let value = self.constant_of(name, &value, line)?;
        let class = self.open_class(kind.as_str(), line)?;
        let class_name = class.name.clone();
        let class_id = class.id;
        let ordinal = match kind {
            IdKind::ClassVar => class.classvars.len(),
            _ => class.properties.len(),
        } as u32;

        if let Some(existing) = self.symbols.resolve(name, Scope::Class) {
            let existing_kind = self.symbols.get(existing).kind;
            if existing_kind != kind && matches!(existing_kind, IdKind::Property | IdKind::ClassVar)
            {
                return self.fail(CompilationError::AmbiguousOverride {
                    name: name.to_string(),
                    class: class_name,
                    detail: format!("declared as both a {existing_kind} and a {kind}"),
                    line,
                });
            }
        }
        let owner = self.symbols.get(class_id).id;
        let id = self.define(
            Definition::new(name, kind, Scope::Class, line)
                .with_id(ordinal)
                .with_owner(owner),
        )?;
        let decl = MemberDecl {
            id,
            name: name.to_string(),
            value,
            line,
        };
        let class = self.open_class(kind.as_str(), line)?;
        match kind {
            IdKind::ClassVar => class.classvars.push(decl),
            _ => class.properties.push(decl),
        }
        Ok(id)
    }

    /// Close the current class.
    pub fn finish_class(&mut self, line: u32) -> Result<()> {
        if let Some(handler) = &self.unit.handler {
            let message = self.symbols.get(handler.message).name.clone();
            return self.fail(CompilationError::Misplaced {
                detail: format!("handler for '{message}' not finished before end of class"),
                line,
            });
        }
        let class = self.open_class("end of class", line)?;
        let resources: Vec<(IdRef, u32)> = class.resources.iter().map(|r| (r.id, r.line)).collect();
        if self.options.warn_unused_resources {
            for (id, decl_line) in resources {
                let ident = self.symbols.get(id);
                if ident.references == 0 {
                    let message = format!("resource '{}' is never used", ident.name);
                    self.warn(decl_line, message);
                }
            }
        }
        self.symbols.reset_scope(Scope::Class);
        self.symbols.reset_scope(Scope::Local);
        self.unit = UnitState::default();
        Ok(())
    }

    /// Start a message handler in the current class.
    pub fn begin_message(&mut self, name: &str, line: u32) -> Result<IdRef> {
        if self.unit.handler.is_some() {
            return self.fail(CompilationError::Misplaced {
                detail: format!("handler for '{name}' declared inside another handler"),
                line,
            });
        }
        let class_name = self.open_class("message handler", line)?.name.clone();
        let message = self.define(Definition::new(name, IdKind::Message, Scope::Global, line))?;
        let duplicate = self.open_class("message handler", line)?.handler(message).is_some();
        self.symbols.reset_scope(Scope::Local);
        self.unit.nesting.clear();
        // A duplicate is still opened so its body can be parsed; it is
        // dropped when finished.
        self.unit.handler = Some(HandlerState {
            message,
            params: Vec::new(),
            locals: Vec::new(),
            next_slot: 0,
            failed: duplicate,
            line,
        });
        if duplicate {
            return self.fail(CompilationError::DuplicateDefinition {
                name: format!("{class_name}::{name}"),
                kind: IdKind::Message,
                line,
            });
        }
        Ok(message)
    }

    /// Declare a parameter of the current handler.
    ///
    /// The name is also a global parameter id, which callers use for named
    /// arguments.
    pub fn make_parameter(&mut self, name: &str, default: Expr, line: u32) -> Result<IdRef> {
        let default = self.constant_of(name, &default, line)?;
        let handler = self.open_handler("parameter", line)?;
        let (slot, after_locals) = (handler.next_slot, !handler.locals.is_empty());
        if after_locals {
            return self.fail(CompilationError::Misplaced {
                detail: format!("parameter '{name}' declared after locals"),
                line,
            });
        }
        // Parameter names are shared globally but unique within a handler.
        if self.symbols.resolve(name, Scope::Local).is_some() {
            return self.fail(CompilationError::DuplicateDefinition {
                name: name.to_string(),
                kind: IdKind::Parameter,
                line,
            });
        }
        let global = self.define(Definition::new(name, IdKind::Parameter, Scope::Global, line))?;
        let global_id = self.symbols.get(global).id;
        let local = self.define(
            Definition::new(name, IdKind::Parameter, Scope::Local, line)
                .with_id(slot)
                .with_owner(global_id),
        )?;
        let handler = self.open_handler("parameter", line)?;
        handler.next_slot += 1;
        handler.params.push(Param {
            id: global,
            local,
            default,
            line,
        });
        Ok(local)
    }

    /// Declare a local variable of the current handler.
    pub fn add_local(&mut self, name: &str, line: u32) -> Result<IdRef> {
        let slot = self.open_handler("local", line)?.next_slot;
        let id = self.define(Definition::new(name, IdKind::Local, Scope::Local, line).with_id(slot))?;
        let handler = self.open_handler("local", line)?;
        handler.next_slot += 1;
        handler.locals.push(id);
        Ok(id)
    }

    /// Close the current handler with its body.
    ///
    /// A handler that reported a structural or capacity error is kept, but
    /// no code is generated for it.
    pub fn finish_message(&mut self, comment: Option<&str>, body: StmtList, line: u32) -> Result<()> {
        self.open_handler("end of message", line)?;
        let comment = comment.map(|text| self.debug_strings.intern(text));
        let Some(state) = self.unit.handler.take() else {
            return Ok(());
        };
        self.symbols.reset_scope(Scope::Local);
        self.unit.nesting.clear();
        if self.open_class("message handler", line)?.handler(state.message).is_some() {
            return Ok(());
        }
        let handler = MessageHandler {
            message: state.message,
            params: state.params,
            locals: state.locals,
            body,
            comment,
            line: state.line,
            failed: state.failed,
        };
        let class = self.open_class("message handler", line)?;
        class.handlers.push(handler);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use blakod_core::Literal;

    use super::*;
    use crate::ast::Constant;
    use crate::database::Kodbase;

    fn number(n: i32) -> Expr {
        Expr::constant(Literal::Number(n), 1)
    }

    #[test]
    fn class_scope_is_reset_per_class() {
        let mut session = CompilationSession::default();
        session.begin_class("Foo", None, 1).unwrap();
        session.add_property("piX", number(0), 2).unwrap();
        session.finish_class(3).unwrap();

        session.begin_class("Bar", None, 4).unwrap();
        assert_eq!(session.symbols().resolve("piX", Scope::Class), None);
        assert!(session.symbols().resolve("self", Scope::Class).is_some());
    }

    #[test]
    fn class_names_are_unique() {
        let mut session = CompilationSession::default();
        session.begin_class("Foo", None, 1).unwrap();
        session.finish_class(2).unwrap();
        assert!(matches!(
            session.begin_class("foo", None, 3),
            Err(CompilationError::DuplicateDefinition { .. })
        ));
    }

    #[test]
    fn forward_superclass_goes_on_worklist() {
        let mut session = CompilationSession::default();
        session.begin_class("Troll", Some("Monster"), 1).unwrap();
        assert_eq!(session.worklist().len(), 1);
        assert_eq!(session.worklist()[0].name, "Monster");
        session.finish_class(2).unwrap();
        session.begin_class("Monster", None, 3).unwrap();
        let placeholder = session.worklist()[0].superclass;
        assert_eq!(session.symbols().get(placeholder).kind, IdKind::Class);
    }

    #[test]
    fn property_and_classvar_with_one_name_are_ambiguous() {
        let mut session = CompilationSession::default();
        session.begin_class("Foo", None, 1).unwrap();
        session.add_classvar("V", number(1), 2).unwrap();
        assert!(matches!(
            session.add_property("v", number(2), 3),
            Err(CompilationError::AmbiguousOverride { .. })
        ));
    }

    #[test]
    fn member_values_must_be_constant() {
        let mut session = CompilationSession::default();
        session.begin_class("Foo", None, 1).unwrap();
        session.begin_message("Go", 2).unwrap();
        let self_expr = session.make_expr_from_id("self", 3).unwrap();
        session.finish_message(None, StmtList::new(), 4).unwrap();
        assert!(matches!(
            session.add_property("piX", self_expr, 5),
            Err(CompilationError::NotConstant { .. })
        ));
    }

    #[test]
    fn parameters_share_global_ids() {
        let mut session = CompilationSession::default();
        session.begin_class("Foo", None, 1).unwrap();
        session.begin_message("Constructor", 2).unwrap();
        let a = session.make_parameter("level", number(1), 2).unwrap();
        let local = session.add_local("i", 3).unwrap();
        session.finish_message(None, StmtList::new(), 4).unwrap();
        session.begin_message("Move", 5).unwrap();
        let b = session.make_parameter("level", number(0), 5).unwrap();
        session.finish_message(None, StmtList::new(), 6).unwrap();

        let symbols = session.symbols();
        assert_eq!(symbols.get(a).id, 0);
        assert_eq!(symbols.get(local).id, 1);
        assert_eq!(symbols.get(a).owner, symbols.get(b).owner);

        let class = &session.classes()[0];
        assert_eq!(class.handlers.len(), 2);
        assert_eq!(class.handlers[0].declared_slots(), 2);
        assert_eq!(class.handlers[0].params[0].default, Constant::from(Literal::Number(1)));
    }

    #[test]
    fn duplicate_handler_is_rejected() {
        let mut session = CompilationSession::default();
        session.begin_class("Foo", None, 1).unwrap();
        session.begin_message("Go", 2).unwrap();
        session.finish_message(None, StmtList::new(), 3).unwrap();
        assert!(matches!(
            session.begin_message("go", 4),
            Err(CompilationError::DuplicateDefinition { .. })
        ));
    }

    #[test]
    fn handler_outside_class_is_misplaced() {
        let mut session = CompilationSession::default();
        assert!(matches!(
            session.begin_message("Go", 1),
            Err(CompilationError::Misplaced { .. })
        ));
        assert!(matches!(
            session.add_local("x", 1),
            Err(CompilationError::Misplaced { .. })
        ));
    }

    #[test]
    fn unused_resources_warn() {
        let mut session = CompilationSession::default();
        session.begin_class("Foo", None, 1).unwrap();
        let text = session.make_string_resource("hi");
        session.make_resource("foo_rsc", text, 37, 2).unwrap();
        session.finish_class(3).unwrap();
        assert_eq!(session.diagnostics().warning_count(), 1);
    }

    #[test]
    fn inherited_members_from_kodbase() {
        let mut session = CompilationSession::default();
        let kodbase = Kodbase::parse("C Object 10000 0\nP piFlags 1\nV viKind 0\n").unwrap();
        session.load_kodbase(&kodbase).unwrap();
        session.begin_class("Thing", Some("Object"), 1).unwrap();
        assert!(session.worklist().is_empty());
        session.begin_message("Go", 2).unwrap();
        let flags = session.make_expr_from_id("piFlags", 3).unwrap();
        let ident = match flags.kind {
            crate::ast::ExprKind::Identifier(id) => session.symbols().get(id),
            _ => panic!("expected identifier"),
        };
        assert_eq!(ident.kind, IdKind::Property);
    }
}
