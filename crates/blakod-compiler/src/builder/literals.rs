//! Constants, resources and literal references.

use blakod_core::language::language_id;
use blakod_core::limits::{MAX_LANGUAGE_ID, fits_kod_int};
use blakod_core::{CompilationError, IdKind, Literal, ResourceValue};
use blakod_registry::{Definition, IdRef, Scope};
use log::trace;

use super::{NameRef, Result};
use crate::ast::{Constant, Expr, ResourceDecl};
use crate::session::CompilationSession;

impl CompilationSession {
    /// A numeric literal. Values outside the 28-bit range are rejected.
    pub fn make_numeric_constant(&mut self, value: i64, line: u32) -> Result<Constant> {
        if !fits_kod_int(value) {
            return self.fail(CompilationError::NumberOutOfRange { value, line });
        }
        Ok(Literal::Number(value as i32).into())
    }

    /// `$`
    pub fn make_nil_constant(&self) -> Constant {
        Literal::Nil.into()
    }

    /// A string literal in code. The text goes into the debug string pool.
    pub fn make_string_constant(&mut self, text: &str) -> Constant {
        Literal::DebugString(self.debug_strings.intern(text)).into()
    }

    /// The text of a string resource.
    pub fn make_string_resource(&self, text: &str) -> ResourceValue {
        ResourceValue::Text(text.to_string())
    }

    /// The file name of a file resource.
    pub fn make_fname_resource(&self, file: &str) -> ResourceValue {
        ResourceValue::FileName(file.to_string())
    }

    /// `&Name`. A class that has not been declared yet gets a placeholder
    /// that must be defined before code generation.
    pub fn make_literal_class(&mut self, name: &str, line: u32) -> Result<Constant> {
        let id = self.reference_global(name, IdKind::Class, line)?;
        Ok(Constant::Class(id))
    }

    /// `@Name`. Messages are shared names, so an unknown message is simply
    /// defined.
    pub fn make_literal_message(&mut self, name: &str, line: u32) -> Result<Constant> {
        let id = self.define(Definition::new(name, IdKind::Message, Scope::Global, line))?;
        Ok(Constant::Message(id))
    }

    fn reference_global(&mut self, name: &str, kind: IdKind, line: u32) -> Result<IdRef> {
        if let Some(id) = self.symbols.resolve(name, Scope::Global) {
            let existing = self.symbols.get(id).kind;
            if existing != kind {
                return self.fail(CompilationError::Redefinition {
                    name: name.to_string(),
                    existing,
                    requested: kind,
                    line,
                });
            }
            self.symbols.mark_referenced(id);
            return Ok(id);
        }
        let id = self
            .symbols
            .declare_missing(name, line)
            .or_else(|error| self.fail(error))?;
        self.symbols.mark_referenced(id);
        Ok(id)
    }

    /// The value of a named constant (`name` in a constant expression).
    pub fn make_number_from_constant_id(&mut self, name: &str, line: u32) -> Result<Constant> {
        let value = self.unit.class.and_then(|index| self.classes[index].constants.get(name));
        match value.or_else(|| self.global_constants.get(name)) {
            Some(value) => Ok(Literal::Number(value).into()),
            None => self.fail(CompilationError::UndefinedIdentifier {
                name: name.to_string(),
                line,
            }),
        }
    }

    /// Declare a class constant. The value must fold to a number.
    pub fn make_constant_id(&mut self, name: &str, value: Expr, line: u32) -> Result<IdRef> {
        let Some(number) = fold_number(&value) else {
            return self.fail(CompilationError::NotConstant {
                name: name.to_string(),
                line,
            });
        };
        let class = self.open_class("constant", line)?;
        let class_id = class.id;
        match class.constants.insert(name, number) {
            Ok(index) => {
                if let Some(id) = self.symbols.resolve(name, Scope::Class) {
                    if self.symbols.get(id).kind == IdKind::Constant {
                        return Ok(id);
                    }
                }
                let owner = self.symbols.get(class_id).id;
                self.define(
                    Definition::new(name, IdKind::Constant, Scope::Class, line)
                        .with_id(index as u32)
                        .with_owner(owner),
                )
            }
            Err(_) => self.fail(CompilationError::DuplicateDefinition {
                name: name.to_string(),
                kind: IdKind::Constant,
                line,
            }),
        }
    }

    /// Declare a constant visible to every class (from an include file).
    pub fn define_global_constant(&mut self, name: &str, value: i64, line: u32) -> Result<IdRef> {
        if !fits_kod_int(value) {
            return self.fail(CompilationError::NumberOutOfRange { value, line });
        }
        match self.global_constants.insert(name, value as i32) {
            Ok(index) => {
                if let Some(id) = self.symbols.resolve(name, Scope::Global) {
                    if self.symbols.get(id).kind == IdKind::Constant {
                        return Ok(id);
                    }
                }
                self.define(
                    Definition::new(name, IdKind::Constant, Scope::Global, line).with_id(index as u32),
                )
            }
            Err(_) => self.fail(CompilationError::DuplicateDefinition {
                name: name.to_string(),
                kind: IdKind::Constant,
                line,
            }),
        }
    }

    /// Language id for a language code such as `en`.
    pub fn make_language_id(&mut self, code: &str, line: u32) -> Result<u8> {
        match language_id(code) {
            Some(id) => Ok(id),
            None => self.fail(CompilationError::InvalidLanguage {
                language: code.to_string(),
                line,
            }),
        }
    }

    /// Declare a resource of the current class, or add a language variant
    /// to one it already declared.
    pub fn make_resource(
        &mut self,
        name: &str,
        value: ResourceValue,
        language: u8,
        line: u32,
    ) -> Result<IdRef> {
        if language as usize >= MAX_LANGUAGE_ID {
            return self.fail(CompilationError::InvalidLanguage {
                language: language.to_string(),
                line,
            });
        }
        let existing = self.symbols.resolve(name, Scope::Global);
        let class = self.open_class("resource", line)?;
        if let Some(id) = existing {
            if let Some(decl) = class.resources.iter_mut().find(|r| r.id == id) {
                if decl.variant(language).is_some() {
                    return self.fail(CompilationError::DuplicateDefinition {
                        name: name.to_string(),
                        kind: IdKind::Resource,
                        line,
                    });
                }
                decl.variants.push((language, value));
                return Ok(id);
            }
        }

        let id = self.define(Definition::new(name, IdKind::Resource, Scope::Global, line))?;
        self.symbols.get_mut(id).is_string_resource = matches!(value, ResourceValue::Text(_));
        trace!("resource {name} = {}", self.symbols.get(id).id);
        let class = self.open_class("resource", line)?;
        class.resources.push(ResourceDecl {
            id,
            variants: vec![(language, value)],
            line,
        });
        Ok(id)
    }

    /// The constant a name denotes in a constant context, such as a
    /// classvar initial value or a parameter default.
    pub(crate) fn constant_of(&mut self, name: &str, value: &Expr, line: u32) -> Result<Constant> {
        if let Some(number) = fold_number(value) {
            return Ok(Literal::Number(number).into());
        }
        match value.as_constant() {
            Some(constant) => Ok(*constant),
            None => self.fail(CompilationError::NotConstant {
                name: name.to_string(),
                line,
            }),
        }
    }

    /// A bare name in a constant context.
    pub fn make_constant_from_id(&mut self, name: &str, line: u32) -> Result<Constant> {
        match self.resolve_name(name, line)? {
            NameRef::Value(constant) => Ok(constant),
            _ => self.fail(CompilationError::NotConstant {
                name: name.to_string(),
                line,
            }),
        }
    }
}

/// Fold an expression of numeric literals to its value.
pub(crate) fn fold_number(expr: &Expr) -> Option<i32> {
    use crate::ast::ExprKind;
    match &expr.kind {
        ExprKind::Constant(constant) => constant.as_number(),
        ExprKind::Unary { op, operand } => op.evaluate(fold_number(operand)?),
        ExprKind::Binary { op, left, right } => {
            op.evaluate(fold_number(left)?, fold_number(right)?)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use blakod_core::BinaryOp;

    use super::*;
    use crate::ast::ExprKind;

    fn session_with_class() -> CompilationSession {
        let mut session = CompilationSession::default();
        session.begin_class("Room", None, 1).unwrap();
        session
    }

    #[test]
    fn numbers_must_fit() {
        let mut session = CompilationSession::default();
        assert_eq!(
            session.make_numeric_constant(134_217_727, 1).unwrap(),
            Literal::Number(134_217_727).into()
        );
        assert!(matches!(
            session.make_numeric_constant(134_217_728, 2),
            Err(CompilationError::NumberOutOfRange { line: 2, .. })
        ));
        assert_eq!(session.diagnostics().error_count(), 1);
    }

    #[test]
    fn strings_share_pool_entries() {
        let mut session = CompilationSession::default();
        let a = session.make_string_constant("hello");
        let b = session.make_string_constant("world");
        let c = session.make_string_constant("hello");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(session.debug_strings().len(), 2);
    }

    #[test]
    fn forward_class_literal_is_promoted() {
        let mut session = CompilationSession::default();
        let Constant::Class(placeholder) = session.make_literal_class("Troll", 1).unwrap() else {
            panic!("expected class literal");
        };
        assert_eq!(session.symbols().get(placeholder).kind, IdKind::Missing);

        session.begin_class("Troll", None, 5).unwrap();
        assert_eq!(session.symbols().get(placeholder).kind, IdKind::Class);
    }

    #[test]
    fn message_literal_defines_message() {
        let mut session = CompilationSession::default();
        let Constant::Message(id) = session.make_literal_message("Delete", 1).unwrap() else {
            panic!("expected message literal");
        };
        assert_eq!(session.symbols().get(id).kind, IdKind::Message);
        assert_eq!(session.make_literal_message("delete", 2).unwrap(), Constant::Message(id));
    }

    #[test]
    fn class_constants_fold_and_resolve() {
        let mut session = session_with_class();
        let expr = Expr::new(
            ExprKind::Binary {
                op: BinaryOp::Mul,
                left: Box::new(Expr::constant(Literal::Number(6), 2)),
                right: Box::new(Expr::constant(Literal::Number(7), 2)),
            },
            2,
        );
        session.make_constant_id("ANSWER", expr, 2).unwrap();
        assert_eq!(
            session.make_number_from_constant_id("answer", 3).unwrap(),
            Literal::Number(42).into()
        );

        let not_constant = session.make_string_constant("x");
        assert!(matches!(
            session.make_constant_id("BAD", Expr::constant(not_constant, 4), 4),
            Err(CompilationError::NotConstant { .. })
        ));
    }

    #[test]
    fn global_constants_allow_identical_restatement() {
        let mut session = CompilationSession::default();
        let first = session.define_global_constant("TRUE", 1, 1).unwrap();
        assert_eq!(session.define_global_constant("TRUE", 1, 9).unwrap(), first);
        assert!(matches!(
            session.define_global_constant("TRUE", 2, 10),
            Err(CompilationError::DuplicateDefinition { .. })
        ));
    }

    #[test]
    fn one_variant_per_language() {
        let mut session = session_with_class();
        let english = session.make_language_id("en", 2).unwrap();
        let german = session.make_language_id("de", 2).unwrap();
        let hi = session.make_string_resource("hello");
        let id = session.make_resource("room_name", hi.clone(), english, 2).unwrap();
        let hallo = session.make_string_resource("hallo");
        assert_eq!(session.make_resource("room_name", hallo, german, 3).unwrap(), id);
        assert!(matches!(
            session.make_resource("room_name", hi, english, 4),
            Err(CompilationError::DuplicateDefinition { .. })
        ));
        assert!(session.make_language_id("xx-bogus", 5).is_err());

        let class = &session.classes()[0];
        assert_eq!(class.resources.len(), 1);
        assert_eq!(class.resources[0].variants.len(), 2);
        assert!(session.symbols().get(id).is_string_resource);
    }
}
