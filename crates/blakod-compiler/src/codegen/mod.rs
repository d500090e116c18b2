//! Code generator for Blakod.
//!
//! The [`CodeGenerator`] turns every class of a resolved session into a
//! [`ClassImage`]: resource tables, initial classvar and property values,
//! and one bytecode chunk per message handler. Handlers are compiled by a
//! [`HandlerCompiler`], split over:
//!
//! - [`expr`]: operands, operators and branch conditions
//! - [`stmt`]: statements and control flow
//! - [`call`]: builtin calls
//!
//! Generation only reads the session (apart from diagnostics), so running
//! it twice produces the same image.

mod call;
mod expr;
mod stmt;

use blakod_core::{CompilationError, IdKind, Literal};
use blakod_registry::IdRef;
use log::debug;

use crate::ast::{Class, Constant, MessageHandler};
use crate::bytecode::{BofImage, ClassImage, HandlerImage, ResourceImage};
use crate::emit::{BytecodeEmitter, Dest, Operand};
use crate::layout::{ClassLayout, Member};
use crate::session::CompilationSession;

type Result<T> = std::result::Result<T, CompilationError>;

/// Where a variable lives at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Place {
    Local(u32),
    Property(u32),
    ClassVar(u32),
}

impl Place {
    pub(crate) fn operand(self) -> Operand {
        match self {
            Place::Local(slot) => Operand::local(slot),
            Place::Property(slot) => Operand::property(slot),
            Place::ClassVar(slot) => Operand::classvar(slot),
        }
    }

    /// The place as a store destination. Classvars are read-only.
    pub(crate) fn dest(self) -> Option<Dest> {
        match self {
            Place::Local(slot) => Some(Dest::Local(slot)),
            Place::Property(slot) => Some(Dest::Property(slot)),
            Place::ClassVar(_) => None,
        }
    }
}

/// Generates the image for a resolved session.
pub struct CodeGenerator<'a> {
    session: &'a mut CompilationSession,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(session: &'a mut CompilationSession) -> Self {
        Self { session }
    }

    /// Generate every dirty class.
    ///
    /// Handlers that fail with a structural or capacity error are left out
    /// of the image; the errors are in the session diagnostics.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn generate(self) -> Result<BofImage> {
        let session = self.session;
        // Classes are read while the session records diagnostics.
        let classes = std::mem::take(&mut session.classes);
        let generated: Result<Vec<ClassImage>> = classes
            .iter()
            .filter(|class| class.dirty)
            .map(|class| generate_class(session, class))
            .collect();
        session.classes = classes;

        let mut image = BofImage::new(session.source_name());
        image.classes = generated?;
        image.debug_strings = session.debug_strings.iter().map(str::to_string).collect();
        debug!(
            "generated {} classes, {} debug strings",
            image.classes.len(),
            image.debug_strings.len()
        );
        Ok(image)
    }
}

fn generate_class(session: &mut CompilationSession, class: &Class) -> Result<ClassImage> {
    let Some(layout) = &class.layout else {
        return session.fail(CompilationError::Misplaced {
            detail: format!("class '{}' has no layout; resolve the hierarchy first", class.name),
            line: class.line,
        });
    };

    let resources = class
        .resources
        .iter()
        .map(|decl| ResourceImage {
            id: session.id_of(decl.id),
            variants: decl
                .variants
                .iter()
                .map(|(language, value)| (*language as u32, value.as_str().to_string()))
                .collect(),
        })
        .collect();

    let mut classvars = Vec::new();
    for decl in &class.classvars {
        if let Some(Member::ClassVar(slot)) = layout.member(&decl.name) {
            let value = const_literal(session, &decl.value, decl.line)?;
            classvars.push((slot, value.encode()));
        }
    }
    // Overrides introduced by this class redirect the classvar to the new
    // property slot.
    let inherited_properties = layout.num_properties - layout.own_new_properties;
    for pair in layout.overrides() {
        if pair.property > inherited_properties {
            classvars.push((pair.classvar, Literal::Override(pair.property).encode()));
        }
    }
    classvars.sort_unstable();

    let mut properties = Vec::new();
    for decl in &class.properties {
        if let Some(slot) = layout.member(&decl.name).and_then(|m| m.property_slot()) {
            let value = const_literal(session, &decl.value, decl.line)?;
            properties.push((slot, value.encode()));
        }
    }
    properties.sort_unstable();

    let mut handlers = Vec::new();
    for handler in &class.handlers {
        if handler.failed {
            debug!("skipping failed handler in {}", class.name);
            continue;
        }
        match HandlerCompiler::new(session, layout).compile(handler) {
            Ok(image) => handlers.push(image),
            Err(error @ CompilationError::TooManyErrors { .. }) => return Err(error),
            // Already reported; the handler is left out.
            Err(_) => {}
        }
    }

    Ok(ClassImage {
        class_id: layout.class_id,
        superclass_id: layout.superclass_id,
        resources,
        num_classvars: layout.num_classvars,
        classvars,
        num_properties: layout.num_properties,
        properties,
        handlers,
    })
}

/// The literal a constant denotes, now that every id is known.
///
/// A class literal whose class was never defined is reported and replaced
/// by `$`.
pub(crate) fn const_literal(
    session: &mut CompilationSession,
    constant: &Constant,
    line: u32,
) -> Result<Literal> {
    let (id, expected) = match *constant {
        Constant::Value(literal) => return Ok(literal),
        Constant::Class(id) => (id, IdKind::Class),
        Constant::Message(id) => (id, IdKind::Message),
    };
    let ident = session.symbols.get(id);
    if ident.kind != expected {
        let name = ident.name.clone();
        soft_error(session, CompilationError::UnresolvedReference { name, line })?;
        return Ok(Literal::Nil);
    }
    Ok(match expected {
        IdKind::Class => Literal::Class(ident.id),
        _ => Literal::Message(ident.id),
    })
}

/// Record an error that does not stop generation of the current handler.
pub(crate) fn soft_error(session: &mut CompilationSession, error: CompilationError) -> Result<()> {
    match session.report(error) {
        overflow @ CompilationError::TooManyErrors { .. } => Err(overflow),
        _ => Ok(()),
    }
}

/// Compiles one message handler.
///
/// Local slots are numbered parameters first, then declared locals, then
/// temporaries. Temporaries are allocated per statement and released when
/// the statement is done.
pub struct HandlerCompiler<'a> {
    session: &'a mut CompilationSession,
    layout: &'a ClassLayout,
    emitter: BytecodeEmitter,
    /// First temporary slot.
    declared: u32,
    /// Temporaries in use.
    temps: u32,
    max_temps: u32,
}

impl<'a> HandlerCompiler<'a> {
    pub fn new(session: &'a mut CompilationSession, layout: &'a ClassLayout) -> Self {
        Self {
            session,
            layout,
            emitter: BytecodeEmitter::new(),
            declared: 0,
            temps: 0,
            max_temps: 0,
        }
    }

    pub fn compile(mut self, handler: &MessageHandler) -> Result<HandlerImage> {
        self.declared = handler.declared_slots();
        self.emitter.set_line(handler.line);

        if handler.params.len() > u8::MAX as usize {
            return self.session.fail(CompilationError::EncodingOverflow {
                detail: format!("{} parameters, at most {}", handler.params.len(), u8::MAX),
                line: handler.line,
            });
        }
        let mut params = Vec::with_capacity(handler.params.len());
        for param in &handler.params {
            let default = const_literal(self.session, &param.default, param.line)?;
            params.push((self.session.id_of(param.id), default.encode()));
        }

        self.stmts(&handler.body)?;
        if !handler.body.last().is_some_and(|s| s.is_return()) {
            self.emitter.emit_return_null();
        }

        let line = self.emitter.current_line();
        let chunk = match self.emitter.finish() {
            Ok(chunk) => chunk,
            Err(error) => {
                return self.session.fail(CompilationError::Misplaced {
                    detail: error.to_string(),
                    line,
                });
            }
        };
        debug!(
            "handler {}: {} bytes, {} temporaries",
            self.session.name_of(handler.message),
            chunk.len(),
            self.max_temps
        );
        Ok(HandlerImage {
            message_id: self.session.id_of(handler.message),
            comment: handler.comment.map_or(-1, |index| index as i32),
            params,
            num_locals: self.declared + self.max_temps,
            chunk,
        })
    }

    // ==========================================================================
    // Slots
    // ==========================================================================

    /// Allocate a temporary local.
    fn temp(&mut self) -> u32 {
        let slot = self.declared + self.temps;
        self.temps += 1;
        self.max_temps = self.max_temps.max(self.temps);
        slot
    }

    /// Resolve a variable to its slot.
    ///
    /// Class members go through the class layout, so inherited members,
    /// members of late-declared ancestors and overrides all land on the
    /// right slot. Returns `None` after reporting a name that has no slot.
    fn place(&mut self, id: IdRef, line: u32) -> Result<Option<Place>> {
        let ident = self.session.symbols.get(id);
        match ident.kind {
            IdKind::Local | IdKind::Parameter => Ok(Some(Place::Local(ident.id))),
            IdKind::Property | IdKind::ClassVar | IdKind::Missing => {
                match self.layout.member(&ident.name) {
                    Some(Member::Property(slot)) | Some(Member::Override { property: slot, .. }) => {
                        Ok(Some(Place::Property(slot)))
                    }
                    Some(Member::ClassVar(slot)) => Ok(Some(Place::ClassVar(slot))),
                    None => {
                        let name = ident.name.clone();
                        soft_error(self.session, CompilationError::UndefinedIdentifier { name, line })?;
                        Ok(None)
                    }
                }
            }
            kind => {
                let name = ident.name.clone();
                soft_error(self.session, CompilationError::NotAValue { name, kind, line })?;
                Ok(None)
            }
        }
    }

    /// Resolve an assignment target.
    fn target(&mut self, id: IdRef, line: u32) -> Result<Option<Dest>> {
        let Some(place) = self.place(id, line)? else {
            return Ok(None);
        };
        if let Some(dest) = place.dest() {
            return Ok(Some(dest));
        }
        let name = self.session.name_of(id).to_string();
        soft_error(
            self.session,
            CompilationError::NotAnLvalue {
                name,
                kind: IdKind::ClassVar,
                line,
            },
        )?;
        Ok(None)
    }
}
