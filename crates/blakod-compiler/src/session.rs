//! The compilation session.
//!
//! A [`CompilationSession`] owns every table the compiler uses: the
//! identifier scopes, the classes built so far, the debug string pool, the
//! include-file constants, the recompilation worklist and the diagnostics.
//! The parser drives it through the builder operations (see
//! [`crate::builder`]); once every file is parsed, [`compile`] runs the
//! remaining phases in order.
//!
//! The class and local scopes live for exactly one class or message
//! handler. Everything else lives until [`reset`] is called.
//!
//! [`compile`]: CompilationSession::compile
//! [`reset`]: CompilationSession::reset

use blakod_core::{CompilationError, Diagnostics, IdKind};
use blakod_registry::{Definition, IdRef, IdentifierTable, Scope};
use log::debug;
use rustc_hash::FxHashMap;
use unicase::UniCase;

use crate::ast::{Class, ConstantTable, Param};
use crate::bytecode::BofImage;
use crate::codegen::CodeGenerator;
use crate::database::{Kodbase, KodbaseClass};
use crate::options::CompileOptions;
use crate::passes::{HierarchyResolver, Optimizer, RecompilationPlanner, RecompilePlan};

type Result<T> = std::result::Result<T, CompilationError>;

/// A class whose superclass was not a known class when it was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSuperclass {
    pub class: IdRef,
    /// Placeholder for the superclass, promoted in place once defined.
    pub superclass: IdRef,
    pub name: String,
    pub line: u32,
}

/// Append-only pool of strings kept for runtime debugging.
#[derive(Debug, Clone, Default)]
pub struct DebugStrings {
    strings: Vec<String>,
    index: FxHashMap<String, u32>,
}

impl DebugStrings {
    /// Index of `s`, adding it if it is not in the pool yet.
    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(&index) = self.index.get(s) {
            return index;
        }
        let index = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), index);
        index
    }

    pub fn get(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// Breakable construct enclosing the statement being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Nesting {
    Loop,
    Switch,
}

/// State of the message handler being built.
#[derive(Debug)]
pub(crate) struct HandlerState {
    pub message: IdRef,
    pub params: Vec<Param>,
    pub locals: Vec<IdRef>,
    pub next_slot: u32,
    pub failed: bool,
    pub line: u32,
}

/// State of the class being built.
#[derive(Debug, Default)]
pub(crate) struct UnitState {
    /// Index of the class in `classes`.
    pub class: Option<usize>,
    /// Member names visible from known ancestors.
    pub inherited: FxHashMap<UniCase<String>, IdKind>,
    /// False when the superclass chain runs into a forward reference, so
    /// unknown names may still turn out to be inherited members.
    pub ancestors_known: bool,
    pub handler: Option<HandlerState>,
    pub nesting: Vec<Nesting>,
}

/// Output of a complete compilation run.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub image: BofImage,
    pub plan: RecompilePlan,
}

/// Symbol tables and classes for one compilation session.
#[derive(Debug)]
pub struct CompilationSession {
    pub(crate) options: CompileOptions,
    pub(crate) symbols: IdentifierTable,
    pub(crate) classes: Vec<Class>,
    pub(crate) class_index: FxHashMap<IdRef, usize>,
    pub(crate) global_constants: ConstantTable,
    pub(crate) debug_strings: DebugStrings,
    pub(crate) worklist: Vec<PendingSuperclass>,
    pub(crate) database: Kodbase,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) unit: UnitState,
    source_name: String,
}

impl Default for CompilationSession {
    fn default() -> Self {
        Self::new(CompileOptions::default())
    }
}

impl CompilationSession {
    pub fn new(options: CompileOptions) -> Self {
        let diagnostics = Diagnostics::with_limit(options.max_errors);
        Self {
            options,
            symbols: IdentifierTable::new(),
            classes: Vec::new(),
            class_index: FxHashMap::default(),
            global_constants: ConstantTable::new(),
            debug_strings: DebugStrings::default(),
            worklist: Vec::new(),
            database: Kodbase::new(),
            diagnostics,
            unit: UnitState::default(),
            source_name: String::new(),
        }
    }

    /// Forget everything except the options.
    pub fn reset(&mut self) {
        debug!("resetting compilation session");
        *self = Self::new(self.options.clone());
    }

    // ==========================================================================
    // Accessors
    // ==========================================================================

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn symbols(&self) -> &IdentifierTable {
        &self.symbols
    }

    /// Classes in declaration order.
    pub fn classes(&self) -> &[Class] {
        &self.classes
    }

    pub fn class(&self, id: IdRef) -> Option<&Class> {
        self.class_index.get(&id).map(|&index| &self.classes[index])
    }

    pub fn class_by_name(&self, name: &str) -> Option<&Class> {
        self.symbols
            .resolve(name, Scope::Global)
            .and_then(|id| self.class(id))
    }

    pub fn debug_strings(&self) -> &DebugStrings {
        &self.debug_strings
    }

    pub fn global_constants(&self) -> &ConstantTable {
        &self.global_constants
    }

    /// Classes whose superclass was a forward reference when declared.
    pub fn worklist(&self) -> &[PendingSuperclass] {
        &self.worklist
    }

    pub fn database(&self) -> &Kodbase {
        &self.database
    }

    /// Name of the source file, written into the image and diagnostics.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn set_source_name(&mut self, name: impl Into<String>) {
        self.source_name = name.into();
        self.diagnostics.set_file(Some(self.source_name.clone()));
    }

    /// Name of an identifier.
    pub fn name_of(&self, id: IdRef) -> &str {
        &self.symbols.get(id).name
    }

    /// Numeric id of an identifier.
    pub fn id_of(&self, id: IdRef) -> u32 {
        self.symbols.get(id).id
    }

    // ==========================================================================
    // Error reporting
    // ==========================================================================

    /// Record an error and return the error the caller should propagate.
    ///
    /// Fatal errors mark the current handler as failed. Once the error cap
    /// is reached the returned error is [`CompilationError::TooManyErrors`].
    pub(crate) fn report(&mut self, error: CompilationError) -> CompilationError {
        if error.is_fatal() {
            if let Some(handler) = self.unit.handler.as_mut() {
                handler.failed = true;
            }
        }
        match self.diagnostics.error(error.clone()) {
            Ok(()) => error,
            Err(overflow) => overflow,
        }
    }

    pub(crate) fn fail<T>(&mut self, error: CompilationError) -> Result<T> {
        Err(self.report(error))
    }

    pub(crate) fn warn(&mut self, line: u32, message: impl Into<String>) {
        self.diagnostics.warning(line, message);
    }

    /// Stop early once the error cap has been reached.
    pub(crate) fn check_aborted(&self) -> Result<()> {
        if self.diagnostics.is_aborted() {
            return Err(CompilationError::TooManyErrors {
                limit: self.diagnostics.max_errors(),
            });
        }
        Ok(())
    }

    // ==========================================================================
    // Kodbase
    // ==========================================================================

    /// Define everything recorded in a kodbase snapshot.
    ///
    /// Loaded identifiers keep their ids and are marked as coming from the
    /// database, so compiled source may restate them.
    pub fn load_kodbase(&mut self, kodbase: &Kodbase) -> Result<()> {
        debug!(
            "loading kodbase: {} classes, {} messages",
            kodbase.classes.len(),
            kodbase.messages.len()
        );
        let entries = kodbase
            .classes
            .iter()
            .map(|c| (c.name.as_str(), c.id, IdKind::Class))
            .chain(kodbase.messages.iter().map(|(n, id)| (n.as_str(), *id, IdKind::Message)))
            .chain(
                kodbase
                    .parameters
                    .iter()
                    .map(|(n, id)| (n.as_str(), *id, IdKind::Parameter)),
            )
            .chain(
                kodbase
                    .resources
                    .iter()
                    .map(|(n, id)| (n.as_str(), *id, IdKind::Resource)),
            );
        for (name, id, kind) in entries {
            let def = Definition::new(name, kind, Scope::Global, 0)
                .with_id(id)
                .from_database();
            if let Err(error) = self.symbols.define(def) {
                return self.fail(error);
            }
        }
        self.database = kodbase.clone();
        Ok(())
    }

    /// Snapshot of the session for the next compilation.
    ///
    /// Compiled classes contribute their resolved layouts; classes only
    /// known from the loaded kodbase are carried over unchanged.
    pub fn export_kodbase(&self) -> Kodbase {
        let mut kodbase = Kodbase::new();
        for id in self.symbols.scope_entries(Scope::Global) {
            let ident = self.symbols.get(id);
            match ident.kind {
                IdKind::Class => {
                    let layout = self.class(id).and_then(|c| c.layout.as_ref());
                    if let Some(layout) = layout {
                        kodbase
                            .classes
                            .push(KodbaseClass::from_layout(&ident.name, layout));
                    } else if let Some(class) = self.database.class(ident.id) {
                        kodbase.classes.push(class.clone());
                    }
                }
                IdKind::Message => kodbase.messages.push((ident.name.clone(), ident.id)),
                IdKind::Parameter => kodbase.parameters.push((ident.name.clone(), ident.id)),
                IdKind::Resource => kodbase.resources.push((ident.name.clone(), ident.id)),
                _ => {}
            }
        }
        kodbase
    }

    // ==========================================================================
    // Phases
    // ==========================================================================

    /// Link classes whose superclass was declared after them.
    pub fn resolve_forward_references(&mut self) -> Result<()> {
        RecompilationPlanner::new(self).link()
    }

    /// Compute every class layout, superclasses first.
    pub fn resolve_hierarchy(&mut self) -> Result<()> {
        HierarchyResolver::new(self).run()
    }

    /// Rewrite handler bodies in place.
    pub fn optimize(&mut self) {
        Optimizer::new().run(self);
    }

    /// Generate the bytecode image. Layouts must have been resolved.
    pub fn generate(&mut self) -> Result<BofImage> {
        CodeGenerator::new(self).generate()
    }

    /// Classes that need new code because a layout they depend on changed.
    pub fn plan_recompilation(&mut self) -> RecompilePlan {
        RecompilationPlanner::new(self).plan()
    }

    /// Run every phase after parsing.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile(&mut self) -> Result<CompileOutput> {
        debug!("compiling {} classes", self.classes.len());
        self.check_aborted()?;
        if self.unit.class.is_some() {
            let line = self.unit.handler.as_ref().map_or(0, |h| h.line);
            return self.fail(CompilationError::Misplaced {
                detail: "class not finished before compilation".to_string(),
                line,
            });
        }
        self.resolve_forward_references()?;
        self.resolve_hierarchy()?;
        if self.options.optimize {
            self.optimize();
        }
        let image = self.generate()?;
        let plan = self.plan_recompilation();
        self.check_aborted()?;
        if self.diagnostics.has_errors() {
            return Err(CompilationError::Failed {
                errors: self.diagnostics.error_count(),
            });
        }
        Ok(CompileOutput { image, plan })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_strings_are_pooled_in_order() {
        let mut pool = DebugStrings::default();
        assert_eq!(pool.intern("hello"), 0);
        assert_eq!(pool.intern("world"), 1);
        assert_eq!(pool.intern("hello"), 0);
        assert_eq!(pool.get(1), Some("world"));
        assert_eq!(pool.iter().collect::<Vec<_>>(), vec!["hello", "world"]);
    }

    #[test]
    fn kodbase_identifiers_come_from_database() {
        let mut session = CompilationSession::default();
        let kodbase = Kodbase::parse("C Object 10000 0\nM Constructor 10001\nR name_rsc 20000\n")
            .unwrap();
        session.load_kodbase(&kodbase).unwrap();

        let object = session.symbols().resolve("object", Scope::Global).unwrap();
        let ident = session.symbols().get(object);
        assert_eq!(ident.id, 10000);
        assert_eq!(ident.source, blakod_core::Provenance::Database);
        assert_eq!(session.symbols().next_id(), 10002);
        assert_eq!(session.symbols().next_resource(), 20001);
    }

    #[test]
    fn loading_the_largest_ids_does_not_overflow() {
        let mut session = CompilationSession::default();
        let kodbase = Kodbase {
            messages: vec![("Foo".to_string(), u32::MAX)],
            resources: vec![("foo_rsc".to_string(), u32::MAX)],
            ..Kodbase::new()
        };
        session.load_kodbase(&kodbase).unwrap();
        assert_eq!(session.symbols().next_id(), u32::MAX);
        assert_eq!(session.symbols().next_resource(), u32::MAX);
    }

    #[test]
    fn export_carries_database_classes() {
        let mut session = CompilationSession::default();
        let kodbase = Kodbase::parse("C Object 10000 0\nP piFlags 1\n").unwrap();
        session.load_kodbase(&kodbase).unwrap();
        assert_eq!(session.export_kodbase(), kodbase);
    }

    #[test]
    fn reset_keeps_options() {
        let mut session = CompilationSession::new(CompileOptions::default().with_optimize(false));
        session.set_source_name("foo.kod");
        session.reset();
        assert!(!session.options().optimize);
        assert!(session.symbols().is_empty());
        assert_eq!(session.source_name(), "");
    }
}
