//! Scoped identifier tables.
//!
//! Identifiers live in one arena and are referred to by [`IdRef`]. Four
//! name tables index into it:
//!
//! - **Global**: classes, messages, parameter names, resources and include
//!   constants. Lives for the whole session.
//! - **Class**: classvars, properties and constants of the class being
//!   built. Reset by every class.
//! - **Local**: parameters and locals of the handler being built. Reset by
//!   every handler.
//! - **Missing**: forward-reference placeholders, promoted in place when
//!   their definition arrives.
//!
//! Names are case-insensitive. The same name may appear in several scopes.

use blakod_core::limits::{IDBASE, RESOURCEBASE, TABLESIZE};
use blakod_core::{CompilationError, IdKind, Provenance};
use rustc_hash::FxHashMap;
use unicase::UniCase;

/// Handle to an identifier in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdRef(u32);

impl IdRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A named entity known to the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub name: String,
    pub kind: IdKind,
    /// Number unique within the kind's id space: class/message/parameter
    /// ids, resource ids, local slots, or declaration ordinals for class
    /// members and constants.
    pub id: u32,
    /// Id of the entity whose scope contains this one (the class for a
    /// property, the global parameter id for a local parameter).
    pub owner: u32,
    pub source: Provenance,
    /// Times referenced, not counting the declaration.
    pub references: u32,
    pub is_string_resource: bool,
}

/// Scope partition of the identifier table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Class,
    Local,
    Missing,
}

impl Scope {
    fn index(self) -> usize {
        match self {
            Scope::Global => 0,
            Scope::Class => 1,
            Scope::Local => 2,
            Scope::Missing => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Class => "class",
            Scope::Local => "local",
            Scope::Missing => "forward reference",
        }
    }
}

/// Parameters for [`IdentifierTable::define`].
#[derive(Debug, Clone, Copy)]
pub struct Definition<'a> {
    pub name: &'a str,
    pub kind: IdKind,
    pub scope: Scope,
    /// Explicit id; `None` allocates from the class/message or resource
    /// counters.
    pub id: Option<u32>,
    pub owner: u32,
    pub source: Provenance,
    pub line: u32,
}

impl<'a> Definition<'a> {
    /// A compiled definition with an allocated id and no owner.
    pub fn new(name: &'a str, kind: IdKind, scope: Scope, line: u32) -> Self {
        Self {
            name,
            kind,
            scope,
            id: None,
            owner: 0,
            source: Provenance::Compiled,
            line,
        }
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_owner(mut self, owner: u32) -> Self {
        self.owner = owner;
        self
    }

    pub fn from_database(mut self) -> Self {
        self.source = Provenance::Database;
        self
    }
}

type NameMap = FxHashMap<UniCase<String>, IdRef>;

/// The identifier arena with its four scope tables.
#[derive(Debug, Clone)]
pub struct IdentifierTable {
    arena: Vec<Identifier>,
    scopes: [NameMap; 4],
    next_id: u32,
    next_resource: u32,
}

impl Default for IdentifierTable {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentifierTable {
    pub fn new() -> Self {
        Self {
            arena: Vec::new(),
            scopes: Default::default(),
            next_id: IDBASE,
            next_resource: RESOURCEBASE,
        }
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    pub fn get(&self, id: IdRef) -> &Identifier {
        &self.arena[id.index()]
    }

    pub fn get_mut(&mut self, id: IdRef) -> &mut Identifier {
        &mut self.arena[id.index()]
    }

    /// Find a name in one scope.
    pub fn resolve(&self, name: &str, scope: Scope) -> Option<IdRef> {
        self.scopes[scope.index()]
            .get(&UniCase::new(name.to_string()))
            .copied()
    }

    /// Find a name searching local, then class, then global scope.
    pub fn lookup(&self, name: &str) -> Option<IdRef> {
        [Scope::Local, Scope::Class, Scope::Global]
            .into_iter()
            .find_map(|scope| self.resolve(name, scope))
    }

    /// Identifiers in a scope, in definition order.
    pub fn scope_entries(&self, scope: Scope) -> Vec<IdRef> {
        let mut entries: Vec<IdRef> = self.scopes[scope.index()].values().copied().collect();
        entries.sort();
        entries
    }

    pub fn scope_len(&self, scope: Scope) -> usize {
        self.scopes[scope.index()].len()
    }

    /// Total identifiers ever created in this session.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Next id that would be handed to a class, message or parameter.
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Next id that would be handed to a resource.
    pub fn next_resource(&self) -> u32 {
        self.next_resource
    }

    // ==========================================================================
    // Definition
    // ==========================================================================

    /// Create or promote an identifier.
    ///
    /// - A `Missing` placeholder with the same name (in the target scope or,
    ///   for global definitions, in the missing table) is promoted in place.
    /// - Messages and parameters are shared names: redefining one returns the
    ///   existing entry.
    /// - A database entry re-stated by compiled source becomes compiled.
    /// - Any other same-scope clash is an error.
    pub fn define(&mut self, def: Definition<'_>) -> Result<IdRef, CompilationError> {
        if let Some(existing) = self.resolve(def.name, def.scope) {
            return self.redefine(existing, &def);
        }

        let key = UniCase::new(def.name.to_string());
        if def.scope == Scope::Global {
            if let Some(placeholder) = self.scopes[Scope::Missing.index()].remove(&key) {
                self.check_capacity(def.scope, def.line)?;
                self.promote(placeholder, &def);
                self.scopes[def.scope.index()].insert(key, placeholder);
                return Ok(placeholder);
            }
        }

        self.check_capacity(def.scope, def.line)?;
        let id = match def.id {
            Some(id) => {
                self.reserve(def.kind, id);
                id
            }
            None => self.allocate(def.kind),
        };
        let handle = IdRef(self.arena.len() as u32);
        self.arena.push(Identifier {
            name: def.name.to_string(),
            kind: def.kind,
            id,
            owner: def.owner,
            source: def.source,
            references: 0,
            is_string_resource: false,
        });
        self.scopes[def.scope.index()].insert(key, handle);
        Ok(handle)
    }

    fn redefine(&mut self, existing: IdRef, def: &Definition<'_>) -> Result<IdRef, CompilationError> {
        let current = self.get(existing);
        if current.kind == IdKind::Missing {
            self.promote(existing, def);
            return Ok(existing);
        }
        if current.kind != def.kind {
            return Err(CompilationError::Redefinition {
                name: def.name.to_string(),
                existing: current.kind,
                requested: def.kind,
                line: def.line,
            });
        }
        if current.kind.is_shared() {
            if def.source == Provenance::Compiled {
                self.get_mut(existing).source = Provenance::Compiled;
            }
            return Ok(existing);
        }
        if current.source == Provenance::Database && def.source == Provenance::Compiled {
            let ident = self.get_mut(existing);
            ident.source = Provenance::Compiled;
            ident.owner = def.owner;
            return Ok(existing);
        }
        Err(CompilationError::DuplicateDefinition {
            name: def.name.to_string(),
            kind: def.kind,
            line: def.line,
        })
    }

    fn promote(&mut self, placeholder: IdRef, def: &Definition<'_>) {
        let id = match def.id {
            Some(id) => {
                self.reserve(def.kind, id);
                id
            }
            None => self.allocate(def.kind),
        };
        let ident = self.get_mut(placeholder);
        ident.kind = def.kind;
        ident.id = id;
        ident.owner = def.owner;
        ident.source = def.source;
    }

    /// Return the placeholder for a name used before its definition,
    /// creating it if needed. Concrete global definitions are returned
    /// as is.
    pub fn declare_missing(&mut self, name: &str, line: u32) -> Result<IdRef, CompilationError> {
        if let Some(existing) = self.resolve(name, Scope::Global) {
            return Ok(existing);
        }
        if let Some(existing) = self.resolve(name, Scope::Missing) {
            return Ok(existing);
        }
        self.check_capacity(Scope::Missing, line)?;
        let handle = IdRef(self.arena.len() as u32);
        self.arena.push(Identifier {
            name: name.to_string(),
            kind: IdKind::Missing,
            id: 0,
            owner: 0,
            source: Provenance::Compiled,
            references: 0,
            is_string_resource: false,
        });
        self.scopes[Scope::Missing.index()].insert(UniCase::new(name.to_string()), handle);
        Ok(handle)
    }

    /// Placeholders that have not been promoted yet, in creation order.
    pub fn unresolved(&self) -> Vec<IdRef> {
        self.scope_entries(Scope::Missing)
    }

    /// Count a use of an identifier.
    pub fn mark_referenced(&mut self, id: IdRef) {
        self.get_mut(id).references += 1;
    }

    /// Drop every name in a unit scope. Arena entries stay valid so AST
    /// nodes built in that unit keep resolving.
    pub fn reset_scope(&mut self, scope: Scope) {
        self.scopes[scope.index()].clear();
    }

    /// Reset for an independent compilation session.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    fn check_capacity(&self, scope: Scope, line: u32) -> Result<(), CompilationError> {
        if self.scopes[scope.index()].len() >= TABLESIZE {
            return Err(CompilationError::TableFull {
                scope: scope.as_str(),
                limit: TABLESIZE,
                line,
            });
        }
        Ok(())
    }

    fn allocate(&mut self, kind: IdKind) -> u32 {
        match kind {
            IdKind::Resource => {
                let id = self.next_resource;
                self.next_resource = id.saturating_add(1);
                id
            }
            IdKind::Class | IdKind::Message | IdKind::Parameter => {
                let id = self.next_id;
                self.next_id = id.saturating_add(1);
                id
            }
            _ => 0,
        }
    }

    /// Keep the counters ahead of explicitly assigned ids.
    fn reserve(&mut self, kind: IdKind, id: u32) {
        match kind {
            IdKind::Resource => {
                self.next_resource = self.next_resource.max(id.saturating_add(1))
            }
            IdKind::Class | IdKind::Message | IdKind::Parameter if id >= IDBASE => {
                self.next_id = self.next_id.max(id.saturating_add(1))
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str, kind: IdKind, scope: Scope) -> Definition<'_> {
        Definition::new(name, kind, scope, 1)
    }

    #[test]
    fn define_and_resolve() {
        let mut table = IdentifierTable::new();
        let room = table.define(def("Room", IdKind::Class, Scope::Global)).unwrap();

        assert_eq!(table.resolve("room", Scope::Global), Some(room));
        assert_eq!(table.resolve("ROOM", Scope::Global), Some(room));
        assert_eq!(table.resolve("Room", Scope::Class), None);
        assert_eq!(table.get(room).id, IDBASE);
    }

    #[test]
    fn ids_are_allocated_per_kind_space() {
        let mut table = IdentifierTable::new();
        let class = table.define(def("Foo", IdKind::Class, Scope::Global)).unwrap();
        let message = table.define(def("Bar", IdKind::Message, Scope::Global)).unwrap();
        let resource = table.define(def("foo_rsc", IdKind::Resource, Scope::Global)).unwrap();

        assert_eq!(table.get(class).id, IDBASE);
        assert_eq!(table.get(message).id, IDBASE + 1);
        assert_eq!(table.get(resource).id, RESOURCEBASE);
    }

    #[test]
    fn explicit_ids_at_the_top_of_the_range_saturate() {
        let mut table = IdentifierTable::new();
        table
            .define(def("Foo", IdKind::Message, Scope::Global).with_id(u32::MAX))
            .unwrap();
        table
            .define(def("foo_rsc", IdKind::Resource, Scope::Global).with_id(u32::MAX))
            .unwrap();

        let next = table.define(def("Bar", IdKind::Message, Scope::Global)).unwrap();
        assert_eq!(table.get(next).id, u32::MAX);
        let next = table.define(def("bar_rsc", IdKind::Resource, Scope::Global)).unwrap();
        assert_eq!(table.get(next).id, u32::MAX);
    }

    #[test]
    fn scopes_are_partitioned() {
        let mut table = IdentifierTable::new();
        let global = table.define(def("count", IdKind::Message, Scope::Global)).unwrap();
        let local = table
            .define(def("count", IdKind::Local, Scope::Local).with_id(0))
            .unwrap();

        assert_ne!(global, local);
        assert_eq!(table.lookup("count"), Some(local));

        table.reset_scope(Scope::Local);
        assert_eq!(table.lookup("count"), Some(global));
        // The arena entry survives the reset.
        assert_eq!(table.get(local).kind, IdKind::Local);
    }

    #[test]
    fn missing_placeholder_is_promoted_once() {
        let mut table = IdentifierTable::new();
        let placeholder = table.declare_missing("Monster", 3).unwrap();
        assert_eq!(table.get(placeholder).kind, IdKind::Missing);
        assert_eq!(table.declare_missing("monster", 4).unwrap(), placeholder);

        let class = table.define(def("Monster", IdKind::Class, Scope::Global)).unwrap();
        assert_eq!(class, placeholder);
        assert_eq!(table.get(class).kind, IdKind::Class);
        assert!(table.unresolved().is_empty());

        // A second class definition is a duplicate.
        let err = table.define(def("Monster", IdKind::Class, Scope::Global)).unwrap_err();
        assert!(matches!(err, CompilationError::DuplicateDefinition { .. }));
    }

    #[test]
    fn redefinition_with_other_kind_fails() {
        let mut table = IdentifierTable::new();
        table.define(def("Foo", IdKind::Class, Scope::Global)).unwrap();
        let err = table.define(def("foo", IdKind::Message, Scope::Global)).unwrap_err();
        assert!(matches!(
            err,
            CompilationError::Redefinition {
                existing: IdKind::Class,
                requested: IdKind::Message,
                ..
            }
        ));
    }

    #[test]
    fn messages_are_shared() {
        let mut table = IdentifierTable::new();
        let first = table.define(def("Constructor", IdKind::Message, Scope::Global)).unwrap();
        let second = table.define(def("constructor", IdKind::Message, Scope::Global)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn database_entries_can_be_restated_once() {
        let mut table = IdentifierTable::new();
        let loaded = table
            .define(
                def("Player", IdKind::Class, Scope::Global)
                    .with_id(10500)
                    .from_database(),
            )
            .unwrap();
        let restated = table.define(def("Player", IdKind::Class, Scope::Global)).unwrap();

        assert_eq!(loaded, restated);
        assert_eq!(table.get(restated).source, Provenance::Compiled);
        assert_eq!(table.get(restated).id, 10500);
        assert_eq!(table.next_id(), 10501);
        assert!(table.define(def("Player", IdKind::Class, Scope::Global)).is_err());
    }

    #[test]
    fn property_and_classvar_clash_in_one_scope() {
        let mut table = IdentifierTable::new();
        table
            .define(def("vrName", IdKind::ClassVar, Scope::Class).with_id(0))
            .unwrap();
        let err = table
            .define(def("vrName", IdKind::Property, Scope::Class).with_id(0))
            .unwrap_err();
        assert!(matches!(err, CompilationError::Redefinition { .. }));
    }

    #[test]
    fn mark_referenced_counts_uses() {
        let mut table = IdentifierTable::new();
        let rsc = table.define(def("name_rsc", IdKind::Resource, Scope::Global)).unwrap();
        table.mark_referenced(rsc);
        table.mark_referenced(rsc);
        assert_eq!(table.get(rsc).references, 2);
    }

    #[test]
    fn scope_capacity_is_enforced() {
        let mut table = IdentifierTable::new();
        for i in 0..TABLESIZE {
            table
                .define(def(&format!("l{i}"), IdKind::Local, Scope::Local).with_id(i as u32))
                .unwrap();
        }
        let err = table
            .define(def("overflow", IdKind::Local, Scope::Local).with_id(0))
            .unwrap_err();
        assert!(matches!(err, CompilationError::TableFull { .. }));
    }
}
