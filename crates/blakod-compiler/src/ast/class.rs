//! Class and message handler nodes.

use blakod_core::ResourceValue;
use blakod_registry::IdRef;
use rustc_hash::FxHashMap;
use unicase::UniCase;

use super::expr::Constant;
use super::stmt::StmtList;
use crate::layout::ClassLayout;

/// A class being compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    pub id: IdRef,
    pub name: String,
    /// `None` for a hierarchy root. May name a forward reference until the
    /// recompilation planner links it.
    pub superclass: Option<IdRef>,
    pub resources: Vec<ResourceDecl>,
    pub classvars: Vec<MemberDecl>,
    pub properties: Vec<MemberDecl>,
    pub constants: ConstantTable,
    pub handlers: Vec<MessageHandler>,
    /// Set by the hierarchy resolver.
    pub layout: Option<ClassLayout>,
    /// Code must be generated for the class. Every class built from source
    /// starts dirty; only dirty classes go into the image.
    pub dirty: bool,
    pub line: u32,
}

impl Class {
    pub fn new(id: IdRef, name: &str, superclass: Option<IdRef>, line: u32) -> Self {
        Self {
            id,
            name: name.to_string(),
            superclass,
            resources: Vec::new(),
            classvars: Vec::new(),
            properties: Vec::new(),
            constants: ConstantTable::default(),
            handlers: Vec::new(),
            layout: None,
            dirty: true,
            line,
        }
    }

    pub fn handler(&self, message: IdRef) -> Option<&MessageHandler> {
        self.handlers.iter().find(|h| h.message == message)
    }
}

/// A classvar or property declaration with its initial value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDecl {
    pub id: IdRef,
    pub name: String,
    pub value: Constant,
    pub line: u32,
}

/// A resource and its per-language values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDecl {
    pub id: IdRef,
    /// `(language id, value)`, in declaration order.
    pub variants: Vec<(u8, ResourceValue)>,
    pub line: u32,
}

impl ResourceDecl {
    pub fn variant(&self, language: u8) -> Option<&ResourceValue> {
        self.variants
            .iter()
            .find(|(lang, _)| *lang == language)
            .map(|(_, value)| value)
    }
}

/// A formal parameter with its default value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// The global parameter identifier (shared by every handler using the
    /// name).
    pub id: IdRef,
    /// The handler-local slot identifier.
    pub local: IdRef,
    pub default: Constant,
    pub line: u32,
}

/// A message handler body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandler {
    pub message: IdRef,
    pub params: Vec<Param>,
    /// Declared locals, in slot order after the parameters.
    pub locals: Vec<IdRef>,
    pub body: StmtList,
    /// Debug string index of the handler's comment.
    pub comment: Option<u32>,
    pub line: u32,
    /// A fatal error was reported while building the handler; no code is
    /// generated for it.
    pub failed: bool,
}

impl MessageHandler {
    /// Locals declared by the handler, counting parameters.
    pub fn declared_slots(&self) -> u32 {
        (self.params.len() + self.locals.len()) as u32
    }
}

/// Named numeric constants, deduplicated by name (case-insensitive).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstantTable {
    entries: Vec<(String, i32)>,
    index: FxHashMap<UniCase<String>, usize>,
}

impl ConstantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constant.
    ///
    /// Re-adding a name with the same value is accepted and returns the
    /// existing index; a different value returns `Err` with the old value.
    pub fn insert(&mut self, name: &str, value: i32) -> Result<usize, i32> {
        let key = UniCase::new(name.to_string());
        if let Some(&index) = self.index.get(&key) {
            let existing = self.entries[index].1;
            return if existing == value { Ok(index) } else { Err(existing) };
        }
        let index = self.entries.len();
        self.entries.push((name.to_string(), value));
        self.index.insert(key, index);
        Ok(index)
    }

    pub fn get(&self, name: &str) -> Option<i32> {
        self.index
            .get(&UniCase::new(name.to_string()))
            .map(|&index| self.entries[index].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_deduplicate_by_name() {
        let mut table = ConstantTable::new();
        assert_eq!(table.insert("MAX_HP", 100), Ok(0));
        assert_eq!(table.insert("max_hp", 100), Ok(0));
        assert_eq!(table.insert("MAX_HP", 200), Err(100));
        assert_eq!(table.insert("MIN_HP", 1), Ok(1));
        assert_eq!(table.get("Max_Hp"), Some(100));
        assert_eq!(table.len(), 2);
    }
}
