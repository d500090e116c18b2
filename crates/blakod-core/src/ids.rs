//! Identifier kinds and provenance.

use std::fmt;

/// What an identifier names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    /// Declared but never given a meaning.
    Undefined,
    Resource,
    Message,
    Class,
    /// Message handler parameter. Parameters have a global id (used by named
    /// arguments) and a local slot in each handler that declares them.
    Parameter,
    Local,
    ClassVar,
    Property,
    /// Builtin function.
    Function,
    Constant,
    /// Forward-reference placeholder; must be promoted before code generation.
    Missing,
}

impl IdKind {
    /// Human-readable name used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdKind::Undefined => "undefined identifier",
            IdKind::Resource => "resource",
            IdKind::Message => "message",
            IdKind::Class => "class",
            IdKind::Parameter => "parameter",
            IdKind::Local => "local variable",
            IdKind::ClassVar => "classvar",
            IdKind::Property => "property",
            IdKind::Function => "function",
            IdKind::Constant => "constant",
            IdKind::Missing => "missing identifier",
        }
    }

    /// Whether a value can be stored into an identifier of this kind.
    ///
    /// Classvars are excluded: they are read-only at runtime unless a
    /// property overrides them, which is decided by the class layout.
    pub fn is_lvalue(&self) -> bool {
        matches!(self, IdKind::Local | IdKind::Parameter | IdKind::Property)
    }

    /// Kinds whose names are shared by every class and handler.
    pub fn is_shared(&self) -> bool {
        matches!(self, IdKind::Message | IdKind::Parameter)
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an identifier definition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// Loaded from the persisted kodbase.
    Database,
    /// Defined by source compiled in this session.
    Compiled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lvalue_kinds() {
        assert!(IdKind::Local.is_lvalue());
        assert!(IdKind::Parameter.is_lvalue());
        assert!(IdKind::Property.is_lvalue());
        assert!(!IdKind::ClassVar.is_lvalue());
        assert!(!IdKind::Constant.is_lvalue());
        assert!(!IdKind::Resource.is_lvalue());
    }

    #[test]
    fn display_uses_descriptive_name() {
        assert_eq!(IdKind::ClassVar.to_string(), "classvar");
        assert_eq!(IdKind::Local.to_string(), "local variable");
    }
}
