//! Literal values and their runtime encoding.
//!
//! The runtime stores every value in 32 bits: a 4-bit tag followed by a
//! 28-bit payload. Literals are encoded the same way when they appear as
//! instruction operands or as classvar/property initial values.

use std::fmt;

use crate::limits::wrap_kod_int;

/// Value tags understood by the runtime.
pub mod tag {
    pub const NIL: u32 = 0;
    pub const INT: u32 = 1;
    pub const OBJECT: u32 = 2;
    pub const LIST: u32 = 3;
    pub const RESOURCE: u32 = 4;
    pub const TIMER: u32 = 5;
    pub const SESSION: u32 = 6;
    pub const ROOM_DATA: u32 = 7;
    pub const TEMP_STRING: u32 = 8;
    pub const STRING: u32 = 9;
    pub const CLASS: u32 = 10;
    pub const MESSAGE: u32 = 11;
    pub const DEBUGSTR: u32 = 12;
    pub const TABLE: u32 = 13;
    pub const OVERRIDE: u32 = 14;
}

const PAYLOAD_MASK: u32 = 0x0FFF_FFFF;

/// A constant value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Literal {
    /// 28-bit signed integer.
    Number(i32),
    /// `$`.
    Nil,
    /// Index into the debug string pool.
    DebugString(u32),
    /// Resource id.
    Resource(u32),
    /// Class id (`&Foo`).
    Class(u32),
    /// Message id (`@Foo`).
    Message(u32),
    /// Classvar value redirected to a property slot.
    Override(u32),
}

/// Kind of a literal, for diagnostics and operand checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    Number,
    String,
    Nil,
    FileName,
    Resource,
    Class,
    Message,
    Override,
}

impl LiteralKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LiteralKind::Number => "numeric",
            LiteralKind::String => "string",
            LiteralKind::Nil => "nil",
            LiteralKind::FileName => "file name",
            LiteralKind::Resource => "resource",
            LiteralKind::Class => "class",
            LiteralKind::Message => "message",
            LiteralKind::Override => "override",
        }
    }
}

impl fmt::Display for LiteralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Literal {
    /// Build a numeric literal, wrapping into the 28-bit range.
    pub fn number(value: i64) -> Self {
        Literal::Number(wrap_kod_int(value))
    }

    pub fn kind(&self) -> LiteralKind {
        match self {
            Literal::Number(_) => LiteralKind::Number,
            Literal::Nil => LiteralKind::Nil,
            Literal::DebugString(_) => LiteralKind::String,
            Literal::Resource(_) => LiteralKind::Resource,
            Literal::Class(_) => LiteralKind::Class,
            Literal::Message(_) => LiteralKind::Message,
            Literal::Override(_) => LiteralKind::Override,
        }
    }

    /// The runtime tag for this literal.
    pub fn tag(&self) -> u32 {
        match self {
            Literal::Number(_) => tag::INT,
            Literal::Nil => tag::NIL,
            Literal::DebugString(_) => tag::DEBUGSTR,
            Literal::Resource(_) => tag::RESOURCE,
            Literal::Class(_) => tag::CLASS,
            Literal::Message(_) => tag::MESSAGE,
            Literal::Override(_) => tag::OVERRIDE,
        }
    }

    /// Encode as a tagged 32-bit runtime value.
    pub fn encode(&self) -> u32 {
        let payload = match *self {
            Literal::Number(n) => n as u32,
            Literal::Nil => 0,
            Literal::DebugString(v)
            | Literal::Resource(v)
            | Literal::Class(v)
            | Literal::Message(v)
            | Literal::Override(v) => v,
        };
        (self.tag() << 28) | (payload & PAYLOAD_MASK)
    }

    /// Truth value of the literal when used as a condition, if it is known
    /// at compile time.
    pub fn truthiness(&self) -> Option<bool> {
        match self {
            Literal::Number(n) => Some(*n != 0),
            Literal::Nil => Some(false),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i32> {
        match self {
            Literal::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Literal::Nil)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{n}"),
            Literal::Nil => f.write_str("$"),
            Literal::DebugString(i) => write!(f, "debug string #{i}"),
            Literal::Resource(id) => write!(f, "resource {id}"),
            Literal::Class(id) => write!(f, "class {id}"),
            Literal::Message(id) => write!(f, "message {id}"),
            Literal::Override(slot) => write!(f, "override of property {slot}"),
        }
    }
}

/// One language variant of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceValue {
    /// Localised text.
    Text(String),
    /// Name of a client data file.
    FileName(String),
}

impl ResourceValue {
    pub fn as_str(&self) -> &str {
        match self {
            ResourceValue::Text(s) | ResourceValue::FileName(s) => s,
        }
    }

    pub fn kind(&self) -> LiteralKind {
        match self {
            ResourceValue::Text(_) => LiteralKind::String,
            ResourceValue::FileName(_) => LiteralKind::FileName,
        }
    }
}
