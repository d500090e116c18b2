//! Error types for the Blakod compiler.
//!
//! ## Error Hierarchy
//!
//! ```text
//! CompilationError
//! ├── name resolution   - undefined identifier, redefinition, ambiguous override
//! ├── type/shape        - bad operand kind, arity, non-lvalue target
//! ├── structural        - break/continue placement, cycles, discarded results
//! └── capacity          - MAXERRORS, MAXARGS, MAXFNAME, TABLESIZE
//! KodbaseError          - malformed kodbase snapshot text
//! ```
//!
//! Name-resolution and type/shape errors are accumulated; structural and
//! capacity errors abort the current compilation unit. Error messages do
//! not repeat the line number, which is carried separately and rendered by
//! [`Diagnostics`](crate::Diagnostics).

use thiserror::Error;

use crate::ids::IdKind;
use crate::literal::LiteralKind;

/// Broad classes of compilation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NameResolution,
    TypeShape,
    Structural,
    Capacity,
}

impl ErrorCategory {
    /// Whether errors of this category stop the current unit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorCategory::Structural | ErrorCategory::Capacity)
    }
}

/// Errors raised while building, resolving or generating code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompilationError {
    // ========================================================================
    // Name resolution
    // ========================================================================
    /// A name could not be resolved in any scope.
    #[error("undefined identifier '{name}'")]
    UndefinedIdentifier { name: String, line: u32 },

    /// A call names a function the runtime does not provide.
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String, line: u32 },

    /// The same name was defined twice with the same kind in one scope.
    #[error("duplicate definition of {kind} '{name}'")]
    DuplicateDefinition { name: String, kind: IdKind, line: u32 },

    /// A name was redefined with a different kind in the same scope.
    #[error("'{name}' is already defined as a {existing}, cannot redefine as a {requested}")]
    Redefinition {
        name: String,
        existing: IdKind,
        requested: IdKind,
        line: u32,
    },

    /// A property and a classvar of the same name cannot be told apart.
    #[error("ambiguous override of '{name}' in class '{class}': {detail}")]
    AmbiguousOverride {
        name: String,
        class: String,
        detail: String,
        line: u32,
    },

    /// A class names a superclass that was never declared.
    #[error("superclass '{superclass}' of class '{class}' is not defined")]
    UndefinedSuperclass {
        class: String,
        superclass: String,
        line: u32,
    },

    /// A forward reference was never resolved to a definition.
    #[error("'{name}' is referenced but never defined")]
    UnresolvedReference { name: String, line: u32 },

    // ========================================================================
    // Type / shape
    // ========================================================================
    /// An operator was applied to a literal it cannot evaluate.
    #[error("operator '{op}' cannot be applied to a {operand} literal")]
    InvalidOperand {
        op: String,
        operand: LiteralKind,
        line: u32,
    },

    /// A call's arguments do not match the function's signature.
    #[error("wrong arguments to '{function}': {detail}")]
    ArityMismatch {
        function: String,
        detail: String,
        line: u32,
    },

    /// Assignment to something that cannot hold a value.
    #[error("cannot assign to {kind} '{name}'")]
    NotAnLvalue { name: String, kind: IdKind, line: u32 },

    /// A name that does not denote a value was used as one.
    #[error("{kind} '{name}' cannot be used as a value")]
    NotAValue { name: String, kind: IdKind, line: u32 },

    /// A declaration needs a compile-time constant.
    #[error("initial value of '{name}' must be a constant")]
    NotConstant { name: String, line: u32 },

    /// A numeric literal does not fit in 28 bits.
    #[error("numeric constant {value} out of range")]
    NumberOutOfRange { value: i64, line: u32 },

    /// A resource language id or code is not valid.
    #[error("invalid language '{language}'")]
    InvalidLanguage { language: String, line: u32 },

    // ========================================================================
    // Structural
    // ========================================================================
    #[error("break statement not inside a loop or switch")]
    BreakOutsideLoop { line: u32 },

    #[error("continue statement not inside a loop")]
    ContinueOutsideLoop { line: u32 },

    /// A class is its own ancestor.
    #[error("circular inheritance involving class '{class}'")]
    CircularInheritance { class: String, line: u32 },

    /// The result of a function that requires a destination was ignored.
    #[error("return value of '{function}' must be used")]
    DiscardedResult { function: String, line: u32 },

    /// An element was declared outside the construct it belongs to.
    #[error("{detail}")]
    Misplaced { detail: String, line: u32 },

    /// A run finished with errors; the individual errors are in the
    /// diagnostics.
    #[error("compilation failed with {errors} error(s)")]
    Failed { errors: usize },

    // ========================================================================
    // Capacity
    // ========================================================================
    /// Too many errors were reported in one run.
    #[error("too many errors ({limit}), compilation aborted")]
    TooManyErrors { limit: usize },

    #[error("too many arguments to '{function}' ({count}, maximum {limit})")]
    TooManyArguments {
        function: String,
        count: usize,
        limit: usize,
        line: u32,
    },

    #[error("function name '{name}' exceeds {limit} characters")]
    NameTooLong { name: String, limit: usize, line: u32 },

    #[error("{scope} symbol table full ({limit} entries)")]
    TableFull {
        scope: &'static str,
        limit: usize,
        line: u32,
    },

    /// An encoded value does not fit its field in the image.
    #[error("{detail}")]
    EncodingOverflow { detail: String, line: u32 },
}

impl CompilationError {
    /// The category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        use CompilationError::*;
        match self {
            UndefinedIdentifier { .. }
            | UnknownFunction { .. }
            | DuplicateDefinition { .. }
            | Redefinition { .. }
            | AmbiguousOverride { .. }
            | UndefinedSuperclass { .. }
            | UnresolvedReference { .. } => ErrorCategory::NameResolution,
            InvalidOperand { .. }
            | ArityMismatch { .. }
            | NotAnLvalue { .. }
            | NotAValue { .. }
            | NotConstant { .. }
            | NumberOutOfRange { .. }
            | InvalidLanguage { .. } => ErrorCategory::TypeShape,
            BreakOutsideLoop { .. }
            | ContinueOutsideLoop { .. }
            | CircularInheritance { .. }
            | DiscardedResult { .. }
            | Misplaced { .. }
            | Failed { .. } => ErrorCategory::Structural,
            TooManyErrors { .. }
            | TooManyArguments { .. }
            | NameTooLong { .. }
            | TableFull { .. }
            | EncodingOverflow { .. } => ErrorCategory::Capacity,
        }
    }

    /// Whether this error stops the current compilation unit.
    pub fn is_fatal(&self) -> bool {
        self.category().is_fatal()
    }

    /// Source line of the error, if it has one.
    pub fn line(&self) -> Option<u32> {
        use CompilationError::*;
        match self {
            TooManyErrors { .. } | Failed { .. } => None,
            UndefinedIdentifier { line, .. }
            | UnknownFunction { line, .. }
            | DuplicateDefinition { line, .. }
            | Redefinition { line, .. }
            | AmbiguousOverride { line, .. }
            | UndefinedSuperclass { line, .. }
            | UnresolvedReference { line, .. }
            | InvalidOperand { line, .. }
            | ArityMismatch { line, .. }
            | NotAnLvalue { line, .. }
            | NotAValue { line, .. }
            | NotConstant { line, .. }
            | NumberOutOfRange { line, .. }
            | InvalidLanguage { line, .. }
            | BreakOutsideLoop { line }
            | ContinueOutsideLoop { line }
            | CircularInheritance { line, .. }
            | DiscardedResult { line, .. }
            | Misplaced { line, .. }
            | TooManyArguments { line, .. }
            | NameTooLong { line, .. }
            | TableFull { line, .. }
            | EncodingOverflow { line, .. } => Some(*line),
        }
    }
}

/// Errors reading a kodbase snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KodbaseError {
    #[error("kodbase line {line}: unknown record type '{record}'")]
    UnknownRecord { record: String, line: usize },

    #[error("kodbase line {line}: expected {expected}")]
    Malformed { expected: &'static str, line: usize },

    #[error("kodbase line {line}: '{record}' record outside a class")]
    OrphanMember { record: char, line: usize },
}
