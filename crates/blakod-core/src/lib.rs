//! Blakod Core
//!
//! Types shared by every stage of the Blakod compiler.
//!
//! - [`limits`]: compiler limits, id bases and the image version
//! - [`ids`]: identifier kinds and provenance
//! - [`literal`]: literal values and their tagged runtime encoding
//! - [`operator`]: expression operators
//! - [`error`]: compilation errors and their categories
//! - [`diagnostics`]: accumulated errors and warnings

pub mod diagnostics;
pub mod error;
pub mod ids;
pub mod language;
pub mod limits;
pub mod literal;
pub mod operator;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{CompilationError, ErrorCategory, KodbaseError};
pub use ids::{IdKind, Provenance};
pub use literal::{Literal, LiteralKind, ResourceValue};
pub use operator::{BinaryOp, UnaryOp};
