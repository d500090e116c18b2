//! Blakod
//!
//! Compiler core for Blakod, the language Meridian 59 game objects are
//! scripted in. Source parsing and the runtime live elsewhere; this crate
//! takes builder calls from a parser and produces a BOF bytecode image.
//!
//! # Example
//!
//! ```
//! use blakod::Context;
//! use blakod::compiler::ast::{Expr, StmtList};
//!
//! let mut ctx = Context::new();
//! let mut session = ctx.create_session().unwrap();
//! session.begin_class("Monster", None, 1).unwrap();
//! let hits = session.make_numeric_constant(10, 2).unwrap();
//! session.add_property("piHits", Expr::constant(hits, 2), 2).unwrap();
//! session.finish_class(3).unwrap();
//!
//! let output = ctx.build(&mut session).unwrap();
//! assert_eq!(output.image.classes.len(), 1);
//! // The next session starts from the updated kodbase.
//! assert!(ctx.kodbase().class_by_name("Monster").is_some());
//! ```

pub use blakod_compiler as compiler;
pub use blakod_core as core;
pub use blakod_registry as registry;

use blakod_compiler::{CompilationSession, CompileOptions, CompileOutput, Kodbase};
use blakod_core::CompilationError;
use log::info;

pub mod prelude {
    pub use blakod_compiler::ast::{Arg, Condition, Constant, ElseClause, Expr, Stmt, StmtList};
    pub use blakod_compiler::{
        BofImage, CompilationSession, CompileOptions, CompileOutput, Kodbase, RecompilePlan,
    };
    pub use blakod_core::{
        BinaryOp, CompilationError, Diagnostic, Diagnostics, IdKind, Literal, UnaryOp,
    };

    pub use crate::Context;
}

/// Compilation context carrying the kodbase from one build to the next.
///
/// Each build starts a [`CompilationSession`] with the current kodbase
/// loaded, so ids stay stable and layout changes are detected. A
/// successful build replaces the kodbase with the session's export.
#[derive(Debug, Clone, Default)]
pub struct Context {
    options: CompileOptions,
    kodbase: Kodbase,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CompileOptions) -> Self {
        Self {
            options,
            kodbase: Kodbase::new(),
        }
    }

    /// Start from a kodbase saved by an earlier build.
    pub fn with_kodbase(mut self, kodbase: Kodbase) -> Self {
        self.kodbase = kodbase;
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn kodbase(&self) -> &Kodbase {
        &self.kodbase
    }

    /// A new session with the kodbase loaded.
    pub fn create_session(&self) -> Result<CompilationSession, CompilationError> {
        let mut session = CompilationSession::new(self.options.clone());
        session.load_kodbase(&self.kodbase)?;
        Ok(session)
    }

    /// Run every phase after parsing and keep the resulting kodbase.
    ///
    /// On failure the kodbase is left as it was.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn build(&mut self, session: &mut CompilationSession) -> Result<CompileOutput, CompilationError> {
        let output = session.compile()?;
        self.kodbase = session.export_kodbase();
        info!(
            "built {} classes, {} need recompiling",
            output.image.classes.len(),
            output.plan.stale.len()
        );
        Ok(output)
    }
}
