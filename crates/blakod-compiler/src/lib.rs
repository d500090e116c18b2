//! Blakod Compiler
//!
//! Semantic analysis and code generation for Blakod, the message-passing
//! scripting language of Meridian 59 game objects.
//!
//! ## Architecture
//!
//! A parser (not part of this crate) drives a [`CompilationSession`]
//! through its builder operations, one call per construct in source order.
//! Once every file is parsed, [`CompilationSession::compile`] runs the
//! remaining phases:
//!
//! 1. **Linking**: superclasses declared after their subclasses are linked
//! 2. **Hierarchy**: classes are laid out, superclasses first
//! 3. **Optimization**: constant folding, dead branches, null-test fusion
//! 4. **Code generation**: one bytecode chunk per message handler
//! 5. **Recompilation planning**: classes affected by layout changes
//!
//! ## Modules
//!
//! - [`ast`]: syntax tree built by the builder operations
//! - [`builder`]: the builder operations called by the parser
//! - [`bytecode`]: instruction set, bytecode chunks and the BOF image
//! - [`codegen`]: handler and class code generation
//! - [`database`]: kodbase snapshots carried between compilations
//! - [`emit`]: label-based bytecode emitter
//! - [`functions`]: builtin function table
//! - [`layout`]: property and classvar slot assignment
//! - [`passes`]: linking, hierarchy, optimization and recompilation planning

pub mod ast;
pub mod builder;
pub mod bytecode;
pub mod codegen;
pub mod database;
pub mod emit;
pub mod functions;
pub mod layout;
mod options;
pub mod passes;
mod session;

pub use bytecode::{BofImage, BytecodeChunk, ClassImage, HandlerImage, OpCode};
pub use codegen::{CodeGenerator, HandlerCompiler};
pub use database::{Kodbase, KodbaseClass};
pub use emit::BytecodeEmitter;
pub use functions::BuiltinFunction;
pub use layout::{ClassLayout, Member};
pub use options::CompileOptions;
pub use passes::{HierarchyResolver, Optimizer, RecompilationPlanner, RecompilePlan};
pub use session::{CompilationSession, CompileOutput, DebugStrings, PendingSuperclass};

// Re-export CompilationError from core for convenience
pub use blakod_core::CompilationError;
