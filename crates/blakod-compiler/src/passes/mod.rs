//! Passes run over the session once parsing is done.
//!
//! - [`recompile`]: link forward superclasses; plan recompilation after layouts change
//! - [`hierarchy`]: order classes and compute their layouts
//! - [`optimize`]: fold constants and simplify conditions in handler bodies
//!
//! Code generation is the last phase and lives in [`crate::codegen`].

pub mod hierarchy;
pub mod optimize;
pub mod recompile;

pub use hierarchy::HierarchyResolver;
pub use optimize::Optimizer;
pub use recompile::{RecompilationPlanner, RecompilePlan};
