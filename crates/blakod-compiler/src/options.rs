//! Compiler configuration.

use blakod_core::limits::MAXERRORS;

/// Settings for one compilation session.
///
/// ```
/// use blakod_compiler::CompileOptions;
///
/// let options = CompileOptions::default()
///     .with_optimize(false)
///     .with_warn_overrides(true);
/// assert!(!options.optimize);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Run the optimizer before code generation.
    pub optimize: bool,
    /// Errors accepted before the run is aborted.
    pub max_errors: usize,
    /// Warn when a property shadows an inherited classvar.
    pub warn_overrides: bool,
    /// Warn about resources no handler refers to.
    pub warn_unused_resources: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            optimize: true,
            max_errors: MAXERRORS,
            warn_overrides: false,
            warn_unused_resources: true,
        }
    }
}

impl CompileOptions {
    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors;
        self
    }

    pub fn with_warn_overrides(mut self, warn: bool) -> Self {
        self.warn_overrides = warn;
        self
    }

    pub fn with_warn_unused_resources(mut self, warn: bool) -> Self {
        self.warn_unused_resources = warn;
        self
    }
}
