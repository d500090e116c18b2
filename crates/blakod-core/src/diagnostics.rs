//! Accumulated compiler errors and warnings.

use std::fmt;

use log::warn;

use crate::error::CompilationError;
use crate::limits::MAXERRORS;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single compiler message with its source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Source file, if known.
    pub file: Option<String>,
    /// Line number (1-based, 0 when not tied to a line).
    pub line: u32,
    pub message: String,
    /// The error this diagnostic was created from.
    pub error: Option<CompilationError>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match &self.file {
            Some(file) => write!(f, "{}({}): {}: {}", file, self.line, severity, self.message),
            None => write!(f, "({}): {}: {}", self.line, severity, self.message),
        }
    }
}

/// Collection of diagnostics for one compilation run.
///
/// Enforces the error cap: once `max_errors` errors have been recorded the
/// next push fails with [`CompilationError::TooManyErrors`], which is also
/// recorded as its own diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    error_count: usize,
    max_errors: usize,
    aborted: bool,
    file: Option<String>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::with_limit(MAXERRORS)
    }

    pub fn with_limit(max_errors: usize) -> Self {
        Self {
            items: Vec::new(),
            error_count: 0,
            max_errors: max_errors.max(1),
            aborted: false,
            file: None,
        }
    }

    /// Set the file name attached to subsequent diagnostics.
    pub fn set_file(&mut self, file: Option<String>) {
        self.file = file;
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// Record an error.
    ///
    /// Returns `Err(TooManyErrors)` when this error reaches the cap; the
    /// caller must abort.
    pub fn error(&mut self, error: CompilationError) -> Result<(), CompilationError> {
        if self.aborted {
            return Err(CompilationError::TooManyErrors {
                limit: self.max_errors,
            });
        }
        let line = error.line().unwrap_or(0);
        self.items.push(Diagnostic {
            severity: Severity::Error,
            file: self.file.clone(),
            line,
            message: error.to_string(),
            error: Some(error),
        });
        self.error_count += 1;

        if self.error_count >= self.max_errors {
            let overflow = CompilationError::TooManyErrors {
                limit: self.max_errors,
            };
            self.items.push(Diagnostic {
                severity: Severity::Error,
                file: self.file.clone(),
                line,
                message: overflow.to_string(),
                error: Some(overflow.clone()),
            });
            self.aborted = true;
            return Err(overflow);
        }
        Ok(())
    }

    /// Record a warning. Warnings are also sent to the log.
    pub fn warning(&mut self, line: u32, message: impl Into<String>) {
        let message = message.into();
        warn!("line {line}: {message}");
        self.items.push(Diagnostic {
            severity: Severity::Warning,
            file: self.file.clone(),
            line,
            message,
            error: None,
        });
    }

    /// Number of errors recorded (not counting the overflow marker).
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Whether the error cap was reached.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn max_errors(&self) -> usize {
        self.max_errors
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.error_count = 0;
        self.aborted = false;
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in &self.items {
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}
