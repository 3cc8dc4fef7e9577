//! Diagnostics of a failed lowering, rendered for humans or as JSON.

use std::fmt;

use colored::Colorize;

use crate::error::LoweringError;

/// How bad a [`Diagnostic`] is.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Severity {
    /// The input cannot be lowered.
    Error,
    /// A broken invariant of the surrounding compiler.
    Bug,
}

impl fmt::Display for Severity {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Error => fmt.write_str("error"),
            Self::Bug => fmt.write_str("internal error"),
        }
    }
}

/// Where a diagnostic is attached.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Location {
    /// A symbol of the compilation unit, e.g. a kernel module.
    Symbol(String),
    /// The instruction at `index` in the body of `function`.
    Inst {
        /// Name of the function.
        function: String,
        /// Index into the function body.
        index: usize,
    },
}

impl fmt::Display for Location {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Symbol(name) => write!(fmt, "@{name}"),
            Self::Inst { function, index } => write!(fmt, "@{function}#{index}"),
        }
    }
}

/// One reason a compilation unit cannot be lowered, attached to where it
/// happened.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Diagnostic {
    /// Whether the input or the compiler is at fault.
    pub severity: Severity,
    /// The symbol or instruction the error is about.
    pub location: Location,
    /// What went wrong.
    pub error: LoweringError,
}

impl Diagnostic {
    /// Attaches `error` to the entity it is about. Binary lookup failures are
    /// attached to the kernel module, everything else to the instruction at
    /// `location`.
    #[must_use]
    pub fn new(error: LoweringError, location: Location) -> Self {
        let location = match &error {
            LoweringError::MissingBinaryAttribute { module, .. } => {
                Location::Symbol(module.clone())
            },
            _ => location,
        };
        let severity = if error.is_internal() {
            Severity::Bug
        } else {
            Severity::Error
        };

        Self {
            severity,
            location,
            error,
        }
    }

    /// The diagnostic as a `{ severity, location, message }` JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let location = match &self.location {
            Location::Symbol(name) => serde_json::json!({ "symbol": name }),
            Location::Inst { function, index } => {
                serde_json::json!({ "function": function, "inst": index })
            },
        };

        serde_json::json!({
            "severity": self.severity.to_string(),
            "location": location,
            "message": self.error.to_string(),
        })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => self.severity.to_string().red().bold(),
            Severity::Bug => self.severity.to_string().magenta().bold(),
        };

        write!(
            fmt,
            "{severity}: [kernel-lower]: {}\n  {} {}",
            self.error,
            "-->".bright_black().bold(),
            self.location
        )
    }
}

/// Failure of a whole-unit conversion. The unit was left unchanged.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub struct ConversionFailure {
    diagnostics: Vec<Diagnostic>,
}

impl ConversionFailure {
    /// Collects the diagnostics of one failed run.
    #[must_use]
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    /// All diagnostics, in the order they were found.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The error of every diagnostic.
    pub fn errors(&self) -> impl Iterator<Item = &LoweringError> {
        self.diagnostics.iter().map(|diagnostic| &diagnostic.error)
    }

    /// Prints every diagnostic to stderr.
    pub fn emit(&self) {
        for diagnostic in &self.diagnostics {
            eprintln!("{diagnostic}");
        }
    }

    /// All diagnostics as a JSON array.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.diagnostics.iter().map(Diagnostic::to_json).collect())
    }
}

impl fmt::Display for ConversionFailure {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "failed to lower the compilation unit ({} diagnostic{})",
            self.diagnostics.len(),
            if self.diagnostics.len() == 1 { "" } else { "s" }
        )?;

        for diagnostic in &self.diagnostics {
            write!(fmt, "\n{diagnostic}")?;
        }

        Ok(())
    }
}
