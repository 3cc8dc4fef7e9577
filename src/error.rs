//! Error types of the host IR and of the lowering.

use crate::ir::ValueId;

/// Structural errors of the host IR.
#[derive(Debug, PartialEq, Eq, thiserror::Error, Clone)]
pub enum IrError {
    /// A symbol or function name is defined twice.
    #[error("symbol `@{0}` is already defined")]
    DuplicateSymbol(String),
    /// A launch has fewer than six configuration operands.
    #[error("launch of `@{0}` needs six launch configuration operands")]
    MalformedLaunch(String),
}

/// Reasons a compilation unit cannot be lowered.
#[derive(Debug, PartialEq, Eq, thiserror::Error, Clone)]
pub enum LoweringError {
    /// A launch with async dependencies or an async token.
    #[error("cannot convert launch of `@{module}::@{kernel}` with async dependency or result")]
    UnsupportedAsync {
        /// Kernel module of the launch.
        module: String,
        /// Launched kernel.
        kernel: String,
    },

    /// A kernel module has no binary under the configured annotation.
    #[error("missing {annotation} attribute")]
    MissingBinaryAttribute {
        /// Kernel module without the binary.
        module: String,
        /// Annotation the binary was looked up under.
        annotation: String,
    },

    /// A launch names a kernel module that does not exist.
    #[error("expected a kernel module `@{module}`")]
    ReferentialIntegrityViolation {
        /// Name that does not resolve to a kernel module.
        module: String,
    },

    /// A launch names a kernel its kernel module does not hold.
    #[error("kernel module `@{module}` has no kernel `@{kernel}`")]
    UnknownKernel {
        /// Kernel module the launch names.
        module: String,
        /// Kernel the module does not hold.
        kernel: String,
    },

    /// An illegal operation that no pattern can rewrite.
    #[error("failed to legalize operation `{op}`: {reason}")]
    IllegalOperation {
        /// Fully qualified operation name.
        op: String,
        /// Why the operation is illegal.
        reason: String,
    },

    /// A launch inside a function without a context parameter.
    #[error("function `@{function}` has no execution context argument")]
    MissingContext {
        /// Function enclosing the launch.
        function: String,
    },

    /// An operand that is not defined in its function.
    #[error("use of undefined value {0}")]
    UnknownValue(ValueId),

    /// A structural error of the host IR.
    #[error(transparent)]
    Ir(#[from] IrError),
}

impl LoweringError {
    /// Errors that indicate a broken invariant of the surrounding compiler
    /// rather than bad input.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::ReferentialIntegrityViolation { .. }
                | Self::UnknownKernel { .. }
                | Self::UnknownValue(_)
                | Self::Ir(_)
        )
    }
}
