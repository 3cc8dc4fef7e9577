//! Lowering of host functions to the target form: kernel launches become
//! runtime calls, standard and framework operations become target operations.

use std::{collections::HashMap, fmt};

use crate::{
    config::LoweringConfig,
    error::LoweringError,
    ir::{
        Declaration, Function, FunctionRewriter, FunctionType, Inst, Op, Symbol, SymbolTable,
        TypeConverter, ValueId,
    },
};

/// Allocation operations to runtime calls.
pub mod framework;
/// Kernel launches to runtime calls.
pub mod launch;
pub mod legality;
/// Kernel argument marshalling.
pub mod params;
/// The whole-unit conversion driver.
pub mod pass;
/// Standard operations to target operations.
pub mod std_ops;

/// Read-only view used to check a pattern's preconditions before anything
/// is rewritten.
pub struct CheckContext<'a> {
    /// Symbols of the unit being converted.
    pub symbols: &'a SymbolTable,
    /// Function enclosing the instruction.
    pub function: &'a Function,
    /// Pass options.
    pub config: &'a LoweringConfig,
}

/// Mutable state of one rewrite: the unit's symbols, an editor positioned on
/// the instruction being rewritten, and the per-run bookkeeping.
pub struct RewriteContext<'a> {
    /// Symbols of the working copy.
    pub symbols: &'a mut SymbolTable,
    /// Editor positioned on the instruction being rewritten.
    pub rewriter: FunctionRewriter<'a>,
    /// Converter for the configured pointer width.
    pub converter: TypeConverter,
    /// Pass options.
    pub config: &'a LoweringConfig,
    /// Bookkeeping of the current run.
    pub state: &'a mut LoweringState,
}

impl RewriteContext<'_> {
    /// Returns the converted type of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`LoweringError::UnknownValue`] if `value` is not defined in
    /// the function being rewritten.
    pub fn converted_type_of(&self, value: ValueId) -> Result<crate::ir::Type, LoweringError> {
        self.rewriter
            .type_of(value)
            .map(|ty| self.converter.convert(ty))
            .ok_or(LoweringError::UnknownValue(value))
    }

    /// Looks up the external function `name`, declaring it at the start of the
    /// symbol table if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`LoweringError::Ir`] if `name` is taken by a symbol that is not
    /// a function declaration.
    pub fn get_or_insert_declaration(
        &mut self,
        name: &str,
        ty: impl FnOnce() -> FunctionType,
    ) -> Result<(), LoweringError> {
        if self.symbols.declaration(name).is_some() {
            return Ok(());
        }

        self.symbols.push_front(Symbol::Declaration(Declaration {
            name: String::from(name),
            ty: ty(),
        }))?;
        self.state.stats.declarations += 1;

        Ok(())
    }
}

/// Bookkeeping scoped to a single run over one compilation unit.
#[derive(Debug, Default)]
pub struct LoweringState {
    /// Binary blob global per kernel module name.
    pub(crate) blobs: HashMap<String, String>,
    /// Counters reported at the end of the run.
    pub stats: LoweringStats,
}

/// What a successful run changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoweringStats {
    /// Kernel launches lowered to runtime calls.
    pub launches: usize,
    /// Binary blob globals created.
    pub blobs: usize,
    /// Kernel name globals created.
    pub kernel_names: usize,
    /// Runtime function declarations added.
    pub declarations: usize,
    /// Instructions rewritten by any pattern.
    pub rewritten: usize,
    /// Kernel modules removed after conversion.
    pub stripped_kernel_modules: usize,
}

impl fmt::Display for LoweringStats {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "{} launch{}, {} operation{} rewritten, {} blob{}, {} kernel module{} stripped",
            self.launches,
            if self.launches == 1 { "" } else { "es" },
            self.rewritten,
            if self.rewritten == 1 { "" } else { "s" },
            self.blobs,
            if self.blobs == 1 { "" } else { "s" },
            self.stripped_kernel_modules,
            if self.stripped_kernel_modules == 1 {
                ""
            } else {
                "s"
            },
        )
    }
}

/// A rewrite from one illegal operation class to target operations.
pub trait ConversionPattern: Send + Sync {
    /// Short name for debug output.
    fn name(&self) -> &'static str;

    /// Whether this pattern rewrites `op`.
    fn matches(&self, op: &Op) -> bool;

    /// Checks the preconditions of [`Self::rewrite`] without mutating
    /// anything.
    ///
    /// # Errors
    ///
    /// Returns the [`LoweringError`] that `rewrite` would fail with.
    fn check(&self, _cx: &CheckContext<'_>, _inst: &Inst) -> Result<(), LoweringError> {
        Ok(())
    }

    /// Rewrites `inst`, the instruction under the rewriter's cursor.
    ///
    /// # Errors
    ///
    /// Returns a [`LoweringError`] if the instruction cannot be converted.
    fn rewrite(&self, cx: &mut RewriteContext<'_>, inst: &Inst) -> Result<(), LoweringError>;
}

/// An ordered collection of conversion patterns; the first match wins.
#[derive(Default)]
pub struct PatternSet {
    patterns: Vec<Box<dyn ConversionPattern>>,
}

impl PatternSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `pattern`, it only applies where no earlier pattern matches.
    pub fn insert(&mut self, pattern: impl ConversionPattern + 'static) -> &mut Self {
        self.patterns.push(Box::new(pattern));
        self
    }

    /// The first pattern that matches `op`.
    #[must_use]
    pub fn find(&self, op: &Op) -> Option<&dyn ConversionPattern> {
        self.patterns
            .iter()
            .find(|pattern| pattern.matches(op))
            .map(|pattern| &**pattern)
    }

    /// Number of patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the set has no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl fmt::Debug for PatternSet {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_list()
            .entries(self.patterns.iter().map(|pattern| pattern.name()))
            .finish()
    }
}
