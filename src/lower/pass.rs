use std::fmt;

use colored::Colorize;

use crate::{
    config::LoweringConfig,
    diagnostic::{ConversionFailure, Diagnostic, Location},
    error::LoweringError,
    ir::{Function, FunctionRewriter, Module, SymbolTable, TypeConverter},
};

use super::{
    framework::populate_framework_patterns,
    launch::LaunchLowering,
    legality::{ConversionTarget, Legality, LlvmTarget},
    std_ops::populate_std_patterns,
    CheckContext, LoweringState, LoweringStats, PatternSet, RewriteContext,
};

/// Lowers a whole compilation unit to target operations: kernel launches
/// become calls of the launch runtime, and all kernel modules are removed.
///
/// The conversion is all-or-nothing. Every illegal instruction is checked
/// first; only if all of them can be rewritten is the unit changed.
pub struct KernelToRuntimePass {
    config: LoweringConfig,
    target: LlvmTarget,
    patterns: PatternSet,
}

impl Default for KernelToRuntimePass {
    fn default() -> Self {
        Self::new(LoweringConfig::default())
    }
}

impl fmt::Debug for KernelToRuntimePass {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("KernelToRuntimePass")
            .field("config", &self.config)
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl KernelToRuntimePass {
    /// A pass with the launch, standard and framework lowerings.
    #[must_use]
    pub fn new(config: LoweringConfig) -> Self {
        let mut patterns = PatternSet::new();
        patterns.insert(LaunchLowering);
        populate_std_patterns(&mut patterns);
        populate_framework_patterns(&mut patterns);

        Self {
            config,
            target: LlvmTarget,
            patterns,
        }
    }

    /// The pass options.
    #[must_use]
    pub const fn config(&self) -> &LoweringConfig {
        &self.config
    }

    /// The registered conversion patterns.
    #[must_use]
    pub const fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// # Errors
    ///
    /// Returns a [`ConversionFailure`] with one diagnostic per instruction
    /// that cannot be lowered. `module` is left unchanged in that case.
    pub fn run(&self, module: &mut Module) -> Result<LoweringStats, ConversionFailure> {
        let diagnostics = self.check(module);
        if !diagnostics.is_empty() {
            return Err(ConversionFailure::new(diagnostics));
        }

        let mut working = module.clone();
        let mut state = LoweringState::default();
        let converter = TypeConverter::new(self.config.pointer_bitwidth());

        for function in &mut working.functions {
            self.rewrite_function(&mut working.symbols, function, converter, &mut state)
                .map_err(|diagnostic| ConversionFailure::new(vec![diagnostic]))?;
        }

        state.stats.stripped_kernel_modules = working.symbols.remove_kernel_modules();
        *module = working;

        if self.config.verbose() {
            colored::control::set_override(true);
            eprintln!(
                "{} {} lowering {}.",
                "[LOWER]".bright_black().bold(),
                "Finished".green().bold(),
                state.stats
            );
            colored::control::unset_override();
        }

        Ok(state.stats)
    }

    /// Collects a diagnostic for every illegal instruction that no pattern
    /// can rewrite.
    fn check(&self, module: &Module) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        for function in &module.functions {
            let cx = CheckContext {
                symbols: &module.symbols,
                function,
                config: &self.config,
            };

            for (index, inst) in function.body.iter().enumerate() {
                let Legality::Illegal(reason) = self.target.legality(inst) else {
                    continue;
                };

                let result = match self.patterns.find(&inst.op) {
                    Some(pattern) => pattern.check(&cx, inst),
                    None => Err(LoweringError::IllegalOperation {
                        op: String::from(inst.op.name()),
                        reason: String::from(reason),
                    }),
                };

                if let Err(error) = result {
                    diagnostics.push(Diagnostic::new(
                        error,
                        Location::Inst {
                            function: function.name.clone(),
                            index,
                        },
                    ));
                }
            }
        }

        diagnostics
    }

    fn rewrite_function(
        &self,
        symbols: &mut SymbolTable,
        function: &mut Function,
        converter: TypeConverter,
        state: &mut LoweringState,
    ) -> Result<(), Diagnostic> {
        for (_, ty) in &mut function.params {
            *ty = converter.convert(ty);
        }
        function.result = converter.convert(&function.result);

        let name = function.name.clone();
        let mut cursor = 0;

        while let Some(inst) = function.body.get(cursor) {
            let location = Location::Inst {
                function: name.clone(),
                index: cursor,
            };

            let reason = match self.target.legality(inst) {
                Legality::Legal => {
                    cursor += 1;
                    continue;
                },
                Legality::Illegal(reason) => reason,
            };

            let inst = inst.clone();
            let Some(pattern) = self.patterns.find(&inst.op) else {
                return Err(Diagnostic::new(
                    LoweringError::IllegalOperation {
                        op: String::from(inst.op.name()),
                        reason: String::from(reason),
                    },
                    location,
                ));
            };

            let mut cx = RewriteContext {
                symbols: &mut *symbols,
                rewriter: FunctionRewriter::new(&mut *function, cursor),
                converter,
                config: &self.config,
                state: &mut *state,
            };
            pattern
                .rewrite(&mut cx, &inst)
                .map_err(|error| Diagnostic::new(error, location))?;
            cursor = cx.rewriter.cursor();

            state.stats.rewritten += 1;
        }

        Ok(())
    }
}
