//! What counts as fully lowered.

use crate::ir::{Function, Inst, Op};

/// Whether an instruction may remain after conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Legality {
    /// May remain as is.
    Legal,
    /// Has to be rewritten; the reason is shown when no pattern applies.
    Illegal(&'static str),
}

impl Legality {
    /// Whether this is [`Legality::Legal`].
    #[must_use]
    pub const fn is_legal(&self) -> bool {
        matches!(self, Self::Legal)
    }
}

/// Decides which instructions may remain after conversion.
pub trait ConversionTarget: Send + Sync {
    /// Legality of a single instruction.
    fn legality(&self, inst: &Inst) -> Legality;

    /// Whether `function` is fully converted, including its signature.
    fn is_legal_function(&self, function: &Function) -> bool {
        function.body.iter().all(|inst| self.legality(inst).is_legal())
            && function.result.is_target_legal()
            && function.params.iter().all(|(_, ty)| ty.is_target_legal())
    }
}

/// Only target operations over target types are legal. Kernel modules are
/// never looked into.
#[derive(Clone, Copy, Debug, Default)]
pub struct LlvmTarget;

impl ConversionTarget for LlvmTarget {
    fn legality(&self, inst: &Inst) -> Legality {
        match &inst.op {
            Op::Llvm(_) if inst.ty.is_target_legal() => Legality::Legal,
            Op::Llvm(_) => Legality::Illegal("result type is not a target type"),
            Op::Launch(_) => Legality::Illegal("kernel launches must become runtime calls"),
            Op::Std(_) => Legality::Illegal("standard operations must be lowered"),
            Op::Framework(_) => Legality::Illegal("framework operations must be lowered"),
            Op::Unregistered(_) => Legality::Illegal("unknown operation"),
        }
    }
}
