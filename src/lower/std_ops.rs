//! One-to-one lowering of the standard operations.

use crate::{
    error::LoweringError,
    ir::{Inst, Literal, LlvmOp, Op, StdOp, Type},
};

use super::{ConversionPattern, PatternSet, RewriteContext};

/// Adds the standard operation lowerings to `patterns`.
pub fn populate_std_patterns(patterns: &mut PatternSet) {
    patterns
        .insert(ConstantLowering)
        .insert(ArithLowering)
        .insert(IndexCastLowering)
        .insert(ReturnLowering);
}

/// `std.constant` to `llvm.constant`, with `index` literals resized to the
/// pointer width.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConstantLowering;

impl ConversionPattern for ConstantLowering {
    fn name(&self) -> &'static str {
        "std-constant"
    }

    fn matches(&self, op: &Op) -> bool {
        matches!(op, Op::Std(StdOp::Constant(_)))
    }

    fn rewrite(&self, cx: &mut RewriteContext<'_>, inst: &Inst) -> Result<(), LoweringError> {
        let Op::Std(StdOp::Constant(literal)) = &inst.op else {
            return Err(illegal(inst));
        };

        let ty = cx.converter.convert(&inst.ty);
        let literal = match (*literal, &ty) {
            (Literal::Int { value, .. }, Type::Int(bits)) => Literal::Int { value, bits: *bits },
            (literal, _) => literal,
        };

        cx.rewriter
            .replace_current(Op::Llvm(LlvmOp::Constant(literal)), Vec::new(), ty);
        Ok(())
    }
}

/// Integer and floating point arithmetic.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArithLowering;

impl ConversionPattern for ArithLowering {
    fn name(&self) -> &'static str {
        "std-arith"
    }

    fn matches(&self, op: &Op) -> bool {
        matches!(
            op,
            Op::Std(StdOp::AddI | StdOp::SubI | StdOp::MulI | StdOp::AddF | StdOp::MulF)
        )
    }

    fn rewrite(&self, cx: &mut RewriteContext<'_>, inst: &Inst) -> Result<(), LoweringError> {
        let op = match &inst.op {
            Op::Std(StdOp::AddI) => LlvmOp::Add,
            Op::Std(StdOp::SubI) => LlvmOp::Sub,
            Op::Std(StdOp::MulI) => LlvmOp::Mul,
            Op::Std(StdOp::AddF) => LlvmOp::FAdd,
            Op::Std(StdOp::MulF) => LlvmOp::FMul,
            _ => return Err(illegal(inst)),
        };

        let ty = cx.converter.convert(&inst.ty);
        cx.rewriter
            .replace_current(Op::Llvm(op), inst.operands.clone(), ty);
        Ok(())
    }
}

/// Casts between `index` and fixed-width integers.
#[derive(Clone, Copy, Debug, Default)]
pub struct IndexCastLowering;

impl ConversionPattern for IndexCastLowering {
    fn name(&self) -> &'static str {
        "std-index-cast"
    }

    fn matches(&self, op: &Op) -> bool {
        matches!(op, Op::Std(StdOp::IndexCast))
    }

    fn rewrite(&self, cx: &mut RewriteContext<'_>, inst: &Inst) -> Result<(), LoweringError> {
        let [source] = inst.operands.as_slice() else {
            return Err(illegal(inst));
        };

        let from = cx.converted_type_of(*source)?;
        let to = cx.converter.convert(&inst.ty);

        let op = match (&from, &to) {
            (Type::Int(from), Type::Int(to)) if to > from => LlvmOp::SExt,
            (Type::Int(from), Type::Int(to)) if to < from => LlvmOp::Trunc,
            _ => LlvmOp::Bitcast,
        };

        cx.rewriter
            .replace_current(Op::Llvm(op), vec![*source], to);
        Ok(())
    }
}

/// `std.return` to `llvm.return`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReturnLowering;

impl ConversionPattern for ReturnLowering {
    fn name(&self) -> &'static str {
        "std-return"
    }

    fn matches(&self, op: &Op) -> bool {
        matches!(op, Op::Std(StdOp::Return))
    }

    fn rewrite(&self, cx: &mut RewriteContext<'_>, inst: &Inst) -> Result<(), LoweringError> {
        cx.rewriter
            .replace_current(Op::Llvm(LlvmOp::Return), inst.operands.clone(), Type::Void);
        Ok(())
    }
}

fn illegal(inst: &Inst) -> LoweringError {
    LoweringError::IllegalOperation {
        op: String::from(inst.op.name()),
        reason: String::from("unexpected operands"),
    }
}
