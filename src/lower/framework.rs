//! Lowering of the context-driven allocation operations to runtime calls.

use crate::{
    error::LoweringError,
    ir::{FrameworkOp, FunctionType, Inst, LlvmOp, Op, Type, TypeConverter},
};

use super::{ConversionPattern, PatternSet, RewriteContext};

/// Runtime function `alloc_raw` is lowered to.
pub const ALLOC_SYMBOL: &str = "kernelGenAlloc";
/// Runtime function `dealloc_raw` is lowered to.
pub const DEALLOC_SYMBOL: &str = "kernelGenDealloc";

/// Adds the allocation lowerings to `patterns`.
pub fn populate_framework_patterns(patterns: &mut PatternSet) {
    patterns.insert(AllocRawLowering).insert(DeallocRawLowering);
}

/// `i8* (i8* ctx, iN size)`
#[must_use]
pub fn alloc_signature(converter: &TypeConverter) -> FunctionType {
    FunctionType {
        result: Type::i8_ptr(),
        params: vec![Type::i8_ptr(), converter.intptr()],
    }
}

/// `void (i8* ctx, i8* ptr)`
#[must_use]
pub fn dealloc_signature() -> FunctionType {
    FunctionType {
        result: Type::Void,
        params: vec![Type::i8_ptr(), Type::i8_ptr()],
    }
}

/// `alloc_raw(ctx, size) : T*` becomes a call of [`ALLOC_SYMBOL`] and a
/// bitcast of its result to `T*`.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllocRawLowering;

impl ConversionPattern for AllocRawLowering {
    fn name(&self) -> &'static str {
        "framework-alloc-raw"
    }

    fn matches(&self, op: &Op) -> bool {
        matches!(op, Op::Framework(FrameworkOp::AllocRaw))
    }

    fn rewrite(&self, cx: &mut RewriteContext<'_>, inst: &Inst) -> Result<(), LoweringError> {
        let [ctx, size] = inst.operands.as_slice() else {
            return Err(LoweringError::IllegalOperation {
                op: String::from(inst.op.name()),
                reason: String::from("unexpected operands"),
            });
        };

        let converter = cx.converter;
        cx.get_or_insert_declaration(ALLOC_SYMBOL, || alloc_signature(&converter))?;

        let raw = cx.rewriter.insert(
            Op::Llvm(LlvmOp::Call {
                callee: String::from(ALLOC_SYMBOL),
            }),
            vec![*ctx, *size],
            Type::i8_ptr(),
        );
        let ty = cx.converter.convert(&inst.ty);
        cx.rewriter
            .replace_current(Op::Llvm(LlvmOp::Bitcast), vec![raw], ty);

        Ok(())
    }
}

/// `dealloc_raw(ctx, ptr)` becomes a bitcast of `ptr` to `i8*` and a call
/// of [`DEALLOC_SYMBOL`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DeallocRawLowering;

impl ConversionPattern for DeallocRawLowering {
    fn name(&self) -> &'static str {
        "framework-dealloc-raw"
    }

    fn matches(&self, op: &Op) -> bool {
        matches!(op, Op::Framework(FrameworkOp::DeallocRaw))
    }

    fn rewrite(&self, cx: &mut RewriteContext<'_>, inst: &Inst) -> Result<(), LoweringError> {
        let [ctx, ptr] = inst.operands.as_slice() else {
            return Err(LoweringError::IllegalOperation {
                op: String::from(inst.op.name()),
                reason: String::from("unexpected operands"),
            });
        };

        cx.get_or_insert_declaration(DEALLOC_SYMBOL, dealloc_signature)?;

        let erased = cx
            .rewriter
            .insert(Op::Llvm(LlvmOp::Bitcast), vec![*ptr], Type::i8_ptr());
        cx.rewriter.replace_current(
            Op::Llvm(LlvmOp::Call {
                callee: String::from(DEALLOC_SYMBOL),
            }),
            vec![*ctx, erased],
            Type::Void,
        );

        Ok(())
    }
}
