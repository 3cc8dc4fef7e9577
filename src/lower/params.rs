use crate::{
    error::LoweringError,
    ir::{FunctionRewriter, Literal, LlvmOp, Op, Type, TypeConverter, ValueId},
};

/// Marshals `operands` into a stack record and returns the base address of
/// an `i8*` array whose slot `i` points to field `i` of that record.
///
/// Everything is inserted before the rewriter's cursor:
///
/// ```text
/// %one    = llvm.constant 1 : i32
/// %record = llvm.alloca %one : { T0, .., Tn }*
/// %len    = llvm.constant n : i32
/// %array  = llvm.alloca %len : i8**
/// %zero   = llvm.constant 0 : i32
/// ```
///
/// followed, per operand, by a field address, a store of the operand, the
/// slot address, and a store of the type-erased field address.
///
/// # Errors
///
/// Returns [`LoweringError::UnknownValue`] if an operand is not defined in the
/// function being rewritten. Nothing is inserted in that case.
pub fn build_params(
    rewriter: &mut FunctionRewriter<'_>,
    converter: &TypeConverter,
    operands: &[ValueId],
) -> Result<ValueId, LoweringError> {
    let fields = operands
        .iter()
        .map(|operand| {
            rewriter
                .type_of(*operand)
                .map(|ty| converter.convert(ty))
                .ok_or(LoweringError::UnknownValue(*operand))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let record_ty = Type::Struct(fields.clone());

    let one = constant_i32(rewriter, 1);
    let record = rewriter.insert(
        Op::Llvm(LlvmOp::Alloca {
            elem: record_ty.clone(),
        }),
        vec![one],
        Type::ptr(record_ty),
    );

    let len = constant_i32(rewriter, operands.len());
    let array = rewriter.insert(
        Op::Llvm(LlvmOp::Alloca {
            elem: Type::i8_ptr(),
        }),
        vec![len],
        Type::ptr(Type::i8_ptr()),
    );

    let zero = constant_i32(rewriter, 0);

    for (i, (operand, field_ty)) in operands.iter().zip(fields).enumerate() {
        let index = constant_i32(rewriter, i);

        let field = rewriter.insert(
            Op::Llvm(LlvmOp::GetElementPtr),
            vec![record, zero, index],
            Type::ptr(field_ty),
        );
        rewriter.insert_void(Op::Llvm(LlvmOp::Store), vec![*operand, field]);

        let slot = rewriter.insert(
            Op::Llvm(LlvmOp::GetElementPtr),
            vec![array, index],
            Type::ptr(Type::i8_ptr()),
        );
        let erased = rewriter.insert(Op::Llvm(LlvmOp::Bitcast), vec![field], Type::i8_ptr());
        rewriter.insert_void(Op::Llvm(LlvmOp::Store), vec![erased, slot]);
    }

    Ok(array)
}

fn constant_i32(rewriter: &mut FunctionRewriter<'_>, value: usize) -> ValueId {
    let value = i64::try_from(value).unwrap_or(i64::MAX);

    rewriter.insert(
        Op::Llvm(LlvmOp::Constant(Literal::Int { value, bits: 32 })),
        Vec::new(),
        Type::i32(),
    )
}
