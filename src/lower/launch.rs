use crate::{
    error::{IrError, LoweringError},
    ir::{
        FunctionType, Global, Inst, LaunchFunc, Literal, LlvmOp, Op, Symbol, SymbolTable, Type,
        TypeConverter, ValueId,
    },
};

use super::{params::build_params, CheckContext, ConversionPattern, RewriteContext};

/// Name of the runtime function every kernel launch is lowered to.
pub const LAUNCH_KERNEL_SYMBOL: &str = "kernelGenLaunchKernel";

const BLOB_SUFFIX: &str = "_blob";
const KERNEL_NAME_SUFFIX: &str = "_kernel_name";

/// `void (i8* ctx, i8* blob, i8* name, iN gx, iN gy, iN gz, iN bx, iN by,
/// iN bz, i8** params)`
#[must_use]
pub fn launch_kernel_signature(converter: &TypeConverter) -> FunctionType {
    let mut params = vec![Type::i8_ptr(), Type::i8_ptr(), Type::i8_ptr()];
    params.resize(3 + LaunchFunc::CONFIG_OPERANDS, converter.intptr());
    params.push(Type::ptr(Type::i8_ptr()));

    FunctionType {
        result: Type::Void,
        params,
    }
}

/// Lowers `gpu.launch_func` to a call of [`LAUNCH_KERNEL_SYMBOL`].
#[derive(Clone, Copy, Debug, Default)]
pub struct LaunchLowering;

impl ConversionPattern for LaunchLowering {
    fn name(&self) -> &'static str {
        "launch-to-runtime-call"
    }

    fn matches(&self, op: &Op) -> bool {
        matches!(op, Op::Launch(_))
    }

    fn check(&self, cx: &CheckContext<'_>, inst: &Inst) -> Result<(), LoweringError> {
        let launch = as_launch(inst)?;
        kernel_module_binary(cx.symbols, launch, cx.config.blob_annotation())?;

        if cx.function.context_arg().is_none() {
            return Err(LoweringError::MissingContext {
                function: cx.function.name.clone(),
            });
        }

        Ok(())
    }

    fn rewrite(&self, cx: &mut RewriteContext<'_>, inst: &Inst) -> Result<(), LoweringError> {
        lower_launch(cx, inst)
    }
}

/// Replaces the launch under the rewriter's cursor by the marshalling code
/// and the runtime call, then erases it.
///
/// # Errors
///
/// Fails before touching the function if the launch is asynchronous, its
/// kernel module does not exist, holds a different kernel or lacks the
/// configured binary, or the enclosing function has no context argument.
pub fn lower_launch(cx: &mut RewriteContext<'_>, inst: &Inst) -> Result<(), LoweringError> {
    let launch = as_launch(inst)?;

    let binary =
        kernel_module_binary(cx.symbols, launch, cx.config.blob_annotation())?.to_vec();

    let ctx = cx
        .rewriter
        .function()
        .context_arg()
        .ok_or_else(|| LoweringError::MissingContext {
            function: cx.rewriter.function().name.clone(),
        })?;

    let (Some(config), Some(args)) = (inst.launch_config(), inst.kernel_operands()) else {
        return Err(IrError::MalformedLaunch(launch.kernel.clone()).into());
    };
    for value in config.iter().chain(args) {
        cx.converted_type_of(*value)?;
    }

    let blob_name = materialize_blob(cx, &launch.kernel_module, binary)?;

    let mut kernel_name = launch.kernel.clone().into_bytes();
    kernel_name.push(b'\0');
    let kernel_name_name = cx.symbols.unique_name(&format!(
        "{}_{}{KERNEL_NAME_SUFFIX}",
        launch.kernel_module, launch.kernel
    ));
    cx.symbols.push(Symbol::Global(Global {
        name: kernel_name_name.clone(),
        bytes: kernel_name,
    }))?;
    cx.state.stats.kernel_names += 1;

    let zero = cx.rewriter.insert(
        Op::Llvm(LlvmOp::Constant(Literal::i32(0))),
        Vec::new(),
        Type::i32(),
    );
    let blob = global_address(cx, &blob_name, zero)?;
    let name = global_address(cx, &kernel_name_name, zero)?;

    let params = build_params(&mut cx.rewriter, &cx.converter, args)?;

    let converter = cx.converter;
    cx.get_or_insert_declaration(LAUNCH_KERNEL_SYMBOL, || {
        launch_kernel_signature(&converter)
    })?;

    let mut operands = vec![ctx, blob, name];
    operands.extend_from_slice(config);
    operands.push(params);
    cx.rewriter.insert_void(
        Op::Llvm(LlvmOp::Call {
            callee: String::from(LAUNCH_KERNEL_SYMBOL),
        }),
        operands,
    );

    cx.rewriter.erase_current();
    cx.state.stats.launches += 1;

    Ok(())
}

fn as_launch(inst: &Inst) -> Result<&LaunchFunc, LoweringError> {
    let Some(launch) = inst.op.as_launch() else {
        return Err(LoweringError::IllegalOperation {
            op: String::from(inst.op.name()),
            reason: String::from("not a kernel launch"),
        });
    };

    if launch.is_async() {
        return Err(LoweringError::UnsupportedAsync {
            module: launch.kernel_module.clone(),
            kernel: launch.kernel.clone(),
        });
    }

    if inst.launch_config().is_none() {
        return Err(IrError::MalformedLaunch(launch.kernel.clone()).into());
    }

    Ok(launch)
}

fn kernel_module_binary<'a>(
    symbols: &'a SymbolTable,
    launch: &LaunchFunc,
    annotation: &str,
) -> Result<&'a [u8], LoweringError> {
    let Some(module) = symbols.kernel_module(&launch.kernel_module) else {
        return Err(LoweringError::ReferentialIntegrityViolation {
            module: launch.kernel_module.clone(),
        });
    };

    if module.kernel.name != launch.kernel {
        return Err(LoweringError::UnknownKernel {
            module: module.name.clone(),
            kernel: launch.kernel.clone(),
        });
    }

    module
        .binary(annotation)
        .map(|binary| binary.bytes.as_slice())
        .ok_or_else(|| LoweringError::MissingBinaryAttribute {
            module: module.name.clone(),
            annotation: String::from(annotation),
        })
}

/// Returns the name of the blob global of `module`, creating it on first use.
fn materialize_blob(
    cx: &mut RewriteContext<'_>,
    module: &str,
    bytes: Vec<u8>,
) -> Result<String, LoweringError> {
    if let Some(name) = cx.state.blobs.get(module) {
        return Ok(name.clone());
    }

    let base = format!("{module}{BLOB_SUFFIX}");
    let name = match cx.symbols.global(&base) {
        Some(existing) if existing.bytes == bytes => base,
        _ => {
            let name = cx.symbols.unique_name(&base);
            cx.symbols.push(Symbol::Global(Global {
                name: name.clone(),
                bytes,
            }))?;
            cx.state.stats.blobs += 1;
            name
        },
    };

    cx.state.blobs.insert(String::from(module), name.clone());

    Ok(name)
}

/// Emits `&global[0][0]` as an `i8*`.
fn global_address(
    cx: &mut RewriteContext<'_>,
    global: &str,
    zero: ValueId,
) -> Result<ValueId, LoweringError> {
    let ty = cx
        .symbols
        .global(global)
        .map(Global::ty)
        .ok_or_else(|| LoweringError::ReferentialIntegrityViolation {
            module: String::from(global),
        })?;

    let address = cx.rewriter.insert(
        Op::Llvm(LlvmOp::AddressOf {
            global: String::from(global),
        }),
        Vec::new(),
        Type::ptr(ty),
    );

    Ok(cx.rewriter.insert(
        Op::Llvm(LlvmOp::GetElementPtr),
        vec![address, zero, zero],
        Type::i8_ptr(),
    ))
}
