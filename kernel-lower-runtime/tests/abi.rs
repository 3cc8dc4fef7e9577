//! The runtime reads exactly what the lowering emits.

use kernel_lower::{
    ir::{Function, KernelFunction, KernelModule, LaunchFunc, Literal, Module, Op, StdOp, Type},
    KernelToRuntimePass,
};
use kernel_lower_runtime::{kernel_name_from_ptr, LaunchDims, LAUNCH_KERNEL_SYMBOL};

#[test]
fn entry_point_names_agree() {
    assert_eq!(LAUNCH_KERNEL_SYMBOL, kernel_lower::LAUNCH_KERNEL_SYMBOL);
}

#[test]
fn lowered_kernel_names_decode_to_the_kernel() {
    let mut module = Module::new();
    module
        .add_kernel_module(
            KernelModule::new(
                "saxpy_module",
                KernelFunction {
                    name: String::from("saxpy"),
                    params: vec![Type::F32],
                },
            )
            .with_binary("nvvm.cubin", [0x7F, b'E', b'L', b'F']),
        )
        .unwrap();

    let mut host = Function::new("host", [Type::Context], Type::Void);
    let two = host
        .push(
            Op::Std(StdOp::Constant(Literal::i64(2))),
            Vec::new(),
            Type::Index,
        )
        .unwrap();
    let a = host
        .push(
            Op::Std(StdOp::Constant(Literal::F32(2.5))),
            Vec::new(),
            Type::F32,
        )
        .unwrap();
    host.push(
        Op::Launch(LaunchFunc::new("saxpy_module", "saxpy")),
        vec![two, two, two, two, two, two, a],
        Type::Void,
    );
    module.add_function(host).unwrap();

    KernelToRuntimePass::default().run(&mut module).unwrap();

    let name = module
        .symbols()
        .global("saxpy_module_saxpy_kernel_name")
        .unwrap();
    assert_eq!(
        unsafe { kernel_name_from_ptr(name.bytes.as_ptr().cast()) }.unwrap(),
        "saxpy"
    );

    assert_eq!(
        LaunchDims::from_raw([2; 3], [2; 3]).unwrap().threads_per_block(),
        8
    );
}
