use kernel_lower::{
    ir::{
        Function, Global, Inst, KernelFunction, KernelModule, LaunchFunc, Literal, LlvmOp, Module,
        Op, StdOp, Symbol, Type, ValueId,
    },
    KernelToRuntimePass, Location, LoweringConfig, LoweringError, Severity, LAUNCH_KERNEL_SYMBOL,
};

fn kernel_module(name: &str, kernel: &str, binary: &[u8]) -> KernelModule {
    KernelModule::new(
        name,
        KernelFunction {
            name: String::from(kernel),
            params: Vec::new(),
        },
    )
    .with_binary("nvvm.cubin", binary)
}

struct HostBuilder {
    function: Function,
}

impl HostBuilder {
    fn new(params: impl IntoIterator<Item = Type>) -> Self {
        Self {
            function: Function::new(
                "host",
                std::iter::once(Type::Context).chain(params),
                Type::Void,
            ),
        }
    }

    fn index(&mut self, value: i64) -> ValueId {
        self.function
            .push(
                Op::Std(StdOp::Constant(Literal::i64(value))),
                Vec::new(),
                Type::Index,
            )
            .unwrap()
    }

    fn f32(&mut self, value: f32) -> ValueId {
        self.function
            .push(
                Op::Std(StdOp::Constant(Literal::F32(value))),
                Vec::new(),
                Type::F32,
            )
            .unwrap()
    }

    fn launch(
        &mut self,
        launch: LaunchFunc,
        grid: [i64; 3],
        block: [i64; 3],
        args: &[ValueId],
    ) -> &mut Self {
        let mut operands = grid
            .into_iter()
            .chain(block)
            .map(|dim| self.index(dim))
            .collect::<Vec<_>>();
        operands.extend_from_slice(args);

        self.function.push(Op::Launch(launch), operands, Type::Void);
        self
    }

    fn finish(mut self) -> Function {
        self.function
            .push(Op::Std(StdOp::Return), Vec::new(), Type::Void);
        self.function
    }
}

fn def(function: &Function, value: ValueId) -> &Inst {
    function
        .body
        .iter()
        .find(|inst| inst.result == Some(value))
        .unwrap()
}

fn int_constant(function: &Function, value: ValueId) -> i64 {
    match def(function, value).op {
        Op::Llvm(LlvmOp::Constant(Literal::Int { value, .. })) => value,
        _ => unreachable!("{value} should be an integer constant"),
    }
}

fn calls(function: &Function) -> Vec<&Inst> {
    function
        .body
        .iter()
        .filter(|inst| {
            matches!(&inst.op, Op::Llvm(LlvmOp::Call { callee }) if callee == LAUNCH_KERNEL_SYMBOL)
        })
        .collect()
}

/// The global whose first byte `address` points to.
fn addressed_global(function: &Function, address: ValueId) -> String {
    let gep = def(function, address);
    assert_eq!(gep.op, Op::Llvm(LlvmOp::GetElementPtr));

    match &def(function, gep.operands[0]).op {
        Op::Llvm(LlvmOp::AddressOf { global }) => global.clone(),
        _ => unreachable!("{address} should address a global"),
    }
}

/// Follows the parameter array of `call` back to the value stored in each
/// field of the parameter record, in slot order.
fn marshalled_values(function: &Function, call: &Inst) -> Vec<ValueId> {
    let array = call.operands[9];
    let len = int_constant(function, def(function, array).operands[0]);

    (0..len)
        .map(|i| {
            let slot_store = function
                .body
                .iter()
                .find(|inst| {
                    inst.op == Op::Llvm(LlvmOp::Store)
                        && def(function, inst.operands[1]).operands[0] == array
                        && int_constant(function, def(function, inst.operands[1]).operands[1])
                            == i
                })
                .unwrap();

            let erased = def(function, slot_store.operands[0]);
            assert_eq!(erased.op, Op::Llvm(LlvmOp::Bitcast));
            let field = erased.operands[0];

            function
                .body
                .iter()
                .find(|inst| inst.op == Op::Llvm(LlvmOp::Store) && inst.operands[1] == field)
                .unwrap()
                .operands[0]
        })
        .collect()
}

#[test]
fn launch_with_float_and_pointer_arguments() {
    let mut module = Module::new();
    module
        .add_kernel_module(kernel_module("M", "k", &[0xDE, 0xAD]))
        .unwrap();

    let mut host = HostBuilder::new([Type::ptr(Type::F32)]);
    let p = host.function.param(1).unwrap();
    let f = host.f32(1.0);
    host.launch(LaunchFunc::new("M", "k"), [2, 1, 1], [4, 1, 1], &[f, p]);
    module.add_function(host.finish()).unwrap();

    KernelToRuntimePass::default().run(&mut module).unwrap();

    let symbols = module.symbols();
    assert_eq!(symbols.global("M_blob").unwrap().bytes, [0xDE, 0xAD]);
    assert_eq!(symbols.global("M_k_kernel_name").unwrap().bytes, b"k\0");

    let function = module.function("host").unwrap();
    let calls = calls(function);
    let [call] = calls.as_slice() else {
        unreachable!("there should be exactly one launch call");
    };

    assert_eq!(call.operands.len(), 10);
    assert_eq!(call.operands[0], function.context_arg().unwrap());
    assert_eq!(addressed_global(function, call.operands[1]), "M_blob");
    assert_eq!(addressed_global(function, call.operands[2]), "M_k_kernel_name");

    let dims = call.operands[3..9]
        .iter()
        .map(|dim| int_constant(function, *dim))
        .collect::<Vec<_>>();
    assert_eq!(dims, [2, 1, 1, 4, 1, 1]);

    let values = marshalled_values(function, call);
    assert_eq!(values, [f, p]);
    assert_eq!(
        def(function, values[0]).op,
        Op::Llvm(LlvmOp::Constant(Literal::F32(1.0)))
    );
}

#[test]
fn parameter_array_matches_operands_in_order() {
    let mut module = Module::new();
    module
        .add_kernel_module(kernel_module("M", "k", &[1]))
        .unwrap();

    let mut host = HostBuilder::new([Type::ptr(Type::F32), Type::Index, Type::i32()]);
    let args = (1..4)
        .map(|i| host.function.param(i).unwrap())
        .rev()
        .collect::<Vec<_>>();
    host.launch(LaunchFunc::new("M", "k"), [1; 3], [1; 3], &args);
    host.launch(LaunchFunc::new("M", "k"), [1; 3], [1; 3], &[]);
    module.add_function(host.finish()).unwrap();

    KernelToRuntimePass::default().run(&mut module).unwrap();

    let function = module.function("host").unwrap();
    let calls = calls(function);
    assert_eq!(calls.len(), 2);
    assert_eq!(marshalled_values(function, calls[0]), args);
    assert!(marshalled_values(function, calls[1]).is_empty());

    let record = function
        .body
        .iter()
        .find_map(|inst| match &inst.op {
            Op::Llvm(LlvmOp::Alloca {
                elem: Type::Struct(fields),
            }) if !fields.is_empty() => Some(fields.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        record,
        [Type::i32(), Type::i64(), Type::ptr(Type::F32)]
    );
}

#[test]
fn one_blob_per_module_and_one_name_per_launch() {
    let mut module = Module::new();
    module
        .add_kernel_module(kernel_module("M", "k", &[0xDE, 0xAD]))
        .unwrap();
    module
        .add_kernel_module(kernel_module("N", "k", &[0xBE, 0xEF]))
        .unwrap();

    let mut host = HostBuilder::new([]);
    host.launch(LaunchFunc::new("M", "k"), [1; 3], [1; 3], &[])
        .launch(LaunchFunc::new("N", "k"), [1; 3], [1; 3], &[])
        .launch(LaunchFunc::new("M", "k"), [1; 3], [1; 3], &[]);
    module.add_function(host.finish()).unwrap();

    let stats = KernelToRuntimePass::default().run(&mut module).unwrap();
    assert_eq!(stats.launches, 3);
    assert_eq!(stats.blobs, 2);
    assert_eq!(stats.kernel_names, 3);
    assert_eq!(stats.declarations, 1);

    let globals = module
        .symbols()
        .globals()
        .map(|global| (global.name.as_str(), global.bytes.clone()))
        .collect::<Vec<_>>();
    assert_eq!(
        globals,
        [
            ("M_blob", vec![0xDE, 0xAD]),
            ("M_k_kernel_name", b"k\0".to_vec()),
            ("N_blob", vec![0xBE, 0xEF]),
            ("N_k_kernel_name", b"k\0".to_vec()),
            ("M_k_kernel_name_1", b"k\0".to_vec()),
        ]
    );

    let function = module.function("host").unwrap();
    let blobs = calls(function)
        .into_iter()
        .map(|call| addressed_global(function, call.operands[1]))
        .collect::<Vec<_>>();
    assert_eq!(blobs, ["M_blob", "N_blob", "M_blob"]);
}

#[test]
fn existing_identical_blob_is_reused() {
    let mut module = Module::new();
    module
        .add_symbol(Symbol::Global(Global {
            name: String::from("M_blob"),
            bytes: vec![0xDE, 0xAD],
        }))
        .unwrap();
    module
        .add_kernel_module(kernel_module("M", "k", &[0xDE, 0xAD]))
        .unwrap();

    let mut host = HostBuilder::new([]);
    host.launch(LaunchFunc::new("M", "k"), [1; 3], [1; 3], &[]);
    module.add_function(host.finish()).unwrap();

    let stats = KernelToRuntimePass::default().run(&mut module).unwrap();

    assert_eq!(stats.blobs, 0);
    let globals = module
        .symbols()
        .globals()
        .map(|global| global.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(globals, ["M_blob", "M_k_kernel_name"]);

    let function = module.function("host").unwrap();
    assert_eq!(addressed_global(function, calls(function)[0].operands[1]), "M_blob");
}

#[test]
fn entry_point_is_declared_once_at_the_start() {
    let mut module = Module::new();
    module
        .add_kernel_module(kernel_module("M", "k", &[1]))
        .unwrap();

    for name in ["first", "second"] {
        let mut host = HostBuilder::new([]);
        host.launch(LaunchFunc::new("M", "k"), [1; 3], [1; 3], &[])
            .launch(LaunchFunc::new("M", "k"), [1; 3], [1; 3], &[]);
        let mut function = host.finish();
        function.name = String::from(name);
        module.add_function(function).unwrap();
    }

    KernelToRuntimePass::default().run(&mut module).unwrap();

    let declarations = module
        .symbols()
        .iter()
        .filter(|symbol| matches!(symbol, Symbol::Declaration(_)))
        .count();
    assert_eq!(declarations, 1);
    assert_eq!(
        module.symbols().iter().next().unwrap().name(),
        LAUNCH_KERNEL_SYMBOL
    );
    assert_eq!(
        module
            .symbols()
            .declaration(LAUNCH_KERNEL_SYMBOL)
            .unwrap()
            .to_string(),
        "declare void @kernelGenLaunchKernel(i8*, i8*, i8*, i64, i64, i64, i64, i64, i64, i8**)"
    );
}

#[test]
fn async_launch_aborts_without_mutation() {
    let mut module = Module::new();
    module
        .add_kernel_module(kernel_module("M", "k", &[1]))
        .unwrap();

    let mut host = HostBuilder::new([]);
    host.launch(LaunchFunc::new("M", "k"), [1; 3], [1; 3], &[]);
    let mut launch = LaunchFunc::new("M", "k");
    launch.async_dependencies.push(ValueId(0));
    host.launch(launch, [1; 3], [1; 3], &[]);
    module.add_function(host.finish()).unwrap();

    let before = module.clone();
    let pass = KernelToRuntimePass::default();

    let first = pass.run(&mut module).unwrap_err();
    assert_eq!(module, before);

    let second = pass.run(&mut module).unwrap_err();
    assert_eq!(module, before);
    assert_eq!(first, second);

    match first.errors().collect::<Vec<_>>().as_slice() {
        [LoweringError::UnsupportedAsync { module, kernel }] => {
            assert_eq!(module, "M");
            assert_eq!(kernel, "k");
        },
        _ => unreachable!("it should fail with proper error"),
    }
}

#[test]
fn missing_binary_is_diagnosed_on_the_module() {
    let mut module = Module::new();
    module
        .add_kernel_module(kernel_module("M", "k", &[1]))
        .unwrap();

    let mut host = HostBuilder::new([]);
    host.launch(LaunchFunc::new("M", "k"), [1; 3], [1; 3], &[]);
    module.add_function(host.finish()).unwrap();
    let before = module.clone();

    let config = LoweringConfig::default().with_blob_annotation("rocdl.hsaco");
    let failure = KernelToRuntimePass::new(config)
        .run(&mut module)
        .unwrap_err();

    assert_eq!(module, before);
    failure.emit();

    let [diagnostic] = failure.diagnostics() else {
        unreachable!("there should be exactly one diagnostic");
    };
    assert_eq!(diagnostic.severity, Severity::Error);
    assert_eq!(diagnostic.location, Location::Symbol(String::from("M")));
    assert!(diagnostic.to_string().contains("missing rocdl.hsaco attribute"));
    assert_eq!(
        failure.to_json()[0]["message"],
        serde_json::json!("missing rocdl.hsaco attribute")
    );
}

#[test]
fn configured_annotation_selects_the_binary() {
    let mut module = Module::new();
    module
        .add_kernel_module(
            kernel_module("M", "k", &[1]).with_binary("rocdl.hsaco", [2_u8, 3]),
        )
        .unwrap();

    let mut host = HostBuilder::new([]);
    host.launch(LaunchFunc::new("M", "k"), [1; 3], [1; 3], &[]);
    module.add_function(host.finish()).unwrap();

    let config: LoweringConfig = "blob-annotation=rocdl.hsaco pointer-bitwidth=32"
        .parse()
        .unwrap();
    KernelToRuntimePass::new(config).run(&mut module).unwrap();

    assert_eq!(module.symbols().global("M_blob").unwrap().bytes, [2, 3]);
    assert_eq!(
        module
            .symbols()
            .declaration(LAUNCH_KERNEL_SYMBOL)
            .unwrap()
            .ty
            .params[3],
        Type::i32()
    );
}

#[test]
fn kernel_modules_are_stripped_after_success() {
    let mut module = Module::new();
    module
        .add_kernel_module(kernel_module("M", "k", &[1]))
        .unwrap();
    module
        .add_kernel_module(kernel_module("unused", "k", &[2]))
        .unwrap();

    let mut host = HostBuilder::new([]);
    host.launch(LaunchFunc::new("M", "k"), [1; 3], [1; 3], &[]);
    module.add_function(host.finish()).unwrap();

    let stats = KernelToRuntimePass::default().run(&mut module).unwrap();

    assert_eq!(stats.stripped_kernel_modules, 2);
    assert_eq!(module.symbols().kernel_modules().count(), 0);
    assert!(module.symbols().global("unused_blob").is_none());
}

#[test]
fn launch_without_context_is_rejected() {
    let mut module = Module::new();
    module
        .add_kernel_module(kernel_module("M", "k", &[1]))
        .unwrap();

    let mut function = Function::new("no_ctx", [], Type::Void);
    let one = function
        .push(
            Op::Std(StdOp::Constant(Literal::i64(1))),
            Vec::new(),
            Type::Index,
        )
        .unwrap();
    function.push(
        Op::Launch(LaunchFunc::new("M", "k")),
        vec![one; 6],
        Type::Void,
    );
    module.add_function(function).unwrap();

    let failure = KernelToRuntimePass::default()
        .run(&mut module)
        .unwrap_err();

    match failure.errors().collect::<Vec<_>>().as_slice() {
        [LoweringError::MissingContext { function }] => assert_eq!(function, "no_ctx"),
        _ => unreachable!("it should fail with proper error"),
    }
}

#[test]
fn launch_of_a_kernel_the_module_lacks_is_rejected() {
    let mut module = Module::new();
    module
        .add_kernel_module(kernel_module("M", "k", &[1]))
        .unwrap();

    let mut host = HostBuilder::new([]);
    host.launch(LaunchFunc::new("M", "does_not_exist"), [1; 3], [1; 3], &[]);
    module.add_function(host.finish()).unwrap();
    let before = module.clone();

    let failure = KernelToRuntimePass::default()
        .run(&mut module)
        .unwrap_err();

    assert_eq!(module, before);
    assert!(module.symbols().globals().next().is_none());

    let [diagnostic] = failure.diagnostics() else {
        unreachable!("there should be exactly one diagnostic");
    };
    assert_eq!(diagnostic.severity, Severity::Bug);
    match &diagnostic.error {
        LoweringError::UnknownKernel { module, kernel } => {
            assert_eq!(module, "M");
            assert_eq!(kernel, "does_not_exist");
        },
        _ => unreachable!("it should fail with proper error"),
    }
}
