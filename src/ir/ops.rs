use std::fmt;

use super::Type;

/// SSA value handle, unique within its function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "%{}", self.0)
    }
}

/// Constant operand of a constant instruction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Literal {
    /// Integer `value` of width `bits`.
    Int {
        /// The value, sign-extended to 64 bits.
        value: i64,
        /// Bit width.
        bits: u32,
    },
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
}

impl Literal {
    /// An `i32` literal.
    #[must_use]
    pub const fn i32(value: i32) -> Self {
        Self::Int {
            value: value as i64,
            bits: 32,
        }
    }

    /// An `i64` literal.
    #[must_use]
    pub const fn i64(value: i64) -> Self {
        Self::Int { value, bits: 64 }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Int { value, .. } => write!(fmt, "{value}"),
            Self::F32(value) => write!(fmt, "{value:?}"),
            Self::F64(value) => write!(fmt, "{value:?}"),
        }
    }
}

/// Launch of a device kernel contained in a kernel module.
///
/// The instruction's operands are the three grid sizes, the three block
/// sizes, and then the kernel arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchFunc {
    /// Name of the kernel module holding the kernel.
    pub kernel_module: String,
    /// Name of the kernel function inside that module.
    pub kernel: String,
    /// Tokens this launch has to wait for.
    pub async_dependencies: Vec<ValueId>,
    /// Token signalling completion of this launch, if any.
    pub async_token: Option<ValueId>,
}

impl LaunchFunc {
    /// Number of launch configuration operands preceding the kernel
    /// arguments.
    pub const CONFIG_OPERANDS: usize = 6;

    /// A synchronous launch of `kernel` from `kernel_module`.
    #[must_use]
    pub fn new(kernel_module: impl Into<String>, kernel: impl Into<String>) -> Self {
        Self {
            kernel_module: kernel_module.into(),
            kernel: kernel.into(),
            async_dependencies: Vec::new(),
            async_token: None,
        }
    }

    /// Whether the launch waits on or produces an async token.
    #[must_use]
    pub fn is_async(&self) -> bool {
        !self.async_dependencies.is_empty() || self.async_token.is_some()
    }
}

/// Standard arithmetic and control operations.
#[derive(Clone, Debug, PartialEq)]
pub enum StdOp {
    /// Materializes a literal.
    Constant(Literal),
    /// Integer addition.
    AddI,
    /// Integer subtraction.
    SubI,
    /// Integer multiplication.
    MulI,
    /// Float addition.
    AddF,
    /// Float multiplication.
    MulF,
    /// Conversion between `index` and a fixed-width integer.
    IndexCast,
    /// Returns from the function, with its operands as results.
    Return,
}

impl StdOp {
    const fn name(&self) -> &'static str {
        match self {
            Self::Constant(_) => "std.constant",
            Self::AddI => "std.addi",
            Self::SubI => "std.subi",
            Self::MulI => "std.muli",
            Self::AddF => "std.addf",
            Self::MulF => "std.mulf",
            Self::IndexCast => "std.index_cast",
            Self::Return => "std.return",
        }
    }
}

/// Operations that talk to the execution context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameworkOp {
    /// `alloc_raw(ctx, size) : T*`
    AllocRaw,
    /// `dealloc_raw(ctx, ptr)`
    DeallocRaw,
}

impl FrameworkOp {
    const fn name(self) -> &'static str {
        match self {
            Self::AllocRaw => "framework.alloc_raw",
            Self::DeallocRaw => "framework.dealloc_raw",
        }
    }
}

/// Target operations, the only family legal after lowering.
#[derive(Clone, Debug, PartialEq)]
pub enum LlvmOp {
    /// Materializes a literal.
    Constant(Literal),
    /// `alloca %count x elem`, the result type is `elem*`.
    Alloca {
        /// Type of each allocated element.
        elem: Type,
    },
    /// `getelementptr %base[%indices...]`
    GetElementPtr,
    /// `store %value, %ptr`
    Store,
    /// `load %ptr`
    Load,
    /// Reinterprets a pointer as another pointer type.
    Bitcast,
    /// Sign extension to a wider integer.
    SExt,
    /// Truncation to a narrower integer.
    Trunc,
    /// Address of a global, typed as a pointer to its array type.
    AddressOf {
        /// Name of the global.
        global: String,
    },
    /// Call of a declared function.
    Call {
        /// Name of the declared function.
        callee: String,
    },
    /// Integer addition.
    Add,
    /// Integer subtraction.
    Sub,
    /// Integer multiplication.
    Mul,
    /// Float addition.
    FAdd,
    /// Float multiplication.
    FMul,
    /// Function return.
    Return,
}

impl LlvmOp {
    const fn name(&self) -> &'static str {
        match self {
            Self::Constant(_) => "llvm.constant",
            Self::Alloca { .. } => "llvm.alloca",
            Self::GetElementPtr => "llvm.getelementptr",
            Self::Store => "llvm.store",
            Self::Load => "llvm.load",
            Self::Bitcast => "llvm.bitcast",
            Self::SExt => "llvm.sext",
            Self::Trunc => "llvm.trunc",
            Self::AddressOf { .. } => "llvm.addressof",
            Self::Call { .. } => "llvm.call",
            Self::Add => "llvm.add",
            Self::Sub => "llvm.sub",
            Self::Mul => "llvm.mul",
            Self::FAdd => "llvm.fadd",
            Self::FMul => "llvm.fmul",
            Self::Return => "llvm.return",
        }
    }
}

/// An operation together with its op-specific attributes.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    /// `gpu.launch_func`
    Launch(LaunchFunc),
    /// `std.*`
    Std(StdOp),
    /// `framework.*`
    Framework(FrameworkOp),
    /// `llvm.*`
    Llvm(LlvmOp),
    /// An operation of a dialect that no conversion pattern knows about.
    Unregistered(String),
}

impl Op {
    /// Fully qualified operation name, e.g. `llvm.call`.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Launch(_) => "gpu.launch_func",
            Self::Std(op) => op.name(),
            Self::Framework(op) => op.name(),
            Self::Llvm(op) => op.name(),
            Self::Unregistered(name) => name,
        }
    }

    /// The launch attributes if this is a kernel launch.
    #[must_use]
    pub const fn as_launch(&self) -> Option<&LaunchFunc> {
        match self {
            Self::Launch(launch) => Some(launch),
            _ => None,
        }
    }

    /// The target operation if this is one.
    #[must_use]
    pub const fn as_llvm(&self) -> Option<&LlvmOp> {
        match self {
            Self::Llvm(op) => Some(op),
            _ => None,
        }
    }
}

/// A single instruction; `ty` is [`Type::Void`] iff `result` is `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct Inst {
    /// Result value, `None` for void instructions.
    pub result: Option<ValueId>,
    /// Result type.
    pub ty: Type,
    /// The operation.
    pub op: Op,
    /// Operand values, in order.
    pub operands: Vec<ValueId>,
}

impl Inst {
    /// Launch configuration operands `[gx, gy, gz, bx, by, bz]` of a launch.
    #[must_use]
    pub fn launch_config(&self) -> Option<&[ValueId]> {
        self.op.as_launch()?;
        self.operands.get(..LaunchFunc::CONFIG_OPERANDS)
    }

    /// Kernel arguments of a launch, i.e. everything after the launch
    /// configuration.
    #[must_use]
    pub fn kernel_operands(&self) -> Option<&[ValueId]> {
        self.op.as_launch()?;
        self.operands.get(LaunchFunc::CONFIG_OPERANDS..)
    }
}
