//! Lowering of device kernel launches to calls of a host runtime.
//!
//! A `gpu.launch_func` instruction in a host function is replaced by code
//! that marshals the kernel arguments into a stack array of pointers, embeds
//! the kernel module's compiled binary and the kernel name as constant
//! globals, and calls `kernelGenLaunchKernel`. The lowering runs as part of
//! [`KernelToRuntimePass`], an all-or-nothing conversion of a whole
//! compilation unit to target operations.
//!
//! ```
//! use kernel_lower::{
//!     ir::{Function, KernelFunction, KernelModule, LaunchFunc, Literal, Module, Op, StdOp, Type},
//!     KernelToRuntimePass,
//! };
//!
//! let mut module = Module::new();
//! module
//!     .add_kernel_module(
//!         KernelModule::new("M", KernelFunction { name: "k".into(), params: Vec::new() })
//!             .with_binary("nvvm.cubin", [0xDE, 0xAD]),
//!     )
//!     .unwrap();
//!
//! let mut host = Function::new("host", [Type::Context], Type::Void);
//! let one = host
//!     .push(Op::Std(StdOp::Constant(Literal::i64(1))), Vec::new(), Type::Index)
//!     .unwrap();
//! host.push(Op::Launch(LaunchFunc::new("M", "k")), vec![one; 6], Type::Void);
//! host.push(Op::Std(StdOp::Return), Vec::new(), Type::Void);
//! module.add_function(host).unwrap();
//!
//! KernelToRuntimePass::default().run(&mut module).unwrap();
//!
//! assert_eq!(module.symbols().global("M_blob").unwrap().bytes, [0xDE, 0xAD]);
//! assert_eq!(module.symbols().global("M_k_kernel_name").unwrap().bytes, b"k\0");
//! assert_eq!(module.symbols().kernel_modules().count(), 0);
//! ```

/// Pass options.
pub mod config;
/// Diagnostics of failed conversions.
pub mod diagnostic;
/// Error types.
pub mod error;
/// The host IR the pass works on.
pub mod ir;
/// Conversion patterns and the pass driver.
pub mod lower;

pub use config::{ConfigError, LoweringConfig};
pub use diagnostic::{ConversionFailure, Diagnostic, Location, Severity};
pub use error::{IrError, LoweringError};
pub use lower::{launch::LAUNCH_KERNEL_SYMBOL, pass::KernelToRuntimePass, LoweringStats};
