//! A minimal host IR: one compilation unit with a symbol table, host
//! functions made of flat instruction lists, and kernel modules that carry
//! their compiled device binaries.

mod module;
mod ops;
mod print;
mod rewriter;
mod types;

pub use module::{
    Declaration, Function, Global, KernelBinary, KernelFunction, KernelModule, Module,
    Symbol, SymbolTable,
};
pub use ops::{FrameworkOp, Inst, LaunchFunc, Literal, LlvmOp, Op, StdOp, ValueId};
pub use rewriter::FunctionRewriter;
pub use types::{FunctionType, Type, TypeConverter};
