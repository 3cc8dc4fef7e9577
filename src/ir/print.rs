use std::fmt::{self, Write};

use super::{
    Declaration, Function, Global, Inst, KernelModule, LlvmOp, Module, Op, StdOp, Symbol,
};

impl fmt::Display for Inst {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        if let Some(result) = self.result {
            write!(fmt, "{result} = ")?;
        }

        fmt.write_str(self.op.name())?;

        match &self.op {
            Op::Std(StdOp::Constant(literal)) | Op::Llvm(LlvmOp::Constant(literal)) => {
                write!(fmt, " {literal}")?;
            },
            Op::Llvm(LlvmOp::AddressOf { global }) => write!(fmt, " @{global}")?,
            Op::Llvm(LlvmOp::Call { callee }) => write!(fmt, " @{callee}")?,
            Op::Launch(launch) => write!(fmt, " @{}::@{}", launch.kernel_module, launch.kernel)?,
            _ => (),
        }

        for (i, operand) in self.operands.iter().enumerate() {
            fmt.write_str(if i == 0 { " " } else { ", " })?;
            write!(fmt, "{operand}")?;
        }

        if let Op::Launch(launch) = &self.op {
            if !launch.async_dependencies.is_empty() {
                fmt.write_str(" async [")?;
                for (i, dependency) in launch.async_dependencies.iter().enumerate() {
                    if i > 0 {
                        fmt.write_str(", ")?;
                    }
                    write!(fmt, "{dependency}")?;
                }
                fmt.write_str("]")?;
            }
            if let Some(token) = launch.async_token {
                write!(fmt, " token {token}")?;
            }
        }

        if !self.ty.is_void() {
            write!(fmt, " : {}", self.ty)?;
        }

        Ok(())
    }
}

impl fmt::Display for Global {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "@{} = internal constant {} c\"", self.name, self.ty())?;
        for byte in &self.bytes {
            match byte {
                b'"' | b'\\' => write!(fmt, "\\{byte:02X}")?,
                0x20..=0x7e => fmt.write_char(char::from(*byte))?,
                _ => write!(fmt, "\\{byte:02X}")?,
            }
        }
        fmt.write_char('"')
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "declare {} @{}(", self.ty.result, self.name)?;
        for (i, param) in self.ty.params.iter().enumerate() {
            if i > 0 {
                fmt.write_str(", ")?;
            }
            write!(fmt, "{param}")?;
        }
        fmt.write_char(')')
    }
}

impl fmt::Display for KernelModule {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        writeln!(fmt, "gpu.module @{} {{", self.name)?;
        write!(fmt, "  kernel @{}(", self.kernel.name)?;
        for (i, param) in self.kernel.params.iter().enumerate() {
            if i > 0 {
                fmt.write_str(", ")?;
            }
            write!(fmt, "{param}")?;
        }
        writeln!(fmt, ")")?;
        for binary in &self.binaries {
            writeln!(
                fmt,
                "  binary {} ({} bytes)",
                binary.annotation,
                binary.bytes.len()
            )?;
        }
        fmt.write_char('}')
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Global(global) => fmt::Display::fmt(global, fmt),
            Self::Declaration(declaration) => fmt::Display::fmt(declaration, fmt),
            Self::KernelModule(module) => fmt::Display::fmt(module, fmt),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "func @{}(", self.name)?;
        for (i, (value, ty)) in self.params.iter().enumerate() {
            if i > 0 {
                fmt.write_str(", ")?;
            }
            write!(fmt, "{value}: {ty}")?;
        }
        writeln!(fmt, ") -> {} {{", self.result)?;
        for inst in &self.body {
            writeln!(fmt, "  {inst}")?;
        }
        fmt.write_char('}')
    }
}

impl fmt::Display for Module {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        for symbol in self.symbols.iter() {
            writeln!(fmt, "{symbol}")?;
        }
        for function in &self.functions {
            writeln!(fmt)?;
            writeln!(fmt, "{function}")?;
        }
        Ok(())
    }
}
