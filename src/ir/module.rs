use std::collections::BTreeSet;

use super::{FunctionType, Inst, Op, Type, ValueId};
use crate::error::IrError;

/// An immutable byte buffer with internal linkage, embedded in the
/// compilation unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Global {
    /// Symbol name.
    pub name: String,
    /// Contents.
    pub bytes: Vec<u8>,
}

impl Global {
    /// `[len x i8]`
    #[must_use]
    pub fn ty(&self) -> Type {
        Type::array(Type::i8(), self.bytes.len())
    }
}

/// An external function declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    /// Symbol name.
    pub name: String,
    /// Signature.
    pub ty: FunctionType,
}

/// The device kernel of a kernel module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelFunction {
    /// Name under which the binary exports the kernel.
    pub name: String,
    /// Parameter types of the kernel.
    pub params: Vec<Type>,
}

/// A compiled device binary, keyed by the annotation it was produced for
/// (e.g. `nvvm.cubin` or `rocdl.hsaco`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelBinary {
    /// Key the binary was produced for.
    pub annotation: String,
    /// The binary image.
    pub bytes: Vec<u8>,
}

/// Container of exactly one device kernel and its compiled binaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelModule {
    /// Symbol name.
    pub name: String,
    /// The kernel this module holds.
    pub kernel: KernelFunction,
    /// Compiled binaries, one per annotation.
    pub binaries: Vec<KernelBinary>,
}

impl KernelModule {
    /// A kernel module without binaries.
    #[must_use]
    pub fn new(name: impl Into<String>, kernel: KernelFunction) -> Self {
        Self {
            name: name.into(),
            kernel,
            binaries: Vec::new(),
        }
    }

    /// Adds the binary compiled for `annotation`.
    #[must_use]
    pub fn with_binary(mut self, annotation: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.binaries.push(KernelBinary {
            annotation: annotation.into(),
            bytes: bytes.into(),
        });
        self
    }

    /// The binary compiled for `annotation`.
    #[must_use]
    pub fn binary(&self, annotation: &str) -> Option<&KernelBinary> {
        self.binaries
            .iter()
            .find(|binary| binary.annotation == annotation)
    }
}

/// An entry of the [`SymbolTable`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Symbol {
    /// Constant byte buffer.
    Global(Global),
    /// External function declaration.
    Declaration(Declaration),
    /// Kernel module container.
    KernelModule(KernelModule),
}

impl Symbol {
    /// The name the symbol is defined under.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Global(Global { name, .. })
            | Self::Declaration(Declaration { name, .. })
            | Self::KernelModule(KernelModule { name, .. }) => name,
        }
    }
}

/// The symbols of a compilation unit, in order.
///
/// Names are unique across symbols and the unit's functions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    functions: BTreeSet<String>,
}

impl SymbolTable {
    /// Symbols in table order.
    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, Symbol> {
        self.symbols.iter()
    }

    /// Number of symbols, not counting functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether the table holds no symbols.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Whether `name` is taken by a symbol or a function.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains(name) || self.lookup(name).is_some()
    }

    /// The symbol named `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|symbol| symbol.name() == name)
    }

    /// The global named `name`.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<&Global> {
        match self.lookup(name)? {
            Symbol::Global(global) => Some(global),
            _ => None,
        }
    }

    /// The declaration named `name`.
    #[must_use]
    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        match self.lookup(name)? {
            Symbol::Declaration(declaration) => Some(declaration),
            _ => None,
        }
    }

    /// The kernel module named `name`.
    #[must_use]
    pub fn kernel_module(&self, name: &str) -> Option<&KernelModule> {
        match self.lookup(name)? {
            Symbol::KernelModule(module) => Some(module),
            _ => None,
        }
    }

    /// All kernel modules in table order.
    pub fn kernel_modules(&self) -> impl Iterator<Item = &KernelModule> {
        self.symbols.iter().filter_map(|symbol| match symbol {
            Symbol::KernelModule(module) => Some(module),
            _ => None,
        })
    }

    /// All globals in table order.
    pub fn globals(&self) -> impl Iterator<Item = &Global> {
        self.symbols.iter().filter_map(|symbol| match symbol {
            Symbol::Global(global) => Some(global),
            _ => None,
        })
    }

    /// # Errors
    ///
    /// Returns [`IrError::DuplicateSymbol`] if the name is already taken.
    pub fn push(&mut self, symbol: Symbol) -> Result<(), IrError> {
        self.check_free(symbol.name())?;
        self.symbols.push(symbol);
        Ok(())
    }

    /// Inserts `symbol` before all other symbols.
    ///
    /// # Errors
    ///
    /// Returns [`IrError::DuplicateSymbol`] if the name is already taken.
    pub fn push_front(&mut self, symbol: Symbol) -> Result<(), IrError> {
        self.check_free(symbol.name())?;
        self.symbols.insert(0, symbol);
        Ok(())
    }

    /// Returns `base` if it is free, otherwise the first free `base_<n>`.
    #[must_use]
    pub fn unique_name(&self, base: &str) -> String {
        if !self.contains(base) {
            return String::from(base);
        }

        (1_usize..)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| String::from(base))
    }

    /// Removes every kernel module and returns how many were removed.
    pub fn remove_kernel_modules(&mut self) -> usize {
        let before = self.symbols.len();
        self.symbols
            .retain(|symbol| !matches!(symbol, Symbol::KernelModule(_)));
        before - self.symbols.len()
    }

    fn check_free(&self, name: &str) -> Result<(), IrError> {
        if self.contains(name) {
            return Err(IrError::DuplicateSymbol(String::from(name)));
        }
        Ok(())
    }

    fn reserve_function(&mut self, name: &str) -> Result<(), IrError> {
        self.check_free(name)?;
        self.functions.insert(String::from(name));
        Ok(())
    }
}

/// A host function: parameters, a result type, and a flat instruction list.
#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    /// Symbol name.
    pub name: String,
    /// Parameters as values with their types.
    pub params: Vec<(ValueId, Type)>,
    /// Return type.
    pub result: Type,
    /// Instructions in execution order.
    pub body: Vec<Inst>,
    next_value: u32,
}

impl Function {
    /// A function with an empty body. Parameters get the first values.
    #[must_use]
    pub fn new(name: impl Into<String>, params: impl IntoIterator<Item = Type>, result: Type) -> Self {
        let mut next_value = 0;
        let params = params
            .into_iter()
            .map(|ty| {
                let value = ValueId(next_value);
                next_value += 1;
                (value, ty)
            })
            .collect();

        Self {
            name: name.into(),
            params,
            result,
            body: Vec::new(),
            next_value,
        }
    }

    /// The value of parameter `index`.
    #[must_use]
    pub fn param(&self, index: usize) -> Option<ValueId> {
        self.params.get(index).map(|(value, _)| *value)
    }

    /// The execution context, which is by convention the first parameter.
    #[must_use]
    pub fn context_arg(&self) -> Option<ValueId> {
        self.param(0)
    }

    /// Allocates a value that is not yet used in this function.
    pub fn fresh_value(&mut self) -> ValueId {
        let value = ValueId(self.next_value);
        self.next_value += 1;
        value
    }

    /// Appends an instruction, returning its result if `ty` is not void.
    pub fn push(&mut self, op: Op, operands: Vec<ValueId>, ty: Type) -> Option<ValueId> {
        let result = (!ty.is_void()).then(|| self.fresh_value());
        self.body.push(Inst {
            result,
            ty,
            op,
            operands,
        });
        result
    }

    /// Type of a parameter or instruction result.
    #[must_use]
    pub fn type_of(&self, value: ValueId) -> Option<&Type> {
        self.params
            .iter()
            .find(|(param, _)| *param == value)
            .map(|(_, ty)| ty)
            .or_else(|| {
                self.body
                    .iter()
                    .find(|inst| inst.result == Some(value))
                    .map(|inst| &inst.ty)
            })
    }
}

/// A compilation unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Module {
    pub(crate) symbols: SymbolTable,
    pub(crate) functions: Vec<Function>,
}

impl Module {
    /// An empty compilation unit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The unit's symbols.
    #[must_use]
    pub const fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// The unit's host functions.
    #[must_use]
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// The function named `name`.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|function| function.name == name)
    }

    /// # Errors
    ///
    /// Returns [`IrError::DuplicateSymbol`] if the name is already taken.
    pub fn add_symbol(&mut self, symbol: Symbol) -> Result<(), IrError> {
        self.symbols.push(symbol)
    }

    /// # Errors
    ///
    /// Returns [`IrError::DuplicateSymbol`] if the name is already taken.
    pub fn add_kernel_module(&mut self, module: KernelModule) -> Result<(), IrError> {
        self.symbols.push(Symbol::KernelModule(module))
    }

    /// # Errors
    ///
    /// Returns [`IrError::DuplicateSymbol`] if the name is already taken.
    pub fn add_function(&mut self, function: Function) -> Result<(), IrError> {
        self.symbols.reserve_function(&function.name)?;
        self.functions.push(function);
        Ok(())
    }
}
