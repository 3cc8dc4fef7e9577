use std::fmt;

/// Types of the host IR.
///
/// `Index` and `Context` only exist before lowering; the [`TypeConverter`]
/// maps them onto target types.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// No value.
    Void,
    /// Integer of the given bit width.
    Int(u32),
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// Pointer-sized host integer.
    Index,
    /// Opaque execution context handed to every lowered host function.
    Context,
    /// Pointer to a value of the inner type.
    Ptr(Box<Type>),
    /// Fixed-length array.
    Array(Box<Type>, usize),
    /// Struct with fields in declaration order.
    Struct(Vec<Type>),
}

impl Type {
    /// `i8`
    #[must_use]
    pub const fn i8() -> Self {
        Self::Int(8)
    }

    /// `i32`
    #[must_use]
    pub const fn i32() -> Self {
        Self::Int(32)
    }

    /// `i64`
    #[must_use]
    pub const fn i64() -> Self {
        Self::Int(64)
    }

    /// A pointer to `pointee`.
    #[must_use]
    pub fn ptr(pointee: Self) -> Self {
        Self::Ptr(Box::new(pointee))
    }

    /// The generic, type-erased pointer `i8*`.
    #[must_use]
    pub fn i8_ptr() -> Self {
        Self::ptr(Self::i8())
    }

    /// `[len x element]`
    #[must_use]
    pub fn array(element: Self, len: usize) -> Self {
        Self::Array(Box::new(element), len)
    }

    /// Whether this is [`Type::Void`].
    #[must_use]
    pub const fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    /// Whether this type can appear in fully lowered code.
    #[must_use]
    pub fn is_target_legal(&self) -> bool {
        match self {
            Self::Index | Self::Context => false,
            Self::Void | Self::Int(_) | Self::F32 | Self::F64 => true,
            Self::Ptr(inner) | Self::Array(inner, _) => inner.is_target_legal(),
            Self::Struct(fields) => fields.iter().all(Self::is_target_legal),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Void => fmt.write_str("void"),
            Self::Int(bits) => write!(fmt, "i{bits}"),
            Self::F32 => fmt.write_str("float"),
            Self::F64 => fmt.write_str("double"),
            Self::Index => fmt.write_str("index"),
            Self::Context => fmt.write_str("!ctx"),
            Self::Ptr(pointee) => write!(fmt, "{pointee}*"),
            Self::Array(element, len) => write!(fmt, "[{len} x {element}]"),
            Self::Struct(fields) if fields.is_empty() => fmt.write_str("{}"),
            Self::Struct(fields) => {
                fmt.write_str("{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        fmt.write_str(", ")?;
                    }
                    write!(fmt, "{field}")?;
                }
                fmt.write_str(" }")
            },
        }
    }
}

/// Result and parameter types of a function.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionType {
    /// Return type, [`Type::Void`] for none.
    pub result: Type,
    /// Parameter types in order.
    pub params: Vec<Type>,
}

impl fmt::Display for FunctionType {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{} (", self.result)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                fmt.write_str(", ")?;
            }
            write!(fmt, "{param}")?;
        }
        fmt.write_str(")")
    }
}

/// Maps pre-lowering types onto target types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeConverter {
    pointer_bitwidth: u32,
}

impl TypeConverter {
    /// Creates a converter for targets with `pointer_bitwidth`-bit pointers.
    #[must_use]
    pub const fn new(pointer_bitwidth: u32) -> Self {
        Self { pointer_bitwidth }
    }

    /// Bit width of target pointers.
    #[must_use]
    pub const fn pointer_bitwidth(&self) -> u32 {
        self.pointer_bitwidth
    }

    /// The integer type the runtime sees as `intptr_t`.
    #[must_use]
    pub const fn intptr(&self) -> Type {
        Type::Int(self.pointer_bitwidth)
    }

    /// Converts `ty` and every type nested in it.
    #[must_use]
    pub fn convert(&self, ty: &Type) -> Type {
        match ty {
            Type::Index => self.intptr(),
            Type::Context => Type::i8_ptr(),
            Type::Ptr(pointee) => Type::ptr(self.convert(pointee)),
            Type::Array(element, len) => Type::array(self.convert(element), *len),
            Type::Struct(fields) => Type::Struct(fields.iter().map(|f| self.convert(f)).collect()),
            Type::Void | Type::Int(_) | Type::F32 | Type::F64 => ty.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converter_erases_host_only_types() {
        let converter = TypeConverter::new(32);

        assert_eq!(converter.convert(&Type::Index), Type::i32());
        assert_eq!(converter.convert(&Type::Context), Type::i8_ptr());
        assert_eq!(
            converter.convert(&Type::Struct(vec![Type::Index, Type::ptr(Type::Index)])),
            Type::Struct(vec![Type::i32(), Type::ptr(Type::i32())])
        );
        assert!(!Type::ptr(Type::Context).is_target_legal());
        assert!(converter
            .convert(&Type::ptr(Type::Context))
            .is_target_legal());
    }

    #[test]
    fn types_print_like_llvm() {
        assert_eq!(Type::ptr(Type::i8_ptr()).to_string(), "i8**");
        assert_eq!(Type::array(Type::i8(), 3).to_string(), "[3 x i8]");
        assert_eq!(
            Type::Struct(vec![Type::F32, Type::i8_ptr()]).to_string(),
            "{ float, i8* }"
        );
    }
}
