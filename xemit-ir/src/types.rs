//! IR Type System
//!
//! Integer types, typed pointers, arrays, labels and function signatures.
//! The textual form follows the LLVM typed-pointer grammar (`i8*`, `[4 x i8]`,
//! `i32 (i8*, ...)`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// IR Type system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrType {
    /// Void type
    Void,

    /// Integer types with bit width
    I1,
    I8,
    I16,
    I32,
    I64,

    /// Pointer to the inner type
    Ptr(Box<IrType>),

    /// Array type [size x element_type]
    Array { size: u64, element_type: Box<IrType> },

    /// Function type (only ever used behind a pointer as a value type)
    Function(Box<FunctionType>),

    /// Label type (for basic block addresses)
    Label,
}

/// Signature of a function: fixed parameters, return type and variadic flag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionType {
    pub return_type: IrType,
    pub param_types: Vec<IrType>,
    pub is_vararg: bool,
}

impl IrType {
    pub fn ptr_to(pointee: IrType) -> Self {
        IrType::Ptr(Box::new(pointee))
    }

    /// `i8*`, the C `char *`
    pub fn i8_ptr() -> Self {
        IrType::ptr_to(IrType::I8)
    }

    pub fn array_of(element_type: IrType, size: u64) -> Self {
        IrType::Array { size, element_type: Box::new(element_type) }
    }

    /// Get the size of this type in bytes for a target with the given pointer width
    pub fn size_in_bytes(&self, pointer_width: u32) -> Option<u64> {
        match self {
            IrType::Void => None,
            IrType::I1 => Some(1), // Stored in full byte
            IrType::I8 => Some(1),
            IrType::I16 => Some(2),
            IrType::I32 => Some(4),
            IrType::I64 => Some(8),
            IrType::Ptr(_) => Some(u64::from(pointer_width / 8)),
            IrType::Array { size, element_type } => {
                element_type.size_in_bytes(pointer_width).map(|elem_size| elem_size * size)
            }
            IrType::Function(_) => None, // Functions don't have size
            IrType::Label => None,
        }
    }

    /// Check if this is an integer type
    pub fn is_integer(&self) -> bool {
        matches!(self, IrType::I1 | IrType::I8 | IrType::I16 | IrType::I32 | IrType::I64)
    }

    /// Check if this is a pointer type
    pub fn is_pointer(&self) -> bool {
        matches!(self, IrType::Ptr(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, IrType::Void)
    }

    /// Get the element type for pointers and arrays
    pub fn element_type(&self) -> Option<&IrType> {
        match self {
            IrType::Ptr(elem) => Some(elem),
            IrType::Array { element_type, .. } => Some(element_type),
            _ => None,
        }
    }

    /// The signature behind a function pointer, if this is one
    pub fn as_function_ptr(&self) -> Option<&FunctionType> {
        match self {
            IrType::Ptr(inner) => match inner.as_ref() {
                IrType::Function(sig) => Some(sig),
                _ => None,
            },
            _ => None,
        }
    }
}

impl FunctionType {
    pub fn new(return_type: IrType, param_types: Vec<IrType>, is_vararg: bool) -> Self {
        Self { return_type, param_types, is_vararg }
    }

    /// Number of fixed (non-variadic) parameters
    pub fn arity(&self) -> usize {
        self.param_types.len()
    }

    /// Whether a call with `count` arguments fits this signature's arity
    pub fn accepts_arg_count(&self, count: usize) -> bool {
        if self.is_vararg {
            count >= self.arity()
        } else {
            count == self.arity()
        }
    }

    /// The type of a value that points at a function with this signature
    pub fn pointer_type(&self) -> IrType {
        IrType::ptr_to(IrType::Function(Box::new(self.clone())))
    }

    pub(crate) fn fmt_params(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, param) in self.param_types.iter().enumerate() {
            if i > 0 { write!(f, ", ")?; }
            write!(f, "{param}")?;
        }
        if self.is_vararg {
            if !self.param_types.is_empty() { write!(f, ", ")?; }
            write!(f, "...")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => write!(f, "void"),
            IrType::I1 => write!(f, "i1"),
            IrType::I8 => write!(f, "i8"),
            IrType::I16 => write!(f, "i16"),
            IrType::I32 => write!(f, "i32"),
            IrType::I64 => write!(f, "i64"),
            IrType::Ptr(target) => write!(f, "{target}*"),
            IrType::Array { size, element_type } => write!(f, "[{size} x {element_type}]"),
            IrType::Function(sig) => write!(f, "{sig}"),
            IrType::Label => write!(f, "label"),
        }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.return_type)?;
        self.fmt_params(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_display() {
        assert_eq!(IrType::i8_ptr().to_string(), "i8*");
        assert_eq!(IrType::array_of(IrType::I8, 6).to_string(), "[6 x i8]");

        let printf = FunctionType::new(IrType::I32, vec![IrType::i8_ptr()], true);
        assert_eq!(printf.to_string(), "i32 (i8*, ...)");
        assert_eq!(printf.pointer_type().to_string(), "i32 (i8*, ...)*");

        let main = FunctionType::new(IrType::Void, vec![], false);
        assert_eq!(main.to_string(), "void ()");

        let only_varargs = FunctionType::new(IrType::Void, vec![], true);
        assert_eq!(only_varargs.to_string(), "void (...)");
    }

    #[test]
    fn test_arg_count_rules() {
        let printf = FunctionType::new(IrType::I32, vec![IrType::i8_ptr()], true);
        assert!(!printf.accepts_arg_count(0));
        assert!(printf.accepts_arg_count(1));
        assert!(printf.accepts_arg_count(5));

        let puts = FunctionType::new(IrType::I32, vec![IrType::i8_ptr()], false);
        assert!(!puts.accepts_arg_count(0));
        assert!(puts.accepts_arg_count(1));
        assert!(!puts.accepts_arg_count(2));
    }

    #[test]
    fn test_sizes() {
        assert_eq!(IrType::i8_ptr().size_in_bytes(32), Some(4));
        assert_eq!(IrType::i8_ptr().size_in_bytes(16), Some(2));
        assert_eq!(IrType::array_of(IrType::I16, 3).size_in_bytes(32), Some(6));
        assert_eq!(IrType::Void.size_in_bytes(32), None);
    }

    #[test]
    fn test_function_pointer_lookup() {
        let sig = FunctionType::new(IrType::Void, vec![], false);
        assert_eq!(sig.pointer_type().as_function_ptr(), Some(&sig));
        assert_eq!(IrType::i8_ptr().as_function_ptr(), None);
    }
}
