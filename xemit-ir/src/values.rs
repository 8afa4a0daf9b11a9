//! IR Value Representations
//!
//! Operands of IR instructions. Every value knows its own type so the
//! builder and the verifier can check call signatures without a module
//! lookup.

use serde::{Deserialize, Serialize};
use std::fmt;
use xemit_common::TempId;
use crate::printer::Ident;
use crate::{FunctionType, IrType};

/// IR Value - represents operands in IR instructions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// Instruction result or function parameter
    Temp { id: TempId, ty: IrType },

    /// Constant integer
    Constant { value: i64, ty: IrType },

    /// Address of a global; `value_type` is the global's own type
    Global { name: String, value_type: IrType },

    /// `i8*` to the first byte of a `[len x i8]` string global
    StringPtr { global: String, len: u64 },

    /// Function reference
    Function { name: String, ty: FunctionType },

    /// Undefined value
    Undef(IrType),
}

impl Value {
    pub fn const_int(ty: IrType, value: i64) -> Self {
        Value::Constant { value, ty }
    }

    pub fn ty(&self) -> IrType {
        match self {
            Value::Temp { ty, .. } | Value::Constant { ty, .. } | Value::Undef(ty) => ty.clone(),
            Value::Global { value_type, .. } => IrType::ptr_to(value_type.clone()),
            Value::StringPtr { .. } => IrType::i8_ptr(),
            Value::Function { ty, .. } => ty.pointer_type(),
        }
    }

    /// Name of the top-level symbol this value refers to, if any
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Value::Global { name, .. } | Value::Function { name, .. } => Some(name),
            Value::StringPtr { global, .. } => Some(global),
            _ => None,
        }
    }

    /// Render as `<type> <operand>`, the form used in argument lists
    pub fn typed(&self) -> String {
        format!("{} {self}", self.ty())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Temp { id, .. } => write!(f, "%{id}"),
            Value::Constant { value, ty: IrType::I1 } => {
                write!(f, "{}", if *value != 0 { "true" } else { "false" })
            }
            Value::Constant { value, .. } => write!(f, "{value}"),
            Value::Global { name, .. } => write!(f, "@{}", Ident(name)),
            Value::StringPtr { global, len } => {
                let array = IrType::array_of(IrType::I8, *len);
                write!(f, "getelementptr inbounds ({array}, {array}* @{}, i32 0, i32 0)", Ident(global))
            }
            Value::Function { name, .. } => write!(f, "@{}", Ident(name)),
            Value::Undef(_) => write!(f, "undef"),
        }
    }
}
