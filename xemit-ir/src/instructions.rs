//! IR Instructions
//!
//! Defines the instructions the emitter can append to a basic block.
//! Branch targets are block labels, which are unique within a function.

use serde::{Deserialize, Serialize};
use std::fmt;
use xemit_common::TempId;
use crate::printer::Ident;
use crate::{FunctionType, Value};

/// IR Instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Function call: result = call callee(args...)
    Call {
        result: Option<TempId>,
        callee_type: FunctionType,
        callee: Value,
        args: Vec<Value>,
    },

    /// Return: ret value or ret void
    Return(Option<Value>),

    /// Unconditional branch: br label
    Branch(String),

    /// Conditional branch: br condition, true_label, false_label
    BranchCond {
        condition: Value,
        true_label: String,
        false_label: String,
    },

    /// Multi-way branch on an integer value
    Switch {
        value: Value,
        default: String,
        cases: Vec<(i64, String)>,
    },

    Unreachable,
}

impl Instruction {
    pub fn is_terminator(&self) -> bool {
        !matches!(self, Instruction::Call { .. })
    }

    /// Labels of the blocks this instruction can transfer control to
    pub fn successors(&self) -> Vec<&str> {
        match self {
            Instruction::Branch(label) => vec![label.as_str()],
            Instruction::BranchCond { true_label, false_label, .. } => {
                vec![true_label.as_str(), false_label.as_str()]
            }
            Instruction::Switch { default, cases, .. } => {
                let mut labels = vec![default.as_str()];
                labels.extend(cases.iter().map(|(_, label)| label.as_str()));
                labels
            }
            _ => Vec::new(),
        }
    }

    /// Every value operand, callee included
    pub fn operands(&self) -> Vec<&Value> {
        match self {
            Instruction::Call { callee, args, .. } => {
                std::iter::once(callee).chain(args.iter()).collect()
            }
            Instruction::Return(Some(value)) => vec![value],
            Instruction::BranchCond { condition, .. } => vec![condition],
            Instruction::Switch { value, .. } => vec![value],
            _ => Vec::new(),
        }
    }
}

impl Instruction {
    /// Rewrites every temporary this instruction defines or reads
    pub(crate) fn rename_temps(&mut self, rename: impl Fn(TempId) -> TempId) {
        let values: Vec<&mut Value> = match self {
            Instruction::Call { result, callee, args, .. } => {
                if let Some(id) = result {
                    *id = rename(*id);
                }
                std::iter::once(callee).chain(args.iter_mut()).collect()
            }
            Instruction::Return(Some(value))
            | Instruction::BranchCond { condition: value, .. }
            | Instruction::Switch { value, .. } => vec![value],
            _ => Vec::new(),
        };
        for value in values {
            if let Value::Temp { id, .. } = value {
                *id = rename(*id);
            }
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Call { result, callee_type, callee, args } => {
                if let Some(result) = result {
                    write!(f, "%{result} = ")?;
                }
                // Variadic callees carry their full signature at the call site.
                if callee_type.is_vararg {
                    write!(f, "call {callee_type} {callee}(")?;
                } else {
                    write!(f, "call {} {callee}(", callee_type.return_type)?;
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", arg.typed())?;
                }
                write!(f, ")")
            }
            Instruction::Return(Some(value)) => write!(f, "ret {}", value.typed()),
            Instruction::Return(None) => write!(f, "ret void"),
            Instruction::Branch(label) => write!(f, "br label %{}", Ident(label)),
            Instruction::BranchCond { condition, true_label, false_label } => {
                write!(
                    f,
                    "br {}, label %{}, label %{}",
                    condition.typed(),
                    Ident(true_label),
                    Ident(false_label)
                )
            }
            Instruction::Switch { value, default, cases } => {
                let ty = value.ty();
                write!(f, "switch {}, label %{} [", value.typed(), Ident(default))?;
                for (case, label) in cases {
                    write!(f, "\n    {ty} {case}, label %{}", Ident(label))?;
                }
                if !cases.is_empty() {
                    write!(f, "\n  ")?;
                }
                write!(f, "]")
            }
            Instruction::Unreachable => write!(f, "unreachable"),
        }
    }
}
