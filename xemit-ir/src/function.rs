//! Function Definitions
//!
//! A function is either a declaration (signature only, no blocks) or a
//! definition whose body is an ordered list of basic blocks.

use serde::{Deserialize, Serialize};
use xemit_common::TempId;
use crate::{BasicBlock, FunctionType, Instruction, Value};

const DEFAULT_LABEL: &str = "bb";

/// Whether `label` can name a block. Empty and all-digit labels are
/// rejected: `%N` is reserved for unnamed temporaries.
pub(crate) fn is_valid_label(label: &str) -> bool {
    !label.is_empty() && !label.bytes().all(|b| b.is_ascii_digit())
}

/// Function in IR
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub ty: FunctionType,
    pub blocks: Vec<BasicBlock>,
    pub is_definition: bool,

    // Parameters take the first temporaries, instruction results follow.
    #[serde(default)]
    pub(crate) next_temp_id: TempId,
}

impl Function {
    pub fn declaration(name: impl Into<String>, ty: FunctionType) -> Self {
        let next_temp_id = ty.arity() as TempId;
        Self {
            name: name.into(),
            ty,
            blocks: Vec::new(),
            is_definition: false,
            next_temp_id,
        }
    }

    pub fn definition(name: impl Into<String>, ty: FunctionType) -> Self {
        Self {
            is_definition: true,
            ..Self::declaration(name, ty)
        }
    }

    pub fn is_declaration(&self) -> bool {
        !self.is_definition
    }

    /// The `index`-th fixed parameter as an operand
    pub fn param(&self, index: usize) -> Option<Value> {
        self.ty.param_types.get(index).map(|ty| Value::Temp {
            id: index as TempId,
            ty: ty.clone(),
        })
    }

    pub fn add_block(&mut self, block: BasicBlock) -> u32 {
        self.blocks.push(block);
        (self.blocks.len() - 1) as u32
    }

    pub fn get_block(&self, label: &str) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.label == label)
    }

    pub fn entry_block(&self) -> Option<&BasicBlock> {
        self.blocks.first()
    }

    /// Returns `hint`, or `hint.N` with the first free `N` if a block already
    /// uses that label. An empty hint becomes `bb`.
    pub(crate) fn unique_label(&self, hint: &str) -> String {
        let hint = if hint.is_empty() { DEFAULT_LABEL } else { hint };
        if self.get_block(hint).is_none() {
            return hint.to_string();
        }
        (1..)
            .map(|n| format!("{hint}.{n}"))
            .find(|candidate| self.get_block(candidate).is_none())
            .unwrap_or_else(|| hint.to_string())
    }

    pub(crate) fn new_temp(&mut self) -> TempId {
        let temp = self.next_temp_id;
        self.next_temp_id += 1;
        temp
    }

    /// Recomputes the temporary counter from the body, for modules that
    /// were assembled without the builder
    pub(crate) fn recount_temps(&mut self) {
        let results = self
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .filter(|instr| matches!(instr, Instruction::Call { result: Some(_), .. }))
            .count();
        self.next_temp_id = (self.ty.arity() + results) as TempId;
    }
}
