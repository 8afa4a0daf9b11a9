//! Module and Global Variables
//!
//! Defines the top-level module structure: the symbol table of functions
//! and global constants, plus the attached target descriptor. Functions and
//! globals keep their insertion order so rendering is deterministic.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use xemit_common::{EmitError, FunctionRef, GlobalRef, Result};
use crate::{Function, FunctionType, IrType, TargetDescriptor, Value};

/// Linkage types for global symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Linkage {
    External,  // Visible to other modules
    Internal,  // Only visible within this module (static)
    Private,   // Not even present in the symbol table
}

/// Global variable definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalVariable {
    pub name: String,
    pub value_type: IrType,
    /// Raw initializer bytes (string constants include their NUL)
    pub initializer: Vec<u8>,
    pub is_constant: bool,
    pub unnamed_addr: bool,
    pub linkage: Linkage,
    pub align: u32,
}

/// IR Module - represents a complete compilation unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
    pub globals: Vec<GlobalVariable>,
    target: Option<TargetDescriptor>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            globals: Vec::new(),
            target: None,
        }
    }

    pub fn target(&self) -> Option<&TargetDescriptor> {
        self.target.as_ref()
    }

    /// Attaches target metadata. Only the first call succeeds.
    pub fn set_target(&mut self, descriptor: TargetDescriptor) -> Result<()> {
        if let Some(existing) = &self.target {
            return Err(EmitError::TargetAlreadySet {
                module: self.name.clone(),
                existing: existing.to_string(),
            });
        }
        debug!("Module '{}' targets {descriptor}", self.name);
        self.target = Some(descriptor);
        Ok(())
    }

    /// Declares an external function. Redeclaring with the identical type
    /// returns the existing handle.
    pub fn declare_function(&mut self, name: &str, ty: FunctionType) -> Result<FunctionRef> {
        if let Some(existing) = self.find_compatible_function(name, &ty)? {
            trace!("Reusing declaration of '@{name}'");
            return Ok(existing);
        }
        Ok(self.push_function(Function::declaration(name, ty)))
    }

    /// Declares a function that will get a body. Fails if the function was
    /// already defined, even with the same type.
    pub fn define_function(&mut self, name: &str, ty: FunctionType) -> Result<FunctionRef> {
        match self.find_compatible_function(name, &ty)? {
            Some(existing) => {
                let function = &mut self.functions[existing.index()];
                if function.is_definition || !function.blocks.is_empty() {
                    return Err(EmitError::Redefinition { name: name.to_string() });
                }
                debug!("Promoting declaration of '@{name}' to a definition");
                function.is_definition = true;
                Ok(existing)
            }
            None => Ok(self.push_function(Function::definition(name, ty))),
        }
    }

    /// Adds a private, NUL-terminated string constant. Every call allocates
    /// a new global; identical contents are not merged. The name hint gets
    /// a `.N` suffix when it is already taken.
    pub fn declare_global_string(&mut self, value: &str, name_hint: &str) -> GlobalRef {
        let global = self.new_string_global(value, name_hint);
        self.push_global(global)
    }

    /// Like [`declare_global_string`](Self::declare_global_string), returning
    /// an `i8*` to the first byte of the new global
    pub(crate) fn declare_string_ptr(&mut self, value: &str, name_hint: &str) -> Value {
        let global = self.new_string_global(value, name_hint);
        let ptr = Value::StringPtr {
            global: global.name.clone(),
            len: global.initializer.len() as u64,
        };
        self.push_global(global);
        ptr
    }

    pub fn function(&self, func: FunctionRef) -> Result<&Function> {
        self.functions.get(func.index()).ok_or(EmitError::UnknownFunction(func))
    }

    pub(crate) fn function_mut(&mut self, func: FunctionRef) -> Result<&mut Function> {
        self.functions.get_mut(func.index()).ok_or(EmitError::UnknownFunction(func))
    }

    pub fn global(&self, global: GlobalRef) -> Option<&GlobalVariable> {
        self.globals.get(global.index())
    }

    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn get_global(&self, name: &str) -> Option<&GlobalVariable> {
        self.globals.iter().find(|g| g.name == name)
    }

    pub fn function_ref(&self, name: &str) -> Option<FunctionRef> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(|index| FunctionRef(index as u32))
    }

    /// The function as a callee operand
    pub fn function_value(&self, func: FunctionRef) -> Result<Value> {
        let function = self.function(func)?;
        Ok(Value::Function {
            name: function.name.clone(),
            ty: function.ty.clone(),
        })
    }

    /// `i8*` to the first byte of a string global
    pub fn string_ptr(&self, global: GlobalRef) -> Option<Value> {
        self.global(global).map(|g| Value::StringPtr {
            global: g.name.clone(),
            len: g.initializer.len() as u64,
        })
    }

    pub fn has_symbol(&self, name: &str) -> bool {
        self.get_function(name).is_some() || self.get_global(name).is_some()
    }

    pub fn declarations(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|f| f.is_declaration())
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|f| f.is_definition)
    }

    fn new_string_global(&self, value: &str, name_hint: &str) -> GlobalVariable {
        let hint = if name_hint.is_empty() { ".str" } else { name_hint };
        let mut initializer = value.as_bytes().to_vec();
        initializer.push(0);
        GlobalVariable {
            name: self.unique_symbol_name(hint),
            value_type: IrType::array_of(IrType::I8, initializer.len() as u64),
            initializer,
            is_constant: true,
            unnamed_addr: true,
            linkage: Linkage::Private,
            align: 1,
        }
    }

    fn push_global(&mut self, global: GlobalVariable) -> GlobalRef {
        debug!("Declared string global '@{}' ({} bytes)", global.name, global.initializer.len());
        self.globals.push(global);
        GlobalRef((self.globals.len() - 1) as u32)
    }

    fn push_function(&mut self, function: Function) -> FunctionRef {
        debug!(
            "{} '@{}' with type {}",
            if function.is_definition { "Defined" } else { "Declared" },
            function.name,
            function.ty
        );
        self.functions.push(function);
        FunctionRef((self.functions.len() - 1) as u32)
    }

    /// Existing function named `name` with exactly `ty`, or an error if the
    /// name is taken by anything else
    fn find_compatible_function(&self, name: &str, ty: &FunctionType) -> Result<Option<FunctionRef>> {
        if let Some(global) = self.get_global(name) {
            return Err(EmitError::DuplicateSymbol {
                name: name.to_string(),
                existing: format!("global {}", global.value_type),
                requested: format!("function {ty}"),
            });
        }
        match self.function_ref(name) {
            Some(existing) => {
                let function = &self.functions[existing.index()];
                if function.ty == *ty {
                    Ok(Some(existing))
                } else {
                    Err(EmitError::DuplicateSymbol {
                        name: name.to_string(),
                        existing: format!("function {}", function.ty),
                        requested: format!("function {ty}"),
                    })
                }
            }
            None => Ok(None),
        }
    }

    fn unique_symbol_name(&self, hint: &str) -> String {
        if !self.has_symbol(hint) {
            return hint.to_string();
        }
        (1..)
            .map(|n| format!("{hint}.{n}"))
            .find(|candidate| !self.has_symbol(candidate))
            .unwrap_or_else(|| hint.to_string())
    }
}
