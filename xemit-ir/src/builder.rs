//! IR Builder
//!
//! Appends instructions to basic blocks through an insertion cursor. The
//! builder borrows its module mutably, so it is always released before the
//! module is. Every `build_*` call checks its preconditions before touching
//! the block; a failed call leaves the module exactly as it was.

use log::trace;
use xemit_common::{BlockRef, EmitError, FunctionRef, Result};
use crate::function::is_valid_label;
use crate::{BasicBlock, Function, FunctionType, Instruction, IrType, Module, Value};

/// Builder for constructing function bodies
pub struct IrBuilder<'m> {
    module: &'m mut Module,
    insertion_point: Option<BlockRef>,
}

impl<'m> IrBuilder<'m> {
    pub fn new(module: &'m mut Module) -> Self {
        Self {
            module,
            insertion_point: None,
        }
    }

    pub fn module(&self) -> &Module {
        self.module
    }

    /// Appends a new block to a defined function. A label already used in
    /// that function gets a `.N` suffix; an empty label becomes `bb`.
    /// All-digit labels are rejected.
    pub fn create_basic_block(&mut self, func: FunctionRef, label: &str) -> Result<BlockRef> {
        let function = self.module.function_mut(func)?;
        if function.is_declaration() {
            return Err(EmitError::BodyOnDeclaration {
                name: function.name.clone(),
            });
        }
        if !label.is_empty() && !is_valid_label(label) {
            return Err(EmitError::InvalidLabel {
                function: function.name.clone(),
                label: label.to_string(),
            });
        }
        let label = function.unique_label(label);
        trace!("Creating block '{label}' in '@{}'", function.name);
        let index = function.add_block(BasicBlock::new(label));
        Ok(BlockRef::new(func, index))
    }

    /// Moves the cursor: subsequent instructions are appended to `block`
    pub fn set_insertion_point(&mut self, block: BlockRef) -> Result<()> {
        self.block(block)?;
        self.insertion_point = Some(block);
        Ok(())
    }

    pub fn insertion_point(&self) -> Option<BlockRef> {
        self.insertion_point
    }

    pub fn clear_insertion_point(&mut self) {
        self.insertion_point = None;
    }

    /// Declares a string constant and returns an `i8*` to its first byte
    pub fn build_global_string_ptr(&mut self, value: &str, name_hint: &str) -> Value {
        self.module.declare_string_ptr(value, name_hint)
    }

    /// Emits a call. Returns the result value unless the callee returns void.
    pub fn build_call(
        &mut self,
        callee_type: &FunctionType,
        callee: &Value,
        args: Vec<Value>,
    ) -> Result<Option<Value>> {
        let block = self.open_block()?;
        let callee_name = callee.symbol().map_or_else(|| callee.to_string(), str::to_string);

        let found = callee.ty();
        if found.as_function_ptr() != Some(callee_type) {
            return Err(EmitError::type_mismatch(
                format!("callee of call to '@{callee_name}'"),
                callee_type.pointer_type(),
                found,
            ));
        }
        check_call_args(&callee_name, callee_type, &args)?;

        let function = self.module.function_mut(block.function)?;
        let result = if callee_type.return_type.is_void() {
            None
        } else {
            Some(function.new_temp())
        };
        let instr = Instruction::Call {
            result,
            callee_type: callee_type.clone(),
            callee: callee.clone(),
            args,
        };
        trace!("{}: {instr}", function.name);
        push(function, block, instr)?;

        Ok(result.map(|id| Value::Temp {
            id,
            ty: callee_type.return_type.clone(),
        }))
    }

    pub fn build_return_void(&mut self) -> Result<()> {
        let block = self.open_block()?;
        let function = self.module.function(block.function)?;
        if !function.ty.return_type.is_void() {
            return Err(EmitError::type_mismatch(
                format!("return from '@{}'", function.name),
                &function.ty.return_type,
                IrType::Void,
            ));
        }
        self.terminate(block, Instruction::Return(None))
    }

    pub fn build_return(&mut self, value: Value) -> Result<()> {
        let block = self.open_block()?;
        let function = self.module.function(block.function)?;
        let found = value.ty();
        if function.ty.return_type.is_void() || found != function.ty.return_type {
            return Err(EmitError::type_mismatch(
                format!("return from '@{}'", function.name),
                &function.ty.return_type,
                found,
            ));
        }
        self.terminate(block, Instruction::Return(Some(value)))
    }

    pub fn build_branch(&mut self, target: BlockRef) -> Result<()> {
        let block = self.open_block()?;
        let label = self.target_label(block, target)?;
        self.terminate(block, Instruction::Branch(label))
    }

    pub fn build_cond_branch(
        &mut self,
        condition: Value,
        then_block: BlockRef,
        else_block: BlockRef,
    ) -> Result<()> {
        let block = self.open_block()?;
        if condition.ty() != IrType::I1 {
            return Err(EmitError::type_mismatch("branch condition", IrType::I1, condition.ty()));
        }
        let true_label = self.target_label(block, then_block)?;
        let false_label = self.target_label(block, else_block)?;
        self.terminate(block, Instruction::BranchCond { condition, true_label, false_label })
    }

    pub fn build_switch(
        &mut self,
        value: Value,
        default: BlockRef,
        cases: &[(i64, BlockRef)],
    ) -> Result<()> {
        let block = self.open_block()?;
        let ty = value.ty();
        if !ty.is_integer() {
            return Err(EmitError::type_mismatch("switch condition", "integer", ty));
        }
        let default = self.target_label(block, default)?;
        let cases = cases
            .iter()
            .map(|&(case, target)| -> Result<(i64, String)> {
                Ok((case, self.target_label(block, target)?))
            })
            .collect::<Result<Vec<_>>>()?;
        self.terminate(block, Instruction::Switch { value, default, cases })
    }

    pub fn build_unreachable(&mut self) -> Result<()> {
        let block = self.open_block()?;
        self.terminate(block, Instruction::Unreachable)
    }

    pub fn current_block_has_terminator(&self) -> bool {
        self.insertion_point
            .and_then(|block| self.block(block).ok())
            .is_some_and(BasicBlock::has_terminator)
    }

    fn block(&self, block: BlockRef) -> Result<&BasicBlock> {
        self.module
            .functions
            .get(block.function.index())
            .and_then(|f| f.blocks.get(block.index as usize))
            .ok_or(EmitError::UnknownBlock(block))
    }

    /// The insertion block, provided it can still take instructions
    fn open_block(&self) -> Result<BlockRef> {
        let block = self.insertion_point.ok_or(EmitError::NoInsertionPoint)?;
        let current = self.block(block)?;
        if current.has_terminator() {
            let function = self.module.function(block.function)?;
            return Err(EmitError::BlockAlreadyTerminated {
                function: function.name.clone(),
                block: current.label.clone(),
            });
        }
        Ok(block)
    }

    /// Label of a branch target, which must live in the current function
    fn target_label(&self, from: BlockRef, target: BlockRef) -> Result<String> {
        if target.function != from.function {
            return Err(EmitError::UnknownBlock(target));
        }
        Ok(self.block(target)?.label.clone())
    }

    fn terminate(&mut self, block: BlockRef, instr: Instruction) -> Result<()> {
        let function = self.module.function_mut(block.function)?;
        trace!("{}: {instr}", function.name);
        push(function, block, instr)
    }
}

fn push(function: &mut Function, block: BlockRef, instr: Instruction) -> Result<()> {
    function
        .blocks
        .get_mut(block.index as usize)
        .ok_or(EmitError::UnknownBlock(block))?
        .add_instruction(instr);
    Ok(())
}

/// Arity and fixed-argument type rules shared with the verifier
pub(crate) fn check_call_args(callee: &str, sig: &FunctionType, args: &[Value]) -> Result<()> {
    if !sig.accepts_arg_count(args.len()) {
        return Err(EmitError::ArityMismatch {
            callee: callee.to_string(),
            expected: sig.arity(),
            found: args.len(),
            variadic: sig.is_vararg,
        });
    }
    for (i, (param, arg)) in sig.param_types.iter().zip(args).enumerate() {
        let found = arg.ty();
        if found != *param {
            return Err(EmitError::type_mismatch(
                format!("argument {i} of call to '@{callee}'"),
                param,
                found,
            ));
        }
    }
    Ok(())
}
