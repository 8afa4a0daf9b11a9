//! Module verifier
//!
//! Fail-fast structural checks run before serialization. The passes run in
//! a fixed order over the whole module and the first violation is returned:
//!
//! 1. block termination (and defined functions having a body)
//! 2. block labels: non-empty, not all digits, unique per function
//! 3. references to functions, globals and branch targets
//! 4. call signatures
//! 5. unique top-level symbol names
//! 6. return types

use log::debug;
use std::collections::{HashMap, HashSet};
use xemit_common::{ValidationError, ValidationRule};
use crate::builder::check_call_args;
use crate::function::is_valid_label;
use crate::{BasicBlock, Function, Instruction, Module, Value};

pub fn verify(module: &Module) -> Result<(), ValidationError> {
    check_terminators(module)?;
    check_labels(module)?;
    check_references(module)?;
    check_calls(module)?;
    check_unique_symbols(module)?;
    check_returns(module)?;
    debug!(
        "Module '{}' verified: {} functions, {} globals",
        module.name,
        module.functions.len(),
        module.globals.len()
    );
    Ok(())
}

fn instructions(function: &Function) -> impl Iterator<Item = (&BasicBlock, &Instruction)> {
    function
        .blocks
        .iter()
        .flat_map(|block| block.instructions.iter().map(move |instr| (block, instr)))
}

fn violation(function: &Function, block: &BasicBlock, rule: ValidationRule, message: String) -> ValidationError {
    ValidationError::new(&function.name, rule, message).in_block(&block.label)
}

fn check_terminators(module: &Module) -> Result<(), ValidationError> {
    for function in &module.functions {
        if function.is_declaration() {
            if !function.blocks.is_empty() {
                return Err(ValidationError::new(
                    &function.name,
                    ValidationRule::Terminator,
                    "declaration has a body",
                ));
            }
            continue;
        }
        if function.blocks.is_empty() {
            return Err(ValidationError::new(
                &function.name,
                ValidationRule::MissingBody,
                "defined function has no basic blocks",
            ));
        }
        for block in &function.blocks {
            let Some(last) = block.instructions.last() else {
                return Err(violation(function, block, ValidationRule::Terminator, "block is empty".to_string()));
            };
            if !last.is_terminator() {
                return Err(violation(
                    function,
                    block,
                    ValidationRule::Terminator,
                    format!("block does not end in a terminator (last instruction: {last})"),
                ));
            }
            let early = block.instructions[..block.instructions.len() - 1]
                .iter()
                .position(Instruction::is_terminator);
            if let Some(position) = early {
                return Err(violation(
                    function,
                    block,
                    ValidationRule::Terminator,
                    format!("terminator at position {position} is not the last instruction"),
                ));
            }
        }
    }
    Ok(())
}

fn check_labels(module: &Module) -> Result<(), ValidationError> {
    for function in &module.functions {
        let mut seen = HashSet::new();
        for block in &function.blocks {
            let problem = if !is_valid_label(&block.label) {
                Some("label is empty or all digits, which clashes with unnamed temporaries")
            } else if !seen.insert(block.label.as_str()) {
                Some("label is used by an earlier block")
            } else {
                None
            };
            if let Some(message) = problem {
                return Err(violation(function, block, ValidationRule::BlockLabel, message.to_string()));
            }
        }
    }
    Ok(())
}

fn check_references(module: &Module) -> Result<(), ValidationError> {
    for function in &module.functions {
        for (block, instr) in instructions(function) {
            for operand in instr.operands() {
                let missing = match operand {
                    Value::Function { name, .. } => module
                        .get_function(name)
                        .is_none()
                        .then(|| format!("function '@{name}' is not declared")),
                    Value::Global { name, .. } => module
                        .get_global(name)
                        .is_none()
                        .then(|| format!("global '@{name}' is not declared")),
                    Value::StringPtr { global, len } => match module.get_global(global) {
                        None => Some(format!("global '@{global}' is not declared")),
                        Some(g) if g.initializer.len() as u64 != *len => Some(format!(
                            "string pointer expects {len} bytes but '@{global}' holds {}",
                            g.initializer.len()
                        )),
                        Some(_) => None,
                    },
                    _ => None,
                };
                if let Some(message) = missing {
                    return Err(violation(function, block, ValidationRule::UndefinedSymbol, message));
                }
            }
            for label in instr.successors() {
                if function.get_block(label).is_none() {
                    return Err(violation(
                        function,
                        block,
                        ValidationRule::UndefinedSymbol,
                        format!("branch target '%{label}' does not exist"),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn check_calls(module: &Module) -> Result<(), ValidationError> {
    for function in &module.functions {
        for (block, instr) in instructions(function) {
            let Instruction::Call { callee_type, callee, args, .. } = instr else {
                continue;
            };
            if callee.ty().as_function_ptr() != Some(callee_type) {
                return Err(violation(
                    function,
                    block,
                    ValidationRule::CallSignature,
                    format!("callee {} does not have type {}", callee.typed(), callee_type.pointer_type()),
                ));
            }
            if let Value::Function { name, .. } = callee {
                if let Some(declared) = module.get_function(name) {
                    if declared.ty != *callee_type {
                        return Err(violation(
                            function,
                            block,
                            ValidationRule::CallSignature,
                            format!("'@{name}' is declared as {} but called as {callee_type}", declared.ty),
                        ));
                    }
                }
            }
            let callee_name = callee.symbol().unwrap_or("<indirect>");
            if let Err(err) = check_call_args(callee_name, callee_type, args) {
                return Err(violation(function, block, ValidationRule::CallSignature, err.to_string()));
            }
        }
    }
    Ok(())
}

fn check_unique_symbols(module: &Module) -> Result<(), ValidationError> {
    let mut seen: HashMap<&str, String> = HashMap::new();
    let symbols = module
        .functions
        .iter()
        .map(|f| (f.name.as_str(), format!("function {}", f.ty)))
        .chain(module.globals.iter().map(|g| (g.name.as_str(), format!("global {}", g.value_type))));
    for (name, description) in symbols {
        if let Some(previous) = seen.get(name) {
            return Err(ValidationError::new(
                name,
                ValidationRule::ConflictingSymbol,
                format!("'@{name}' is defined as {previous} and again as {description}"),
            ));
        }
        seen.insert(name, description);
    }
    Ok(())
}

fn check_returns(module: &Module) -> Result<(), ValidationError> {
    for function in &module.functions {
        let expected = &function.ty.return_type;
        for (block, instr) in instructions(function) {
            let Instruction::Return(value) = instr else {
                continue;
            };
            let found = value.as_ref().map_or(crate::IrType::Void, Value::ty);
            if found != *expected {
                return Err(violation(
                    function,
                    block,
                    ValidationRule::ReturnType,
                    format!("returns {found} from a function returning {expected}"),
                ));
            }
        }
    }
    Ok(())
}
