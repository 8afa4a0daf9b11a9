//! xemit - Intermediate Representation
//! 
//! A small single-module IR emitter: resolve a target, build a module of
//! declared and defined functions plus global string constants, verify it,
//! and serialize it.
//! 
//! ## Architecture
//! 
//! The crate is structured as follows:
//! - `target` - Target registry and descriptors
//! - `types` - Type system (IrType, FunctionType)
//! - `values` - Value representations
//! - `instructions` - IR instructions
//! - `blocks` - Basic block management
//! - `function` - Function declarations and definitions
//! - `module` - Module, symbol table and global variables
//! - `builder` - Instruction emission through an insertion cursor
//! - `verify` - Fail-fast structural verifier
//! - `printer` - Textual rendering
//! - `binary` - Binary encoding and decoding
//! - `serialize` - Output formats and sinks

// Public exports - clean API surface
pub use self::types::{IrType, FunctionType};
pub use self::values::Value;
pub use self::instructions::Instruction;
pub use self::blocks::BasicBlock;
pub use self::function::Function;
pub use self::module::{Module, GlobalVariable, Linkage};
pub use self::builder::IrBuilder;
pub use self::target::{Backend, Target, TargetDescriptor, TargetRegistry};
pub use self::verify::verify;
pub use self::serialize::{render, write_to_file, write_to_stream, OutputFormat};
pub use xemit_common::{BlockRef, EmitError, FunctionRef, GlobalRef, Result, ValidationError, ValidationRule};

mod types;
mod values;
mod instructions;
mod blocks;
mod function;
mod module;
mod builder;
mod printer;
mod serialize;
pub mod binary;
pub mod target;
pub mod verify;

pub use self::printer::escape_c_string;
