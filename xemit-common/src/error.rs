//! Error handling for the xemit IR emitter
//!
//! Construction errors are reported by the operation that would break a
//! module invariant; `ValidationError` comes from the verifier and `Io`
//! from the output writers.

use crate::types::{BlockRef, FunctionRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T, E = EmitError> = std::result::Result<T, E>;

/// Every error the emitter can report
#[derive(Error, Debug)]
pub enum EmitError {
    #[error("unknown target '{triple}': no registered backend matches")]
    UnknownTarget { triple: String },

    #[error("module '{module}' already has target '{existing}'")]
    TargetAlreadySet { module: String, existing: String },

    // Types are carried as rendered strings; the IR type system lives in xemit-ir.
    #[error("symbol '@{name}' already exists as {existing}, cannot redeclare as {requested}")]
    DuplicateSymbol {
        name: String,
        existing: String,
        requested: String,
    },

    #[error("function '@{name}' is already defined")]
    Redefinition { name: String },

    #[error("call to '@{callee}' expects {} argument(s), got {found}", arity_text(.expected, .variadic))]
    ArityMismatch {
        callee: String,
        expected: usize,
        found: usize,
        variadic: bool,
    },

    #[error("type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: String,
        expected: String,
        found: String,
    },

    #[error("block '{block}' in '@{function}' already ends in a terminator")]
    BlockAlreadyTerminated { function: String, block: String },

    #[error("no insertion point: call set_insertion_point first")]
    NoInsertionPoint,

    #[error("function handle {0} does not belong to this module")]
    UnknownFunction(FunctionRef),

    #[error("block handle {0} does not belong to this module")]
    UnknownBlock(BlockRef),

    #[error("cannot add a block to '@{name}': it is only declared")]
    BodyOnDeclaration { name: String },

    #[error("invalid block label '{label}' in '@{function}': labels cannot be empty or all digits")]
    InvalidLabel { function: String, label: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to write {target}")]
    Io {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode module as JSON")]
    Json(#[from] serde_json::Error),

    #[error("malformed binary module at byte {offset}: {message}")]
    MalformedBinary { offset: usize, message: String },
}

fn arity_text(expected: &usize, variadic: &bool) -> String {
    if *variadic {
        format!("at least {expected}")
    } else {
        expected.to_string()
    }
}

impl EmitError {
    pub fn io(target: impl Into<String>, source: std::io::Error) -> Self {
        EmitError::Io {
            target: target.into(),
            source,
        }
    }

    pub fn type_mismatch(
        context: impl Into<String>,
        expected: impl fmt::Display,
        found: impl fmt::Display,
    ) -> Self {
        EmitError::TypeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

/// The structural rule a module broke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationRule {
    /// A block is empty, lacks a terminator, or has one before its end
    Terminator,
    /// A defined function has no blocks
    MissingBody,
    /// A block label is empty, all digits, or used twice in one function
    BlockLabel,
    /// An operand names a function, global or block that does not exist
    UndefinedSymbol,
    /// A call does not fit the callee's signature
    CallSignature,
    /// Two top-level symbols share a name
    ConflictingSymbol,
    /// A return does not match the function's return type
    ReturnType,
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationRule::Terminator => write!(f, "terminator"),
            ValidationRule::MissingBody => write!(f, "missing body"),
            ValidationRule::BlockLabel => write!(f, "block label"),
            ValidationRule::UndefinedSymbol => write!(f, "undefined symbol"),
            ValidationRule::CallSignature => write!(f, "call signature"),
            ValidationRule::ConflictingSymbol => write!(f, "conflicting symbol"),
            ValidationRule::ReturnType => write!(f, "return type"),
        }
    }
}

/// First structural violation found by the verifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub function: String,
    pub block: Option<String>,
    pub rule: ValidationRule,
    pub message: String,
}

impl ValidationError {
    pub fn new(function: impl Into<String>, rule: ValidationRule, message: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            block: None,
            rule,
            message: message.into(),
        }
    }

    pub fn in_block(mut self, block: impl Into<String>) -> Self {
        self.block = Some(block.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module verification failed in '@{}'", self.function)?;
        if let Some(block) = &self.block {
            write!(f, ", block '{block}'")?;
        }
        write!(f, " [{}]: {}", self.rule, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_arity_message() {
        let fixed = EmitError::ArityMismatch {
            callee: "puts".to_string(),
            expected: 1,
            found: 0,
            variadic: false,
        };
        assert_eq!(fixed.to_string(), "call to '@puts' expects 1 argument(s), got 0");

        let variadic = EmitError::ArityMismatch {
            callee: "printf".to_string(),
            expected: 1,
            found: 0,
            variadic: true,
        };
        assert_eq!(variadic.to_string(), "call to '@printf' expects at least 1 argument(s), got 0");
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("main", ValidationRule::Terminator, "block has no terminator")
            .in_block("entry");
        assert_eq!(
            err.to_string(),
            "module verification failed in '@main', block 'entry' [terminator]: block has no terminator"
        );

        let wrapped: EmitError = err.clone().into();
        assert!(matches!(wrapped, EmitError::Validation(ref inner) if *inner == err));
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err = EmitError::io(
            "main.ll",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "failed to write main.ll");
        assert_eq!(err.source().map(|s| s.to_string()), Some("denied".to_string()));
    }
}
