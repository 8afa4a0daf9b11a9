//! Handle types shared across the emitter
//! 
//! Functions, globals and blocks are owned by their module; everything else
//! refers to them through these small copyable handles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Temporary (instruction result) identifier, numbered per function
pub type TempId = u32;

/// Handle to a function owned by a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionRef(pub u32);

/// Handle to a global variable owned by a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlobalRef(pub u32);

/// Handle to a basic block: the owning function plus the block's position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRef {
    pub function: FunctionRef,
    pub index: u32,
}

impl FunctionRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl GlobalRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl BlockRef {
    pub fn new(function: FunctionRef, index: u32) -> Self {
        Self { function, index }
    }
}

impl fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn#{}", self.0)
    }
}

impl fmt::Display for GlobalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "global#{}", self.0)
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.bb#{}", self.function, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_display() {
        let func = FunctionRef(2);
        assert_eq!(func.to_string(), "fn#2");
        assert_eq!(GlobalRef(0).to_string(), "global#0");
        assert_eq!(BlockRef::new(func, 1).to_string(), "fn#2.bb#1");
    }
}
