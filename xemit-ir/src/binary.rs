//! Binary module encoding
//!
//! Layout: the magic `XIRB`, a version byte, then the module. Integers are
//! little-endian, strings and byte blobs are prefixed with a `u32` length,
//! optional items with a presence byte, and every enum with a one-byte tag.

use log::trace;
use xemit_common::{EmitError, Result};
use crate::{
    BasicBlock, Function, FunctionType, GlobalVariable, Instruction, IrType, Linkage, Module,
    TargetDescriptor, Value,
};

pub const MAGIC: &[u8; 4] = b"XIRB";
pub const VERSION: u8 = 1;

// Nesting limit for types read from untrusted input.
const MAX_TYPE_DEPTH: usize = 64;

pub fn encode(module: &Module) -> Vec<u8> {
    let mut w = Writer::default();
    w.buf.extend_from_slice(MAGIC);
    w.u8(VERSION);
    w.str(&module.name);
    match module.target() {
        Some(target) => {
            w.u8(1);
            w.str(&target.triple);
            w.str(&target.cpu);
            w.str(&target.features);
            w.str(&target.data_layout);
            w.u32(target.pointer_width);
        }
        None => w.u8(0),
    }
    w.len(module.globals.len());
    for global in &module.globals {
        w.global(global);
    }
    w.len(module.functions.len());
    for function in &module.functions {
        w.function(function);
    }
    trace!("Encoded module '{}' into {} bytes", module.name, w.buf.len());
    w.buf
}

pub fn decode(bytes: &[u8]) -> Result<Module> {
    let mut r = Reader { bytes, pos: 0 };
    if r.take(MAGIC.len())? != MAGIC {
        return Err(r.error_at(0, "bad magic"));
    }
    let version = r.u8()?;
    if version != VERSION {
        return Err(r.error_at(MAGIC.len(), format!("unsupported version {version}")));
    }

    let mut module = Module::new(r.str()?);
    if r.flag()? {
        let target = TargetDescriptor {
            triple: r.str()?,
            cpu: r.str()?,
            features: r.str()?,
            data_layout: r.str()?,
            pointer_width: r.u32()?,
        };
        module.set_target(target)?;
    }
    for _ in 0..r.u32()? {
        module.globals.push(r.global()?);
    }
    for _ in 0..r.u32()? {
        module.functions.push(r.function()?);
    }
    if r.pos != bytes.len() {
        return Err(r.error("trailing bytes after module"));
    }
    Ok(module)
}

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn len(&mut self, len: usize) {
        self.u32(len as u32);
    }

    fn bool(&mut self, value: bool) {
        self.u8(u8::from(value));
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.len(bytes.len());
        self.buf.extend_from_slice(bytes);
    }

    fn str(&mut self, s: &str) {
        self.bytes(s.as_bytes());
    }

    fn ty(&mut self, ty: &IrType) {
        match ty {
            IrType::Void => self.u8(0),
            IrType::I1 => self.u8(1),
            IrType::I8 => self.u8(2),
            IrType::I16 => self.u8(3),
            IrType::I32 => self.u8(4),
            IrType::I64 => self.u8(5),
            IrType::Ptr(inner) => {
                self.u8(6);
                self.ty(inner);
            }
            IrType::Array { size, element_type } => {
                self.u8(7);
                self.u64(*size);
                self.ty(element_type);
            }
            IrType::Function(sig) => {
                self.u8(8);
                self.sig(sig);
            }
            IrType::Label => self.u8(9),
        }
    }

    fn sig(&mut self, sig: &FunctionType) {
        self.ty(&sig.return_type);
        self.len(sig.param_types.len());
        for param in &sig.param_types {
            self.ty(param);
        }
        self.bool(sig.is_vararg);
    }

    fn value(&mut self, value: &Value) {
        match value {
            Value::Temp { id, ty } => {
                self.u8(0);
                self.u32(*id);
                self.ty(ty);
            }
            Value::Constant { value, ty } => {
                self.u8(1);
                self.i64(*value);
                self.ty(ty);
            }
            Value::Global { name, value_type } => {
                self.u8(2);
                self.str(name);
                self.ty(value_type);
            }
            Value::StringPtr { global, len } => {
                self.u8(3);
                self.str(global);
                self.u64(*len);
            }
            Value::Function { name, ty } => {
                self.u8(4);
                self.str(name);
                self.sig(ty);
            }
            Value::Undef(ty) => {
                self.u8(5);
                self.ty(ty);
            }
        }
    }

    fn instruction(&mut self, instr: &Instruction) {
        match instr {
            Instruction::Call { result, callee_type, callee, args } => {
                self.u8(0);
                match result {
                    Some(id) => {
                        self.u8(1);
                        self.u32(*id);
                    }
                    None => self.u8(0),
                }
                self.sig(callee_type);
                self.value(callee);
                self.len(args.len());
                for arg in args {
                    self.value(arg);
                }
            }
            Instruction::Return(value) => {
                self.u8(1);
                match value {
                    Some(value) => {
                        self.u8(1);
                        self.value(value);
                    }
                    None => self.u8(0),
                }
            }
            Instruction::Branch(label) => {
                self.u8(2);
                self.str(label);
            }
            Instruction::BranchCond { condition, true_label, false_label } => {
                self.u8(3);
                self.value(condition);
                self.str(true_label);
                self.str(false_label);
            }
            Instruction::Switch { value, default, cases } => {
                self.u8(4);
                self.value(value);
                self.str(default);
                self.len(cases.len());
                for (case, label) in cases {
                    self.i64(*case);
                    self.str(label);
                }
            }
            Instruction::Unreachable => self.u8(5),
        }
    }

    fn global(&mut self, global: &GlobalVariable) {
        self.str(&global.name);
        self.ty(&global.value_type);
        self.bytes(&global.initializer);
        self.bool(global.is_constant);
        self.bool(global.unnamed_addr);
        self.u8(match global.linkage {
            Linkage::External => 0,
            Linkage::Internal => 1,
            Linkage::Private => 2,
        });
        self.u32(global.align);
    }

    fn function(&mut self, function: &Function) {
        self.str(&function.name);
        self.sig(&function.ty);
        self.bool(function.is_definition);
        self.len(function.blocks.len());
        for block in &function.blocks {
            self.str(&block.label);
            self.len(block.instructions.len());
            for instr in &block.instructions {
                self.instruction(instr);
            }
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn error_at(&self, offset: usize, message: impl Into<String>) -> EmitError {
        EmitError::MalformedBinary {
            offset,
            message: message.into(),
        }
    }

    fn error(&self, message: impl Into<String>) -> EmitError {
        self.error_at(self.pos, message)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| self.error(format!("unexpected end of input (wanted {len} bytes)")))?;
        let bytes = self.bytes;
        let slice = &bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn flag(&mut self) -> Result<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(self.error_at(self.pos - 1, format!("invalid flag byte {other}"))),
        }
    }

    fn bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn str(&mut self) -> Result<String> {
        let start = self.pos;
        String::from_utf8(self.bytes()?).map_err(|_| self.error_at(start, "string is not valid UTF-8"))
    }

    fn bad_tag(&self, what: &str, tag: u8) -> EmitError {
        self.error_at(self.pos - 1, format!("unknown {what} tag {tag}"))
    }

    fn ty(&mut self) -> Result<IrType> {
        self.ty_at_depth(0)
    }

    fn ty_at_depth(&mut self, depth: usize) -> Result<IrType> {
        if depth > MAX_TYPE_DEPTH {
            return Err(self.error("type nesting too deep"));
        }
        Ok(match self.u8()? {
            0 => IrType::Void,
            1 => IrType::I1,
            2 => IrType::I8,
            3 => IrType::I16,
            4 => IrType::I32,
            5 => IrType::I64,
            6 => IrType::Ptr(Box::new(self.ty_at_depth(depth + 1)?)),
            7 => {
                let size = self.u64()?;
                IrType::Array {
                    size,
                    element_type: Box::new(self.ty_at_depth(depth + 1)?),
                }
            }
            8 => IrType::Function(Box::new(self.sig_at_depth(depth + 1)?)),
            9 => IrType::Label,
            tag => return Err(self.bad_tag("type", tag)),
        })
    }

    fn sig(&mut self) -> Result<FunctionType> {
        self.sig_at_depth(0)
    }

    fn sig_at_depth(&mut self, depth: usize) -> Result<FunctionType> {
        let return_type = self.ty_at_depth(depth)?;
        let count = self.u32()?;
        let param_types = (0..count)
            .map(|_| self.ty_at_depth(depth))
            .collect::<Result<Vec<_>>>()?;
        let is_vararg = self.flag()?;
        Ok(FunctionType { return_type, param_types, is_vararg })
    }

    fn value(&mut self) -> Result<Value> {
        Ok(match self.u8()? {
            0 => Value::Temp { id: self.u32()?, ty: self.ty()? },
            1 => Value::Constant { value: self.i64()?, ty: self.ty()? },
            2 => Value::Global { name: self.str()?, value_type: self.ty()? },
            3 => Value::StringPtr { global: self.str()?, len: self.u64()? },
            4 => Value::Function { name: self.str()?, ty: self.sig()? },
            5 => Value::Undef(self.ty()?),
            tag => return Err(self.bad_tag("value", tag)),
        })
    }

    fn instruction(&mut self) -> Result<Instruction> {
        Ok(match self.u8()? {
            0 => {
                let result = if self.flag()? { Some(self.u32()?) } else { None };
                let callee_type = self.sig()?;
                let callee = self.value()?;
                let count = self.u32()?;
                let args = (0..count).map(|_| self.value()).collect::<Result<Vec<_>>>()?;
                Instruction::Call { result, callee_type, callee, args }
            }
            1 => Instruction::Return(if self.flag()? { Some(self.value()?) } else { None }),
            2 => Instruction::Branch(self.str()?),
            3 => Instruction::BranchCond {
                condition: self.value()?,
                true_label: self.str()?,
                false_label: self.str()?,
            },
            4 => {
                let value = self.value()?;
                let default = self.str()?;
                let count = self.u32()?;
                let cases = (0..count)
                    .map(|_| -> Result<(i64, String)> { Ok((self.i64()?, self.str()?)) })
                    .collect::<Result<Vec<_>>>()?;
                Instruction::Switch { value, default, cases }
            }
            5 => Instruction::Unreachable,
            tag => return Err(self.bad_tag("instruction", tag)),
        })
    }

    fn global(&mut self) -> Result<GlobalVariable> {
        let name = self.str()?;
        let value_type = self.ty()?;
        let initializer = self.bytes()?;
        let is_constant = self.flag()?;
        let unnamed_addr = self.flag()?;
        let linkage = match self.u8()? {
            0 => Linkage::External,
            1 => Linkage::Internal,
            2 => Linkage::Private,
            tag => return Err(self.bad_tag("linkage", tag)),
        };
        let align = self.u32()?;
        Ok(GlobalVariable { name, value_type, initializer, is_constant, unnamed_addr, linkage, align })
    }

    fn function(&mut self) -> Result<Function> {
        let name = self.str()?;
        let ty = self.sig()?;
        let mut function = if self.flag()? {
            Function::definition(name, ty)
        } else {
            Function::declaration(name, ty)
        };
        for _ in 0..self.u32()? {
            let mut block = BasicBlock::new(self.str()?);
            for _ in 0..self.u32()? {
                block.add_instruction(self.instruction()?);
            }
            function.blocks.push(block);
        }
        function.recount_temps();
        Ok(function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_header() {
        assert!(matches!(decode(b"XIR"), Err(EmitError::MalformedBinary { offset: 0, .. })));
        assert!(matches!(decode(b"NOPE\x01"), Err(EmitError::MalformedBinary { offset: 0, .. })));
        assert!(matches!(decode(b"XIRB\x09"), Err(EmitError::MalformedBinary { offset: 4, .. })));
    }

    #[test]
    fn test_empty_module() {
        let module = Module::new("empty");
        let bytes = encode(&module);
        assert_eq!(&bytes[..4], MAGIC);
        assert_eq!(bytes[4], VERSION);
        assert_eq!(decode(&bytes).unwrap(), module);
    }

    #[test]
    fn test_rejects_trailing_and_truncated_input() {
        let mut bytes = encode(&Module::new("m"));
        bytes.push(0);
        assert!(matches!(decode(&bytes), Err(EmitError::MalformedBinary { .. })));

        let bytes = encode(&Module::new("module"));
        assert!(matches!(decode(&bytes[..bytes.len() - 3]), Err(EmitError::MalformedBinary { .. })));
    }

    #[test]
    fn test_rejects_deeply_nested_types() {
        let mut w = Writer::default();
        w.buf.extend_from_slice(MAGIC);
        w.u8(VERSION);
        w.str("deep");
        w.u8(0); // no target
        w.len(1); // one global
        w.str("g");
        for _ in 0..=MAX_TYPE_DEPTH + 1 {
            w.u8(6); // ptr
        }
        w.u8(2); // i8

        let err = decode(&w.buf).unwrap_err();
        assert!(matches!(
            err,
            EmitError::MalformedBinary { ref message, .. } if message == "type nesting too deep"
        ));

        // Nesting right at the limit still decodes as far as the type goes.
        let mut w = Writer::default();
        w.ty(&(0..MAX_TYPE_DEPTH).fold(IrType::I8, |ty, _| IrType::ptr_to(ty)));
        let mut r = Reader { bytes: &w.buf, pos: 0 };
        assert!(r.ty().is_ok());
        assert_eq!(r.pos, w.buf.len());
    }

    #[test]
    fn test_rejects_unknown_tags() {
        let mut module = Module::new("m");
        module.functions.push(Function::declaration(
            "f",
            FunctionType::new(IrType::Void, vec![], false),
        ));
        let mut bytes = encode(&module);
        // Return type tag, followed by param count, vararg flag, definition flag and block count.
        let tag_pos = bytes.len() - 4 - 1 - 1 - 4 - 1;
        bytes[tag_pos] = 42;
        assert!(matches!(
            decode(&bytes),
            Err(EmitError::MalformedBinary { ref message, .. }) if message == "unknown type tag 42"
        ));
    }
}
