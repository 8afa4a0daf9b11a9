//! Textual rendering
//!
//! Renders modules in an LLVM-style assembly grammar. Output depends only
//! on the module contents: globals, then functions, each in insertion
//! order.

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use xemit_common::TempId;
use crate::{Function, GlobalVariable, Instruction, Linkage, Module};

/// Escapes bytes for a `c"..."` constant: printable ASCII other than `"` and
/// `\` is kept, everything else becomes `\XX`
pub fn escape_c_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &byte in bytes {
        if (0x20..0x7f).contains(&byte) && byte != b'"' && byte != b'\\' {
            out.push(char::from(byte));
        } else {
            // Writing into a String cannot fail.
            let _ = write!(out, "\\{byte:02X}");
        }
    }
    out
}

/// A symbol or block name as it appears after `@`/`%` or before `:`.
/// Names outside `[-a-zA-Z$._][-a-zA-Z$._0-9]*` are quoted and escaped.
pub(crate) struct Ident<'a>(pub(crate) &'a str);

fn is_plain_ident(name: &str) -> bool {
    let extra = |c: char| matches!(c, '-' | '$' | '.' | '_');
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || extra(first) => {
            chars.all(|c| c.is_ascii_alphanumeric() || extra(c))
        }
        _ => false,
    }
}

impl fmt::Display for Ident<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if is_plain_ident(self.0) {
            write!(f, "{}", self.0)
        } else {
            write!(f, "\"{}\"", escape_c_string(self.0.as_bytes()))
        }
    }
}

/// Maps call results to the numbers they get in text order; parameters
/// keep theirs. `None` when creation order already matches.
fn text_numbering(function: &Function) -> Option<HashMap<TempId, TempId>> {
    let mut next = function.ty.arity() as TempId;
    let mut numbering = HashMap::new();
    let mut sequential = true;
    for instr in function.blocks.iter().flat_map(|b| &b.instructions) {
        if let Instruction::Call { result: Some(id), .. } = instr {
            sequential &= *id == next;
            numbering.insert(*id, next);
            next += 1;
        }
    }
    (!sequential).then_some(numbering)
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Linkage::External => Ok(()),
            Linkage::Internal => write!(f, "internal "),
            Linkage::Private => write!(f, "private "),
        }
    }
}

impl fmt::Display for GlobalVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{} = {}", Ident(&self.name), self.linkage)?;
        if self.unnamed_addr {
            write!(f, "unnamed_addr ")?;
        }
        let kind = if self.is_constant { "constant" } else { "global" };
        write!(
            f,
            "{kind} {} c\"{}\", align {}",
            self.value_type,
            escape_c_string(&self.initializer),
            self.align
        )
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_declaration() {
            write!(f, "declare {} @{}", self.ty.return_type, Ident(&self.name))?;
            return self.ty.fmt_params(f);
        }

        // Temporaries are printed in text order, whatever order the
        // blocks were filled in.
        if let Some(numbering) = text_numbering(self) {
            let mut renumbered = self.clone();
            for instr in renumbered.blocks.iter_mut().flat_map(|b| &mut b.instructions) {
                instr.rename_temps(|id| numbering.get(&id).copied().unwrap_or(id));
            }
            return write_definition(&renumbered, f);
        }
        write_definition(self, f)
    }
}

fn write_definition(function: &Function, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let ty = &function.ty;
    write!(f, "define {} @{}(", ty.return_type, Ident(&function.name))?;
    for (i, param) in ty.param_types.iter().enumerate() {
        if i > 0 { write!(f, ", ")?; }
        write!(f, "{param} %{i}")?;
    }
    if ty.is_vararg {
        if !ty.param_types.is_empty() { write!(f, ", ")?; }
        write!(f, "...")?;
    }
    writeln!(f, ") {{")?;
    for (i, block) in function.blocks.iter().enumerate() {
        if i > 0 { writeln!(f)?; }
        writeln!(f, "{}:", Ident(&block.label))?;
        for instr in &block.instructions {
            writeln!(f, "  {instr}")?;
        }
    }
    write!(f, "}}")
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = escape_c_string(self.name.as_bytes());
        writeln!(f, "; ModuleID = '{name}'")?;
        writeln!(f, "source_filename = \"{name}\"")?;
        if let Some(target) = self.target() {
            writeln!(f, "target datalayout = \"{}\"", target.data_layout)?;
            writeln!(f, "target triple = \"{}\"", target.triple)?;
        }

        if !self.globals.is_empty() {
            writeln!(f)?;
            for global in &self.globals {
                writeln!(f, "{global}")?;
            }
        }

        for function in &self.functions {
            writeln!(f)?;
            writeln!(f, "{function}")?;
        }

        if let Some(target) = self.target() {
            writeln!(f)?;
            write!(f, "; cpu = \"{}\"", target.cpu)?;
            if !target.features.is_empty() {
                write!(f, ", features = \"{}\"", target.features)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_c_string() {
        assert_eq!(escape_c_string(b"%s\n\0"), "%s\\0A\\00");
        assert_eq!(escape_c_string(b"hello\0"), "hello\\00");
        assert_eq!(escape_c_string(b"say \"hi\"\\"), "say \\22hi\\22\\5C");
        assert_eq!(escape_c_string(&[0xff, b'\t']), "\\FF\\09");
    }
}
