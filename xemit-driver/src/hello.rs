//! The built-in program: `main` prints a greeting through `printf`
//!
//! Equivalent C:
//!
//! ```c
//! int printf(const char *format, ...);
//! void main(void) { printf("%s\n", "hello"); }
//! ```

use log::debug;
use xemit_ir::{FunctionType, IrBuilder, IrType, Module, Result, TargetDescriptor};

pub const DEFAULT_GREETING: &str = "hello";

pub fn build_hello_module(module_name: &str, target: TargetDescriptor, greeting: &str) -> Result<Module> {
    let mut module = Module::new(module_name);
    module.set_target(target)?;

    // int printf(i8*, ...)
    let printf_ty = FunctionType::new(IrType::I32, vec![IrType::i8_ptr()], true);
    let printf = module.declare_function("printf", printf_ty.clone())?;

    let main_ty = FunctionType::new(IrType::Void, vec![], false);
    let main = module.define_function("main", main_ty)?;

    {
        let mut builder = IrBuilder::new(&mut module);
        let entry = builder.create_basic_block(main, "entry")?;
        builder.set_insertion_point(entry)?;

        let format = builder.build_global_string_ptr("%s\n", ".formatstr");
        let text = builder.build_global_string_ptr(greeting, ".str");
        let callee = builder.module().function_value(printf)?;
        builder.build_call(&printf_ty, &callee, vec![format, text])?;

        builder.build_return_void()?;
    }

    debug!(
        "Built module '{}' with {} functions and {} globals",
        module.name,
        module.functions.len(),
        module.globals.len()
    );
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use xemit_ir::{verify, TargetRegistry};

    fn esp32() -> TargetDescriptor {
        let mut registry = TargetRegistry::new();
        registry.initialize();
        registry.resolve("xtensa").unwrap().create_descriptor("esp32", "")
    }

    #[test]
    fn test_hello_module_shape() {
        let module = build_hello_module("main", esp32(), DEFAULT_GREETING).unwrap();
        verify(&module).unwrap();

        assert_eq!(module.declarations().map(|f| f.name.as_str()).collect::<Vec<_>>(), vec!["printf"]);
        assert_eq!(module.definitions().map(|f| f.name.as_str()).collect::<Vec<_>>(), vec!["main"]);

        let globals: Vec<_> = module.globals.iter().map(|g| g.initializer.clone()).collect();
        assert_eq!(globals, vec![b"%s\n\0".to_vec(), b"hello\0".to_vec()]);
    }

    #[test]
    fn test_custom_greeting() {
        let module = build_hello_module("greeter", esp32(), "hi there").unwrap();
        verify(&module).unwrap();
        assert_eq!(module.name, "greeter");
        assert_eq!(module.get_global(".str").unwrap().initializer, b"hi there\0");
    }
}
