//! End-to-end tests: build the hello-world module, verify, serialize, write

use pretty_assertions::assert_eq;
use xemit_ir::{
    binary, render, verify, write_to_file, EmitError, FunctionType, IrBuilder, IrType, Module,
    OutputFormat, TargetRegistry,
};

const EXPECTED_TEXT: &str = r#"; ModuleID = 'main'
source_filename = "main"
target datalayout = "e-m:e-p:32:32-i8:8:32-i16:16:32-i64:64-n32"
target triple = "xtensa"

@.formatstr = private unnamed_addr constant [4 x i8] c"%s\0A\00", align 1
@.str = private unnamed_addr constant [6 x i8] c"hello\00", align 1

declare i32 @printf(i8*, ...)

define void @main() {
entry:
  %0 = call i32 (i8*, ...) @printf(i8* getelementptr inbounds ([4 x i8], [4 x i8]* @.formatstr, i32 0, i32 0), i8* getelementptr inbounds ([6 x i8], [6 x i8]* @.str, i32 0, i32 0))
  ret void
}

; cpu = "esp32"
"#;

fn hello_module() -> Module {
    let mut registry = TargetRegistry::new();
    registry.initialize();
    let target = registry.resolve("xtensa").unwrap();

    let mut module = Module::new("main");
    module.set_target(target.create_descriptor("esp32", "")).unwrap();

    let printf_ty = FunctionType::new(IrType::I32, vec![IrType::i8_ptr()], true);
    let printf = module.declare_function("printf", printf_ty.clone()).unwrap();
    let main = module
        .define_function("main", FunctionType::new(IrType::Void, vec![], false))
        .unwrap();

    let mut builder = IrBuilder::new(&mut module);
    let entry = builder.create_basic_block(main, "entry").unwrap();
    builder.set_insertion_point(entry).unwrap();
    let fmt = builder.build_global_string_ptr("%s\n", ".formatstr");
    let hello = builder.build_global_string_ptr("hello", ".str");
    let callee = builder.module().function_value(printf).unwrap();
    builder.build_call(&printf_ty, &callee, vec![fmt, hello]).unwrap();
    builder.build_return_void().unwrap();

    module
}

#[test]
fn test_hello_module_verifies() {
    let module = hello_module();
    verify(&module).unwrap();

    assert_eq!(module.declarations().count(), 1);
    assert_eq!(module.definitions().count(), 1);
    assert_eq!(module.globals.len(), 2);

    let main = module.get_function("main").unwrap();
    assert_eq!(main.blocks.len(), 1);
    assert_eq!(main.blocks[0].instructions.last().map(|i| i.to_string()), Some("ret void".to_string()));
}

#[test]
fn test_hello_module_text() {
    let module = hello_module();
    let text = String::from_utf8(render(&module, OutputFormat::Text).unwrap()).unwrap();
    assert_eq!(text, EXPECTED_TEXT);
}

#[test]
fn test_text_rendering_is_idempotent() {
    let module = hello_module();
    let first = render(&module, OutputFormat::Text).unwrap();
    let second = render(&module, OutputFormat::Text).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_binary_round_trip() {
    let module = hello_module();
    let bytes = render(&module, OutputFormat::Binary).unwrap();
    let decoded = binary::decode(&bytes).unwrap();

    assert_eq!(decoded, module);
    verify(&decoded).unwrap();
    assert_eq!(decoded.to_string(), module.to_string());
}

#[test]
fn test_json_dump_names_symbols() {
    let module = hello_module();
    let json = String::from_utf8(render(&module, OutputFormat::Json).unwrap()).unwrap();
    assert!(json.contains("\"printf\""));
    assert!(json.contains("\".formatstr\""));
    assert!(json.ends_with('\n'));
}

#[test]
fn test_write_main_ll() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("main.ll");
    let module = hello_module();

    let bytes = render(&module, OutputFormat::Text).unwrap();
    write_to_file(&path, &bytes).unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), EXPECTED_TEXT);
}

#[test]
fn test_unknown_target() {
    let mut registry = TargetRegistry::new();
    registry.initialize();
    let err = registry.resolve("bogus-arch").unwrap_err();
    assert!(matches!(err, EmitError::UnknownTarget { ref triple } if triple == "bogus-arch"));
    assert_eq!(err.to_string(), "unknown target 'bogus-arch': no registered backend matches");
}
