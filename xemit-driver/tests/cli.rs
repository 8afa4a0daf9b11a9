//! Command-line behaviour of the `xemit` binary

use std::process::Command;

fn xemit() -> Command {
    Command::new(env!("CARGO_BIN_EXE_xemit"))
}

#[test]
fn test_default_run_writes_main_ll() {
    let dir = tempfile::tempdir().unwrap();
    let status = xemit().current_dir(dir.path()).status().unwrap();
    assert!(status.success());

    let text = std::fs::read_to_string(dir.path().join("main.ll")).unwrap();
    assert!(text.contains("target triple = \"xtensa\""));
    assert!(text.contains("c\"hello\\00\""));
    assert!(text.contains("define void @main()"));
}

#[test]
fn test_unknown_triple_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = xemit()
        .current_dir(dir.path())
        .args(["--triple", "bogus-arch"])
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("target stage failed"));
    assert!(stderr.contains("bogus-arch"));
    assert!(!dir.path().join("main.ll").exists());
}

#[test]
fn test_stdout_output() {
    let out = xemit().args(["--stdout", "--greeting", "hi"]).output().unwrap();
    assert!(out.status.success());

    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.starts_with("; ModuleID = 'main'"));
    assert!(text.contains("c\"hi\\00\""));
}

#[test]
fn test_binary_output_decodes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hello.xirb");
    let status = xemit()
        .args(["--format", "binary", "-o"])
        .arg(&path)
        .status()
        .unwrap();
    assert!(status.success());

    let bytes = std::fs::read(&path).unwrap();
    let module = xemit_ir::binary::decode(&bytes).unwrap();
    xemit_ir::verify(&module).unwrap();
    assert_eq!(module.target().map(|t| t.cpu.as_str()), Some("esp32"));
}

#[test]
fn test_list_targets() {
    let out = xemit().arg("--list-targets").output().unwrap();
    assert!(out.status.success());

    let text = String::from_utf8(out.stdout).unwrap();
    for arch in ["xtensa", "riscv32", "thumbv7em", "avr", "x86_64"] {
        assert!(text.contains(arch), "missing {arch}");
    }
}
