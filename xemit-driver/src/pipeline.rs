//! Emission pipeline: target -> build -> verify -> write
//!
//! Every stage failure is wrapped with the stage name so the top-level
//! diagnostic says where the pipeline stopped.

use anyhow::{Context, Result};
use log::info;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use xemit_ir::{render, verify, write_to_file, write_to_stream, OutputFormat, TargetRegistry};
use crate::hello::build_hello_module;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Target,
    Build,
    Verify,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Target => write!(f, "target"),
            Stage::Build => write!(f, "build"),
            Stage::Verify => write!(f, "verify"),
            Stage::Write => write!(f, "write"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Stdout,
    File(PathBuf),
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Stdout => write!(f, "<stdout>"),
            Output::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Everything the pipeline needs, resolved from the command line
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub triple: String,
    pub cpu: String,
    pub features: String,
    pub module_name: String,
    pub greeting: String,
    pub format: OutputFormat,
    pub output: Output,
}

/// What a successful run produced
#[derive(Debug)]
pub struct Report {
    pub output: Output,
    pub bytes: usize,
}

fn stage_failed(stage: Stage) -> String {
    format!("{stage} stage failed")
}

/// Runs the pipeline; `stdout` receives the module when the output is `Output::Stdout`
pub fn run(config: &PipelineConfig, stdout: &mut dyn Write) -> Result<Report> {
    let mut registry = TargetRegistry::new();
    registry.initialize();

    let target = registry
        .resolve(&config.triple)
        .with_context(|| stage_failed(Stage::Target))?;
    let descriptor = target.create_descriptor(&config.cpu, &config.features);
    info!("Target: {} [{}]", descriptor, target.description());

    let module = build_hello_module(&config.module_name, descriptor, &config.greeting)
        .with_context(|| stage_failed(Stage::Build))?;

    verify(&module).with_context(|| stage_failed(Stage::Verify))?;
    info!("Module '{}' verified", module.name);

    let bytes = render(&module, config.format).with_context(|| stage_failed(Stage::Write))?;
    match &config.output {
        Output::Stdout => write_to_stream(stdout, &bytes),
        Output::File(path) => write_to_file(path, &bytes),
    }
    .with_context(|| stage_failed(Stage::Write))?;
    info!("Wrote {} bytes of {} to {}", bytes.len(), config.format, config.output);

    Ok(Report {
        output: config.output.clone(),
        bytes: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use xemit_ir::EmitError;

    fn config(output: Output) -> PipelineConfig {
        PipelineConfig {
            triple: "xtensa".to_string(),
            cpu: "esp32".to_string(),
            features: String::new(),
            module_name: "main".to_string(),
            greeting: "hello".to_string(),
            format: OutputFormat::Text,
            output,
        }
    }

    #[test]
    fn test_run_to_stdout() {
        let mut out = Vec::new();
        let report = run(&config(Output::Stdout), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(report.bytes, text.len());
        assert!(text.starts_with("; ModuleID = 'main'\n"));
        assert!(text.contains("target triple = \"xtensa\""));
        assert!(text.contains("declare i32 @printf(i8*, ...)"));
        assert!(text.contains("  ret void\n"));
    }

    #[test]
    fn test_run_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.ll");
        let mut out = Vec::new();

        let report = run(&config(Output::File(path.clone())), &mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(report.output, Output::File(path.clone()));
        assert_eq!(std::fs::metadata(&path).unwrap().len() as usize, report.bytes);
    }

    #[test]
    fn test_unknown_target_names_stage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.ll");
        let mut cfg = config(Output::File(path.clone()));
        cfg.triple = "bogus-arch".to_string();

        let err = run(&cfg, &mut Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), "target stage failed");
        assert!(matches!(err.downcast_ref::<EmitError>(), Some(EmitError::UnknownTarget { .. })));
        assert!(!path.exists());
    }

    #[test]
    fn test_write_failure_names_stage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("main.ll");

        let err = run(&config(Output::File(path)), &mut Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), "write stage failed");
        assert!(matches!(err.downcast_ref::<EmitError>(), Some(EmitError::Io { .. })));
    }
}
