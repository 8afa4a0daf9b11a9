//! xemit Driver
//!
//! Emits the hello-world module for a target and writes it as text,
//! binary or JSON. Any failure exits with status 1 and a diagnostic
//! naming the stage that failed.

mod hello;
mod pipeline;

use clap::{Parser, ValueEnum};
use colored::Colorize;
use hello::DEFAULT_GREETING;
use pipeline::{Output, PipelineConfig};
use std::io;
use std::path::PathBuf;
use xemit_ir::{OutputFormat, TargetRegistry};

#[derive(Parser)]
#[command(name = "xemit")]
#[command(about = "Minimal IR emitter for embedded targets")]
#[command(version = "0.1.0")]
struct Cli {
    /// Target triple; only the architecture component selects the backend
    #[arg(short, long, default_value = "xtensa")]
    triple: String,

    /// Target CPU (empty for the backend default)
    #[arg(long, default_value = "esp32")]
    cpu: String,

    /// Target feature string, e.g. "+fp,-dsp"
    #[arg(long, default_value = "")]
    features: String,

    /// Module identifier; also names the default output file
    #[arg(long, default_value = "main")]
    module_name: String,

    /// Text printed by the emitted program
    #[arg(long, default_value = DEFAULT_GREETING)]
    greeting: String,

    /// Output representation
    #[arg(short, long, value_enum, default_value_t = FormatArg::Text)]
    format: FormatArg,

    /// Output file (defaults to <module-name>.<ext> in the current directory)
    #[arg(short, long, conflicts_with = "stdout")]
    output: Option<PathBuf>,

    /// Write the module to standard output instead of a file
    #[arg(long)]
    stdout: bool,

    /// List registered targets and exit
    #[arg(long)]
    list_targets: bool,

    /// Enable logging (filtered by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Text,
    Binary,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Binary => OutputFormat::Binary,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

impl Cli {
    fn into_config(self) -> PipelineConfig {
        let format = OutputFormat::from(self.format);
        let output = if self.stdout {
            Output::Stdout
        } else {
            let path = self
                .output
                .unwrap_or_else(|| PathBuf::from(format!("{}.{}", self.module_name, format.extension())));
            Output::File(path)
        };

        PipelineConfig {
            triple: self.triple,
            cpu: self.cpu,
            features: self.features,
            module_name: self.module_name,
            greeting: self.greeting,
            format,
            output,
        }
    }
}

fn list_targets() {
    let mut registry = TargetRegistry::new();
    registry.initialize();

    println!("{}", "Registered targets:".bold());
    for backend in registry.registered_targets() {
        println!(
            "  {:<10} - {} (default cpu: {}, cpus: {})",
            backend.arch.green(),
            backend.description,
            backend.default_cpu,
            backend.cpus.join(", ")
        );
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::init();
    }

    if cli.list_targets {
        list_targets();
        return;
    }

    let config = cli.into_config();
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match pipeline::run(&config, &mut handle) {
        Ok(report) => log::debug!("Done: {} bytes to {}", report.bytes, report.output),
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path_follows_format() {
        let cli = Cli::parse_from(["xemit"]);
        let config = cli.into_config();
        assert_eq!(config.output, Output::File(PathBuf::from("main.ll")));
        assert_eq!(config.triple, "xtensa");
        assert_eq!(config.cpu, "esp32");

        let cli = Cli::parse_from(["xemit", "--format", "binary", "--module-name", "blink"]);
        assert_eq!(cli.into_config().output, Output::File(PathBuf::from("blink.xirb")));
    }

    #[test]
    fn test_stdout_and_output_conflict() {
        assert!(Cli::try_parse_from(["xemit", "--stdout", "-o", "x.ll"]).is_err());

        let config = Cli::parse_from(["xemit", "--stdout", "--format", "json"]).into_config();
        assert_eq!(config.output, Output::Stdout);
        assert_eq!(config.format, OutputFormat::Json);
    }
}
