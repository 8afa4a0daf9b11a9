//! Module serialization and output sinks

use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use xemit_common::{EmitError, Result};
use crate::{binary, Module};

/// Output representation of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// LLVM-style assembly text
    #[default]
    Text,
    /// Compact `XIRB` encoding, readable with [`binary::decode`]
    Binary,
    /// Pretty-printed JSON of the in-memory module
    Json,
}

impl OutputFormat {
    /// Conventional file extension for this format
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Text => "ll",
            OutputFormat::Binary => "xirb",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Binary => write!(f, "binary"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

pub fn render(module: &Module, format: OutputFormat) -> Result<Vec<u8>> {
    let bytes = match format {
        OutputFormat::Text => module.to_string().into_bytes(),
        OutputFormat::Binary => binary::encode(module),
        OutputFormat::Json => {
            let mut json = serde_json::to_vec_pretty(module)?;
            json.push(b'\n');
            json
        }
    };
    debug!("Rendered module '{}' as {format}: {} bytes", module.name, bytes.len());
    Ok(bytes)
}

/// Creates (or truncates) `path` and writes `bytes` to it. The file is
/// flushed and closed before returning, on success and on failure.
pub fn write_to_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let target = path.display().to_string();
    let file = File::create(path).map_err(|e| EmitError::io(&target, e))?;
    let mut writer = BufWriter::new(file);
    write_to_stream(&mut writer, bytes).map_err(|err| match err {
        EmitError::Io { source, .. } => EmitError::io(&target, source),
        other => other,
    })?;
    debug!("Wrote {} bytes to {target}", bytes.len());
    Ok(())
}

/// Writes `bytes` to an already open stream and flushes it
pub fn write_to_stream<W: Write + ?Sized>(stream: &mut W, bytes: &[u8]) -> Result<()> {
    stream
        .write_all(bytes)
        .and_then(|()| stream.flush())
        .map_err(|e| EmitError::io("output stream", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_to_stream() {
        let mut out = Vec::new();
        write_to_stream(&mut out, b"abc").unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn test_stream_failure_is_io_error() {
        let mut sink = FailingSink;
        let err = write_to_stream(&mut sink, b"abc").unwrap_err();
        match err {
            EmitError::Io { target, source } => {
                assert_eq!(target, "output stream");
                assert_eq!(source.kind(), io::ErrorKind::BrokenPipe);
            }
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("main.ll");
        let err = write_to_file(&path, b"x").unwrap_err();
        assert!(matches!(err, EmitError::Io { ref target, .. } if target.ends_with("main.ll")));
        assert!(!path.exists());
    }

    #[test]
    fn test_extensions() {
        assert_eq!(OutputFormat::Text.extension(), "ll");
        assert_eq!(OutputFormat::Binary.extension(), "xirb");
        assert_eq!(OutputFormat::Json.extension(), "json");
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
    }
}
