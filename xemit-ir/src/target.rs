//! Target registry
//!
//! Backends are compiled in and registered explicitly through
//! [`TargetRegistry::initialize`]; nothing is registered behind the
//! caller's back. A resolved [`Target`] produces the immutable
//! [`TargetDescriptor`] that gets attached to a module.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use xemit_common::{EmitError, Result};

/// A compiled-in backend
#[derive(Debug, PartialEq, Eq)]
pub struct Backend {
    pub arch: &'static str,
    pub description: &'static str,
    pub default_cpu: &'static str,
    pub cpus: &'static [&'static str],
    pub pointer_width: u32,
    pub data_layout: &'static str,
}

static BACKENDS: &[Backend] = &[
    Backend {
        arch: "xtensa",
        description: "Xtensa 32-bit (ESP32 / ESP8266)",
        default_cpu: "esp32",
        cpus: &["esp32", "esp32s2", "esp32s3", "esp8266", "generic"],
        pointer_width: 32,
        data_layout: "e-m:e-p:32:32-i8:8:32-i16:16:32-i64:64-n32",
    },
    Backend {
        arch: "riscv32",
        description: "32-bit RISC-V",
        default_cpu: "generic-rv32",
        cpus: &["generic-rv32", "esp32c3", "esp32c6"],
        pointer_width: 32,
        data_layout: "e-m:e-p:32:32-i64:64-n32-S128",
    },
    Backend {
        arch: "thumbv7em",
        description: "Thumb-2 for ARMv7E-M (Cortex-M4/M7)",
        default_cpu: "cortex-m4",
        cpus: &["cortex-m4", "cortex-m7"],
        pointer_width: 32,
        data_layout: "e-m:e-p:32:32-Fi8-i64:64-v128:64:128-a:0:32-n32-S64",
    },
    Backend {
        arch: "avr",
        description: "Atmel AVR",
        default_cpu: "atmega328p",
        cpus: &["atmega328p", "atmega2560"],
        pointer_width: 16,
        data_layout: "e-P1-p:16:8-i8:8-i16:8-i32:8-i64:8-f32:8-f64:8-n8-a:8",
    },
    Backend {
        arch: "x86_64",
        description: "64-bit x86",
        default_cpu: "x86-64",
        cpus: &["x86-64", "generic"],
        pointer_width: 64,
        data_layout: "e-m:e-p270:32:32-p271:32:32-p272:64:64-i64:64-i128:128-f80:128-n8:16:32:64-S128",
    },
];

/// Registry of the backends available to this process
#[derive(Debug, Default)]
pub struct TargetRegistry {
    backends: Vec<&'static Backend>,
    initialized: bool,
}

impl TargetRegistry {
    /// An empty registry; call [`initialize`](Self::initialize) before resolving
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every compiled-in backend. Calling it again is a no-op.
    pub fn initialize(&mut self) {
        if self.initialized {
            debug!("Target registry already initialized");
            return;
        }
        self.backends.extend(BACKENDS.iter());
        self.initialized = true;
        debug!("Registered {} target backends", self.backends.len());
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Backends in registration order
    pub fn registered_targets(&self) -> impl Iterator<Item = &'static Backend> + '_ {
        self.backends.iter().copied()
    }

    /// Looks up the backend for `triple` by its architecture component
    /// (`xtensa-esp32-none-elf` resolves to `xtensa`)
    pub fn resolve(&self, triple: &str) -> Result<Target> {
        let arch = triple.split('-').next().unwrap_or_default();
        let backend = self
            .backends
            .iter()
            .copied()
            .find(|backend| !arch.is_empty() && backend.arch == arch)
            .ok_or_else(|| EmitError::UnknownTarget {
                triple: triple.to_string(),
            })?;
        debug!("Resolved triple '{triple}' to backend '{}'", backend.arch);
        Ok(Target {
            triple: triple.to_string(),
            backend,
        })
    }
}

/// A backend resolved for a specific triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    triple: String,
    backend: &'static Backend,
}

impl Target {
    pub fn name(&self) -> &'static str {
        self.backend.arch
    }

    pub fn description(&self) -> &'static str {
        self.backend.description
    }

    pub fn triple(&self) -> &str {
        &self.triple
    }

    /// Builds the descriptor for `cpu` (empty selects the backend default)
    /// and `features`. Unknown CPUs are ignored with a warning.
    pub fn create_descriptor(&self, cpu: &str, features: &str) -> TargetDescriptor {
        let cpu = if cpu.is_empty() {
            self.backend.default_cpu
        } else {
            if !self.backend.cpus.iter().any(|known| *known == cpu) {
                warn!(
                    "'{cpu}' is not a recognized processor for target '{}' (known: {})",
                    self.backend.arch,
                    self.backend.cpus.join(", ")
                );
            }
            cpu
        };
        TargetDescriptor {
            triple: self.triple.clone(),
            cpu: cpu.to_string(),
            features: features.to_string(),
            data_layout: self.backend.data_layout.to_string(),
            pointer_width: self.backend.pointer_width,
        }
    }
}

/// Immutable layout/ABI description attached to a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    pub triple: String,
    pub cpu: String,
    pub features: String,
    pub data_layout: String,
    pub pointer_width: u32,
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.triple, self.cpu)?;
        if !self.features.is_empty() {
            write!(f, " [{}]", self.features)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uninitialized_registry_resolves_nothing() {
        let registry = TargetRegistry::new();
        assert!(!registry.is_initialized());
        assert!(matches!(
            registry.resolve("xtensa"),
            Err(EmitError::UnknownTarget { ref triple }) if triple == "xtensa"
        ));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut registry = TargetRegistry::new();
        registry.initialize();
        let count = registry.registered_targets().count();
        registry.initialize();
        assert_eq!(registry.registered_targets().count(), count);
        assert_eq!(count, BACKENDS.len());
    }

    #[test]
    fn test_resolve_by_arch_component() {
        let mut registry = TargetRegistry::new();
        registry.initialize();

        let target = registry.resolve("xtensa").unwrap();
        assert_eq!(target.name(), "xtensa");
        assert_eq!(target.triple(), "xtensa");

        let full = registry.resolve("riscv32-esp-none-elf").unwrap();
        assert_eq!(full.name(), "riscv32");
        assert_eq!(full.triple(), "riscv32-esp-none-elf");
    }

    #[test]
    fn test_unknown_triples() {
        let mut registry = TargetRegistry::new();
        registry.initialize();
        assert!(matches!(registry.resolve("bogus-arch"), Err(EmitError::UnknownTarget { .. })));
        assert!(matches!(registry.resolve(""), Err(EmitError::UnknownTarget { .. })));
        assert!(matches!(registry.resolve("-xtensa"), Err(EmitError::UnknownTarget { .. })));
    }

    #[test]
    fn test_create_descriptor() {
        let mut registry = TargetRegistry::new();
        registry.initialize();
        let target = registry.resolve("xtensa").unwrap();

        let desc = target.create_descriptor("esp32", "");
        assert_eq!(desc.triple, "xtensa");
        assert_eq!(desc.cpu, "esp32");
        assert_eq!(desc.pointer_width, 32);
        assert_eq!(desc.data_layout, "e-m:e-p:32:32-i8:8:32-i16:16:32-i64:64-n32");
        assert_eq!(desc.to_string(), "xtensa (esp32)");

        let defaulted = target.create_descriptor("", "+fp");
        assert_eq!(defaulted.cpu, "esp32");
        assert_eq!(defaulted.to_string(), "xtensa (esp32) [+fp]");

        // Unknown processors are kept as given.
        assert_eq!(target.create_descriptor("pentium", "").cpu, "pentium");
    }
}
