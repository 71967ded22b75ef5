use anyhow::{Context, Result, ensure};
use serde::Deserialize;

pub const DEFAULT_STACK_CAPACITY: usize = 4096;
pub const DEFAULT_MAX_CALL_DEPTH: usize = 512;
/// Ceiling for `max_call_depth`. Every VM call nests one native call, so the
/// depth must stay within what a default 2 MiB thread stack can hold.
pub const MAX_CALL_DEPTH_LIMIT: usize = 1024;

/// Resource limits for one virtual machine.
///
/// Missing keys fall back to the defaults, so a host config file only needs
/// to name what it changes:
///
/// ```yaml
/// stack_capacity: 65536
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VmConfig {
    /// Operand stack size in words, allocated once up front.
    pub stack_capacity: usize,
    /// Deepest allowed nesting of `call` instructions.
    pub max_call_depth: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_capacity: DEFAULT_STACK_CAPACITY,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl VmConfig {
    pub fn with_stack_capacity(mut self, stack_capacity: usize) -> Self {
        self.stack_capacity = stack_capacity;
        self
    }

    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }

    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let config: VmConfig = serde_yaml::from_str(source).context("Parsing VM config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.stack_capacity > 0, "stack_capacity must be positive");
        ensure!(self.max_call_depth > 0, "max_call_depth must be positive");
        ensure!(
            self.max_call_depth <= MAX_CALL_DEPTH_LIMIT,
            "max_call_depth must not exceed {MAX_CALL_DEPTH_LIMIT}"
        );
        Ok(())
    }
}
