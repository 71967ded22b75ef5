use anyhow::{Context, Result};

use crate::ast::Program;
use crate::bytecode::{CompiledUnit, Word};
use crate::compiler::compile;
use crate::config::VmConfig;
use crate::frontend::Frontend;
use crate::normalize::normalize_program;
use crate::vm::Vm;

/// Normalize, compile and run programs under one set of VM limits.
///
/// `prepare` and `run` are kept apart so tests and benchmarks can look at
/// each phase on its own.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: VmConfig,
}

/// A compiled unit bound to the limits it will run under.
#[derive(Debug, Clone)]
pub struct Prepared {
    unit: CompiledUnit,
    config: VmConfig,
}

impl Pipeline {
    pub fn new(config: VmConfig) -> Self {
        Self { config }
    }

    pub fn prepare(&self, mut program: Program) -> Result<Prepared> {
        self.config.validate()?;
        normalize_program(&mut program);
        let unit = compile(&program)?;
        log::debug!(
            "prepared {} words across {} bodies",
            unit.code.len(),
            unit.functions.len()
        );
        Ok(Prepared {
            unit,
            config: self.config,
        })
    }

    pub fn run(&self, program: Program) -> Result<Word> {
        self.prepare(program)?.run()
    }

    /// Parses `source` with `frontend` and runs the result. Syntax errors
    /// stop the pipeline before compilation.
    pub fn run_source<F: Frontend + ?Sized>(&self, frontend: &F, source: &str) -> Result<Word> {
        let program = frontend.parse(source).context("Parsing source")?;
        self.run(program)
    }
}

impl Prepared {
    pub fn unit(&self) -> &CompiledUnit {
        &self.unit
    }

    pub fn listing(&self) -> String {
        self.unit.listing()
    }

    /// Runs the unit on a fresh VM.
    pub fn run(&self) -> Result<Word> {
        let mut vm = Vm::new(self.config);
        let value = vm
            .execute_at(&self.unit.code, self.unit.entry, 0)
            .context("Executing bytecode")?;
        Ok(value)
    }
}
