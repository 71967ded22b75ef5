use anyhow::{Context, Result, ensure};

use stackscript::ast::Program;
use stackscript::bytecode::{CompiledUnit, Instruction, Word};
use stackscript::compiler::compile;
use stackscript::fixtures::Case;
use stackscript::normalize::normalize_program;
use stackscript::pipeline::Pipeline;

/// A decoded jump: where it sits and where it lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpSite {
    pub address: usize,
    pub target: isize,
    pub conditional: bool,
}

pub fn normalize_output(output: &str) -> String {
    output.replace("\r\n", "\n").trim_end().to_string()
}

/// Normalizes a copy of `program` and compiles it.
pub fn compile_program(program: &Program) -> Result<CompiledUnit> {
    let mut program = program.clone();
    normalize_program(&mut program);
    let unit = compile(&program)?;
    Ok(unit)
}

pub fn run_program(program: Program) -> Result<Word> {
    Pipeline::default().run(program)
}

pub fn run_case(case: &Case) -> Result<Word> {
    Pipeline::new(case.config)
        .run(case.program())
        .with_context(|| format!("Running fixture {}", case.name))
}

pub fn jump_sites(unit: &CompiledUnit) -> Result<Vec<JumpSite>> {
    let mut sites = Vec::new();
    for decoded in unit.instructions() {
        let (address, instruction) = decoded?;
        if let Some(target) = instruction.jump_target(address) {
            sites.push(JumpSite {
                address,
                target,
                conditional: matches!(instruction, Instruction::JumpIfFalse(_)),
            });
        }
    }
    Ok(sites)
}

/// Checks that the stream decodes cleanly, every jump lands on an
/// instruction boundary inside its own body or at the end of the stream, and
/// every call targets the start of a body.
pub fn check_control_flow(unit: &CompiledUnit) -> Result<()> {
    let mut boundaries = Vec::new();
    for decoded in unit.instructions() {
        let (address, instruction) = decoded?;
        boundaries.push(address);
        if let Instruction::Call { target, .. } = instruction {
            let entry = usize::try_from(target).context("Negative call target")?;
            ensure!(
                unit.function_at(entry).is_some(),
                "Call at {address} targets {entry}, which starts no body"
            );
        }
    }
    boundaries.push(unit.code.len());

    let end = unit.code.len();
    for site in jump_sites(unit)? {
        let target = usize::try_from(site.target)
            .with_context(|| format!("Jump at {} lands before the stream", site.address))?;
        ensure!(
            boundaries.contains(&target),
            "Jump at {} lands on {target}, which is not an instruction boundary",
            site.address
        );
        let body = unit
            .enclosing_function(site.address)
            .with_context(|| format!("Jump at {} lies outside every body", site.address))?;
        ensure!(
            target == end || body.contains(target),
            "Jump at {} in {} leaves its body for {target}",
            site.address,
            body.name
        );
    }
    Ok(())
}
