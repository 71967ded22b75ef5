use std::collections::BTreeSet;
use std::fmt::{self, Write};

use super::{CompiledUnit, FunctionInfo, Instruction, Instructions};

impl CompiledUnit {
    /// Human-readable assembler listing of the whole stream.
    ///
    /// Slot operands are shown by name, jump targets as absolute addresses
    /// (or `end` when they point one past the stream), and every address that
    /// some jump lands on gets a label line.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_listing(&mut out);
        out
    }

    fn write_listing(&self, out: &mut impl Write) -> fmt::Result {
        let targets = self.jump_targets();
        for function in &self.functions {
            self.list_function(function, &targets, out)?;
        }
        writeln!(out, "end:")
    }

    /// Absolute addresses reached by any jump in the stream.
    pub fn jump_targets(&self) -> BTreeSet<usize> {
        self.instructions()
            .filter_map(Result::ok)
            .filter_map(|(address, instruction)| instruction.jump_target(address))
            .filter_map(|target| usize::try_from(target).ok())
            .collect()
    }

    fn list_function(
        &self,
        function: &FunctionInfo,
        targets: &BTreeSet<usize>,
        out: &mut impl Write,
    ) -> fmt::Result {
        writeln!(out, "{}/{}:", function.name, function.arity)?;
        for (slot, name) in function.locals.iter().enumerate() {
            writeln!(out, "      local       {name}, @{slot}")?;
        }
        for decoded in Instructions::range(&self.code, function.address, function.end) {
            let (address, instruction) = match decoded {
                Ok(decoded) => decoded,
                Err(err) => return writeln!(out, "      ; {err}"),
            };
            if targets.contains(&address) {
                writeln!(out, "{address}:")?;
            }
            let operand = self.render_operand(function, address, &instruction);
            let line = format!("{address:>4}  {:<12}{operand}", instruction.opcode().mnemonic());
            writeln!(out, "{}", line.trim_end())?;
        }
        Ok(())
    }

    fn render_operand(&self, function: &FunctionInfo, address: usize, instruction: &Instruction) -> String {
        match instruction {
            Instruction::Load(slot) | Instruction::Store(slot) => usize::try_from(*slot)
                .ok()
                .and_then(|slot| function.locals.get(slot))
                .cloned()
                .unwrap_or_else(|| format!("@{slot}")),
            Instruction::Int(value) | Instruction::StackAdjust(value) => value.to_string(),
            Instruction::Jump(_) | Instruction::JumpIfFalse(_) => {
                match instruction.jump_target(address) {
                    Some(target) if target == self.code.len() as isize => "end".to_string(),
                    Some(target) => target.to_string(),
                    None => String::new(),
                }
            }
            Instruction::Call { argc, target } => {
                let callee = usize::try_from(*target)
                    .ok()
                    .and_then(|target| self.function_at(target))
                    .map(|callee| callee.name.clone())
                    .unwrap_or_else(|| format!("@{target}"));
                format!("{callee}, {argc}")
            }
            Instruction::Unary(_) | Instruction::Binary(_) | Instruction::Return | Instruction::Pop => {
                String::new()
            }
        }
    }
}
