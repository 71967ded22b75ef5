//! Lowers a [`Program`] into one flat [`CompiledUnit`].
//!
//! The compiler is a single [`Visitor`] pass. Each body (the top-level block
//! first, then every declared function) gets a fresh slot table and starts
//! with a `stack-adjust` whose count is only known once the body is done, so
//! that word, call targets and the end-of-body epilogue go through a pending
//! patch list resolved after the last body. `if`/`while` jumps are patched
//! as soon as the construct is closed.

use rustc_hash::FxHashMap;

use crate::ast::{Block, Expression, FunctionDecl, Operand, Program, SourcePosition, UnaryOperator};
use crate::bytecode::{CompiledUnit, FunctionInfo, Opcode, Word};
use crate::visit::Visitor;

mod error;

pub use error::{CompileError, CompileErrors};

/// Name of the implicit body built from the top-level statements.
pub const MAIN_FUNCTION: &str = "<main>";

pub fn compile(program: &Program) -> Result<CompiledUnit, CompileErrors> {
    let mut compiler = Compiler::new();
    compiler.declare_functions(&program.functions);
    compiler.compile_body(MAIN_FUNCTION, &[], &program.statements, SourcePosition::default());
    for function in &program.functions {
        compiler.compile_body(
            &function.name,
            &function.parameters,
            &function.body,
            function.position,
        );
    }
    compiler.finish()
}

#[derive(Debug, Clone, Copy)]
struct Signature {
    body: usize,
    arity: usize,
}

#[derive(Debug, Clone)]
enum PatchKind {
    LocalCount { body: usize },
    CallTarget { body: usize },
    EndOfStream,
}

#[derive(Debug, Clone)]
struct Patch {
    operand: usize,
    kind: PatchKind,
}

/// Variable name to slot mapping for the body being compiled.
#[derive(Debug, Default)]
struct SymbolTable {
    slots: FxHashMap<String, Word>,
    names: Vec<String>,
}

impl SymbolTable {
    fn lookup(&self, name: &str) -> Option<Word> {
        self.slots.get(name).copied()
    }

    fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    fn declare(&mut self, name: &str) -> Word {
        let slot = self.names.len() as Word;
        self.slots.insert(name.to_string(), slot);
        self.names.push(name.to_string());
        slot
    }
}

struct Compiler {
    code: Vec<Word>,
    symbols: SymbolTable,
    signatures: FxHashMap<String, Signature>,
    bodies: Vec<FunctionInfo>,
    patches: Vec<Patch>,
    errors: Vec<CompileError>,
}

impl Compiler {
    fn new() -> Self {
        Self {
            code: Vec::new(),
            symbols: SymbolTable::default(),
            signatures: FxHashMap::default(),
            bodies: Vec::new(),
            patches: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Registers every function up front so calls may precede declarations.
    fn declare_functions(&mut self, functions: &[FunctionDecl]) {
        for (index, function) in functions.iter().enumerate() {
            if self.signatures.contains_key(&function.name) {
                self.errors.push(CompileError::DuplicateFunction {
                    name: function.name.clone(),
                    position: function.position,
                });
                continue;
            }
            self.signatures.insert(
                function.name.clone(),
                Signature {
                    body: index + 1,
                    arity: function.parameters.len(),
                },
            );
        }
    }

    fn compile_body(
        &mut self,
        name: &str,
        parameters: &[String],
        block: &Block,
        position: SourcePosition,
    ) {
        let body = self.bodies.len();
        let address = self.code.len();
        self.symbols = SymbolTable::default();
        for parameter in parameters {
            if self.symbols.contains(parameter) {
                self.errors.push(CompileError::DuplicateDeclaration {
                    name: parameter.clone(),
                    position,
                });
                continue;
            }
            self.symbols.declare(parameter);
        }

        let adjust = self.emit1(Opcode::StackAdjust, 0);
        self.patches.push(Patch {
            operand: adjust,
            kind: PatchKind::LocalCount { body },
        });

        self.visit_block(block);

        let epilogue = self.emit1(Opcode::Jump, 0);
        self.patches.push(Patch {
            operand: epilogue,
            kind: PatchKind::EndOfStream,
        });

        let locals = std::mem::take(&mut self.symbols).names;
        log::trace!(
            "compiled body {name} at {address}: {} words, {} locals",
            self.code.len() - address,
            locals.len()
        );
        self.bodies.push(FunctionInfo {
            name: name.to_string(),
            address,
            end: self.code.len(),
            arity: parameters.len(),
            locals,
        });
    }

    fn finish(mut self) -> Result<CompiledUnit, CompileErrors> {
        if !self.errors.is_empty() {
            log::debug!("compilation failed with {} errors", self.errors.len());
            return Err(CompileErrors {
                errors: self.errors,
            });
        }

        let end = self.code.len();
        for patch in std::mem::take(&mut self.patches) {
            self.code[patch.operand] = match patch.kind {
                PatchKind::LocalCount { body } => self.bodies[body].locals.len() as Word,
                PatchKind::CallTarget { body } => self.bodies[body].address as Word,
                PatchKind::EndOfStream => (end - patch.operand) as Word,
            };
        }

        log::debug!(
            "compiled {} bodies into {} words",
            self.bodies.len(),
            self.code.len()
        );
        Ok(CompiledUnit {
            code: self.code,
            entry: 0,
            functions: self.bodies,
        })
    }

    fn emit(&mut self, opcode: Opcode) {
        self.code.push(opcode.word());
    }

    /// Emits an opcode with one immediate and returns the immediate's index.
    fn emit1(&mut self, opcode: Opcode, operand: Word) -> usize {
        self.code.push(opcode.word());
        self.code.push(operand);
        self.code.len() - 1
    }

    fn emit_jump(&mut self, opcode: Opcode) -> usize {
        self.emit1(opcode, 0)
    }

    /// Points the jump whose offset lives at `operand` to the next emitted word.
    fn patch_jump(&mut self, operand: usize) {
        self.code[operand] = (self.code.len() - operand) as Word;
    }

    fn slot_of(&mut self, name: &str, position: SourcePosition) -> Option<Word> {
        let slot = self.symbols.lookup(name);
        if slot.is_none() {
            self.errors.push(CompileError::UndeclaredVariable {
                name: name.to_string(),
                position,
            });
        }
        slot
    }
}

impl Visitor for Compiler {
    type Output = ();

    fn visit_declaration(&mut self, name: &str, initializer: &Operand, position: SourcePosition) {
        let duplicate = self.symbols.contains(name);
        if duplicate {
            self.errors.push(CompileError::DuplicateDeclaration {
                name: name.to_string(),
                position,
            });
        }
        self.visit_operand(initializer);
        let slot = match self.symbols.lookup(name) {
            Some(slot) if duplicate => slot,
            _ => self.symbols.declare(name),
        };
        self.emit1(Opcode::Store, slot);
    }

    fn visit_assignment(&mut self, target: &str, value: &Operand, position: SourcePosition) {
        self.visit_operand(value);
        if let Some(slot) = self.slot_of(target, position) {
            self.emit1(Opcode::Store, slot);
        }
    }

    fn visit_if(&mut self, condition: &Operand, then_branch: &Block, else_branch: Option<&Block>) {
        self.visit_operand(condition);
        let skip = self.emit_jump(Opcode::JumpIfFalse);
        self.visit_block(then_branch);
        match else_branch {
            Some(else_branch) => {
                let exit = self.emit_jump(Opcode::Jump);
                self.patch_jump(skip);
                self.visit_block(else_branch);
                self.patch_jump(exit);
            }
            None => self.patch_jump(skip),
        }
    }

    fn visit_while(&mut self, condition: &Operand, body: &Block) {
        let loop_start = self.code.len();
        self.visit_operand(condition);
        let exit = self.emit_jump(Opcode::JumpIfFalse);
        self.visit_block(body);
        let back = self.emit_jump(Opcode::Jump);
        self.code[back] = loop_start as Word - back as Word;
        self.patch_jump(exit);
    }

    fn visit_expression_statement(&mut self, value: &Operand) {
        self.visit_operand(value);
        self.emit(Opcode::Pop);
    }

    fn visit_return(&mut self, value: &Operand, _position: SourcePosition) {
        self.visit_operand(value);
        self.emit(Opcode::Return);
    }

    fn visit_int_literal(&mut self, value: i64) {
        self.emit1(Opcode::Int, value);
    }

    fn visit_variable(&mut self, name: &str, position: SourcePosition) {
        match self.slot_of(name, position) {
            Some(slot) => self.emit1(Opcode::Load, slot),
            None => self.emit1(Opcode::Int, 0),
        };
    }

    fn visit_unary(&mut self, operator: UnaryOperator, operand: &Operand) {
        self.visit_operand(operand);
        self.emit(Opcode::from(operator));
    }

    fn visit_expression(&mut self, expression: &Expression) {
        self.visit_operand(&expression.first);
        for operation in &expression.rest {
            self.visit_operand(&operation.operand);
            self.emit(Opcode::from(operation.operator));
        }
    }

    fn visit_call(&mut self, name: &str, args: &[Operand], position: SourcePosition) {
        for arg in args {
            self.visit_operand(arg);
        }
        let Some(signature) = self.signatures.get(name).copied() else {
            self.errors.push(CompileError::UndefinedFunction {
                name: name.to_string(),
                position,
            });
            return;
        };
        if signature.arity != args.len() {
            self.errors.push(CompileError::ArityMismatch {
                name: name.to_string(),
                expected: signature.arity,
                found: args.len(),
                position,
            });
            return;
        }
        self.emit(Opcode::Call);
        self.code.push(args.len() as Word);
        self.code.push(0);
        self.patches.push(Patch {
            operand: self.code.len() - 1,
            kind: PatchKind::CallTarget {
                body: signature.body,
            },
        });
    }
}
