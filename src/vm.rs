//! Stack virtual machine for compiled units.
//!
//! One operand stack of fixed capacity is allocated when the Vm is built and
//! reused for every run. Each active call owns a frame: its locals start at
//! the frame base and its temporaries sit above them. A `call` runs the
//! callee through a nested invocation of the same dispatch loop, with the
//! callee's frame starting at the caller's pushed arguments.

use crate::bytecode::{BINARY_FLAG, Opcode, UNARY_FLAG, Word};
use crate::config::{MAX_CALL_DEPTH_LIMIT, VmConfig};

mod error;
mod ops;

pub use error::{VmError, VmResult};

/// Index into the operand stack.
pub type StackCursor = usize;

/// Bookkeeping for one active invocation of the dispatch loop.
#[derive(Debug, Clone, Copy)]
struct Frame {
    base: StackCursor,
    locals: usize,
    top: StackCursor,
}

impl Frame {
    /// Lowest cursor a pop may uncover.
    fn floor(&self) -> StackCursor {
        self.base + self.locals
    }
}

pub struct Vm {
    stack: Vec<Word>,
    config: VmConfig,
    depth: usize,
}

impl Vm {
    pub fn new(config: VmConfig) -> Self {
        Self {
            stack: vec![0; config.stack_capacity],
            config,
            depth: 0,
        }
    }

    /// Raw view of the whole operand stack, for inspecting locals after a run.
    pub fn stack(&self) -> &[Word] {
        &self.stack
    }

    /// Runs `code` from address 0 with a fresh frame at the base of the stack.
    pub fn execute(&mut self, code: &[Word]) -> VmResult<Word> {
        self.execute_at(code, 0, 0)
    }

    pub fn execute_at(&mut self, code: &[Word], entry: usize, frame: StackCursor) -> VmResult<Word> {
        if frame > self.stack.len() {
            return Err(VmError::StackOverflow {
                capacity: self.stack.len(),
            });
        }
        log::debug!("executing {} words from address {entry}", code.len());
        self.depth = 0;
        let result = self.invoke(code, entry, frame, frame);
        match &result {
            Ok(value) => log::debug!("execution returned {value}"),
            Err(err) => log::debug!("execution faulted: {err}"),
        }
        result
    }

    fn invoke(
        &mut self,
        code: &[Word],
        entry: usize,
        base: StackCursor,
        top: StackCursor,
    ) -> VmResult<Word> {
        let mut frame = Frame {
            base,
            locals: 0,
            top,
        };
        let mut pc = entry;

        loop {
            let address = pc;
            let word = match code.get(pc) {
                Some(word) => *word,
                None => return Err(VmError::FellOffEnd { address }),
            };
            pc += 1;

            if word & UNARY_FLAG != 0 {
                let opcode = Self::opcode(word, address)?;
                let value = self.pop(&mut frame, address)?;
                let result = ops::unary(opcode, value)
                    .ok_or(VmError::InvalidOpcode { word, address })?;
                self.push(&mut frame, result)?;
                continue;
            }

            if word & BINARY_FLAG != 0 {
                let opcode = Self::opcode(word, address)?;
                let right = self.pop(&mut frame, address)?;
                let left = self.pop(&mut frame, address)?;
                let result = ops::binary(opcode, left, right, address)?;
                self.push(&mut frame, result)?;
                continue;
            }

            match Self::opcode(word, address)? {
                Opcode::Load => {
                    let slot = Self::immediate(code, &mut pc, address)?;
                    let index = Self::slot_index(&frame, slot, address)?;
                    let value = self.stack[index];
                    self.push(&mut frame, value)?;
                }
                Opcode::Store => {
                    let slot = Self::immediate(code, &mut pc, address)?;
                    let index = Self::slot_index(&frame, slot, address)?;
                    self.stack[index] = self.pop(&mut frame, address)?;
                }
                Opcode::Int => {
                    let value = Self::immediate(code, &mut pc, address)?;
                    self.push(&mut frame, value)?;
                }
                Opcode::JumpIfFalse => {
                    let condition = self.pop(&mut frame, address)?;
                    if condition == 0 {
                        pc = Self::jump_target(code, pc, address)?;
                    } else {
                        Self::immediate(code, &mut pc, address)?;
                    }
                }
                Opcode::Jump => {
                    pc = Self::jump_target(code, pc, address)?;
                }
                Opcode::StackAdjust => {
                    let count = Self::immediate(code, &mut pc, address)?;
                    self.adjust(&mut frame, count, address)?;
                }
                Opcode::Call => {
                    let argc = Self::immediate(code, &mut pc, address)?;
                    let target = Self::immediate(code, &mut pc, address)?;
                    let value = self.call(code, &frame, argc, target, address)?;
                    frame.top -= argc as usize;
                    self.push(&mut frame, value)?;
                }
                Opcode::Return => return self.pop(&mut frame, address),
                Opcode::Pop => {
                    self.pop(&mut frame, address)?;
                }
                _ => return Err(VmError::InvalidOpcode { word, address }),
            }
        }
    }

    fn call(
        &mut self,
        code: &[Word],
        frame: &Frame,
        argc: Word,
        target: Word,
        address: usize,
    ) -> VmResult<Word> {
        let argc = usize::try_from(argc)
            .ok()
            .filter(|argc| frame.top - frame.floor() >= *argc)
            .ok_or(VmError::StackUnderflow { address })?;
        let entry = usize::try_from(target)
            .ok()
            .filter(|entry| *entry < code.len())
            .ok_or(VmError::InvalidJumpTarget {
                target: target as isize,
                address,
            })?;
        let limit = self.config.max_call_depth.min(MAX_CALL_DEPTH_LIMIT);
        if self.depth >= limit {
            return Err(VmError::CallDepthExceeded { limit });
        }

        log::trace!("call {entry} with {argc} args at depth {}", self.depth + 1);
        self.depth += 1;
        let result = self.invoke(code, entry, frame.top - argc, frame.top);
        self.depth -= 1;
        result
    }

    /// Sizes the local region to `count` slots, zeroing slots not already
    /// holding arguments.
    fn adjust(&mut self, frame: &mut Frame, count: Word, address: usize) -> VmResult<()> {
        let count = usize::try_from(count)
            .map_err(|_| VmError::InvalidStackAdjust { count, address })?;
        let top = frame.base + count;
        if top > self.stack.len() {
            return Err(VmError::StackOverflow {
                capacity: self.stack.len(),
            });
        }
        if top > frame.top {
            self.stack[frame.top..top].fill(0);
        }
        frame.locals = count;
        frame.top = top;
        Ok(())
    }

    fn push(&mut self, frame: &mut Frame, value: Word) -> VmResult<()> {
        let slot = self.stack.get_mut(frame.top).ok_or(VmError::StackOverflow {
            capacity: self.config.stack_capacity,
        })?;
        *slot = value;
        frame.top += 1;
        Ok(())
    }

    fn pop(&mut self, frame: &mut Frame, address: usize) -> VmResult<Word> {
        if frame.top <= frame.floor() {
            return Err(VmError::StackUnderflow { address });
        }
        frame.top -= 1;
        Ok(self.stack[frame.top])
    }

    fn opcode(word: Word, address: usize) -> VmResult<Opcode> {
        Opcode::from_word(word).ok_or(VmError::InvalidOpcode { word, address })
    }

    fn immediate(code: &[Word], pc: &mut usize, address: usize) -> VmResult<Word> {
        let value = *code
            .get(*pc)
            .ok_or(VmError::TruncatedInstruction { address })?;
        *pc += 1;
        Ok(value)
    }

    /// Resolves the jump whose offset word sits at `operand`.
    fn jump_target(code: &[Word], operand: usize, address: usize) -> VmResult<usize> {
        let offset = *code
            .get(operand)
            .ok_or(VmError::TruncatedInstruction { address })?;
        let target = isize::try_from(offset)
            .ok()
            .and_then(|offset| (operand as isize).checked_add(offset))
            .ok_or(VmError::InvalidJumpTarget {
                target: isize::MAX,
                address,
            })?;
        usize::try_from(target)
            .ok()
            .filter(|target| *target <= code.len())
            .ok_or(VmError::InvalidJumpTarget { target, address })
    }

    fn slot_index(frame: &Frame, slot: Word, address: usize) -> VmResult<usize> {
        usize::try_from(slot)
            .ok()
            .filter(|slot| *slot < frame.locals)
            .map(|slot| frame.base + slot)
            .ok_or(VmError::InvalidSlot { slot, address })
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new(VmConfig::default())
    }
}
