//! Flat instruction encoding shared by the compiler and the VM.
//!
//! Every instruction is an opcode word followed by zero, one or two immediate
//! words. Unary and binary opcodes carry a class bit so the interpreter can
//! route a whole family with one test before looking at the exact operator.

use thiserror::Error;

use crate::ast::{BinaryOperator, UnaryOperator};

mod listing;

/// One cell of the instruction stream and of the operand stack.
pub type Word = i64;

pub const UNARY_FLAG: Word = 1 << 31;
pub const BINARY_FLAG: Word = 1 << 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum Opcode {
    Pos = 1 | UNARY_FLAG,
    Neg = 2 | UNARY_FLAG,
    LogicalNot = 3 | UNARY_FLAG,
    BitNot = 4 | UNARY_FLAG,

    Add = 5 | BINARY_FLAG,
    Sub = 6 | BINARY_FLAG,
    Mul = 7 | BINARY_FLAG,
    Div = 8 | BINARY_FLAG,
    Mod = 9 | BINARY_FLAG,

    Eq = 10 | BINARY_FLAG,
    Neq = 11 | BINARY_FLAG,
    Lt = 12 | BINARY_FLAG,
    Lte = 13 | BINARY_FLAG,
    Gt = 14 | BINARY_FLAG,
    Gte = 15 | BINARY_FLAG,

    BitOr = 16 | BINARY_FLAG,
    BitXor = 17 | BINARY_FLAG,
    BitAnd = 18 | BINARY_FLAG,
    ShiftLeft = 19 | BINARY_FLAG,
    ShiftRight = 20 | BINARY_FLAG,

    LogicalAnd = 21 | BINARY_FLAG,
    LogicalOr = 22 | BINARY_FLAG,

    Load = 23,
    Store = 24,
    Int = 25,
    JumpIfFalse = 26,
    Jump = 27,
    StackAdjust = 28,
    Call = 29,
    Return = 30,
    Pop = 31,
}

impl Opcode {
    const ALL: [Opcode; 31] = [
        Opcode::Pos,
        Opcode::Neg,
        Opcode::LogicalNot,
        Opcode::BitNot,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Mod,
        Opcode::Eq,
        Opcode::Neq,
        Opcode::Lt,
        Opcode::Lte,
        Opcode::Gt,
        Opcode::Gte,
        Opcode::BitOr,
        Opcode::BitXor,
        Opcode::BitAnd,
        Opcode::ShiftLeft,
        Opcode::ShiftRight,
        Opcode::LogicalAnd,
        Opcode::LogicalOr,
        Opcode::Load,
        Opcode::Store,
        Opcode::Int,
        Opcode::JumpIfFalse,
        Opcode::Jump,
        Opcode::StackAdjust,
        Opcode::Call,
        Opcode::Return,
        Opcode::Pop,
    ];

    /// Opcode numbers are dense from 1, so the low bits index `ALL` directly.
    pub fn from_word(word: Word) -> Option<Self> {
        let number = word & !(UNARY_FLAG | BINARY_FLAG);
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        Self::ALL
            .get(index)
            .copied()
            .filter(|opcode| opcode.word() == word)
    }

    pub fn word(self) -> Word {
        self as Word
    }

    pub fn is_unary(self) -> bool {
        self.word() & UNARY_FLAG != 0
    }

    pub fn is_binary(self) -> bool {
        self.word() & BINARY_FLAG != 0
    }

    /// Number of immediate words following the opcode.
    pub fn immediates(self) -> usize {
        match self {
            Opcode::Load
            | Opcode::Store
            | Opcode::Int
            | Opcode::JumpIfFalse
            | Opcode::Jump
            | Opcode::StackAdjust => 1,
            Opcode::Call => 2,
            _ => 0,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Pos => "op_pos",
            Opcode::Neg => "op_neg",
            Opcode::LogicalNot => "op_lognot",
            Opcode::BitNot => "op_bitnot",
            Opcode::Add => "op_add",
            Opcode::Sub => "op_sub",
            Opcode::Mul => "op_mul",
            Opcode::Div => "op_div",
            Opcode::Mod => "op_mod",
            Opcode::Eq => "op_eq",
            Opcode::Neq => "op_neq",
            Opcode::Lt => "op_lt",
            Opcode::Lte => "op_lte",
            Opcode::Gt => "op_gt",
            Opcode::Gte => "op_gte",
            Opcode::BitOr => "op_bitwise_or",
            Opcode::BitXor => "op_bitwise_xor",
            Opcode::BitAnd => "op_bitwise_and",
            Opcode::ShiftLeft => "op_shift_left",
            Opcode::ShiftRight => "op_shift_right",
            Opcode::LogicalAnd => "op_logical_and",
            Opcode::LogicalOr => "op_logical_or",
            Opcode::Load => "op_load",
            Opcode::Store => "op_store",
            Opcode::Int => "op_int",
            Opcode::JumpIfFalse => "op_jump_if",
            Opcode::Jump => "op_jump",
            Opcode::StackAdjust => "op_stk_adj",
            Opcode::Call => "op_call",
            Opcode::Return => "op_return",
            Opcode::Pop => "op_pop",
        }
    }
}

impl From<UnaryOperator> for Opcode {
    fn from(operator: UnaryOperator) -> Self {
        match operator {
            UnaryOperator::Plus => Opcode::Pos,
            UnaryOperator::Minus => Opcode::Neg,
            UnaryOperator::Not => Opcode::LogicalNot,
            UnaryOperator::BitNot => Opcode::BitNot,
        }
    }
}

impl From<BinaryOperator> for Opcode {
    fn from(operator: BinaryOperator) -> Self {
        match operator {
            BinaryOperator::Add => Opcode::Add,
            BinaryOperator::Sub => Opcode::Sub,
            BinaryOperator::Mul => Opcode::Mul,
            BinaryOperator::Div => Opcode::Div,
            BinaryOperator::Mod => Opcode::Mod,
            BinaryOperator::BitAnd => Opcode::BitAnd,
            BinaryOperator::BitOr => Opcode::BitOr,
            BinaryOperator::BitXor => Opcode::BitXor,
            BinaryOperator::ShiftLeft => Opcode::ShiftLeft,
            BinaryOperator::ShiftRight => Opcode::ShiftRight,
            BinaryOperator::Equal => Opcode::Eq,
            BinaryOperator::NotEqual => Opcode::Neq,
            BinaryOperator::Less => Opcode::Lt,
            BinaryOperator::LessEqual => Opcode::Lte,
            BinaryOperator::Greater => Opcode::Gt,
            BinaryOperator::GreaterEqual => Opcode::Gte,
            BinaryOperator::LogicalAnd => Opcode::LogicalAnd,
            BinaryOperator::LogicalOr => Opcode::LogicalOr,
        }
    }
}

/// A decoded instruction with its immediates.
///
/// Jump offsets are relative to the address of the offset word itself, i.e.
/// the opcode address plus one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Unary(Opcode),
    Binary(Opcode),
    Load(Word),
    Store(Word),
    Int(Word),
    JumpIfFalse(Word),
    Jump(Word),
    StackAdjust(Word),
    Call { argc: Word, target: Word },
    Return,
    Pop,
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Unary(opcode) | Instruction::Binary(opcode) => *opcode,
            Instruction::Load(_) => Opcode::Load,
            Instruction::Store(_) => Opcode::Store,
            Instruction::Int(_) => Opcode::Int,
            Instruction::JumpIfFalse(_) => Opcode::JumpIfFalse,
            Instruction::Jump(_) => Opcode::Jump,
            Instruction::StackAdjust(_) => Opcode::StackAdjust,
            Instruction::Call { .. } => Opcode::Call,
            Instruction::Return => Opcode::Return,
            Instruction::Pop => Opcode::Pop,
        }
    }

    /// Encoded length in words.
    pub fn width(&self) -> usize {
        1 + self.opcode().immediates()
    }

    /// Absolute destination of a jump placed at `address`.
    pub fn jump_target(&self, address: usize) -> Option<isize> {
        match self {
            Instruction::Jump(offset) | Instruction::JumpIfFalse(offset) => {
                let offset = isize::try_from(*offset).ok()?;
                (address as isize).checked_add(1)?.checked_add(offset)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid opcode {word} at address {address}")]
    InvalidOpcode { word: Word, address: usize },
    #[error("Truncated instruction {mnemonic} at address {address}")]
    Truncated {
        mnemonic: &'static str,
        address: usize,
    },
    #[error("Address {address} is outside the instruction stream")]
    OutOfBounds { address: usize },
}

/// Decodes the instruction starting at `address`.
pub fn decode(code: &[Word], address: usize) -> Result<Instruction, DecodeError> {
    let word = *code
        .get(address)
        .ok_or(DecodeError::OutOfBounds { address })?;
    let opcode = Opcode::from_word(word).ok_or(DecodeError::InvalidOpcode { word, address })?;
    let immediates = code
        .get(address + 1..address + 1 + opcode.immediates())
        .ok_or(DecodeError::Truncated {
            mnemonic: opcode.mnemonic(),
            address,
        })?;
    let instruction = match opcode {
        _ if opcode.is_unary() => Instruction::Unary(opcode),
        _ if opcode.is_binary() => Instruction::Binary(opcode),
        Opcode::Load => Instruction::Load(immediates[0]),
        Opcode::Store => Instruction::Store(immediates[0]),
        Opcode::Int => Instruction::Int(immediates[0]),
        Opcode::JumpIfFalse => Instruction::JumpIfFalse(immediates[0]),
        Opcode::Jump => Instruction::Jump(immediates[0]),
        Opcode::StackAdjust => Instruction::StackAdjust(immediates[0]),
        Opcode::Call => Instruction::Call {
            argc: immediates[0],
            target: immediates[1],
        },
        Opcode::Return => Instruction::Return,
        _ => Instruction::Pop,
    };
    Ok(instruction)
}

/// Walks `code[start..end]` yielding `(address, instruction)` pairs.
pub struct Instructions<'a> {
    code: &'a [Word],
    address: usize,
    end: usize,
}

impl<'a> Instructions<'a> {
    pub fn new(code: &'a [Word]) -> Self {
        Self::range(code, 0, code.len())
    }

    pub fn range(code: &'a [Word], start: usize, end: usize) -> Self {
        Self {
            code,
            address: start,
            end: end.min(code.len()),
        }
    }
}

impl Iterator for Instructions<'_> {
    type Item = Result<(usize, Instruction), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.address >= self.end {
            return None;
        }
        let address = self.address;
        match decode(self.code, address) {
            Ok(instruction) => {
                self.address += instruction.width();
                Some(Ok((address, instruction)))
            }
            Err(err) => {
                self.address = self.end;
                Some(Err(err))
            }
        }
    }
}

/// Layout of one compiled body inside the instruction stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: String,
    pub address: usize,
    pub end: usize,
    pub arity: usize,
    /// Slot names, indexed by slot.
    pub locals: Vec<String>,
}

impl FunctionInfo {
    pub fn contains(&self, address: usize) -> bool {
        (self.address..self.end).contains(&address)
    }
}

/// Output of the compiler: one flat stream holding every body.
///
/// The top-level body always starts at address 0 and is listed first in
/// `functions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUnit {
    pub code: Vec<Word>,
    pub entry: usize,
    pub functions: Vec<FunctionInfo>,
}

impl CompiledUnit {
    pub fn instructions(&self) -> Instructions<'_> {
        Instructions::new(&self.code)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.iter().find(|function| function.name == name)
    }

    pub fn function_at(&self, address: usize) -> Option<&FunctionInfo> {
        self.functions
            .iter()
            .find(|function| function.address == address)
    }

    pub fn enclosing_function(&self, address: usize) -> Option<&FunctionInfo> {
        self.functions
            .iter()
            .find(|function| function.contains(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_bits_partition_operator_opcodes() {
        for opcode in Opcode::ALL {
            assert!(!(opcode.is_unary() && opcode.is_binary()));
            assert_eq!(Opcode::from_word(opcode.word()), Some(opcode));
        }
        assert!(Opcode::Neg.is_unary());
        assert!(Opcode::LogicalOr.is_binary());
        assert!(!Opcode::Jump.is_unary() && !Opcode::Jump.is_binary());
        for operator in BinaryOperator::ALL {
            assert!(Opcode::from(operator).is_binary());
        }
    }

    #[test]
    fn decodes_immediates_and_widths() {
        let code = vec![
            Opcode::Int.word(),
            42,
            Opcode::Call.word(),
            1,
            9,
            Opcode::Add.word(),
            Opcode::Jump.word(),
            -3,
        ];
        let decoded = Instructions::new(&code)
            .collect::<Result<Vec<_>, _>>()
            .expect("decode should succeed");
        assert_eq!(
            decoded,
            vec![
                (0, Instruction::Int(42)),
                (2, Instruction::Call { argc: 1, target: 9 }),
                (5, Instruction::Binary(Opcode::Add)),
                (6, Instruction::Jump(-3)),
            ]
        );
        assert_eq!(decoded[3].1.jump_target(6), Some(4));
    }

    #[test]
    fn jump_targets_do_not_overflow() {
        assert_eq!(Instruction::Jump(Word::MAX).jump_target(0), None);
        assert_eq!(
            Instruction::JumpIfFalse(Word::MIN).jump_target(5),
            Some(Word::MIN as isize + 6)
        );
        assert_eq!(Instruction::Int(1).jump_target(0), None);
    }

    #[test]
    fn rejects_unknown_and_truncated_words() {
        assert_eq!(
            decode(&[99], 0),
            Err(DecodeError::InvalidOpcode {
                word: 99,
                address: 0
            })
        );
        assert_eq!(
            decode(&[Opcode::Call.word(), 1], 0),
            Err(DecodeError::Truncated {
                mnemonic: "op_call",
                address: 0
            })
        );
        assert_eq!(decode(&[], 0), Err(DecodeError::OutOfBounds { address: 0 }));
    }
}
