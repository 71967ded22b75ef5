//! Evaluation rules for the unary and binary opcode families.
//!
//! Arithmetic wraps on overflow. Division and remainder by zero fault, as do
//! shift amounts outside `0..64`. Comparisons and logical operators yield
//! `0` or `1`.

use crate::bytecode::{Opcode, Word};

use super::error::{VmError, VmResult};

pub(super) fn unary(opcode: Opcode, value: Word) -> Option<Word> {
    let result = match opcode {
        Opcode::Pos => value,
        Opcode::Neg => value.wrapping_neg(),
        Opcode::LogicalNot => Word::from(value == 0),
        Opcode::BitNot => !value,
        _ => return None,
    };
    Some(result)
}

pub(super) fn binary(opcode: Opcode, left: Word, right: Word, address: usize) -> VmResult<Word> {
    let result = match opcode {
        Opcode::Add => left.wrapping_add(right),
        Opcode::Sub => left.wrapping_sub(right),
        Opcode::Mul => left.wrapping_mul(right),
        Opcode::Div => {
            if right == 0 {
                return Err(VmError::DivisionByZero { address });
            }
            left.wrapping_div(right)
        }
        Opcode::Mod => {
            if right == 0 {
                return Err(VmError::DivisionByZero { address });
            }
            left.wrapping_rem(right)
        }
        Opcode::ShiftLeft => left << shift_amount(right, address)?,
        Opcode::ShiftRight => left >> shift_amount(right, address)?,
        Opcode::BitAnd => left & right,
        Opcode::BitOr => left | right,
        Opcode::BitXor => left ^ right,
        Opcode::Eq => Word::from(left == right),
        Opcode::Neq => Word::from(left != right),
        Opcode::Lt => Word::from(left < right),
        Opcode::Lte => Word::from(left <= right),
        Opcode::Gt => Word::from(left > right),
        Opcode::Gte => Word::from(left >= right),
        Opcode::LogicalAnd => Word::from(left != 0 && right != 0),
        Opcode::LogicalOr => Word::from(left != 0 || right != 0),
        _ => {
            return Err(VmError::InvalidOpcode {
                word: opcode.word(),
                address,
            });
        }
    };
    Ok(result)
}

fn shift_amount(amount: Word, address: usize) -> VmResult<u32> {
    u32::try_from(amount)
        .ok()
        .filter(|amount| *amount < Word::BITS)
        .ok_or(VmError::InvalidShift { amount, address })
}
