//! Collapses degenerate expression chains produced by precedence climbing.
//!
//! After the pass, no `Expression` node has an empty `rest` and no `Grouped`
//! node remains. Non-empty chains stay as left-associative chains.

use crate::ast::{Expression, Operand, Program};
use crate::visit::{VisitorMut, walk_operand_mut};

#[derive(Debug, Default)]
pub struct ExpressionCollapse {
    collapsed: usize,
}

impl ExpressionCollapse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes replaced so far.
    pub fn collapsed(&self) -> usize {
        self.collapsed
    }
}

impl VisitorMut for ExpressionCollapse {
    fn visit_operand_mut(&mut self, operand: &mut Operand) {
        walk_operand_mut(self, operand);
        let replacement = match operand {
            Operand::Grouped(expression) => {
                Some(collapse(std::mem::replace(expression, placeholder())))
            }
            Operand::Expression(expression) if expression.is_degenerate() => {
                Some(collapse(std::mem::replace(expression, placeholder())))
            }
            _ => None,
        };
        if let Some(replacement) = replacement {
            self.collapsed += 1;
            *operand = replacement;
        }
    }
}

/// Turns an already-normalized chain into its collapsed operand.
fn collapse(expression: Expression) -> Operand {
    if expression.rest.is_empty() {
        *expression.first
    } else {
        Operand::Expression(expression)
    }
}

fn placeholder() -> Expression {
    Expression::new(Operand::IntLiteral(0), Vec::new())
}

pub fn normalize_operand(operand: &mut Operand) {
    ExpressionCollapse::new().visit_operand_mut(operand);
}

pub fn normalize_program(program: &mut Program) {
    let mut pass = ExpressionCollapse::new();
    pass.visit_program_mut(program);
    log::debug!("normalized program: {} nodes collapsed", pass.collapsed());
}
