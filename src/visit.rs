//! Traversal framework shared by every pass over the syntax tree.
//!
//! A pass implements [`Visitor`] (read-only) or [`VisitorMut`] (in place) and
//! overrides only the node kinds it cares about. Every default method calls
//! the matching `walk_*` function, which recurses into the children and
//! returns the pass's default output. Passes are generic over the trait, so
//! each override is resolved at compile time.

use crate::ast::{
    Block, Expression, FunctionDecl, Operand, Program, SourcePosition, Statement, UnaryOperator,
};

pub trait Visitor {
    /// Identity result returned by nodes the pass does not override.
    type Output: Default;

    fn visit_program(&mut self, program: &Program) -> Self::Output {
        walk_program(self, program)
    }

    fn visit_function(&mut self, function: &FunctionDecl) -> Self::Output {
        walk_function(self, function)
    }

    fn visit_block(&mut self, block: &Block) -> Self::Output {
        walk_block(self, block)
    }

    fn visit_statement(&mut self, statement: &Statement) -> Self::Output {
        walk_statement(self, statement)
    }

    fn visit_declaration(
        &mut self,
        _name: &str,
        initializer: &Operand,
        _position: SourcePosition,
    ) -> Self::Output {
        walk_declaration(self, initializer)
    }

    fn visit_assignment(
        &mut self,
        _target: &str,
        value: &Operand,
        _position: SourcePosition,
    ) -> Self::Output {
        walk_assignment(self, value)
    }

    fn visit_if(
        &mut self,
        condition: &Operand,
        then_branch: &Block,
        else_branch: Option<&Block>,
    ) -> Self::Output {
        walk_if(self, condition, then_branch, else_branch)
    }

    fn visit_while(&mut self, condition: &Operand, body: &Block) -> Self::Output {
        walk_while(self, condition, body)
    }

    fn visit_expression_statement(&mut self, value: &Operand) -> Self::Output {
        walk_expression_statement(self, value)
    }

    fn visit_return(&mut self, value: &Operand, _position: SourcePosition) -> Self::Output {
        walk_return(self, value)
    }

    fn visit_operand(&mut self, operand: &Operand) -> Self::Output {
        walk_operand(self, operand)
    }

    fn visit_int_literal(&mut self, _value: i64) -> Self::Output {
        Self::Output::default()
    }

    fn visit_variable(&mut self, _name: &str, _position: SourcePosition) -> Self::Output {
        Self::Output::default()
    }

    fn visit_unary(&mut self, _operator: UnaryOperator, operand: &Operand) -> Self::Output {
        walk_unary(self, operand)
    }

    fn visit_expression(&mut self, expression: &Expression) -> Self::Output {
        walk_expression(self, expression)
    }

    fn visit_grouped(&mut self, expression: &Expression) -> Self::Output {
        self.visit_expression(expression)
    }

    fn visit_call(
        &mut self,
        _name: &str,
        args: &[Operand],
        _position: SourcePosition,
    ) -> Self::Output {
        walk_call(self, args)
    }
}

pub fn walk_program<V: Visitor + ?Sized>(visitor: &mut V, program: &Program) -> V::Output {
    for function in &program.functions {
        visitor.visit_function(function);
    }
    visitor.visit_block(&program.statements);
    V::Output::default()
}

pub fn walk_function<V: Visitor + ?Sized>(visitor: &mut V, function: &FunctionDecl) -> V::Output {
    visitor.visit_block(&function.body)
}

pub fn walk_block<V: Visitor + ?Sized>(visitor: &mut V, block: &Block) -> V::Output {
    for statement in block {
        visitor.visit_statement(statement);
    }
    V::Output::default()
}

pub fn walk_statement<V: Visitor + ?Sized>(visitor: &mut V, statement: &Statement) -> V::Output {
    match statement {
        Statement::VariableDeclaration {
            name,
            initializer,
            position,
        } => visitor.visit_declaration(name, initializer, *position),
        Statement::Assignment {
            target,
            value,
            position,
        } => visitor.visit_assignment(target, value, *position),
        Statement::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => visitor.visit_if(condition, then_branch, else_branch.as_ref()),
        Statement::While {
            condition, body, ..
        } => visitor.visit_while(condition, body),
        Statement::ExpressionStatement { value, .. } => visitor.visit_expression_statement(value),
        Statement::Return { value, position } => visitor.visit_return(value, *position),
    }
}

pub fn walk_declaration<V: Visitor + ?Sized>(visitor: &mut V, initializer: &Operand) -> V::Output {
    visitor.visit_operand(initializer);
    V::Output::default()
}

pub fn walk_assignment<V: Visitor + ?Sized>(visitor: &mut V, value: &Operand) -> V::Output {
    visitor.visit_operand(value);
    V::Output::default()
}

pub fn walk_if<V: Visitor + ?Sized>(
    visitor: &mut V,
    condition: &Operand,
    then_branch: &Block,
    else_branch: Option<&Block>,
) -> V::Output {
    visitor.visit_operand(condition);
    visitor.visit_block(then_branch);
    if let Some(else_branch) = else_branch {
        visitor.visit_block(else_branch);
    }
    V::Output::default()
}

pub fn walk_while<V: Visitor + ?Sized>(visitor: &mut V, condition: &Operand, body: &Block) -> V::Output {
    visitor.visit_operand(condition);
    visitor.visit_block(body);
    V::Output::default()
}

pub fn walk_expression_statement<V: Visitor + ?Sized>(visitor: &mut V, value: &Operand) -> V::Output {
    visitor.visit_operand(value);
    V::Output::default()
}

pub fn walk_return<V: Visitor + ?Sized>(visitor: &mut V, value: &Operand) -> V::Output {
    visitor.visit_operand(value);
    V::Output::default()
}

pub fn walk_unary<V: Visitor + ?Sized>(visitor: &mut V, operand: &Operand) -> V::Output {
    visitor.visit_operand(operand);
    V::Output::default()
}

pub fn walk_call<V: Visitor + ?Sized>(visitor: &mut V, args: &[Operand]) -> V::Output {
    for arg in args {
        visitor.visit_operand(arg);
    }
    V::Output::default()
}

pub fn walk_operand<V: Visitor + ?Sized>(visitor: &mut V, operand: &Operand) -> V::Output {
    match operand {
        Operand::IntLiteral(value) => visitor.visit_int_literal(*value),
        Operand::VariableRef { name, position } => visitor.visit_variable(name, *position),
        Operand::UnaryOp { operator, operand } => visitor.visit_unary(*operator, operand),
        Operand::Expression(expression) => visitor.visit_expression(expression),
        Operand::Grouped(expression) => visitor.visit_grouped(expression),
        Operand::Call {
            name,
            args,
            position,
        } => visitor.visit_call(name, args, *position),
    }
}

pub fn walk_expression<V: Visitor + ?Sized>(
    visitor: &mut V,
    expression: &Expression,
) -> V::Output {
    visitor.visit_operand(&expression.first);
    for operation in &expression.rest {
        visitor.visit_operand(&operation.operand);
    }
    V::Output::default()
}

/// In-place counterpart of [`Visitor`] for passes that rewrite the tree.
///
/// Operand rewrites go through [`VisitorMut::visit_operand_mut`], which owns
/// the slot and may replace the whole node.
pub trait VisitorMut {
    fn visit_program_mut(&mut self, program: &mut Program) {
        walk_program_mut(self, program);
    }

    fn visit_function_mut(&mut self, function: &mut FunctionDecl) {
        self.visit_block_mut(&mut function.body);
    }

    fn visit_block_mut(&mut self, block: &mut Block) {
        for statement in block.iter_mut() {
            self.visit_statement_mut(statement);
        }
    }

    fn visit_statement_mut(&mut self, statement: &mut Statement) {
        walk_statement_mut(self, statement);
    }

    fn visit_operand_mut(&mut self, operand: &mut Operand) {
        walk_operand_mut(self, operand);
    }

    fn visit_expression_mut(&mut self, expression: &mut Expression) {
        walk_expression_mut(self, expression);
    }
}

pub fn walk_program_mut<V: VisitorMut + ?Sized>(visitor: &mut V, program: &mut Program) {
    for function in &mut program.functions {
        visitor.visit_function_mut(function);
    }
    visitor.visit_block_mut(&mut program.statements);
}

pub fn walk_statement_mut<V: VisitorMut + ?Sized>(visitor: &mut V, statement: &mut Statement) {
    match statement {
        Statement::VariableDeclaration { initializer, .. } => {
            visitor.visit_operand_mut(initializer)
        }
        Statement::Assignment { value, .. }
        | Statement::ExpressionStatement { value, .. }
        | Statement::Return { value, .. } => visitor.visit_operand_mut(value),
        Statement::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            visitor.visit_operand_mut(condition);
            visitor.visit_block_mut(then_branch);
            if let Some(else_branch) = else_branch {
                visitor.visit_block_mut(else_branch);
            }
        }
        Statement::While {
            condition, body, ..
        } => {
            visitor.visit_operand_mut(condition);
            visitor.visit_block_mut(body);
        }
    }
}

pub fn walk_operand_mut<V: VisitorMut + ?Sized>(visitor: &mut V, operand: &mut Operand) {
    match operand {
        Operand::IntLiteral(_) | Operand::VariableRef { .. } => {}
        Operand::UnaryOp { operand, .. } => visitor.visit_operand_mut(operand),
        Operand::Expression(expression) | Operand::Grouped(expression) => {
            visitor.visit_expression_mut(expression)
        }
        Operand::Call { args, .. } => {
            for arg in args {
                visitor.visit_operand_mut(arg);
            }
        }
    }
}

pub fn walk_expression_mut<V: VisitorMut + ?Sized>(visitor: &mut V, expression: &mut Expression) {
    visitor.visit_operand_mut(&mut expression.first);
    for operation in &mut expression.rest {
        visitor.visit_operand_mut(&mut operation.operand);
    }
}
