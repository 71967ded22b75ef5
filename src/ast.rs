//! Syntax tree consumed by the normalizer and the bytecode compiler.
//!
//! A frontend builds these nodes once. The normalizer rewrites expression
//! chains in place, then the compiler lowers the tree into bytecode and the
//! tree is dropped.

use std::fmt;

/// Byte span of the source text a node was parsed from.
///
/// Only used to tag diagnostics; it never influences execution.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash)]
pub struct SourcePosition {
    pub start: usize,
    pub end: usize,
}

impl SourcePosition {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum UnaryOperator {
    Plus,
    Minus,
    Not,
    BitNot,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Plus => "+",
            UnaryOperator::Minus => "-",
            UnaryOperator::Not => "!",
            UnaryOperator::BitNot => "~",
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOperator {
    pub const ALL: [BinaryOperator; 18] = [
        BinaryOperator::Add,
        BinaryOperator::Sub,
        BinaryOperator::Mul,
        BinaryOperator::Div,
        BinaryOperator::Mod,
        BinaryOperator::BitAnd,
        BinaryOperator::BitOr,
        BinaryOperator::BitXor,
        BinaryOperator::ShiftLeft,
        BinaryOperator::ShiftRight,
        BinaryOperator::Equal,
        BinaryOperator::NotEqual,
        BinaryOperator::Less,
        BinaryOperator::LessEqual,
        BinaryOperator::Greater,
        BinaryOperator::GreaterEqual,
        BinaryOperator::LogicalAnd,
        BinaryOperator::LogicalOr,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::ShiftLeft => "<<",
            BinaryOperator::ShiftRight => ">>",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::LogicalAnd => "&&",
            BinaryOperator::LogicalOr => "||",
        }
    }
}

/// One `(operator, operand)` link in an expression chain.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Operation {
    pub operator: BinaryOperator,
    pub operand: Operand,
}

/// A left-to-right chain of operations at one precedence tier.
///
/// An empty `rest` means the chain is just `first`; the normalizer removes
/// those.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Expression {
    pub first: Box<Operand>,
    pub rest: Vec<Operation>,
}

impl Expression {
    pub fn new(first: Operand, rest: Vec<Operation>) -> Self {
        Self {
            first: Box::new(first),
            rest,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.rest.is_empty()
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Operand {
    IntLiteral(i64),
    VariableRef {
        name: String,
        position: SourcePosition,
    },
    UnaryOp {
        operator: UnaryOperator,
        operand: Box<Operand>,
    },
    Expression(Expression),
    Grouped(Expression),
    Call {
        name: String,
        args: Vec<Operand>,
        position: SourcePosition,
    },
}

impl Operand {
    pub fn int(value: i64) -> Self {
        Operand::IntLiteral(value)
    }

    pub fn var(name: impl Into<String>) -> Self {
        Operand::VariableRef {
            name: name.into(),
            position: SourcePosition::default(),
        }
    }

    pub fn var_at(name: impl Into<String>, position: SourcePosition) -> Self {
        Operand::VariableRef {
            name: name.into(),
            position,
        }
    }

    pub fn unary(operator: UnaryOperator, operand: Operand) -> Self {
        Operand::UnaryOp {
            operator,
            operand: Box::new(operand),
        }
    }

    /// Builds a chain from `first` and trailing `(operator, operand)` pairs.
    pub fn chain(
        first: Operand,
        rest: impl IntoIterator<Item = (BinaryOperator, Operand)>,
    ) -> Self {
        Operand::Expression(Expression::new(first, operations(rest)))
    }

    /// Shorthand for the two-operand chain `left op right`.
    pub fn binary(left: Operand, operator: BinaryOperator, right: Operand) -> Self {
        Operand::chain(left, [(operator, right)])
    }

    pub fn grouped(
        first: Operand,
        rest: impl IntoIterator<Item = (BinaryOperator, Operand)>,
    ) -> Self {
        Operand::Grouped(Expression::new(first, operations(rest)))
    }

    pub fn call(name: impl Into<String>, args: Vec<Operand>) -> Self {
        Operand::Call {
            name: name.into(),
            args,
            position: SourcePosition::default(),
        }
    }
}

fn operations(rest: impl IntoIterator<Item = (BinaryOperator, Operand)>) -> Vec<Operation> {
    rest.into_iter()
        .map(|(operator, operand)| Operation { operator, operand })
        .collect()
}

/// Ordered statements sharing the scope of their enclosing function.
pub type Block = Vec<Statement>;

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Statement {
    VariableDeclaration {
        name: String,
        initializer: Operand,
        position: SourcePosition,
    },
    Assignment {
        target: String,
        value: Operand,
        position: SourcePosition,
    },
    If {
        condition: Operand,
        then_branch: Block,
        else_branch: Option<Block>,
        position: SourcePosition,
    },
    While {
        condition: Operand,
        body: Block,
        position: SourcePosition,
    },
    ExpressionStatement {
        value: Operand,
        position: SourcePosition,
    },
    Return {
        value: Operand,
        position: SourcePosition,
    },
}

impl Statement {
    pub fn declare(name: impl Into<String>, initializer: Operand) -> Self {
        Statement::VariableDeclaration {
            name: name.into(),
            initializer,
            position: SourcePosition::default(),
        }
    }

    pub fn assign(target: impl Into<String>, value: Operand) -> Self {
        Statement::Assignment {
            target: target.into(),
            value,
            position: SourcePosition::default(),
        }
    }

    pub fn if_else(condition: Operand, then_branch: Block, else_branch: Option<Block>) -> Self {
        Statement::If {
            condition,
            then_branch,
            else_branch,
            position: SourcePosition::default(),
        }
    }

    pub fn while_loop(condition: Operand, body: Block) -> Self {
        Statement::While {
            condition,
            body,
            position: SourcePosition::default(),
        }
    }

    pub fn expr(value: Operand) -> Self {
        Statement::ExpressionStatement {
            value,
            position: SourcePosition::default(),
        }
    }

    pub fn ret(value: Operand) -> Self {
        Statement::Return {
            value,
            position: SourcePosition::default(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub parameters: Vec<String>,
    pub body: Block,
    pub position: SourcePosition,
}

impl FunctionDecl {
    pub fn new(name: impl Into<String>, parameters: &[&str], body: Block) -> Self {
        Self {
            name: name.into(),
            parameters: parameters.iter().map(|param| param.to_string()).collect(),
            body,
            position: SourcePosition::default(),
        }
    }
}

/// Declared functions plus the top-level statements that form the entry point.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct Program {
    pub functions: Vec<FunctionDecl>,
    pub statements: Block,
}

impl Program {
    pub fn new(functions: Vec<FunctionDecl>, statements: Block) -> Self {
        Self {
            functions,
            statements,
        }
    }

    /// A program with no declared functions.
    pub fn main(statements: Block) -> Self {
        Self::new(Vec::new(), statements)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::IntLiteral(value) => write!(f, "{value}"),
            Operand::VariableRef { name, .. } => f.write_str(name),
            Operand::UnaryOp { operator, operand } => {
                write!(f, "({}{})", operator.symbol(), operand)
            }
            Operand::Expression(expression) => write!(f, "{expression}"),
            Operand::Grouped(expression) => write!(f, "group{expression}"),
            Operand::Call { name, args, .. } => {
                write!(f, "{name}(")?;
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.first)?;
        for operation in &self.rest {
            write!(f, " {} {}", operation.operator.symbol(), operation.operand)?;
        }
        f.write_str(")")
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, block: &Block) -> fmt::Result {
    f.write_str("{")?;
    for statement in block {
        write!(f, " {statement}")?;
    }
    f.write_str(" }")
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::VariableDeclaration {
                name, initializer, ..
            } => write!(f, "var {name} = {initializer};"),
            Statement::Assignment { target, value, .. } => write!(f, "{target} = {value};"),
            Statement::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                write!(f, "if ({condition}) ")?;
                write_block(f, then_branch)?;
                if let Some(else_branch) = else_branch {
                    f.write_str(" else ")?;
                    write_block(f, else_branch)?;
                }
                Ok(())
            }
            Statement::While {
                condition, body, ..
            } => {
                write!(f, "while ({condition}) ")?;
                write_block(f, body)
            }
            Statement::ExpressionStatement { value, .. } => write!(f, "{value};"),
            Statement::Return { value, .. } => write!(f, "return {value};"),
        }
    }
}

impl fmt::Display for FunctionDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "func {}({}) ", self.name, self.parameters.join(", "))?;
        write_block(f, &self.body)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for function in &self.functions {
            writeln!(f, "{function}")?;
        }
        for statement in &self.statements {
            writeln!(f, "{statement}")?;
        }
        Ok(())
    }
}
