//! Catalogue of sample programs with their expected outcomes.
//!
//! Shared by the in-crate harness, the integration tests and the benches so
//! every consumer exercises the same programs.

use crate::ast::{
    BinaryOperator as Bin, FunctionDecl, Operand, Program, Statement, UnaryOperator,
};
use crate::bytecode::Word;
use crate::config::VmConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// The top-level body returns this value.
    Value(Word),
    /// Compilation fails with a message containing this text.
    CompileError(&'static str),
    /// Execution faults with a message containing this text.
    Fault(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct Case {
    pub name: &'static str,
    pub build: fn() -> Program,
    pub config: VmConfig,
    pub expected: Expected,
    /// Long enough to be worth timing.
    pub bench: bool,
}

impl Case {
    fn new(name: &'static str, build: fn() -> Program, expected: Expected) -> Self {
        Self {
            name,
            build,
            config: VmConfig::default(),
            expected,
            bench: false,
        }
    }

    fn benched(mut self) -> Self {
        self.bench = true;
        self
    }

    fn with_config(mut self, config: VmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn program(&self) -> Program {
        (self.build)()
    }
}

pub fn cases() -> Vec<Case> {
    vec![
        Case::new("literal_return", literal_return, Expected::Value(7)),
        Case::new("grouped_precedence", grouped_precedence, Expected::Value(13)),
        Case::new("bitwise_chain", bitwise_chain, Expected::Value(1035)),
        Case::new("unary_and_logic", unary_and_logic, Expected::Value(-4)),
        Case::new("if_else", if_else, Expected::Value(10)),
        Case::new("while_sum", while_sum, Expected::Value(15)),
        Case::new("discarded_expressions", discarded_expressions, Expected::Value(7)),
        Case::new("if_literal_true", if_literal_true, Expected::Value(1)),
        Case::new("if_literal_false", if_literal_false, Expected::Value(2)),
        Case::new("factorial", factorial, Expected::Value(3_628_800)).benched(),
        Case::new("factorial_5", factorial_5, Expected::Value(120)),
        Case::new("factorial_0", factorial_0, Expected::Value(1)),
        Case::new("fibonacci", fibonacci, Expected::Value(610)).benched(),
        Case::new("gcd", gcd, Expected::Value(21)),
        Case::new("mutual_recursion", mutual_recursion, Expected::Value(1)),
        Case::new("count_loop", count_loop, Expected::Value(50_005_000)).benched(),
        Case::new(
            "undeclared_variable",
            undeclared_variable,
            Expected::CompileError("Undeclared variable 'y'"),
        ),
        Case::new(
            "use_before_declaration",
            use_before_declaration,
            Expected::CompileError("Undeclared variable 'y'"),
        ),
        Case::new(
            "duplicate_declaration",
            duplicate_declaration,
            Expected::CompileError("Duplicate declaration of 'x'"),
        ),
        Case::new(
            "undefined_function",
            undefined_function,
            Expected::CompileError("Undefined function 'nope'"),
        ),
        Case::new(
            "arity_mismatch",
            arity_mismatch,
            Expected::CompileError("Function 'fact' expected 1 arguments, got 2"),
        ),
        Case::new("division_by_zero", division_by_zero, Expected::Fault("Division by zero")),
        Case::new(
            "runaway_recursion",
            runaway_recursion,
            Expected::Fault("Call depth limit of 512 exceeded"),
        ),
        Case::new(
            "runaway_recursion_small_stack",
            runaway_recursion,
            Expected::Fault("Stack overflow"),
        )
        .with_config(VmConfig::default().with_stack_capacity(64)),
        Case::new("missing_return", missing_return, Expected::Fault("ran past the end")),
    ]
}

pub fn case(name: &str) -> Option<Case> {
    cases().into_iter().find(|case| case.name == name)
}

fn int(value: Word) -> Operand {
    Operand::int(value)
}

fn var(name: &str) -> Operand {
    Operand::var(name)
}

fn bin(left: Operand, operator: Bin, right: Operand) -> Operand {
    Operand::binary(left, operator, right)
}

fn literal_return() -> Program {
    Program::main(vec![Statement::ret(int(7))])
}

// return 2 + (3 * 4) - 1;
fn grouped_precedence() -> Program {
    Program::main(vec![Statement::ret(Operand::chain(
        int(2),
        [
            (Bin::Add, Operand::grouped(int(3), [(Bin::Mul, int(4))])),
            (Bin::Sub, int(1)),
        ],
    ))])
}

// return (1 << 10) | (12 & 10) ^ 3;
fn bitwise_chain() -> Program {
    Program::main(vec![Statement::ret(Operand::chain(
        Operand::grouped(int(1), [(Bin::ShiftLeft, int(10))]),
        [
            (Bin::BitOr, Operand::grouped(int(12), [(Bin::BitAnd, int(10))])),
            (Bin::BitXor, int(3)),
        ],
    ))])
}

// var x = 5; var y = -1; return -x + ~y + (!0 && (3 || 0));
fn unary_and_logic() -> Program {
    Program::main(vec![
        Statement::declare("x", int(5)),
        Statement::declare("y", Operand::unary(UnaryOperator::Minus, int(1))),
        Statement::ret(Operand::chain(
            Operand::unary(UnaryOperator::Minus, var("x")),
            [
                (Bin::Add, Operand::unary(UnaryOperator::BitNot, var("y"))),
                (
                    Bin::Add,
                    Operand::grouped(
                        Operand::unary(UnaryOperator::Not, int(0)),
                        [(Bin::LogicalAnd, Operand::grouped(int(3), [(Bin::LogicalOr, int(0))]))],
                    ),
                ),
            ],
        )),
    ])
}

fn if_else() -> Program {
    Program::main(vec![
        Statement::declare("x", int(3)),
        Statement::if_else(
            bin(var("x"), Bin::Greater, int(2)),
            vec![Statement::assign("x", int(10))],
            Some(vec![Statement::assign("x", int(20))]),
        ),
        Statement::ret(var("x")),
    ])
}

// var r = 0; if (cond) r = 1; else r = 2; return r;
fn if_literal(condition: Word) -> Program {
    Program::main(vec![
        Statement::declare("r", int(0)),
        Statement::if_else(
            int(condition),
            vec![Statement::assign("r", int(1))],
            Some(vec![Statement::assign("r", int(2))]),
        ),
        Statement::ret(var("r")),
    ])
}

fn if_literal_true() -> Program {
    if_literal(1)
}

fn if_literal_false() -> Program {
    if_literal(0)
}

fn while_sum() -> Program {
    Program::main(vec![
        Statement::declare("n", int(5)),
        Statement::declare("sum", int(0)),
        Statement::while_loop(
            bin(var("n"), Bin::Greater, int(0)),
            vec![
                Statement::assign("sum", bin(var("sum"), Bin::Add, var("n"))),
                Statement::assign("n", bin(var("n"), Bin::Sub, int(1))),
            ],
        ),
        Statement::ret(var("sum")),
    ])
}

fn discarded_expressions() -> Program {
    Program::main(vec![
        Statement::expr(int(5)),
        Statement::expr(bin(int(6), Bin::Mul, int(6))),
        Statement::ret(int(7)),
    ])
}

fn fact_decl() -> FunctionDecl {
    FunctionDecl::new(
        "fact",
        &["n"],
        vec![
            Statement::if_else(
                bin(var("n"), Bin::Less, int(2)),
                vec![Statement::ret(int(1))],
                None,
            ),
            Statement::ret(bin(
                var("n"),
                Bin::Mul,
                Operand::call("fact", vec![bin(var("n"), Bin::Sub, int(1))]),
            )),
        ],
    )
}

fn factorial_of(n: Word) -> Program {
    Program::new(
        vec![fact_decl()],
        vec![Statement::ret(Operand::call("fact", vec![int(n)]))],
    )
}

fn factorial() -> Program {
    factorial_of(10)
}

fn factorial_5() -> Program {
    factorial_of(5)
}

fn factorial_0() -> Program {
    factorial_of(0)
}

fn fibonacci() -> Program {
    let fib = |offset| Operand::call("fib", vec![bin(var("n"), Bin::Sub, int(offset))]);
    Program::new(
        vec![FunctionDecl::new(
            "fib",
            &["n"],
            vec![
                Statement::if_else(
                    bin(var("n"), Bin::Less, int(2)),
                    vec![Statement::ret(var("n"))],
                    None,
                ),
                Statement::ret(bin(fib(1), Bin::Add, fib(2))),
            ],
        )],
        vec![Statement::ret(Operand::call("fib", vec![int(15)]))],
    )
}

fn gcd() -> Program {
    Program::new(
        vec![FunctionDecl::new(
            "gcd",
            &["a", "b"],
            vec![
                Statement::while_loop(
                    bin(var("b"), Bin::NotEqual, int(0)),
                    vec![
                        Statement::declare("t", var("b")),
                        Statement::assign("b", bin(var("a"), Bin::Mod, var("b"))),
                        Statement::assign("a", var("t")),
                    ],
                ),
                Statement::ret(var("a")),
            ],
        )],
        vec![Statement::ret(Operand::call("gcd", vec![int(1071), int(462)]))],
    )
}

fn mutual_recursion() -> Program {
    let parity = |name: &str, other: &str, base: Word| {
        FunctionDecl::new(
            name,
            &["n"],
            vec![
                Statement::if_else(
                    bin(var("n"), Bin::Equal, int(0)),
                    vec![Statement::ret(int(base))],
                    None,
                ),
                Statement::ret(Operand::call(other, vec![bin(var("n"), Bin::Sub, int(1))])),
            ],
        )
    };
    Program::new(
        vec![parity("is_even", "is_odd", 1), parity("is_odd", "is_even", 0)],
        vec![Statement::ret(Operand::call("is_even", vec![int(10)]))],
    )
}

fn count_loop() -> Program {
    Program::main(vec![
        Statement::declare("i", int(0)),
        Statement::declare("total", int(0)),
        Statement::while_loop(
            bin(var("i"), Bin::Less, int(10_000)),
            vec![
                Statement::assign("i", bin(var("i"), Bin::Add, int(1))),
                Statement::assign("total", bin(var("total"), Bin::Add, var("i"))),
            ],
        ),
        Statement::ret(var("total")),
    ])
}

fn undeclared_variable() -> Program {
    Program::main(vec![Statement::ret(var("y"))])
}

fn use_before_declaration() -> Program {
    Program::main(vec![
        Statement::declare("x", var("y")),
        Statement::declare("y", int(1)),
        Statement::ret(var("x")),
    ])
}

fn duplicate_declaration() -> Program {
    Program::main(vec![
        Statement::declare("x", int(1)),
        Statement::declare("x", int(2)),
        Statement::ret(var("x")),
    ])
}

fn undefined_function() -> Program {
    Program::main(vec![Statement::ret(Operand::call("nope", Vec::new()))])
}

fn arity_mismatch() -> Program {
    Program::new(
        vec![fact_decl()],
        vec![Statement::ret(Operand::call("fact", vec![int(1), int(2)]))],
    )
}

fn division_by_zero() -> Program {
    Program::main(vec![
        Statement::declare("zero", int(0)),
        Statement::ret(bin(int(1), Bin::Div, var("zero"))),
    ])
}

fn runaway_recursion() -> Program {
    Program::new(
        vec![FunctionDecl::new(
            "f",
            &["n"],
            vec![Statement::ret(Operand::call(
                "f",
                vec![bin(var("n"), Bin::Add, int(1))],
            ))],
        )],
        vec![Statement::ret(Operand::call("f", vec![int(0)]))],
    )
}

fn missing_return() -> Program {
    Program::main(vec![Statement::declare("x", int(1))])
}
