use std::collections::HashMap;

use proptest::prelude::*;

use stackscript::ast::{BinaryOperator as Bin, Operand, Program, Statement, UnaryOperator};
use stackscript::normalize::normalize_operand;
use stackscript::pipeline::Pipeline;
use test_support::{check_control_flow, compile_program, jump_sites};

const SAFE_BINARY: [Bin; 10] = [
    Bin::Add,
    Bin::Sub,
    Bin::Mul,
    Bin::BitAnd,
    Bin::BitOr,
    Bin::BitXor,
    Bin::Equal,
    Bin::Less,
    Bin::LogicalAnd,
    Bin::LogicalOr,
];

const UNARY: [UnaryOperator; 4] = [
    UnaryOperator::Plus,
    UnaryOperator::Minus,
    UnaryOperator::Not,
    UnaryOperator::BitNot,
];

fn operand() -> impl Strategy<Value = Operand> {
    let leaf = prop_oneof![
        any::<i64>().prop_map(Operand::int),
        (-100i64..100).prop_map(Operand::int),
    ];
    leaf.prop_recursive(4, 48, 3, |inner| {
        let link = (prop::sample::select(SAFE_BINARY.to_vec()), inner.clone());
        prop_oneof![
            (prop::sample::select(UNARY.to_vec()), inner.clone())
                .prop_map(|(operator, operand)| Operand::unary(operator, operand)),
            (inner.clone(), prop::collection::vec(link.clone(), 0..3))
                .prop_map(|(first, rest)| Operand::chain(first, rest)),
            (inner, prop::collection::vec(link, 0..3))
                .prop_map(|(first, rest)| Operand::grouped(first, rest)),
        ]
    })
}

/// Left-to-right evaluation of a literal-only operand tree.
fn eval(operand: &Operand) -> i64 {
    match operand {
        Operand::IntLiteral(value) => *value,
        Operand::UnaryOp { operator, operand } => {
            let value = eval(operand);
            match operator {
                UnaryOperator::Plus => value,
                UnaryOperator::Minus => value.wrapping_neg(),
                UnaryOperator::Not => i64::from(value == 0),
                UnaryOperator::BitNot => !value,
            }
        }
        Operand::Expression(expression) | Operand::Grouped(expression) => expression
            .rest
            .iter()
            .fold(eval(&expression.first), |left, operation| {
                apply(operation.operator, left, eval(&operation.operand))
            }),
        Operand::VariableRef { .. } | Operand::Call { .. } => {
            panic!("generated trees hold literals only")
        }
    }
}

fn apply(operator: Bin, left: i64, right: i64) -> i64 {
    match operator {
        Bin::Add => left.wrapping_add(right),
        Bin::Sub => left.wrapping_sub(right),
        Bin::Mul => left.wrapping_mul(right),
        Bin::BitAnd => left & right,
        Bin::BitOr => left | right,
        Bin::BitXor => left ^ right,
        Bin::Equal => i64::from(left == right),
        Bin::Less => i64::from(left < right),
        Bin::LogicalAnd => i64::from(left != 0 && right != 0),
        Bin::LogicalOr => i64::from(left != 0 || right != 0),
        other => panic!("{other:?} is not generated"),
    }
}

fn is_canonical(operand: &Operand) -> bool {
    match operand {
        Operand::IntLiteral(_) | Operand::VariableRef { .. } => true,
        Operand::UnaryOp { operand, .. } => is_canonical(operand),
        Operand::Grouped(_) => false,
        Operand::Expression(expression) => {
            !expression.rest.is_empty()
                && is_canonical(&expression.first)
                && expression
                    .rest
                    .iter()
                    .all(|operation| is_canonical(&operation.operand))
        }
        Operand::Call { args, .. } => args.iter().all(is_canonical),
    }
}

/// Control-flow skeleton; lowered to statements over `x` and loop counters.
#[derive(Debug, Clone)]
enum Shape {
    Bump(i64),
    Discard(i64),
    Branch(i64, Vec<Shape>, Option<Vec<Shape>>),
    Repeat(i64, Vec<Shape>),
}

fn shape() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        (-10i64..10).prop_map(Shape::Bump),
        (-10i64..10).prop_map(Shape::Discard),
    ];
    leaf.prop_recursive(3, 24, 3, |inner| {
        let block = prop::collection::vec(inner, 0..3);
        prop_oneof![
            (-10i64..10, block.clone(), prop::option::of(block.clone()))
                .prop_map(|(k, then_branch, else_branch)| Shape::Branch(k, then_branch, else_branch)),
            (0i64..4, block).prop_map(|(limit, body)| Shape::Repeat(limit, body)),
        ]
    })
}

fn bin(left: Operand, operator: Bin, right: Operand) -> Operand {
    Operand::binary(left, operator, right)
}

/// Lowers shapes to statements, giving every loop its own counter. Counters
/// are never reset, so nested loops stay bounded.
#[derive(Default)]
struct Lowering {
    counters: Vec<String>,
}

impl Lowering {
    fn block(&mut self, shapes: &[Shape]) -> Vec<Statement> {
        shapes.iter().map(|shape| self.statement(shape)).collect()
    }

    fn statement(&mut self, shape: &Shape) -> Statement {
        match shape {
            Shape::Bump(k) => Statement::assign("x", bin(Operand::var("x"), Bin::Add, Operand::int(*k))),
            Shape::Discard(k) => Statement::expr(bin(Operand::var("x"), Bin::Mul, Operand::int(*k))),
            Shape::Branch(k, then_branch, else_branch) => {
                let then_branch = self.block(then_branch);
                let else_branch = else_branch.as_ref().map(|block| self.block(block));
                Statement::if_else(
                    bin(Operand::var("x"), Bin::Less, Operand::int(*k)),
                    then_branch,
                    else_branch,
                )
            }
            Shape::Repeat(limit, body) => {
                let counter = format!("c{}", self.counters.len());
                self.counters.push(counter.clone());
                let mut statements = vec![Statement::assign(
                    counter.as_str(),
                    bin(Operand::var(counter.as_str()), Bin::Add, Operand::int(1)),
                )];
                statements.extend(self.block(body));
                Statement::while_loop(
                    bin(Operand::var(counter.as_str()), Bin::Less, Operand::int(*limit)),
                    statements,
                )
            }
        }
    }

    fn program(mut self, shapes: &[Shape]) -> Program {
        let body = self.block(shapes);
        let mut statements = vec![Statement::declare("x", Operand::int(0))];
        statements.extend(
            self.counters
                .iter()
                .map(|counter| Statement::declare(counter.as_str(), Operand::int(0))),
        );
        statements.extend(body);
        statements.push(Statement::ret(Operand::var("x")));
        Program::main(statements)
    }
}

fn eval_in(operand: &Operand, env: &HashMap<String, i64>) -> i64 {
    match operand {
        Operand::IntLiteral(value) => *value,
        Operand::VariableRef { name, .. } => env[name],
        Operand::Expression(expression) => expression
            .rest
            .iter()
            .fold(eval_in(&expression.first, env), |left, operation| {
                apply(operation.operator, left, eval_in(&operation.operand, env))
            }),
        other => panic!("{other} is not generated"),
    }
}

/// Reference semantics for the statement subset the lowering produces.
fn interpret(block: &[Statement], env: &mut HashMap<String, i64>) -> Option<i64> {
    for statement in block {
        match statement {
            Statement::VariableDeclaration {
                name, initializer, ..
            } => {
                let value = eval_in(initializer, env);
                env.insert(name.clone(), value);
            }
            Statement::Assignment { target, value, .. } => {
                let value = eval_in(value, env);
                env.insert(target.clone(), value);
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                let taken = if eval_in(condition, env) != 0 {
                    Some(then_branch)
                } else {
                    else_branch.as_ref()
                };
                if let Some(returned) = taken.and_then(|block| interpret(block, env)) {
                    return Some(returned);
                }
            }
            Statement::While {
                condition, body, ..
            } => {
                while eval_in(condition, env) != 0 {
                    if let Some(returned) = interpret(body, env) {
                        return Some(returned);
                    }
                }
            }
            Statement::ExpressionStatement { .. } => {}
            Statement::Return { value, .. } => return Some(eval_in(value, env)),
        }
    }
    None
}

fn operand_width(operand: &Operand) -> usize {
    match operand {
        Operand::IntLiteral(_) | Operand::VariableRef { .. } => 2,
        Operand::Expression(expression) => {
            operand_width(&expression.first)
                + expression
                    .rest
                    .iter()
                    .map(|operation| operand_width(&operation.operand) + 1)
                    .sum::<usize>()
        }
        other => panic!("{other} is not generated"),
    }
}

/// Derives from the tree alone where each `if`/`while` jump must land,
/// as `(jump address, target)` pairs.
fn expected_jumps(block: &[Statement], address: &mut usize, jumps: &mut Vec<(usize, isize)>) {
    for statement in block {
        match statement {
            Statement::VariableDeclaration { initializer: value, .. }
            | Statement::Assignment { value, .. } => *address += operand_width(value) + 2,
            Statement::ExpressionStatement { value, .. } | Statement::Return { value, .. } => {
                *address += operand_width(value) + 1
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                *address += operand_width(condition);
                let skip = *address;
                *address += 2;
                expected_jumps(then_branch, address, jumps);
                match else_branch {
                    Some(else_branch) => {
                        let exit = *address;
                        *address += 2;
                        jumps.push((skip, *address as isize));
                        expected_jumps(else_branch, address, jumps);
                        jumps.push((exit, *address as isize));
                    }
                    None => jumps.push((skip, *address as isize)),
                }
            }
            Statement::While {
                condition, body, ..
            } => {
                let start = *address;
                *address += operand_width(condition);
                let skip = *address;
                *address += 2;
                expected_jumps(body, address, jumps);
                let back = *address;
                *address += 2;
                jumps.push((skip, *address as isize));
                jumps.push((back, start as isize));
            }
        }
    }
}

proptest! {
    #[test]
    fn normalization_is_idempotent_and_canonical(mut operand in operand()) {
        normalize_operand(&mut operand);
        prop_assert!(is_canonical(&operand));
        let once = operand.clone();
        normalize_operand(&mut operand);
        prop_assert_eq!(operand, once);
    }

    #[test]
    fn normalization_preserves_value(operand in operand()) {
        let mut normalized = operand.clone();
        normalize_operand(&mut normalized);
        prop_assert_eq!(eval(&normalized), eval(&operand));
    }

    #[test]
    fn returning_a_literal_yields_it(value in any::<i64>()) {
        let program = Program::main(vec![Statement::ret(Operand::int(value))]);
        prop_assert_eq!(Pipeline::default().run(program).unwrap(), value);
    }

    #[test]
    fn compiled_expressions_match_reference(operand in operand()) {
        let expected = eval(&operand);
        let program = Program::main(vec![Statement::ret(operand)]);
        prop_assert_eq!(Pipeline::default().run(program).unwrap(), expected);
    }

    #[test]
    fn nested_control_flow_is_patched_correctly(
        shapes in prop::collection::vec(shape(), 0..6)
    ) {
        let program = Lowering::default().program(&shapes);
        let expected = interpret(&program.statements, &mut HashMap::new());

        let unit = compile_program(&program).unwrap();
        prop_assert!(check_control_flow(&unit).is_ok());

        let main = &unit.functions[0];
        let mut wanted = Vec::new();
        expected_jumps(&program.statements, &mut (main.address + 2), &mut wanted);
        wanted.sort_unstable();
        let end = unit.code.len() as isize;
        let mut found: Vec<(usize, isize)> = jump_sites(&unit)
            .unwrap()
            .into_iter()
            .filter(|site| main.contains(site.address) && site.target != end)
            .map(|site| (site.address, site.target))
            .collect();
        found.sort_unstable();
        prop_assert_eq!(found, wanted);

        prop_assert_eq!(Pipeline::default().run(program).ok(), expected);
    }
}
