use anyhow::{Context, Result, ensure};
use indoc::indoc;

use stackscript::ast::{Operand, Program, SourcePosition, Statement};
use stackscript::fixtures::{self, Expected};
use stackscript::frontend::{Frontend, ParseError};
use stackscript::pipeline::Pipeline;
use stackscript::vm::Vm;
use stackscript::VmConfig;
use test_support::{
    check_control_flow, compile_program, jump_sites, normalize_output, run_case, run_program,
};

#[test]
fn fixtures_produce_expected_outcomes() -> Result<()> {
    for case in fixtures::cases() {
        let result = run_case(&case);
        match case.expected {
            Expected::Value(expected) => {
                let value = result?;
                ensure!(
                    value == expected,
                    "{}: expected {expected}, got {value}",
                    case.name
                );
            }
            Expected::CompileError(needle) | Expected::Fault(needle) => {
                let message = match result {
                    Ok(value) => anyhow::bail!("{}: expected failure, got {value}", case.name),
                    Err(error) => format!("{error:#}"),
                };
                ensure!(
                    message.contains(needle),
                    "{}: '{message}' does not mention '{needle}'",
                    case.name
                );
            }
        }
    }
    Ok(())
}

#[test]
fn reference_programs_return_known_values() -> Result<()> {
    let expectations = [
        ("if_literal_true", 1),
        ("if_literal_false", 2),
        ("while_sum", 15),
        ("factorial_5", 120),
        ("factorial_0", 1),
    ];
    for (name, expected) in expectations {
        let case = fixtures::case(name).with_context(|| format!("Missing fixture {name}"))?;
        let value = run_program(case.program())?;
        ensure!(value == expected, "{name}: expected {expected}, got {value}");
    }
    Ok(())
}

#[test]
fn compiled_fixtures_have_well_formed_control_flow() -> Result<()> {
    for case in fixtures::cases() {
        if let Expected::CompileError(_) = case.expected {
            continue;
        }
        let unit = compile_program(&case.program())?;
        check_control_flow(&unit)?;
        ensure!(unit.entry == 0, "{}: entry is not address 0", case.name);
    }
    Ok(())
}

#[test]
fn factorial_listing() -> Result<()> {
    let case = fixtures::case("factorial").expect("factorial fixture");
    let unit = compile_program(&case.program())?;
    let expected = indoc! {"
        <main>/0:
           0  op_stk_adj  0
           2  op_int      10
           4  op_call     fact, 1
           7  op_return
           8  op_jump     end
        fact/1:
              local       n, @0
          10  op_stk_adj  1
          12  op_load     n
          14  op_int      2
          16  op_lt
          17  op_jump_if  22
          19  op_int      1
          21  op_return
        22:
          22  op_load     n
          24  op_load     n
          26  op_int      1
          28  op_sub
          29  op_call     fact, 1
          32  op_mul
          33  op_return
          34  op_jump     end
        end:
    "};
    assert_eq!(normalize_output(&unit.listing()), normalize_output(expected));
    Ok(())
}

#[test]
fn every_body_ends_with_a_jump_past_the_stream() -> Result<()> {
    let case = fixtures::case("mutual_recursion").expect("mutual recursion fixture");
    let unit = compile_program(&case.program())?;
    let end = unit.code.len() as isize;
    for function in &unit.functions {
        let epilogue = jump_sites(&unit)?
            .into_iter()
            .find(|site| site.address + 2 == function.end);
        ensure!(
            matches!(epilogue, Some(site) if site.target == end && !site.conditional),
            "{} has no epilogue jump",
            function.name
        );
    }
    Ok(())
}

#[test]
fn raw_vm_runs_compiled_code_directly() -> Result<()> {
    let case = fixtures::case("gcd").expect("gcd fixture");
    let unit = compile_program(&case.program())?;
    let mut vm = Vm::new(VmConfig::default());
    assert_eq!(vm.execute(&unit.code)?, 21);
    Ok(())
}

struct ReturnLiteral;

impl Frontend for ReturnLiteral {
    fn parse(&self, source: &str) -> Result<Program, ParseError> {
        let digits = source
            .trim()
            .strip_prefix("return ")
            .and_then(|rest| rest.strip_suffix(';'))
            .ok_or_else(|| ParseError::new(SourcePosition::new(0, source.len()), "expected return"))?;
        let value = digits
            .trim()
            .parse()
            .map_err(|_| ParseError::new(SourcePosition::new(7, source.len()), "expected integer"))?;
        Ok(Program::main(vec![Statement::ret(Operand::int(value))]))
    }
}

#[test]
fn run_source_goes_through_the_frontend() -> Result<()> {
    let pipeline = Pipeline::default();
    assert_eq!(pipeline.run_source(&ReturnLiteral, "return 99;")?, 99);

    let error = pipeline
        .run_source(&ReturnLiteral, "var x = 1;")
        .expect_err("parse should fail");
    let parse_error = error
        .downcast_ref::<ParseError>()
        .expect("error should be a parse error");
    assert_eq!(parse_error.position, SourcePosition::new(0, 10));
    assert!(format!("{error:#}").contains("expected return"));
    Ok(())
}

#[test]
fn yaml_config_limits_apply() -> Result<()> {
    let config = VmConfig::from_yaml_str("max_call_depth: 4\n")?;
    let case = fixtures::case("fibonacci").expect("fibonacci fixture");
    let error = Pipeline::new(config)
        .run(case.program())
        .expect_err("fib(15) needs more than four nested calls");
    assert!(format!("{error:#}").contains("Call depth limit of 4 exceeded"));
    Ok(())
}
