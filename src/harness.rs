use anyhow::{Result, bail, ensure};

use crate::fixtures::{self, Expected};
use crate::pipeline::Pipeline;

#[test]
fn runs_every_fixture() -> Result<()> {
    let cases = fixtures::cases();
    ensure!(!cases.is_empty(), "Fixture catalogue is empty");

    for case in cases {
        let outcome = Pipeline::new(case.config).run(case.program());
        match (case.expected, outcome) {
            (Expected::Value(expected), Ok(value)) => ensure!(
                value == expected,
                "{}: expected {expected}, got {value}",
                case.name
            ),
            (Expected::CompileError(needle) | Expected::Fault(needle), Err(error)) => {
                let message = format!("{error:#}");
                ensure!(
                    message.contains(needle),
                    "{}: expected error containing '{needle}', got '{message}'",
                    case.name
                );
            }
            (Expected::Value(expected), Err(error)) => {
                bail!("{}: expected {expected}, got error '{error:#}'", case.name)
            }
            (_, Ok(value)) => bail!("{}: expected an error, got {value}", case.name),
        }
    }
    Ok(())
}

#[test]
fn compile_errors_are_not_reported_as_faults() -> Result<()> {
    for case in fixtures::cases() {
        let Expected::CompileError(_) = case.expected else {
            continue;
        };
        let result = Pipeline::new(case.config).prepare(case.program());
        ensure!(result.is_err(), "{}: expected prepare to fail", case.name);
    }
    Ok(())
}
