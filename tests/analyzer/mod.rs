// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use anyhow::{bail, Result};
use schemaplate::*;
use serde::{Deserialize, Serialize};
use test_generator::test_resources;

#[derive(Serialize, Deserialize, Debug)]
struct TestCase {
    note: String,
    template: TemplateInput,
    schema: Schema,
    identifier_schemas: Option<IdentifierSchemas>,
    want_valid: bool,
    want_schema: Option<Schema>,
    // Diagnostic kinds, in report order.
    want_errors: Option<Vec<String>>,
    want_warnings: Option<Vec<String>>,
    // Substrings expected in the first diagnostic's message.
    want_message: Option<String>,
    // Path of the first diagnostic.
    want_path: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, Debug)]
struct YamlTest {
    cases: Vec<TestCase>,
}

fn kinds<'a>(diagnostics: impl Iterator<Item = &'a Diagnostic>) -> Vec<String> {
    diagnostics.map(|d| format!("{:?}", d.kind)).collect()
}

fn yaml_test_impl(file: &str) -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let yaml_str = std::fs::read_to_string(file)?;
    let test: YamlTest = serde_yaml::from_str(&yaml_str)?;

    println!("running {file}");

    let engine = Engine::new();
    for case in &test.cases {
        print!("case {} ", case.note);

        let result = engine.analyze(
            &case.template,
            &case.schema,
            case.identifier_schemas.as_ref(),
        )?;
        let listing = result
            .diagnostics
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("\n");

        if result.valid != case.want_valid {
            bail!(
                "{}: expected valid={}, diagnostics:\n{listing}",
                case.note,
                case.want_valid
            );
        }
        if let Some(expected) = &case.want_schema {
            if &result.output_schema != expected {
                bail!(
                    "{}: output schema mismatch\nleft  = {}\nright = {}",
                    case.note,
                    serde_json::to_string(&result.output_schema)?,
                    serde_json::to_string(expected)?
                );
            }
        }
        let errors = kinds(result.errors());
        let warnings = kinds(result.warnings());
        assert_eq!(
            &errors,
            case.want_errors.as_ref().unwrap_or(&vec![]),
            "{}:\n{listing}",
            case.note
        );
        assert_eq!(
            &warnings,
            case.want_warnings.as_ref().unwrap_or(&vec![]),
            "{}:\n{listing}",
            case.note
        );
        if let Some(expected) = &case.want_message {
            match result.diagnostics.first() {
                Some(d) if d.message.contains(expected.as_str()) => (),
                _ => bail!("{}: no diagnostic message contains `{expected}`:\n{listing}", case.note),
            }
        }
        if let Some(expected) = &case.want_path {
            match result.diagnostics.first() {
                Some(d) if &d.path == expected => (),
                _ => bail!("{}: path mismatch, want {expected:?}:\n{listing}", case.note),
            }
        }

        println!("passed");
    }

    println!("{} cases passed.", test.cases.len());
    Ok(())
}

fn yaml_test(file: &str) -> Result<()> {
    match yaml_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // If Err is returned, it doesn't always get printed by cargo test.
            // Therefore, panic with the error.
            panic!("{e}");
        }
    }
}

#[test_resources("tests/analyzer/cases/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}
