// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use anyhow::{bail, Result};
use schemaplate::ast::*;
use schemaplate::parser::parse_str;
use schemaplate::TemplateError;
use serde::{Deserialize, Serialize};
use test_generator::test_resources;

// Compact rendering of the tree so that yaml cases stay readable:
//   content          "text"
//   expression       {{head arg key=value}}
//   block            #name arg [body] else [inverse]
fn expr_text(e: &Expr) -> String {
    match e {
        Expr::Path(p) if p.data => format!("@{}", p.parts.join(".")),
        Expr::Path(p) => {
            let mut s = "../".repeat(p.depth);
            match p.parts.is_empty() {
                true => s.push_str("this"),
                false => s.push_str(&p.parts.join(".")),
            }
            s
        }
        Expr::Literal { value, .. } => value.to_string(),
        Expr::SubExpr {
            name, params, hash, ..
        } => format!("({})", call_text(name, params, hash)),
    }
}

fn call_text(head: &str, params: &[Expr], hash: &HashArgs) -> String {
    let mut parts = vec![head.to_string()];
    parts.extend(params.iter().map(expr_text));
    parts.extend(hash.iter().map(|(k, v)| format!("{k}={}", expr_text(v))));
    parts.join(" ")
}

fn program_text(program: &Program) -> Vec<String> {
    program.body.iter().map(statement_text).collect()
}

fn statement_text(stmt: &Statement) -> String {
    match stmt {
        Statement::Content(c) => format!("{:?}", c.text),
        Statement::Expression(e) => {
            format!("{{{{{}}}}}", call_text(&expr_text(&e.head), &e.params, &e.hash))
        }
        Statement::Block(b) => {
            let mut s = format!(
                "#{} [{}]",
                call_text(b.kind.name(), &b.params, &b.hash),
                program_text(&b.program).join(", ")
            );
            if let Some(inverse) = &b.inverse {
                s.push_str(&format!(" else [{}]", program_text(inverse).join(", ")));
            }
            s
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct Case {
    note: String,
    template: String,
    statements: Option<Vec<String>>,
    error: Option<String>,
    line: Option<u32>,
    col: Option<u32>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct YamlTest {
    cases: Vec<Case>,
}

fn yaml_test_impl(file: &str) -> Result<()> {
    println!("\nrunning {file}");

    let yaml = std::fs::read_to_string(file)?;
    let test: YamlTest = serde_yaml::from_str(&yaml)?;

    for case in &test.cases {
        print!("case {} ", &case.note);

        match parse_str("case.hbs", &case.template) {
            Ok(program) => {
                let actual = program_text(&program);
                match (&case.statements, &case.error) {
                    (Some(expected), _) => assert_eq!(&actual, expected, "{}", case.note),
                    (None, Some(e)) => bail!("expected error `{e}`, parsed {actual:?}"),
                    (None, None) => bail!("either statements or error must be specified"),
                }
            }
            Err(actual) => match &case.error {
                Some(expected) => {
                    let message = actual.to_string();
                    if !message.contains(expected) {
                        bail!("Error message\n`{message}\n`\ndoes not contain `{expected}`");
                    }
                    if let TemplateError::Parse { line, col, .. } = actual {
                        if let Some(l) = case.line {
                            assert_eq!(line, l, "{message}");
                        }
                        if let Some(c) = case.col {
                            assert_eq!(col, c, "{message}");
                        }
                    }
                }
                None => return Err(actual.into()),
            },
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
            panic!("{}", e);
        }
    }
}

#[test_resources("tests/parser/cases/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}

#[test]
fn parse_errors_carry_source_excerpt() {
    let err = parse_str("greeting.hbs", "Hello\n  {{#if a}}x").err();
    let message = err.map(|e| e.to_string()).unwrap_or_default();
    assert!(message.contains("greeting.hbs:2:"), "{message}");
    assert!(message.contains("{{#if a}}x"), "{message}");
    assert!(message.contains('^'), "{message}");
}
