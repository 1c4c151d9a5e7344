// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use std::env;

use anyhow::{bail, Result};
use schemaplate::*;
use serde::{Deserialize, Serialize};
use test_generator::test_resources;

// Process test value specified in yaml to interpret special encodings.
pub fn process_value(v: &Value) -> Result<Value> {
    match v {
        // Handle Undefined encoded as a string "#undefined"
        Value::String(s) if s.as_ref() == "#undefined" => Ok(Value::Undefined),

        Value::Array(items) => {
            let mut array_value = Value::new_array();
            let array = array_value.as_array_mut()?;
            for item in items.iter() {
                array.push(process_value(item)?);
            }
            Ok(array_value)
        }

        Value::Object(fields) => {
            let mut object_value = Value::new_object();
            let object = object_value.as_object_mut()?;
            for (key, value) in fields.iter() {
                object.insert(key.clone(), process_value(value)?);
            }
            Ok(object_value)
        }

        _ => Ok(v.clone()),
    }
}

fn display_values(c: &Value, e: &Value) -> Result<String> {
    Ok(format!(
        "\nleft  = {}\nright = {}\n",
        serde_json::to_string_pretty(c)?,
        serde_json::to_string_pretty(e)?
    ))
}

pub fn match_values(computed: &Value, expected: &Value) -> Result<()> {
    let kinds_match = computed.is_undefined() == expected.is_undefined()
        && computed.type_name() == expected.type_name();
    if computed != expected || !kinds_match {
        bail!(
            "value mismatch (types {} and {}){}",
            computed.type_name(),
            expected.type_name(),
            display_values(computed, expected)?
        );
    }
    Ok(())
}

// A present `want_result: null` must mean "expect null", not "unspecified".
fn deserialize_present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Serialize, Deserialize, Debug)]
struct TestCase {
    note: String,
    template: TemplateInput,
    data: Option<Value>,
    identifier_data: Option<IdentifierData>,
    #[serde(default, deserialize_with = "deserialize_present")]
    want_result: Option<Value>,
    want_error: Option<String>,
    skip: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug)]
struct YamlTest {
    cases: Vec<TestCase>,
}

fn yaml_test_impl(file: &str) -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let yaml_str = std::fs::read_to_string(file)?;
    let test: YamlTest = serde_yaml::from_str(&yaml_str)?;

    println!("running {file}");

    let engine = Engine::new();
    for case in &test.cases {
        print!("case {} ", case.note);
        if case.skip == Some(true) {
            println!("skipped");
            continue;
        }

        let data = process_value(case.data.as_ref().unwrap_or(&Value::Null))?;
        let result = engine.execute(&case.template, &data, case.identifier_data.as_ref());

        match (&case.want_result, result) {
            (Some(expected), Ok(actual)) => match_values(&actual, &process_value(expected)?)?,
            (None, Ok(actual)) if case.want_error.is_some() => {
                bail!("expected error, got {actual}")
            }
            (None, Ok(_)) => bail!("either want_result or want_error must be specified"),
            (_, Err(actual)) => match &case.want_error {
                Some(expected) => {
                    let actual = actual.to_string();
                    if !actual.contains(expected) {
                        bail!("Error message\n`{actual}\n`\ndoes not contain `{expected}`");
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
            panic!("{e}");
        }
    }
}

#[test]
#[ignore = "intended for running a single yaml file"]
fn one_yaml() -> Result<()> {
    let mut file = String::default();
    for a in env::args() {
        if a.ends_with(".yaml") {
            file = a;
            break;
        }
    }

    if file.is_empty() {
        bail!("missing yaml test file");
    }

    yaml_test(file.as_str())
}

#[test_resources("tests/executor/cases/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}
