// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use anyhow::{bail, Result};
use schemaplate::*;

fn person_schema() -> Result<Schema> {
    Ok(Schema::from_json_str(
        r#"{
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "age": { "type": "integer" },
                "active": { "type": "boolean" }
            }
        }"#,
    )?)
}

fn person() -> Result<Value> {
    Value::from_json_str(r#"{"name": "Alice", "age": 30, "active": true}"#)
}

fn shout() -> HelperDefinition {
    HelperDefinition::new("shout", Schema::string(), |args, hash| {
        let text = args.first().map(Value::render_string).unwrap_or_default();
        let mark = hash.get("mark").map(Value::render_string).unwrap_or_default();
        Ok(Value::from(format!("{}{mark}", text.to_uppercase())))
    })
    .with_param("text", Schema::string())
    .with_description("Upper-cases its argument.")
}

#[test]
fn analyze_then_execute() -> Result<()> {
    let engine = Engine::new();
    let template = TemplateInput::from("{{age}}");
    let (analysis, value) =
        engine.analyze_and_execute(&template, &person_schema()?, &person()?, None, None)?;
    assert!(analysis.valid);
    assert_eq!(analysis.output_schema, Schema::integer());
    assert_eq!(value, Value::from(30));
    Ok(())
}

#[test]
fn invalid_template_is_not_executed() -> Result<()> {
    let engine = Engine::new();
    let template = TemplateInput::from("Hi {{nmae}}");
    match engine.analyze_and_execute(&template, &person_schema()?, &person()?, None, None) {
        Err(TemplateError::Analysis { diagnostics }) => {
            assert_eq!(diagnostics.len(), 1);
            assert_eq!(diagnostics[0].kind, DiagnosticKind::UnknownPath);
        }
        other => bail!("expected analysis failure, got {other:?}"),
    }
    Ok(())
}

#[test]
fn validate_reports_first_error() -> Result<()> {
    let engine = Engine::new();
    let schema = person_schema()?;
    engine.validate(&"{{name}}".into(), &schema, None)?;

    let err = engine.validate(&"{{add name 1}} {{zip}}".into(), &schema, None).err();
    let message = err.as_ref().map(|e| e.to_string()).unwrap_or_default();
    assert!(message.contains("1 error(s)"), "{message}");
    assert!(message.contains("unknown property `zip`"), "{message}");
    assert_eq!(err.map(|e| e.diagnostics().len()), Some(2));
    Ok(())
}

#[test]
fn parse_errors_are_returned_not_reported() -> Result<()> {
    let engine = Engine::new();
    let result = engine.analyze(&"{{#if active}}x".into(), &person_schema()?, None);
    assert!(matches!(result, Err(ref e) if e.is_parse()));
    Ok(())
}

#[test]
fn custom_helper_in_analysis_and_execution() -> Result<()> {
    let engine = Engine::new();
    let schema = person_schema()?;
    let template = TemplateInput::from("{{shout name mark='!'}}");

    let before = engine.analyze(&template, &schema, None)?;
    assert!(!before.valid);

    engine.register_helper(shout());
    assert!(engine.has_helper("shout"));
    let after = engine.analyze(&template, &schema, None)?;
    assert!(after.valid, "{:?}", after.diagnostics);
    assert_eq!(after.output_schema, Schema::string());
    assert_eq!(engine.execute(&template, &person()?, None)?, Value::from("ALICE!"));

    let mismatch = engine.analyze(&"{{shout age}}".into(), &schema, None)?;
    assert!(mismatch.valid);
    assert_eq!(mismatch.warnings().count(), 1);

    assert!(engine.unregister_helper("shout"));
    assert!(engine.execute(&template, &person()?, None).is_err());
    Ok(())
}

#[test]
fn custom_block_helper() -> Result<()> {
    let engine = Engine::new();
    engine.register_helper(
        HelperDefinition::new("isAdult", Schema::boolean(), |args, _| {
            let age = args.first().and_then(|v| v.as_number().ok()).map(|n| n.as_f64());
            Ok(Value::Bool(age.unwrap_or_default() >= 18.0))
        })
        .with_param("age", Schema::number()),
    );
    let template = TemplateInput::from("{{#isAdult age}}adult{{else}}minor{{/isAdult}}");
    assert_eq!(engine.execute(&template, &person()?, None)?, Value::from("adult"));
    let child = Value::from_json_str(r#"{"age": 7}"#)?;
    assert_eq!(engine.execute(&template, &child, None)?, Value::from("minor"));

    let analysis = engine.analyze(&template, &person_schema()?, None)?;
    assert!(analysis.valid);
    assert_eq!(analysis.output_schema, Schema::string());
    Ok(())
}

#[test]
fn compiled_handle_keeps_its_helpers() -> Result<()> {
    let engine = Engine::new();
    engine.register_helper(shout());
    let handle = engine.compile("{{shout name}}")?;
    assert_eq!(handle.source(), "{{shout name}}");

    engine.unregister_helper("shout");
    assert!(engine.execute(&"{{shout name}}".into(), &person()?, None).is_err());
    assert_eq!(handle.execute(&person()?, None)?, Value::from("ALICE"));
    Ok(())
}

#[test]
fn object_inputs() -> Result<()> {
    let engine = Engine::new();
    let template: TemplateInput = serde_json::from_str(
        r#"{ "title": "{{name}}", "meta": { "age": "{{age}}", "adult": "{{gte age 18}}" } }"#,
    )?;
    let value = engine.execute(&template, &person()?, None)?;
    assert_eq!(
        value,
        Value::from_json_str(r#"{"title": "Alice", "meta": {"age": 30, "adult": true}}"#)?
    );

    let analysis = engine.analyze(&template, &person_schema()?, None)?;
    assert!(analysis.valid);
    let meta = analysis.output_schema.property("meta");
    assert_eq!(meta.and_then(|m| m.property("adult")), Some(&Schema::boolean()));
    Ok(())
}

#[test]
fn identifier_sources() -> Result<()> {
    let engine = Engine::new();
    let mut schemas = IdentifierSchemas::new();
    schemas.insert(
        1,
        Schema::from_json_str(r#"{"type": "object", "properties": {"meetingId": {"type": "string"}}}"#)?,
    );
    let mut data = IdentifierData::new();
    data.insert(1, Value::from_json_str(r#"{"meetingId": "m-42"}"#)?);

    let template = TemplateInput::from("{{meetingId:1}}");
    let (analysis, value) = engine.analyze_and_execute(
        &template,
        &person_schema()?,
        &person()?,
        Some(&schemas),
        Some(&data),
    )?;
    assert_eq!(analysis.output_schema, Schema::string());
    assert_eq!(value, Value::from("m-42"));
    Ok(())
}

#[test]
fn small_caches_still_render_correctly() -> Result<()> {
    let engine = Engine::with_config(EngineConfig {
        ast_cache_capacity: 1,
        render_cache_capacity: 1,
        builtin_helpers: true,
    })?;
    let data = Value::from_json_str(r#"{"a": 2, "b": 3}"#)?;
    for _ in 0..3 {
        assert_eq!(engine.execute(&"{{add a b}}".into(), &data, None)?, Value::from(5));
        assert_eq!(engine.execute(&"{{multiply a b}}".into(), &data, None)?, Value::from(6));
    }
    engine.clear_caches();
    assert_eq!(engine.execute(&"{{add a b}}".into(), &data, None)?, Value::from(5));
    Ok(())
}

#[test]
fn config_from_json() -> Result<()> {
    let config: EngineConfig = serde_json::from_str(r#"{"builtin_helpers": false}"#)?;
    let engine = Engine::with_config(config)?;
    assert!(!engine.has_helper("add"));
    assert!(serde_json::from_str::<EngineConfig>(r#"{"capacity": 3}"#).is_err());
    Ok(())
}

#[test]
fn shared_between_threads() -> Result<()> {
    let engine = Engine::global();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            std::thread::spawn(move || -> Result<Value> {
                let data = Value::from_json_str(&format!(r#"{{"n": {i}}}"#))?;
                Ok(engine.execute(&"{{multiply n 10}}".into(), &data, None)?)
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let value = match handle.join() {
            Ok(v) => v?,
            Err(_) => bail!("worker {i} panicked"),
        };
        assert_eq!(value, Value::from(i * 10));
    }
    Ok(())
}

#[test]
fn analysis_result_serializes_camel_case() -> Result<()> {
    let engine = Engine::new();
    let analysis = engine.analyze(&"{{nope}}".into(), &person_schema()?, None)?;
    let json = serde_json::to_value(&analysis)?;
    assert_eq!(json["valid"], serde_json::json!(false));
    assert_eq!(json["outputSchema"], serde_json::json!({}));
    assert_eq!(json["diagnostics"][0]["kind"], serde_json::json!("unknown_path"));
    assert_eq!(json["diagnostics"][0]["severity"], serde_json::json!("error"));
    Ok(())
}
