// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Shape-directed execution.
//!
//! The cheapest strategy that still produces the right value is picked per
//! template:
//!
//! | Shape | Strategy | Result |
//! |---|---|---|
//! | lone `{{path}}` or `{{literal}}` | direct lookup | raw value |
//! | lone helper call | render, then coerce | scalar or string |
//! | text and plain references only | concatenation | string |
//! | lone block | render, then coerce | scalar or string |
//! | anything else | render | string |
//!
//! Only the rendering strategies can fail.

use crate::ast::*;
use crate::cache::RenderCache;
use crate::error::{Result, TemplateError};
use crate::helpers::HelperSet;
use crate::literal::coerce_rendered_text;
use crate::renderer::{resolve_root_path, CompiledTemplate};
use crate::shape;
use crate::value::{IdentifierData, Value};
use crate::Rc;

use log::trace;

#[derive(Debug, Default, Clone, Copy)]
pub struct ExecuteOptions<'a> {
    /// Sources selected with a `:N` path suffix.
    pub identifier_data: Option<&'a IdentifierData>,
    /// Pre-built artifact; always used when present and never cached.
    pub compiled: Option<&'a CompiledTemplate>,
    /// Artifact cache keyed by template source.
    pub render_cache: Option<&'a RenderCache>,
    /// Helpers to compile against when no artifact is supplied.
    pub helpers: Option<&'a Rc<HelperSet>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Direct,
    Helper,
    FastPath,
    Block,
    Fallback,
}

pub fn select_tier(program: &Program) -> Tier {
    if let Some(expr) = shape::single_expression(program) {
        return match (&expr.head, expr.is_helper_call()) {
            (Expr::Path(_) | Expr::Literal { .. }, false) => Tier::Direct,
            _ => Tier::Helper,
        };
    }
    if shape::is_fast_path_eligible(program) && shape::significant_statements(program).len() > 1 {
        return Tier::FastPath;
    }
    if shape::is_single_block(program) {
        return Tier::Block;
    }
    Tier::Fallback
}

fn eval_direct(expr: &Expr, data: &Value, identifier_data: Option<&IdentifierData>) -> Value {
    match expr {
        Expr::Path(path) => resolve_root_path(path, data, identifier_data),
        Expr::Literal { value, .. } => value.clone(),
        // Sub-expression heads are helper calls and never reach the direct tiers.
        Expr::SubExpr { .. } => Value::Undefined,
    }
}

fn concatenate(program: &Program, data: &Value, identifier_data: Option<&IdentifierData>) -> String {
    let mut out = String::new();
    for stmt in &program.body {
        match stmt {
            Statement::Content(c) => out.push_str(&c.text),
            Statement::Expression(e) => {
                eval_direct(&e.head, data, identifier_data).write_render_string(&mut out)
            }
            Statement::Block(_) => (),
        }
    }
    out
}

fn artifact(program: &Ref<Program>, source: &str, options: &ExecuteOptions) -> Rc<CompiledTemplate> {
    if let Some(compiled) = options.compiled {
        return Rc::new(compiled.clone());
    }
    let compile = || {
        let helpers = options.helpers.cloned().unwrap_or_default();
        Rc::new(CompiledTemplate::compile(program.clone(), helpers))
    };
    match options.render_cache {
        Some(cache) => match cache.get(source) {
            Some(hit) => {
                trace!("render cache hit");
                hit
            }
            None => {
                trace!("render cache miss");
                let compiled = compile();
                cache.set(source, compiled.clone());
                compiled
            }
        },
        None => compile(),
    }
}

fn render(program: &Ref<Program>, source: &str, data: &Value, options: &ExecuteOptions) -> Result<String> {
    artifact(program, source, options)
        .render(data, options.identifier_data)
        .map_err(TemplateError::Runtime)
}

/// Execute a parsed template. `source` is the template text, used as the
/// render cache key.
pub fn execute(
    program: &Ref<Program>,
    source: &str,
    data: &Value,
    options: &ExecuteOptions,
) -> Result<Value> {
    let tier = select_tier(program);
    trace!("executing with {tier:?} strategy");
    match tier {
        Tier::Direct => Ok(match shape::single_expression(program) {
            Some(expr) => eval_direct(&expr.head, data, options.identifier_data),
            None => Value::Undefined,
        }),
        Tier::FastPath => Ok(Value::from(concatenate(
            program,
            data,
            options.identifier_data,
        ))),
        Tier::Helper | Tier::Block => {
            let text = render(program, source, data, options)?;
            Ok(coerce_rendered_text(&text))
        }
        Tier::Fallback => render(program, source, data, options).map(Value::from),
    }
}
