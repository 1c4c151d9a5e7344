// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::helpers::{Hash, HelperSet};
use crate::path::{extract_identifier, resolve_data_path};
use crate::value::{IdentifierData, Value};
use crate::Rc;

use anyhow::{anyhow, Result};
use log::trace;

/// A parsed template bound to the helper set it was compiled against.
///
/// Rendering never consults any other helper catalogue, so an artifact keeps
/// working unchanged after helpers are registered elsewhere.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    program: Ref<Program>,
    helpers: Rc<HelperSet>,
}

impl CompiledTemplate {
    pub fn compile(program: Ref<Program>, helpers: Rc<HelperSet>) -> Self {
        Self { program, helpers }
    }

    pub fn program(&self) -> &Ref<Program> {
        &self.program
    }

    pub fn helpers(&self) -> &Rc<HelperSet> {
        &self.helpers
    }

    /// Render to text. Missing values render as empty strings; only helper
    /// failures and calls to unknown helpers are errors.
    pub fn render(&self, data: &Value, identifier_data: Option<&IdentifierData>) -> Result<String> {
        let mut renderer = Renderer {
            helpers: &self.helpers,
            identifier_data,
            root: data,
            frames: vec![Frame {
                context: data.clone(),
                iteration: None,
            }],
        };
        let mut out = String::new();
        renderer.render_program(&self.program, &mut out)?;
        Ok(out)
    }
}

#[derive(Debug, Clone)]
struct Iteration {
    index: usize,
    key: Value,
    first: bool,
    last: bool,
}

#[derive(Debug)]
struct Frame {
    context: Value,
    iteration: Option<Iteration>,
}

struct Renderer<'a> {
    helpers: &'a HelperSet,
    identifier_data: Option<&'a IdentifierData>,
    root: &'a Value,
    frames: Vec<Frame>,
}

/// Resolve a plain or `:N` path against `context`.
fn resolve_in(context: &Value, path: &PathExpr, identifier_data: Option<&IdentifierData>) -> Value {
    let (parts, id) = extract_identifier(&path.parts);
    let base = match id {
        Some(id) => match identifier_data.and_then(|ids| ids.get(&id)) {
            Some(source) => source,
            None => return Value::Undefined,
        },
        None => context,
    };
    resolve_data_path(base, &parts)
        .cloned()
        .unwrap_or(Value::Undefined)
}

/// Resolve a path with `data` as the only context, as seen from the top of a
/// template. Parent references and iteration variables are undefined there.
pub fn resolve_root_path(
    path: &PathExpr,
    data: &Value,
    identifier_data: Option<&IdentifierData>,
) -> Value {
    if path.depth > 0 {
        return Value::Undefined;
    }
    if path.data {
        return match path.parts.split_first() {
            Some((root, rest)) if root == "root" => resolve_data_path(data, rest)
                .cloned()
                .unwrap_or(Value::Undefined),
            _ => Value::Undefined,
        };
    }
    resolve_in(data, path, identifier_data)
}

impl Renderer<'_> {
    fn iteration(&self) -> Option<&Iteration> {
        self.frames.iter().rev().find_map(|f| f.iteration.as_ref())
    }

    fn resolve_data_var(&self, path: &PathExpr) -> Value {
        let Some((name, rest)) = path.parts.split_first() else {
            return Value::Undefined;
        };
        let base = match (name.as_str(), self.iteration()) {
            ("root", _) => self.root.clone(),
            ("index", Some(it)) => Value::from(it.index),
            ("key", Some(it)) => it.key.clone(),
            ("first", Some(it)) => Value::Bool(it.first),
            ("last", Some(it)) => Value::Bool(it.last),
            _ => Value::Undefined,
        };
        resolve_data_path(&base, rest)
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    fn resolve_path(&self, path: &PathExpr) -> Value {
        if path.data {
            return self.resolve_data_var(path);
        }
        let context = match self.frames.len().checked_sub(path.depth + 1) {
            Some(idx) => &self.frames[idx].context,
            None => return Value::Undefined,
        };
        resolve_in(context, path, self.identifier_data)
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Path(path) => Ok(self.resolve_path(path)),
            Expr::Literal { value, .. } => Ok(value.clone()),
            Expr::SubExpr {
                span,
                name,
                params,
                hash,
            } => self.call_helper(span, name, params, hash),
        }
    }

    fn call_helper(
        &mut self,
        span: &crate::lexer::Span,
        name: &str,
        params: &[Expr],
        hash: &HashArgs,
    ) -> Result<Value> {
        let helpers = self.helpers;
        let Some(helper) = helpers.get(name) else {
            return Err(anyhow!(span.message("error", &format!("unknown helper `{name}`"))));
        };
        let mut args = Vec::with_capacity(params.len());
        for p in params {
            args.push(self.eval(p)?);
        }
        let mut named = Hash::new();
        for (key, value) in hash {
            named.insert(key.clone(), self.eval(value)?);
        }
        trace!("calling helper `{name}` with {} argument(s)", args.len());
        helper.call(&args, &named).map_err(|e| {
            anyhow!(span.message("error", &format!("helper `{name}` failed: {e:#}")))
        })
    }

    fn render_program(&mut self, program: &Program, out: &mut String) -> Result<()> {
        for stmt in &program.body {
            match stmt {
                Statement::Content(c) => out.push_str(&c.text),
                Statement::Expression(e) => {
                    let value = match e.helper_name() {
                        Some(name) => self.call_helper(&e.span, name, &e.params, &e.hash)?,
                        None => self.eval(&e.head)?,
                    };
                    value.write_render_string(out);
                }
                Statement::Block(b) => self.render_block(b, out)?,
            }
        }
        Ok(())
    }

    fn render_inverse(&mut self, block: &BlockStmt, out: &mut String) -> Result<()> {
        match &block.inverse {
            Some(inverse) => self.render_program(inverse, out),
            None => Ok(()),
        }
    }

    fn render_with_frame(&mut self, frame: Frame, program: &Program, out: &mut String) -> Result<()> {
        self.frames.push(frame);
        let r = self.render_program(program, out);
        self.frames.pop();
        r
    }

    fn render_block(&mut self, block: &BlockStmt, out: &mut String) -> Result<()> {
        let target = match (&block.kind, block.target()) {
            (BlockKind::Custom(_), _) | (_, None) => Value::Undefined,
            (_, Some(expr)) => self.eval(expr)?,
        };

        match &block.kind {
            BlockKind::If if target.is_truthy() => self.render_program(&block.program, out),
            BlockKind::Unless if !target.is_truthy() => self.render_program(&block.program, out),
            BlockKind::If | BlockKind::Unless => self.render_inverse(block, out),
            BlockKind::With if target.is_truthy() => {
                let frame = Frame {
                    context: target,
                    iteration: None,
                };
                self.render_with_frame(frame, &block.program, out)
            }
            BlockKind::With => self.render_inverse(block, out),
            BlockKind::Each => self.render_each(block, target, out),
            BlockKind::Custom(name) => {
                let result = self.call_helper(&block.span, name, &block.params, &block.hash)?;
                if result.is_truthy() {
                    self.render_program(&block.program, out)
                } else {
                    self.render_inverse(block, out)
                }
            }
        }
    }

    fn render_each(&mut self, block: &BlockStmt, target: Value, out: &mut String) -> Result<()> {
        let entries: Vec<(Value, Value)> = match &target {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(idx, v)| (Value::from(idx), v.clone()))
                .collect(),
            Value::Object(fields) => fields
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), v.clone()))
                .collect(),
            _ => vec![],
        };
        if entries.is_empty() {
            return self.render_inverse(block, out);
        }

        let count = entries.len();
        for (index, (key, context)) in entries.into_iter().enumerate() {
            let frame = Frame {
                context,
                iteration: Some(Iteration {
                    index,
                    key,
                    first: index == 0,
                    last: index + 1 == count,
                }),
            };
            self.render_with_frame(frame, &block.program, out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::HelperDefinition;
    use crate::parser::parse_str;
    use crate::schema::Schema;

    fn render_with(text: &str, data: &str, helpers: HelperSet) -> Result<String> {
        let program = Ref::new(parse_str("<test>", text)?);
        let compiled = CompiledTemplate::compile(program, Rc::new(helpers));
        compiled.render(&Value::from_json_str(data)?, None)
    }

    fn render(text: &str, data: &str) -> Result<String> {
        render_with(text, data, HelperSet::builtins())
    }

    #[test]
    fn interpolation_and_missing_values() -> Result<()> {
        assert_eq!(render("Hi {{name}}{{missing.x}}!", r#"{"name": "Ann"}"#)?, "Hi Ann!");
        assert_eq!(render("{{n}} {{f}} {{b}} {{z}}", r#"{"n": 3, "f": 1.5, "b": true, "z": null}"#)?, "3 1.5 true ");
        assert_eq!(render("{{a}}|{{o}}", r#"{"a": [1, "x"], "o": {"k": 1}}"#)?, r#"1,x|{"k":1}"#);
        assert_eq!(render("<{{{html}}}>", r#"{"html": "<b>"}"#)?, "<<b>>");
        Ok(())
    }

    #[test]
    fn conditionals() -> Result<()> {
        let t = "{{#if a}}A{{else if b}}B{{else}}C{{/if}}";
        assert_eq!(render(t, r#"{"a": 1}"#)?, "A");
        assert_eq!(render(t, r#"{"b": "y"}"#)?, "B");
        assert_eq!(render(t, r#"{"a": 0, "b": ""}"#)?, "C");
        assert_eq!(render("{{#unless a}}no{{/unless}}", r#"{"a": []}"#)?, "no");
        Ok(())
    }

    #[test]
    fn iteration_over_arrays_and_objects() -> Result<()> {
        let t = "{{#each items}}{{@index}}:{{name}}{{#unless @last}},{{/unless}}{{/each}}";
        assert_eq!(
            render(t, r#"{"items": [{"name": "a"}, {"name": "b"}]}"#)?,
            "0:a,1:b"
        );
        let t = "{{#each obj}}{{@key}}={{this}};{{/each}}";
        assert_eq!(render(t, r#"{"obj": {"x": 1, "y": 2}}"#)?, "x=1;y=2;");
        assert_eq!(render("{{#each e}}x{{else}}empty{{/each}}", r#"{"e": []}"#)?, "empty");
        assert_eq!(
            render("{{#each xs}}{{../label}}{{this}}{{@root.s}} {{/each}}", r##"{"xs": [1, 2], "label": "#", "s": "!"}"##)?,
            "#1! #2! "
        );
        Ok(())
    }

    #[test]
    fn with_pushes_context() -> Result<()> {
        let t = "{{#with user}}{{name}} ({{../org}}){{else}}nobody{{/with}}";
        assert_eq!(render(t, r#"{"user": {"name": "Bo"}, "org": "X"}"#)?, "Bo (X)");
        assert_eq!(render(t, r#"{}"#)?, "nobody");
        Ok(())
    }

    #[test]
    fn helpers_and_subexpressions() -> Result<()> {
        assert_eq!(render("{{add a (multiply b 2)}}", r#"{"a": 1, "b": 3}"#)?, "7");
        assert_eq!(render("{{#if (gt n 5)}}big{{else}}small{{/if}}", r#"{"n": 9}"#)?, "big");
        assert_eq!(render("{{divide 1 0}}", "{}")?, "");
        Ok(())
    }

    #[test]
    fn custom_blocks_call_their_helper() -> Result<()> {
        let mut helpers = HelperSet::new();
        helpers.insert(HelperDefinition::new("isAdmin", Schema::boolean(), |args, _| {
            Ok(Value::Bool(args.first().map(|v| v == &Value::from("admin")) == Some(true)))
        }));
        let t = "{{#isAdmin role}}yes {{name}}{{else}}no{{/isAdmin}}";
        assert_eq!(render_with(t, r#"{"role": "admin", "name": "n"}"#, helpers.clone())?, "yes n");
        assert_eq!(render_with(t, r#"{"role": "user"}"#, helpers)?, "no");
        Ok(())
    }

    #[test]
    fn helper_failures_are_errors() {
        assert!(render("{{nope 1}}", "{}").is_err());
        assert!(render("{{add 1 \"x\"}}", "{}").is_err());
        assert!(render("{{#nope}}x{{/nope}}", "{}").is_err());
    }

    #[test]
    fn identifier_paths_are_redirected() -> Result<()> {
        let program = Ref::new(parse_str("<test>", "{{id:1}}-{{id}}-{{id:2}}-{{add n:1 1}}")?);
        let compiled = CompiledTemplate::compile(program, Rc::new(HelperSet::builtins()));
        let mut ids = IdentifierData::new();
        ids.insert(1, Value::from_json_str(r#"{"id": "side", "n": 4}"#)?);
        let out = compiled.render(&Value::from_json_str(r#"{"id": "main"}"#)?, Some(&ids))?;
        assert_eq!(out, "side-main--5");
        Ok(())
    }
}
