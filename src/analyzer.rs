// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Static analysis of a template against the schema of its input data.
//!
//! The analyzer walks the AST once, in source order, with a stack of schema
//! scopes mirroring the context stack the renderer will use. It reports every
//! reference that cannot be resolved and infers the schema of the value the
//! executor will produce:
//!
//! - a lone `{{path}}` produces whatever `path` resolves to,
//! - a lone helper call produces the helper's declared return schema,
//! - a lone `#if`/`#unless` whose branches are literals of one category
//!   produces that category,
//! - a lone `#with` whose body is a single typed expression passes that type
//!   through,
//! - everything else produces a string.
//!
//! Unknown paths and helpers are errors. Helper argument mismatches are only
//! warnings, since helpers are expected to be permissive about their input.

use crate::ast::*;
use crate::helpers::{HelperDefinition, HelperSet};
use crate::lexer::Span;
use crate::literal::{detect_literal_category, LiteralCategory};
use crate::path::{extract_identifier, resolve_schema_path};
use crate::schema::{IdentifierSchemas, Schema};
use crate::shape;

use core::fmt;
use std::borrow::Cow;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnknownPath,
    UnknownHelper,
    UnknownIdentifier,
    NotAnArray,
    ArgumentMismatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    /// Path segments of the reference the diagnostic is about.
    pub path: Vec<String>,
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}:{}: {severity}: {}", self.line, self.col, self.message)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// No diagnostic has error severity.
    pub valid: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub output_schema: Schema,
}

impl AnalysisResult {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AnalyzeOptions<'a> {
    /// Schemas of the sources selected with a `:N` path suffix.
    pub identifier_schemas: Option<&'a IdentifierSchemas>,
    /// Helpers that may be called. `None` means no helper is known.
    pub helpers: Option<&'a HelperSet>,
}

// `scope` is `None` once resolution has already failed, so that everything
// nested under an unknown reference is not reported again.
#[derive(Debug, Clone)]
struct Frame<'a> {
    scope: Option<Cow<'a, Schema>>,
    /// Body of an `#each`, where `@index` and friends are defined.
    iterating: bool,
}

/// How a conditional branch can contribute to the inferred type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Branch {
    Literal(LiteralCategory),
    Typed(LiteralCategory),
    Text,
}

struct Analyzer<'a> {
    root: &'a Schema,
    identifier_schemas: Option<&'a IdentifierSchemas>,
    helpers: Option<&'a HelperSet>,
    frames: Vec<Frame<'a>>,
    diagnostics: Vec<Diagnostic>,
}

/// Analyze `program` against `input_schema`.
pub fn analyze<'a>(
    program: &Program,
    input_schema: &'a Schema,
    options: &AnalyzeOptions<'a>,
) -> AnalysisResult {
    let mut analyzer = Analyzer {
        root: input_schema,
        identifier_schemas: options.identifier_schemas,
        helpers: options.helpers,
        frames: vec![Frame {
            scope: Some(Cow::Borrowed(input_schema)),
            iterating: false,
        }],
        diagnostics: vec![],
    };
    let output_schema = analyzer.analyze_program(program);
    let valid = !analyzer
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Error);
    AnalysisResult {
        valid,
        diagnostics: analyzer.diagnostics,
        output_schema,
    }
}

fn candidate(resolved: Option<Cow<'_, Schema>>) -> Schema {
    match resolved {
        Some(schema) => schema.into_owned(),
        None => Schema::any(),
    }
}

fn available_names(names: &[String]) -> String {
    if names.is_empty() {
        "no properties are declared".to_string()
    } else {
        format!("available: {}", names.join(", "))
    }
}

impl<'a> Analyzer<'a> {
    fn report(
        &mut self,
        severity: Severity,
        kind: DiagnosticKind,
        span: &Span,
        path: Vec<String>,
        message: String,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            kind,
            message,
            path,
            line: span.line,
            col: span.col,
        });
    }

    fn error(&mut self, kind: DiagnosticKind, span: &Span, path: Vec<String>, message: String) {
        self.report(Severity::Error, kind, span, path, message)
    }

    fn warning(&mut self, kind: DiagnosticKind, span: &Span, path: Vec<String>, message: String) {
        self.report(Severity::Warning, kind, span, path, message)
    }

    fn iterating(&self) -> bool {
        self.frames.iter().any(|f| f.iterating)
    }

    fn resolve_from(
        &mut self,
        base: Cow<'a, Schema>,
        parts: &[String],
        path: &PathExpr,
    ) -> Option<Cow<'a, Schema>> {
        let resolved = match base {
            Cow::Borrowed(schema) => resolve_schema_path(schema, parts).map(Cow::Borrowed),
            Cow::Owned(schema) => {
                resolve_schema_path(&schema, parts).map(|s| Cow::Owned(s.clone()))
            }
        };
        match resolved {
            Ok(schema) => Some(schema),
            Err(miss) => {
                let breadcrumb = parts[..=miss.index].to_vec();
                let message = format!(
                    "unknown property `{}` in `{}`; {}",
                    miss.segment,
                    path.original,
                    available_names(&miss.available)
                );
                self.error(DiagnosticKind::UnknownPath, &path.span, breadcrumb, message);
                None
            }
        }
    }

    fn resolve_data_var(&mut self, path: &PathExpr) -> Option<Cow<'a, Schema>> {
        let (name, rest) = path.parts.split_first()?;
        let base = match (name.as_str(), self.iterating()) {
            ("root", _) => Cow::Borrowed(self.root),
            ("index" | "key", true) => Cow::Owned(Schema::integer()),
            ("first" | "last", true) => Cow::Owned(Schema::boolean()),
            (_, iterating) => {
                let message = match iterating {
                    false if matches!(name.as_str(), "index" | "key" | "first" | "last") => {
                        format!("`@{name}` is only available inside `#each`")
                    }
                    _ => format!("unknown data variable `@{name}`"),
                };
                self.error(
                    DiagnosticKind::UnknownPath,
                    &path.span,
                    path.parts.clone(),
                    message,
                );
                return None;
            }
        };
        self.resolve_from(base, rest, path)
    }

    fn resolve_path(&mut self, path: &PathExpr) -> Option<Cow<'a, Schema>> {
        if path.data {
            return self.resolve_data_var(path);
        }

        let (parts, id) = extract_identifier(&path.parts);
        if let Some(id) = id {
            let source = self.identifier_schemas.and_then(|s| s.get(&id));
            let Some(source) = source else {
                self.error(
                    DiagnosticKind::UnknownIdentifier,
                    &path.span,
                    parts,
                    format!("no schema is registered for identifier {id} used in `{}`", path.original),
                );
                return None;
            };
            return self.resolve_from(Cow::Borrowed(source), &parts, path);
        }

        let Some(idx) = self.frames.len().checked_sub(path.depth + 1) else {
            self.error(
                DiagnosticKind::UnknownPath,
                &path.span,
                parts,
                format!("`{}` refers above the root context", path.original),
            );
            return None;
        };
        let scope = self.frames[idx].scope.clone()?;
        self.resolve_from(scope, &parts, path)
    }

    fn check_arguments(&mut self, helper: &HelperDefinition, span: &Span, params: &[Expr]) {
        let count = params.len();
        let too_many = matches!(helper.max_args(), Some(max) if count > max);
        if count < helper.min_args() || too_many {
            let expected = match helper.max_args() {
                Some(max) if max == helper.min_args() => format!("{max}"),
                Some(max) => format!("{} to {max}", helper.min_args()),
                None => format!("at least {}", helper.min_args()),
            };
            self.warning(
                DiagnosticKind::ArgumentMismatch,
                span,
                vec![helper.name.clone()],
                format!(
                    "helper `{}` expects {expected} argument(s), got {count}",
                    helper.name
                ),
            );
        }

        for (idx, param) in params.iter().enumerate() {
            let actual = self.analyze_expr(param);
            let expected = helper.param(idx).and_then(|p| p.schema.as_ref().map(|s| (p, s)));
            if let (Some(actual), Some((declared, expected))) = (actual, expected) {
                if !expected.accepts(&actual) {
                    self.warning(
                        DiagnosticKind::ArgumentMismatch,
                        param.span(),
                        vec![helper.name.clone(), declared.name.clone()],
                        format!(
                            "argument `{}` of helper `{}` expects {}, got {}",
                            declared.name,
                            helper.name,
                            expected.describe(),
                            actual.describe()
                        ),
                    );
                }
            }
        }
    }

    fn analyze_helper_call(
        &mut self,
        span: &Span,
        name: &str,
        params: &[Expr],
        hash: &HashArgs,
    ) -> Option<Cow<'a, Schema>> {
        let helper = self.helpers.and_then(|h| h.get(name));
        let result = match helper {
            Some(helper) => {
                self.check_arguments(helper, span, params);
                Some(Cow::Borrowed(&helper.return_schema))
            }
            None => {
                self.error(
                    DiagnosticKind::UnknownHelper,
                    span,
                    vec![name.to_string()],
                    format!("unknown helper `{name}`"),
                );
                for p in params {
                    self.analyze_expr(p);
                }
                None
            }
        };
        for (_, value) in hash {
            self.analyze_expr(value);
        }
        result
    }

    fn analyze_expr(&mut self, expr: &Expr) -> Option<Cow<'a, Schema>> {
        match expr {
            Expr::Path(path) => self.resolve_path(path),
            Expr::Literal { value, .. } => Some(Cow::Owned(Schema::of_value(value))),
            Expr::SubExpr {
                span,
                name,
                params,
                hash,
            } => self.analyze_helper_call(span, name, params, hash),
        }
    }

    fn analyze_expression(&mut self, stmt: &ExpressionStmt) -> Schema {
        match stmt.helper_name() {
            Some(name) => candidate(self.analyze_helper_call(&stmt.span, name, &stmt.params, &stmt.hash)),
            None => candidate(self.analyze_expr(&stmt.head)),
        }
    }

    fn with_frame<T>(&mut self, frame: Frame<'a>, f: impl FnOnce(&mut Self) -> T) -> T {
        self.frames.push(frame);
        let r = f(self);
        self.frames.pop();
        r
    }

    // Candidate and literal category of one branch of a conditional.
    fn analyze_branch(&mut self, program: Option<&Program>) -> Branch {
        let Some(program) = program else {
            return Branch::Text;
        };
        let inferred = self.analyze_program(program);
        if let Some(text) = shape::pure_text(program) {
            return match detect_literal_category(text.trim()) {
                Some(category) => Branch::Literal(category),
                None => Branch::Text,
            };
        }
        // An `else if` chain: the nested conditional already renders a literal
        // of one category or it was inferred as a string.
        if let Some(nested) = shape::single_block(program) {
            if matches!(nested.kind, BlockKind::If | BlockKind::Unless) {
                return match inferred.literal_category() {
                    Some(category) => Branch::Literal(category),
                    None => Branch::Text,
                };
            }
        }
        if shape::is_single_expression(program) {
            // Null renders as empty text, so only numbers and booleans survive
            // the round trip through rendering.
            return match inferred.literal_category() {
                Some(c @ (LiteralCategory::Number | LiteralCategory::Boolean)) => Branch::Typed(c),
                _ => Branch::Text,
            };
        }
        Branch::Text
    }

    fn analyze_conditional(&mut self, block: &BlockStmt) -> Schema {
        if let Some(target) = block.target() {
            self.analyze_expr(target);
        }
        let primary = self.analyze_branch(Some(&block.program));
        let inverse = self.analyze_branch(block.inverse.as_ref());
        let category = match (primary, inverse) {
            (Branch::Literal(a), Branch::Literal(b)) if a == b => Some(a),
            (Branch::Literal(a), Branch::Typed(b)) | (Branch::Typed(b), Branch::Literal(a))
                if a == b =>
            {
                Some(a)
            }
            _ => None,
        };
        match category {
            Some(c) => c.to_schema(),
            None => Schema::string(),
        }
    }

    fn analyze_each(&mut self, block: &BlockStmt) -> Schema {
        let target = block.target().and_then(|t| self.analyze_expr(t));
        let scope = match target {
            Some(schema) if schema.is_array_typed() => match schema {
                Cow::Borrowed(s) => s.array_items().map(Cow::Borrowed),
                Cow::Owned(s) => s.array_items().cloned().map(Cow::Owned),
            },
            Some(schema) => {
                if let Some(Expr::Path(path)) = block.target() {
                    self.error(
                        DiagnosticKind::NotAnArray,
                        &path.span,
                        path.parts.clone(),
                        format!(
                            "`#each` expects an array but `{}` is {}",
                            path.original,
                            schema.describe()
                        ),
                    );
                } else if let Some(expr) = block.target() {
                    self.error(
                        DiagnosticKind::NotAnArray,
                        expr.span(),
                        vec![],
                        format!("`#each` expects an array, got {}", schema.describe()),
                    );
                }
                None
            }
            None => None,
        };

        let frame = Frame {
            scope,
            iterating: true,
        };
        self.with_frame(frame, |a| a.analyze_program(&block.program));
        if let Some(inverse) = &block.inverse {
            self.analyze_program(inverse);
        }
        Schema::string()
    }

    fn analyze_with(&mut self, block: &BlockStmt) -> Schema {
        let scope = block.target().and_then(|t| self.analyze_expr(t));
        let frame = Frame {
            scope,
            iterating: false,
        };
        let inner = self.with_frame(frame, |a| a.analyze_program(&block.program));
        if let Some(inverse) = &block.inverse {
            self.analyze_program(inverse);
            return Schema::string();
        }

        let literal_block = shape::single_block(&block.program)
            .is_some_and(|b| matches!(b.kind, BlockKind::If | BlockKind::Unless));
        let passes_through = match shape::pure_text(&block.program) {
            Some(text) => detect_literal_category(text.trim()).map(|c| c.to_schema()),
            None if literal_block => inner.literal_category().map(|c| c.to_schema()),
            None if shape::is_single_expression(&block.program) => match inner.literal_category() {
                Some(LiteralCategory::Number) => Some(Schema::number()),
                Some(LiteralCategory::Boolean) => Some(Schema::boolean()),
                _ => None,
            },
            None => None,
        };
        passes_through.unwrap_or_else(Schema::string)
    }

    fn analyze_custom(&mut self, block: &BlockStmt, name: &str) -> Schema {
        self.analyze_helper_call(&block.span, name, &block.params, &block.hash);
        self.analyze_program(&block.program);
        if let Some(inverse) = &block.inverse {
            self.analyze_program(inverse);
        }
        Schema::string()
    }

    fn analyze_block(&mut self, block: &BlockStmt) -> Schema {
        match &block.kind {
            BlockKind::If | BlockKind::Unless => self.analyze_conditional(block),
            BlockKind::Each => self.analyze_each(block),
            BlockKind::With => self.analyze_with(block),
            BlockKind::Custom(name) => self.analyze_custom(block, name),
        }
    }

    /// Analyze every statement; returns the inferred schema of the body.
    fn analyze_program(&mut self, program: &Program) -> Schema {
        let mut significant = vec![];
        for stmt in &program.body {
            let inferred = match stmt {
                Statement::Content(c) if c.text.trim().is_empty() => continue,
                Statement::Content(_) => Schema::string(),
                Statement::Expression(e) => self.analyze_expression(e),
                Statement::Block(b) => self.analyze_block(b),
            };
            significant.push(inferred);
        }
        match significant.len() {
            1 => significant.pop().unwrap_or_else(Schema::string),
            _ => Schema::string(),
        }
    }
}
