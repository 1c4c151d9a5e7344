// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structural tests on a parsed [`Program`] used to pick an execution strategy
//! and to decide whether a template can produce a non-string type.

use crate::ast::*;

fn is_whitespace_content(stmt: &Statement) -> bool {
    matches!(stmt, Statement::Content(c) if c.text.trim().is_empty())
}

/// Statements other than whitespace-only text.
pub fn significant_statements(program: &Program) -> Vec<&Statement> {
    program
        .body
        .iter()
        .filter(|s| !is_whitespace_content(s))
        .collect()
}

/// The only significant statement, if it is an expression.
pub fn single_expression(program: &Program) -> Option<&ExpressionStmt> {
    match significant_statements(program).as_slice() {
        [Statement::Expression(e)] => Some(e),
        _ => None,
    }
}

/// The only significant statement, if it is a block.
pub fn single_block(program: &Program) -> Option<&BlockStmt> {
    match significant_statements(program).as_slice() {
        [Statement::Block(b)] => Some(b),
        _ => None,
    }
}

pub fn is_single_expression(program: &Program) -> bool {
    single_expression(program).is_some()
}

pub fn is_single_block(program: &Program) -> bool {
    single_block(program).is_some()
}

/// Only text and plain path/literal references; no blocks or helper calls.
pub fn is_fast_path_eligible(program: &Program) -> bool {
    program.body.iter().all(|s| match s {
        Statement::Content(_) => true,
        Statement::Expression(e) => !e.is_helper_call(),
        Statement::Block(_) => false,
    })
}

/// Text of a body made only of content, with whitespace-only bodies allowed.
pub fn pure_text(program: &Program) -> Option<String> {
    let mut text = String::new();
    for stmt in &program.body {
        match stmt {
            Statement::Content(c) => text.push_str(&c.text),
            _ => return None,
        }
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;

    fn program(text: &str) -> Program {
        match parse_str("<test>", text) {
            Ok(p) => p,
            Err(e) => panic!("{e}"),
        }
    }

    #[test]
    fn whitespace_is_not_significant() {
        let p = program("  \n {{name}} \t");
        assert_eq!(significant_statements(&p).len(), 1);
        assert!(is_single_expression(&p));
        assert!(!is_single_block(&p));
    }

    #[test]
    fn single_block_ignores_surrounding_whitespace() {
        let p = program("\n{{#if a}}1{{else}}2{{/if}}\n");
        assert!(is_single_block(&p));
        assert!(!is_fast_path_eligible(&p));
    }

    #[test]
    fn fast_path_eligibility() {
        assert!(is_fast_path_eligible(&program("Hi {{a}} and {{b.c}}")));
        assert!(is_fast_path_eligible(&program("{{\"lit\"}} text")));
        assert!(!is_fast_path_eligible(&program("Hi {{add a 1}}")));
        assert!(!is_fast_path_eligible(&program("Total: {{(add 1 2)}}")));
        assert!(!is_fast_path_eligible(&program("Hi {{#with a}}{{b}}{{/with}}")));
        assert!(is_fast_path_eligible(&program("")));
    }

    #[test]
    fn non_whitespace_text_counts() {
        let p = program("x{{name}}");
        assert!(!is_single_expression(&p));
        assert_eq!(pure_text(&program("10")), Some("10".to_string()));
        assert_eq!(pure_text(&p), None);
    }
}
