// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::error::{Result, TemplateError};
use crate::lexer::*;
use crate::number::Number;
use crate::value::Value;

use core::str::FromStr;

/// How a nested body ended.
enum Terminator {
    Eof,
    /// `{{else}}` or `{{^}}`.
    Else(Span),
    /// `{{else <block header>}}`; the span covers the header only.
    ElseChain(Span),
    /// `{{/name}}`
    Close(Span, String),
}

/// Parse a complete template.
pub fn parse(source: &Source) -> Result<Program> {
    Parser::new(source)?.parse_template()
}

/// Parse template text under a display name used in error messages.
pub fn parse_str(file: &str, text: &str) -> Result<Program> {
    let source = Source::from_contents(file, text)?;
    parse(&source)
}

pub struct Parser<'source> {
    source: &'source Source,
    pieces: Vec<Piece>,
    pos: usize,
    strip_next: bool,
}

// Cut `skip` bytes off the front of a span, keeping line/col accurate.
fn advance(span: &Span, skip: usize) -> Span {
    let text = span.text();
    let skip = skip.min(text.len());
    let (mut line, mut col) = (span.line, span.col);
    for ch in text[..skip].chars() {
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    Span {
        source: span.source.clone(),
        line,
        col,
        start: span.start + skip as u32,
        end: span.end,
    }
}

fn leading_ws(text: &str) -> usize {
    text.len() - text.trim_start().len()
}

fn strip_trailing_ws(body: &mut Vec<Statement>) {
    if let Some(Statement::Content(c)) = body.last_mut() {
        let len = c.text.trim_end().len();
        c.text.truncate(len);
        if c.text.is_empty() {
            body.pop();
        }
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Split a path word into a [`PathExpr`].
pub fn parse_path(span: &Span) -> Result<PathExpr> {
    let original = span.text().to_string();
    let mut rest = original.as_str();
    let mut path = PathExpr {
        span: span.clone(),
        original: original.clone(),
        parts: vec![],
        depth: 0,
        data: false,
        this: false,
    };

    if rest.contains('|') {
        return Err(span.error("block parameters are not supported"));
    }

    if let Some(r) = rest.strip_prefix('@') {
        path.data = true;
        rest = r;
    }

    if !path.data {
        loop {
            if let Some(r) = rest.strip_prefix("../") {
                path.depth += 1;
                rest = r;
            } else if rest == ".." {
                path.depth += 1;
                rest = "";
            } else {
                break;
            }
        }
        if rest == "this" || rest == "." {
            path.this = true;
            rest = "";
        } else if let Some(r) = rest
            .strip_prefix("this.")
            .or_else(|| rest.strip_prefix("this/"))
            .or_else(|| rest.strip_prefix("./"))
        {
            path.this = true;
            rest = r;
        }
        if rest.is_empty() {
            if path.depth > 0 || path.this {
                return Ok(path);
            }
            return Err(span.error("empty path"));
        }
    }

    let mut segment = String::new();
    let mut bracketed = false;
    let mut in_brackets = false;
    for ch in rest.chars() {
        match ch {
            '[' if !in_brackets && segment.is_empty() => {
                in_brackets = true;
                bracketed = true;
            }
            ']' if in_brackets => in_brackets = false,
            '.' | '/' if !in_brackets => {
                if segment.is_empty() && !bracketed {
                    return Err(span.error(&format!("invalid path `{original}`")));
                }
                path.parts.push(core::mem::take(&mut segment));
                bracketed = false;
            }
            _ => segment.push(ch),
        }
    }
    if segment.is_empty() && !bracketed {
        return Err(span.error(&format!("invalid path `{original}`")));
    }
    path.parts.push(segment);
    Ok(path)
}

/// Parser for the tokens inside one tag.
struct TagParser<'source> {
    source: &'source Source,
    lexer: TagLexer<'source>,
    tok: Token,
}

impl<'source> TagParser<'source> {
    fn new(source: &'source Source, inner: &Span) -> Result<Self> {
        let mut lexer = TagLexer::new(source, inner);
        let tok = lexer.next_token()?;
        Ok(Self { source, lexer, tok })
    }

    fn next_token(&mut self) -> Result<()> {
        self.tok = self.lexer.next_token()?;
        Ok(())
    }

    fn is_symbol(&self, s: &str) -> bool {
        self.tok.0 == TokenKind::Symbol && self.tok.1.text() == s
    }

    fn at_end(&self) -> bool {
        self.tok.0 == TokenKind::Eof
    }

    fn error(&self, msg: &str) -> TemplateError {
        self.source.error(self.tok.1.line, self.tok.1.col, msg)
    }

    // Word immediately followed by `=`.
    fn at_hash_key(&self) -> Result<bool> {
        if self.tok.0 != TokenKind::Word {
            return Ok(false);
        }
        let mut lookahead = self.lexer.clone();
        let next = lookahead.next_token()?;
        Ok(next.0 == TokenKind::Symbol && next.1.text() == "=")
    }

    fn parse_name(&mut self, context: &str) -> Result<(Span, String)> {
        if self.tok.0 != TokenKind::Word {
            return Err(self.error(&format!("expecting name {context}")));
        }
        let span = self.tok.1.clone();
        let name = span.text().to_string();
        self.next_token()?;
        Ok((span, name))
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        let span = self.tok.1.clone();
        let expr = match self.tok.0 {
            TokenKind::String => Expr::Literal {
                value: Value::from(unescape(span.text())),
                span,
            },
            TokenKind::Number => match Number::from_str(span.text()) {
                Ok(n) => Expr::Literal {
                    value: Value::Number(n),
                    span,
                },
                Err(_) => return Err(span.error("invalid number literal")),
            },
            TokenKind::Word => {
                let value = match span.text() {
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    "null" => Some(Value::Null),
                    "undefined" => Some(Value::Undefined),
                    _ => None,
                };
                match value {
                    Some(value) => Expr::Literal { span, value },
                    None => Expr::Path(parse_path(&span)?),
                }
            }
            TokenKind::Symbol if span.text() == "(" => {
                self.next_token()?;
                let (_, name) = self.parse_name("after `(`")?;
                let (params, hash) = self.parse_args(true)?;
                if !self.is_symbol(")") {
                    return Err(self.error("expecting `)` to close sub-expression"));
                }
                Expr::SubExpr {
                    span,
                    name,
                    params,
                    hash,
                }
            }
            _ => return Err(self.error("unexpected token")),
        };
        self.next_token()?;
        Ok(expr)
    }

    fn parse_args(&mut self, nested: bool) -> Result<(Vec<Expr>, HashArgs)> {
        let mut params = vec![];
        let mut hash = HashArgs::new();
        loop {
            if self.at_end() {
                if nested {
                    return Err(self.error("unterminated sub-expression"));
                }
                break;
            }
            if nested && self.is_symbol(")") {
                break;
            }
            if self.at_hash_key()? {
                let key = self.tok.1.text().to_string();
                self.next_token()?;
                self.next_token()?;
                let value = self.parse_expr()?;
                hash.push((key, value));
            } else {
                if !hash.is_empty() {
                    return Err(self.error("positional argument after named argument"));
                }
                params.push(self.parse_expr()?);
            }
        }
        Ok((params, hash))
    }
}

impl<'source> Parser<'source> {
    pub fn new(source: &'source Source) -> Result<Self> {
        let mut lexer = Lexer::new(source);
        let mut pieces = vec![];
        while let Some(piece) = lexer.next_piece()? {
            pieces.push(piece);
        }
        Ok(Self {
            source,
            pieces,
            pos: 0,
            strip_next: false,
        })
    }

    pub fn parse_template(&mut self) -> Result<Program> {
        let (program, terminator) = self.parse_body()?;
        match terminator {
            Terminator::Eof => Ok(program),
            Terminator::Else(span) | Terminator::ElseChain(span) => {
                Err(span.error("`else` outside of a block"))
            }
            Terminator::Close(span, name) => {
                Err(span.error(&format!("unexpected closing tag `{{{{/{name}}}}}`")))
            }
        }
    }

    fn parse_body(&mut self) -> Result<(Program, Terminator)> {
        let mut body: Vec<Statement> = vec![];
        while self.pos < self.pieces.len() {
            let piece = self.pieces[self.pos].clone();
            self.pos += 1;
            match piece {
                Piece::Text { span, text } => {
                    let text = if core::mem::take(&mut self.strip_next) {
                        text.trim_start().to_string()
                    } else {
                        text
                    };
                    if !text.is_empty() {
                        body.push(Statement::Content(ContentStmt { span, text }));
                    }
                }
                Piece::Comment {
                    strip_before,
                    strip_after,
                    ..
                } => {
                    if strip_before {
                        strip_trailing_ws(&mut body);
                    }
                    self.strip_next = strip_after;
                }
                Piece::Tag {
                    span,
                    inner,
                    strip_before,
                    strip_after,
                    ..
                } => {
                    if strip_before {
                        strip_trailing_ws(&mut body);
                    }
                    self.strip_next = strip_after;
                    if let Some(t) = self.parse_tag(span, inner, &mut body)? {
                        return Ok((Program { body }, t));
                    }
                }
            }
        }
        Ok((Program { body }, Terminator::Eof))
    }

    // Handles one tag; returns a terminator when the tag ends the current body.
    fn parse_tag(
        &mut self,
        span: Span,
        inner: Span,
        body: &mut Vec<Statement>,
    ) -> Result<Option<Terminator>> {
        let inner = advance(&inner, leading_ws(inner.text()));
        let text = inner.text().trim_end();
        if text.is_empty() {
            return Err(span.error("empty mustache tag"));
        }

        if text == "else" || text == "^" {
            return Ok(Some(Terminator::Else(span)));
        }
        if let Some(rest) = text.strip_prefix("else") {
            if rest.starts_with(char::is_whitespace) {
                let header = advance(&inner, 4);
                let header = advance(&header, leading_ws(header.text()));
                return Ok(Some(Terminator::ElseChain(header)));
            }
        }

        match text.as_bytes()[0] {
            b'/' => {
                let name = text[1..].trim().to_string();
                Ok(Some(Terminator::Close(span, name)))
            }
            b'#' => {
                if text[1..].starts_with(['*', '>']) {
                    return Err(span.error("decorators and partial blocks are not supported"));
                }
                let header = advance(&inner, 1);
                let block = self.parse_block(span, header)?;
                body.push(Statement::Block(block));
                Ok(None)
            }
            b'>' => Err(span.error("partials are not supported")),
            b'^' => Err(span.error("inverse sections are not supported; use `{{#unless}}`")),
            b'*' => Err(span.error("decorators are not supported")),
            b'&' => {
                let expr = self.parse_expression(span, &advance(&inner, 1))?;
                body.push(Statement::Expression(expr));
                Ok(None)
            }
            _ => {
                let expr = self.parse_expression(span, &inner)?;
                body.push(Statement::Expression(expr));
                Ok(None)
            }
        }
    }

    fn parse_expression(&self, span: Span, inner: &Span) -> Result<ExpressionStmt> {
        let mut p = TagParser::new(self.source, inner)?;
        if p.at_end() {
            return Err(span.error("empty mustache tag"));
        }
        if p.at_hash_key()? {
            return Err(p.error("expecting expression before named arguments"));
        }
        let head = p.parse_expr()?;
        let (params, hash) = p.parse_args(false)?;
        if (!params.is_empty() || !hash.is_empty()) && !matches!(&head, Expr::Path(path) if path.simple_name().is_some())
        {
            return Err(head.span().error("expecting helper name"));
        }
        Ok(ExpressionStmt {
            span,
            head,
            params,
            hash,
        })
    }

    // Parse `name args...` after `#`, then the body up to the matching close.
    // `open_name` is the name the closing tag must carry, which differs from
    // the header's own name for `{{else if}}` chains.
    fn parse_block_tail(&mut self, span: Span, header: Span, open_name: &str) -> Result<BlockStmt> {
        let mut p = TagParser::new(self.source, &header)?;
        let (name_span, name) = p.parse_name("after `#`")?;
        let (params, hash) = p.parse_args(false)?;
        let kind = BlockKind::from_name(&name);
        if !matches!(kind, BlockKind::Custom(_)) && (params.len() != 1 || !hash.is_empty()) {
            return Err(name_span.error(&format!("`{name}` expects exactly one argument")));
        }

        let (program, terminator) = self.parse_body()?;
        let inverse = match terminator {
            Terminator::Eof => {
                return Err(span.error(&format!("unclosed block `{open_name}`")));
            }
            Terminator::Close(close_span, close) => {
                Self::check_close(&close_span, &close, open_name)?;
                None
            }
            Terminator::Else(_) => {
                let (inverse, terminator) = self.parse_body()?;
                match terminator {
                    Terminator::Close(close_span, close) => {
                        Self::check_close(&close_span, &close, open_name)?
                    }
                    Terminator::Eof => {
                        return Err(span.error(&format!("unclosed block `{open_name}`")))
                    }
                    Terminator::Else(s) | Terminator::ElseChain(s) => {
                        return Err(s.error("duplicate `else` in block"))
                    }
                }
                Some(inverse)
            }
            Terminator::ElseChain(chain) => {
                let nested = self.parse_block_tail(chain.clone(), chain, open_name)?;
                Some(Program {
                    body: vec![Statement::Block(nested)],
                })
            }
        };

        Ok(BlockStmt {
            span,
            kind,
            params,
            hash,
            program,
            inverse,
        })
    }

    fn parse_block(&mut self, span: Span, header: Span) -> Result<BlockStmt> {
        let open_name = TagParser::new(self.source, &header)?
            .tok
            .1
            .text()
            .to_string();
        self.parse_block_tail(span, header, &open_name)
    }

    fn check_close(span: &Span, close: &str, open: &str) -> Result<()> {
        if close == open {
            Ok(())
        } else {
            Err(span.error(&format!(
                "`{{{{/{close}}}}}` does not match `{{{{#{open}}}}}`"
            )))
        }
    }
}
