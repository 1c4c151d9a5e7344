// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::error::TemplateError;
use crate::literal;
use crate::Rc;

use core::fmt::{self, Debug, Formatter};
use core::iter::Peekable;
use core::str::CharIndices;

type Result<T> = core::result::Result<T, TemplateError>;

#[derive(Clone)]
struct SourceInternal {
    pub file: String,
    pub contents: String,
    pub lines: Vec<(u32, u32)>,
}

/// Template text plus line table, shared by every span cut from it.
#[derive(Clone)]
pub struct Source {
    src: Rc<SourceInternal>,
}

impl Debug for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.src.file.fmt(f)
    }
}

impl PartialEq for Source {
    fn eq(&self, other: &Source) -> bool {
        Rc::ptr_eq(&self.src, &other.src)
    }
}

impl Source {
    pub fn from_contents(file: impl Into<String>, contents: impl Into<String>) -> Result<Source> {
        let file = file.into();
        let contents = contents.into();
        let max_size = u32::MAX as usize - 2; // Account for rows, cols possibly starting at 1, EOF etc.
        if contents.len() > max_size {
            return Err(TemplateError::Parse {
                message: format!("{file} exceeds maximum allowed template size {max_size}"),
                line: 0,
                col: 0,
            });
        }
        let mut lines = vec![];
        let mut prev_ch = ' ';
        let mut prev_pos = 0u32;
        let mut start = 0u32;
        for (i, ch) in contents.char_indices() {
            if ch == '\n' {
                let end = match prev_ch {
                    '\r' => prev_pos,
                    _ => i as u32,
                };
                lines.push((start, end));
                start = i as u32 + 1;
            }
            prev_ch = ch;
            prev_pos = i as u32;
        }

        if (start as usize) < contents.len() {
            lines.push((start, contents.len() as u32));
        } else if contents.is_empty() {
            lines.push((0, 0));
        } else {
            let s = contents.len() as u32;
            lines.push((s, s));
        }
        Ok(Self {
            src: Rc::new(SourceInternal {
                file,
                contents,
                lines,
            }),
        })
    }

    pub fn file(&self) -> &String {
        &self.src.file
    }

    pub fn contents(&self) -> &String {
        &self.src.contents
    }

    pub fn line(&self, idx: u32) -> &str {
        let idx = idx as usize;
        match self.src.lines.get(idx) {
            Some((start, end)) => &self.src.contents[*start as usize..*end as usize],
            None => "",
        }
    }

    pub fn message(&self, line: u32, col: u32, kind: &str, msg: &str) -> String {
        if line == 0 || line as usize > self.src.lines.len() {
            return format!("{}: invalid line {} specified", self.src.file, line);
        }

        let line_str = format!("{line}");
        let line_num_width = line_str.len() + 1;
        let col_spaces = col.saturating_sub(1) as usize;

        format!(
            "\n--> {}:{}:{}\n{:<line_num_width$}|\n\
		{:<line_num_width$}| {}\n\
		{:<line_num_width$}| {:<col_spaces$}^\n\
		{}: {}",
            self.src.file,
            line,
            col,
            "",
            line,
            self.line(line - 1),
            "",
            "",
            kind,
            msg
        )
    }

    pub fn error(&self, line: u32, col: u32, msg: &str) -> TemplateError {
        TemplateError::Parse {
            message: self.message(line, col, "error", msg),
            line,
            col,
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct Span {
    pub source: Source,
    pub line: u32,
    pub col: u32,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn text(&self) -> &str {
        &self.source.contents()[self.start as usize..self.end as usize]
    }

    pub fn message(&self, kind: &str, msg: &str) -> String {
        self.source.message(self.line, self.col, kind, msg)
    }

    pub fn error(&self, msg: &str) -> TemplateError {
        self.source.error(self.line, self.col, msg)
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let t = self.text().escape_debug().to_string();
        let max = 32;
        let (txt, trailer) = if t.len() > max {
            (t.chars().take(max).collect::<String>(), "...")
        } else {
            (t, "")
        };

        f.write_fmt(format_args!(
            "{}:{}:{}:{}, \"{}{}\"",
            self.line, self.col, self.start, self.end, txt, trailer
        ))
    }
}

/// Brace style of a mustache tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Braces {
    Double,
    Triple,
}

/// A top level piece of template source: literal text or a `{{ ... }}` tag.
#[derive(Debug, Clone)]
pub enum Piece {
    /// Literal text. `text` differs from the span when `\{{` escapes were removed.
    Text { span: Span, text: String },
    Comment {
        span: Span,
        strip_before: bool,
        strip_after: bool,
    },
    Tag {
        span: Span,
        inner: Span,
        braces: Braces,
        strip_before: bool,
        strip_after: bool,
    },
}

#[derive(Clone)]
pub struct Lexer<'source> {
    source: Source,
    contents: &'source str,
    iter: Peekable<CharIndices<'source>>,
    line: u32,
    col: u32,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source Source) -> Self {
        Self {
            source: source.clone(),
            contents: source.contents().as_str(),
            iter: source.contents().char_indices().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn peek(&mut self) -> (usize, char) {
        match self.iter.peek() {
            Some((index, chr)) => (*index, *chr),
            _ => (self.contents.len(), '\x00'),
        }
    }

    fn bump(&mut self) -> char {
        match self.iter.next() {
            Some((_, '\n')) => {
                self.line += 1;
                self.col = 1;
                '\n'
            }
            Some((_, ch)) => {
                self.col += 1;
                ch
            }
            None => '\x00',
        }
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    fn rest(&mut self) -> &'source str {
        let pos = self.peek().0;
        &self.contents[pos..]
    }

    fn span(&self, line: u32, col: u32, start: usize, end: usize) -> Span {
        Span {
            source: self.source.clone(),
            line,
            col,
            start: start as u32,
            end: end as u32,
        }
    }

    fn read_text(&mut self) -> Piece {
        let (start, _) = self.peek();
        let (line, col) = (self.line, self.col);
        let mut text = String::new();
        loop {
            let rest = self.rest();
            if rest.is_empty() || rest.starts_with("{{") {
                break;
            }
            if rest.starts_with("\\{{") {
                // Escaped mustache: drop the backslash, keep the braces as text.
                self.bump();
                self.bump_n(2);
                text.push_str("{{");
                continue;
            }
            text.push(self.bump());
        }
        let end = self.peek().0;
        Piece::Text {
            span: self.span(line, col, start, end),
            text,
        }
    }

    // Scan to the closing `}}`, skipping over quoted strings.
    fn find_close(&mut self, close: &str, line: u32, col: u32) -> Result<(usize, bool)> {
        let mut quote: Option<char> = None;
        loop {
            let rest = self.rest();
            let (pos, ch) = self.peek();
            if rest.is_empty() {
                return Err(self.source.error(line, col, "unterminated mustache tag"));
            }
            match quote {
                Some(_) if ch == '\\' => {
                    self.bump();
                    if !self.rest().is_empty() {
                        self.bump();
                    }
                    continue;
                }
                Some(q) if ch == q => quote = None,
                Some(_) => (),
                None if ch == '"' || ch == '\'' => quote = Some(ch),
                None if rest.starts_with('~') && rest[1..].starts_with(close) => {
                    self.bump();
                    self.bump_n(close.len());
                    return Ok((pos, true));
                }
                None if rest.starts_with(close) => {
                    self.bump_n(close.len());
                    return Ok((pos, false));
                }
                None => (),
            }
            self.bump();
        }
    }

    fn read_comment(&mut self, start: usize, line: u32, col: u32, strip_before: bool) -> Result<Piece> {
        let long = self.rest().starts_with("!--");
        let close = if long { "--" } else { "" };
        self.bump_n(if long { 3 } else { 1 });
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Err(self.source.error(line, col, "unterminated comment"));
            }
            if let Some(after) = rest.strip_prefix(close) {
                if after.starts_with("~}}") {
                    self.bump_n(close.len() + 3);
                    let end = self.peek().0;
                    return Ok(Piece::Comment {
                        span: self.span(line, col, start, end),
                        strip_before,
                        strip_after: true,
                    });
                }
                if after.starts_with("}}") {
                    self.bump_n(close.len() + 2);
                    let end = self.peek().0;
                    return Ok(Piece::Comment {
                        span: self.span(line, col, start, end),
                        strip_before,
                        strip_after: false,
                    });
                }
            }
            self.bump();
        }
    }

    fn read_tag(&mut self) -> Result<Piece> {
        let (start, _) = self.peek();
        let (line, col) = (self.line, self.col);
        self.bump_n(2);

        let braces = if self.rest().starts_with('{') {
            self.bump();
            Braces::Triple
        } else {
            Braces::Double
        };

        let strip_before = self.rest().starts_with('~');
        if strip_before {
            self.bump();
        }

        if braces == Braces::Double && self.rest().starts_with('!') {
            return self.read_comment(start, line, col, strip_before);
        }

        let (inner_start, inner_line, inner_col) = (self.peek().0, self.line, self.col);
        let close = match braces {
            Braces::Double => "}}",
            Braces::Triple => "}}}",
        };
        let (inner_end, strip_after) = self.find_close(close, line, col)?;
        let end = self.peek().0;

        Ok(Piece::Tag {
            span: self.span(line, col, start, end),
            inner: self.span(inner_line, inner_col, inner_start, inner_end),
            braces,
            strip_before,
            strip_after,
        })
    }

    pub fn next_piece(&mut self) -> Result<Option<Piece>> {
        let rest = self.rest();
        if rest.is_empty() {
            return Ok(None);
        }
        if rest.starts_with("{{") {
            return self.read_tag().map(Some);
        }
        Ok(Some(self.read_text()))
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TokenKind {
    Symbol,
    String,
    Number,
    Word,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token(pub TokenKind, pub Span);

/// Tokenizer for the inside of a single tag.
#[derive(Clone)]
pub struct TagLexer<'source> {
    source: Source,
    contents: &'source str,
    iter: Peekable<CharIndices<'source>>,
    base: usize,
    end: usize,
    line: u32,
    col: u32,
}

impl<'source> TagLexer<'source> {
    pub fn new(source: &'source Source, inner: &Span) -> Self {
        let (base, end) = (inner.start as usize, inner.end as usize);
        Self {
            source: source.clone(),
            contents: source.contents().as_str(),
            iter: source.contents()[base..end].char_indices().peekable(),
            base,
            end,
            line: inner.line,
            col: inner.col,
        }
    }

    fn peek(&mut self) -> (usize, char) {
        match self.iter.peek() {
            Some((index, chr)) => (self.base + *index, *chr),
            _ => (self.end, '\x00'),
        }
    }

    fn bump(&mut self) -> char {
        match self.iter.next() {
            Some((_, '\n')) => {
                self.line += 1;
                self.col = 1;
                '\n'
            }
            Some((_, ch)) => {
                self.col += 1;
                ch
            }
            None => '\x00',
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().1.is_whitespace() {
            self.bump();
        }
    }

    fn span(&self, line: u32, col: u32, start: usize, end: usize) -> Span {
        Span {
            source: self.source.clone(),
            line,
            col,
            start: start as u32,
            end: end as u32,
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Token> {
        let (line, col) = (self.line, self.col);
        self.bump();
        let start = self.peek().0;
        loop {
            let (pos, ch) = self.peek();
            match ch {
                '\x00' if pos >= self.end => {
                    return Err(self.source.error(line, col, "unmatched quote in string"))
                }
                '\\' => {
                    self.bump();
                    self.bump();
                }
                c if c == quote => {
                    self.bump();
                    return Ok(Token(TokenKind::String, self.span(line, col, start, pos)));
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn read_word(&mut self) -> Result<Token> {
        let (start, _) = self.peek();
        let (line, col) = (self.line, self.col);
        loop {
            let (pos, ch) = self.peek();
            if pos >= self.end || ch.is_whitespace() || matches!(ch, '(' | ')' | '=' | '"' | '\'')
            {
                break;
            }
            if ch == '[' {
                // Literal segment; may contain any character except `]`.
                self.bump();
                loop {
                    let (pos, ch) = self.peek();
                    if pos >= self.end {
                        return Err(self.source.error(line, col, "unterminated `[` in path"));
                    }
                    self.bump();
                    if ch == ']' {
                        break;
                    }
                }
                continue;
            }
            self.bump();
        }
        let end = self.peek().0;
        let text = &self.contents[start..end];
        let kind = if literal::is_number_literal(text) {
            TokenKind::Number
        } else {
            TokenKind::Word
        };
        Ok(Token(kind, self.span(line, col, start, end)))
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_ws();
        let (start, chr) = self.peek();
        if start >= self.end {
            return Ok(Token(
                TokenKind::Eof,
                self.span(self.line, self.col, self.end, self.end),
            ));
        }
        match chr {
            '(' | ')' | '=' => {
                let (line, col) = (self.line, self.col);
                self.bump();
                Ok(Token(
                    TokenKind::Symbol,
                    self.span(line, col, start, start + 1),
                ))
            }
            '"' | '\'' => self.read_string(chr),
            _ => self.read_word(),
        }
    }
}
