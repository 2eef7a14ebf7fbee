//! Lexer (tokenizer) for HLSL source
//!
//! Converts raw source text into a flat [`Token`] stream. Whitespace and
//! comments are dropped. Preprocessor directive lines are tokenized like any
//! other text, bracketed by a [`TokenKind::Directive`] token and a closing
//! [`TokenKind::EndDirective`], so the preprocessor never has to look at
//! line structure itself.
//!
//! Literals keep their raw text; turning `0x1F` or `1.5h` into a value is up
//! to whoever consumes the token.

pub mod token;

use std::sync::Arc;

pub use token::{join_tokens, Directive, Keyword, NumericType, ScalarType, Shape, Token, TokenKind};

use crate::diagnostics::{Diagnostic, DiagnosticBag, Error, ErrorPolicy, Location, SourceSpan};

/// Tokens and diagnostics of one lexer run.
#[derive(Debug, Clone, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Lex `source` permissively, with an anonymous file identity.
pub fn lex(source: &str) -> Lexed {
    match lex_file(source, "", "", ErrorPolicy::Permissive) {
        Ok(lexed) => lexed,
        Err(err) => Lexed {
            tokens: Vec::new(),
            diagnostics: err.diagnostic().cloned().into_iter().collect(),
        },
    }
}

/// Lex `source`, attributing every span to `base_path`/`file_name`.
pub fn lex_file(
    source: &str,
    base_path: &str,
    file_name: &str,
    policy: ErrorPolicy,
) -> Result<Lexed, Error> {
    Lexer::new(source, base_path, file_name, policy).tokenize()
}

/// State of the directive line currently being lexed.
struct DirectiveLine {
    kind: Option<Directive>,
    /// Tokens lexed after the directive name.
    tokens: usize,
    /// End offset of the macro name on a `#define` line.
    name_end: Option<usize>,
}

/// Lexer for HLSL source
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    offset: usize,
    base_path: Arc<str>,
    file_name: Arc<str>,
    tokens: Vec<Token>,
    diagnostics: DiagnosticBag,
    at_line_start: bool,
    directive: Option<DirectiveLine>,
}

impl Lexer {
    pub fn new(input: &str, base_path: &str, file_name: &str, policy: ErrorPolicy) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            offset: 0,
            base_path: Arc::from(base_path),
            file_name: Arc::from(file_name),
            tokens: Vec::new(),
            diagnostics: DiagnosticBag::new(policy),
            at_line_start: true,
            directive: None,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(mut self) -> Result<Lexed, Error> {
        loop {
            self.skip_whitespace_and_comments()?;

            if self.directive.is_some() && matches!(self.peek(), Some('\n') | None) {
                self.end_directive();
                continue;
            }

            if self.is_at_end() {
                break;
            }

            if self.peek() == Some('#') && self.at_line_start && self.directive.is_none() {
                self.directive_start();
                continue;
            }

            self.next_token()?;
        }

        Ok(Lexed {
            tokens: self.tokens,
            diagnostics: self.diagnostics.into_vec(),
        })
    }

    /// `#` at the start of a line. Known directive names become one
    /// `Directive` token; anything else is left to the preprocessor as a
    /// `Hash` followed by the rest of the line.
    fn directive_start(&mut self) {
        let start = self.current_location();
        self.advance(); // '#'
        let hash_end = (self.position, self.line, self.column, self.offset);

        while matches!(self.peek(), Some(' ' | '\t')) {
            self.advance();
        }

        let mut name = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let kind = Directive::lookup(&name);
        match kind {
            Some(directive) => self.push(TokenKind::Directive(directive), None, start),
            None => {
                // Rewind so the name is lexed as an ordinary token.
                (self.position, self.line, self.column, self.offset) = hash_end;
                self.push(TokenKind::Hash, None, start);
            }
        }

        self.directive = Some(DirectiveLine {
            kind,
            tokens: 0,
            name_end: None,
        });
    }

    fn end_directive(&mut self) {
        let here = self.current_location();
        self.directive = None;
        self.push(TokenKind::EndDirective, None, here);
        if self.peek() == Some('\n') {
            self.advance();
        }
    }

    /// Get next token
    fn next_token(&mut self) -> Result<(), Error> {
        let start = self.current_location();
        let Some(ch) = self.advance() else {
            return Ok(());
        };

        let kind = match ch {
            '"' => return self.quoted_literal(start, '"', TokenKind::StringLiteral),
            '\'' => return self.quoted_literal(start, '\'', TokenKind::CharLiteral),
            '0'..='9' => return self.number_literal(start, ch),
            '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                return self.number_literal(start, ch)
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                self.word(start, ch);
                return Ok(());
            }
            '<' if self.expects_include_path() => return self.bracketed_string(start),

            '+' => self.pick(&[("+", TokenKind::PlusPlus), ("=", TokenKind::PlusEq)], TokenKind::Plus),
            '-' => self.pick(
                &[("-", TokenKind::MinusMinus), ("=", TokenKind::MinusEq)],
                TokenKind::Minus,
            ),
            '*' => self.pick(&[("=", TokenKind::StarEq)], TokenKind::Star),
            '/' => self.pick(&[("=", TokenKind::SlashEq)], TokenKind::Slash),
            '%' => self.pick(&[("=", TokenKind::PercentEq)], TokenKind::Percent),
            '=' => self.pick(&[("=", TokenKind::EqEq)], TokenKind::Eq),
            '!' => self.pick(&[("=", TokenKind::NotEq)], TokenKind::Bang),
            '<' => self.pick(
                &[("<=", TokenKind::LtLtEq), ("<", TokenKind::LtLt), ("=", TokenKind::Le)],
                TokenKind::Lt,
            ),
            '>' => self.pick(
                &[(">=", TokenKind::GtGtEq), (">", TokenKind::GtGt), ("=", TokenKind::Ge)],
                TokenKind::Gt,
            ),
            '&' => self.pick(&[("&", TokenKind::AndAnd), ("=", TokenKind::AmpEq)], TokenKind::Amp),
            '|' => self.pick(&[("|", TokenKind::OrOr), ("=", TokenKind::PipeEq)], TokenKind::Pipe),
            '^' => self.pick(&[("=", TokenKind::CaretEq)], TokenKind::Caret),
            ':' => self.pick(&[(":", TokenKind::ColonColon)], TokenKind::Colon),
            '#' => self.pick(&[("#", TokenKind::HashHash)], TokenKind::Hash),
            '~' => TokenKind::Tilde,
            '.' => TokenKind::Dot,
            '?' => TokenKind::Question,
            '(' if self.opens_macro_parameters(start) => TokenKind::OpenFunctionLikeMacroParen,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,

            _ => {
                let span = self.span_from(start);
                return self
                    .diagnostics
                    .error(format!("unexpected character '{}'", ch.escape_debug()), span);
            }
        };

        self.push(kind, None, start);
        Ok(())
    }

    /// Longest-match selection of a multi-character operator. Candidates are
    /// the characters following the one already consumed, longest first.
    fn pick(&mut self, candidates: &[(&str, TokenKind)], single: TokenKind) -> TokenKind {
        for (rest, kind) in candidates {
            let matches = rest
                .chars()
                .enumerate()
                .all(|(i, c)| self.peek_ahead(i) == Some(c));
            if matches {
                for _ in 0..rest.chars().count() {
                    self.advance();
                }
                return *kind;
            }
        }
        single
    }

    fn expects_include_path(&self) -> bool {
        matches!(
            &self.directive,
            Some(DirectiveLine {
                kind: Some(Directive::Include),
                tokens: 0,
                ..
            })
        )
    }

    /// `(` directly after the name of a `#define`, with no space between.
    fn opens_macro_parameters(&self, start: Location) -> bool {
        matches!(
            &self.directive,
            Some(DirectiveLine {
                kind: Some(Directive::Define),
                tokens: 1,
                name_end: Some(end),
            }) if *end == start.offset
        )
    }

    /// String or character literal. The lexeme is the raw text between the
    /// quotes, escapes included.
    fn quoted_literal(&mut self, start: Location, quote: char, kind: TokenKind) -> Result<(), Error> {
        let mut text = String::new();

        loop {
            match self.peek() {
                Some(ch) if ch == quote => {
                    self.advance();
                    self.push(kind, Some(text), start);
                    return Ok(());
                }
                Some('\\') => {
                    text.push('\\');
                    self.advance();
                    if let Some(escaped) = self.advance() {
                        text.push(escaped);
                    }
                }
                Some('\n') | None => break,
                Some(ch) => {
                    text.push(ch);
                    self.advance();
                }
            }
        }

        let what = if quote == '"' { "string" } else { "character" };
        self.push(kind, Some(text), start);
        let span = self.span_from(start);
        self.diagnostics
            .error(format!("unterminated {} literal", what), span)
    }

    /// `<path>` on an `#include` line.
    fn bracketed_string(&mut self, start: Location) -> Result<(), Error> {
        let mut path = String::new();

        while let Some(ch) = self.peek() {
            match ch {
                '>' => {
                    self.advance();
                    self.push(TokenKind::BracketedStringLiteral, Some(path), start);
                    return Ok(());
                }
                '\n' => break,
                _ => {
                    path.push(ch);
                    self.advance();
                }
            }
        }

        self.push(TokenKind::BracketedStringLiteral, Some(path), start);
        let span = self.span_from(start);
        self.diagnostics.error("unterminated include path", span)
    }

    /// Integer or float literal, kept as raw text.
    fn number_literal(&mut self, start: Location, first: char) -> Result<(), Error> {
        let begin = self.position - 1;
        let mut is_float = first == '.';

        let is_hex = first == '0'
            && matches!(self.peek(), Some('x' | 'X'))
            && self.peek_ahead(1).is_some_and(|c| c.is_ascii_hexdigit());

        if is_hex {
            self.advance();
            self.eat_while(|c| c.is_ascii_hexdigit());
            self.eat_while(|c| matches!(c, 'u' | 'U' | 'l' | 'L'));
        } else {
            self.eat_while(|c| c.is_ascii_digit());

            if !is_float && self.peek() == Some('.') {
                is_float = true;
                self.advance();
                self.eat_while(|c| c.is_ascii_digit());
            }

            if matches!(self.peek(), Some('e' | 'E')) {
                let digits_at = if matches!(self.peek_ahead(1), Some('+' | '-')) { 2 } else { 1 };
                if self.peek_ahead(digits_at).is_some_and(|c| c.is_ascii_digit()) {
                    is_float = true;
                    for _ in 0..digits_at {
                        self.advance();
                    }
                    self.eat_while(|c| c.is_ascii_digit());
                }
            }

            while let Some(ch) = self.peek() {
                match ch {
                    'f' | 'F' | 'h' | 'H' => is_float = true,
                    'u' | 'U' | 'l' | 'L' => {}
                    _ => break,
                }
                self.advance();
            }
        }

        let text: String = self.input[begin..self.position].iter().collect();
        let kind = if is_float {
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntLiteral
        };
        self.push(kind, Some(text), start);
        Ok(())
    }

    /// Identifier, keyword or numeric type name.
    fn word(&mut self, start: Location, first: char) {
        let mut word = String::new();
        word.push(first);

        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                word.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match TokenKind::classify(&word) {
            TokenKind::Identifier => self.push(TokenKind::Identifier, Some(word), start),
            kind => self.push(kind, None, start),
        }
    }

    fn push(&mut self, kind: TokenKind, lexeme: Option<String>, start: Location) {
        let span = self.span_from(start);

        if let Some(line) = &mut self.directive {
            if line.kind == Some(Directive::Define) && line.tokens == 0 && kind.is_word() {
                line.name_end = Some(span.end.offset);
            }
            line.tokens += 1;
        }

        self.tokens.push(Token::new(kind, lexeme, span));
        self.at_line_start = false;
    }

    /// Skip whitespace and comments. Inside a directive the newline is left
    /// for the caller, since it ends the directive.
    fn skip_whitespace_and_comments(&mut self) -> Result<(), Error> {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r' | '\x0b' | '\x0c') => {
                    self.advance();
                }
                Some('\n') if self.directive.is_none() => {
                    self.advance();
                }
                Some('\\') if self.at_line_continuation() => {
                    let at_line_start = self.at_line_start;
                    self.advance();
                    if self.peek() == Some('\r') {
                        self.advance();
                    }
                    self.advance();
                    self.at_line_start = at_line_start;
                }
                Some('/') => match self.peek_ahead(1) {
                    Some('/') => self.skip_line_comment(),
                    Some('*') => self.skip_block_comment()?,
                    _ => break,
                },
                _ => break,
            }
        }
        Ok(())
    }

    fn at_line_continuation(&self) -> bool {
        match self.peek_ahead(1) {
            Some('\n') => true,
            Some('\r') => self.peek_ahead(2) == Some('\n'),
            _ => false,
        }
    }

    /// Skip single-line comment (// ...), stopping before the newline
    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    /// Skip multi-line comment (/* ... */)
    fn skip_block_comment(&mut self) -> Result<(), Error> {
        let start = self.current_location();
        self.advance(); // skip '/'
        self.advance(); // skip '*'

        while !self.is_at_end() {
            if self.peek() == Some('*') && self.peek_ahead(1) == Some('/') {
                self.advance(); // skip '*'
                self.advance(); // skip '/'
                return Ok(());
            }
            self.advance();
        }

        let span = self.span_from(start);
        self.diagnostics.error("unterminated block comment", span)
    }

    fn eat_while(&mut self, accept: impl Fn(char) -> bool) {
        while let Some(ch) = self.peek() {
            if !accept(ch) {
                break;
            }
            self.advance();
        }
    }

    /// Peek at current character without consuming
    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    /// Peek ahead n characters
    fn peek_ahead(&self, n: usize) -> Option<char> {
        self.input.get(self.position + n).copied()
    }

    /// Advance to next character
    fn advance(&mut self) -> Option<char> {
        let ch = *self.input.get(self.position)?;
        self.position += 1;
        self.offset += ch.len_utf8();

        if ch == '\n' {
            self.line += 1;
            self.column = 1;
            self.at_line_start = true;
        } else {
            self.column += 1;
        }

        Some(ch)
    }

    /// Check if at end of input
    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Get current source location
    fn current_location(&self) -> Location {
        Location::new(self.line, self.column, self.offset)
    }

    fn span_from(&self, start: Location) -> SourceSpan {
        SourceSpan::new(
            Arc::clone(&self.base_path),
            Arc::clone(&self.file_name),
            start,
            self.current_location(),
        )
    }
}
