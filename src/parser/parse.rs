//! Main parser coordinator
//!
//! This module provides the [`Parser`] struct and core parsing infrastructure:
//! token cursor helpers, error reporting, speculative parsing and recovery.
//!
//! # Parser Architecture
//!
//! The Parser uses a recursive descent approach with the following organization:
//! - This module: Parser struct, helper methods, and coordination
//! - `declarations`: functions, variables, structs, buffers and namespaces
//! - `statements`: statements (if, while, for, switch, ...)
//! - `expressions`: expressions with precedence climbing
//!
//! # Errors
//!
//! Every syntax error goes through the parser's [`DiagnosticBag`]. In
//! permissive mode it is recorded and parsing continues with a placeholder
//! node; in strict mode the first error ends the parse. Inside
//! [`Parser::speculate`] any error abandons the trial and rewinds.

use log::trace;

use crate::diagnostics::{Diagnostic, DiagnosticBag, Error, ErrorPolicy, SourceSpan};
use crate::lexer::{Keyword, Token, TokenKind};
use crate::parser::ast::*;

pub type PResult<T> = Result<T, Error>;

/// A parsed node together with everything reported while parsing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub node: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Parsed<T> {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Recursive descent parser for HLSL
pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) position: usize,
    pub(crate) diagnostics: DiagnosticBag,
}

impl Parser {
    /// Parser over preprocessed tokens. An end-of-file token is appended.
    pub fn new(tokens: &[Token], policy: ErrorPolicy) -> Self {
        let eof_span = tokens
            .last()
            .map(|token| token.span.end_point())
            .unwrap_or_else(SourceSpan::detached);
        let mut tokens = tokens.to_vec();
        tokens.push(Token::new(TokenKind::Eof, None, eof_span));

        Self {
            tokens,
            position: 0,
            diagnostics: DiagnosticBag::new(policy),
        }
    }

    pub fn finish<T>(self, node: T) -> Parsed<T> {
        Parsed {
            node,
            diagnostics: self.diagnostics.into_vec(),
        }
    }

    /// Parse the whole token stream as a translation unit.
    pub fn parse_translation_unit(&mut self) -> PResult<TranslationUnit> {
        let start = self.current_span();
        let mut declarations = Vec::new();

        while !self.is_at_end() {
            let position = self.position;
            let errors = self.diagnostics.error_count();
            let decl = self.parse_top_level_declaration()?;
            if self.diagnostics.error_count() > errors {
                self.synchronize(position);
            }
            declarations.push(decl);
        }

        Ok(TranslationUnit {
            declarations,
            span: self.span_from(&start),
        })
    }

    /// Report anything left over after a single node was parsed.
    pub(crate) fn expect_end(&mut self, what: &str) -> PResult<()> {
        if !self.is_at_end() {
            let message = format!("unexpected {} after {}", self.peek(), what);
            self.error(message, self.current_span())?;
        }
        Ok(())
    }

    // ===== Helper methods =====

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.position]
    }

    pub(crate) fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    /// Token `n` places ahead, clamped to the end of input.
    pub(crate) fn peek_ahead(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.position + n).min(last)]
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.position.saturating_sub(1)]
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.peek().is(TokenKind::Eof)
    }

    pub(crate) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.position += 1;
        }
        self.previous()
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    pub(crate) fn check_keyword(&self, keyword: Keyword) -> bool {
        self.check(TokenKind::Keyword(keyword))
    }

    pub(crate) fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn match_keyword(&mut self, keyword: Keyword) -> bool {
        self.match_token(TokenKind::Keyword(keyword))
    }

    pub(crate) fn current_span(&self) -> SourceSpan {
        self.peek().span.clone()
    }

    /// Span from `start` to the end of the last consumed token.
    pub(crate) fn span_from(&self, start: &SourceSpan) -> SourceSpan {
        if self.position == 0 {
            return start.clone();
        }
        start.to(&self.previous().span)
    }

    pub(crate) fn error(&mut self, message: impl Into<String>, span: SourceSpan) -> PResult<()> {
        self.diagnostics.error(message, span)
    }

    /// Report "expected `what`, found ..." at the current token.
    pub(crate) fn error_expected(&mut self, what: &str) -> PResult<()> {
        let message = format!("expected {}, found {}", what, self.peek());
        self.error(message, self.current_span())
    }

    /// Consume a `kind` token or report it missing. Returns whether it was
    /// there.
    pub(crate) fn expect_token(&mut self, kind: TokenKind, ctx: &str) -> PResult<bool> {
        if self.match_token(kind) {
            return Ok(true);
        }
        let message = format!("expected {} {}, found {}", kind, ctx, self.peek());
        self.error(message, self.current_span())?;
        Ok(false)
    }

    pub(crate) fn expect_semicolon(&mut self, ctx: &str) -> PResult<bool> {
        self.expect_token(TokenKind::Semicolon, ctx)
    }

    /// Consume an identifier, or report it missing and return an empty name.
    pub(crate) fn expect_identifier(&mut self, ctx: &str) -> PResult<String> {
        if self.check(TokenKind::Identifier) {
            let name = self.advance().text().into_owned();
            return Ok(name);
        }
        let message = format!("expected identifier {}, found {}", ctx, self.peek());
        self.error(message, self.current_span())?;
        Ok(String::new())
    }

    // ===== Speculation and recovery =====

    /// Run `trial` without recording diagnostics. Any error it hits rewinds
    /// the cursor and yields `None`.
    pub(crate) fn speculate<T>(&mut self, trial: impl FnOnce(&mut Self) -> PResult<T>) -> Option<T> {
        let start = self.position;
        self.diagnostics.begin_speculation();
        let result = trial(self);
        self.diagnostics.end_speculation();

        match result {
            Ok(node) => Some(node),
            Err(err) => {
                trace!("rewinding to token {}: {}", start, err);
                self.position = start;
                None
            }
        }
    }

    /// Abandon a trial parse. Only meaningful inside [`Parser::speculate`].
    pub(crate) fn reject<T>(&self, what: &str) -> PResult<T> {
        let message = format!("not {}", what);
        Err(Error::Aborted(Diagnostic::error(message, self.current_span())))
    }

    /// Skip to a statement boundary after an error in a construct that began
    /// at token `start`: just past a `;`, or just before a `}`. Always makes
    /// progress.
    pub(crate) fn synchronize(&mut self, start: usize) {
        if self.position > start
            && matches!(
                self.previous().kind,
                TokenKind::Semicolon | TokenKind::RBrace
            )
        {
            return;
        }

        if self.position == start {
            let kind = self.advance().kind;
            if matches!(kind, TokenKind::Semicolon | TokenKind::RBrace) {
                return;
            }
        }

        while !self.is_at_end() && !self.check(TokenKind::RBrace) {
            if self.advance().is(TokenKind::Semicolon) {
                return;
            }
        }
    }

    /// Parse `item`s up to a closing `}` (not consumed), resynchronizing
    /// after any item that reported an error.
    pub(crate) fn parse_until_brace<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> PResult<T>,
    ) -> PResult<Vec<T>> {
        let mut items = Vec::new();

        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            let position = self.position;
            let errors = self.diagnostics.error_count();
            let node = item(self)?;
            if self.diagnostics.error_count() > errors {
                self.synchronize(position);
            }
            items.push(node);
        }

        Ok(items)
    }

    /// Split a `>>` at the cursor into two `>` tokens, for nested template
    /// argument lists.
    pub(crate) fn split_shift_right(&mut self) {
        if !self.check(TokenKind::GtGt) {
            return;
        }
        let span = self.current_span();
        let mut first = span.clone();
        first.end = first.start;
        first.end.column += 1;
        first.end.offset += 1;
        let mut second = span;
        second.start = first.end;

        self.tokens[self.position] = Token::new(TokenKind::Gt, None, first);
        self.tokens
            .insert(self.position + 1, Token::new(TokenKind::Gt, None, second));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parser(source: &str) -> Parser {
        Parser::new(&lex(source).tokens, ErrorPolicy::Permissive)
    }

    #[test]
    fn test_speculate_rewinds_on_error() {
        let mut parser = parser("a b c");
        let result: Option<()> = parser.speculate(|p| {
            p.advance();
            p.advance();
            p.error("nope", p.current_span())?;
            Ok(())
        });
        assert_eq!(result, None);
        assert_eq!(parser.position, 0);
        assert!(parser.diagnostics.diagnostics().is_empty());
    }

    #[test]
    fn test_speculate_keeps_position_on_success() {
        let mut parser = parser("a b c");
        let result = parser.speculate(|p| {
            p.advance();
            Ok(p.previous().text().into_owned())
        });
        assert_eq!(result.as_deref(), Some("a"));
        assert_eq!(parser.position, 1);
    }

    #[test]
    fn test_synchronize_stops_after_semicolon() {
        let mut parser = parser("x y z ; w");
        parser.synchronize(0);
        assert_eq!(parser.peek().text(), "w");
    }

    #[test]
    fn test_synchronize_stops_before_brace() {
        let mut parser = parser("x y } w");
        parser.advance();
        parser.synchronize(0);
        assert!(parser.check(TokenKind::RBrace));
    }

    #[test]
    fn test_synchronize_always_advances() {
        let mut parser = parser("} w");
        parser.synchronize(0);
        assert_eq!(parser.peek().text(), "w");
    }

    #[test]
    fn test_split_shift_right() {
        let mut parser = parser(">> x");
        parser.split_shift_right();
        assert!(parser.match_token(TokenKind::Gt));
        assert!(parser.match_token(TokenKind::Gt));
        assert_eq!(parser.peek().text(), "x");
    }

    #[test]
    fn test_peek_ahead_clamps_to_eof() {
        let parser = parser("a");
        assert!(parser.peek_ahead(5).is(TokenKind::Eof));
    }
}
