//! Statement parsing implementation
//!
//! This module handles parsing of all HLSL statement types:
//!
//! - Variable declarations: `float3 n = normalize(input.normal);`
//! - Control flow: `if`, `while`, `for`, `do-while`, `switch`
//! - Jump statements: `return`, `break`, `continue`, `discard`
//! - Compound statements: `{ ... }`
//! - Expression statements: function calls, assignments
//!
//! # Grammar
//!
//! ```text
//! statement ::= attribute* ( block | if_stmt | while_stmt | for_stmt
//!             | do_while_stmt | switch_stmt | return_stmt
//!             | break_stmt | continue_stmt | discard_stmt
//!             | type_decl | var_decl | expr_stmt | ";" )
//! ```
//!
//! `var_decl` and `expr_stmt` both may start with an identifier. A trial
//! parse of a type followed by a name decides: `Foo bar;` declares,
//! `foo = bar;` and `float4(0, 0, 0, 1);` are expressions.

use crate::diagnostics::SourceSpan;
use crate::lexer::{Keyword, TokenKind};
use crate::parser::ast::*;
use crate::parser::parse::{PResult, Parser};

impl Parser {
    /// Parse `{ statements }`
    pub(crate) fn parse_block(&mut self) -> PResult<Block> {
        let start = self.current_span();
        self.expect_token(TokenKind::LBrace, "to open block")?;
        let statements = self.parse_until_brace(Self::parse_statement)?;
        self.expect_token(TokenKind::RBrace, "after block")?;

        Ok(Block {
            statements,
            span: self.span_from(&start),
        })
    }

    /// Parse a statement
    pub(crate) fn parse_statement(&mut self) -> PResult<Stmt> {
        let start = self.current_span();
        let attributes = self.parse_attributes()?;

        match self.peek_kind() {
            TokenKind::Keyword(Keyword::If) => return self.parse_if_statement(start, attributes),
            TokenKind::Keyword(Keyword::While) => {
                return self.parse_while_statement(start, attributes)
            }
            TokenKind::Keyword(Keyword::Do) => {
                return self.parse_do_while_statement(start, attributes)
            }
            TokenKind::Keyword(Keyword::For) => return self.parse_for_statement(start, attributes),
            TokenKind::Keyword(Keyword::Switch) => {
                return self.parse_switch_statement(start, attributes)
            }
            _ => {}
        }

        for attribute in &attributes {
            self.diagnostics.warning(
                format!("attribute '{}' has no effect here", attribute.name),
                attribute.span.clone(),
            )?;
        }

        match self.peek_kind() {
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::Semicolon => {
                self.advance();
                Ok(Stmt::Empty(start))
            }
            TokenKind::Keyword(Keyword::Return) => {
                self.advance();
                let value = if self.check(TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect_semicolon("after return statement")?;
                Ok(Stmt::Return {
                    value,
                    span: self.span_from(&start),
                })
            }
            TokenKind::Keyword(Keyword::Break) => {
                self.advance();
                self.expect_semicolon("after 'break'")?;
                Ok(Stmt::Break(self.span_from(&start)))
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.advance();
                self.expect_semicolon("after 'continue'")?;
                Ok(Stmt::Continue(self.span_from(&start)))
            }
            TokenKind::Keyword(Keyword::Discard) => {
                self.advance();
                self.expect_semicolon("after 'discard'")?;
                Ok(Stmt::Discard(self.span_from(&start)))
            }
            TokenKind::Keyword(Keyword::Struct | Keyword::Class) if self.is_struct_definition() => {
                let decl = self.parse_top_level_declaration()?;
                Ok(Stmt::Declaration(Box::new(decl)))
            }
            TokenKind::Keyword(Keyword::Interface | Keyword::Typedef) => {
                let decl = self.parse_top_level_declaration()?;
                Ok(Stmt::Declaration(Box::new(decl)))
            }
            _ => self.parse_declaration_or_expression_statement(start),
        }
    }

    fn parse_declaration_or_expression_statement(
        &mut self,
        start: SourceSpan,
    ) -> PResult<Stmt> {
        if let Some((modifiers, ty)) = self.speculate(Self::parse_declaration_head) {
            let decl = self.parse_variable_rest(start, modifiers, ty)?;
            return Ok(Stmt::Variable(decl));
        }

        let expr = self.parse_expression()?;
        self.expect_semicolon("after expression")?;
        Ok(Stmt::Expression {
            expr,
            span: self.span_from(&start),
        })
    }

    /// Parenthesized condition of `if`, `while`, `do`, `switch`.
    fn parse_condition(&mut self, keyword: &str) -> PResult<Expr> {
        self.expect_token(TokenKind::LParen, &format!("after '{}'", keyword))?;
        let condition = self.parse_expression()?;
        self.expect_token(TokenKind::RParen, &format!("after {} condition", keyword))?;
        Ok(condition)
    }

    /// Parse if statement: if (cond) stmt [else stmt]
    fn parse_if_statement(
        &mut self,
        start: SourceSpan,
        attributes: Vec<Attribute>,
    ) -> PResult<Stmt> {
        self.advance();
        let condition = self.parse_condition("if")?;
        let then_branch = Box::new(self.parse_statement()?);

        // A dangling else binds to the nearest if
        let else_branch = if self.match_keyword(Keyword::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            attributes,
            condition,
            then_branch,
            else_branch,
            span: self.span_from(&start),
        })
    }

    /// Parse while loop: while (cond) stmt
    fn parse_while_statement(
        &mut self,
        start: SourceSpan,
        attributes: Vec<Attribute>,
    ) -> PResult<Stmt> {
        self.advance();
        let condition = self.parse_condition("while")?;
        let body = Box::new(self.parse_statement()?);

        Ok(Stmt::While {
            attributes,
            condition,
            body,
            span: self.span_from(&start),
        })
    }

    /// Parse do-while loop: do stmt while (cond);
    fn parse_do_while_statement(
        &mut self,
        start: SourceSpan,
        attributes: Vec<Attribute>,
    ) -> PResult<Stmt> {
        self.advance();
        let body = Box::new(self.parse_statement()?);

        if !self.match_keyword(Keyword::While) {
            self.error_expected("'while' after do-while body")?;
        }
        let condition = self.parse_condition("while")?;
        self.expect_semicolon("after do-while condition")?;

        Ok(Stmt::DoWhile {
            attributes,
            body,
            condition,
            span: self.span_from(&start),
        })
    }

    /// Parse for loop: for (init; cond; increment) stmt
    fn parse_for_statement(
        &mut self,
        start: SourceSpan,
        attributes: Vec<Attribute>,
    ) -> PResult<Stmt> {
        self.advance();
        self.expect_token(TokenKind::LParen, "after 'for'")?;

        // The init clause consumes its own ';'
        let init = if self.match_token(TokenKind::Semicolon) {
            None
        } else {
            let init_start = self.current_span();
            Some(Box::new(
                self.parse_declaration_or_expression_statement(init_start)?,
            ))
        };

        let condition = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_semicolon("after for loop condition")?;

        let increment = if self.check(TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_token(TokenKind::RParen, "after for clauses")?;

        let body = Box::new(self.parse_statement()?);

        Ok(Stmt::For {
            attributes,
            init,
            condition,
            increment,
            body,
            span: self.span_from(&start),
        })
    }

    /// Parse switch statement: switch (expr) { case N: ... default: ... }
    fn parse_switch_statement(
        &mut self,
        start: SourceSpan,
        attributes: Vec<Attribute>,
    ) -> PResult<Stmt> {
        self.advance();
        let selector = self.parse_condition("switch")?;

        self.expect_token(TokenKind::LBrace, "after switch condition")?;
        let clauses = self.parse_until_brace(Self::parse_switch_clause)?;
        self.expect_token(TokenKind::RBrace, "after switch body")?;

        Ok(Stmt::Switch {
            attributes,
            selector,
            clauses: clauses.into_iter().flatten().collect(),
            span: self.span_from(&start),
        })
    }

    fn parse_switch_clause(&mut self) -> PResult<Option<SwitchClause>> {
        let start = self.current_span();
        let mut labels = Vec::new();

        loop {
            if self.match_keyword(Keyword::Case) {
                let value = self.parse_expression()?;
                self.expect_token(TokenKind::Colon, "after case value")?;
                labels.push(SwitchLabel::Case(value));
            } else if self.check_keyword(Keyword::Default) {
                let span = self.current_span();
                self.advance();
                self.expect_token(TokenKind::Colon, "after 'default'")?;
                labels.push(SwitchLabel::Default(span));
            } else {
                break;
            }
        }

        if labels.is_empty() {
            self.error_expected("'case' or 'default'")?;
            return Ok(None);
        }

        let mut statements = Vec::new();
        while !self.check_keyword(Keyword::Case)
            && !self.check_keyword(Keyword::Default)
            && !self.check(TokenKind::RBrace)
            && !self.is_at_end()
        {
            let position = self.position;
            let errors = self.diagnostics.error_count();
            let stmt = self.parse_statement()?;
            if self.diagnostics.error_count() > errors {
                self.synchronize(position);
            }
            statements.push(stmt);
        }

        Ok(Some(SwitchClause {
            labels,
            statements,
            span: self.span_from(&start),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ErrorPolicy;
    use crate::lexer::lex;

    fn stmt(source: &str) -> Stmt {
        let mut parser = Parser::new(&lex(source).tokens, ErrorPolicy::Strict);
        let stmt = parser.parse_statement().unwrap();
        assert!(parser.is_at_end(), "left over input in {:?}", source);
        stmt
    }

    #[test]
    fn test_user_type_declaration() {
        let Stmt::Variable(decl) = stmt("Light sun;") else {
            panic!("expected declaration");
        };
        assert!(matches!(&decl.ty, TypeNode::Named(name) if name.to_string() == "Light"));
        assert_eq!(decl.declarators[0].name, "sun");
    }

    #[test]
    fn test_expression_statements() {
        assert!(matches!(stmt("x = y;"), Stmt::Expression { .. }));
        assert!(matches!(stmt("x;"), Stmt::Expression { .. }));
        assert!(matches!(stmt("float4(0, 0, 0, 1);"), Stmt::Expression { .. }));
        assert!(matches!(stmt("stream.Append(v);"), Stmt::Expression { .. }));
    }

    #[test]
    fn test_attribute_on_plain_statement_warns() {
        let tokens = lex("[branch] float x; [flatten] x = 1;").tokens;
        let mut parser = Parser::new(&tokens, ErrorPolicy::Strict);
        assert!(matches!(parser.parse_statement().unwrap(), Stmt::Variable(_)));
        assert!(matches!(parser.parse_statement().unwrap(), Stmt::Expression { .. }));

        let diagnostics = parser.finish(()).diagnostics;
        let messages: Vec<&str> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "attribute 'branch' has no effect here",
                "attribute 'flatten' has no effect here"
            ]
        );
        assert!(diagnostics.iter().all(|d| !d.is_error()));
    }

    #[test]
    fn test_sample_as_variable_name() {
        let Stmt::Variable(decl) = stmt("float4 sample = tex.Sample(s, uv);") else {
            panic!("expected declaration");
        };
        assert_eq!(decl.declarators[0].name, "sample");
    }

    #[test]
    fn test_dangling_else() {
        let Stmt::If {
            then_branch,
            else_branch,
            ..
        } = stmt("if (a) if (b) x = 1; else x = 2;")
        else {
            panic!("expected if");
        };
        assert!(else_branch.is_none());
        assert!(matches!(*then_branch, Stmt::If { else_branch: Some(_), .. }));
    }

    #[test]
    fn test_for_with_declaration_and_attribute() {
        let Stmt::For {
            attributes,
            init,
            condition,
            increment,
            ..
        } = stmt("[unroll] for (int i = 0; i < 4; ++i) { total += i; }")
        else {
            panic!("expected for");
        };
        assert_eq!(attributes[0].name, "unroll");
        assert!(matches!(init.as_deref(), Some(Stmt::Variable(_))));
        assert!(condition.is_some());
        assert!(increment.is_some());
    }

    #[test]
    fn test_empty_for_clauses() {
        let Stmt::For {
            init,
            condition,
            increment,
            ..
        } = stmt("for (;;) break;")
        else {
            panic!("expected for");
        };
        assert!(init.is_none() && condition.is_none() && increment.is_none());
    }

    #[test]
    fn test_switch_clauses() {
        let Stmt::Switch { clauses, .. } =
            stmt("switch (mode) { case 0: case 1: x = 1; break; default: discard; }")
        else {
            panic!("expected switch");
        };
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].labels.len(), 2);
        assert_eq!(clauses[0].statements.len(), 2);
        assert!(matches!(clauses[1].labels[0], SwitchLabel::Default(_)));
    }

    #[test]
    fn test_do_while_and_return() {
        assert!(matches!(stmt("do { i++; } while (i < 10);"), Stmt::DoWhile { .. }));
        assert!(matches!(stmt("return;"), Stmt::Return { value: None, .. }));
        assert!(matches!(stmt("return a, b;"), Stmt::Return { value: Some(_), .. }));
    }

    #[test]
    fn test_local_struct_definition() {
        assert!(matches!(
            stmt("struct Pair { float a; float b; };"),
            Stmt::Declaration(_)
        ));
    }

    #[test]
    fn test_block_recovers_after_bad_statement() {
        let tokens = lex("{ x = ; y = 2; }").tokens;
        let mut parser = Parser::new(&tokens, ErrorPolicy::Permissive);
        let block = parser.parse_block().unwrap();
        assert_eq!(block.statements.len(), 2);
        assert_eq!(parser.diagnostics.error_count(), 1);
        assert!(parser.is_at_end());
    }
}
