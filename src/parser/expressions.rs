//! Expression parsing
//!
//! Binary operators are parsed by precedence climbing over [`Precedence`]:
//! each level parses its operands at the next tighter level and loops while
//! it sees one of its own operators, so binary operators are
//! left-associative. Assignment and the ternary are right-associative.
//!
//! # Grammar
//!
//! ```text
//! expression  → assignment ( "," assignment )*
//! assignment  → ternary ( assign_op assignment )?
//! ternary     → logical_or ( "?" expression ":" assignment )?
//! logical_or  → ... binary levels ... → prefix
//! prefix      → ( "!" | "~" | "-" | "+" | "++" | "--" ) prefix
//!             | "(" type ("[" bound "]")* ")" prefix
//!             | postfix
//! postfix     → primary ( "(" args ")" | "[" expression "]" | "." word | "++" | "--" )*
//! primary     → literal | qualified_name | numeric_type "(" args ")"
//!             | "(" expression ")" | "{" initializers "}"
//! ```

use crate::lexer::{Keyword, TokenKind};
use crate::parser::ast::*;
use crate::parser::parse::{PResult, Parser};

/// The operator `kind` stands for at binary precedence `level`.
fn binary_operator(level: Precedence, kind: TokenKind) -> Option<BinaryOp> {
    use TokenKind as T;
    let op = match (level, kind) {
        (Precedence::LogicalOr, T::OrOr) => BinaryOp::LogicalOr,
        (Precedence::LogicalAnd, T::AndAnd) => BinaryOp::LogicalAnd,
        (Precedence::BitwiseOr, T::Pipe) => BinaryOp::BitOr,
        (Precedence::BitwiseXor, T::Caret) => BinaryOp::BitXor,
        (Precedence::BitwiseAnd, T::Amp) => BinaryOp::BitAnd,
        (Precedence::Equality, T::EqEq) => BinaryOp::Eq,
        (Precedence::Equality, T::NotEq) => BinaryOp::NotEq,
        (Precedence::Comparison, T::Lt) => BinaryOp::Lt,
        (Precedence::Comparison, T::Le) => BinaryOp::Le,
        (Precedence::Comparison, T::Gt) => BinaryOp::Gt,
        (Precedence::Comparison, T::Ge) => BinaryOp::Ge,
        (Precedence::BitShift, T::LtLt) => BinaryOp::Shl,
        (Precedence::BitShift, T::GtGt) => BinaryOp::Shr,
        (Precedence::AdditiveSubtractive, T::Plus) => BinaryOp::Add,
        (Precedence::AdditiveSubtractive, T::Minus) => BinaryOp::Sub,
        (Precedence::Multiplicative, T::Star) => BinaryOp::Mul,
        (Precedence::Multiplicative, T::Slash) => BinaryOp::Div,
        (Precedence::Multiplicative, T::Percent) => BinaryOp::Mod,
        _ => return None,
    };
    Some(op)
}

fn assignment_operator(kind: TokenKind) -> Option<AssignmentOp> {
    use TokenKind as T;
    let op = match kind {
        T::Eq => AssignmentOp::Assign,
        T::PlusEq => AssignmentOp::Add,
        T::MinusEq => AssignmentOp::Sub,
        T::StarEq => AssignmentOp::Mul,
        T::SlashEq => AssignmentOp::Div,
        T::PercentEq => AssignmentOp::Mod,
        T::AmpEq => AssignmentOp::BitAnd,
        T::PipeEq => AssignmentOp::BitOr,
        T::CaretEq => AssignmentOp::BitXor,
        T::LtLtEq => AssignmentOp::Shl,
        T::GtGtEq => AssignmentOp::Shr,
        _ => return None,
    };
    Some(op)
}

fn prefix_operator(kind: TokenKind) -> Option<PrefixOp> {
    use TokenKind as T;
    let op = match kind {
        T::Plus => PrefixOp::Plus,
        T::Minus => PrefixOp::Minus,
        T::Bang => PrefixOp::Not,
        T::Tilde => PrefixOp::BitNot,
        T::PlusPlus => PrefixOp::Increment,
        T::MinusMinus => PrefixOp::Decrement,
        _ => return None,
    };
    Some(op)
}

impl Parser {
    /// Parse a full expression, comma operator included.
    pub(crate) fn parse_expression(&mut self) -> PResult<Expr> {
        self.parse_precedence(Precedence::Compound)
    }

    /// Parse an expression that binds at least as tightly as `level`.
    pub(crate) fn parse_precedence(&mut self, level: Precedence) -> PResult<Expr> {
        match level {
            Precedence::Compound => self.parse_compound(),
            Precedence::Assignment => self.parse_assignment(),
            Precedence::Ternary => self.parse_ternary(),
            Precedence::Prefix => self.parse_prefix(),
            Precedence::Postfix | Precedence::Primary => self.parse_postfix(),
            binary => self.parse_binary(binary),
        }
    }

    fn parse_compound(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_assignment()?;

        while self.match_token(TokenKind::Comma) {
            let right = self.parse_assignment()?;
            let span = expr.span().to(right.span());
            expr = Expr::Binary {
                op: BinaryOp::Comma,
                left: Box::new(expr),
                right: Box::new(right),
                span,
            };
        }

        Ok(expr)
    }

    pub(crate) fn parse_assignment(&mut self) -> PResult<Expr> {
        let target = self.parse_ternary()?;

        let Some(op) = assignment_operator(self.peek_kind()) else {
            return Ok(target);
        };
        self.advance();

        // Right-associative: a = b = c parses as a = (b = c)
        let value = self.parse_assignment()?;
        let span = target.span().to(value.span());
        Ok(Expr::Assignment {
            op,
            target: Box::new(target),
            value: Box::new(value),
            span,
        })
    }

    fn parse_ternary(&mut self) -> PResult<Expr> {
        let condition = self.parse_precedence(Precedence::LogicalOr)?;

        if !self.match_token(TokenKind::Question) {
            return Ok(condition);
        }

        let then_expr = self.parse_expression()?;
        self.expect_token(TokenKind::Colon, "in conditional expression")?;
        let else_expr = self.parse_assignment()?;

        let span = condition.span().to(else_expr.span());
        Ok(Expr::Ternary {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
            span,
        })
    }

    fn parse_binary(&mut self, level: Precedence) -> PResult<Expr> {
        let mut left = self.parse_precedence(level.next())?;

        while let Some(op) = binary_operator(level, self.peek_kind()) {
            self.advance();
            let right = self.parse_precedence(level.next())?;
            let span = left.span().to(right.span());
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> PResult<Expr> {
        let start = self.current_span();

        if let Some(op) = prefix_operator(self.peek_kind()) {
            self.advance();
            let operand = self.parse_prefix()?;
            return Ok(Expr::Prefix {
                op,
                operand: Box::new(operand),
                span: self.span_from(&start),
            });
        }

        if self.check(TokenKind::LParen) {
            if let Some((target, array_ranks)) = self.speculate(Self::parse_cast_head) {
                let operand = self.parse_prefix()?;
                return Ok(Expr::Cast {
                    target,
                    array_ranks,
                    operand: Box::new(operand),
                    span: self.span_from(&start),
                });
            }
        }

        self.parse_postfix()
    }

    /// Trial parse of `(type[N]...)` that succeeds only when the token after
    /// `)` can start the cast operand.
    ///
    /// `-` and `+` only follow builtin types, so `(a) - b` stays a
    /// subtraction while `(float)-b` is a cast.
    fn parse_cast_head(&mut self) -> PResult<(TypeNode, Vec<Expr>)> {
        if !self.match_token(TokenKind::LParen) {
            return self.reject("a cast");
        }

        let builtin = match self.peek_kind() {
            TokenKind::Numeric(_) | TokenKind::Keyword(Keyword::Void) => true,
            TokenKind::Keyword(keyword) => keyword.is_predefined_type(),
            TokenKind::Identifier | TokenKind::ColonColon => false,
            _ => return self.reject("a type"),
        };
        let target = self.parse_type()?;

        let mut array_ranks = Vec::new();
        while self.match_token(TokenKind::LBracket) {
            let bound = match self.peek_kind() {
                TokenKind::IntLiteral | TokenKind::Identifier => self.parse_primary()?,
                _ => return self.reject("an array bound"),
            };
            if !self.match_token(TokenKind::RBracket) {
                return self.reject("an array bound");
            }
            array_ranks.push(bound);
        }

        if !self.match_token(TokenKind::RParen) {
            return self.reject("a cast");
        }

        let follows = match self.peek_kind() {
            kind if kind.is_literal() => true,
            TokenKind::Identifier
            | TokenKind::Numeric(_)
            | TokenKind::LParen
            | TokenKind::Bang
            | TokenKind::Tilde
            | TokenKind::Keyword(Keyword::True | Keyword::False) => true,
            // After a user type name these are postfix or binary operators
            TokenKind::Minus | TokenKind::Plus | TokenKind::PlusPlus | TokenKind::MinusMinus => {
                builtin
            }
            _ => false,
        };
        if !follows {
            return self.reject("a cast operand");
        }

        Ok((target, array_ranks))
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_arguments("in call")?;
                    let span = self.span_from(expr.span());
                    expr = match expr {
                        Expr::Identifier(callee) => Expr::Call { callee, args, span },
                        Expr::FieldAccess { object, field, .. } => Expr::MethodCall {
                            object,
                            method: field,
                            args,
                            span,
                        },
                        other => {
                            self.error("expression is not callable", other.span().clone())?;
                            other
                        }
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect_token(TokenKind::RBracket, "after index")?;
                    let span = self.span_from(expr.span());
                    expr = Expr::ElementAccess {
                        object: Box::new(expr),
                        index: Box::new(index),
                        span,
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    // Swizzles and members; `.sample` and friends are plain words
                    let word = self.peek().word().map(|word| word.into_owned());
                    let field = match word {
                        Some(word) => word,
                        None => {
                            self.error_expected("member name after '.'")?;
                            String::new()
                        }
                    };
                    if !field.is_empty() {
                        self.advance();
                    }
                    let span = self.span_from(expr.span());
                    expr = Expr::FieldAccess {
                        object: Box::new(expr),
                        field,
                        span,
                    };
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let op = if self.advance().is(TokenKind::PlusPlus) {
                        PostfixOp::Increment
                    } else {
                        PostfixOp::Decrement
                    };
                    let span = self.span_from(expr.span());
                    expr = Expr::Postfix {
                        op,
                        operand: Box::new(expr),
                        span,
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    pub(crate) fn parse_primary(&mut self) -> PResult<Expr> {
        let start = self.current_span();

        let kind = match self.peek_kind() {
            TokenKind::IntLiteral => Some(LiteralKind::Int),
            TokenKind::FloatLiteral => Some(LiteralKind::Float),
            TokenKind::CharLiteral => Some(LiteralKind::Char),
            TokenKind::StringLiteral => Some(LiteralKind::String),
            TokenKind::Keyword(Keyword::True | Keyword::False) => Some(LiteralKind::Bool),
            _ => None,
        };
        if let Some(kind) = kind {
            let value = self.advance().text().into_owned();
            return Ok(Expr::Literal {
                kind,
                value,
                span: start,
            });
        }

        match self.peek_kind() {
            TokenKind::Identifier | TokenKind::ColonColon => {
                Ok(Expr::Identifier(self.parse_qualified_name()?))
            }
            TokenKind::Numeric(ty) => {
                self.advance();
                if !self.expect_token(TokenKind::LParen, "after type in constructor")? {
                    return Ok(Expr::Error(start));
                }
                let args = self.parse_arguments("in constructor")?;
                Ok(Expr::NumericConstructor {
                    ty,
                    args,
                    span: self.span_from(&start),
                })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect_token(TokenKind::RParen, "after expression")?;
                Ok(Expr::Grouping {
                    inner: Box::new(inner),
                    span: self.span_from(&start),
                })
            }
            TokenKind::LBrace => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(TokenKind::RBrace) && !self.is_at_end() {
                    elements.push(self.parse_assignment()?);
                    if !self.match_token(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect_token(TokenKind::RBrace, "after initializer list")?;
                Ok(Expr::ArrayInitializer {
                    elements,
                    span: self.span_from(&start),
                })
            }
            _ => {
                self.error_expected("expression")?;
                Ok(Expr::Error(start))
            }
        }
    }

    /// Comma-separated assignment expressions up to and including `)`.
    /// The `(` has already been consumed.
    pub(crate) fn parse_arguments(&mut self, ctx: &str) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();

        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_assignment()?);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect_token(TokenKind::RParen, &format!("after arguments {}", ctx))?;
        Ok(args)
    }

    /// `name` or `A::B::name`, with an optional leading `::`.
    pub(crate) fn parse_qualified_name(&mut self) -> PResult<QualifiedName> {
        let start = self.current_span();
        let mut segments = Vec::new();

        if self.match_token(TokenKind::ColonColon) {
            segments.push(String::new());
        }
        loop {
            segments.push(self.expect_identifier("in name")?);
            if !(self.check(TokenKind::ColonColon) && self.peek_ahead(1).is(TokenKind::Identifier))
            {
                break;
            }
            self.advance();
        }

        Ok(QualifiedName {
            segments,
            span: self.span_from(&start),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ErrorPolicy;
    use crate::lexer::lex;

    fn expr(source: &str) -> Expr {
        let mut parser = Parser::new(&lex(source).tokens, ErrorPolicy::Strict);
        let expr = parser.parse_expression().unwrap();
        assert!(parser.is_at_end(), "left over input in {:?}", source);
        expr
    }

    fn name(expr: &Expr) -> String {
        match expr {
            Expr::Identifier(name) => name.to_string(),
            other => panic!("expected identifier, got {:?}", other),
        }
    }

    #[test]
    fn test_multiplication_binds_tighter() {
        let Expr::Binary { op, left, right, .. } = expr("a + b * c") else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert_eq!(name(&left), "a");
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_subtraction_is_left_associative() {
        let Expr::Binary { op, left, right, .. } = expr("a - b - c") else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Sub);
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::Sub, .. }));
        assert_eq!(name(&right), "c");
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let Expr::Assignment { target, value, .. } = expr("a = b = c") else {
            panic!("expected assignment");
        };
        assert_eq!(name(&target), "a");
        assert!(matches!(*value, Expr::Assignment { .. }));
    }

    #[test]
    fn test_ternary_nests_to_the_right() {
        let Expr::Ternary { else_expr, .. } = expr("a ? b : c ? d : e") else {
            panic!("expected ternary");
        };
        assert!(matches!(*else_expr, Expr::Ternary { .. }));
    }

    #[test]
    fn test_cast_of_builtin_type() {
        let Expr::Cast { target, operand, .. } = expr("(float3)0") else {
            panic!("expected cast");
        };
        assert!(matches!(target, TypeNode::Numeric { .. }));
        assert!(matches!(*operand, Expr::Literal { kind: LiteralKind::Int, .. }));
    }

    #[test]
    fn test_cast_with_array_rank() {
        let Expr::Cast { array_ranks, .. } = expr("(float[4])values") else {
            panic!("expected cast");
        };
        assert_eq!(array_ranks.len(), 1);
    }

    #[test]
    fn test_parenthesized_name_is_not_a_cast() {
        assert!(matches!(expr("(x)"), Expr::Grouping { .. }));
        assert!(matches!(
            expr("(a) - b"),
            Expr::Binary { op: BinaryOp::Sub, .. }
        ));
        assert!(matches!(expr("(float)-b"), Expr::Cast { .. }));
        assert!(matches!(expr("(MyType)value"), Expr::Cast { .. }));
    }

    #[test]
    fn test_postfix_chain() {
        let Expr::FieldAccess { object, field, .. } = expr("tex.Sample(s, uv).rgb") else {
            panic!("expected field access");
        };
        assert_eq!(field, "rgb");
        let Expr::MethodCall { method, args, .. } = *object else {
            panic!("expected method call");
        };
        assert_eq!(method, "Sample");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_constructor_and_initializer() {
        let Expr::NumericConstructor { ty, args, .. } = expr("float4(pos, 1.0)") else {
            panic!("expected constructor");
        };
        assert_eq!(ty.to_string(), "float4");
        assert_eq!(args.len(), 2);

        let Expr::ArrayInitializer { elements, .. } = expr("{ 1, 2, 3, }") else {
            panic!("expected initializer");
        };
        assert_eq!(elements.len(), 3);
    }

    #[test]
    fn test_qualified_call() {
        let Expr::Call { callee, args, .. } = expr("Lighting::Evaluate(n)") else {
            panic!("expected call");
        };
        assert_eq!(callee.to_string(), "Lighting::Evaluate");
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_comma_has_lowest_precedence() {
        let Expr::Binary { op, left, .. } = expr("a = 1, b") else {
            panic!("expected comma");
        };
        assert_eq!(op, BinaryOp::Comma);
        assert!(matches!(*left, Expr::Assignment { .. }));
    }

    #[test]
    fn test_missing_operand_is_recorded() {
        let mut parser = Parser::new(&lex("a + ").tokens, ErrorPolicy::Permissive);
        let expr = parser.parse_expression().unwrap();
        let Expr::Binary { right, .. } = expr else {
            panic!("expected binary");
        };
        assert!(matches!(*right, Expr::Error(_)));
        assert_eq!(parser.diagnostics.error_count(), 1);
    }
}
