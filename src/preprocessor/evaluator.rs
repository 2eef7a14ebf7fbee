//! Constant-expression evaluation for `#if` and `#elif`
//!
//! The condition tokens (macros already expanded, `defined` resolved and
//! unknown names replaced by `0`) are parsed with the ordinary expression
//! parser and folded over signed 64-bit integers with wrapping arithmetic.
//! Anything that is not an integer constant expression yields a diagnostic
//! and evaluates to 0.

use crate::diagnostics::{Diagnostic, DiagnosticBag, Error, ErrorPolicy, SourceSpan};
use crate::lexer::Token;
use crate::parser::{self, BinaryOp, Expr, LiteralKind, PrefixOp};

/// Result of evaluating a directive condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: i64,
    pub diagnostics: Vec<Diagnostic>,
}

/// Evaluate a constant expression.
pub fn evaluate(tokens: &[Token], policy: ErrorPolicy) -> Result<Evaluation, Error> {
    let mut diagnostics = DiagnosticBag::new(policy);

    if tokens.is_empty() {
        diagnostics.error("empty constant expression", SourceSpan::detached())?;
        return Ok(Evaluation {
            value: 0,
            diagnostics: diagnostics.into_vec(),
        });
    }

    let parsed = parser::parse_expression(tokens, policy)?;
    diagnostics.extend(parsed.diagnostics);

    let value = Evaluator {
        diagnostics: &mut diagnostics,
    }
    .eval(&parsed.node)?;

    Ok(Evaluation {
        value,
        diagnostics: diagnostics.into_vec(),
    })
}

struct Evaluator<'a> {
    diagnostics: &'a mut DiagnosticBag,
}

impl Evaluator<'_> {
    fn eval(&mut self, expr: &Expr) -> Result<i64, Error> {
        match expr {
            Expr::Literal { kind, value, span } => self.literal(*kind, value, span),
            Expr::Grouping { inner, .. } => self.eval(inner),
            Expr::Prefix { op, operand, span } => {
                let operand = self.eval(operand)?;
                match op {
                    PrefixOp::Plus => Ok(operand),
                    PrefixOp::Minus => Ok(operand.wrapping_neg()),
                    PrefixOp::Not => Ok((operand == 0) as i64),
                    PrefixOp::BitNot => Ok(!operand),
                    PrefixOp::Increment | PrefixOp::Decrement => {
                        self.illegal("increment or decrement", span)
                    }
                }
            }
            Expr::Binary {
                op,
                left,
                right,
                span,
            } => {
                // Both operands are always evaluated.
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.binary(*op, left, right, span)
            }
            Expr::Ternary {
                condition,
                then_expr,
                else_expr,
                ..
            } => {
                if self.eval(condition)? != 0 {
                    self.eval(then_expr)
                } else {
                    self.eval(else_expr)
                }
            }
            // Already reported by the parser.
            Expr::Error(_) => Ok(0),
            Expr::Identifier(name) => {
                let message = format!("'{}' is not a constant", name);
                self.diagnostics.error(message, name.span.clone())?;
                Ok(0)
            }
            Expr::Assignment { span, .. } => self.illegal("assignment", span),
            Expr::Postfix { span, .. } => self.illegal("increment or decrement", span),
            Expr::Cast { span, .. } => self.illegal("cast", span),
            Expr::Call { span, .. } | Expr::MethodCall { span, .. } => {
                self.illegal("function call", span)
            }
            Expr::NumericConstructor { span, .. } => self.illegal("constructor", span),
            Expr::FieldAccess { span, .. } => self.illegal("member access", span),
            Expr::ElementAccess { span, .. } => self.illegal("indexing", span),
            Expr::ArrayInitializer { span, .. } => self.illegal("initializer list", span),
        }
    }

    fn illegal(&mut self, what: &str, span: &SourceSpan) -> Result<i64, Error> {
        let message = format!("{} is not allowed in a constant expression", what);
        self.diagnostics.error(message, span.clone())?;
        Ok(0)
    }

    fn literal(&mut self, kind: LiteralKind, text: &str, span: &SourceSpan) -> Result<i64, Error> {
        match kind {
            LiteralKind::Bool => Ok((text == "true") as i64),
            LiteralKind::Int => match parse_integer(text) {
                Some(value) => Ok(value),
                None => {
                    let message = format!("invalid integer constant {}", text);
                    self.diagnostics.error(message, span.clone())?;
                    Ok(0)
                }
            },
            LiteralKind::Char => match parse_char(text) {
                Some(value) => Ok(value),
                None => {
                    let message = format!("invalid character constant {}", text);
                    self.diagnostics.error(message, span.clone())?;
                    Ok(0)
                }
            },
            LiteralKind::Float => self.illegal("floating-point literal", span),
            LiteralKind::String => self.illegal("string literal", span),
        }
    }

    fn binary(&mut self, op: BinaryOp, left: i64, right: i64, span: &SourceSpan) -> Result<i64, Error> {
        let value = match op {
            BinaryOp::Comma => right,
            BinaryOp::LogicalOr => (left != 0 || right != 0) as i64,
            BinaryOp::LogicalAnd => (left != 0 && right != 0) as i64,
            BinaryOp::BitOr => left | right,
            BinaryOp::BitXor => left ^ right,
            BinaryOp::BitAnd => left & right,
            BinaryOp::Eq => (left == right) as i64,
            BinaryOp::NotEq => (left != right) as i64,
            BinaryOp::Lt => (left < right) as i64,
            BinaryOp::Le => (left <= right) as i64,
            BinaryOp::Gt => (left > right) as i64,
            BinaryOp::Ge => (left >= right) as i64,
            BinaryOp::Shl | BinaryOp::Shr => {
                if !(0..64).contains(&right) {
                    let message = format!("shift count {} is out of range", right);
                    self.diagnostics.error(message, span.clone())?;
                    return Ok(0);
                }
                if op == BinaryOp::Shl {
                    left.wrapping_shl(right as u32)
                } else {
                    left.wrapping_shr(right as u32)
                }
            }
            BinaryOp::Add => left.wrapping_add(right),
            BinaryOp::Sub => left.wrapping_sub(right),
            BinaryOp::Mul => left.wrapping_mul(right),
            BinaryOp::Div | BinaryOp::Mod => {
                if right == 0 {
                    self.diagnostics.error("division by zero", span.clone())?;
                    return Ok(0);
                }
                if op == BinaryOp::Div {
                    left.wrapping_div(right)
                } else {
                    left.wrapping_rem(right)
                }
            }
        };
        Ok(value)
    }
}

/// Decimal, octal (`017`) or hex (`0x1F`) with optional `u`/`l` suffixes.
fn parse_integer(text: &str) -> Option<i64> {
    let digits = text.trim_end_matches(['u', 'U', 'l', 'L']);

    let (digits, radix) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (&digits[1..], 8)
    } else {
        (digits, 10)
    };

    // Values above i64::MAX wrap, as unsigned literals do.
    u64::from_str_radix(digits, radix)
        .ok()
        .map(|value| value as i64)
}

/// Value of the first character of a quoted character literal.
fn parse_char(text: &str) -> Option<i64> {
    let inner = text.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut chars = inner.chars();

    let value = match chars.next()? {
        '\\' => match chars.next()? {
            'n' => '\n' as i64,
            't' => '\t' as i64,
            'r' => '\r' as i64,
            'a' => 0x07,
            'b' => 0x08,
            'f' => 0x0C,
            'v' => 0x0B,
            'x' => i64::from_str_radix(chars.as_str(), 16).ok()?,
            digit @ '0'..='7' => {
                let octal: String = std::iter::once(digit).chain(chars).collect();
                i64::from_str_radix(&octal, 8).ok()?
            }
            other => other as i64,
        },
        c => c as i64,
    };
    Some(value)
}
