//! HLSL parser
//!
//! This module turns a preprocessed token stream into a syntax tree:
//! - [`parse`]: Parser state, helpers, speculation and recovery
//! - [`ast`]: Syntax tree definitions
//! - `declarations`, `statements`, `expressions`: the grammar, as `impl
//!   Parser` blocks
//!
//! # Parser Implementation
//!
//! Hand-written recursive descent parser with precedence climbing for binary
//! operators. Ambiguities (cast or parenthesized expression, declaration or
//! expression statement, function or variable) are settled by speculative
//! parses that rewind on failure.
//!
//! Each entry point below parses one kind of node from a token slice and
//! returns it with its diagnostics. Under [`ErrorPolicy::Permissive`] a
//! syntax error leaves an error node or skips to the next statement; under
//! [`ErrorPolicy::Strict`] the first error is returned as
//! [`Error::Aborted`](crate::diagnostics::Error::Aborted).

pub mod ast;
mod declarations;
mod expressions;
pub mod parse;
mod statements;

use log::debug;

use crate::diagnostics::{Error, ErrorPolicy};
use crate::lexer::Token;

pub use ast::*;
pub use parse::{PResult, Parsed, Parser};

/// Parse a whole file.
pub fn parse_top_level_declarations(
    tokens: &[Token],
    policy: ErrorPolicy,
) -> Result<Parsed<TranslationUnit>, Error> {
    let mut parser = Parser::new(tokens, policy);
    let unit = parser.parse_translation_unit()?;
    debug!(
        "parsed {} top-level declarations from {} tokens",
        unit.declarations.len(),
        tokens.len()
    );
    Ok(parser.finish(unit))
}

/// Parse exactly one declaration.
pub fn parse_declaration(tokens: &[Token], policy: ErrorPolicy) -> Result<Parsed<Decl>, Error> {
    let mut parser = Parser::new(tokens, policy);
    let decl = parser.parse_top_level_declaration()?;
    parser.expect_end("declaration")?;
    Ok(parser.finish(decl))
}

/// Parse exactly one statement.
pub fn parse_statement(tokens: &[Token], policy: ErrorPolicy) -> Result<Parsed<Stmt>, Error> {
    let mut parser = Parser::new(tokens, policy);
    let stmt = parser.parse_statement()?;
    parser.expect_end("statement")?;
    Ok(parser.finish(stmt))
}

/// Parse exactly one expression.
pub fn parse_expression(tokens: &[Token], policy: ErrorPolicy) -> Result<Parsed<Expr>, Error> {
    let mut parser = Parser::new(tokens, policy);
    let expr = parser.parse_expression()?;
    parser.expect_end("expression")?;
    Ok(parser.finish(expr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    #[test]
    fn test_trailing_tokens_after_expression() {
        let parsed = parse_expression(&lex("a + b c").tokens, ErrorPolicy::Permissive).unwrap();
        assert!(matches!(parsed.node, Expr::Binary { .. }));
        assert_eq!(parsed.diagnostics.len(), 1);
        assert!(parsed.diagnostics[0].message.contains("after expression"));
    }

    #[test]
    fn test_strict_expression_error() {
        let result = parse_expression(&lex("1 +").tokens, ErrorPolicy::Strict);
        let err = result.unwrap_err();
        assert!(err
            .diagnostic()
            .is_some_and(|d| d.message.starts_with("expected expression")));
    }

    #[test]
    fn test_translation_unit_recovers() {
        let source = "float a = ;\nfloat b = 2;\n}\nfloat4 main() : SV_Target { return 0; }";
        let parsed =
            parse_top_level_declarations(&lex(source).tokens, ErrorPolicy::Permissive).unwrap();
        assert!(parsed.has_errors());
        assert!(parsed
            .node
            .declarations
            .iter()
            .any(|d| matches!(d, Decl::Function(f) if f.name.name() == "main")));
    }

    #[test]
    fn test_empty_input() {
        let parsed = parse_top_level_declarations(&[], ErrorPolicy::Strict).unwrap();
        assert!(parsed.node.declarations.is_empty());
        assert!(parsed.diagnostics.is_empty());
    }
}
