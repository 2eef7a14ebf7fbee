//! # Introduction
//!
//! hlslparse is a front end for HLSL: it tokenizes shader source, runs the
//! C-style preprocessor over the token stream and parses the result into a
//! syntax tree. Nothing is type-checked or compiled.
//!
//! ## Pipeline
//!
//! ```text
//! Source → Lexer → Preprocessor → Parser → TranslationUnit
//!                     ↑
//!              IncludeResolver
//! ```
//!
//! 1. [`lexer`] turns text into [`lexer::Token`]s. Directive lines are
//!    bracketed by `Directive`/`EndDirective` tokens.
//! 2. [`preprocessor`] interprets directives, expands macros with hide-sets,
//!    splices `#include`d files and drops inactive conditional branches.
//!    `#if` conditions go through [`preprocessor::evaluate`].
//! 3. [`parser`] builds the [`parser::TranslationUnit`]; ambiguous
//!    constructs are settled by speculative parsing.
//!
//! Every stage reports problems as [`Diagnostic`]s. With the default
//! [`ErrorPolicy::Permissive`] they are collected and work continues; with
//! [`ErrorPolicy::Strict`] the first error ends the run as
//! [`Error::Aborted`].

pub mod config;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod preprocessor;

use std::fs;
use std::path::Path;

pub use config::{Config, PreprocessorMode};
pub use diagnostics::{Diagnostic, Error, ErrorPolicy, Severity, SourceSpan};
pub use preprocessor::{
    FileSystemIncludeResolver, IncludeError, IncludeResolver, MemoryIncludeResolver,
    PreprocessorOutput,
};

use lexer::Token;
use parser::TranslationUnit;

/// Everything produced by [`parse_source`].
#[derive(Debug)]
pub struct ParseOutput {
    pub unit: TranslationUnit,
    /// The preprocessed token stream the tree was parsed from.
    pub tokens: Vec<Token>,
    pub pragmas: Vec<String>,
    /// Lexer, preprocessor and parser diagnostics, in that order.
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Lex and preprocess `source` as the main file described by `config`.
pub fn preprocess_source(
    source: &str,
    config: &Config,
    resolver: &dyn IncludeResolver,
) -> Result<PreprocessorOutput, Error> {
    let lexed = lexer::lex_file(source, &config.base_path, &config.file_name, config.policy)?;
    let mut output = preprocessor::preprocess(lexed.tokens, config, resolver)?;

    let mut diagnostics = lexed.diagnostics;
    diagnostics.append(&mut output.diagnostics);
    output.diagnostics = diagnostics;
    Ok(output)
}

/// Lex, preprocess and parse `source`.
pub fn parse_source(
    source: &str,
    config: &Config,
    resolver: &dyn IncludeResolver,
) -> Result<ParseOutput, Error> {
    let preprocessed = preprocess_source(source, config, resolver)?;
    let parsed = parser::parse_top_level_declarations(&preprocessed.tokens, config.policy)?;

    let mut diagnostics = preprocessed.diagnostics;
    diagnostics.extend(parsed.diagnostics);

    Ok(ParseOutput {
        unit: parsed.node,
        tokens: preprocessed.tokens,
        pragmas: preprocessed.pragmas,
        diagnostics,
    })
}

/// Read and parse a file from disk, resolving includes next to it.
///
/// An empty `base_path` or `file_name` in `config` is filled in from `path`.
pub fn parse_file(path: &Path, config: &Config) -> Result<ParseOutput, Error> {
    let source = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = file_config(path, config);
    parse_source(&source, &config, &FileSystemIncludeResolver)
}

fn file_config(path: &Path, config: &Config) -> Config {
    let mut config = config.clone();
    if config.base_path.is_empty() {
        if let Some(parent) = path.parent() {
            config.base_path = parent.to_string_lossy().into_owned();
        }
    }
    if config.file_name.is_empty() {
        if let Some(name) = path.file_name() {
            config.file_name = name.to_string_lossy().into_owned();
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_config_fills_identity() {
        let config = file_config(Path::new("shaders/lit.hlsl"), &Config::new());
        assert_eq!(config.base_path, "shaders");
        assert_eq!(config.file_name, "lit.hlsl");

        let named = Config::new().with_file_name("override.hlsl");
        let config = file_config(Path::new("shaders/lit.hlsl"), &named);
        assert_eq!(config.file_name, "override.hlsl");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = parse_file(Path::new("/nonexistent/shader.hlsl"), &Config::new());
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
