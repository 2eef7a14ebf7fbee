//! Preprocessor
//!
//! Walks the lexer's token stream once, interpreting directives and
//! expanding macros in place. `#include` splices the lexed file at the
//! current position, so included text takes part in the same pass.
//! Conditional groups are resolved by skipping the tokens of every branch
//! that is not taken; the main loop never sees them.

pub mod evaluator;
pub mod include;
pub mod macros;

use std::sync::Arc;

use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};

pub use evaluator::{evaluate, Evaluation};
pub use include::{FileSystemIncludeResolver, IncludeError, IncludeResolver, MemoryIncludeResolver};
pub use macros::{Macro, MacroTable};

use crate::config::{Config, PreprocessorMode};
use crate::diagnostics::{Diagnostic, DiagnosticBag, Error, ErrorPolicy, SourceSpan};
use crate::lexer::{self, join_tokens, Directive, Keyword, Token, TokenKind};
use include::{include_base_path, join_path};
use macros::{Expander, HideSet};

/// Upper bound on `#include` splices in one run.
const MAX_INCLUDES: usize = 200;

/// Result of a preprocessing run.
#[derive(Debug, Default)]
pub struct PreprocessorOutput {
    pub tokens: Vec<Token>,
    /// Text of every `#pragma` line, in order.
    pub pragmas: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
    /// Macro table as it stood at the end of the input.
    pub macros: MacroTable,
}

/// Preprocess `tokens` (the lexed main file) as configured.
pub fn preprocess(
    tokens: Vec<Token>,
    config: &Config,
    resolver: &dyn IncludeResolver,
) -> Result<PreprocessorOutput, Error> {
    let mut preprocessor = Preprocessor::new(tokens, config, resolver);
    preprocessor.run(config)?;
    Ok(preprocessor.finish())
}

/// One open `#if` group.
#[derive(Debug)]
struct Conditional {
    /// Some branch of the group has been kept already.
    taken: bool,
    seen_else: bool,
    span: SourceSpan,
}

/// Effect of a `#line` directive on the rest of one file.
#[derive(Debug, Clone)]
struct LineRemap {
    delta: isize,
    file_name: Option<Arc<str>>,
}

pub struct Preprocessor<'r> {
    tokens: Vec<Token>,
    position: usize,
    mode: PreprocessorMode,
    macros: MacroTable,
    conditionals: Vec<Conditional>,
    /// Keyed by the file name the remapped tokens were lexed with.
    line_remaps: FxHashMap<Arc<str>, LineRemap>,
    once: FxHashSet<String>,
    includes: usize,
    resolver: &'r dyn IncludeResolver,
    output: Vec<Token>,
    pragmas: Vec<String>,
    diagnostics: DiagnosticBag,
}

impl<'r> Preprocessor<'r> {
    pub fn new(tokens: Vec<Token>, config: &Config, resolver: &'r dyn IncludeResolver) -> Self {
        Self {
            tokens,
            position: 0,
            mode: config.mode,
            macros: MacroTable::new(),
            conditionals: Vec::new(),
            line_remaps: FxHashMap::default(),
            once: FxHashSet::default(),
            includes: 0,
            resolver,
            output: Vec::new(),
            pragmas: Vec::new(),
            diagnostics: DiagnosticBag::new(config.policy),
        }
    }

    pub fn run(&mut self, config: &Config) -> Result<(), Error> {
        match self.mode {
            PreprocessorMode::DoNothing => {
                self.output = std::mem::take(&mut self.tokens);
                return Ok(());
            }
            PreprocessorMode::StripDirectives => {
                self.strip();
                return Ok(());
            }
            _ => {}
        }

        if self.mode.expands_macros() {
            for (name, value) in &config.defines {
                self.predefine(name, value)?;
            }
        }

        while self.position < self.tokens.len() {
            let token = self.tokens[self.position].clone();
            match token.kind {
                TokenKind::Directive(directive) => self.directive(directive, token)?,
                TokenKind::Hash if self.starts_line(self.position) => self.unknown_directive(token)?,
                _ if self.mode.expands_macros() => self.text()?,
                _ => {
                    self.position += 1;
                    self.emit(token);
                }
            }
        }

        while let Some(group) = self.conditionals.pop() {
            self.diagnostics
                .error("unterminated conditional directive", group.span)?;
        }

        if self.mode.expands_macros() {
            self.concatenate_strings();
        }

        Ok(())
    }

    pub fn finish(self) -> PreprocessorOutput {
        PreprocessorOutput {
            tokens: self.output,
            pragmas: self.pragmas,
            diagnostics: self.diagnostics.into_vec(),
            macros: self.macros,
        }
    }

    fn directive(&mut self, directive: Directive, token: Token) -> Result<(), Error> {
        let expands = match directive {
            Directive::Include => self.mode.expands_includes(),
            _ => self.mode.expands_macros(),
        };
        if !expands {
            self.pass_line();
            return Ok(());
        }

        let line = self.take_line();
        match directive {
            Directive::Include => self.include(&token, line),
            Directive::Define => self.define(&token, line),
            Directive::Undef => self.undef(&token, line),
            Directive::Line => self.line(&token, line),
            Directive::Pragma => self.pragma(&token, line),
            Directive::Error => {
                let message = format!("#error {}", join_tokens(&line));
                self.diagnostics.error(message.trim_end(), token.span)
            }
            Directive::If => {
                let taken = self.condition(&token, line)?;
                self.open_group(token.span, taken);
                Ok(())
            }
            Directive::Ifdef | Directive::Ifndef => {
                let defined = self.defined_name(&token, &line)?;
                let taken = defined == (directive == Directive::Ifdef);
                self.open_group(token.span, taken);
                Ok(())
            }
            Directive::Elif => self.elif(token, line),
            Directive::Else => self.else_branch(token, line),
            Directive::Endif => {
                if !line.is_empty() {
                    self.diagnostics
                        .warning("extra tokens after #endif", line[0].span.clone())?;
                }
                match self.conditionals.pop() {
                    Some(_) => Ok(()),
                    None => self.diagnostics.error("#endif without #if", token.span),
                }
            }
        }
    }

    /// A line-start `#` that does not name a known directive.
    fn unknown_directive(&mut self, token: Token) -> Result<(), Error> {
        if self.mode == PreprocessorMode::ExpandIncludesOnly {
            self.pass_line();
            return Ok(());
        }

        let line = self.take_line();
        match line.first() {
            // `#` alone is a null directive.
            None => Ok(()),
            Some(name) => self.diagnostics.error(
                format!("unknown directive '#{}'", name.text()),
                token.span.to(&name.span),
            ),
        }
    }

    /// Non-directive text: expand a macro invocation or copy one token.
    fn text(&mut self) -> Result<(), Error> {
        let invocation = Expander::new(&self.macros, &mut self.diagnostics).expand_invocation(
            &self.tokens,
            self.position,
            &HideSet::default(),
        )?;

        match invocation {
            Some((expansion, next)) => {
                self.position = next;
                for token in expansion {
                    self.emit(token);
                }
            }
            None => {
                let token = self.tokens[self.position].clone();
                self.position += 1;
                self.emit(token);
            }
        }
        Ok(())
    }

    fn include(&mut self, directive: &Token, line: Vec<Token>) -> Result<(), Error> {
        let path = match line.first() {
            Some(token)
                if matches!(
                    token.kind,
                    TokenKind::StringLiteral | TokenKind::BracketedStringLiteral
                ) =>
            {
                token.lexeme.clone().unwrap_or_default()
            }
            _ => {
                return self.diagnostics.error(
                    "#include expects \"file\" or <file>",
                    directive.span.clone(),
                )
            }
        };

        let base_path = directive.span.base_path.clone();
        let key = self.resolver.resolve_path(&base_path, &path);
        if self.once.contains(&key) {
            debug!("skipping {} (#pragma once)", key);
            return Ok(());
        }

        if self.includes >= MAX_INCLUDES {
            return self.diagnostics.error(
                format!("too many nested includes while including '{}'", path),
                directive.span.clone(),
            );
        }

        let text = match self.resolver.read_file(&base_path, &path) {
            Ok(text) => text,
            Err(err) => return self.diagnostics.error(err.to_string(), directive.span.clone()),
        };

        let file_name = key.rsplit('/').next().unwrap_or(key.as_str());
        let lexed = lexer::lex_file(
            &text,
            &include_base_path("", &key),
            file_name,
            self.diagnostics.policy(),
        )?;
        self.diagnostics.extend(lexed.diagnostics);

        debug!("including {} ({} tokens)", key, lexed.tokens.len());
        self.includes += 1;
        let at = self.position;
        self.tokens.splice(at..at, lexed.tokens);
        Ok(())
    }

    fn define(&mut self, directive: &Token, line: Vec<Token>) -> Result<(), Error> {
        let Some(name) = line.first().and_then(Token::word).map(|w| w.into_owned()) else {
            return self
                .diagnostics
                .error("#define expects a macro name", directive.span.clone());
        };

        let rest = &line[1..];
        let mac = if rest
            .first()
            .is_some_and(|t| t.kind == TokenKind::OpenFunctionLikeMacroParen)
        {
            let Some((parameters, body_start)) = parse_parameters(rest) else {
                return self.diagnostics.error(
                    format!("malformed parameter list for macro '{}'", name),
                    directive.span.to(&line[line.len() - 1].span),
                );
            };
            Macro::function_like(name.clone(), parameters, rest[body_start..].to_vec())
        } else {
            Macro::object_like(name.clone(), rest.to_vec())
        };

        if let Some(previous) = self.macros.get(&name) {
            if !previous.same_definition(&mac) {
                self.diagnostics
                    .warning(format!("macro '{}' redefined", name), line[0].span.clone())?;
            }
        }

        debug!("#define {} at {}", name, directive.span);
        self.macros.define(mac);
        Ok(())
    }

    fn undef(&mut self, directive: &Token, line: Vec<Token>) -> Result<(), Error> {
        let Some(name) = line.first().and_then(Token::word) else {
            return self
                .diagnostics
                .error("#undef expects a macro name", directive.span.clone());
        };

        if self.macros.undefine(&name).is_some() {
            debug!("#undef {} at {}", name, directive.span);
        }
        Ok(())
    }

    fn line(&mut self, directive: &Token, line: Vec<Token>) -> Result<(), Error> {
        let number = line
            .first()
            .filter(|t| t.kind == TokenKind::IntLiteral)
            .and_then(|t| t.lexeme.as_deref())
            .and_then(|text| text.parse::<usize>().ok());

        let Some(number) = number else {
            return self
                .diagnostics
                .error("#line expects a line number", directive.span.clone());
        };

        let key = directive.span.file_name.clone();
        let file_name = line
            .get(1)
            .filter(|t| t.kind == TokenKind::StringLiteral)
            .and_then(|t| t.lexeme.as_deref())
            .map(Arc::<str>::from)
            .or_else(|| self.line_remaps.get(&key).and_then(|r| r.file_name.clone()));

        // `number` names the line that follows the directive.
        let last_line = line.last().map_or(directive.span.end.line, |t| t.span.end.line);
        let delta = number as isize - (last_line + 1) as isize;

        debug!("#line {} in {:?} (offset {})", number, key, delta);
        self.line_remaps.insert(key, LineRemap { delta, file_name });
        Ok(())
    }

    fn pragma(&mut self, directive: &Token, line: Vec<Token>) -> Result<(), Error> {
        let text = join_tokens(&line);
        if text == "once" {
            let span = &directive.span;
            self.once.insert(join_path(&span.base_path, &span.file_name));
        }
        self.pragmas.push(text);
        Ok(())
    }

    /// Evaluate an `#if`/`#elif` condition.
    fn condition(&mut self, directive: &Token, line: Vec<Token>) -> Result<bool, Error> {
        if line.is_empty() {
            self.diagnostics.error(
                format!("{} with no expression", directive.text()),
                directive.span.clone(),
            )?;
            return Ok(false);
        }

        let mut expander = Expander::for_condition(&self.macros, &mut self.diagnostics);
        let resolved = expander.resolve_defined_operators(line)?;
        let expanded = expander.expand_all(&resolved, &HideSet::default())?;

        // Names left after expansion are undefined macros.
        let operands: Vec<Token> = expanded
            .into_iter()
            .map(|token| match token.kind {
                TokenKind::Keyword(Keyword::True | Keyword::False) => token,
                kind if kind.is_word() => {
                    Token::synthesized(TokenKind::IntLiteral, "0", token.span)
                }
                _ => token,
            })
            .collect();

        let evaluation = evaluate(&operands, self.diagnostics.policy())?;
        self.diagnostics.extend(evaluation.diagnostics);

        debug!(
            "{} at {} evaluates to {}",
            directive.text(),
            directive.span,
            evaluation.value
        );
        Ok(evaluation.value != 0)
    }

    fn defined_name(&mut self, directive: &Token, line: &[Token]) -> Result<bool, Error> {
        let Some(name) = line.first().and_then(Token::word) else {
            self.diagnostics.error(
                format!("{} expects a macro name", directive.text()),
                directive.span.clone(),
            )?;
            return Ok(false);
        };

        if let Some(extra) = line.get(1) {
            self.diagnostics.warning(
                format!("extra tokens after {}", directive.text()),
                extra.span.clone(),
            )?;
        }
        Ok(self.macros.is_defined(&name))
    }

    fn open_group(&mut self, span: SourceSpan, taken: bool) {
        self.conditionals.push(Conditional {
            taken,
            seen_else: false,
            span,
        });
        if !taken {
            self.skip_group();
        }
    }

    fn elif(&mut self, token: Token, line: Vec<Token>) -> Result<(), Error> {
        let Some(group) = self.conditionals.last() else {
            return self.diagnostics.error("#elif without #if", token.span);
        };

        if group.seen_else {
            self.diagnostics.error("#elif after #else", token.span.clone())?;
        }

        if group.taken {
            self.skip_group();
            return Ok(());
        }

        let taken = self.condition(&token, line)?;
        if let Some(group) = self.conditionals.last_mut() {
            group.taken = taken;
        }
        if !taken {
            self.skip_group();
        }
        Ok(())
    }

    fn else_branch(&mut self, token: Token, line: Vec<Token>) -> Result<(), Error> {
        if !line.is_empty() {
            self.diagnostics
                .warning("extra tokens after #else", line[0].span.clone())?;
        }

        let Some(group) = self.conditionals.last_mut() else {
            return self.diagnostics.error("#else without #if", token.span);
        };

        let duplicate = group.seen_else;
        let taken = group.taken;
        group.seen_else = true;
        group.taken = true;

        if duplicate {
            self.diagnostics.error("#else after #else", token.span)?;
        }
        if taken {
            self.skip_group();
        }
        Ok(())
    }

    /// Skip to the next `#elif`, `#else` or `#endif` of the current group,
    /// leaving it for the main loop. Nested groups are skipped whole.
    fn skip_group(&mut self) {
        let mut depth = 0usize;

        while let Some(token) = self.tokens.get(self.position) {
            match token.kind {
                TokenKind::Directive(Directive::If | Directive::Ifdef | Directive::Ifndef) => {
                    depth += 1
                }
                TokenKind::Directive(Directive::Elif | Directive::Else) if depth == 0 => return,
                TokenKind::Directive(Directive::Endif) => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.position += 1;
        }
    }

    /// Define a macro supplied through the configuration.
    fn predefine(&mut self, name: &str, value: &str) -> Result<(), Error> {
        let source = format!("#define {} {}", name, value);
        let lexed = lexer::lex_file(&source, "", "<config>", ErrorPolicy::Permissive)?;

        match lexed.tokens.as_slice() {
            [directive, line @ .., end]
                if lexed.diagnostics.is_empty()
                    && directive.kind == TokenKind::Directive(Directive::Define)
                    && end.kind == TokenKind::EndDirective =>
            {
                self.define(directive, line.to_vec())
            }
            _ => {
                let span = lexed
                    .diagnostics
                    .first()
                    .map(|d| d.span.clone())
                    .unwrap_or_else(SourceSpan::detached);
                self.diagnostics
                    .error(format!("invalid predefined macro '{}'", name), span)
            }
        }
    }

    /// Drop every directive line.
    fn strip(&mut self) {
        let tokens = std::mem::take(&mut self.tokens);
        let mut i = 0;

        while i < tokens.len() {
            if directive_start(&tokens, i) {
                while i < tokens.len() && tokens[i].kind != TokenKind::EndDirective {
                    i += 1;
                }
            } else {
                self.output.push(tokens[i].clone());
            }
            i += 1;
        }
    }

    fn starts_line(&self, i: usize) -> bool {
        line_start(&self.tokens, i)
    }

    /// The tokens of the directive at `position`, without the directive
    /// token and the closing `EndDirective`. Moves past the line.
    fn take_line(&mut self) -> Vec<Token> {
        let start = self.position + 1;
        let end = self.line_end(start);
        let line = self.tokens[start.min(end)..end].to_vec();
        self.position = (end + 1).min(self.tokens.len());
        line
    }

    /// Copy the directive at `position` to the output unchanged.
    fn pass_line(&mut self) {
        let end = self.line_end(self.position + 1);
        let last = end.min(self.tokens.len() - 1);
        for i in self.position..=last {
            let token = self.tokens[i].clone();
            self.emit(token);
        }
        self.position = last + 1;
    }

    fn line_end(&self, from: usize) -> usize {
        let mut end = from;
        while end < self.tokens.len() && self.tokens[end].kind != TokenKind::EndDirective {
            end += 1;
        }
        end
    }

    fn emit(&mut self, mut token: Token) {
        if let Some(remap) = self.line_remaps.get(&token.span.file_name) {
            let mut span = token.span.shift_lines(remap.delta);
            if let Some(file_name) = &remap.file_name {
                span.file_name = file_name.clone();
            }
            token.span = span;
        }
        self.output.push(token);
    }

    /// Join adjacent string literals, as in `"a" "b"`.
    fn concatenate_strings(&mut self) {
        let tokens = std::mem::take(&mut self.output);
        for token in tokens {
            if token.kind == TokenKind::StringLiteral {
                if let Some(previous) = self.output.last_mut() {
                    if previous.kind == TokenKind::StringLiteral {
                        let mut text = previous.lexeme.take().unwrap_or_default();
                        text.push_str(token.lexeme.as_deref().unwrap_or_default());
                        previous.lexeme = Some(text);
                        previous.span = previous.span.to(&token.span);
                        continue;
                    }
                }
            }
            self.output.push(token);
        }
    }
}

fn directive_start(tokens: &[Token], i: usize) -> bool {
    match tokens[i].kind {
        TokenKind::Directive(_) => true,
        TokenKind::Hash => line_start(tokens, i),
        _ => false,
    }
}

/// Whether `tokens[i]` is the first token of its line.
fn line_start(tokens: &[Token], i: usize) -> bool {
    let Some(previous) = i.checked_sub(1).map(|p| &tokens[p]) else {
        return true;
    };
    let token = &tokens[i];
    previous.kind == TokenKind::EndDirective
        || !previous.span.same_file(&token.span)
        || previous.span.end.line < token.span.start.line
}

/// Parameter names after an `OpenFunctionLikeMacroParen`, and the index of
/// the first body token.
fn parse_parameters(rest: &[Token]) -> Option<(Vec<String>, usize)> {
    let mut parameters = Vec::new();
    let mut i = 1;

    if rest.get(i)?.kind == TokenKind::RParen {
        return Some((parameters, i + 1));
    }

    loop {
        let name = rest.get(i)?.word()?;
        parameters.push(name.into_owned());
        i += 1;
        match rest.get(i)?.kind {
            TokenKind::Comma => i += 1,
            TokenKind::RParen => return Some((parameters, i + 1)),
            _ => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use pretty_assertions::assert_eq;

    fn run(source: &str, config: &Config) -> PreprocessorOutput {
        let resolver = MemoryIncludeResolver::new();
        preprocess(lex(source).tokens, config, &resolver).unwrap()
    }

    fn texts(output: &PreprocessorOutput) -> Vec<String> {
        output.tokens.iter().map(|t| t.text().into_owned()).collect()
    }

    #[test]
    fn test_object_like_define() {
        let output = run("#define PI 3.14\nfloat x = PI;", &Config::new());
        assert_eq!(texts(&output), vec!["float", "x", "=", "3.14", ";"]);
        assert!(output.diagnostics.is_empty());
        assert!(output.macros.is_defined("PI"));
    }

    #[test]
    fn test_function_like_define() {
        let output = run("#define SQR(x) ((x)*(x))\nSQR(a+1)", &Config::new());
        assert_eq!(texts(&output).join(" "), "( ( a + 1 ) * ( a + 1 ) )");
    }

    #[test]
    fn test_nested_macro_references() {
        let output = run(
            "#define PI 3.14\n#define TWO_PI (2*PI)\nPI TWO_PI PI",
            &Config::new(),
        );
        assert_eq!(texts(&output).join(" "), "3.14 ( 2 * 3.14 ) 3.14");
    }

    #[test]
    fn test_undef() {
        let output = run("#define A 1\n#undef A\n#undef NEVER\nA", &Config::new());
        assert_eq!(texts(&output), vec!["A"]);
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_redefinition_warns_only_when_different() {
        let output = run("#define A 1\n#define A 1\n#define A 2\nA", &Config::new());
        assert_eq!(texts(&output), vec!["2"]);
        assert_eq!(output.diagnostics.len(), 1);
        assert!(!output.diagnostics[0].is_error());
    }

    #[test]
    fn test_conditional_first_match() {
        let source = "#if 0\na\n#elif 1\nb\n#elif 1\nc\n#else\nd\n#endif\ne";
        let output = run(source, &Config::new());
        assert_eq!(texts(&output), vec!["b", "e"]);
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_nested_conditionals_in_skipped_branch() {
        let source = "#if 0\n#if 1\na\n#endif\nb\n#else\nc\n#endif";
        let output = run(source, &Config::new());
        assert_eq!(texts(&output), vec!["c"]);
    }

    #[test]
    fn test_ifdef_ifndef_defined() {
        let source = "#define FOO\n\
                      #ifdef FOO\na\n#endif\n\
                      #ifndef FOO\nb\n#endif\n\
                      #if defined(FOO) && !defined BAR\nc\n#endif\n\
                      #if UNDEFINED_NAME\nd\n#endif";
        let output = run(source, &Config::new());
        assert_eq!(texts(&output), vec!["a", "c"]);
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_condition_uses_macros() {
        let source = "#define VERSION 3\n#define AT_LEAST(v) (VERSION >= v)\n\
                      #if AT_LEAST(2) && VERSION < 4\nok\n#endif";
        let output = run(source, &Config::new());
        assert_eq!(texts(&output), vec!["ok"]);
    }

    #[test]
    fn test_dangling_directives() {
        let output = run("#else\n#endif\n#elif 1\nx", &Config::new());
        assert_eq!(texts(&output), vec!["x"]);
        assert_eq!(output.diagnostics.len(), 3);
    }

    #[test]
    fn test_unterminated_conditional() {
        let output = run("#if 1\nx", &Config::new());
        assert_eq!(texts(&output), vec!["x"]);
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].message, "unterminated conditional directive");
    }

    #[test]
    fn test_pragma_and_error() {
        let output = run(
            "#pragma pack_matrix(row_major)\n#error bad thing\nx",
            &Config::new(),
        );
        assert_eq!(output.pragmas, vec!["pack_matrix ( row_major )"]);
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].message, "#error bad thing");
        assert_eq!(texts(&output), vec!["x"]);
    }

    #[test]
    fn test_line_directive() {
        let source = "a\n#line 100 \"gen.hlsl\"\nb\nc";
        let tokens = lexer::lex_file(source, "", "main.hlsl", ErrorPolicy::Permissive)
            .unwrap()
            .tokens;
        let output = preprocess(tokens, &Config::new(), &MemoryIncludeResolver::new()).unwrap();
        let a = &output.tokens[0];
        let b = &output.tokens[1];
        let c = &output.tokens[2];
        assert_eq!(a.span.start.line, 1);
        assert_eq!(&*a.span.file_name, "main.hlsl");
        assert_eq!(b.span.start.line, 100);
        assert_eq!(&*b.span.file_name, "gen.hlsl");
        assert_eq!(c.span.start.line, 101);
    }

    #[test]
    fn test_include() {
        let resolver = MemoryIncludeResolver::new()
            .with_file("lib/common.hlsl", "#pragma once\n#define SCALE 2\nfloat scale = SCALE;")
            .with_file("lib/other.hlsl", "#include \"common.hlsl\"\nfloat other;");
        let source = "#include \"lib/common.hlsl\"\n#include <lib/other.hlsl>\nSCALE";
        let output = preprocess(lex(source).tokens, &Config::new(), &resolver).unwrap();

        assert_eq!(
            texts(&output),
            vec!["float", "scale", "=", "2", ";", "float", "other", ";", "2"]
        );
        assert_eq!(&*output.tokens[0].span.file_name, "common.hlsl");
        assert_eq!(&*output.tokens[0].span.base_path, "lib");
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_pragma_once_across_include_spellings() {
        let resolver = MemoryIncludeResolver::new()
            .with_file("common.hlsl", "#pragma once\nfloat common;")
            .with_file("other.hlsl", "#include \"common.hlsl\"\nfloat other;");
        let config = Config::new().with_base_path("shaders");
        let source = "#include \"common.hlsl\"\n#include \"other.hlsl\"";
        let output = preprocess(lex(source).tokens, &config, &resolver).unwrap();

        assert_eq!(texts(&output), vec!["float", "common", ";", "float", "other", ";"]);
        assert_eq!(&*output.tokens[0].span.base_path, "");
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_missing_include_is_reported() {
        let output = run("#include \"nope.hlsl\"\nx", &Config::new());
        assert_eq!(texts(&output), vec!["x"]);
        assert_eq!(output.diagnostics.len(), 1);
    }

    #[test]
    fn test_recursive_include_is_bounded() {
        let resolver = MemoryIncludeResolver::new().with_file("self.hlsl", "#include \"self.hlsl\"\n");
        let output =
            preprocess(lex("#include \"self.hlsl\"").tokens, &Config::new(), &resolver).unwrap();
        assert!(output.tokens.is_empty());
        assert_eq!(output.diagnostics.len(), 1);
    }

    #[test]
    fn test_config_defines() {
        let config = Config::new()
            .with_define("QUALITY", "2")
            .with_define("SQR(x)", "((x)*(x))");
        let output = run("QUALITY SQR(3)", &config);
        assert_eq!(texts(&output).join(" "), "2 ( ( 3 ) * ( 3 ) )");
    }

    #[test]
    fn test_invalid_config_define() {
        let config = Config::new().with_define("BAD", "\"unterminated");
        let output = run("x", &config);
        assert_eq!(output.diagnostics.len(), 1);
        assert!(output.diagnostics[0].message.contains("BAD"));

        let strict = config.strict();
        let resolver = MemoryIncludeResolver::new();
        assert!(preprocess(lex("x").tokens, &strict, &resolver).is_err());
    }

    #[test]
    fn test_string_concatenation() {
        let output = run("#define NAME \"world\"\n\"hello \" NAME", &Config::new());
        assert_eq!(texts(&output), vec!["\"hello world\""]);
    }

    #[test]
    fn test_strip_directives() {
        let config = Config::new().with_mode(PreprocessorMode::StripDirectives);
        let output = run("#define A 1\n#if 0\nA\n#endif\nB", &config);
        assert_eq!(texts(&output), vec!["A", "B"]);
    }

    #[test]
    fn test_expand_includes_only() {
        let resolver = MemoryIncludeResolver::new().with_file("a.hlsl", "float a;");
        let config = Config::new().with_mode(PreprocessorMode::ExpandIncludesOnly);
        let source = "#define X 1\n#include \"a.hlsl\"\nX";
        let output = preprocess(lex(source).tokens, &config, &resolver).unwrap();
        assert_eq!(
            texts(&output),
            vec!["#define", "X", "1", "", "float", "a", ";", "X"]
        );
    }

    #[test]
    fn test_expand_all_except_includes() {
        let config = Config::new().with_mode(PreprocessorMode::ExpandAllExceptIncludes);
        let output = run("#define X 1\n#include \"a.hlsl\"\nX", &config);
        assert_eq!(texts(&output), vec!["#include", "\"a.hlsl\"", "", "1"]);
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_do_nothing() {
        let config = Config::new().with_mode(PreprocessorMode::DoNothing);
        let tokens = lex("#define X 1\nX").tokens;
        let resolver = MemoryIncludeResolver::new();
        let output = preprocess(tokens.clone(), &config, &resolver).unwrap();
        assert_eq!(output.tokens, tokens);
    }

    #[test]
    fn test_unknown_directive() {
        let output = run("#\n#warning careful\nx # y", &Config::new());
        assert_eq!(texts(&output), vec!["x", "#", "y"]);
        assert_eq!(output.diagnostics.len(), 1);
    }

    #[test]
    fn test_strict_mode_aborts() {
        let resolver = MemoryIncludeResolver::new();
        let result = preprocess(
            lex("#error stop here\nx").tokens,
            &Config::new().strict(),
            &resolver,
        );
        let err = result.unwrap_err();
        assert_eq!(
            err.diagnostic().map(|d| d.message.as_str()),
            Some("#error stop here")
        );
    }
}
