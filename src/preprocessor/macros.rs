//! Macro table and expander
//!
//! Expansion is hide-set based. One expansion call starts from the tokens of
//! a single invocation (the macro name plus its argument list) and keeps
//! rescanning its own output until a scan performs no substitution. Every
//! macro substituted during a scan joins the hide-set of the following
//! scans, so a macro can never re-expand inside its own replacement.
//!
//! Before each scan a glue pass runs over the token run: `##` pastes its two
//! neighbours into one token, and inside `#if` conditions `defined X` /
//! `defined(X)` become `1` or `0`.

use log::trace;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::diagnostics::{DiagnosticBag, Error, SourceSpan};
use crate::lexer::{self, join_tokens, Token, TokenKind};

/// A `#define`d macro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    pub name: String,
    pub is_function_like: bool,
    pub parameters: Vec<String>,
    pub body: Vec<Token>,
}

impl Macro {
    pub fn object_like(name: impl Into<String>, body: Vec<Token>) -> Self {
        Self {
            name: name.into(),
            is_function_like: false,
            parameters: Vec::new(),
            body,
        }
    }

    pub fn function_like(name: impl Into<String>, parameters: Vec<String>, body: Vec<Token>) -> Self {
        Self {
            name: name.into(),
            is_function_like: true,
            parameters,
            body,
        }
    }

    /// Same parameters and same body text, ignoring where it was written.
    pub fn same_definition(&self, other: &Macro) -> bool {
        self.is_function_like == other.is_function_like
            && self.parameters == other.parameters
            && self.body.len() == other.body.len()
            && self
                .body
                .iter()
                .zip(&other.body)
                .all(|(a, b)| a.kind == b.kind && a.text() == b.text())
    }

    fn parameter_index(&self, token: &Token) -> Option<usize> {
        let word = token.word()?;
        self.parameters.iter().position(|p| *p == word)
    }
}

/// Name-keyed macro definitions of one preprocessing run.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: FxHashMap<String, Macro>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a definition, returning the one it replaced.
    pub fn define(&mut self, mac: Macro) -> Option<Macro> {
        self.macros.insert(mac.name.clone(), mac)
    }

    pub fn undefine(&mut self, name: &str) -> Option<Macro> {
        self.macros.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Macro> {
        self.macros.values()
    }
}

pub(crate) type HideSet = FxHashSet<String>;

/// Index just past the `)` closing an argument list that opens at
/// `tokens[open]`. `None` when there is no `(` there, or the list is cut off
/// by the end of the run or a directive boundary.
pub(crate) fn argument_list_end(tokens: &[Token], open: usize) -> Option<usize> {
    if tokens.get(open)?.kind != TokenKind::LParen {
        return None;
    }

    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            TokenKind::Directive(_) | TokenKind::EndDirective => return None,
            _ => {}
        }
    }
    None
}

/// Split the tokens between the parentheses of a call at top-level commas.
pub(crate) fn split_arguments(inner: &[Token]) -> Vec<Vec<Token>> {
    let mut args = vec![Vec::new()];
    let mut depth = 0usize;

    for token in inner {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth = depth.saturating_sub(1),
            TokenKind::Comma if depth == 0 => {
                args.push(Vec::new());
                continue;
            }
            _ => {}
        }
        if let Some(current) = args.last_mut() {
            current.push(token.clone());
        }
    }

    args
}

/// Expands macro invocations against a table.
pub(crate) struct Expander<'a> {
    table: &'a MacroTable,
    diagnostics: &'a mut DiagnosticBag,
    /// Replace `defined X` with `1`/`0` (only inside `#if`/`#elif`).
    resolve_defined: bool,
}

impl<'a> Expander<'a> {
    pub fn new(table: &'a MacroTable, diagnostics: &'a mut DiagnosticBag) -> Self {
        Self {
            table,
            diagnostics,
            resolve_defined: false,
        }
    }

    pub fn for_condition(table: &'a MacroTable, diagnostics: &'a mut DiagnosticBag) -> Self {
        Self {
            table,
            diagnostics,
            resolve_defined: true,
        }
    }

    /// Expand every macro invocation in `tokens`, one invocation at a time.
    pub fn expand_all(&mut self, tokens: &[Token], hide: &HideSet) -> Result<Vec<Token>, Error> {
        let mut output = Vec::with_capacity(tokens.len());
        let mut position = 0;

        while position < tokens.len() {
            match self.expand_invocation(tokens, position, hide)? {
                Some((expansion, next)) => {
                    output.extend(expansion);
                    position = next;
                }
                None => {
                    output.push(tokens[position].clone());
                    position += 1;
                }
            }
        }

        Ok(output)
    }

    /// Expand the invocation starting at `tokens[start]`.
    ///
    /// Returns the expansion and the index after the consumed tokens, or
    /// `None` when `tokens[start]` is not an invocation (not a macro, hidden,
    /// or a function-like macro with no argument list).
    pub fn expand_invocation(
        &mut self,
        tokens: &[Token],
        start: usize,
        hide: &HideSet,
    ) -> Result<Option<(Vec<Token>, usize)>, Error> {
        let Some(mac) = self.lookup(&tokens[start], hide) else {
            return Ok(None);
        };

        let mut end = start + 1;
        if mac.is_function_like {
            match argument_list_end(tokens, end) {
                Some(close) => end = close,
                None => return Ok(None),
            }
        }

        let (mut output, mut hide) = self.expand_with(tokens[start..end].to_vec(), hide.clone())?;

        // An expansion ending in a function-like macro name takes its
        // arguments from the tokens that follow the invocation.
        loop {
            let Some(mac) = output.last().and_then(|last| self.lookup(last, &hide)) else {
                break;
            };
            if !mac.is_function_like {
                break;
            }
            let Some(close) = argument_list_end(tokens, end) else {
                break;
            };

            let mut run: Vec<Token> = output.pop().into_iter().collect();
            run.extend_from_slice(&tokens[end..close]);
            end = close;

            let (tail, tail_hide) = self.expand_with(run, hide)?;
            output.extend(tail);
            hide = tail_hide;
        }

        Ok(Some((output, end)))
    }

    /// Rescan `run` until no substitution happens. Returns the result and
    /// the final hide-set.
    fn expand_with(&mut self, run: Vec<Token>, mut hide: HideSet) -> Result<(Vec<Token>, HideSet), Error> {
        let mut run = self.glue(run)?;

        loop {
            let mut next_hide = hide.clone();
            let (scanned, substituted) = self.scan(run, &hide, &mut next_hide)?;
            run = scanned;

            if !substituted {
                return Ok((run, hide));
            }

            hide = next_hide;
            run = self.glue(run)?;
        }
    }

    /// One left-to-right substitution pass.
    fn scan(
        &mut self,
        run: Vec<Token>,
        hide: &HideSet,
        next_hide: &mut HideSet,
    ) -> Result<(Vec<Token>, bool), Error> {
        let mut output = Vec::with_capacity(run.len());
        let mut substituted = false;
        let mut i = 0;

        while i < run.len() {
            let token = &run[i];
            let Some(mac) = self.lookup(token, hide) else {
                output.push(token.clone());
                i += 1;
                continue;
            };

            if !mac.is_function_like {
                trace!("expanding {} at {}", mac.name, token.span);
                output.extend(mac.body.iter().cloned());
                next_hide.insert(mac.name.clone());
                substituted = true;
                i += 1;
                continue;
            }

            let Some(close) = argument_list_end(&run, i + 1) else {
                output.push(token.clone());
                i += 1;
                continue;
            };

            trace!("expanding {}(...) at {}", mac.name, token.span);
            let args = split_arguments(&run[i + 2..close - 1]);
            let body = self.substitute(mac, args, &token.span)?;
            output.extend(body);
            next_hide.insert(mac.name.clone());
            substituted = true;
            i = close;
        }

        Ok((output, substituted))
    }

    /// Replace the formals of a function-like macro body with the actual
    /// arguments.
    fn substitute(
        &mut self,
        mac: &Macro,
        mut args: Vec<Vec<Token>>,
        call_span: &SourceSpan,
    ) -> Result<Vec<Token>, Error> {
        // `F()` passes one empty argument; that is no arguments at all for a
        // macro without parameters.
        if mac.parameters.is_empty() && args.len() == 1 && args[0].is_empty() {
            args.clear();
        }

        if args.len() != mac.parameters.len() {
            self.diagnostics.error(
                format!(
                    "macro '{}' expects {} argument(s), got {}",
                    mac.name,
                    mac.parameters.len(),
                    args.len()
                ),
                call_span.clone(),
            )?;
        }

        let body = &mac.body;
        let is_paste = |i: usize| body.get(i).is_some_and(|t| t.kind == TokenKind::HashHash);
        let mut output: Vec<Token> = Vec::with_capacity(body.len());
        let mut i = 0;

        while i < body.len() {
            let token = &body[i];

            if token.kind == TokenKind::Hash {
                if let Some(index) = body.get(i + 1).and_then(|next| mac.parameter_index(next)) {
                    let argument = args.get(index).map(Vec::as_slice).unwrap_or_default();
                    output.push(stringize(argument, token.span.to(&body[i + 1].span)));
                    i += 2;
                    continue;
                }
            }

            let Some(index) = mac.parameter_index(token) else {
                output.push(token.clone());
                i += 1;
                continue;
            };

            match args.get(index) {
                // Missing argument: the formal stays as written.
                None => output.push(token.clone()),
                // An empty operand of `##` disappears along with the operator.
                Some(argument) if argument.is_empty() && is_paste(i + 1) => i += 1,
                Some(argument) if argument.is_empty() && i > 0 && is_paste(i - 1) => {
                    if output.last().is_some_and(|t| t.kind == TokenKind::HashHash) {
                        output.pop();
                    }
                }
                // Arguments go in unexpanded; the rescan expands them.
                Some(argument) => output.extend(argument.iter().cloned()),
            }
            i += 1;
        }

        Ok(output)
    }

    fn glue(&mut self, run: Vec<Token>) -> Result<Vec<Token>, Error> {
        let run = if self.resolve_defined {
            self.resolve_defined_operators(run)?
        } else {
            run
        };
        self.paste(run)
    }

    /// Replace `defined X` and `defined(X)` with `1` or `0`.
    pub fn resolve_defined_operators(&mut self, run: Vec<Token>) -> Result<Vec<Token>, Error> {
        if !run.iter().any(is_defined_operator) {
            return Ok(run);
        }

        let mut output = Vec::with_capacity(run.len());
        let mut tokens = run.into_iter().peekable();

        while let Some(token) = tokens.next() {
            if !is_defined_operator(&token) {
                output.push(token);
                continue;
            }

            let parenthesized = tokens.next_if(|t| t.kind == TokenKind::LParen).is_some();
            let name = tokens.next_if(|t| t.kind.is_word());
            let closed = !parenthesized || tokens.next_if(|t| t.kind == TokenKind::RParen).is_some();

            let value = match (&name, closed) {
                (Some(name), true) => {
                    let defined = name.word().is_some_and(|word| self.table.is_defined(&word));
                    if defined { "1" } else { "0" }
                }
                _ => {
                    self.diagnostics
                        .error("'defined' expects a macro name", token.span.clone())?;
                    "0"
                }
            };
            output.push(Token::synthesized(TokenKind::IntLiteral, value, token.span));
        }

        Ok(output)
    }

    /// Apply `##` operators, absorbing chains such as `A##B##C`.
    fn paste(&mut self, run: Vec<Token>) -> Result<Vec<Token>, Error> {
        if !run.iter().any(|t| t.kind == TokenKind::HashHash) {
            return Ok(run);
        }

        let mut output: Vec<Token> = Vec::with_capacity(run.len());
        let mut tokens = run.into_iter();

        while let Some(token) = tokens.next() {
            if token.kind != TokenKind::HashHash {
                output.push(token);
                continue;
            }

            match (output.pop(), tokens.next()) {
                (Some(left), Some(right)) => match paste_pair(&left, &right) {
                    Some(pasted) => output.push(pasted),
                    None => {
                        self.diagnostics.error(
                            format!(
                                "pasting '{}' and '{}' does not give a valid token",
                                left.text(),
                                right.text()
                            ),
                            token.span.clone(),
                        )?;
                        output.push(left);
                        output.push(right);
                    }
                },
                // An empty operand leaves the other side as it is.
                (Some(side), None) | (None, Some(side)) => output.push(side),
                (None, None) => {}
            }
        }

        Ok(output)
    }

    fn lookup(&self, token: &Token, hide: &HideSet) -> Option<&'a Macro> {
        let table: &'a MacroTable = self.table;
        let word = token.word()?;
        if hide.contains(word.as_ref()) {
            return None;
        }
        table.get(&word)
    }
}

fn is_defined_operator(token: &Token) -> bool {
    token.kind == TokenKind::Identifier && token.lexeme.as_deref() == Some("defined")
}

/// Glue two tokens into one, re-lexing the joined text. Only words and
/// integer literals can be pasted.
fn paste_pair(left: &Token, right: &Token) -> Option<Token> {
    let pasteable = |t: &Token| t.kind.is_word() || t.kind == TokenKind::IntLiteral;
    if !pasteable(left) || !pasteable(right) {
        return None;
    }

    let text = format!("{}{}", left.text(), right.text());
    let lexed = lexer::lex(&text);
    match lexed.tokens.as_slice() {
        [single] if lexed.diagnostics.is_empty() => Some(Token::new(
            single.kind,
            single.lexeme.clone(),
            left.span.to(&right.span),
        )),
        _ => None,
    }
}

/// `#param`: the argument's spelling as a string literal.
fn stringize(argument: &[Token], span: SourceSpan) -> Token {
    let text = join_tokens(argument);
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    Token::synthesized(TokenKind::StringLiteral, escaped, span)
}
