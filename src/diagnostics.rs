//! Source positions, diagnostics and the crate error type
//!
//! Every stage (lexer, preprocessor, evaluator, parser) records problems
//! through a [`DiagnosticBag`]. Whether a recorded error aborts the run is
//! decided in exactly one place, [`DiagnosticBag::report`], based on the
//! [`ErrorPolicy`] the bag was created with:
//!
//! - [`ErrorPolicy::Permissive`]: the diagnostic is stored and the caller
//!   carries on with best-effort recovery.
//! - [`ErrorPolicy::Strict`]: the first error comes back as
//!   [`Error::Aborted`] and is propagated with `?`.
//!
//! The parser's speculative mode reuses the same path: while a trial parse
//! is running, any error aborts the trial instead of being stored.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// A position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    /// Byte offset from the start of the file.
    pub offset: usize,
}

impl Location {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Location::new(1, 1, 0)
    }
}

/// A region of a source file.
///
/// File identity is shared (`Arc<str>`) because every token carries a span
/// and tokens are cloned freely during macro expansion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceSpan {
    pub base_path: Arc<str>,
    pub file_name: Arc<str>,
    pub start: Location,
    pub end: Location,
}

impl SourceSpan {
    pub fn new(base_path: Arc<str>, file_name: Arc<str>, start: Location, end: Location) -> Self {
        Self {
            base_path,
            file_name,
            start,
            end,
        }
    }

    /// A span that belongs to no file, used for synthesized tokens.
    pub fn detached() -> Self {
        SourceSpan::new(Arc::from(""), Arc::from(""), Location::default(), Location::default())
    }

    /// A zero-width span at the end of this one.
    pub fn end_point(&self) -> SourceSpan {
        SourceSpan {
            start: self.end,
            ..self.clone()
        }
    }

    pub fn same_file(&self, other: &SourceSpan) -> bool {
        self.file_name == other.file_name
    }

    /// Join this span with a later one.
    ///
    /// Spans from different files, or an `end` that lies before `self`
    /// (macro-expanded tokens point back into macro bodies), leave `self`
    /// unchanged.
    pub fn to(&self, end: &SourceSpan) -> SourceSpan {
        if self.same_file(end) && end.end.offset >= self.start.offset {
            SourceSpan {
                end: end.end,
                ..self.clone()
            }
        } else {
            self.clone()
        }
    }

    pub fn contains(&self, other: &SourceSpan) -> bool {
        self.same_file(other)
            && self.start.offset <= other.start.offset
            && other.end.offset <= self.end.offset
    }

    /// Shift both ends by `delta` lines, as requested by a `#line` directive.
    pub fn shift_lines(&self, delta: isize) -> SourceSpan {
        let shift = |line: usize| line.saturating_add_signed(delta).max(1);
        SourceSpan {
            start: Location {
                line: shift(self.start.line),
                ..self.start
            },
            end: Location {
                line: shift(self.end.line),
                ..self.end
            },
            ..self.clone()
        }
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = if self.file_name.is_empty() {
            "<input>"
        } else {
            &self.file_name
        };
        write!(f, "{}:{}:{}", file, self.start.line, self.start.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A message attached to a source span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub span: SourceSpan,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            message: message.into(),
            span,
            severity: Severity::Error,
        }
    }

    pub fn warning(message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            message: message.into(),
            span,
            severity: Severity::Warning,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.span, self.severity, self.message)
    }
}

/// What happens when an error diagnostic is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Record the diagnostic and keep going.
    #[default]
    Permissive,
    /// Stop at the first error.
    Strict,
}

#[derive(Debug, Error)]
pub enum Error {
    /// Strict mode stopped at this diagnostic.
    #[error("{0}")]
    Aborted(Diagnostic),

    #[error("could not read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Error::Aborted(diagnostic) => Some(diagnostic),
            Error::Io { .. } => None,
        }
    }
}

/// Ordered list of diagnostics for one pass.
#[derive(Debug, Default)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
    policy: ErrorPolicy,
    speculation_depth: usize,
}

impl DiagnosticBag {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            diagnostics: Vec::new(),
            policy,
            speculation_depth: 0,
        }
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Record a diagnostic.
    ///
    /// Returns `Err` when the run (or the current trial parse) has to stop.
    pub fn report(&mut self, diagnostic: Diagnostic) -> Result<(), Error> {
        if self.speculation_depth > 0 {
            return match diagnostic.severity {
                Severity::Error => Err(Error::Aborted(diagnostic)),
                Severity::Warning => Ok(()),
            };
        }

        if diagnostic.is_error() && self.policy == ErrorPolicy::Strict {
            self.diagnostics.push(diagnostic.clone());
            return Err(Error::Aborted(diagnostic));
        }

        self.diagnostics.push(diagnostic);
        Ok(())
    }

    pub fn error(&mut self, message: impl Into<String>, span: SourceSpan) -> Result<(), Error> {
        self.report(Diagnostic::error(message, span))
    }

    pub fn warning(&mut self, message: impl Into<String>, span: SourceSpan) -> Result<(), Error> {
        self.report(Diagnostic::warning(message, span))
    }

    /// Append diagnostics that an inner pass already recorded under the same
    /// policy.
    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub(crate) fn begin_speculation(&mut self) {
        self.speculation_depth += 1;
    }

    pub(crate) fn end_speculation(&mut self) {
        self.speculation_depth = self.speculation_depth.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span_at(file: &str, start: usize, end: usize) -> SourceSpan {
        SourceSpan::new(
            Arc::from(""),
            Arc::from(file),
            Location::new(1, start + 1, start),
            Location::new(1, end + 1, end),
        )
    }

    #[test]
    fn test_permissive_records_and_continues() {
        let mut bag = DiagnosticBag::new(ErrorPolicy::Permissive);
        assert!(bag.error("first", span_at("a.hlsl", 0, 1)).is_ok());
        assert!(bag.error("second", span_at("a.hlsl", 2, 3)).is_ok());
        assert_eq!(bag.error_count(), 2);
        assert_eq!(bag.diagnostics()[0].message, "first");
    }

    #[test]
    fn test_strict_aborts_on_first_error() {
        let mut bag = DiagnosticBag::new(ErrorPolicy::Strict);
        assert!(bag.warning("only a warning", span_at("a.hlsl", 0, 1)).is_ok());

        let err = bag.error("boom", span_at("a.hlsl", 2, 3)).unwrap_err();
        assert_eq!(err.diagnostic().map(|d| d.message.as_str()), Some("boom"));
        assert_eq!(bag.diagnostics().len(), 2);
    }

    #[test]
    fn test_speculation_discards_errors() {
        let mut bag = DiagnosticBag::new(ErrorPolicy::Permissive);
        bag.begin_speculation();
        assert!(bag.error("trial failed", span_at("a.hlsl", 0, 1)).is_err());
        bag.end_speculation();
        assert!(bag.diagnostics().is_empty());
    }

    #[test]
    fn test_span_join() {
        let start = span_at("a.hlsl", 4, 6);
        let end = span_at("a.hlsl", 10, 12);
        let joined = start.to(&end);
        assert_eq!(joined.start.offset, 4);
        assert_eq!(joined.end.offset, 12);
        assert!(joined.contains(&end));

        // An earlier span (macro body) does not extend the node.
        let earlier = span_at("a.hlsl", 0, 1);
        assert_eq!(start.to(&earlier), start);

        let other_file = span_at("b.hlsl", 20, 30);
        assert_eq!(start.to(&other_file), start);
    }

    #[test]
    fn test_shift_lines() {
        let span = span_at("a.hlsl", 0, 1);
        assert_eq!(span.shift_lines(9).start.line, 10);
        assert_eq!(span.shift_lines(-5).start.line, 1);
    }
}
