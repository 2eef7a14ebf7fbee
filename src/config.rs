//! Run configuration shared by the preprocessor and the pipeline helpers.

use std::fmt;
use std::str::FromStr;

use crate::diagnostics::ErrorPolicy;

/// How much preprocessing a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreprocessorMode {
    /// Full preprocessing: directives, macros and includes.
    #[default]
    ExpandAll,
    /// Full preprocessing, but `#include` lines are kept as written.
    ExpandAllExceptIncludes,
    /// Splice includes; every other directive and macro use is kept.
    ExpandIncludesOnly,
    /// Drop directive lines without interpreting them.
    StripDirectives,
    /// Pass the token stream through unchanged.
    DoNothing,
}

impl PreprocessorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreprocessorMode::ExpandAll => "expand-all",
            PreprocessorMode::ExpandAllExceptIncludes => "expand-all-except-includes",
            PreprocessorMode::ExpandIncludesOnly => "expand-includes-only",
            PreprocessorMode::StripDirectives => "strip-directives",
            PreprocessorMode::DoNothing => "do-nothing",
        }
    }

    pub(crate) fn expands_macros(&self) -> bool {
        matches!(
            self,
            PreprocessorMode::ExpandAll | PreprocessorMode::ExpandAllExceptIncludes
        )
    }

    pub(crate) fn expands_includes(&self) -> bool {
        matches!(
            self,
            PreprocessorMode::ExpandAll | PreprocessorMode::ExpandIncludesOnly
        )
    }
}

impl fmt::Display for PreprocessorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown preprocessor mode '{0}'")]
pub struct UnknownMode(pub String);

impl FromStr for PreprocessorMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = match s {
            "expand-all" | "all" => PreprocessorMode::ExpandAll,
            "expand-all-except-includes" | "no-includes" => {
                PreprocessorMode::ExpandAllExceptIncludes
            }
            "expand-includes-only" | "includes" => PreprocessorMode::ExpandIncludesOnly,
            "strip-directives" | "strip" => PreprocessorMode::StripDirectives,
            "do-nothing" | "none" => PreprocessorMode::DoNothing,
            other => return Err(UnknownMode(other.to_string())),
        };
        Ok(mode)
    }
}

/// Settings for one preprocessing/parsing run.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Directory that `#include` paths are resolved against.
    pub base_path: String,
    /// Name recorded in the spans of the main file.
    pub file_name: String,
    pub mode: PreprocessorMode,
    /// Predefined macros as `(NAME, replacement)`; `NAME` may carry a
    /// parameter list, e.g. `("SQR(x)", "((x)*(x))")`.
    pub defines: Vec<(String, String)>,
    pub policy: ErrorPolicy,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn with_mode(mut self, mode: PreprocessorMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defines.push((name.into(), value.into()));
        self
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn strict(self) -> Self {
        self.with_policy(ErrorPolicy::Strict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names_round_trip() {
        for mode in [
            PreprocessorMode::ExpandAll,
            PreprocessorMode::ExpandAllExceptIncludes,
            PreprocessorMode::ExpandIncludesOnly,
            PreprocessorMode::StripDirectives,
            PreprocessorMode::DoNothing,
        ] {
            assert_eq!(mode.as_str().parse::<PreprocessorMode>(), Ok(mode));
        }
        assert_eq!(
            "everything".parse::<PreprocessorMode>(),
            Err(UnknownMode("everything".to_string()))
        );
    }

    #[test]
    fn test_builder() {
        let config = Config::new()
            .with_file_name("main.hlsl")
            .with_define("QUALITY", "2")
            .with_mode(PreprocessorMode::StripDirectives)
            .strict();

        assert_eq!(config.file_name, "main.hlsl");
        assert_eq!(config.defines, vec![("QUALITY".to_string(), "2".to_string())]);
        assert_eq!(config.mode, PreprocessorMode::StripDirectives);
        assert_eq!(config.policy, ErrorPolicy::Strict);
        assert!(!config.mode.expands_macros());
    }
}
