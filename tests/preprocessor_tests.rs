// Integration tests for the preprocessor

use hlslparse::lexer::{lex, TokenKind};
use hlslparse::preprocessor::preprocess;
use hlslparse::{preprocess_source, Config, MemoryIncludeResolver, PreprocessorMode, PreprocessorOutput};
use pretty_assertions::assert_eq;

fn run(source: &str) -> PreprocessorOutput {
    preprocess_source(source, &Config::new(), &MemoryIncludeResolver::new())
        .expect("Preprocessing failed")
}

fn texts(output: &PreprocessorOutput) -> Vec<String> {
    output.tokens.iter().map(|t| t.text().into_owned()).collect()
}

#[test]
fn test_self_referencing_macros_terminate() {
    let output = run("#define foo foo\n#define a b\n#define b a\nfoo a b");
    assert_eq!(texts(&output), vec!["foo", "a", "b"]);
    assert!(output.diagnostics.is_empty());
}

#[test]
fn test_same_macro_twice_on_one_line() {
    let output = run("#define ONE 1\n#define TWO (ONE + ONE)\nTWO * TWO");
    assert_eq!(
        texts(&output).join(" "),
        "( 1 + 1 ) * ( 1 + 1 )"
    );
}

#[test]
fn test_paste_forms_numeric_type() {
    let output = run("#define CAT(a, b) a ## b\nCAT(flo, at4) v;");
    assert_eq!(texts(&output), vec!["float4", "v", ";"]);
    assert!(matches!(output.tokens[0].kind, TokenKind::Numeric(_)));
}

#[test]
fn test_paste_with_integer() {
    let output = run("#define VAR(n) v ## n\nVAR(1) = VAR(2);");
    assert_eq!(texts(&output), vec!["v1", "=", "v2", ";"]);
}

#[test]
fn test_paste_with_empty_argument() {
    let output = run("#define CAT(a, b) x a ## b\nCAT(, y)");
    assert_eq!(texts(&output), vec!["x", "y"]);

    let output = run("#define CAT(a, b) a ## b z\nCAT(y, )");
    assert_eq!(texts(&output), vec!["y", "z"]);
    assert!(output.diagnostics.is_empty());
}

#[test]
fn test_nested_call_of_the_same_macro() {
    let output = run("#define f(x) x + 1\nf(f(1))");
    assert_eq!(texts(&output).join(" "), "f ( 1 ) + 1");
}

#[test]
fn test_stringize() {
    let output = run("#define STR(x) #x\nSTR(a + b)");
    assert_eq!(texts(&output), vec!["\"a + b\""]);
}

#[test]
fn test_macro_spanning_lines_of_arguments() {
    let output = run("#define ADD(a, b) a + b\nADD(\n  1,\n  2\n);");
    assert_eq!(texts(&output), vec!["1", "+", "2", ";"]);
}

#[test]
fn test_conditionals_select_one_branch() {
    let source = "#define QUALITY 2\n\
                  #if QUALITY > 2\nhigh\n\
                  #elif QUALITY == 2\nmedium\n\
                  #else\nlow\n\
                  #endif\n\
                  #ifdef MISSING\nmissing\n#endif\n\
                  done";
    let output = run(source);
    assert_eq!(texts(&output), vec!["medium", "done"]);
    assert!(output.diagnostics.is_empty());
}

#[test]
fn test_includes_with_pragma_once() {
    let resolver = MemoryIncludeResolver::new()
        .with_file("shaders/common.hlsl", "#pragma once\nstatic const float PI = 3.14;")
        .with_file("shaders/lighting.hlsl", "#include \"common.hlsl\"\nfloat3 Light();");
    let config = Config::new().with_base_path("shaders").with_file_name("main.hlsl");
    let source = "#include \"common.hlsl\"\n#include \"lighting.hlsl\"\nfloat main();";

    let output = preprocess_source(source, &config, &resolver).expect("Preprocessing failed");

    assert_eq!(
        texts(&output).join(" "),
        "static const float PI = 3.14 ; float3 Light ( ) ; float main ( ) ;"
    );
    assert_eq!(output.pragmas, vec!["once"]);
    assert!(output.diagnostics.is_empty());

    let files: Vec<&str> = output.tokens.iter().map(|t| &*t.span.file_name).collect();
    assert_eq!(files[0], "common.hlsl");
    assert_eq!(files[files.len() - 1], "main.hlsl");
}

#[test]
fn test_strip_directives_is_idempotent() {
    let config = Config::new().with_mode(PreprocessorMode::StripDirectives);
    let resolver = MemoryIncludeResolver::new();
    let source = "#define A 1\n#if A\nfloat a;\n#endif\n#pragma once\nfloat b = A;";

    let once = preprocess(lex(source).tokens, &config, &resolver).expect("Preprocessing failed");
    let twice =
        preprocess(once.tokens.clone(), &config, &resolver).expect("Preprocessing failed");

    assert_eq!(texts(&once), texts(&twice));
    assert_eq!(texts(&once).join(" "), "float a ; float b = A ;");
}

#[test]
fn test_do_nothing_keeps_tokens() {
    let config = Config::new().with_mode(PreprocessorMode::DoNothing);
    let source = "#define A 1\nA";
    let output = preprocess_source(source, &config, &MemoryIncludeResolver::new())
        .expect("Preprocessing failed");
    assert_eq!(output.tokens, lex(source).tokens);
}

#[test]
fn test_errors_are_not_fatal_by_default() {
    let output = run("#define\n#bogus\n#include nothing\n#error oops\nfloat x;");
    assert_eq!(texts(&output), vec!["float", "x", ";"]);
    assert_eq!(output.diagnostics.iter().filter(|d| d.is_error()).count(), 4);
}

#[test]
fn test_strict_mode_stops_at_first_error() {
    let config = Config::new().strict();
    let result = preprocess_source("#bogus\nfloat x;", &config, &MemoryIncludeResolver::new());
    let err = result.expect_err("strict mode should abort");
    let diagnostic = err.diagnostic().expect("aborts carry a diagnostic");
    assert_eq!(diagnostic.message, "unknown directive '#bogus'");
    assert_eq!(diagnostic.span.start.line, 1);
}

#[test]
fn test_config_defines_feed_conditions() {
    let config = Config::new().with_define("USE_SHADOWS", "1");
    let source = "#if defined(USE_SHADOWS) && USE_SHADOWS\nshadows\n#else\nnone\n#endif";
    let output = preprocess_source(source, &config, &MemoryIncludeResolver::new())
        .expect("Preprocessing failed");
    assert_eq!(texts(&output), vec!["shadows"]);
}
