// End-to-end tests: source text through preprocessing and parsing

use hlslparse::parser::{Decl, Stmt};
use hlslparse::{parse_source, Config, Error, MemoryIncludeResolver, ParseOutput};
use pretty_assertions::assert_eq;

const COMMON: &str = r#"
#pragma once
float3 LightDirection(int index)
{
    return normalize(float3(index, 1.0, 0.0));
}
"#;

const SHADER: &str = r#"
#include "common.hlsl"
#define LIGHT_COUNT 4
#define SATURATE(x) clamp((x), 0.0, 1.0)

cbuffer PerFrame : register(b0)
{
    float4x4 viewProj;
    float3 eye;
    float time;
};

Texture2D<float4> albedo : register(t0);
SamplerState linearSampler : register(s0);

struct VSIn
{
    float3 position : POSITION;
    float3 normal : NORMAL;
    float2 uv : TEXCOORD0;
};

struct PSIn
{
    float4 position : SV_Position;
    float3 normal : NORMAL;
    float2 uv : TEXCOORD0;
};

PSIn VSMain(VSIn input)
{
    PSIn output;
    output.position = mul(float4(input.position, 1.0), viewProj);
    output.normal = normalize(input.normal);
    output.uv = input.uv;
    return output;
}

float4 PSMain(PSIn input) : SV_Target
{
    float3 color = albedo.Sample(linearSampler, input.uv).rgb;
    float lighting = 0.0;
    [unroll]
    for (int i = 0; i < LIGHT_COUNT; ++i)
    {
        lighting += SATURATE(dot(input.normal, LightDirection(i)));
    }
#if defined(USE_FOG)
    color = lerp(color, FOG_COLOR, 0.5);
#endif
    return float4(color * lighting, 1.0);
}
"#;

fn parse(config: &Config) -> ParseOutput {
    let resolver = MemoryIncludeResolver::new().with_file("common.hlsl", COMMON);
    parse_source(SHADER, config, &resolver).expect("Pipeline failed")
}

fn function_names(output: &ParseOutput) -> Vec<String> {
    output
        .unit
        .declarations
        .iter()
        .filter_map(|d| match d {
            Decl::Function(f) => Some(f.name.to_string()),
            _ => None,
        })
        .collect()
}

fn statement_count(output: &ParseOutput, function: &str) -> usize {
    output
        .unit
        .declarations
        .iter()
        .find_map(|d| match d {
            Decl::Function(f) if f.name.name() == function => f.body.as_ref(),
            _ => None,
        })
        .map(|body| body.statements.len())
        .unwrap_or(0)
}

#[test]
fn test_full_shader_parses_cleanly() {
    let output = parse(&Config::new().with_file_name("lit.hlsl"));

    assert!(
        output.diagnostics.is_empty(),
        "Unexpected diagnostics: {:?}",
        output.diagnostics
    );
    assert_eq!(output.unit.declarations.len(), 8);
    assert_eq!(
        function_names(&output),
        vec!["LightDirection", "VSMain", "PSMain"]
    );
    assert_eq!(output.pragmas, vec!["once"]);
}

#[test]
fn test_defines_select_conditional_code() {
    let without = parse(&Config::new());
    assert_eq!(statement_count(&without, "PSMain"), 4);

    let with = parse(&Config::new().with_define("USE_FOG", "1"));
    assert_eq!(statement_count(&with, "PSMain"), 5);
}

#[test]
fn test_macros_are_expanded_before_parsing() {
    let output = parse(&Config::new());
    let Some(Decl::Function(main)) = output
        .unit
        .declarations
        .iter()
        .find(|d| matches!(d, Decl::Function(f) if f.name.name() == "PSMain"))
    else {
        panic!("PSMain missing");
    };
    let body = main.body.as_ref().expect("body");
    let Stmt::For { attributes, .. } = &body.statements[2] else {
        panic!("expected for loop, got {:?}", body.statements[2]);
    };
    assert_eq!(attributes[0].name, "unroll");

    assert!(!output.tokens.iter().any(|t| t.text() == "LIGHT_COUNT"));
    assert!(output.tokens.iter().any(|t| t.text() == "clamp"));
}

#[test]
fn test_spans_name_their_files() {
    let output = parse(&Config::new().with_file_name("lit.hlsl"));

    let Decl::Function(light) = &output.unit.declarations[0] else {
        panic!("expected included function first");
    };
    assert_eq!(&*light.span.file_name, "common.hlsl");
    assert_eq!(light.span.start.line, 3);

    let Decl::ConstantBuffer(buffer) = &output.unit.declarations[1] else {
        panic!("expected cbuffer");
    };
    assert_eq!(&*buffer.span.file_name, "lit.hlsl");
    assert_eq!(buffer.span.start.line, 6);
}

#[test]
fn test_broken_source_still_yields_a_tree() {
    let source = "#define\nfloat a = ;\n#bogus\nfloat4 main() : SV_Target { return 0; }";
    let output = parse_source(source, &Config::new(), &MemoryIncludeResolver::new())
        .expect("permissive runs never abort");

    assert!(output.has_errors());
    assert_eq!(output.diagnostics.iter().filter(|d| d.is_error()).count(), 3);
    assert!(matches!(
        output.unit.declarations.last(),
        Some(Decl::Function(f)) if f.name.name() == "main"
    ));
}

#[test]
fn test_strict_pipeline_aborts() {
    let config = Config::new().strict();
    let result = parse_source("float a = ;", &config, &MemoryIncludeResolver::new());
    assert!(matches!(result, Err(Error::Aborted(_))));
}
