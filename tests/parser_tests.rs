// Integration tests for the parser

use hlslparse::lexer::lex;
use hlslparse::parser::{
    parse_declaration, parse_expression, parse_statement, parse_top_level_declarations,
    BinaryOp, Decl, Expr, PostfixOp, PrefixOp, Spanned, Stmt, TypeNode,
};
use hlslparse::{Error, ErrorPolicy};
use pretty_assertions::assert_eq;

fn expr(source: &str) -> Expr {
    let parsed =
        parse_expression(&lex(source).tokens, ErrorPolicy::Strict).expect("Parsing failed");
    parsed.node
}

fn stmt(source: &str) -> Stmt {
    let parsed =
        parse_statement(&lex(source).tokens, ErrorPolicy::Strict).expect("Parsing failed");
    parsed.node
}

/// Fully parenthesized rendering, to make the tree shape visible.
fn render(expr: &Expr) -> String {
    match expr {
        Expr::Literal { value, .. } => value.clone(),
        Expr::Identifier(name) => name.to_string(),
        Expr::Grouping { inner, .. } => render(inner),
        Expr::Binary {
            op, left, right, ..
        } => format!("({} {} {})", render(left), op, render(right)),
        Expr::Assignment {
            op, target, value, ..
        } => format!("({} {} {})", render(target), op.as_str(), render(value)),
        Expr::Ternary {
            condition,
            then_expr,
            else_expr,
            ..
        } => format!(
            "({} ? {} : {})",
            render(condition),
            render(then_expr),
            render(else_expr)
        ),
        Expr::Prefix { op, operand, .. } => {
            let op = match op {
                PrefixOp::Plus => "+",
                PrefixOp::Minus => "-",
                PrefixOp::Not => "!",
                PrefixOp::BitNot => "~",
                PrefixOp::Increment => "++",
                PrefixOp::Decrement => "--",
            };
            format!("({}{})", op, render(operand))
        }
        Expr::Cast {
            target, operand, ..
        } => {
            let target = match target {
                TypeNode::Numeric { ty, .. } => ty.to_string(),
                TypeNode::Named(name) => name.to_string(),
                other => format!("{:?}", other),
            };
            format!("(cast<{}> {})", target, render(operand))
        }
        Expr::Call { callee, args, .. } => {
            let args: Vec<String> = args.iter().map(render).collect();
            format!("{}({})", callee, args.join(", "))
        }
        Expr::FieldAccess { object, field, .. } => format!("{}.{}", render(object), field),
        other => panic!("no rendering for {:?}", other),
    }
}

#[test]
fn test_binary_precedence_ladder() {
    assert_eq!(
        render(&expr("a || b && c | d ^ e & f == g < h << i + j * k")),
        "(a || (b && (c | (d ^ (e & (f == (g < (h << (i + (j * k))))))))))"
    );
}

#[test]
fn test_left_associative_binary_operators() {
    assert_eq!(render(&expr("a - b - c")), "((a - b) - c)");
    assert_eq!(render(&expr("a / b * c")), "((a / b) * c)");
    assert_eq!(render(&expr("a + b * c - d")), "((a + (b * c)) - d)");
}

#[test]
fn test_right_associative_operators() {
    assert_eq!(render(&expr("a = b += c")), "(a = (b += c))");
    assert_eq!(render(&expr("a ? b : c ? d : e")), "(a ? b : (c ? d : e))");
}

#[test]
fn test_prefix_binds_tighter_than_binary() {
    assert_eq!(render(&expr("-a * b")), "((-a) * b)");
    assert_eq!(render(&expr("!a && ~b")), "((!a) && (~b))");
    assert_eq!(render(&expr("(a + b) * c")), "((a + b) * c)");
}

#[test]
fn test_cast_versus_parenthesized_expression() {
    assert_eq!(render(&expr("(float)x")), "(cast<float> x)");
    assert_eq!(render(&expr("(float)-x")), "(cast<float> (-x))");
    assert_eq!(render(&expr("(Light)x")), "(cast<Light> x)");
    assert_eq!(render(&expr("(x)")), "x");
    assert_eq!(render(&expr("(x) - y")), "(x - y)");
    assert_eq!(render(&expr("(x) + (y)")), "(x + y)");
    assert_eq!(render(&expr("(int)a + b")), "((cast<int> a) + b)");
    assert!(matches!(expr("(x)"), Expr::Grouping { .. }));
}

#[test]
fn test_increment_of_parenthesized_variable_is_not_a_cast() {
    let Stmt::Expression { expr: statement, .. } = stmt("(i)++;") else {
        panic!("expected expression statement");
    };
    let Expr::Postfix { op, operand, .. } = statement else {
        panic!("expected postfix increment");
    };
    assert_eq!(op, PostfixOp::Increment);
    assert!(matches!(*operand, Expr::Grouping { .. }));

    let Stmt::Expression { expr: statement, .. } = stmt("(i)++ + j;") else {
        panic!("expected expression statement");
    };
    let Expr::Binary { op, left, .. } = statement else {
        panic!("expected addition");
    };
    assert_eq!(op, BinaryOp::Add);
    assert!(matches!(*left, Expr::Postfix { .. }));

    assert_eq!(render(&expr("(int)++x")), "(cast<int> (++x))");
}

#[test]
fn test_calls_and_members() {
    assert_eq!(
        render(&expr("saturate(dot(n, l)).x")),
        "saturate(dot(n, l)).x"
    );
}

#[test]
fn test_declaration_versus_expression_statement() {
    assert!(matches!(stmt("Light light;"), Stmt::Variable(_)));
    assert!(matches!(stmt("float3 n = normalize(v);"), Stmt::Variable(_)));
    assert!(matches!(stmt("const uint count = 4;"), Stmt::Variable(_)));
    assert!(matches!(stmt("light = other;"), Stmt::Expression { .. }));
    assert!(matches!(stmt("light.color *= 2;"), Stmt::Expression { .. }));
    assert!(matches!(stmt("Process(light);"), Stmt::Expression { .. }));
    assert!(matches!(stmt("count++;"), Stmt::Expression { .. }));
}

#[test]
fn test_function_versus_variable_declaration() {
    let parsed = parse_declaration(&lex("float4 Tint(float4 c);").tokens, ErrorPolicy::Strict)
        .expect("Parsing failed");
    assert!(matches!(parsed.node, Decl::Function(_)));

    let parsed = parse_declaration(&lex("float4 tint = 1;").tokens, ErrorPolicy::Strict)
        .expect("Parsing failed");
    assert!(matches!(parsed.node, Decl::Variable(_)));
}

#[test]
fn test_node_tokens_projection() {
    let tokens = lex("float total = base + offset * 2;").tokens;
    let parsed = parse_statement(&tokens, ErrorPolicy::Strict).expect("Parsing failed");
    let Stmt::Variable(decl) = parsed.node else {
        panic!("expected declaration");
    };
    let initializer = decl.declarators[0]
        .initializer
        .as_ref()
        .expect("initializer");

    let texts: Vec<String> = initializer
        .tokens(&tokens)
        .iter()
        .map(|t| t.text().into_owned())
        .collect();
    assert_eq!(texts, vec!["base", "+", "offset", "*", "2"]);
    assert_eq!(decl.span.start.offset, 0);
    assert_eq!(decl.span.end.offset, 32);
}

#[test]
fn test_recovery_keeps_parsing_later_declarations() {
    let source = "
        float broken = (1 + ;
        struct Light { float3 color; };
        float4 main() : SV_Target { float x = ; return 1; }
        float tail;
    ";
    let parsed = parse_top_level_declarations(&lex(source).tokens, ErrorPolicy::Permissive)
        .expect("permissive parsing never aborts");

    assert!(parsed.has_errors());
    let kinds: Vec<&str> = parsed
        .node
        .declarations
        .iter()
        .map(|d| match d {
            Decl::Variable(_) => "variable",
            Decl::Struct(_) => "struct",
            Decl::Function(_) => "function",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["variable", "struct", "function", "variable"]);

    let Decl::Function(main) = &parsed.node.declarations[2] else {
        panic!("expected function");
    };
    let body = main.body.as_ref().expect("body");
    assert_eq!(body.statements.len(), 2);
}

#[test]
fn test_strict_parse_aborts() {
    let result = parse_top_level_declarations(
        &lex("float a = ;\nfloat b;").tokens,
        ErrorPolicy::Strict,
    );
    let Err(Error::Aborted(diagnostic)) = result else {
        panic!("expected abort");
    };
    assert_eq!(diagnostic.message, "expected expression, found ';'");
    assert_eq!(diagnostic.span.start.line, 1);
}
