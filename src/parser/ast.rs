// Syntax tree definitions for HLSL

use std::fmt;

use crate::diagnostics::SourceSpan;
use crate::lexer::{Keyword, NumericType, Token};

/// Anything that covers a region of source.
pub trait Spanned {
    fn span(&self) -> &SourceSpan;

    /// The tokens of `tokens` that lie inside this node's span.
    fn tokens<'t>(&self, tokens: &'t [Token]) -> Vec<&'t Token> {
        let span = self.span();
        tokens.iter().filter(|t| span.contains(&t.span)).collect()
    }
}

/// Operator binding strength, loosest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Precedence {
    /// `a, b`
    Compound,
    Assignment,
    Ternary,
    LogicalOr,
    LogicalAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseAnd,
    Equality,
    Comparison,
    BitShift,
    AdditiveSubtractive,
    Multiplicative,
    Prefix,
    Postfix,
    Primary,
}

impl Precedence {
    /// The next tighter level.
    pub fn next(self) -> Precedence {
        use Precedence::*;
        match self {
            Compound => Assignment,
            Assignment => Ternary,
            Ternary => LogicalOr,
            LogicalOr => LogicalAnd,
            LogicalAnd => BitwiseOr,
            BitwiseOr => BitwiseXor,
            BitwiseXor => BitwiseAnd,
            BitwiseAnd => Equality,
            Equality => Comparison,
            Comparison => BitShift,
            BitShift => AdditiveSubtractive,
            AdditiveSubtractive => Multiplicative,
            Multiplicative => Prefix,
            Prefix => Postfix,
            Postfix | Primary => Primary,
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Comma,
    LogicalOr,
    LogicalAnd,
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn precedence(self) -> Precedence {
        use BinaryOp::*;
        match self {
            Comma => Precedence::Compound,
            LogicalOr => Precedence::LogicalOr,
            LogicalAnd => Precedence::LogicalAnd,
            BitOr => Precedence::BitwiseOr,
            BitXor => Precedence::BitwiseXor,
            BitAnd => Precedence::BitwiseAnd,
            Eq | NotEq => Precedence::Equality,
            Lt | Le | Gt | Ge => Precedence::Comparison,
            Shl | Shr => Precedence::BitShift,
            Add | Sub => Precedence::AdditiveSubtractive,
            Mul | Div | Mod => Precedence::Multiplicative,
        }
    }

    pub fn as_str(self) -> &'static str {
        use BinaryOp::*;
        match self {
            Comma => ",",
            LogicalOr => "||",
            LogicalAnd => "&&",
            BitOr => "|",
            BitXor => "^",
            BitAnd => "&",
            Eq => "==",
            NotEq => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            Shl => "<<",
            Shr => ">>",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `=` and the compound assignment operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignmentOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl AssignmentOp {
    pub fn as_str(self) -> &'static str {
        use AssignmentOp::*;
        match self {
            Assign => "=",
            Add => "+=",
            Sub => "-=",
            Mul => "*=",
            Div => "/=",
            Mod => "%=",
            BitAnd => "&=",
            BitOr => "|=",
            BitXor => "^=",
            Shl => "<<=",
            Shr => ">>=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefixOp {
    Plus,      // +x
    Minus,     // -x
    Not,       // !x
    BitNot,    // ~x
    Increment, // ++x
    Decrement, // --x
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostfixOp {
    Increment, // x++
    Decrement, // x--
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    Int,
    Float,
    Char,
    String,
    Bool,
}

/// A possibly `::`-qualified name such as `Lighting::Evaluate`.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedName {
    pub segments: Vec<String>,
    pub span: SourceSpan,
}

impl QualifiedName {
    /// The last segment.
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("::"))
    }
}

/// Type reference
#[derive(Debug, Clone, PartialEq)]
pub enum TypeNode {
    Void(SourceSpan),
    /// `float`, `half3`, `int4x4`, ...
    Numeric { ty: NumericType, span: SourceSpan },
    /// Builtin object types, e.g. `Texture2D<float4>`, `vector<float, 3>`.
    Predefined {
        keyword: Keyword,
        args: Vec<TemplateArg>,
        span: SourceSpan,
    },
    /// A user type (struct, class, interface or typedef).
    Named(QualifiedName),
    Error(SourceSpan),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateArg {
    Type(TypeNode),
    Expr(Expr),
}

/// HLSL attribute like `[numthreads(8, 8, 1)]` or `[unroll]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub args: Vec<Expr>,
    pub span: SourceSpan,
}

/// Expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal as written (`0x1F`, `1.5h`, `'a'`, `"text"`, `true`).
    Literal {
        kind: LiteralKind,
        value: String,
        span: SourceSpan,
    },
    Identifier(QualifiedName),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: SourceSpan,
    },
    Assignment {
        op: AssignmentOp,
        target: Box<Expr>,
        value: Box<Expr>,
        span: SourceSpan,
    },
    Ternary {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        span: SourceSpan,
    },
    Prefix {
        op: PrefixOp,
        operand: Box<Expr>,
        span: SourceSpan,
    },
    Postfix {
        op: PostfixOp,
        operand: Box<Expr>,
        span: SourceSpan,
    },
    /// `(type[N])operand`; array bounds are kept unevaluated.
    Cast {
        target: TypeNode,
        array_ranks: Vec<Expr>,
        operand: Box<Expr>,
        span: SourceSpan,
    },
    /// Parenthesized expression
    Grouping { inner: Box<Expr>, span: SourceSpan },
    Call {
        callee: QualifiedName,
        args: Vec<Expr>,
        span: SourceSpan,
    },
    /// `object.method(args)`, e.g. `tex.Sample(s, uv)`.
    MethodCall {
        object: Box<Expr>,
        method: String,
        args: Vec<Expr>,
        span: SourceSpan,
    },
    /// `float3(x, y, z)`
    NumericConstructor {
        ty: NumericType,
        args: Vec<Expr>,
        span: SourceSpan,
    },
    FieldAccess {
        object: Box<Expr>,
        field: String,
        span: SourceSpan,
    },
    ElementAccess {
        object: Box<Expr>,
        index: Box<Expr>,
        span: SourceSpan,
    },
    /// `{ a, b, c }`
    ArrayInitializer { elements: Vec<Expr>, span: SourceSpan },
    /// Placeholder left where a syntax error was recovered from.
    Error(SourceSpan),
}

impl Expr {
    /// How tightly this expression binds, for re-emitting text.
    pub fn precedence(&self) -> Precedence {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Assignment { .. } => Precedence::Assignment,
            Expr::Ternary { .. } => Precedence::Ternary,
            Expr::Prefix { .. } | Expr::Cast { .. } => Precedence::Prefix,
            Expr::Postfix { .. }
            | Expr::Call { .. }
            | Expr::MethodCall { .. }
            | Expr::FieldAccess { .. }
            | Expr::ElementAccess { .. } => Precedence::Postfix,
            Expr::Literal { .. }
            | Expr::Identifier(_)
            | Expr::Grouping { .. }
            | Expr::NumericConstructor { .. }
            | Expr::ArrayInitializer { .. }
            | Expr::Error(_) => Precedence::Primary,
        }
    }
}

/// `: SV_Target`, `: register(t0)`, `: packoffset(c0.x)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableQualifier {
    Semantic(String),
    Register(String),
    PackOffset(String),
}

/// One name in a declaration, with its array ranks, qualifiers and
/// initializer.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclarator {
    pub name: String,
    /// `None` for an unsized rank (`a[]`).
    pub array_ranks: Vec<Option<Expr>>,
    pub qualifiers: Vec<VariableQualifier>,
    pub initializer: Option<Expr>,
    pub span: SourceSpan,
}

/// `static const float a = 1, b[2];`
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub modifiers: Vec<Keyword>,
    pub ty: TypeNode,
    pub declarators: Vec<VariableDeclarator>,
    pub span: SourceSpan,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub modifiers: Vec<Keyword>,
    pub ty: TypeNode,
    pub declarator: VariableDeclarator,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub attributes: Vec<Attribute>,
    pub modifiers: Vec<Keyword>,
    pub return_type: TypeNode,
    pub name: QualifiedName,
    pub params: Vec<Param>,
    /// Return value semantic, e.g. `SV_Target`.
    pub semantic: Option<String>,
    /// `None` for a prototype.
    pub body: Option<Block>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructKind {
    Struct,
    Class,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub kind: StructKind,
    pub name: Option<String>,
    pub bases: Vec<QualifiedName>,
    pub fields: Vec<VariableDecl>,
    pub methods: Vec<FunctionDecl>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub name: String,
    pub methods: Vec<FunctionDecl>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedefDecl {
    pub modifiers: Vec<Keyword>,
    pub ty: TypeNode,
    pub declarators: Vec<VariableDeclarator>,
    pub span: SourceSpan,
}

/// `cbuffer`/`tbuffer` block
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantBufferDecl {
    pub keyword: Keyword,
    pub name: String,
    pub register: Option<String>,
    pub fields: Vec<VariableDecl>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceDecl {
    pub name: String,
    pub declarations: Vec<Decl>,
    pub span: SourceSpan,
}

/// Declarations
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Function(FunctionDecl),
    Variable(VariableDecl),
    Struct(StructDecl),
    Interface(InterfaceDecl),
    Typedef(TypedefDecl),
    ConstantBuffer(ConstantBufferDecl),
    Namespace(NamespaceDecl),
    /// A stray `;`
    Empty(SourceSpan),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwitchLabel {
    Case(Expr),
    Default(SourceSpan),
}

/// Labels and the statements that follow them in a `switch`.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchClause {
    pub labels: Vec<SwitchLabel>,
    pub statements: Vec<Stmt>,
    pub span: SourceSpan,
}

/// Statements
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Block(Block),
    Variable(VariableDecl),
    /// A type declaration inside a function body.
    Declaration(Box<Decl>),
    Expression {
        expr: Expr,
        span: SourceSpan,
    },
    Return {
        value: Option<Expr>,
        span: SourceSpan,
    },
    Break(SourceSpan),
    Continue(SourceSpan),
    Discard(SourceSpan),
    Empty(SourceSpan),
    If {
        attributes: Vec<Attribute>,
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        span: SourceSpan,
    },
    While {
        attributes: Vec<Attribute>,
        condition: Expr,
        body: Box<Stmt>,
        span: SourceSpan,
    },
    DoWhile {
        attributes: Vec<Attribute>,
        body: Box<Stmt>,
        condition: Expr,
        span: SourceSpan,
    },
    For {
        attributes: Vec<Attribute>,
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        increment: Option<Expr>,
        body: Box<Stmt>,
        span: SourceSpan,
    },
    Switch {
        attributes: Vec<Attribute>,
        selector: Expr,
        clauses: Vec<SwitchClause>,
        span: SourceSpan,
    },
}

/// A parsed file
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationUnit {
    pub declarations: Vec<Decl>,
    pub span: SourceSpan,
}

impl Spanned for Expr {
    fn span(&self) -> &SourceSpan {
        match self {
            Expr::Identifier(name) => &name.span,
            Expr::Error(span) => span,
            Expr::Literal { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Assignment { span, .. }
            | Expr::Ternary { span, .. }
            | Expr::Prefix { span, .. }
            | Expr::Postfix { span, .. }
            | Expr::Cast { span, .. }
            | Expr::Grouping { span, .. }
            | Expr::Call { span, .. }
            | Expr::MethodCall { span, .. }
            | Expr::NumericConstructor { span, .. }
            | Expr::FieldAccess { span, .. }
            | Expr::ElementAccess { span, .. }
            | Expr::ArrayInitializer { span, .. } => span,
        }
    }
}

impl Spanned for TypeNode {
    fn span(&self) -> &SourceSpan {
        match self {
            TypeNode::Void(span) | TypeNode::Error(span) => span,
            TypeNode::Numeric { span, .. } | TypeNode::Predefined { span, .. } => span,
            TypeNode::Named(name) => &name.span,
        }
    }
}

impl Spanned for Stmt {
    fn span(&self) -> &SourceSpan {
        match self {
            Stmt::Block(block) => &block.span,
            Stmt::Variable(decl) => &decl.span,
            Stmt::Declaration(decl) => decl.span(),
            Stmt::Break(span) | Stmt::Continue(span) | Stmt::Discard(span) | Stmt::Empty(span) => {
                span
            }
            Stmt::Expression { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::DoWhile { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Switch { span, .. } => span,
        }
    }
}

impl Spanned for Decl {
    fn span(&self) -> &SourceSpan {
        match self {
            Decl::Function(decl) => &decl.span,
            Decl::Variable(decl) => &decl.span,
            Decl::Struct(decl) => &decl.span,
            Decl::Interface(decl) => &decl.span,
            Decl::Typedef(decl) => &decl.span,
            Decl::ConstantBuffer(decl) => &decl.span,
            Decl::Namespace(decl) => &decl.span,
            Decl::Empty(span) => span,
        }
    }
}

macro_rules! spanned_struct {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Spanned for $ty {
                fn span(&self) -> &SourceSpan {
                    &self.span
                }
            }
        )*
    };
}

spanned_struct!(
    QualifiedName,
    Attribute,
    VariableDeclarator,
    VariableDecl,
    Param,
    FunctionDecl,
    StructDecl,
    InterfaceDecl,
    TypedefDecl,
    ConstantBufferDecl,
    NamespaceDecl,
    Block,
    SwitchClause,
    TranslationUnit,
);
