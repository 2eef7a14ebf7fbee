//! Token types produced by the lexer
//!
//! A [`Token`] is a kind, an optional lexeme and a span. Lexemes are only
//! stored where the kind alone does not determine the text: identifiers and
//! literals. Keywords, numeric type names and punctuation are spelled by
//! [`Token::text`].

use std::borrow::Cow;
use std::fmt;

use crate::diagnostics::{Location, SourceSpan};

macro_rules! word_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $text:literal,)* }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            /// Exact-match lookup of a reserved word.
            pub fn lookup(word: &str) -> Option<Self> {
                match word {
                    $($text => Some($name::$variant),)*
                    _ => None,
                }
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

word_enum! {
    /// Reserved words other than the numeric type names.
    pub enum Keyword {
        // Control flow
        Break => "break",
        Case => "case",
        Continue => "continue",
        Default => "default",
        Discard => "discard",
        Do => "do",
        Else => "else",
        For => "for",
        If => "if",
        Return => "return",
        Switch => "switch",
        While => "while",

        // Declarations
        Struct => "struct",
        Class => "class",
        Interface => "interface",
        Typedef => "typedef",
        Namespace => "namespace",
        Cbuffer => "cbuffer",
        Tbuffer => "tbuffer",
        Void => "void",
        True => "true",
        False => "false",
        Register => "register",
        Packoffset => "packoffset",

        // Modifiers
        Const => "const",
        Static => "static",
        Uniform => "uniform",
        Extern => "extern",
        Volatile => "volatile",
        Shared => "shared",
        Groupshared => "groupshared",
        Inline => "inline",
        Export => "export",
        Precise => "precise",
        In => "in",
        Out => "out",
        Inout => "inout",
        Nointerpolation => "nointerpolation",
        Linear => "linear",
        Centroid => "centroid",
        Noperspective => "noperspective",
        Sample => "sample",
        RowMajor => "row_major",
        ColumnMajor => "column_major",
        Unorm => "unorm",
        Snorm => "snorm",
        Globallycoherent => "globallycoherent",
        Point => "point",
        Line => "line",
        Triangle => "triangle",
        LineAdj => "lineadj",
        TriangleAdj => "triangleadj",

        // Predefined object types
        Vector => "vector",
        Matrix => "matrix",
        String => "string",
        Sampler => "sampler",
        Sampler1D => "sampler1D",
        Sampler2D => "sampler2D",
        Sampler3D => "sampler3D",
        SamplerCube => "samplerCUBE",
        SamplerState => "SamplerState",
        SamplerComparisonState => "SamplerComparisonState",
        Texture => "texture",
        Texture1D => "Texture1D",
        Texture1DArray => "Texture1DArray",
        Texture2D => "Texture2D",
        Texture2DArray => "Texture2DArray",
        Texture2DMS => "Texture2DMS",
        Texture2DMSArray => "Texture2DMSArray",
        Texture3D => "Texture3D",
        TextureCube => "TextureCube",
        TextureCubeArray => "TextureCubeArray",
        Buffer => "Buffer",
        ByteAddressBuffer => "ByteAddressBuffer",
        StructuredBuffer => "StructuredBuffer",
        AppendStructuredBuffer => "AppendStructuredBuffer",
        ConsumeStructuredBuffer => "ConsumeStructuredBuffer",
        RWBuffer => "RWBuffer",
        RWByteAddressBuffer => "RWByteAddressBuffer",
        RWStructuredBuffer => "RWStructuredBuffer",
        RWTexture1D => "RWTexture1D",
        RWTexture1DArray => "RWTexture1DArray",
        RWTexture2D => "RWTexture2D",
        RWTexture2DArray => "RWTexture2DArray",
        RWTexture3D => "RWTexture3D",
        InputPatch => "InputPatch",
        OutputPatch => "OutputPatch",
        PointStream => "PointStream",
        LineStream => "LineStream",
        TriangleStream => "TriangleStream",
    }
}

impl Keyword {
    /// Storage, interpolation and parameter modifiers.
    pub fn is_modifier(&self) -> bool {
        use Keyword::*;
        matches!(
            self,
            Const
                | Static
                | Uniform
                | Extern
                | Volatile
                | Shared
                | Groupshared
                | Inline
                | Export
                | Precise
                | In
                | Out
                | Inout
                | Nointerpolation
                | Linear
                | Centroid
                | Noperspective
                | Sample
                | RowMajor
                | ColumnMajor
                | Unorm
                | Snorm
                | Globallycoherent
                | Point
                | Line
                | Triangle
                | LineAdj
                | TriangleAdj
        )
    }

    /// Modifiers that are also ordinary identifiers (`float sample;`). The
    /// lexer leaves them as identifiers and the parser recognises them by
    /// position.
    pub fn is_contextual(&self) -> bool {
        use Keyword::*;
        matches!(self, Sample | Point | Line | Triangle | LineAdj | TriangleAdj)
    }

    /// Builtin non-numeric types, optionally followed by template arguments.
    pub fn is_predefined_type(&self) -> bool {
        use Keyword::*;
        matches!(
            self,
            Vector
                | Matrix
                | String
                | Sampler
                | Sampler1D
                | Sampler2D
                | Sampler3D
                | SamplerCube
                | SamplerState
                | SamplerComparisonState
                | Texture
                | Texture1D
                | Texture1DArray
                | Texture2D
                | Texture2DArray
                | Texture2DMS
                | Texture2DMSArray
                | Texture3D
                | TextureCube
                | TextureCubeArray
                | Buffer
                | ByteAddressBuffer
                | StructuredBuffer
                | AppendStructuredBuffer
                | ConsumeStructuredBuffer
                | RWBuffer
                | RWByteAddressBuffer
                | RWStructuredBuffer
                | RWTexture1D
                | RWTexture1DArray
                | RWTexture2D
                | RWTexture2DArray
                | RWTexture3D
                | InputPatch
                | OutputPatch
                | PointStream
                | LineStream
                | TriangleStream
        )
    }
}

word_enum! {
    /// Preprocessor directive names (the word after `#`).
    pub enum Directive {
        Define => "define",
        Include => "include",
        Line => "line",
        Undef => "undef",
        Error => "error",
        Pragma => "pragma",
        If => "if",
        Ifdef => "ifdef",
        Ifndef => "ifndef",
        Elif => "elif",
        Else => "else",
        Endif => "endif",
    }
}

word_enum! {
    /// Element type of a numeric type name.
    pub enum ScalarType {
        Bool => "bool",
        Int => "int",
        Uint => "uint",
        Dword => "dword",
        Half => "half",
        Float => "float",
        Double => "double",
        Min16Float => "min16float",
        Min10Float => "min10float",
        Min16Int => "min16int",
        Min12Int => "min12int",
        Min16Uint => "min16uint",
        Int16 => "int16_t",
        Uint16 => "uint16_t",
        Int64 => "int64_t",
        Uint64 => "uint64_t",
        Float16 => "float16_t",
        Float32 => "float32_t",
        Float64 => "float64_t",
    }
}

impl ScalarType {
    const ALL: [ScalarType; 19] = [
        ScalarType::Bool,
        ScalarType::Int,
        ScalarType::Uint,
        ScalarType::Dword,
        ScalarType::Half,
        ScalarType::Float,
        ScalarType::Double,
        ScalarType::Min16Float,
        ScalarType::Min10Float,
        ScalarType::Min16Int,
        ScalarType::Min12Int,
        ScalarType::Min16Uint,
        ScalarType::Int16,
        ScalarType::Uint16,
        ScalarType::Int64,
        ScalarType::Uint64,
        ScalarType::Float16,
        ScalarType::Float32,
        ScalarType::Float64,
    ];
}

/// Scalar, vector or matrix shape of a numeric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Scalar,
    Vector(u8),
    Matrix(u8, u8),
}

/// A builtin numeric type such as `float`, `half3` or `int4x4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NumericType {
    pub scalar: ScalarType,
    pub shape: Shape,
}

impl NumericType {
    pub fn new(scalar: ScalarType, shape: Shape) -> Self {
        Self { scalar, shape }
    }

    /// Recognise a numeric type name: a scalar name optionally followed by
    /// `N` or `NxM` with dimensions between 1 and 4.
    pub fn parse(word: &str) -> Option<Self> {
        // `dword` only exists as a scalar.
        for scalar in ScalarType::ALL {
            let Some(rest) = word.strip_prefix(scalar.as_str()) else {
                continue;
            };
            let shape = match rest.as_bytes() {
                [] => Shape::Scalar,
                [n] if scalar != ScalarType::Dword => Shape::Vector(dimension(*n)?),
                [r, b'x', c] if scalar != ScalarType::Dword => {
                    Shape::Matrix(dimension(*r)?, dimension(*c)?)
                }
                _ => continue,
            };
            return Some(NumericType::new(scalar, shape));
        }
        None
    }
}

fn dimension(byte: u8) -> Option<u8> {
    match byte {
        b'1'..=b'4' => Some(byte - b'0'),
        _ => None,
    }
}

impl fmt::Display for NumericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shape {
            Shape::Scalar => write!(f, "{}", self.scalar),
            Shape::Vector(n) => write!(f, "{}{}", self.scalar, n),
            Shape::Matrix(r, c) => write!(f, "{}{}x{}", self.scalar, r, c),
        }
    }
}

/// Token categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    IntLiteral,
    FloatLiteral,
    CharLiteral,
    StringLiteral,
    /// `<path>` on an `#include` line
    BracketedStringLiteral,

    Identifier,
    Keyword(Keyword),
    Numeric(NumericType),

    // Preprocessor
    Directive(Directive),
    EndDirective,
    /// `(` directly after the macro name of a `#define`
    OpenFunctionLikeMacroParen,
    Hash,
    HashHash,

    // Arithmetic
    Plus,    // +
    Minus,   // -
    Star,    // *
    Slash,   // /
    Percent, // %

    // Comparison
    EqEq,  // ==
    NotEq, // !=
    Lt,    // <
    Le,    // <=
    Gt,    // >
    Ge,    // >=

    // Logical
    AndAnd, // &&
    OrOr,   // ||
    Bang,   // !

    // Bitwise
    Amp,   // &
    Pipe,  // |
    Caret, // ^
    Tilde, // ~
    LtLt,  // <<
    GtGt,  // >>

    // Assignment
    Eq,        // =
    PlusEq,    // +=
    MinusEq,   // -=
    StarEq,    // *=
    SlashEq,   // /=
    PercentEq, // %=
    AmpEq,     // &=
    PipeEq,    // |=
    CaretEq,   // ^=
    LtLtEq,    // <<=
    GtGtEq,    // >>=

    // Increment/Decrement
    PlusPlus,   // ++
    MinusMinus, // --

    Dot,       // .
    Question,  // ?
    Colon,     // :
    ColonColon, // ::

    // Punctuation
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    LBracket,  // [
    RBracket,  // ]
    Semicolon, // ;
    Comma,     // ,

    /// Appended by the parser; never produced by the lexer.
    Eof,
}

impl TokenKind {
    /// Classify a scanned word: keyword, numeric type name, or identifier.
    pub fn classify(word: &str) -> TokenKind {
        if let Some(keyword) = Keyword::lookup(word).filter(|k| !k.is_contextual()) {
            TokenKind::Keyword(keyword)
        } else if let Some(numeric) = NumericType::parse(word) {
            TokenKind::Numeric(numeric)
        } else {
            TokenKind::Identifier
        }
    }

    /// Spelling of tokens whose text is fixed by their kind.
    pub fn fixed_text(&self) -> Option<&'static str> {
        use TokenKind::*;
        let text = match self {
            OpenFunctionLikeMacroParen | LParen => "(",
            Hash => "#",
            HashHash => "##",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            EqEq => "==",
            NotEq => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            AndAnd => "&&",
            OrOr => "||",
            Bang => "!",
            Amp => "&",
            Pipe => "|",
            Caret => "^",
            Tilde => "~",
            LtLt => "<<",
            GtGt => ">>",
            Eq => "=",
            PlusEq => "+=",
            MinusEq => "-=",
            StarEq => "*=",
            SlashEq => "/=",
            PercentEq => "%=",
            AmpEq => "&=",
            PipeEq => "|=",
            CaretEq => "^=",
            LtLtEq => "<<=",
            GtGtEq => ">>=",
            PlusPlus => "++",
            MinusMinus => "--",
            Dot => ".",
            Question => "?",
            Colon => ":",
            ColonColon => "::",
            RParen => ")",
            LBrace => "{",
            RBrace => "}",
            LBracket => "[",
            RBracket => "]",
            Semicolon => ";",
            Comma => ",",
            Keyword(keyword) => keyword.as_str(),
            _ => return None,
        };
        Some(text)
    }

    /// Identifiers, keywords and numeric type names: anything that can name a
    /// macro or be pasted.
    pub fn is_word(&self) -> bool {
        matches!(
            self,
            TokenKind::Identifier | TokenKind::Keyword(_) | TokenKind::Numeric(_)
        )
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TokenKind::IntLiteral
                | TokenKind::FloatLiteral
                | TokenKind::CharLiteral
                | TokenKind::StringLiteral
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::IntLiteral => write!(f, "integer literal"),
            TokenKind::FloatLiteral => write!(f, "float literal"),
            TokenKind::CharLiteral => write!(f, "char literal"),
            TokenKind::StringLiteral => write!(f, "string literal"),
            TokenKind::BracketedStringLiteral => write!(f, "bracketed string"),
            TokenKind::Identifier => write!(f, "identifier"),
            TokenKind::Numeric(numeric) => write!(f, "'{}'", numeric),
            TokenKind::Directive(directive) => write!(f, "'#{}'", directive),
            TokenKind::EndDirective => write!(f, "end of directive"),
            TokenKind::Eof => write!(f, "end of file"),
            other => match other.fixed_text() {
                Some(text) => write!(f, "'{}'", text),
                None => write!(f, "{:?}", other),
            },
        }
    }
}

/// A lexed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: Option<String>,
    pub span: SourceSpan,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: Option<String>, span: SourceSpan) -> Self {
        Self { kind, lexeme, span }
    }

    /// A token with no source of its own, placed at `span`.
    pub fn synthesized(kind: TokenKind, lexeme: impl Into<String>, span: SourceSpan) -> Self {
        Self::new(kind, Some(lexeme.into()), span)
    }

    /// Returns the source location where this token starts.
    pub fn location(&self) -> Location {
        self.span.start
    }

    /// The token as it is spelled in source.
    pub fn text(&self) -> Cow<'_, str> {
        let lexeme = self.lexeme.as_deref().unwrap_or("");
        match self.kind {
            TokenKind::StringLiteral => Cow::Owned(format!("\"{}\"", lexeme)),
            TokenKind::CharLiteral => Cow::Owned(format!("'{}'", lexeme)),
            TokenKind::BracketedStringLiteral => Cow::Owned(format!("<{}>", lexeme)),
            TokenKind::Numeric(numeric) => Cow::Owned(numeric.to_string()),
            TokenKind::Directive(directive) => Cow::Owned(format!("#{}", directive)),
            kind => match kind.fixed_text() {
                Some(text) => Cow::Borrowed(text),
                None => Cow::Borrowed(lexeme),
            },
        }
    }

    /// The text of an identifier, keyword or numeric type name.
    pub fn word(&self) -> Option<Cow<'_, str>> {
        if self.kind.is_word() {
            Some(self.text())
        } else {
            None
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Identifier => write!(f, "identifier '{}'", self.text()),
            TokenKind::IntLiteral | TokenKind::FloatLiteral => {
                write!(f, "{} {}", self.kind, self.text())
            }
            TokenKind::CharLiteral | TokenKind::StringLiteral => {
                write!(f, "{} {}", self.kind, self.text())
            }
            _ => write!(f, "{}", self.kind),
        }
    }
}

/// Join token texts with single spaces, as used for `#pragma`, `#error` and
/// stringized macro arguments.
pub fn join_tokens(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|token| token.text())
        .collect::<Vec<_>>()
        .join(" ")
}
