//! Declaration parsing implementation
//!
//! This module handles declarations and the pieces they are built from:
//!
//! - Functions: `[attr] modifiers type name(params) : SEMANTIC { ... }`
//! - Variables: `modifiers type name[N] : qualifiers = init, ...;`
//! - Structs and classes, interfaces, typedefs
//! - `cbuffer`/`tbuffer` blocks and namespaces
//! - Types, template arguments, attributes and modifiers
//!
//! # Grammar
//!
//! ```text
//! declaration  → ";" | attribute* ( struct | interface | typedef
//!              | cbuffer | namespace | function | variable )
//! function     → modifier* type qualified_name "(" params ")" ( ":" word )?
//!                ( block | ";" )
//! variable     → modifier* type declarator ( "," declarator )* ";"
//! declarator   → identifier ( "[" expression? "]" )* qualifier* ( "=" assignment )?
//! qualifier    → ":" ( word | "register" "(" ... ")" | "packoffset" "(" ... ")" )
//! type         → "void" | numeric_type | predefined ( "<" template_args ">" )?
//!              | "struct"? qualified_name
//! ```
//!
//! A declaration starting with a type name is ambiguous until the token
//! after the name: `(` makes it a function. That decision is made by a
//! speculative parse of the function head.

use crate::diagnostics::SourceSpan;
use crate::lexer::{Keyword, TokenKind};
use crate::parser::ast::*;
use crate::parser::parse::{PResult, Parser};

/// Everything before a function's parameter list.
pub(crate) struct FunctionHead {
    modifiers: Vec<Keyword>,
    return_type: TypeNode,
    name: QualifiedName,
}

enum StructMember {
    Field(VariableDecl),
    Method(FunctionDecl),
    Empty,
}

impl Parser {
    /// Parse a top-level (or namespace-level) declaration
    pub(crate) fn parse_top_level_declaration(&mut self) -> PResult<Decl> {
        let start = self.current_span();
        if self.match_token(TokenKind::Semicolon) {
            return Ok(Decl::Empty(start));
        }

        let attributes = self.parse_attributes()?;

        match self.peek_kind() {
            TokenKind::Keyword(Keyword::Struct | Keyword::Class) if self.is_struct_definition() => {
                Ok(Decl::Struct(self.parse_struct()?))
            }
            TokenKind::Keyword(Keyword::Interface) => Ok(Decl::Interface(self.parse_interface()?)),
            TokenKind::Keyword(Keyword::Typedef) => Ok(Decl::Typedef(self.parse_typedef()?)),
            TokenKind::Keyword(Keyword::Cbuffer | Keyword::Tbuffer) => {
                Ok(Decl::ConstantBuffer(self.parse_constant_buffer()?))
            }
            TokenKind::Keyword(Keyword::Namespace) => Ok(Decl::Namespace(self.parse_namespace()?)),
            _ => {
                if let Some(head) = self.speculate(Self::parse_function_head) {
                    let function = self.parse_function_rest(start, attributes, head)?;
                    return Ok(Decl::Function(function));
                }
                Ok(Decl::Variable(self.parse_variable_declaration()?))
            }
        }
    }

    /// `struct Name {`, `struct Name : Base {` or `struct {`, as opposed to
    /// `struct Name` used as a type.
    pub(crate) fn is_struct_definition(&self) -> bool {
        match self.peek_ahead(1).kind {
            TokenKind::LBrace => true,
            TokenKind::Identifier => matches!(
                self.peek_ahead(2).kind,
                TokenKind::LBrace | TokenKind::Colon
            ),
            _ => false,
        }
    }

    // ===== Functions =====

    /// Trial parse up to the `(` of a function declaration.
    pub(crate) fn parse_function_head(&mut self) -> PResult<FunctionHead> {
        let modifiers = self.parse_modifiers();
        let return_type = self.parse_type()?;

        if !matches!(
            self.peek_kind(),
            TokenKind::Identifier | TokenKind::ColonColon
        ) {
            return self.reject("a function name");
        }
        let name = self.parse_qualified_name()?;

        if !self.check(TokenKind::LParen) {
            return self.reject("a function");
        }

        Ok(FunctionHead {
            modifiers,
            return_type,
            name,
        })
    }

    pub(crate) fn parse_function_rest(
        &mut self,
        start: SourceSpan,
        attributes: Vec<Attribute>,
        head: FunctionHead,
    ) -> PResult<FunctionDecl> {
        self.expect_token(TokenKind::LParen, "after function name")?;
        let params = self.parse_params()?;

        let semantic = if self.match_token(TokenKind::Colon) {
            self.parse_semantic()?
        } else {
            None
        };

        let body = if self.match_token(TokenKind::Semicolon) {
            None
        } else if self.check(TokenKind::LBrace) {
            Some(self.parse_block()?)
        } else {
            self.error_expected("'{' or ';' after function signature")?;
            None
        };

        Ok(FunctionDecl {
            attributes,
            modifiers: head.modifiers,
            return_type: head.return_type,
            name: head.name,
            params,
            semantic,
            body,
            span: self.span_from(&start),
        })
    }

    /// Parameters up to and including `)`; `(void)` is an empty list.
    fn parse_params(&mut self) -> PResult<Vec<Param>> {
        let mut params = Vec::new();

        if self.check_keyword(Keyword::Void) && self.peek_ahead(1).is(TokenKind::RParen) {
            self.advance();
        }

        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.parse_param()?);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect_token(TokenKind::RParen, "after parameters")?;
        Ok(params)
    }

    fn parse_param(&mut self) -> PResult<Param> {
        let start = self.current_span();
        let modifiers = self.parse_modifiers();
        let ty = self.parse_type()?;
        let declarator = self.parse_declarator("in parameter list")?;

        Ok(Param {
            modifiers,
            ty,
            declarator,
            span: self.span_from(&start),
        })
    }

    fn parse_semantic(&mut self) -> PResult<Option<String>> {
        let word = self.peek().word().map(|word| word.into_owned());
        match word {
            Some(word) => {
                self.advance();
                Ok(Some(word))
            }
            None => {
                self.error_expected("semantic after ':'")?;
                Ok(None)
            }
        }
    }

    // ===== Variables =====

    pub(crate) fn parse_variable_declaration(&mut self) -> PResult<VariableDecl> {
        let start = self.current_span();
        let modifiers = self.parse_modifiers();
        let ty = self.parse_type()?;
        self.parse_variable_rest(start, modifiers, ty)
    }

    /// Trial parse of modifiers and a type that must be followed by a name.
    pub(crate) fn parse_declaration_head(&mut self) -> PResult<(Vec<Keyword>, TypeNode)> {
        let modifiers = self.parse_modifiers();
        let ty = self.parse_type()?;
        if !self.check(TokenKind::Identifier) {
            return self.reject("a declaration");
        }
        Ok((modifiers, ty))
    }

    /// Declarators and the closing `;` of a variable declaration whose type
    /// has been parsed.
    pub(crate) fn parse_variable_rest(
        &mut self,
        start: SourceSpan,
        modifiers: Vec<Keyword>,
        ty: TypeNode,
    ) -> PResult<VariableDecl> {
        let mut declarators = vec![self.parse_declarator("in declaration")?];
        while self.match_token(TokenKind::Comma) {
            declarators.push(self.parse_declarator("in declaration")?);
        }
        self.expect_semicolon("after declaration")?;

        Ok(VariableDecl {
            modifiers,
            ty,
            declarators,
            span: self.span_from(&start),
        })
    }

    pub(crate) fn parse_declarator(&mut self, ctx: &str) -> PResult<VariableDeclarator> {
        let start = self.current_span();
        let name = self.expect_identifier(ctx)?;
        let array_ranks = self.parse_array_ranks()?;
        let qualifiers = self.parse_qualifiers()?;
        let initializer = if self.match_token(TokenKind::Eq) {
            Some(self.parse_assignment()?)
        } else {
            None
        };

        Ok(VariableDeclarator {
            name,
            array_ranks,
            qualifiers,
            initializer,
            span: self.span_from(&start),
        })
    }

    fn parse_array_ranks(&mut self) -> PResult<Vec<Option<Expr>>> {
        let mut ranks = Vec::new();

        while self.match_token(TokenKind::LBracket) {
            if self.match_token(TokenKind::RBracket) {
                ranks.push(None);
                continue;
            }
            let bound = self.parse_expression()?;
            self.expect_token(TokenKind::RBracket, "after array size")?;
            ranks.push(Some(bound));
        }

        Ok(ranks)
    }

    fn parse_qualifiers(&mut self) -> PResult<Vec<VariableQualifier>> {
        let mut qualifiers = Vec::new();

        while self.match_token(TokenKind::Colon) {
            let qualifier = match self.peek_kind() {
                TokenKind::Keyword(Keyword::Register) => {
                    self.advance();
                    VariableQualifier::Register(self.parse_qualifier_arguments("register")?)
                }
                TokenKind::Keyword(Keyword::Packoffset) => {
                    self.advance();
                    VariableQualifier::PackOffset(self.parse_qualifier_arguments("packoffset")?)
                }
                _ => match self.parse_semantic()? {
                    Some(semantic) => VariableQualifier::Semantic(semantic),
                    None => break,
                },
            };
            qualifiers.push(qualifier);
        }

        Ok(qualifiers)
    }

    /// The text between the parentheses of `register(...)` or
    /// `packoffset(...)`, e.g. `t0, space1` or `c0.x`.
    fn parse_qualifier_arguments(&mut self, what: &str) -> PResult<String> {
        let mut text = String::new();
        if !self.expect_token(TokenKind::LParen, &format!("after '{}'", what))? {
            return Ok(text);
        }

        while !self.check(TokenKind::RParen)
            && !self.check(TokenKind::Semicolon)
            && !self.is_at_end()
        {
            let token = self.advance();
            text.push_str(&token.text());
            if token.is(TokenKind::Comma) {
                text.push(' ');
            }
        }

        self.expect_token(TokenKind::RParen, &format!("after '{}' arguments", what))?;
        Ok(text)
    }

    // ===== Types =====

    pub(crate) fn parse_type(&mut self) -> PResult<TypeNode> {
        let start = self.current_span();

        match self.peek_kind() {
            TokenKind::Keyword(Keyword::Void) => {
                self.advance();
                Ok(TypeNode::Void(start))
            }
            TokenKind::Numeric(ty) => {
                self.advance();
                Ok(TypeNode::Numeric { ty, span: start })
            }
            TokenKind::Keyword(keyword) if keyword.is_predefined_type() => {
                self.advance();
                let args = if self.match_token(TokenKind::Lt) {
                    self.parse_template_args()?
                } else {
                    Vec::new()
                };
                Ok(TypeNode::Predefined {
                    keyword,
                    args,
                    span: self.span_from(&start),
                })
            }
            // Elaborated `struct Name`
            TokenKind::Keyword(Keyword::Struct | Keyword::Class) => {
                self.advance();
                Ok(TypeNode::Named(self.parse_qualified_name()?))
            }
            TokenKind::Identifier | TokenKind::ColonColon => {
                Ok(TypeNode::Named(self.parse_qualified_name()?))
            }
            _ => {
                self.error_expected("type")?;
                Ok(TypeNode::Error(start))
            }
        }
    }

    /// Template arguments after `<`, through the closing `>`.
    fn parse_template_args(&mut self) -> PResult<Vec<TemplateArg>> {
        let mut args = Vec::new();

        loop {
            self.split_shift_right();
            if self.check(TokenKind::Gt) {
                break;
            }

            let is_type = match self.peek_kind() {
                TokenKind::Numeric(_) | TokenKind::Identifier | TokenKind::ColonColon => true,
                TokenKind::Keyword(keyword) => {
                    keyword.is_predefined_type()
                        || matches!(keyword, Keyword::Void | Keyword::Struct | Keyword::Class)
                }
                _ => false,
            };
            let arg = if is_type {
                TemplateArg::Type(self.parse_type()?)
            } else {
                // Parsed above the comparison level so `>` closes the list
                TemplateArg::Expr(self.parse_precedence(Precedence::AdditiveSubtractive)?)
            };
            args.push(arg);

            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        self.split_shift_right();
        self.expect_token(TokenKind::Gt, "after template arguments")?;
        Ok(args)
    }

    /// Storage, interpolation and parameter modifiers, in source order.
    pub(crate) fn parse_modifiers(&mut self) -> Vec<Keyword> {
        let mut modifiers = Vec::new();

        loop {
            let modifier = match self.peek_kind() {
                TokenKind::Keyword(keyword) if keyword.is_modifier() => Some(keyword),
                TokenKind::Identifier => self.contextual_modifier(),
                _ => None,
            };
            let Some(modifier) = modifier else {
                break;
            };
            self.advance();
            modifiers.push(modifier);
        }

        modifiers
    }

    /// `sample`, `triangle` and the like count as modifiers only when a type
    /// follows them.
    fn contextual_modifier(&self) -> Option<Keyword> {
        let keyword = Keyword::lookup(self.peek().lexeme.as_deref()?)?;
        if !keyword.is_contextual() {
            return None;
        }
        let type_follows = match self.peek_ahead(1).kind {
            TokenKind::Identifier | TokenKind::Numeric(_) => true,
            TokenKind::Keyword(next) => {
                next.is_modifier() || next.is_predefined_type() || next == Keyword::Void
            }
            _ => false,
        };
        type_follows.then_some(keyword)
    }

    /// Zero or more `[name]` / `[name(args)]` attributes.
    pub(crate) fn parse_attributes(&mut self) -> PResult<Vec<Attribute>> {
        let mut attributes = Vec::new();

        while self.check(TokenKind::LBracket) {
            let start = self.current_span();
            self.advance();

            let word = self.peek().word().map(|word| word.into_owned());
            let name = match word {
                Some(word) => {
                    self.advance();
                    word
                }
                None => {
                    self.error_expected("attribute name")?;
                    String::new()
                }
            };

            let args = if self.match_token(TokenKind::LParen) {
                self.parse_arguments("in attribute")?
            } else {
                Vec::new()
            };
            self.expect_token(TokenKind::RBracket, "after attribute")?;

            attributes.push(Attribute {
                name,
                args,
                span: self.span_from(&start),
            });
        }

        Ok(attributes)
    }

    // ===== Type declarations =====

    /// Parse struct or class definition: struct Name : Base { members };
    fn parse_struct(&mut self) -> PResult<StructDecl> {
        let start = self.current_span();
        let kind = if self.advance().is(TokenKind::Keyword(Keyword::Class)) {
            StructKind::Class
        } else {
            StructKind::Struct
        };

        let name = if self.check(TokenKind::Identifier) {
            Some(self.advance().text().into_owned())
        } else {
            None
        };

        let mut bases = Vec::new();
        if self.match_token(TokenKind::Colon) {
            loop {
                bases.push(self.parse_qualified_name()?);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect_token(TokenKind::LBrace, "after struct name")?;
        let members = self.parse_until_brace(Self::parse_struct_member)?;
        self.expect_token(TokenKind::RBrace, "after struct body")?;
        self.expect_semicolon("after struct definition")?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        for member in members {
            match member {
                StructMember::Field(field) => fields.push(field),
                StructMember::Method(method) => methods.push(method),
                StructMember::Empty => {}
            }
        }

        Ok(StructDecl {
            kind,
            name,
            bases,
            fields,
            methods,
            span: self.span_from(&start),
        })
    }

    fn parse_struct_member(&mut self) -> PResult<StructMember> {
        let start = self.current_span();
        if self.match_token(TokenKind::Semicolon) {
            return Ok(StructMember::Empty);
        }

        let attributes = self.parse_attributes()?;
        if let Some(head) = self.speculate(Self::parse_function_head) {
            let method = self.parse_function_rest(start, attributes, head)?;
            return Ok(StructMember::Method(method));
        }
        Ok(StructMember::Field(self.parse_variable_declaration()?))
    }

    /// interface Name { prototypes };
    fn parse_interface(&mut self) -> PResult<InterfaceDecl> {
        let start = self.current_span();
        self.advance();
        let name = self.expect_identifier("after 'interface'")?;

        self.expect_token(TokenKind::LBrace, "after interface name")?;
        let methods = self.parse_until_brace(|p| {
            let start = p.current_span();
            match p.speculate(Self::parse_function_head) {
                Some(head) => Ok(Some(p.parse_function_rest(start, Vec::new(), head)?)),
                None => {
                    p.error_expected("method declaration in interface")?;
                    Ok(None)
                }
            }
        })?;
        self.expect_token(TokenKind::RBrace, "after interface body")?;
        self.expect_semicolon("after interface definition")?;

        Ok(InterfaceDecl {
            name,
            methods: methods.into_iter().flatten().collect(),
            span: self.span_from(&start),
        })
    }

    /// typedef modifiers type Name[N], ...;
    fn parse_typedef(&mut self) -> PResult<TypedefDecl> {
        let start = self.current_span();
        self.advance();

        let modifiers = self.parse_modifiers();
        let ty = self.parse_type()?;
        let mut declarators = vec![self.parse_declarator("in typedef")?];
        while self.match_token(TokenKind::Comma) {
            declarators.push(self.parse_declarator("in typedef")?);
        }
        self.expect_semicolon("after typedef")?;

        Ok(TypedefDecl {
            modifiers,
            ty,
            declarators,
            span: self.span_from(&start),
        })
    }

    /// cbuffer Name : register(b0) { fields }
    fn parse_constant_buffer(&mut self) -> PResult<ConstantBufferDecl> {
        let start = self.current_span();
        let keyword = match self.advance().kind {
            TokenKind::Keyword(Keyword::Tbuffer) => Keyword::Tbuffer,
            _ => Keyword::Cbuffer,
        };
        let name = self.expect_identifier(&format!("after '{}'", keyword))?;

        let mut register = None;
        if self.match_token(TokenKind::Colon) {
            if self.match_keyword(Keyword::Register) {
                register = Some(self.parse_qualifier_arguments("register")?);
            } else {
                self.error_expected("'register'")?;
            }
        }

        self.expect_token(TokenKind::LBrace, &format!("after {} name", keyword))?;
        let fields = self.parse_until_brace(|p| {
            if p.match_token(TokenKind::Semicolon) {
                return Ok(None);
            }
            Ok(Some(p.parse_variable_declaration()?))
        })?;
        self.expect_token(TokenKind::RBrace, &format!("after {} body", keyword))?;
        self.match_token(TokenKind::Semicolon);

        Ok(ConstantBufferDecl {
            keyword,
            name,
            register,
            fields: fields.into_iter().flatten().collect(),
            span: self.span_from(&start),
        })
    }

    /// namespace Name { declarations }
    fn parse_namespace(&mut self) -> PResult<NamespaceDecl> {
        let start = self.current_span();
        self.advance();
        let name = self.expect_identifier("after 'namespace'")?;

        self.expect_token(TokenKind::LBrace, "after namespace name")?;
        let declarations = self.parse_until_brace(Self::parse_top_level_declaration)?;
        self.expect_token(TokenKind::RBrace, "after namespace body")?;

        Ok(NamespaceDecl {
            name,
            declarations,
            span: self.span_from(&start),
        })
    }
}
