//! Parser that consumes the lexer and builds a `SchemaFile` AST.
//!
//! Errors never abort the parse. A broken field resynchronises at the next
//! `,` or `}`, a broken declaration at the next top-level `type`, so one run
//! reports every problem in the file.

use std::path::Path;

use super::ast::*;
use super::lexer::{Lexed, Lexer, Token};
use crate::error::SyntaxError;
use crate::model::Span;

/// Parse one schema file. `path` is only used for spans and should be
/// relative to the project root.
pub fn parse(path: &Path, source: &str) -> Result<SchemaFile, Vec<SyntaxError>> {
    let mut p = Parser::new(path, source);
    let decls = p.parse_file();

    if !p.errors.is_empty() {
        let mut errors = p.errors;
        errors.sort_by_key(|e| (e.span.line, e.span.column));
        return Err(errors);
    }

    Ok(SchemaFile {
        path: path.to_path_buf(),
        source: source.to_string(),
        namespace: p.namespace.unwrap_or_default(),
        decls,
    })
}

struct Parser<'a> {
    path: &'a Path,
    tokens: Vec<Lexed>,
    pos: usize,
    namespace: Option<String>,
    errors: Vec<SyntaxError>,
}

impl<'a> Parser<'a> {
    fn new(path: &'a Path, src: &str) -> Self {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        for res in Lexer::new(src) {
            match res {
                Ok(lexed) => tokens.push(lexed),
                Err(e) => errors.push(SyntaxError {
                    span: Span::new(path, e.line, e.column),
                    message: e.message,
                }),
            }
        }
        Self {
            path,
            tokens,
            pos: 0,
            namespace: None,
            errors,
        }
    }

    // ── token cursor ─────────────────────────────────────────────────

    fn current(&self) -> &Lexed {
        // the lexer always ends the stream with `Eof`, which is never consumed
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.current().token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    fn advance(&mut self) -> Lexed {
        let lexed = self.current().clone();
        if lexed.token != Token::Eof {
            self.pos += 1;
        }
        lexed
    }

    fn span_here(&self) -> Span {
        let cur = self.current();
        Span::new(self.path, cur.line, cur.column)
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            span: self.span_here(),
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<Lexed, SyntaxError> {
        if *self.peek() == expected {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!("expected {expected}, found {}", self.peek())))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, Span), SyntaxError> {
        let span = self.span_here();
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok((name, span))
            }
            other => Err(self.error_here(format!("expected {what}, found {other}"))),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Ident(k) if k == keyword)
    }

    /// `type Name {` ahead, i.e. a new declaration rather than a field called `type`.
    fn at_decl_start(&self) -> bool {
        self.is_keyword("type")
            && matches!(self.peek_at(1), Token::Ident(_))
            && *self.peek_at(2) == Token::LBrace
    }

    fn take_docs(&mut self) -> Option<String> {
        let mut lines = Vec::new();
        while let Token::Doc(line) = self.peek() {
            lines.push(line.clone());
            self.advance();
        }
        (!lines.is_empty()).then(|| lines.join("\n"))
    }

    // ── recovery ─────────────────────────────────────────────────────

    /// Skip to the next `,` or `}` that belongs to the current type body.
    fn recover_field(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Token::Eof => return,
                Token::Comma | Token::RBrace if depth == 0 => return,
                _ if depth == 0 && self.at_decl_start() => return,
                Token::LBrace | Token::LBracket => depth += 1,
                Token::RBrace | Token::RBracket => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.advance();
        }
    }

    /// Skip to the next top-level `type` keyword.
    fn recover_top_level(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Token::Eof => return,
                Token::Ident(k) if k == "type" && depth == 0 => return,
                Token::LBrace => depth += 1,
                Token::RBrace => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.advance();
        }
    }

    // ── grammar ──────────────────────────────────────────────────────

    fn parse_file(&mut self) -> Vec<TypeDecl> {
        let mut decls = Vec::new();

        loop {
            let doc = self.take_docs();
            match self.peek().clone() {
                Token::Eof => break,
                Token::Ident(kw) if kw == "namespace" => {
                    let span = self.span_here();
                    self.advance();
                    match self.parse_namespace() {
                        Ok(ns) if self.namespace.is_some() || !decls.is_empty() => {
                            self.errors.push(SyntaxError {
                                span,
                                message: format!(
                                    "`namespace {ns}` must appear once, before any type declaration"
                                ),
                            });
                        }
                        Ok(ns) => self.namespace = Some(ns),
                        Err(e) => {
                            self.errors.push(e);
                            self.recover_top_level();
                        }
                    }
                }
                Token::Ident(kw) if kw == "type" => match self.parse_type_decl(doc) {
                    Ok(decl) => decls.push(decl),
                    Err(e) => {
                        self.errors.push(e);
                        self.recover_top_level();
                    }
                },
                other => {
                    let e =
                        self.error_here(format!("expected `type` or `namespace`, found {other}"));
                    self.errors.push(e);
                    self.advance();
                    self.recover_top_level();
                }
            }
        }

        decls
    }

    fn parse_namespace(&mut self) -> Result<String, SyntaxError> {
        let path = self.parse_qualified_name("namespace name")?;
        self.expect(Token::Semicolon)?;
        Ok(path.join("."))
    }

    fn parse_type_decl(&mut self, doc: Option<String>) -> Result<TypeDecl, SyntaxError> {
        let span = self.span_here();
        self.advance(); // `type`

        let (name, name_span) = self.expect_ident("type name")?;
        if PRIMITIVE_NAMES.contains(&name.as_str()) {
            self.errors.push(SyntaxError {
                span: name_span,
                message: format!("`{name}` is a built-in type and cannot be redeclared"),
            });
        }
        self.expect(Token::LBrace)?;

        let mut fields = Vec::new();
        loop {
            let doc = self.take_docs();
            match self.peek() {
                Token::RBrace => {
                    self.advance();
                    break;
                }
                Token::Eof => {
                    return Err(self.error_here(format!(
                        "expected `}}` to close type `{name}`, found end of file"
                    )));
                }
                _ if self.at_decl_start() => {
                    return Err(self.error_here(format!(
                        "expected `}}` to close type `{name}` before the next declaration"
                    )));
                }
                _ => {}
            }

            match self.parse_field(doc) {
                Ok(field) => {
                    fields.push(field);
                    match self.peek() {
                        Token::Comma => {
                            self.advance();
                        }
                        Token::RBrace => {}
                        _ if self.at_decl_start() => {}
                        other => {
                            let e = self.error_here(format!(
                                "expected `,` or `}}` after field, found {other}"
                            ));
                            self.errors.push(e);
                            self.recover_field();
                            if *self.peek() == Token::Comma {
                                self.advance();
                            }
                        }
                    }
                }
                Err(e) => {
                    self.errors.push(e);
                    self.recover_field();
                    if *self.peek() == Token::Comma {
                        self.advance();
                    }
                }
            }
        }

        Ok(TypeDecl {
            name,
            namespace: self.namespace.clone().unwrap_or_default(),
            fields,
            doc,
            span,
        })
    }

    fn parse_field(&mut self, doc: Option<String>) -> Result<Field, SyntaxError> {
        let (name, span) = self.expect_ident("field name")?;
        self.expect(Token::Colon)?;
        let ty = self.parse_type()?;

        let optional = *self.peek() == Token::Question;
        if optional {
            self.advance();
        }

        let default = if *self.peek() == Token::Equals {
            self.advance();
            Some(self.parse_literal()?)
        } else {
            None
        };

        let mut validators = Vec::new();
        while *self.peek() == Token::At {
            self.advance();
            let (name, at) = self.expect_ident("a validator name")?;
            match Validator::from_name(&name) {
                Some(v) if validators.contains(&v) => self.errors.push(SyntaxError {
                    span: at,
                    message: format!("validator `{v}` is given twice"),
                }),
                Some(v) => validators.push(v),
                None => {
                    let known: Vec<_> = Validator::ALL.iter().map(ToString::to_string).collect();
                    self.errors.push(SyntaxError {
                        span: at,
                        message: format!(
                            "unknown validator `@{name}`, expected one of {}",
                            known.join(", ")
                        ),
                    });
                }
            }
        }

        Ok(Field {
            name,
            ty,
            optional,
            default,
            validators,
            doc,
            span,
        })
    }

    fn parse_type(&mut self) -> Result<TypeRef, SyntaxError> {
        if *self.peek() == Token::LBracket {
            self.advance();
            let inner = self.parse_type()?;
            self.expect(Token::RBracket)?;
            return Ok(TypeRef::List(Box::new(inner)));
        }
        Ok(TypeRef::Named(self.parse_qualified_name("a type")?))
    }

    fn parse_qualified_name(&mut self, what: &str) -> Result<Vec<String>, SyntaxError> {
        let (first, _) = self.expect_ident(what)?;
        let mut path = vec![first];
        while *self.peek() == Token::Dot {
            self.advance();
            let (segment, _) = self.expect_ident("a name after `.`")?;
            path.push(segment);
        }
        Ok(path)
    }

    fn parse_literal(&mut self) -> Result<Literal, SyntaxError> {
        let literal = match self.peek().clone() {
            Token::Int(v) => Literal::Int(v),
            Token::Float(v) => Literal::Float(v),
            Token::Str(s) => Literal::Str(s),
            Token::Ident(k) if k == "true" => Literal::Bool(true),
            Token::Ident(k) if k == "false" => Literal::Bool(false),
            other => {
                return Err(self.error_here(format!("expected a literal value, found {other}")));
            }
        };
        self.advance();
        Ok(literal)
    }
}
