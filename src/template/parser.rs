use crate::error::{Location, RenderError};
use serde_json::Value;

use super::ast::{BinaryOp, Expr, LoopKind, Node, UnaryOp};
use super::lexer::Segment;
use super::value::number_value;

/// Punctuators, longest first so that `===` wins over `==`
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "=>", "==", "!=", "<=", ">=", "&&", "||", "(", ")", "{", "}", "[", "]", ".",
    ",", ";", "!", "<", ">", "+", "-", "*", "/", "%", "?", ":", "=",
];

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Num(f64),
    Str(String),
    Punct(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    tok: Tok,
    offset: usize,
}

/// Scriptlet tokens interleaved with the template content between them
#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Text(String),
    Output {
        expr: Expr,
        escape: bool,
        offset: usize,
    },
    Tok(Token),
}

pub struct Parser<'a> {
    pieces: Vec<Piece>,
    pos: usize,
    source: &'a str,
    name: &'a str,
}

impl<'a> Parser<'a> {
    /// Parse lexed segments into a node tree. `source` is the prepared source
    /// the segment offsets point into.
    pub fn parse(
        segments: Vec<Segment>,
        source: &'a str,
        name: &'a str,
    ) -> Result<Vec<Node>, RenderError> {
        let mut pieces = Vec::new();
        for segment in segments {
            match segment {
                Segment::Text(text) => pieces.push(Piece::Text(text)),
                Segment::Output {
                    code,
                    escape,
                    offset,
                } => {
                    let expr = Self::parse_output(&code, offset, source, name)?;
                    pieces.push(Piece::Output {
                        expr,
                        escape,
                        offset,
                    });
                }
                Segment::Code { code, offset } => {
                    let tokens = tokenize(&code, offset, source, name)?;
                    pieces.extend(tokens.into_iter().map(Piece::Tok));
                }
            }
        }

        let mut parser = Parser {
            pieces,
            pos: 0,
            source,
            name,
        };
        parser.parse_block(true)
    }

    /// The expression inside `<%= %>` / `<%- %>`; a trailing `;` is allowed
    fn parse_output(
        code: &str,
        offset: usize,
        source: &'a str,
        name: &'a str,
    ) -> Result<Expr, RenderError> {
        let tokens = tokenize(code, offset, source, name)?;
        let mut parser = Parser {
            pieces: tokens.into_iter().map(Piece::Tok).collect(),
            pos: 0,
            source,
            name,
        };
        if parser.at_end() {
            return Ok(Expr::Undefined);
        }
        let expr = parser.parse_expr()?;
        parser.eat_punct(";");
        if !parser.at_end() {
            return Err(parser.error_here("unexpected token after expression"));
        }
        Ok(expr)
    }

    // --- statements ---

    fn parse_block(&mut self, top: bool) -> Result<Vec<Node>, RenderError> {
        let mut nodes = Vec::new();
        loop {
            match self.peek() {
                None if top => return Ok(nodes),
                None => return Err(self.error_here("unexpected end of template, missing '}'")),
                Some(Piece::Text(text)) => {
                    let node = Node::Text(text.clone());
                    self.pos += 1;
                    nodes.push(node);
                }
                Some(Piece::Output {
                    expr,
                    escape,
                    offset,
                }) => {
                    let node = Node::Output {
                        expr: expr.clone(),
                        escape: *escape,
                        offset: *offset,
                    };
                    self.pos += 1;
                    nodes.push(node);
                }
                Some(Piece::Tok(_)) => {
                    if self.eat_punct(";") {
                        continue;
                    }
                    if self.peek_punct("}") {
                        if top {
                            return Err(self.error_here("unexpected '}'"));
                        }
                        return Ok(nodes);
                    }
                    let statement = self.parse_statement()?;
                    nodes.push(statement);
                }
            }
        }
    }

    fn parse_statement(&mut self) -> Result<Node, RenderError> {
        let offset = self.offset();
        match self.peek_ident() {
            Some("if") => self.parse_if(),
            Some("for") => self.parse_for(),
            Some("const") | Some("let") | Some("var") => {
                self.pos += 1;
                let name = self.expect_ident()?;
                self.expect_punct("=")?;
                let value = self.parse_expr()?;
                self.eat_punct(";");
                Ok(Node::Let {
                    name,
                    value,
                    offset,
                })
            }
            _ => {
                let target = self.parse_expr()?;
                if self.peek_punct(".") && self.peek_ident_at(1) == Some("forEach") {
                    return self.parse_for_each(target, offset);
                }
                Err(self.error_at(offset, "unsupported statement"))
            }
        }
    }

    fn parse_if(&mut self) -> Result<Node, RenderError> {
        let offset = self.offset();
        self.pos += 1;
        self.expect_punct("(")?;
        let cond = self.parse_expr()?;
        self.expect_punct(")")?;
        let then = self.parse_braced()?;

        let otherwise = if self.peek_ident() == Some("else") {
            self.pos += 1;
            if self.peek_ident() == Some("if") {
                vec![self.parse_if()?]
            } else {
                self.parse_braced()?
            }
        } else {
            Vec::new()
        };

        Ok(Node::If {
            cond,
            then,
            otherwise,
            offset,
        })
    }

    fn parse_for(&mut self) -> Result<Node, RenderError> {
        let offset = self.offset();
        self.pos += 1;
        self.expect_punct("(")?;
        if matches!(self.peek_ident(), Some("const") | Some("let") | Some("var")) {
            self.pos += 1;
        }
        let binding = self.expect_ident()?;
        let kind = match self.peek_ident() {
            Some("of") => LoopKind::Of,
            Some("in") => LoopKind::In,
            _ => {
                return Err(
                    self.error_at(offset, "unsupported for loop, use for...of or for...in")
                )
            }
        };
        self.pos += 1;
        let iterable = self.parse_expr()?;
        self.expect_punct(")")?;
        let body = self.parse_braced()?;

        Ok(Node::For {
            kind,
            binding,
            index: None,
            iterable,
            body,
            offset,
        })
    }

    /// `xs.forEach(function (x, i) { ... })`, `(x, i) => {` or `x => {`
    fn parse_for_each(&mut self, iterable: Expr, offset: usize) -> Result<Node, RenderError> {
        self.pos += 2;
        self.expect_punct("(")?;

        let params = if self.peek_ident() == Some("function") {
            self.pos += 1;
            self.parse_params()?
        } else if self.peek_punct("(") {
            let params = self.parse_params()?;
            self.expect_punct("=>")?;
            params
        } else {
            let param = self.expect_ident()?;
            self.expect_punct("=>")?;
            vec![param]
        };

        let mut params = params.into_iter();
        let binding = params
            .next()
            .ok_or_else(|| self.error_at(offset, "forEach callback needs a parameter"))?;
        let index = params.next();

        let body = self.parse_braced()?;
        self.expect_punct(")")?;
        self.eat_punct(";");

        Ok(Node::For {
            kind: LoopKind::Of,
            binding,
            index,
            iterable,
            body,
            offset,
        })
    }

    fn parse_params(&mut self) -> Result<Vec<String>, RenderError> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        if !self.eat_punct(")") {
            loop {
                params.push(self.expect_ident()?);
                if self.eat_punct(")") {
                    break;
                }
                self.expect_punct(",")?;
            }
        }
        Ok(params)
    }

    fn parse_braced(&mut self) -> Result<Vec<Node>, RenderError> {
        self.expect_punct("{")?;
        let body = self.parse_block(false)?;
        self.expect_punct("}")?;
        Ok(body)
    }

    // --- expressions ---

    fn parse_expr(&mut self) -> Result<Expr, RenderError> {
        let cond = self.parse_binary(0)?;
        if self.eat_punct("?") {
            let then = self.parse_expr()?;
            self.expect_punct(":")?;
            let otherwise = self.parse_expr()?;
            return Ok(Expr::Ternary(
                Box::new(cond),
                Box::new(then),
                Box::new(otherwise),
            ));
        }
        Ok(cond)
    }

    /// Precedence climbing over the binary operator table
    fn parse_binary(&mut self, min_level: usize) -> Result<Expr, RenderError> {
        let mut left = self.parse_unary()?;
        while let Some((op, level)) = self.peek_binary_op() {
            if level < min_level {
                break;
            }
            self.pos += 1;
            let right = self.parse_binary(level + 1)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn peek_binary_op(&self) -> Option<(BinaryOp, usize)> {
        let punct = match self.peek() {
            Some(Piece::Tok(Token {
                tok: Tok::Punct(p), ..
            })) => *p,
            _ => return None,
        };
        let op = match punct {
            "||" => (BinaryOp::Or, 0),
            "&&" => (BinaryOp::And, 1),
            "===" => (BinaryOp::StrictEq, 2),
            "!==" => (BinaryOp::StrictNe, 2),
            "==" => (BinaryOp::LooseEq, 2),
            "!=" => (BinaryOp::LooseNe, 2),
            "<" => (BinaryOp::Lt, 3),
            "<=" => (BinaryOp::Le, 3),
            ">" => (BinaryOp::Gt, 3),
            ">=" => (BinaryOp::Ge, 3),
            "+" => (BinaryOp::Add, 4),
            "-" => (BinaryOp::Sub, 4),
            "*" => (BinaryOp::Mul, 5),
            "/" => (BinaryOp::Div, 5),
            "%" => (BinaryOp::Rem, 5),
            _ => return None,
        };
        Some(op)
    }

    fn parse_unary(&mut self) -> Result<Expr, RenderError> {
        if self.eat_punct("!") {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.parse_unary()?)));
        }
        if self.eat_punct("-") {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?)));
        }
        if self.peek_ident() == Some("typeof") {
            self.pos += 1;
            return Ok(Expr::Unary(UnaryOp::TypeOf, Box::new(self.parse_unary()?)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, RenderError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.peek_punct(".") {
                // forEach opens a template block; the statement parser owns it
                if self.peek_ident_at(1) == Some("forEach") {
                    break;
                }
                self.pos += 1;
                let name = self.expect_ident()?;
                if self.peek_punct("(") {
                    let args = self.parse_args()?;
                    expr = Expr::Call {
                        target: Box::new(expr),
                        method: name,
                        args,
                    };
                } else {
                    expr = Expr::Member(Box::new(expr), name);
                }
            } else if self.eat_punct("[") {
                let index = self.parse_expr()?;
                self.expect_punct("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, RenderError> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        if !self.eat_punct(")") {
            loop {
                args.push(self.parse_expr()?);
                if self.eat_punct(")") {
                    break;
                }
                self.expect_punct(",")?;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, RenderError> {
        let token = match self.peek() {
            Some(Piece::Tok(token)) => token.clone(),
            _ => return Err(self.error_here("expected an expression")),
        };
        self.pos += 1;

        match token.tok {
            Tok::Num(n) => number_value(n)
                .map(Expr::Literal)
                .ok_or_else(|| self.error_at(token.offset, "number literal out of range")),
            Tok::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Tok::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                "undefined" => Ok(Expr::Undefined),
                "include" if self.peek_punct("(") => {
                    let mut args = self.parse_args()?.into_iter();
                    let path = args.next().ok_or_else(|| {
                        self.error_at(token.offset, "include() needs a template path")
                    })?;
                    let locals = args.next().map(Box::new);
                    if args.next().is_some() {
                        return Err(self.error_at(token.offset, "include() takes at most 2 arguments"));
                    }
                    Ok(Expr::Include(Box::new(path), locals))
                }
                _ => Ok(Expr::Ident(name)),
            },
            Tok::Punct("(") => {
                let expr = self.parse_expr()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            Tok::Punct("[") => {
                let mut items = Vec::new();
                if !self.eat_punct("]") {
                    loop {
                        items.push(self.parse_expr()?);
                        if self.eat_punct("]") {
                            break;
                        }
                        self.expect_punct(",")?;
                        if self.eat_punct("]") {
                            break;
                        }
                    }
                }
                Ok(Expr::Array(items))
            }
            Tok::Punct("{") => {
                let mut entries = Vec::new();
                if !self.eat_punct("}") {
                    loop {
                        let key = match self.peek() {
                            Some(Piece::Tok(Token {
                                tok: Tok::Ident(k) | Tok::Str(k),
                                ..
                            })) => k.clone(),
                            _ => return Err(self.error_here("expected an object key")),
                        };
                        self.pos += 1;
                        let value = if self.eat_punct(":") {
                            self.parse_expr()?
                        } else {
                            Expr::Ident(key.clone())
                        };
                        entries.push((key, value));
                        if self.eat_punct("}") {
                            break;
                        }
                        self.expect_punct(",")?;
                        if self.eat_punct("}") {
                            break;
                        }
                    }
                }
                Ok(Expr::Object(entries))
            }
            Tok::Punct(p) => Err(self.error_at(token.offset, &format!("unexpected '{}'", p))),
        }
    }

    // --- cursor helpers ---

    fn peek(&self) -> Option<&Piece> {
        self.pieces.get(self.pos)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.pieces.len()
    }

    fn peek_punct(&self, punct: &str) -> bool {
        matches!(self.peek(), Some(Piece::Tok(Token { tok: Tok::Punct(p), .. })) if *p == punct)
    }

    fn peek_ident(&self) -> Option<&str> {
        self.peek_ident_at(0)
    }

    fn peek_ident_at(&self, ahead: usize) -> Option<&str> {
        match self.pieces.get(self.pos + ahead) {
            Some(Piece::Tok(Token {
                tok: Tok::Ident(name),
                ..
            })) => Some(name.as_str()),
            _ => None,
        }
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.peek_punct(punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Result<(), RenderError> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.error_here(&format!("expected '{}'", punct)))
        }
    }

    fn expect_ident(&mut self) -> Result<String, RenderError> {
        match self.peek() {
            Some(Piece::Tok(Token {
                tok: Tok::Ident(name),
                ..
            })) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error_here("expected an identifier")),
        }
    }

    /// Source offset of the current piece (or the end of the source)
    fn offset(&self) -> usize {
        match self.peek() {
            Some(Piece::Tok(token)) => token.offset,
            Some(Piece::Output { offset, .. }) => *offset,
            Some(Piece::Text(_)) => self
                .pieces
                .get(..self.pos)
                .and_then(|before| {
                    before.iter().rev().find_map(|piece| match piece {
                        Piece::Tok(token) => Some(token.offset),
                        Piece::Output { offset, .. } => Some(*offset),
                        Piece::Text(_) => None,
                    })
                })
                .unwrap_or(0),
            None => self.source.len(),
        }
    }

    fn error_here(&self, message: &str) -> RenderError {
        self.error_at(self.offset(), message)
    }

    fn error_at(&self, offset: usize, message: &str) -> RenderError {
        RenderError::TemplateSyntax {
            message: message.to_string(),
            location: Location::from_offset(self.source, offset, self.name),
        }
    }
}

/// Split scriptlet code into tokens; offsets are relative to the whole source
fn tokenize(
    code: &str,
    base: usize,
    source: &str,
    name: &str,
) -> Result<Vec<Token>, RenderError> {
    let error = |at: usize, message: &str| RenderError::TemplateSyntax {
        message: message.to_string(),
        location: Location::from_offset(source, base + at, name),
    };

    let bytes = code.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < code.len() {
        let c = code[i..].chars().next().unwrap_or(' ');

        if c.is_whitespace() {
            i += c.len_utf8();
            continue;
        }

        if code[i..].starts_with("//") {
            i = code[i..].find('\n').map(|n| i + n).unwrap_or(code.len());
            continue;
        }

        if code[i..].starts_with("/*") {
            match code[i + 2..].find("*/") {
                Some(n) => i += n + 4,
                None => return Err(error(i, "unterminated comment")),
            }
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            let start = i;
            while i < code.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            let literal = &code[start..i];
            let n = literal
                .parse::<f64>()
                .map_err(|_| error(start, &format!("invalid number '{}'", literal)))?;
            tokens.push(Token {
                tok: Tok::Num(n),
                offset: base + start,
            });
            continue;
        }

        if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            for ch in code[i..].chars() {
                if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                    i += ch.len_utf8();
                } else {
                    break;
                }
            }
            tokens.push(Token {
                tok: Tok::Ident(code[start..i].to_string()),
                offset: base + start,
            });
            continue;
        }

        if c == '\'' || c == '"' {
            let start = i;
            let mut value = String::new();
            let mut chars = code[i + 1..].char_indices();
            let mut closed = false;
            while let Some((n, ch)) = chars.next() {
                if ch == c {
                    i = i + 1 + n + 1;
                    closed = true;
                    break;
                }
                if ch == '\\' {
                    match chars.next() {
                        Some((_, 'n')) => value.push('\n'),
                        Some((_, 't')) => value.push('\t'),
                        Some((_, 'r')) => value.push('\r'),
                        Some((_, other)) => value.push(other),
                        None => break,
                    }
                } else {
                    value.push(ch);
                }
            }
            if !closed {
                return Err(error(start, "unterminated string literal"));
            }
            tokens.push(Token {
                tok: Tok::Str(value),
                offset: base + start,
            });
            continue;
        }

        match PUNCTUATORS.iter().find(|p| code[i..].starts_with(**p)) {
            Some(&p) => {
                tokens.push(Token {
                    tok: Tok::Punct(p),
                    offset: base + i,
                });
                i += p.len();
            }
            None => return Err(error(i, &format!("unexpected character '{}'", c))),
        }
    }

    Ok(tokens)
}
