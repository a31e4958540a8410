//! Recursive-descent parser over the token stream produced by
//! [`super::lex`], building [`super::ast::Program`].

use thiserror::Error;

use crate::common::{id, Location};
use crate::front::ast::{BinOp, Expr, Program, Stmt};
use crate::front::lex::{Token, TokenKind};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("{0}: expected {1}, found {2:?} {3:?}")]
    Expected(Location, &'static str, TokenKind, String),
    #[error("{0}: invalid number literal {1:?}")]
    BadNumber(Location, String),
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind, what: &'static str) -> Result<Token, ParseError> {
        if self.peek().kind == kind {
            Ok(self.bump())
        } else {
            let tok = self.peek().clone();
            Err(ParseError::Expected(tok.location, what, tok.kind, tok.text))
        }
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut stmts = Vec::new();
        while self.peek().kind != TokenKind::Eof {
            stmts.push(self.parse_stmt()?);
        }
        Ok(Program { stmts })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while self.peek().kind != TokenKind::RBrace {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek().kind {
            TokenKind::KwPrint => {
                self.bump();
                let e = self.parse_expr()?;
                self.expect(TokenKind::Semi, "';'")?;
                Ok(Stmt::Print(e))
            }
            TokenKind::KwRead => {
                self.bump();
                let name = self.expect(TokenKind::Ident, "identifier")?;
                self.expect(TokenKind::Semi, "';'")?;
                Ok(Stmt::Read(id(name.text)))
            }
            TokenKind::KwIf => {
                self.bump();
                self.expect(TokenKind::LParen, "'('")?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                let then = self.parse_block()?;
                let els = if self.peek().kind == TokenKind::KwElse {
                    self.bump();
                    self.parse_block()?
                } else {
                    Vec::new()
                };
                Ok(Stmt::If { cond, then, els })
            }
            TokenKind::KwWhile => {
                self.bump();
                self.expect(TokenKind::LParen, "'('")?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                let body = self.parse_block()?;
                Ok(Stmt::While { cond, body })
            }
            TokenKind::Ident => {
                let name = self.bump();
                self.expect(TokenKind::Assign, "'='")?;
                let e = self.parse_expr()?;
                self.expect(TokenKind::Semi, "';'")?;
                Ok(Stmt::Assign(id(name.text), e))
            }
            _ => {
                let tok = self.peek().clone();
                Err(ParseError::Expected(tok.location, "statement", tok.kind, tok.text))
            }
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_relational()
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek().kind {
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Le => BinOp::Le,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::Ge => BinOp::Ge,
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::NotEq => BinOp::Ne,
            _ => return Ok(lhs),
        };
        self.bump();
        let rhs = self.parse_additive()?;
        Ok(Expr::Bin(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.peek().kind == TokenKind::Minus {
            self.bump();
            let e = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(e)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::IntLit => {
                self.bump();
                let v = tok.text.parse::<i64>().map_err(|_| ParseError::BadNumber(tok.location, tok.text.clone()))?;
                Ok(Expr::Int(v))
            }
            TokenKind::FloatLit => {
                self.bump();
                let v = tok.text.parse::<f64>().map_err(|_| ParseError::BadNumber(tok.location, tok.text.clone()))?;
                Ok(Expr::Float(v))
            }
            TokenKind::Ident => {
                self.bump();
                Ok(Expr::Var(id(tok.text)))
            }
            TokenKind::LParen => {
                self.bump();
                let e = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(e)
            }
            _ => Err(ParseError::Expected(tok.location, "expression", tok.kind, tok.text)),
        }
    }
}

pub fn parse(file: impl Into<String>, src: &str) -> Result<Program, anyhow::Error> {
    let file_id = id(file.into());
    let tokens = crate::front::lex::Lexer::new(file_id, src).tokenize()?;
    let mut parser = Parser::new(&tokens);
    Ok(parser.parse_program()?)
}
