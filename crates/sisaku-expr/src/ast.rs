//! Expression AST and recursive-descent parser.

use thiserror::Error;

use crate::position::Position;
use crate::token::{Token, TokenError, TokenKind, tokenize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareKind {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalKind {
    And,
    Or,
}

/// A node in the expression AST, carrying the position of its first token.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedExpr {
    pub pos: Position,
    pub node: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A bare context root, e.g. `github` in `github.actor`.
    Variable(String),
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// `receiver.property`
    ObjectDeref {
        receiver: Box<SpannedExpr>,
        property: String,
    },
    /// `receiver.*`
    ArrayDeref { receiver: Box<SpannedExpr> },
    /// `operand[index]`
    IndexAccess {
        operand: Box<SpannedExpr>,
        index: Box<SpannedExpr>,
    },
    FuncCall {
        callee: String,
        args: Vec<SpannedExpr>,
    },
    NotOp { operand: Box<SpannedExpr> },
    CompareOp {
        kind: CompareKind,
        left: Box<SpannedExpr>,
        right: Box<SpannedExpr>,
    },
    LogicalOp {
        kind: LogicalKind,
        left: Box<SpannedExpr>,
        right: Box<SpannedExpr>,
    },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("unexpected token, expected {expected}")]
    Unexpected { expected: &'static str, pos: Position },
    #[error("trailing tokens after expression")]
    Trailing { pos: Position },
}

impl ParseError {
    pub fn pos(&self) -> Position {
        match self {
            ParseError::Token(e) => e.pos(),
            ParseError::Unexpected { pos, .. } | ParseError::Trailing { pos } => *pos,
        }
    }
}

/// Parses the body of a `${{ ... }}` fragment into an expression AST.
pub fn parse(src: &str) -> Result<SpannedExpr, ParseError> {
    let tokens = tokenize(src)?;
    let mut p = Parser { tokens: &tokens, idx: 0 };
    let expr = p.or_expr()?;
    p.expect_end()?;
    Ok(expr)
}

struct Parser<'t> {
    tokens: &'t [Token],
    idx: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> &Token {
        &self.tokens[self.idx]
    }

    fn pos(&self) -> Position {
        self.peek().pos
    }

    fn bump(&mut self) -> &Token {
        let t = &self.tokens[self.idx];
        if self.idx + 1 < self.tokens.len() {
            self.idx += 1;
        }
        t
    }

    fn expect_end(&mut self) -> Result<(), ParseError> {
        if matches!(self.peek().kind, TokenKind::End) {
            Ok(())
        } else {
            Err(ParseError::Trailing { pos: self.pos() })
        }
    }

    fn or_expr(&mut self) -> Result<SpannedExpr, ParseError> {
        let pos = self.pos();
        let lhs = self.and_expr()?;
        if matches!(self.peek().kind, TokenKind::OrOr) {
            self.bump();
            let rhs = self.or_expr()?;
            Ok(SpannedExpr {
                pos,
                node: Expr::LogicalOp {
                    kind: LogicalKind::Or,
                    left: Box::new(lhs),
                    right: Box::new(rhs),
                },
            })
        } else {
            Ok(lhs)
        }
    }

    fn and_expr(&mut self) -> Result<SpannedExpr, ParseError> {
        let pos = self.pos();
        let lhs = self.cmp_expr()?;
        if matches!(self.peek().kind, TokenKind::AndAnd) {
            self.bump();
            let rhs = self.and_expr()?;
            Ok(SpannedExpr {
                pos,
                node: Expr::LogicalOp {
                    kind: LogicalKind::And,
                    left: Box::new(lhs),
                    right: Box::new(rhs),
                },
            })
        } else {
            Ok(lhs)
        }
    }

    fn cmp_expr(&mut self) -> Result<SpannedExpr, ParseError> {
        let pos = self.pos();
        let lhs = self.unary_expr()?;
        let kind = match self.peek().kind {
            TokenKind::Lt => CompareKind::Lt,
            TokenKind::Le => CompareKind::Le,
            TokenKind::Gt => CompareKind::Gt,
            TokenKind::Ge => CompareKind::Ge,
            TokenKind::EqEq => CompareKind::Eq,
            TokenKind::Ne => CompareKind::Ne,
            _ => return Ok(lhs),
        };
        self.bump();
        let rhs = self.cmp_expr()?;
        Ok(SpannedExpr {
            pos,
            node: Expr::CompareOp {
                kind,
                left: Box::new(lhs),
                right: Box::new(rhs),
            },
        })
    }

    fn unary_expr(&mut self) -> Result<SpannedExpr, ParseError> {
        let pos = self.pos();
        if matches!(self.peek().kind, TokenKind::Bang) {
            self.bump();
            let operand = self.unary_expr()?;
            Ok(SpannedExpr {
                pos,
                node: Expr::NotOp { operand: Box::new(operand) },
            })
        } else {
            self.postfix_expr()
        }
    }

    fn postfix_expr(&mut self) -> Result<SpannedExpr, ParseError> {
        let mut expr = self.primary_expr()?;
        loop {
            match &self.peek().kind {
                TokenKind::Dot => {
                    self.bump();
                    match self.peek().kind.clone() {
                        TokenKind::Star => {
                            self.bump();
                            expr = SpannedExpr {
                                pos: expr.pos,
                                node: Expr::ArrayDeref { receiver: Box::new(expr) },
                            };
                        }
                        TokenKind::Ident(name) => {
                            self.bump();
                            expr = SpannedExpr {
                                pos: expr.pos,
                                node: Expr::ObjectDeref {
                                    receiver: Box::new(expr),
                                    property: name.to_ascii_lowercase(),
                                },
                            };
                        }
                        _ => {
                            return Err(ParseError::Unexpected {
                                expected: "identifier or '*' after '.'",
                                pos: self.pos(),
                            });
                        }
                    }
                }
                TokenKind::LBracket => {
                    self.bump();
                    let index = self.or_expr()?;
                    if !matches!(self.peek().kind, TokenKind::RBracket) {
                        return Err(ParseError::Unexpected {
                            expected: "']'",
                            pos: self.pos(),
                        });
                    }
                    self.bump();
                    expr = SpannedExpr {
                        pos: expr.pos,
                        node: Expr::IndexAccess {
                            operand: Box::new(expr),
                            index: Box::new(index),
                        },
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn primary_expr(&mut self) -> Result<SpannedExpr, ParseError> {
        let pos = self.pos();
        match self.peek().kind.clone() {
            TokenKind::Int(v) => {
                self.bump();
                Ok(SpannedExpr { pos, node: Expr::Int(v) })
            }
            TokenKind::Float(v) => {
                self.bump();
                Ok(SpannedExpr { pos, node: Expr::Float(v) })
            }
            TokenKind::String(s) => {
                self.bump();
                Ok(SpannedExpr { pos, node: Expr::String(s) })
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.or_expr()?;
                if !matches!(self.peek().kind, TokenKind::RParen) {
                    return Err(ParseError::Unexpected {
                        expected: "')'",
                        pos: self.pos(),
                    });
                }
                self.bump();
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                self.bump();
                if matches!(self.peek().kind, TokenKind::LParen) {
                    self.bump();
                    let mut args = Vec::new();
                    if !matches!(self.peek().kind, TokenKind::RParen) {
                        args.push(self.or_expr()?);
                        while matches!(self.peek().kind, TokenKind::Comma) {
                            self.bump();
                            args.push(self.or_expr()?);
                        }
                    }
                    if !matches!(self.peek().kind, TokenKind::RParen) {
                        return Err(ParseError::Unexpected {
                            expected: "')'",
                            pos: self.pos(),
                        });
                    }
                    self.bump();
                    return Ok(SpannedExpr {
                        pos,
                        node: Expr::FuncCall { callee: name.to_ascii_lowercase(), args },
                    });
                }

                let node = match name.as_str() {
                    "null" => Expr::Null,
                    "true" => Expr::Bool(true),
                    "false" => Expr::Bool(false),
                    _ => Expr::Variable(name.to_ascii_lowercase()),
                };
                Ok(SpannedExpr { pos, node })
            }
            _ => Err(ParseError::Unexpected {
                expected: "an expression",
                pos,
            }),
        }
    }
}

impl SpannedExpr {
    /// Returns the "root" context name if this expression (or its innermost
    /// receiver chain) ultimately bottoms out at a bare [`Expr::Variable`].
    pub fn root_variable(&self) -> Option<&str> {
        match &self.node {
            Expr::Variable(name) => Some(name),
            Expr::ObjectDeref { receiver, .. }
            | Expr::ArrayDeref { receiver }
            | Expr::IndexAccess { operand: receiver, .. } => receiver.root_variable(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_context_chain() {
        let e = parse("github.event.issue.title }}").unwrap();
        assert_eq!(e.root_variable(), Some("github"));
        assert!(matches!(e.node, Expr::ObjectDeref { .. }));
    }

    #[test]
    fn test_parse_keywords_case_sensitive() {
        assert_eq!(parse("null }}").unwrap().node, Expr::Null);
        assert_eq!(parse("true }}").unwrap().node, Expr::Bool(true));
        // `Null` (capitalized) is a variable reference, not the keyword.
        assert_eq!(
            parse("Null }}").unwrap().node,
            Expr::Variable("null".to_string())
        );
    }

    #[test]
    fn test_parse_precedence() {
        // a || b && c  ==  a || (b && c)
        let e = parse("a || b && c }}").unwrap();
        let Expr::LogicalOp { kind: LogicalKind::Or, right, .. } = e.node else {
            panic!("expected top-level Or");
        };
        assert!(matches!(
            right.node,
            Expr::LogicalOp { kind: LogicalKind::And, .. }
        ));
    }

    #[test]
    fn test_parse_function_call() {
        let e = parse("contains(foo, 'bar') }}").unwrap();
        let Expr::FuncCall { callee, args } = e.node else {
            panic!("expected call");
        };
        assert_eq!(callee, "contains");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_parse_index_and_star() {
        let e = parse("foo.*.bar[0] }}").unwrap();
        assert!(matches!(e.node, Expr::IndexAccess { .. }));
    }

    #[test]
    fn test_parse_trailing_tokens_error() {
        let err = parse("foo bar }}").unwrap_err();
        assert!(matches!(err, ParseError::Trailing { .. }));
    }

    #[test]
    fn test_parse_unary() {
        let e = parse("!foo }}").unwrap();
        assert!(matches!(e.node, Expr::NotOp { .. }));
    }

    #[test]
    fn test_property_lowercased() {
        let e = parse("github.Event.ISSUE }}").unwrap();
        let Expr::ObjectDeref { property, .. } = e.node else {
            panic!()
        };
        assert_eq!(property, "issue");
    }
}
