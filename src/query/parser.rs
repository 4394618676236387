//! Query Parser
//!
//! Recursive descent parser over the token vector produced by the lexer.
//! `//` expands to a `descendant-or-self::node()` step, as in the
//! abbreviated syntax.

use super::ast::{Axis, BinaryOp, Expr, NodeTest, Predicate, Step};
use super::lexer::{tokenize, Token};
use crate::error::{Error, Result};

/// Query parser
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self> {
        Ok(Parser {
            tokens: tokenize(input)?,
            pos: 0,
        })
    }

    /// Parse the whole input as one expression (a top-level comma list
    /// becomes a sequence)
    pub fn parse(&mut self) -> Result<Expr> {
        let mut items = self.parse_expr_list()?;
        if let Some(token) = self.peek() {
            return Err(Error::Query(format!("unexpected {:?} after expression", token)));
        }
        Ok(match items.len() {
            1 => items.remove(0),
            _ => Expr::Sequence(items),
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        match self.peek() {
            Some(t) if *t == token => {
                self.pos += 1;
                Ok(())
            }
            Some(other) => Err(Error::Query(format!("expected {:?}, found {:?}", token, other))),
            None => Err(Error::Query(format!("expected {:?}, found end of input", token))),
        }
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>> {
        let mut items = vec![self.parse_expr()?];
        while self.check(&Token::Comma) {
            self.pos += 1;
            items.push(self.parse_expr()?);
        }
        Ok(items)
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or_expr()
    }

    fn parse_binary(
        &mut self,
        next: fn(&mut Self) -> Result<Expr>,
        op_for: fn(&Token) -> Option<BinaryOp>,
    ) -> Result<Expr> {
        let mut left = next(self)?;
        while let Some(op) = self.peek().and_then(op_for) {
            self.pos += 1;
            let right = next(self)?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_or_expr(&mut self) -> Result<Expr> {
        self.parse_binary(Self::parse_and_expr, |t| matches!(t, Token::Or).then_some(BinaryOp::Or))
    }

    fn parse_and_expr(&mut self) -> Result<Expr> {
        self.parse_binary(Self::parse_equality_expr, |t| matches!(t, Token::And).then_some(BinaryOp::And))
    }

    fn parse_equality_expr(&mut self) -> Result<Expr> {
        self.parse_binary(Self::parse_relational_expr, |t| match t {
            Token::Eq => Some(BinaryOp::Eq),
            Token::NotEq => Some(BinaryOp::NotEq),
            _ => None,
        })
    }

    fn parse_relational_expr(&mut self) -> Result<Expr> {
        self.parse_binary(Self::parse_additive_expr, |t| match t {
            Token::Lt => Some(BinaryOp::Lt),
            Token::LtEq => Some(BinaryOp::LtEq),
            Token::Gt => Some(BinaryOp::Gt),
            Token::GtEq => Some(BinaryOp::GtEq),
            _ => None,
        })
    }

    fn parse_additive_expr(&mut self) -> Result<Expr> {
        self.parse_binary(Self::parse_multiplicative_expr, |t| match t {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Expr> {
        self.parse_binary(Self::parse_unary_expr, |t| match t {
            Token::Star => Some(BinaryOp::Mul),
            Token::Div => Some(BinaryOp::Div),
            Token::Mod => Some(BinaryOp::Mod),
            _ => None,
        })
    }

    fn parse_unary_expr(&mut self) -> Result<Expr> {
        if self.check(&Token::Minus) {
            self.pos += 1;
            let inner = self.parse_unary_expr()?;
            return Ok(Expr::Negate(Box::new(inner)));
        }
        self.parse_union_expr()
    }

    fn parse_union_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_path_expr()?;
        while self.check(&Token::Pipe) {
            self.pos += 1;
            let right = self.parse_path_expr()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_path_expr(&mut self) -> Result<Expr> {
        let mut expr = match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                if !self.starts_step() {
                    return Ok(Expr::Root);
                }
                Expr::Path(Box::new(Expr::Root), Box::new(self.parse_step_expr()?))
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                descend(Expr::Root, self.parse_step_expr()?)
            }
            _ => self.parse_step_expr()?,
        };

        loop {
            match self.peek() {
                Some(Token::Slash) => {
                    self.pos += 1;
                    expr = Expr::Path(Box::new(expr), Box::new(self.parse_step_expr()?));
                }
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    expr = descend(expr, self.parse_step_expr()?);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::At
                    | Token::Axis(_)
                    | Token::Star
                    | Token::PrefixWildcard(_)
                    | Token::Name(_)
                    | Token::Dot
                    | Token::DoubleDot
            )
        )
    }

    /// An axis step, or a primary expression with optional predicates
    fn parse_step_expr(&mut self) -> Result<Expr> {
        let is_axis_step = match self.peek() {
            Some(Token::At | Token::Axis(_) | Token::Star | Token::PrefixWildcard(_)) => true,
            Some(Token::Name(name)) => {
                !matches!(self.peek_at(1), Some(Token::LeftParen)) || is_node_type(name)
            }
            _ => false,
        };
        if is_axis_step {
            return Ok(Expr::Step(Box::new(self.parse_step()?)));
        }

        let primary = self.parse_primary_expr()?;
        let predicates = self.parse_predicates()?;
        if predicates.is_empty() {
            Ok(primary)
        } else {
            Ok(Expr::Filter(Box::new(primary), predicates))
        }
    }

    fn parse_primary_expr(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::String(s)) => Ok(Expr::String(s)),
            Some(Token::Dot) => Ok(Expr::Context),
            Some(Token::DoubleDot) => Ok(Expr::Parent),
            Some(Token::Dollar) => match self.advance() {
                Some(Token::Name(name)) => Ok(Expr::Variable(name)),
                other => Err(Error::Query(format!("expected variable name, found {:?}", other))),
            },
            Some(Token::LeftParen) => {
                if self.check(&Token::RightParen) {
                    self.pos += 1;
                    return Ok(Expr::Sequence(Vec::new()));
                }
                let mut items = self.parse_expr_list()?;
                self.expect(Token::RightParen)?;
                Ok(match items.len() {
                    1 => items.remove(0),
                    _ => Expr::Sequence(items),
                })
            }
            Some(Token::Name(name)) => {
                self.expect(Token::LeftParen)?;
                let mut args = Vec::new();
                if !self.check(&Token::RightParen) {
                    args.push(self.parse_expr()?);
                    while self.check(&Token::Comma) {
                        self.pos += 1;
                        args.push(self.parse_expr()?);
                    }
                }
                self.expect(Token::RightParen)?;
                Ok(Expr::Function(name, args))
            }
            Some(other) => Err(Error::Query(format!("unexpected {:?}", other))),
            None => Err(Error::Query("unexpected end of input".to_string())),
        }
    }

    fn parse_step(&mut self) -> Result<Step> {
        let axis = match self.peek() {
            Some(Token::At) => {
                self.pos += 1;
                Axis::Attribute
            }
            Some(Token::Axis(name)) => {
                let axis = Axis::from_name(name).ok_or_else(|| Error::Query(format!("unknown axis `{}`", name)))?;
                self.pos += 1;
                axis
            }
            _ => Axis::Child,
        };

        let node_test = match self.advance() {
            Some(Token::Star) => NodeTest::Any,
            Some(Token::PrefixWildcard(prefix)) => NodeTest::NamespaceWildcard(prefix),
            Some(Token::Name(name)) if is_node_type(&name) && self.check(&Token::LeftParen) => {
                self.parse_kind_test(&name)?
            }
            Some(Token::Name(name)) => NodeTest::Name(name),
            other => return Err(Error::Query(format!("expected node test, found {:?}", other))),
        };

        Ok(Step {
            axis,
            node_test,
            predicates: self.parse_predicates()?,
        })
    }

    fn parse_kind_test(&mut self, name: &str) -> Result<NodeTest> {
        self.expect(Token::LeftParen)?;
        let target = match self.peek() {
            Some(Token::String(s)) | Some(Token::Name(s)) if name == "processing-instruction" => {
                let s = s.clone();
                self.pos += 1;
                Some(s)
            }
            _ => None,
        };
        self.expect(Token::RightParen)?;
        Ok(match name {
            "node" => NodeTest::Node,
            "text" => NodeTest::Text,
            "comment" => NodeTest::Comment,
            _ => NodeTest::ProcessingInstruction(target),
        })
    }

    fn parse_predicates(&mut self) -> Result<Vec<Predicate>> {
        let mut predicates = Vec::new();
        while self.check(&Token::LeftBracket) {
            self.pos += 1;
            let exprs = self.parse_expr_list()?;
            self.expect(Token::RightBracket)?;
            predicates.push(Predicate { exprs });
        }
        Ok(predicates)
    }
}

fn is_node_type(name: &str) -> bool {
    matches!(name, "node" | "text" | "comment" | "processing-instruction")
}

/// `base//step`
fn descend(base: Expr, step: Expr) -> Expr {
    let dos = Expr::Step(Box::new(Step::descendant_or_self()));
    Expr::Path(Box::new(Expr::Path(Box::new(base), Box::new(dos))), Box::new(step))
}

/// Parse query text
pub fn parse(input: &str) -> Result<Expr> {
    Parser::new(input)?.parse()
}
