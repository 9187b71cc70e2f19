//! Recursive-descent parser for the query language.
//!
//! Grammar:
//!
//! ```text
//! query      := [expression] [expand] [orderBy]
//! expression := term   ( OR term )*
//! term       := factor ( AND factor )*
//! factor     := NOT factor | '(' expression ')' | comparison
//! comparison := IDENT ( op value | [NOT] IN '(' value (',' value)* ')' )
//! expand     := EXPAND IDENT [ DEPTH (NUMBER | '*') ]
//! orderBy    := ORDER BY IDENT [ASC|DESC] (',' IDENT [ASC|DESC])*
//! ```
//!
//! OR binds loosest, then AND, then NOT/parentheses/comparisons. The parser
//! holds a two-token window (`current`, `peek`) over the lexer and returns
//! either a complete `Query` or a positioned `ParseError`, never both.

use crate::ast::{
    BoolOp, CompareOp, Depth, Direction, ExpandClause, Expr, OrderTerm, Query, Value,
};
use crate::error::ParseError;
use crate::lexer::{Lexer, Token, TokenKind};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    peek: Token,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        let peek = lexer.next_token();
        Parser {
            lexer,
            current,
            peek,
        }
    }

    /// Parse a query string into an AST.
    pub fn parse(input: &str) -> Result<Query, ParseError> {
        Parser::new(input).parse_query()
    }

    fn parse_query(&mut self) -> Result<Query, ParseError> {
        let mut query = Query::default();

        if !matches!(
            self.current.kind,
            TokenKind::Eof | TokenKind::Expand | TokenKind::Order
        ) {
            query.filter = Some(self.parse_expression()?);
        }
        if self.current.kind == TokenKind::Expand {
            query.expand = Some(self.parse_expand()?);
        }
        if self.current.kind == TokenKind::Order {
            query.order_by = self.parse_order_by()?;
        }
        if self.current.kind != TokenKind::Eof {
            return Err(self.error("unexpected token"));
        }

        Ok(query)
    }

    /// OR expression (lowest precedence)
    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;

        while self.current.kind == TokenKind::Or {
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Binary {
                left: Box::new(left),
                op: BoolOp::Or,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// AND expression (middle precedence)
    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_factor()?;

        while self.current.kind == TokenKind::And {
            self.advance();
            let right = self.parse_factor()?;
            left = Expr::Binary {
                left: Box::new(left),
                op: BoolOp::And,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// NOT, parentheses, and comparisons (highest precedence)
    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        match self.current.kind {
            TokenKind::Not => {
                self.advance();
                let inner = self.parse_factor()?;
                Ok(Expr::Not(Box::new(inner)))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                if self.current.kind != TokenKind::RParen {
                    return Err(self.error("expected closing parenthesis"));
                }
                self.advance();
                Ok(expr)
            }
            _ => self.parse_comparison(),
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        if self.current.kind != TokenKind::Ident {
            return Err(self.error("expected field name"));
        }
        let field = self.current.literal.to_ascii_lowercase();
        self.advance();

        if let Some(op) = compare_op(self.current.kind) {
            self.advance();
            let value = self.parse_value()?;
            return Ok(Expr::Compare { field, op, value });
        }

        let negated = if self.current.kind == TokenKind::Not && self.peek.kind == TokenKind::In {
            self.advance();
            true
        } else {
            false
        };
        if self.current.kind != TokenKind::In {
            return Err(self.error("expected comparison operator or IN"));
        }
        self.advance();

        let values = self.parse_value_list()?;
        Ok(Expr::In {
            field,
            values,
            negated,
        })
    }

    fn parse_value_list(&mut self) -> Result<Vec<Value>, ParseError> {
        if self.current.kind != TokenKind::LParen {
            return Err(self.error("expected '(' after IN"));
        }
        self.advance();

        let mut values = vec![self.parse_value()?];
        while self.current.kind == TokenKind::Comma {
            self.advance();
            values.push(self.parse_value()?);
        }

        if self.current.kind != TokenKind::RParen {
            return Err(self.error("expected ')' after IN list"));
        }
        self.advance();
        Ok(values)
    }

    fn parse_value(&mut self) -> Result<Value, ParseError> {
        let value = match self.current.kind {
            TokenKind::Str => Value::String {
                raw: self.current.literal.clone(),
            },
            TokenKind::True => Value::Bool {
                raw: self.current.literal.clone(),
                value: true,
            },
            TokenKind::False => Value::Bool {
                raw: self.current.literal.clone(),
                value: false,
            },
            TokenKind::Number => self.classify_number()?,
            TokenKind::Ident => classify_ident(&self.current.literal),
            _ => return Err(self.error("expected value")),
        };
        self.advance();
        Ok(value)
    }

    /// A number with a `d|h|m` unit suffix is a relative date; anything
    /// else must parse as a plain integer.
    fn classify_number(&self) -> Result<Value, ParseError> {
        let raw = self.current.literal.clone();
        if raw
            .chars()
            .last()
            .is_some_and(|ch| matches!(ch.to_ascii_lowercase(), 'd' | 'h' | 'm'))
        {
            let normalized = raw.to_ascii_lowercase();
            return Ok(Value::Date { raw, normalized });
        }
        let value: i64 = raw
            .parse()
            .map_err(|_| self.error("invalid integer literal"))?;
        Ok(Value::Int { raw, value })
    }

    fn parse_expand(&mut self) -> Result<ExpandClause, ParseError> {
        // current is the EXPAND keyword
        self.advance();

        if self.current.kind != TokenKind::Ident {
            return Err(self.error("expected expand direction"));
        }
        let direction = direction_for(&self.current.literal).ok_or_else(|| {
            self.error(
                "unknown expand direction (expected one of: up, down, all, \
                 blockers, parents, upstream, children, blocks, downstream, deps, both)",
            )
        })?;
        self.advance();

        let mut depth = Depth::default();
        if self.current.kind == TokenKind::Depth {
            self.advance();
            depth = match self.current.kind {
                TokenKind::Star => Depth::Unlimited,
                TokenKind::Number => {
                    let n: u32 = self
                        .current
                        .literal
                        .parse()
                        .map_err(|_| self.error("depth must be an integer between 1 and 10"))?;
                    if !(1..=10).contains(&n) {
                        return Err(self.error("depth must be between 1 and 10"));
                    }
                    Depth::Levels(n)
                }
                _ => return Err(self.error("expected depth value (1-10 or *)")),
            };
            self.advance();
        }

        Ok(ExpandClause { direction, depth })
    }

    fn parse_order_by(&mut self) -> Result<Vec<OrderTerm>, ParseError> {
        // current is the ORDER keyword
        self.advance();
        if self.current.kind != TokenKind::By {
            return Err(self.error("expected BY after ORDER"));
        }
        self.advance();

        let mut terms = Vec::new();
        loop {
            if self.current.kind != TokenKind::Ident {
                return Err(self.error("expected field name in ORDER BY"));
            }
            let field = self.current.literal.to_ascii_lowercase();
            self.advance();

            let mut descending = false;
            match self.current.kind {
                TokenKind::Asc => self.advance(),
                TokenKind::Desc => {
                    descending = true;
                    self.advance();
                }
                _ => {}
            }
            terms.push(OrderTerm { field, descending });

            if self.current.kind != TokenKind::Comma {
                return Ok(terms);
            }
            self.advance();
        }
    }

    fn advance(&mut self) {
        self.current = std::mem::replace(&mut self.peek, self.lexer.next_token());
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError {
            message: message.to_string(),
            token: self.current.literal.clone(),
            position: self.current.position,
        }
    }
}

fn compare_op(kind: TokenKind) -> Option<CompareOp> {
    match kind {
        TokenKind::Eq => Some(CompareOp::Eq),
        TokenKind::NotEq => Some(CompareOp::NotEq),
        TokenKind::Lt => Some(CompareOp::Lt),
        TokenKind::Gt => Some(CompareOp::Gt),
        TokenKind::LtEq => Some(CompareOp::LtEq),
        TokenKind::GtEq => Some(CompareOp::GtEq),
        TokenKind::Contains => Some(CompareOp::Contains),
        TokenKind::NotContains => Some(CompareOp::NotContains),
        _ => None,
    }
}

/// Classify a bare identifier at value position: `P0`..`P4` is a priority,
/// `today`/`yesterday` a date, anything else a plain string.
fn classify_ident(literal: &str) -> Value {
    let lower = literal.to_ascii_lowercase();
    if lower.len() == 2 && lower.starts_with('p') {
        if let Some(level) = lower[1..].parse::<u8>().ok().filter(|l| *l <= 4) {
            return Value::Priority {
                raw: literal.to_string(),
                level,
            };
        }
    }
    if lower == "today" || lower == "yesterday" {
        return Value::Date {
            raw: literal.to_string(),
            normalized: lower,
        };
    }
    Value::String {
        raw: literal.to_string(),
    }
}

/// Map a direction word onto the graph traversal model. "children",
/// "blocks" and "downstream" walk reverse edges; "blockers", "parents" and
/// "upstream" walk forward edges; "all" and "deps" walk both.
fn direction_for(word: &str) -> Option<Direction> {
    match word.to_ascii_lowercase().as_str() {
        "up" | "blockers" | "parent" | "parents" | "upstream" => Some(Direction::Up),
        "down" | "children" | "blocks" | "downstream" => Some(Direction::Down),
        "all" | "deps" | "both" => Some(Direction::All),
        _ => None,
    }
}
