//! Lexical analysis for the query language.
//!
//! Converts raw query text into tokens. The lexer itself never fails:
//! unrecognized characters become `Illegal` tokens and unterminated strings
//! consume to end of input, so all error reporting happens in the parser
//! with token positions attached.

/// Token kinds in the query language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Field name, bare value, or expand direction word
    Ident,
    /// Integer, optionally signed, optionally with a `d|h|m` unit suffix
    Number,
    /// Quoted string (quotes stripped)
    Str,
    /// Unrecognized character
    Illegal,
    /// End of input
    Eof,

    LParen,
    RParen,
    Comma,
    /// `*` (unlimited depth)
    Star,

    /// `=`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,
    /// `~` (contains)
    Contains,
    /// `!~` (not contains)
    NotContains,

    And,
    Or,
    Not,
    In,
    Order,
    By,
    Asc,
    Desc,
    Expand,
    Depth,
    True,
    False,
}

impl TokenKind {
    /// True for the six comparison operators plus contains/not-contains.
    pub fn is_comparison_op(&self) -> bool {
        matches!(
            self,
            TokenKind::Eq
                | TokenKind::NotEq
                | TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::LtEq
                | TokenKind::GtEq
                | TokenKind::Contains
                | TokenKind::NotContains
        )
    }
}

/// A token with its literal text and byte offset in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub position: usize,
}

impl Token {
    fn new(kind: TokenKind, literal: impl Into<String>, position: usize) -> Self {
        Token {
            kind,
            literal: literal.into(),
            position,
        }
    }
}

/// Lexer over a query string.
///
/// `position` is always a byte offset on a character boundary.
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// Tokenize the entire input, excluding the trailing Eof token.
    pub fn tokenize(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            if token.kind == TokenKind::Eof {
                return tokens;
            }
            tokens.push(token);
        }
    }

    /// Produce the next token; returns an Eof token at end of input.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start = self.position;
        let ch = match self.current_char() {
            Some(ch) => ch,
            None => return Token::new(TokenKind::Eof, "", start),
        };

        match ch {
            '(' => self.single(TokenKind::LParen, start),
            ')' => self.single(TokenKind::RParen, start),
            ',' => self.single(TokenKind::Comma, start),
            '*' => self.single(TokenKind::Star, start),
            '~' => self.single(TokenKind::Contains, start),
            '=' => self.single(TokenKind::Eq, start),
            '!' => {
                self.advance();
                match self.current_char() {
                    Some('=') => {
                        self.advance();
                        Token::new(TokenKind::NotEq, "!=", start)
                    }
                    Some('~') => {
                        self.advance();
                        Token::new(TokenKind::NotContains, "!~", start)
                    }
                    _ => Token::new(TokenKind::Illegal, "!", start),
                }
            }
            '<' => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.advance();
                    Token::new(TokenKind::LtEq, "<=", start)
                } else {
                    Token::new(TokenKind::Lt, "<", start)
                }
            }
            '>' => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.advance();
                    Token::new(TokenKind::GtEq, ">=", start)
                } else {
                    Token::new(TokenKind::Gt, ">", start)
                }
            }
            '\'' | '"' => self.read_string(ch, start),
            '-' | '+' if self.peek_is_digit() => self.read_number(start),
            _ if ch.is_ascii_digit() => self.read_number(start),
            _ if is_ident_start(ch) => self.read_identifier(start),
            _ => {
                self.advance();
                Token::new(TokenKind::Illegal, ch.to_string(), start)
            }
        }
    }

    fn single(&mut self, kind: TokenKind, start: usize) -> Token {
        let literal = &self.input[start..start + 1];
        self.advance();
        Token::new(kind, literal, start)
    }

    /// Quoted string; an unterminated string runs to end of input.
    fn read_string(&mut self, quote: char, start: usize) -> Token {
        self.advance();
        let content_start = self.position;
        while let Some(ch) = self.current_char() {
            if ch == quote {
                let literal = &self.input[content_start..self.position];
                self.advance();
                return Token::new(TokenKind::Str, literal, start);
            }
            self.advance();
        }
        Token::new(TokenKind::Str, &self.input[content_start..], start)
    }

    /// Optionally signed digits, with a trailing `d|h|m` unit letter
    /// consumed into the same token (`-7d`, `-24h`, `-3m`).
    fn read_number(&mut self, start: usize) -> Token {
        if matches!(self.current_char(), Some('-') | Some('+')) {
            self.advance();
        }
        while matches!(self.current_char(), Some(ch) if ch.is_ascii_digit()) {
            self.advance();
        }
        if matches!(self.current_char(), Some(ch) if matches!(ch.to_ascii_lowercase(), 'd' | 'h' | 'm'))
        {
            self.advance();
        }
        Token::new(TokenKind::Number, &self.input[start..self.position], start)
    }

    /// Identifier: letters, digits, `_`, `-` (allows hyphenated IDs such as
    /// `perles-123`). Keywords are reclassified case-insensitively.
    fn read_identifier(&mut self, start: usize) -> Token {
        while matches!(self.current_char(), Some(ch) if is_ident_char(ch)) {
            self.advance();
        }
        let literal = &self.input[start..self.position];
        Token::new(keyword_kind(literal), literal, start)
    }

    fn peek_is_digit(&self) -> bool {
        let mut chars = self.input[self.position..].chars();
        chars.next();
        matches!(chars.next(), Some(ch) if ch.is_ascii_digit())
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current_char(), Some(ch) if ch.is_whitespace()) {
            self.advance();
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.position += ch.len_utf8();
        }
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'
}

fn keyword_kind(literal: &str) -> TokenKind {
    match literal.to_ascii_lowercase().as_str() {
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "in" => TokenKind::In,
        "order" => TokenKind::Order,
        "by" => TokenKind::By,
        "asc" => TokenKind::Asc,
        "desc" => TokenKind::Desc,
        "expand" => TokenKind::Expand,
        "depth" => TokenKind::Depth,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        _ => TokenKind::Ident,
    }
}
