//! Query Lexer
//!
//! Tokenizes query text up front so the parser can look ahead freely.

use crate::error::{Error, Result};

/// Query token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Operators
    Slash,       // /
    DoubleSlash, // //
    Dot,         // .
    DoubleDot,   // ..
    At,          // @
    Pipe,        // |
    Plus,        // +
    Minus,       // -
    Star,        // *
    Eq,          // =
    NotEq,       // !=
    Lt,          // <
    LtEq,        // <=
    Gt,          // >
    GtEq,        // >=
    And,         // and
    Or,          // or
    Mod,         // mod
    Div,         // div

    // Brackets
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,

    // Literals
    Number(f64),
    String(String),

    /// NCName or `prefix:local`
    Name(String),
    /// `prefix:*`
    PrefixWildcard(String),
    /// `child::`, `descendant::`, ... (the `::` is consumed)
    Axis(String),

    Comma,
    Dollar,
}

/// Query lexer
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.remaining().chars().nth(offset)
    }

    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    fn error(&self, message: impl std::fmt::Display) -> Error {
        Error::Query(format!("{} at offset {}", message, self.pos))
    }

    /// Skip whitespace and `(: ... :)` comments
    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
                self.advance(c.len_utf8());
            }
            if !self.remaining().starts_with("(:") {
                return Ok(());
            }
            match self.remaining().find(":)") {
                Some(end) => self.advance(end + 2),
                None => return Err(self.error("unterminated comment")),
            }
        }
    }

    /// Tokenize the whole input
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_trivia()?;

        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let single = |lexer: &mut Self, token: Token| {
            lexer.advance(1);
            token
        };

        let token = match c {
            '/' if self.peek_at(1) == Some('/') => {
                self.advance(2);
                Token::DoubleSlash
            }
            '/' => single(self, Token::Slash),
            '.' if self.peek_at(1) == Some('.') => {
                self.advance(2);
                Token::DoubleDot
            }
            '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.read_number(),
            '.' => single(self, Token::Dot),
            '@' => single(self, Token::At),
            '|' => single(self, Token::Pipe),
            '+' => single(self, Token::Plus),
            '-' => single(self, Token::Minus),
            '*' => single(self, Token::Star),
            '=' => single(self, Token::Eq),
            '!' if self.peek_at(1) == Some('=') => {
                self.advance(2);
                Token::NotEq
            }
            '<' if self.peek_at(1) == Some('=') => {
                self.advance(2);
                Token::LtEq
            }
            '<' => single(self, Token::Lt),
            '>' if self.peek_at(1) == Some('=') => {
                self.advance(2);
                Token::GtEq
            }
            '>' => single(self, Token::Gt),
            '(' => single(self, Token::LeftParen),
            ')' => single(self, Token::RightParen),
            '[' => single(self, Token::LeftBracket),
            ']' => single(self, Token::RightBracket),
            ',' => single(self, Token::Comma),
            '$' => single(self, Token::Dollar),
            '"' | '\'' => self.read_string(c)?,
            '0'..='9' => self.read_number(),
            _ if is_name_start_char(c) => self.read_name_or_keyword()?,
            _ => return Err(self.error(format!("unexpected character `{}`", c))),
        };
        Ok(Some(token))
    }

    fn read_number(&mut self) -> Token {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance(1);
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance(1);
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance(1);
            }
        }
        Token::Number(self.input[start..self.pos].parse().unwrap_or(f64::NAN))
    }

    /// String literal; a doubled quote stands for one quote character
    fn read_string(&mut self, quote: char) -> Result<Token> {
        let opened_at = self.pos;
        self.advance(1);
        let mut value = String::new();
        loop {
            match self.peek() {
                Some(c) if c == quote && self.peek_at(1) == Some(quote) => {
                    value.push(quote);
                    self.advance(2);
                }
                Some(c) if c == quote => {
                    self.advance(1);
                    return Ok(Token::String(value));
                }
                Some(c) => {
                    value.push(c);
                    self.advance(c.len_utf8());
                }
                None => {
                    return Err(Error::Query(format!("unterminated string literal at offset {}", opened_at)));
                }
            }
        }
    }

    fn read_ncname(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek().filter(|c| is_name_char(*c)) {
            self.advance(c.len_utf8());
        }
        &self.input[start..self.pos]
    }

    fn read_name_or_keyword(&mut self) -> Result<Token> {
        let name = self.read_ncname();

        match name {
            "and" => return Ok(Token::And),
            "or" => return Ok(Token::Or),
            "mod" => return Ok(Token::Mod),
            "div" => return Ok(Token::Div),
            _ => {}
        }

        if self.remaining().starts_with("::") {
            self.advance(2);
            return Ok(Token::Axis(name.to_string()));
        }

        if self.peek() == Some(':') {
            match self.peek_at(1) {
                Some('*') => {
                    self.advance(2);
                    return Ok(Token::PrefixWildcard(name.to_string()));
                }
                Some(c) if is_name_start_char(c) => {
                    self.advance(1);
                    let local = self.read_ncname();
                    return Ok(Token::Name(format!("{}:{}", name, local)));
                }
                _ => return Err(self.error(format!("incomplete qualified name `{}:`", name))),
            }
        }

        Ok(Token::Name(name.to_string()))
    }
}

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

/// Tokenize query text
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    Lexer::new(input).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Token {
        Token::Name(s.to_string())
    }

    #[test]
    fn test_simple_path() {
        assert_eq!(
            tokenize("/root//child").unwrap(),
            vec![Token::Slash, name("root"), Token::DoubleSlash, name("child")]
        );
    }

    #[test]
    fn test_predicate() {
        assert_eq!(
            tokenize("item[@id != 'a''b']").unwrap(),
            vec![
                name("item"),
                Token::LeftBracket,
                Token::At,
                name("id"),
                Token::NotEq,
                Token::String("a'b".to_string()),
                Token::RightBracket,
            ]
        );
    }

    #[test]
    fn test_prefixed_names_and_axes() {
        assert!(tokenize("descendant :: x").is_err());
        assert_eq!(
            tokenize("range:starts-with(mods:*, descendant::x)").unwrap(),
            vec![
                name("range:starts-with"),
                Token::LeftParen,
                Token::PrefixWildcard("mods".to_string()),
                Token::Comma,
                Token::Axis("descendant".to_string()),
                name("x"),
                Token::RightParen,
            ]
        );
    }

    #[test]
    fn test_numbers_and_comments() {
        assert_eq!(
            tokenize("(: note :) .5 + 10.25").unwrap(),
            vec![Token::Number(0.5), Token::Plus, Token::Number(10.25)]
        );
    }

    #[test]
    fn test_errors() {
        assert!(matches!(tokenize("'open"), Err(Error::Query(_))));
        assert!(matches!(tokenize("a # b"), Err(Error::Query(_))));
        assert!(matches!(tokenize("(: open"), Err(Error::Query(_))));
    }
}
