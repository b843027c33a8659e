//! Formula tokenizer
//!
//! Turns formula source (leading `=` already stripped) into a flat token
//! stream in a single left-to-right scan.

use crate::ast::ExternalReference;
use crate::error::{FormulaError, FormulaResult};
use lazy_regex::regex_is_match;
use std::fmt;

/// Formula tokens
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),

    // References and names
    /// Cell reference like A1 (stored uppercase)
    Cell(String),
    /// Function name
    Identifier(String),
    /// External page reference `@[Label](id:type)`
    Page(ExternalReference),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Delimiters
    LeftParen,
    RightParen,
    Comma,
    Colon,
}

impl Token {
    /// Whether this token can be the last token of an operand
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            Token::Number(_)
                | Token::String(_)
                | Token::Boolean(_)
                | Token::Cell(_)
                | Token::Identifier(_)
                | Token::Page(_)
                | Token::RightParen
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Boolean(true) => f.write_str("TRUE"),
            Token::Boolean(false) => f.write_str("FALSE"),
            Token::Cell(s) | Token::Identifier(s) => f.write_str(s),
            Token::Page(r) => f.write_str(&r.raw),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Caret => f.write_str("^"),
            Token::Ampersand => f.write_str("&"),
            Token::Equal => f.write_str("="),
            Token::NotEqual => f.write_str("<>"),
            Token::LessThan => f.write_str("<"),
            Token::LessEqual => f.write_str("<="),
            Token::GreaterThan => f.write_str(">"),
            Token::GreaterEqual => f.write_str(">="),
            Token::LeftParen => f.write_str("("),
            Token::RightParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
            Token::Colon => f.write_str(":"),
        }
    }
}

/// Tokenize formula source (without the leading `=`)
///
/// # Example
/// ```rust
/// use gridbook_formula::{tokenize, Token};
///
/// let tokens = tokenize("A1-3").unwrap();
/// assert_eq!(tokens, vec![Token::Cell("A1".into()), Token::Minus, Token::Number(3.0)]);
///
/// let tokens = tokenize("-3*2").unwrap();
/// assert_eq!(tokens[0], Token::Number(-3.0));
/// ```
pub fn tokenize(source: &str) -> FormulaResult<Vec<Token>> {
    let mut tokenizer = Tokenizer {
        input: source,
        pos: 0,
        tokens: Vec::new(),
    };
    tokenizer.run()?;
    Ok(tokenizer.tokens)
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Tokenizer<'a> {
    fn run(&mut self) -> FormulaResult<()> {
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek_char() else {
                return Ok(());
            };
            let token = self.scan_token(c)?;
            self.tokens.push(token);
        }
    }

    fn scan_token(&mut self, c: char) -> FormulaResult<Token> {
        // Single-character tokens
        let single = match c {
            '+' => Some(Token::Plus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '&' => Some(Token::Ampersand),
            '=' => Some(Token::Equal),
            ',' => Some(Token::Comma),
            ':' => Some(Token::Colon),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        // Two-character operators first
        if c == '<' {
            self.advance();
            return Ok(match self.peek_char() {
                Some('=') => {
                    self.advance();
                    Token::LessEqual
                }
                Some('>') => {
                    self.advance();
                    Token::NotEqual
                }
                _ => Token::LessThan,
            });
        }

        if c == '>' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Ok(Token::GreaterEqual);
            }
            return Ok(Token::GreaterThan);
        }

        if c == '-' {
            // Fold the sign into a number only where no operand precedes it
            let after = self.peek_char_at(1);
            let starts_number = after.map_or(false, |d| d.is_ascii_digit())
                || (after == Some('.')
                    && self.peek_char_at(2).map_or(false, |d| d.is_ascii_digit()));
            let operand_before = self.tokens.last().map_or(false, Token::ends_operand);
            if starts_number && !operand_before {
                return self.scan_number();
            }
            self.advance();
            return Ok(Token::Minus);
        }

        if c == '"' {
            return self.scan_string();
        }

        if c == '@' {
            return self.scan_page_reference();
        }

        if c.is_ascii_digit()
            || (c == '.' && self.peek_char_at(1).map_or(false, |d| d.is_ascii_digit()))
        {
            return self.scan_number();
        }

        if c.is_ascii_alphabetic() || c == '_' {
            return Ok(self.scan_word());
        }

        Err(FormulaError::Tokenize(format!(
            "Unexpected character '{}' at position {}",
            c, self.pos
        )))
    }

    fn scan_string(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance(); // opening quote

        let content_start = self.pos;
        while let Some(c) = self.peek_char() {
            if c == '"' {
                let text = self.input[content_start..self.pos].to_string();
                self.advance();
                return Ok(Token::String(text));
            }
            self.advance();
        }

        Err(FormulaError::Tokenize(format!(
            "Unterminated string literal starting at position {}",
            start
        )))
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let start = self.pos;

        if self.peek_char() == Some('-') {
            self.advance();
        }

        // Integer part
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        // Decimal part
        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text = &self.input[start..self.pos];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| FormulaError::Tokenize(format!("Invalid number '{}'", text)))
    }

    fn scan_word(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            self.advance();
        }

        let text = &self.input[start..self.pos];
        let upper = text.to_ascii_uppercase();
        // Followed by '(' means a function call, e.g. LOG10(100) or TRUE()
        let is_call = self.peek_char() == Some('(');

        if !is_call {
            if upper == "TRUE" {
                return Token::Boolean(true);
            }
            if upper == "FALSE" {
                return Token::Boolean(false);
            }
            if regex_is_match!(r"^[A-Z]+[0-9]+$", &upper) {
                return Token::Cell(upper);
            }
        }

        Token::Identifier(text.to_string())
    }

    /// `@[Label]` optionally followed by `(identifier[:mentionType])`
    fn scan_page_reference(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance(); // '@'

        if self.peek_char() != Some('[') {
            return Err(FormulaError::Tokenize(format!(
                "Unexpected character '@' at position {}",
                start
            )));
        }
        self.advance();

        let label_start = self.pos;
        let label_end = self.find_char(']').ok_or_else(|| {
            FormulaError::Tokenize(format!(
                "Unterminated external reference label at position {}",
                start
            ))
        })?;
        let label = self.input[label_start..label_end].to_string();
        self.pos = label_end + 1;

        let mut identifier = None;
        let mut mention_type = None;
        if self.peek_char() == Some('(') {
            self.advance();
            let group_start = self.pos;
            let group_end = self.find_char(')').ok_or_else(|| {
                FormulaError::Tokenize(format!(
                    "Unterminated external reference identifier at position {}",
                    start
                ))
            })?;
            let group = &self.input[group_start..group_end];
            self.pos = group_end + 1;

            let (id, kind) = match group.split_once(':') {
                Some((id, kind)) => (id, Some(kind)),
                None => (group, None),
            };
            let id = id.trim();
            if !id.is_empty() {
                identifier = Some(id.to_string());
            }
            mention_type = kind
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string);
        }

        Ok(Token::Page(ExternalReference {
            raw: self.input[start..self.pos].to_string(),
            label,
            identifier,
            mention_type,
        }))
    }

    // === Helper methods ===

    fn find_char(&self, target: char) -> Option<usize> {
        self.input[self.pos..].find(target).map(|i| self.pos + i)
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tokenize_arithmetic() {
        assert_eq!(
            tokenize("1 + 2.5*.5").unwrap(),
            vec![
                Token::Number(1.0),
                Token::Plus,
                Token::Number(2.5),
                Token::Star,
                Token::Number(0.5)
            ]
        );
    }

    #[test]
    fn test_tokenize_negative_numbers() {
        assert_eq!(tokenize("-5").unwrap(), vec![Token::Number(-5.0)]);
        assert_eq!(
            tokenize("2^-1").unwrap(),
            vec![Token::Number(2.0), Token::Caret, Token::Number(-1.0)]
        );
        assert_eq!(
            tokenize("SUM(-1,-2)").unwrap(),
            vec![
                Token::Identifier("SUM".into()),
                Token::LeftParen,
                Token::Number(-1.0),
                Token::Comma,
                Token::Number(-2.0),
                Token::RightParen
            ]
        );
        // After an operand the minus is an operator
        assert_eq!(
            tokenize("(1)-2").unwrap(),
            vec![
                Token::LeftParen,
                Token::Number(1.0),
                Token::RightParen,
                Token::Minus,
                Token::Number(2.0)
            ]
        );
        assert_eq!(tokenize("-A1").unwrap(), vec![Token::Minus, Token::Cell("A1".into())]);
    }

    #[test]
    fn test_tokenize_operators() {
        assert_eq!(
            tokenize("<= >= <> < > = &").unwrap(),
            vec![
                Token::LessEqual,
                Token::GreaterEqual,
                Token::NotEqual,
                Token::LessThan,
                Token::GreaterThan,
                Token::Equal,
                Token::Ampersand
            ]
        );
    }

    #[test]
    fn test_tokenize_words() {
        assert_eq!(
            tokenize("true False b2 sum(x_1)").unwrap(),
            vec![
                Token::Boolean(true),
                Token::Boolean(false),
                Token::Cell("B2".into()),
                Token::Identifier("sum".into()),
                Token::LeftParen,
                Token::Identifier("x_1".into()),
                Token::RightParen
            ]
        );
        // Cell-like names followed by '(' are functions
        assert_eq!(tokenize("LOG10(1)").unwrap()[0], Token::Identifier("LOG10".into()));
        assert_eq!(tokenize("TRUE()").unwrap()[0], Token::Identifier("TRUE".into()));
    }

    #[test]
    fn test_tokenize_strings() {
        assert_eq!(
            tokenize("\"a b\"&\"\"").unwrap(),
            vec![
                Token::String("a b".into()),
                Token::Ampersand,
                Token::String(String::new())
            ]
        );
        assert!(matches!(tokenize("\"abc"), Err(FormulaError::Tokenize(_))));
    }

    #[test]
    fn test_tokenize_page_reference() {
        let tokens = tokenize("@[Other Page](page2:page):A1").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Page(ExternalReference {
                    raw: "@[Other Page](page2:page)".into(),
                    label: "Other Page".into(),
                    identifier: Some("page2".into()),
                    mention_type: Some("page".into()),
                }),
                Token::Colon,
                Token::Cell("A1".into())
            ]
        );

        let tokens = tokenize("@[Budget]:B2").unwrap();
        match &tokens[0] {
            Token::Page(r) => {
                assert_eq!(r.raw, "@[Budget]");
                assert_eq!(r.identifier, None);
            }
            other => panic!("expected page token, got {:?}", other),
        }
    }

    #[test]
    fn test_tokenize_page_reference_errors() {
        let err = tokenize("@[Budget").unwrap_err();
        assert!(err.to_string().contains("Unterminated external reference label"));
        let err = tokenize("@[Budget](p1").unwrap_err();
        assert!(err.to_string().contains("Unterminated external reference identifier"));
        assert!(tokenize("@A1").is_err());
    }

    #[test]
    fn test_tokenize_unknown_character() {
        let err = tokenize("1 # 2").unwrap_err();
        assert_eq!(err.to_string(), "Unexpected character '#' at position 2");
    }
}
