#[cfg(test)]
mod test;

pub mod punctuator;
pub mod token;

pub use punctuator::Punctuator;

use bolt_diagnostic::TextLoc;
use num_bigint::BigInt;
use std::{rc::Rc, str::Chars};
use token::{Data, Keyword, Token};

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_operator_char(c: char) -> bool {
    matches!(
        c,
        '+' | '-' | '*' | '/' | '%' | '^' | '&' | '|' | '<' | '>' | '!' | '?' | '@' | '$' | '='
    )
}

/// The raw scanner. Whitespace and `#` comments contribute only to
/// positions; every other character becomes part of a [`Token`].
pub struct Lexer<'input> {
    loc: TextLoc,
    current: Option<char>,
    input: Chars<'input>,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &str) -> Lexer {
        let mut input = input.chars();
        Lexer {
            loc: TextLoc::new(1, 1),
            current: input.next(),
            input,
        }
    }

    fn consume(&mut self) {
        if let Some(c) = self.current {
            if c == '\n' {
                self.loc.line += 1;
                self.loc.column = 1;
            } else {
                self.loc.column += 1;
            }
        }
        self.current = self.input.next();
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.current {
                Some(c) if c.is_whitespace() => self.consume(),
                Some('#') => {
                    while let Some(c) = self.current {
                        if c == '\n' {
                            break;
                        }
                        self.consume();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_ident(&mut self, first: char) -> Data {
        let mut ident = String::new();
        ident.push(first);
        while let Some(c) = self.current {
            if !is_ident_continue(c) {
                break;
            }
            self.consume();
            ident.push(c);
        }
        match Keyword::from_str(&ident) {
            Some(keyword) => Data::Keyword(keyword),
            None => {
                if first.is_uppercase() {
                    Data::IdentifierAlt(Rc::from(ident))
                } else {
                    Data::Identifier(Rc::from(ident))
                }
            }
        }
    }

    fn scan_integer(&mut self, first: char) -> Data {
        let mut digits = String::new();
        digits.push(first);
        while let Some(c) = self.current {
            if !c.is_ascii_digit() {
                break;
            }
            self.consume();
            digits.push(c);
        }
        let value = BigInt::parse_bytes(digits.as_bytes(), 10).unwrap();
        Data::IntegerLiteral(value)
    }

    fn scan_operator(&mut self, first: char) -> Data {
        let mut text = String::new();
        text.push(first);
        while let Some(c) = self.current {
            if !is_operator_char(c) {
                break;
            }
            self.consume();
            text.push(c);
        }
        match text.as_str() {
            "=" => Data::Equals,
            "->" => Data::RArrow,
            "=>" => Data::RArrowAlt,
            "==" | ">=" | "<=" | "/=" => Data::CustomOperator(Rc::from(text)),
            _ => {
                if text.ends_with('=') {
                    Data::Assignment(Rc::from(text))
                } else {
                    Data::CustomOperator(Rc::from(text))
                }
            }
        }
    }

    /// Scan the remainder of a string literal; the opening quote has been
    /// consumed. On a missing closing quote or a bad escape, the offending
    /// character becomes an [`Data::Invalid`] token.
    fn scan_string(&mut self) -> Data {
        let mut raw = String::from("\"");
        let mut value = String::new();
        loop {
            match self.current {
                None => return Data::Invalid('"'),
                Some('"') => {
                    self.consume();
                    raw.push('"');
                    return Data::StringLiteral {
                        value,
                        raw: Rc::from(raw),
                    };
                }
                Some('\\') => {
                    self.consume();
                    raw.push('\\');
                    match self.current {
                        Some(c @ ('\\' | '"')) => {
                            self.consume();
                            raw.push(c);
                            value.push(c);
                        }
                        Some('n') => {
                            self.consume();
                            raw.push('n');
                            value.push('\n');
                        }
                        Some('t') => {
                            self.consume();
                            raw.push('t');
                            value.push('\t');
                        }
                        _ => return Data::Invalid('\\'),
                    }
                }
                Some(c) => {
                    self.consume();
                    raw.push(c);
                    value.push(c);
                }
            }
        }
    }
}

impl<'input> Iterator for Lexer<'input> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.skip_trivia();
        let start = self.loc;
        let c = self.current?;
        self.consume();
        let data = match c {
            '(' => Data::LParen,
            ')' => Data::RParen,
            '[' => Data::LBracket,
            ']' => Data::RBracket,
            '{' => Data::LBrace,
            '}' => Data::RBrace,
            ',' => Data::Comma,
            ':' => Data::Colon,
            '~' => Data::Tilde,
            '.' => match self.current {
                Some('.') => {
                    self.consume();
                    Data::DotDot
                }
                _ => Data::Dot,
            },
            '"' => self.scan_string(),
            _ if is_ident_start(c) => self.scan_ident(c),
            _ if c.is_ascii_digit() => self.scan_integer(c),
            _ if is_operator_char(c) => self.scan_operator(c),
            _ => Data::Invalid(c),
        };
        Some(Token::new(start, data))
    }
}
