mod test;

use bolt_diagnostic::TextLoc;
use num_bigint::BigInt;
use quickcheck::Arbitrary;
use std::rc::Rc;

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub enum Keyword {
    Let,
    Mut,
    Pub,
    Type,
    Return,
    Mod,
    Struct,
    Enum,
    Class,
    Instance,
    If,
    Elif,
    Else,
    Match,
}

impl Arbitrary for Keyword {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        *g.choose(&[
            Keyword::Let,
            Keyword::Mut,
            Keyword::Pub,
            Keyword::Type,
            Keyword::Return,
            Keyword::Mod,
            Keyword::Struct,
            Keyword::Enum,
            Keyword::Class,
            Keyword::Instance,
            Keyword::If,
            Keyword::Elif,
            Keyword::Else,
            Keyword::Match,
        ])
        .unwrap()
    }
}

impl Keyword {
    pub fn num_variants() -> usize {
        14
    }

    pub fn to_int(&self) -> usize {
        match self {
            Keyword::Let => 0,
            Keyword::Mut => 1,
            Keyword::Pub => 2,
            Keyword::Type => 3,
            Keyword::Return => 4,
            Keyword::Mod => 5,
            Keyword::Struct => 6,
            Keyword::Enum => 7,
            Keyword::Class => 8,
            Keyword::Instance => 9,
            Keyword::If => 10,
            Keyword::Elif => 11,
            Keyword::Else => 12,
            Keyword::Match => 13,
        }
    }

    pub fn from_int(ix: usize) -> Option<Self> {
        match ix {
            0 => Some(Keyword::Let),
            1 => Some(Keyword::Mut),
            2 => Some(Keyword::Pub),
            3 => Some(Keyword::Type),
            4 => Some(Keyword::Return),
            5 => Some(Keyword::Mod),
            6 => Some(Keyword::Struct),
            7 => Some(Keyword::Enum),
            8 => Some(Keyword::Class),
            9 => Some(Keyword::Instance),
            10 => Some(Keyword::If),
            11 => Some(Keyword::Elif),
            12 => Some(Keyword::Else),
            13 => Some(Keyword::Match),
            _ => None,
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            Keyword::Let => "let",
            Keyword::Mut => "mut",
            Keyword::Pub => "pub",
            Keyword::Type => "type",
            Keyword::Return => "return",
            Keyword::Mod => "mod",
            Keyword::Struct => "struct",
            Keyword::Enum => "enum",
            Keyword::Class => "class",
            Keyword::Instance => "instance",
            Keyword::If => "if",
            Keyword::Elif => "elif",
            Keyword::Else => "else",
            Keyword::Match => "match",
        }
    }

    pub fn from_str(str: &str) -> Option<Self> {
        match str {
            "let" => Some(Keyword::Let),
            "mut" => Some(Keyword::Mut),
            "pub" => Some(Keyword::Pub),
            "type" => Some(Keyword::Type),
            "return" => Some(Keyword::Return),
            "mod" => Some(Keyword::Mod),
            "struct" => Some(Keyword::Struct),
            "enum" => Some(Keyword::Enum),
            "class" => Some(Keyword::Class),
            "instance" => Some(Keyword::Instance),
            "if" => Some(Keyword::If),
            "elif" => Some(Keyword::Elif),
            "else" => Some(Keyword::Else),
            "match" => Some(Keyword::Match),
            _ => None,
        }
    }
}

/// The payload-free name of a token kind. The parser's expectation sets are
/// sets of [`Name`]s, stored in a bitset via [`Name::to_int`].
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub enum Name {
    Equals,
    Colon,
    Comma,
    Dot,
    DotDot,
    Tilde,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    RArrow,
    RArrowAlt,
    Keyword(Keyword),
    Identifier,
    IdentifierAlt,
    IntegerLiteral,
    StringLiteral,
    CustomOperator,
    Assignment,
    Invalid,
    BlockStart,
    BlockEnd,
    LineFoldEnd,
    EndOfFile,
}

impl Arbitrary for Name {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        let vals = &[
            Name::Equals,
            Name::Colon,
            Name::Comma,
            Name::Dot,
            Name::DotDot,
            Name::Tilde,
            Name::LParen,
            Name::RParen,
            Name::LBracket,
            Name::RBracket,
            Name::LBrace,
            Name::RBrace,
            Name::RArrow,
            Name::RArrowAlt,
            Name::Keyword(Keyword::arbitrary(g)),
            Name::Identifier,
            Name::IdentifierAlt,
            Name::IntegerLiteral,
            Name::StringLiteral,
            Name::CustomOperator,
            Name::Assignment,
            Name::Invalid,
            Name::BlockStart,
            Name::BlockEnd,
            Name::LineFoldEnd,
            Name::EndOfFile,
        ];
        *g.choose(vals).unwrap()
    }
}

impl Name {
    pub fn num_variants() -> usize {
        25 + Keyword::num_variants()
    }

    pub fn to_int(&self) -> usize {
        match self {
            Name::Equals => 0,
            Name::Colon => 1,
            Name::Comma => 2,
            Name::Dot => 3,
            Name::DotDot => 4,
            Name::Tilde => 5,
            Name::LParen => 6,
            Name::RParen => 7,
            Name::LBracket => 8,
            Name::RBracket => 9,
            Name::LBrace => 10,
            Name::RBrace => 11,
            Name::RArrow => 12,
            Name::RArrowAlt => 13,
            Name::Keyword(keyword) => 14 + keyword.to_int(),
            Name::Identifier => 28,
            Name::IdentifierAlt => 29,
            Name::IntegerLiteral => 30,
            Name::StringLiteral => 31,
            Name::CustomOperator => 32,
            Name::Assignment => 33,
            Name::Invalid => 34,
            Name::BlockStart => 35,
            Name::BlockEnd => 36,
            Name::LineFoldEnd => 37,
            Name::EndOfFile => 38,
        }
    }

    pub fn from_int(ix: usize) -> Option<Self> {
        match ix {
            0 => Some(Name::Equals),
            1 => Some(Name::Colon),
            2 => Some(Name::Comma),
            3 => Some(Name::Dot),
            4 => Some(Name::DotDot),
            5 => Some(Name::Tilde),
            6 => Some(Name::LParen),
            7 => Some(Name::RParen),
            8 => Some(Name::LBracket),
            9 => Some(Name::RBracket),
            10 => Some(Name::LBrace),
            11 => Some(Name::RBrace),
            12 => Some(Name::RArrow),
            13 => Some(Name::RArrowAlt),
            ix if (14..28).contains(&ix) => Keyword::from_int(ix - 14).map(Name::Keyword),
            28 => Some(Name::Identifier),
            29 => Some(Name::IdentifierAlt),
            30 => Some(Name::IntegerLiteral),
            31 => Some(Name::StringLiteral),
            32 => Some(Name::CustomOperator),
            33 => Some(Name::Assignment),
            34 => Some(Name::Invalid),
            35 => Some(Name::BlockStart),
            36 => Some(Name::BlockEnd),
            37 => Some(Name::LineFoldEnd),
            38 => Some(Name::EndOfFile),
            _ => None,
        }
    }

    pub fn render(&self) -> String {
        match self {
            Name::Equals => String::from("'='"),
            Name::Colon => String::from("':'"),
            Name::Comma => String::from("','"),
            Name::Dot => String::from("'.'"),
            Name::DotDot => String::from("'..'"),
            Name::Tilde => String::from("'~'"),
            Name::LParen => String::from("'('"),
            Name::RParen => String::from("')'"),
            Name::LBracket => String::from("'['"),
            Name::RBracket => String::from("']'"),
            Name::LBrace => String::from("'{'"),
            Name::RBrace => String::from("'}'"),
            Name::RArrow => String::from("'->'"),
            Name::RArrowAlt => String::from("'=>'"),
            Name::Keyword(keyword) => format!("'{}'", keyword.to_str()),
            Name::Identifier => String::from("identifier"),
            Name::IdentifierAlt => String::from("constructor"),
            Name::IntegerLiteral => String::from("integer"),
            Name::StringLiteral => String::from("string"),
            Name::CustomOperator => String::from("operator"),
            Name::Assignment => String::from("assignment"),
            Name::Invalid => String::from("invalid character"),
            Name::BlockStart => String::from("start of block"),
            Name::BlockEnd => String::from("end of block"),
            Name::LineFoldEnd => String::from("end of line-fold"),
            Name::EndOfFile => String::from("end of file"),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Data {
    Equals,
    Colon,
    Comma,
    Dot,
    DotDot,
    Tilde,

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    RArrow,
    RArrowAlt,

    Keyword(Keyword),

    Identifier(Rc<str>),
    IdentifierAlt(Rc<str>),

    IntegerLiteral(BigInt),
    /// `raw` is the exact source text, quotes and escapes included, so that
    /// the end location of a literal spanning several lines stays correct.
    StringLiteral {
        value: String,
        raw: Rc<str>,
    },

    CustomOperator(Rc<str>),
    Assignment(Rc<str>),

    Invalid(char),

    BlockStart,
    BlockEnd,
    LineFoldEnd,
    EndOfFile,
}

impl Data {
    pub fn name(&self) -> Name {
        match self {
            Data::Equals => Name::Equals,
            Data::Colon => Name::Colon,
            Data::Comma => Name::Comma,
            Data::Dot => Name::Dot,
            Data::DotDot => Name::DotDot,
            Data::Tilde => Name::Tilde,
            Data::LParen => Name::LParen,
            Data::RParen => Name::RParen,
            Data::LBracket => Name::LBracket,
            Data::RBracket => Name::RBracket,
            Data::LBrace => Name::LBrace,
            Data::RBrace => Name::RBrace,
            Data::RArrow => Name::RArrow,
            Data::RArrowAlt => Name::RArrowAlt,
            Data::Keyword(keyword) => Name::Keyword(*keyword),
            Data::Identifier(_) => Name::Identifier,
            Data::IdentifierAlt(_) => Name::IdentifierAlt,
            Data::IntegerLiteral(_) => Name::IntegerLiteral,
            Data::StringLiteral { .. } => Name::StringLiteral,
            Data::CustomOperator(_) => Name::CustomOperator,
            Data::Assignment(_) => Name::Assignment,
            Data::Invalid(_) => Name::Invalid,
            Data::BlockStart => Name::BlockStart,
            Data::BlockEnd => Name::BlockEnd,
            Data::LineFoldEnd => Name::LineFoldEnd,
            Data::EndOfFile => Name::EndOfFile,
        }
    }

    /// The token's source text. Synthetic tokens render as the empty string.
    pub fn text(&self) -> String {
        match self {
            Data::Equals => String::from("="),
            Data::Colon => String::from(":"),
            Data::Comma => String::from(","),
            Data::Dot => String::from("."),
            Data::DotDot => String::from(".."),
            Data::Tilde => String::from("~"),
            Data::LParen => String::from("("),
            Data::RParen => String::from(")"),
            Data::LBracket => String::from("["),
            Data::RBracket => String::from("]"),
            Data::LBrace => String::from("{"),
            Data::RBrace => String::from("}"),
            Data::RArrow => String::from("->"),
            Data::RArrowAlt => String::from("=>"),
            Data::Keyword(keyword) => String::from(keyword.to_str()),
            Data::Identifier(name) => String::from(name.as_ref()),
            Data::IdentifierAlt(name) => String::from(name.as_ref()),
            Data::IntegerLiteral(value) => value.to_string(),
            Data::StringLiteral { raw, .. } => String::from(raw.as_ref()),
            Data::CustomOperator(text) => String::from(text.as_ref()),
            Data::Assignment(text) => String::from(text.as_ref()),
            Data::Invalid(c) => c.to_string(),
            Data::BlockStart | Data::BlockEnd | Data::LineFoldEnd | Data::EndOfFile => {
                String::new()
            }
        }
    }

    pub fn render(&self) -> String {
        match self {
            Data::Identifier(name) => format!("\"{}\"", name),
            Data::IdentifierAlt(name) => format!("\"{}\"", name),
            Data::IntegerLiteral(value) => format!("\"{}\"", value),
            Data::StringLiteral { value, .. } => format!("{:?}", value),
            Data::CustomOperator(text) => format!("'{}'", text),
            Data::Assignment(text) => format!("'{}'", text),
            Data::Invalid(c) => format!("{:?}", c),
            _ => self.name().render(),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Token {
    pub start: TextLoc,
    pub data: Data,
}

impl Token {
    pub fn new(start: TextLoc, data: Data) -> Self {
        Token { start, data }
    }

    /// The location one past the token's last character. Derived from the
    /// start location and the token's text; newlines in string literals are
    /// respected.
    pub fn end(&self) -> TextLoc {
        self.start.after(&self.data.text())
    }

    pub fn range(&self) -> bolt_diagnostic::TextRange {
        bolt_diagnostic::TextRange {
            start: self.start,
            end: self.end(),
        }
    }
}
