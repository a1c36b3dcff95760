use crate::{
    token::{Data, Keyword, Name, Token},
    Lexer, Punctuator,
};
use bolt_diagnostic::TextLoc;
use num_bigint::BigInt;
use pretty_assertions::assert_eq;
use quickcheck_macros::quickcheck;
use std::rc::Rc;

fn lex(input: &str) -> Vec<Data> {
    Lexer::new(input).map(|token| token.data).collect()
}

/// Run the layout filter and keep everything up to and including the first
/// `EndOfFile`; the filter itself yields `EndOfFile` forever.
fn punctuate(input: &str) -> Vec<Data> {
    let mut out = Vec::new();
    for token in Punctuator::new(Lexer::new(input)) {
        let done = token.data == Data::EndOfFile;
        out.push(token.data);
        if done {
            break;
        }
    }
    out
}

fn names(tokens: &[Data]) -> Vec<Name> {
    tokens.iter().map(|data| data.name()).collect()
}

#[test]
fn lex_keywords_and_identifiers() {
    assert_eq!(
        lex("let mut foo Bar elifx"),
        vec![
            Data::Keyword(Keyword::Let),
            Data::Keyword(Keyword::Mut),
            Data::Identifier(Rc::from("foo")),
            Data::IdentifierAlt(Rc::from("Bar")),
            Data::Identifier(Rc::from("elifx")),
        ]
    );
}

#[test]
fn lex_punctuation() {
    assert_eq!(
        lex("= : , . .. ~ ( ) [ ] { } -> =>"),
        vec![
            Data::Equals,
            Data::Colon,
            Data::Comma,
            Data::Dot,
            Data::DotDot,
            Data::Tilde,
            Data::LParen,
            Data::RParen,
            Data::LBracket,
            Data::RBracket,
            Data::LBrace,
            Data::RBrace,
            Data::RArrow,
            Data::RArrowAlt,
        ]
    );
}

#[test]
fn lex_integer_literal() {
    assert_eq!(
        lex("123456789012345678901234567890"),
        vec![Data::IntegerLiteral(
            BigInt::parse_bytes(b"123456789012345678901234567890", 10).unwrap()
        )]
    );
}

#[test]
fn lex_string_literal_with_escapes() {
    assert_eq!(
        lex("\"a\\n\\t\\\"b\\\\\""),
        vec![Data::StringLiteral {
            value: String::from("a\n\t\"b\\"),
            raw: Rc::from("\"a\\n\\t\\\"b\\\\\""),
        }]
    );
}

#[test]
fn lex_custom_operators_and_assignment() {
    assert_eq!(
        lex("== >= <= /= + <> >>= += -"),
        vec![
            Data::CustomOperator(Rc::from("==")),
            Data::CustomOperator(Rc::from(">=")),
            Data::CustomOperator(Rc::from("<=")),
            Data::CustomOperator(Rc::from("/=")),
            Data::CustomOperator(Rc::from("+")),
            Data::CustomOperator(Rc::from("<>")),
            Data::Assignment(Rc::from(">>=")),
            Data::Assignment(Rc::from("+=")),
            Data::CustomOperator(Rc::from("-")),
        ]
    );
}

#[test]
fn lex_comment_contributes_position_only() {
    let tokens: Vec<Token> = Lexer::new("a # comment\nb").collect();
    assert_eq!(
        tokens,
        vec![
            Token::new(TextLoc::new(1, 1), Data::Identifier(Rc::from("a"))),
            Token::new(TextLoc::new(2, 1), Data::Identifier(Rc::from("b"))),
        ]
    );
}

#[test]
fn lex_invalid_character() {
    assert_eq!(
        lex("a ` b"),
        vec![
            Data::Identifier(Rc::from("a")),
            Data::Invalid('`'),
            Data::Identifier(Rc::from("b")),
        ]
    );
}

#[test]
fn token_end_respects_newlines_in_literals() {
    let tokens: Vec<Token> = Lexer::new("\"ab\ncd\" x").collect();
    assert_eq!(tokens[0].start, TextLoc::new(1, 1));
    assert_eq!(tokens[0].end(), TextLoc::new(2, 4));
    assert_eq!(tokens[1].start, TextLoc::new(2, 5));
}

#[test]
fn punctuate_single_line() {
    assert_eq!(
        names(&punctuate("let a = 1")),
        vec![
            Name::Keyword(Keyword::Let),
            Name::Identifier,
            Name::Equals,
            Name::IntegerLiteral,
            Name::LineFoldEnd,
            Name::EndOfFile,
        ]
    );
}

#[test]
fn punctuate_line_fold_continuation() {
    // The deeper second line continues the first logical line.
    assert_eq!(
        names(&punctuate("let a = foo\n      bar")),
        vec![
            Name::Keyword(Keyword::Let),
            Name::Identifier,
            Name::Equals,
            Name::Identifier,
            Name::Identifier,
            Name::LineFoldEnd,
            Name::EndOfFile,
        ]
    );
}

#[test]
fn punctuate_block_after_equals() {
    assert_eq!(
        names(&punctuate("let a =\n  1\n  2")),
        vec![
            Name::Keyword(Keyword::Let),
            Name::Identifier,
            Name::Equals,
            Name::BlockStart,
            Name::IntegerLiteral,
            Name::LineFoldEnd,
            Name::IntegerLiteral,
            Name::LineFoldEnd,
            Name::BlockEnd,
            Name::LineFoldEnd,
            Name::EndOfFile,
        ]
    );
}

#[test]
fn punctuate_dedent_to_sibling() {
    assert_eq!(
        names(&punctuate("let f =\n  1\nlet g = 2")),
        vec![
            Name::Keyword(Keyword::Let),
            Name::Identifier,
            Name::Equals,
            Name::BlockStart,
            Name::IntegerLiteral,
            Name::LineFoldEnd,
            Name::BlockEnd,
            Name::LineFoldEnd,
            Name::Keyword(Keyword::Let),
            Name::Identifier,
            Name::Equals,
            Name::IntegerLiteral,
            Name::LineFoldEnd,
            Name::EndOfFile,
        ]
    );
}

#[test]
fn punctuate_double_dedent() {
    // Dedenting two levels at once interleaves fold ends with block ends.
    assert_eq!(
        names(&punctuate("let a =\n  let b =\n    1\nlet c = 2")),
        vec![
            Name::Keyword(Keyword::Let),
            Name::Identifier,
            Name::Equals,
            Name::BlockStart,
            Name::Keyword(Keyword::Let),
            Name::Identifier,
            Name::Equals,
            Name::BlockStart,
            Name::IntegerLiteral,
            Name::LineFoldEnd,
            Name::BlockEnd,
            Name::LineFoldEnd,
            Name::BlockEnd,
            Name::LineFoldEnd,
            Name::Keyword(Keyword::Let),
            Name::Identifier,
            Name::Equals,
            Name::IntegerLiteral,
            Name::LineFoldEnd,
            Name::EndOfFile,
        ]
    );
}

#[test]
fn punctuate_class_block() {
    assert_eq!(
        names(&punctuate("class Eq a.\n  let eq : a\ninstance Eq Int.\n  let eq = 1")),
        vec![
            Name::Keyword(Keyword::Class),
            Name::IdentifierAlt,
            Name::Identifier,
            Name::Dot,
            Name::BlockStart,
            Name::Keyword(Keyword::Let),
            Name::Identifier,
            Name::Colon,
            Name::Identifier,
            Name::LineFoldEnd,
            Name::BlockEnd,
            Name::LineFoldEnd,
            Name::Keyword(Keyword::Instance),
            Name::IdentifierAlt,
            Name::IdentifierAlt,
            Name::Dot,
            Name::BlockStart,
            Name::Keyword(Keyword::Let),
            Name::Identifier,
            Name::Equals,
            Name::IntegerLiteral,
            Name::LineFoldEnd,
            Name::BlockEnd,
            Name::LineFoldEnd,
            Name::EndOfFile,
        ]
    );
}

#[test]
fn punctuate_empty_input() {
    assert_eq!(names(&punctuate("")), vec![Name::EndOfFile]);
    assert_eq!(names(&punctuate("# only a comment")), vec![Name::EndOfFile]);
}

#[quickcheck]
fn prop_blocks_balanced(input: String) -> bool {
    let mut starts = 0usize;
    let mut ends = 0usize;
    for token in Punctuator::new(Lexer::new(&input)) {
        match token.data {
            Data::BlockStart => starts += 1,
            Data::BlockEnd => ends += 1,
            Data::EndOfFile => break,
            _ => {}
        }
    }
    starts == ends
}

#[quickcheck]
fn prop_folds_terminated(input: String) -> bool {
    // Every logical line is terminated: the token just before EndOfFile is
    // a LineFoldEnd whenever the input produced any raw token.
    let mut last = None;
    let mut any_raw = false;
    for token in Punctuator::new(Lexer::new(&input)) {
        if token.data == Data::EndOfFile {
            break;
        }
        if !matches!(
            token.data,
            Data::BlockStart | Data::BlockEnd | Data::LineFoldEnd
        ) {
            any_raw = true;
        }
        last = Some(token.data);
    }
    !any_raw || last == Some(Data::LineFoldEnd)
}
