use super::*;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

fn file(text: &str) -> TextFile {
    TextFile::new(PathBuf::from("test.bolt"), String::from(text))
}

#[test]
fn text_loc_advance() {
    let mut loc = TextLoc::new(1, 1);
    loc.advance("abc");
    assert_eq!(loc, TextLoc::new(1, 4));
    loc.advance("x\nyz");
    assert_eq!(loc, TextLoc::new(2, 3));
}

#[test]
fn text_file_line_lookup() {
    let f = file("let a = 1\nlet b = 2\n\nlet c = 3");
    assert_eq!(f.line(0), 1);
    assert_eq!(f.line(9), 1);
    assert_eq!(f.line(10), 2);
    assert_eq!(f.line(20), 3);
    assert_eq!(f.line(21), 4);
    assert_eq!(f.start_offset(2), 10);
    assert_eq!(f.line_text(1), "let a = 1");
    assert_eq!(f.line_text(3), "");
    assert_eq!(f.line_text(4), "let c = 3");
}

#[test]
fn text_file_column_lookup() {
    let f = file("ab\ncdef");
    assert_eq!(f.column(0), 1);
    assert_eq!(f.column(1), 2);
    assert_eq!(f.column(3), 1);
    assert_eq!(f.column(6), 4);
}

#[test]
fn diagnostics_sort_by_position() {
    let source = Source::Interactive {
        label: String::from("test"),
    };
    let mk = |line, column, message: &str| Diagnostic {
        code: code::UNIFICATION_ERROR,
        severity: Severity::Error,
        source: source.clone(),
        loc: Some(TextLoc::new(line, column)),
        node: None,
        message: String::from(message),
        addendum: None,
    };
    let mut diagnostics = Diagnostics::new();
    diagnostics.item(mk(3, 1, "third"));
    diagnostics.item(mk(1, 5, "second"));
    diagnostics.item(mk(1, 2, "first"));
    diagnostics.sort();
    let messages: Vec<&str> = diagnostics
        .iter()
        .map(|item| item.message.as_str())
        .collect();
    assert_eq!(messages, vec!["first", "second", "third"]);
}

#[test]
fn render_heading_format() {
    let diagnostic = Diagnostic {
        code: code::UNEXPECTED_TOKEN,
        severity: Severity::Error,
        source: Source::File {
            path: PathBuf::from("main.bolt"),
        },
        loc: Some(TextLoc::new(2, 7)),
        node: None,
        message: String::from("expected one of: identifier"),
        addendum: None,
    };
    assert_eq!(
        diagnostic.render_heading(),
        "main.bolt:2:7: error[E1001]: expected one of: identifier"
    );
}

#[test]
fn render_with_caret() {
    let f = file("let a = 1\nlet b = ?");
    let diagnostic = Diagnostic {
        code: code::UNEXPECTED_TOKEN,
        severity: Severity::Error,
        source: Source::File {
            path: PathBuf::from("test.bolt"),
        },
        loc: Some(TextLoc::new(2, 9)),
        node: None,
        message: String::from("unexpected character"),
        addendum: None,
    };
    assert_eq!(
        diagnostic.render(&f),
        "test.bolt:2:9: error[E1001]: unexpected character\n  |\n2 | let b = ?\n  |         ^"
    );
}
