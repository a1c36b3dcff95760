use crate::directive::{parse_expectations, Expectation};
use pretty_assertions::assert_eq;

#[test]
fn parse_expectations_simple() {
    let text = "\
# @expect_diagnostic 2201
let f x = eq x x
";
    assert_eq!(
        parse_expectations(text),
        vec![Expectation {
            code: 2201,
            line: 2
        }]
    );
}

#[test]
fn parse_expectations_skips_comments_and_blanks() {
    let text = "\
# @expect_diagnostic 2014

# some prose
let a: Int = \"foo\"
";
    assert_eq!(
        parse_expectations(text),
        vec![Expectation {
            code: 2014,
            line: 4
        }]
    );
}

#[test]
fn parse_expectations_multiple() {
    let text = "\
# @expect_diagnostic 2014
let a: Int = \"foo\"
let ok = 1
# @expect_diagnostic 2015
let loop f = f f
";
    assert_eq!(
        parse_expectations(text),
        vec![
            Expectation {
                code: 2014,
                line: 2
            },
            Expectation {
                code: 2015,
                line: 5
            },
        ]
    );
}

#[test]
fn parse_expectations_trailing_directive_dropped() {
    assert_eq!(parse_expectations("let a = 1\n# @expect_diagnostic 2014"), vec![]);
}

#[test]
fn parse_expectations_ignores_plain_comments() {
    assert_eq!(parse_expectations("# a comment\nlet a = 1"), vec![]);
}
