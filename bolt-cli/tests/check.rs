use bolt_cli::{check_text, expectation::check_expectations};
use bolt_diagnostic::Source;
use pretty_assertions::assert_eq;

fn interactive() -> Source {
    Source::Interactive {
        label: String::from("test"),
    }
}

fn collect(diagnostics: &bolt_diagnostic::Diagnostics) -> Vec<(u16, usize, String)> {
    diagnostics
        .iter()
        .map(|diagnostic| {
            (
                diagnostic.code,
                diagnostic.loc.map(|loc| loc.line).unwrap_or(0),
                diagnostic.message.clone(),
            )
        })
        .collect()
}

#[test]
fn clean_program_produces_no_diagnostics() {
    let input = "\
enum Maybe a.
  Just a
  Nothing
let inc x = x + 1
let map f m = match m .
  Just x => Just (f x)
  Nothing => Nothing
let r = map inc (Just 1)
";
    let diagnostics = check_text(interactive(), input);
    assert!(!diagnostics.has_errors(), "{:?}", collect(&diagnostics));
}

#[test]
fn diagnostics_are_sorted_by_position() {
    let input = "\
let c = missingOne
let a: Int = \"foo\"
let b = missingTwo
";
    let diagnostics = check_text(interactive(), input);
    let lines: Vec<usize> = diagnostics
        .iter()
        .map(|diagnostic| diagnostic.loc.map(|loc| loc.line).unwrap_or(0))
        .collect();
    let mut sorted = lines.clone();
    sorted.sort();
    assert_eq!(lines, sorted);
    assert_eq!(lines.len(), 3);
}

#[test]
fn parse_error_carries_code_1001() {
    let diagnostics = check_text(interactive(), "let ) = 2");
    let codes: Vec<u16> = diagnostics
        .iter()
        .map(|diagnostic| diagnostic.code)
        .collect();
    assert_eq!(codes, vec![1001]);
}

#[test]
fn parse_recovery_checks_later_declarations() {
    let input = "\
let ) = 2
let a: Int = \"foo\"
";
    let diagnostics = check_text(interactive(), input);
    let codes: Vec<u16> = diagnostics
        .iter()
        .map(|diagnostic| diagnostic.code)
        .collect();
    assert_eq!(codes, vec![1001, 2014]);
}

#[test]
fn expectation_harness_accepts_annotated_file() {
    let input = "\
class Eq a.
  let eq : a -> a -> Bool
instance Eq String.
  let eq a b = True
# @expect_diagnostic 2201
let f x y : a -> a -> Bool = eq x y
";
    assert_eq!(check_expectations(input), Ok(()));
}

#[test]
fn expectation_harness_rejects_unexpected_diagnostics() {
    let input = "\
let a: Int = \"foo\"
";
    let failures = check_expectations(input).unwrap_err();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("E2014"));
}

#[test]
fn expectation_harness_rejects_missing_diagnostics() {
    let input = "\
# @expect_diagnostic 2014
let a: Int = 1
";
    let failures = check_expectations(input).unwrap_err();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("E2014"));
}

#[test]
fn expectation_harness_scenarios() {
    let scenarios = [
        "# @expect_diagnostic 2014\nlet a: Int = \"foo\"\n",
        "# @expect_diagnostic 2015\nlet loop f = f f\n",
        "# @expect_diagnostic 2010\nlet x = mystery\n",
        "class Eq a.\n  let eq : a -> a -> Bool\n# @expect_diagnostic 2101\nlet b = eq 1 2\n",
    ];
    for scenario in scenarios {
        assert_eq!(check_expectations(scenario), Ok(()), "{}", scenario);
    }
}

#[test]
fn mutual_recursion_end_to_end() {
    let input = "\
let even n = if n == 0 . True else . odd (n - 1)
let odd n = if n == 0 . False else . even (n - 1)
let check = even 10
";
    let diagnostics = check_text(interactive(), input);
    assert!(!diagnostics.has_errors(), "{:?}", collect(&diagnostics));
}

#[test]
fn multi_line_program_with_blocks() {
    let input = "\
struct Point.
  x: Int
  y: Int
let dot p q : Point -> Point -> Int =
  let px = p.x
  let qx = q.x
  px * qx
let r = dot { x = 1, y = 2 } { x = 3, y = 4 }
";
    let diagnostics = check_text(interactive(), input);
    assert!(!diagnostics.has_errors(), "{:?}", collect(&diagnostics));
}

#[test]
fn empty_file_is_clean() {
    let diagnostics = check_text(interactive(), "");
    assert!(diagnostics.is_empty());
}
