//! The `@expect_diagnostic` test harness.
//!
//! Compiling a file under the harness succeeds when every directive in the
//! file is matched by a diagnostic of the given code at the declaration the
//! directive precedes, and no other diagnostics are produced.

use crate::check_text;
use bolt_diagnostic::Source;
use bolt_syntax::directive::{parse_expectations, Expectation};

/// Check `text`, matching the produced diagnostics against the file's
/// directives. Each failure is a human-readable sentence.
pub fn check_expectations(text: &str) -> Result<(), Vec<String>> {
    let mut expectations = parse_expectations(text);
    expectations.sort_by_key(|expectation| expectation.line);

    let source = Source::Interactive {
        label: String::from("(expectation)"),
    };
    let diagnostics = check_text(source, text);

    let mut matched = vec![false; expectations.len()];
    let mut failures = Vec::new();

    for diagnostic in diagnostics.iter() {
        let line = diagnostic.loc.map(|loc| loc.line).unwrap_or(0);
        // The diagnostic belongs to the last directive at or before its
        // line; the declaration a directive covers extends until the next
        // directive's line.
        let window = expectations
            .iter()
            .enumerate()
            .rev()
            .find(|(_, expectation)| expectation.line <= line);
        match window {
            Some((ix, Expectation { code, .. })) if *code == diagnostic.code => {
                matched[ix] = true;
            }
            _ => {
                failures.push(format!(
                    "unexpected diagnostic [E{:04}] at line {}: {}",
                    diagnostic.code, line, diagnostic.message
                ));
            }
        }
    }

    for (expectation, was_matched) in expectations.iter().zip(matched.iter()) {
        if !was_matched {
            failures.push(format!(
                "expected diagnostic [E{:04}] at line {}, but none was produced",
                expectation.code, expectation.line
            ));
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}
