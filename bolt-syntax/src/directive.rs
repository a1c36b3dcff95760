//! `@expect_diagnostic` test directives.
//!
//! A comment of the form `# @expect_diagnostic <code>` asserts that
//! compiling the file emits exactly that diagnostic code at the declaration
//! the comment precedes. The scanner discards comments, so directives are
//! recovered by a line-oriented prepass over the raw text.

/// A single directive: `code` is expected at a diagnostic whose start line
/// equals `line` (the first non-comment, non-blank line after the comment).
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct Expectation {
    pub code: u16,
    pub line: usize,
}

fn directive_code(line: &str) -> Option<u16> {
    let rest = line.trim_start().strip_prefix('#')?;
    let rest = rest.trim_start().strip_prefix("@expect_diagnostic")?;
    rest.trim().parse().ok()
}

fn is_blank_or_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Collect every expectation in `text`. A directive with no following
/// declaration line is dropped.
pub fn parse_expectations(text: &str) -> Vec<Expectation> {
    let lines: Vec<&str> = text.lines().collect();
    let mut expectations = Vec::new();
    for (ix, line) in lines.iter().enumerate() {
        let code = match directive_code(line) {
            None => continue,
            Some(code) => code,
        };
        let target = lines
            .iter()
            .enumerate()
            .skip(ix + 1)
            .find(|(_, following)| !is_blank_or_comment(following))
            .map(|(target_ix, _)| target_ix + 1);
        if let Some(line) = target {
            expectations.push(Expectation { code, line });
        }
    }
    expectations
}
