#[cfg(test)]
mod test;

use std::{
    fmt::Write as FmtWrite,
    io::{self, Write as IoWrite},
    path::PathBuf,
};

/// A line/column pair, both 1-based. `(0, 0)` is the "empty" sentinel used
/// for positions that do not correspond to any source text.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Clone, Copy)]
pub struct TextLoc {
    pub line: usize,
    pub column: usize,
}

impl TextLoc {
    pub fn new(line: usize, column: usize) -> Self {
        TextLoc { line, column }
    }

    pub fn empty() -> Self {
        TextLoc { line: 0, column: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.line == 0 && self.column == 0
    }

    /// Advance the location over `text`, respecting newlines.
    pub fn advance(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    pub fn after(&self, text: &str) -> TextLoc {
        let mut out = *self;
        out.advance(text);
        out
    }
}

#[derive(PartialEq, Eq, Debug, Hash, Clone, Copy)]
pub struct TextRange {
    pub start: TextLoc,
    pub end: TextLoc,
}

/// A source file's path and contents, with a precomputed table of line start
/// offsets so that offset/line/column conversions are `O(log n)`.
pub struct TextFile {
    path: PathBuf,
    text: String,
    line_offsets: Vec<usize>,
}

impl TextFile {
    pub fn new(path: PathBuf, text: String) -> Self {
        let mut line_offsets = vec![0];
        for (ix, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_offsets.push(ix + 1);
            }
        }
        TextFile {
            path,
            text,
            line_offsets,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.line_offsets.len()
    }

    /// The 1-based line containing the byte at `offset`.
    pub fn line(&self, offset: usize) -> usize {
        match self.line_offsets.binary_search(&offset) {
            Ok(ix) => ix + 1,
            Err(ix) => ix,
        }
    }

    /// The 1-based column of the byte at `offset`.
    pub fn column(&self, offset: usize) -> usize {
        let line_start = self.start_offset(self.line(offset));
        self.text[line_start..offset].chars().count() + 1
    }

    /// The byte offset at which the 1-based `line` starts.
    pub fn start_offset(&self, line: usize) -> usize {
        self.line_offsets[line - 1]
    }

    /// The text of the 1-based `line`, without its terminator.
    pub fn line_text(&self, line: usize) -> &str {
        let start = self.start_offset(line);
        let end = self
            .line_offsets
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        &self.text[start..end.max(start)]
    }
}

#[derive(PartialEq, Eq, Debug, Hash, Clone)]
pub enum Source {
    File { path: PathBuf },
    Interactive { label: String },
}

impl Source {
    pub fn to_str(&self) -> &str {
        match self {
            Source::File { path } => path.to_str().unwrap_or("<file>"),
            Source::Interactive { label } => label,
        }
    }
}

/// The stable, user-visible diagnostic codes.
pub mod code {
    pub const UNEXPECTED_TOKEN: u16 = 1001;
    pub const BINDING_NOT_FOUND: u16 = 2010;
    pub const UNIFICATION_ERROR: u16 = 2014;
    pub const OCCURS_CHECK: u16 = 2015;
    pub const ARITY_MISMATCH: u16 = 2020;
    pub const INSTANCE_NOT_FOUND: u16 = 2101;
    pub const TYPE_SIGNATURE_MISMATCH: u16 = 2201;
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn to_str(&self) -> &str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// A stable node identity, assigned by the parser. Diagnostics refer to
/// syntax nodes through these instead of owning pieces of the tree.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Clone, Copy)]
pub struct NodeId(pub u32);

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Diagnostic {
    pub code: u16,
    pub severity: Severity,
    pub source: Source,
    pub loc: Option<TextLoc>,
    pub node: Option<NodeId>,
    pub message: String,
    pub addendum: Option<String>,
}

impl Diagnostic {
    pub fn render_heading(&self) -> String {
        let mut out = String::from(self.source.to_str());
        out.push(':');
        if let Some(loc) = self.loc {
            write!(out, "{}:{}:", loc.line, loc.column).unwrap();
        }
        write!(
            out,
            " {}[E{:04}]: {}",
            self.severity.to_str(),
            self.code,
            self.message
        )
        .unwrap();
        out
    }

    /// Render the diagnostic with the offending source line and a caret
    /// under the start column.
    pub fn render(&self, file: &TextFile) -> String {
        let loc = match self.loc {
            Some(loc) if !loc.is_empty() && loc.line <= file.line_count() => loc,
            _ => return self.render_heading(),
        };

        let line_str = file.line_text(loc.line);
        let caret: String = {
            let mut caret: String = " ".repeat(loc.column.saturating_sub(1));
            caret.push('^');
            caret
        };
        let pad_amount = ((loc.line as f32).log(10.0).floor() as usize) + 1;
        let padding: String = " ".repeat(pad_amount);

        let mut result = self.render_heading();
        result.push('\n');
        result.push_str(&format!("{} |\n", padding));
        result.push_str(&format!("{} | {}\n", loc.line, line_str));
        result.push_str(&format!("{} | {}", padding, caret));
        if let Some(addendum) = &self.addendum {
            result.push('\n');
            result.push_str(addendum);
        }
        result
    }
}

/// Collects diagnostics without printing or aborting. Rendering happens once
/// at the end of a compilation, after [`Diagnostics::sort`].
#[derive(Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics { items: Vec::new() }
    }

    pub fn item(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<Diagnostic> {
        self.items.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.items
            .iter()
            .any(|item| item.severity == Severity::Error)
    }

    /// Order diagnostics by source position. Unlocated diagnostics sort
    /// first. The sort is stable, so diagnostics at the same position keep
    /// their emission order.
    pub fn sort(&mut self) {
        self.items
            .sort_by_key(|item| item.loc.unwrap_or_else(TextLoc::empty));
    }

    /// Print every collected diagnostic to stderr, in sorted order.
    pub fn report_all(&mut self, file: &TextFile) -> io::Result<()> {
        self.sort();
        let stderr = io::stderr();
        let mut handle = stderr.lock();
        for diagnostic in &self.items {
            let rendered = diagnostic.render(file);
            handle.write_all(rendered.as_bytes())?;
            handle.write_all(b"\n")?;
        }
        Ok(())
    }
}
