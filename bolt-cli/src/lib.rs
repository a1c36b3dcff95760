pub mod expectation;

use bolt_diagnostic::{Diagnostics, Source, TextFile};
use bolt_parse::parse_source;
use bolt_typecheck::check_source_file;
use clap::Parser;
use std::{io, path::PathBuf};

#[derive(Parser)]
#[command(name = "bolt")]
struct Cli {
    /// The source file to parse and type check.
    filename: String,
}

#[test]
fn verify_cli() {
    use clap::CommandFactory;
    Cli::command().debug_assert()
}

/// Compile one source text: lex, punctuate, parse, set parents, check.
/// Every diagnostic from every stage ends up in the returned store, sorted
/// by source position.
pub fn check_text(source: Source, text: &str) -> Diagnostics {
    let (file, parse_errors) = parse_source(source.clone(), text);
    let _parents = file.set_parents();
    let checker = check_source_file(source, &file);

    let mut diagnostics = Diagnostics::new();
    for error in &parse_errors {
        error.report(&mut diagnostics);
    }
    checker.report_errors(&mut diagnostics);
    diagnostics.sort();
    diagnostics
}

fn run_file(filename: &str) -> io::Result<bool> {
    let text = std::fs::read_to_string(filename)?;
    let path = PathBuf::from(filename);
    let file = TextFile::new(path.clone(), text);
    let source = Source::File { path };

    let mut diagnostics = check_text(source, file.text());
    diagnostics.report_all(&file)?;
    Ok(!diagnostics.has_errors())
}

/// The entrypoint to the CLI. Exit code 0 when the file checks cleanly, 1
/// on an I/O failure or when any error-severity diagnostic was produced.
pub fn main() -> io::Result<()> {
    let cli = Cli::parse();
    match run_file(&cli.filename) {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("bolt: {}: {}", cli.filename, err);
            std::process::exit(1)
        }
    }
}
