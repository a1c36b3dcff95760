use std::io;

fn main() -> io::Result<()> {
    bolt_cli::main()
}
