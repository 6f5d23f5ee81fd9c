//! Benchwatch CLI entry point.

fn main() {
    if let Err(e) = benchwatch_cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
