//! styleforge CLI binary
//!
//! Minimal entrypoint; all logic is in the library and `cli::run()`.

fn main() {
    if let Err(e) = styleforge::cli::run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
