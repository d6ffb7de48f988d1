//! The `a3k` executable.

fn main() {
    let code = a3k_cli::run_cli(std::env::args().collect());
    std::process::exit(code);
}
