//! relbin entry point
//!
//! Parses the command line, runs the cached release binary and exits with
//! its exit code. Launcher failures are printed with a suggestion and exit
//! with status 1.

use clap::Parser;
use relbin_cli::cli::Cli;
use relbin_cli::core::user_friendly_error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            user_friendly_error(e).display();
            std::process::exit(1);
        }
    }
}
