//! databuild - Asset pipeline build orchestrator

use std::process::ExitCode;

fn main() -> ExitCode {
    match databuild::cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
