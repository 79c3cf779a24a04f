// Binary entry point for pathfence
// This is a thin wrapper that delegates to the library implementation

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match pathfence::shell::run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("pathfence error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
