// src/main.rs

use runonchange::{cli, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    let code = match run(args).await {
        Ok(code) => code,
        Err(err) => {
            let reason = err.exit_reason();
            eprintln!("{} error: {err}", reason.label());
            reason.code()
        }
    };
    std::process::exit(code);
}
