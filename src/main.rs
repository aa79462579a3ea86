// src/main.rs

use hms_command_server::{cli, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    match run(args).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("hms-server error: {err:?}");
            std::process::exit(1);
        }
    }
}
