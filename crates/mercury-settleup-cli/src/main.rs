use std::process::ExitCode;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    mercury_settleup_cli::run(std::env::args()).await
}
