use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    keyserver::run().await
}
