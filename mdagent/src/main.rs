use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match mdagent::run_cli().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
