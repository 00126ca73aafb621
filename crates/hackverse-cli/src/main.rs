//! Thin entrypoint for the `hackverse` command-line client.

#[tokio::main]
async fn main() {
    let exit_code = hackverse_cli::run().await;
    std::process::exit(exit_code);
}
