#[tokio::main]
async fn main() -> std::io::Result<()> {
    royale_server::run_with_config().await
}
