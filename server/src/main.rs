// server/src/main.rs

use anyhow::Result;
use medcor_server::cli::start_cli;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    start_cli().await
}
