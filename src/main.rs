use gcal_mcp::startup;
use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting gcal-mcp {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = startup::load_config()?;

    // Serve until stdin closes
    startup::run_server(config).await
}
