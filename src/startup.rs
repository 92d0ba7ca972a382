use crate::auth::CredentialStore;
use crate::config::Config;
use crate::error::{Error, GcalResult};
use crate::mcp::McpServer;
use crate::tools::CalendarTools;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration. Logs go to stderr,
/// stdout belongs to the MCP transport.
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn,rmcp=warn")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the configuration, logging the failure before handing it back
pub fn load_config() -> miette::Result<Config> {
    match Config::load() {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Wire the credential store, tools and MCP server together
pub fn build_server(config: &Config) -> GcalResult<McpServer> {
    let store = CredentialStore::from_config(config)?;
    info!("Token file: {}", store.token_path().display());

    let tools = CalendarTools::new(Arc::new(store));
    Ok(McpServer::new(tools))
}

/// Serve MCP over stdio until the client disconnects
pub async fn run_server(config: Config) -> miette::Result<()> {
    let server = build_server(&config)?;
    server.serve_stdio().await?;
    Ok(())
}
