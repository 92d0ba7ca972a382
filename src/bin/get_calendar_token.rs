use gcal_mcp::auth::CredentialStore;
use gcal_mcp::startup;
use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    startup::init_logging()?;

    // Load configuration
    let config = startup::load_config()?;
    let store = CredentialStore::from_config(&config)?;

    // Always run the browser flow, replacing whatever token is stored
    let token = store.authorize_interactive().await?;

    info!(
        "Token saved to {} (scopes: {})",
        store.token_path().display(),
        token.scopes.join(" ")
    );
    if token.refresh_token.is_none() {
        info!("No refresh token was issued; you will need to authorize again when this token expires");
    }

    Ok(())
}
