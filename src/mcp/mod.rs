pub mod arguments;
pub mod relay;
pub mod server;

pub use relay::MAX_MESSAGE_BYTES;
pub use server::{McpServer, MCP_SERVER_NAME};
