use super::arguments::{
    calendar_or_primary, count_or_default, EventsForDateArgs, ListCalendarsArgs, SearchEventsArgs,
    UpcomingEventsArgs,
};
use super::relay::{self, Inbound, LineRead, PendingReplies, INVALID_REQUEST, MAX_MESSAGE_BYTES};
use crate::error::{protocol_error, Error, GcalResult};
use crate::tools::{CalendarTools, ToolOutcome};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub const MCP_SERVER_NAME: &str = "gcal-mcp";

const INSTRUCTIONS: &str = "Read-only access to the user's Google Calendar. \
Use list_calendars to discover calendar IDs; the other tools default to the primary calendar. \
Dates are interpreted as whole UTC days.";

/// MCP server exposing the calendar tools
#[derive(Clone)]
pub struct McpServer {
    tools: CalendarTools,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl McpServer {
    pub fn new(tools: CalendarTools) -> Self {
        Self {
            tools,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Get upcoming calendar events with their start time and title.")]
    async fn get_upcoming_events(
        &self,
        Parameters(args): Parameters<UpcomingEventsArgs>,
    ) -> Result<CallToolResult, McpError> {
        let calendar_id = calendar_or_primary(args.calendar_id);
        let result = self
            .tools
            .get_upcoming_events(count_or_default(args.max_results), &calendar_id)
            .await;
        Ok(tool_result("get_upcoming_events", result))
    }

    #[tool(description = "Get calendar events for a specific date (whole UTC day).")]
    async fn get_events_for_date(
        &self,
        Parameters(args): Parameters<EventsForDateArgs>,
    ) -> Result<CallToolResult, McpError> {
        let calendar_id = calendar_or_primary(args.calendar_id);
        let result = self
            .tools
            .get_events_for_date(&args.date, &calendar_id, args.max_results)
            .await;
        Ok(tool_result("get_events_for_date", result))
    }

    #[tool(description = "Search upcoming calendar events by keyword in titles and descriptions.")]
    async fn search_events(
        &self,
        Parameters(args): Parameters<SearchEventsArgs>,
    ) -> Result<CallToolResult, McpError> {
        if args.query.trim().is_empty() {
            return Err(McpError::invalid_params(
                "'query' must not be empty",
                Some(json!({ "field": "query" })),
            ));
        }
        let calendar_id = calendar_or_primary(args.calendar_id);
        let result = self
            .tools
            .search_events(&args.query, count_or_default(args.max_results), &calendar_id)
            .await;
        Ok(tool_result("search_events", result))
    }

    #[tool(description = "List all calendars available to the account with their IDs.")]
    async fn list_calendars(
        &self,
        Parameters(_args): Parameters<ListCalendarsArgs>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.tools.list_calendars().await;
        Ok(tool_result("list_calendars", result))
    }
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: MCP_SERVER_NAME.into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(INSTRUCTIONS.into()),
        }
    }
}

impl McpServer {
    /// Serve over the process's stdin and stdout
    pub async fn serve_stdio(&self) -> GcalResult<()> {
        self.serve_lines(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve newline-delimited JSON-RPC until the reader reaches EOF and every
    /// forwarded request has been answered
    pub async fn serve_lines<R, W>(&self, mut reader: R, mut writer: W) -> GcalResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (session_io, relay_io) = tokio::io::duplex(MAX_MESSAGE_BYTES);
        let (from_session, mut to_session) = tokio::io::split(relay_io);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let pending = PendingReplies::default();

        let session = async {
            let running = self
                .clone()
                .serve(session_io)
                .await
                .map_err(|e| protocol_error(&format!("MCP session failed to start: {}", e)))?;
            info!("MCP session started");
            let reason = running
                .waiting()
                .await
                .map_err(|e| protocol_error(&format!("MCP session task failed: {}", e)))?;
            info!("MCP session ended: {:?}", reason);
            Ok::<(), Error>(())
        };

        let replies = out_tx.clone();
        let inbound = async {
            let replies = replies;
            let mut buf = Vec::new();
            loop {
                let rejection = match relay::read_line_capped(&mut reader, &mut buf).await? {
                    LineRead::Eof => break,
                    LineRead::TooLong => Some(relay::error_response(
                        Value::Null,
                        INVALID_REQUEST,
                        format!("Message exceeds {} bytes", MAX_MESSAGE_BYTES),
                    )),
                    LineRead::Line => match relay::classify(&buf) {
                        Inbound::Forward { message, request_id } => {
                            if let Some(id) = request_id {
                                pending.insert(id);
                            }
                            to_session.write_all(&message).await?;
                            to_session.write_all(b"\n").await?;
                            to_session.flush().await?;
                            None
                        }
                        Inbound::Reject(response) => Some(response),
                        Inbound::Ignore => None,
                    },
                };

                if let Some(response) = rejection {
                    warn!("Rejected message: {}", response["error"]["message"]);
                    let _ = replies.send(serde_json::to_vec(&response)?);
                }
            }

            pending.drained().await;
            to_session.shutdown().await?;
            Ok::<(), Error>(())
        };

        let outbound = async {
            let out_tx = out_tx;
            let mut lines = BufReader::new(from_session);
            let mut line = Vec::new();
            loop {
                line.clear();
                if lines.read_until(b'\n', &mut line).await? == 0 {
                    break;
                }
                let message = line.trim_ascii();
                if message.is_empty() {
                    continue;
                }
                if let Some(id) = relay::response_id(message) {
                    pending.remove(&id);
                }
                let _ = out_tx.send(message.to_vec());
            }
            pending.clear();
            Ok::<(), Error>(())
        };

        let write_out = async {
            while let Some(message) = out_rx.recv().await {
                writer.write_all(&message).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<(), Error>(())
        };

        tokio::try_join!(session, inbound, outbound, write_out)?;
        info!("Input closed, MCP server stopping");
        Ok(())
    }
}

fn tool_result(tool: &str, result: GcalResult<ToolOutcome>) -> CallToolResult {
    match result {
        Ok(outcome) => CallToolResult::success(vec![Content::text(outcome.render())]),
        Err(Error::Auth(detail)) => {
            error!("Tool {} aborted, authentication failed: {}", tool, detail);
            CallToolResult::error(vec![Content::text(format!("Authentication failed: {}", detail))])
        }
        Err(e) => {
            error!("Tool {} aborted: {}", tool, e);
            CallToolResult::error(vec![Content::text(format!(
                "Calendar client unavailable: {}",
                e
            ))])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{auth_error, google_calendar_error};

    fn text(result: &CallToolResult) -> Value {
        serde_json::to_value(result).unwrap_or_default()["content"][0]["text"].clone()
    }

    #[test]
    fn authentication_errors_are_labelled() {
        let result = tool_result("list_calendars", Err(auth_error("No refresh token in token data")));
        assert_eq!(result.is_error, Some(true));
        assert_eq!(text(&result), "Authentication failed: No refresh token in token data");
    }

    #[test]
    fn other_provider_errors_are_not_called_authentication() {
        let result = tool_result(
            "list_calendars",
            Err(google_calendar_error("Failed to parse URL: relative URL without a base")),
        );
        assert_eq!(result.is_error, Some(true));
        let text = text(&result);
        let text = text.as_str().unwrap_or_default();
        assert!(text.starts_with("Calendar client unavailable: "), "{}", text);
        assert!(!text.contains("Authentication failed"));
    }

    #[test]
    fn outcomes_are_plain_text_results() {
        let result = tool_result(
            "search_events",
            Ok(ToolOutcome::Failure {
                action: crate::tools::SEARCHING_EVENTS,
                detail: "HTTP 500 Internal Server Error - Backend Error".to_string(),
            }),
        );
        assert_ne!(result.is_error, Some(true));
        assert_eq!(text(&result), "Error searching events: HTTP 500 Internal Server Error - Backend Error");
    }
}
