mod logging;

use std::sync::Arc;

use base64::Engine;
use gua_core::{GuaPlugin, GuaSettings, Reply, Requester, Segment};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Deserialize;

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct DrawGuaRequest {
    /// Stable ID of the chat user issuing the command. The daily quota is tracked per ID.
    user_id: String,
    /// Display name used to address the user when the daily quota is used up
    display_name: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GuaQuotaRequest {
    /// Stable ID of the chat user
    user_id: String,
}

// --- Server ---

#[derive(Clone)]
pub struct GuaServer {
    plugin: Arc<GuaPlugin>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl GuaServer {
    pub fn new(plugin: Arc<GuaPlugin>) -> Self {
        Self {
            plugin,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Cast the coin oracle (金钱卦): draw one of the 64 hexagram images at random for a chat user. Returns a header, the hexagram image, and a footer with the user's remaining draws for today. Each user has a daily limit that resets at midnight; once used up the reply says so instead of drawing."
    )]
    fn draw_gua(
        &self,
        Parameters(req): Parameters<DrawGuaRequest>,
    ) -> Result<CallToolResult, McpError> {
        let requester = requester_from(req.user_id, req.display_name)?;
        let reply = self.plugin.handle_command(&requester);
        let content = reply_to_content(&reply);
        if reply.outcome.is_error() {
            Ok(CallToolResult::error(content))
        } else {
            Ok(CallToolResult::success(content))
        }
    }

    #[tool(description = "Show how many coin oracle draws a chat user has left today, without using one")]
    fn gua_quota(
        &self,
        Parameters(req): Parameters<GuaQuotaRequest>,
    ) -> Result<CallToolResult, McpError> {
        let requester = requester_from(req.user_id, None)?;
        let status = self.plugin.quota_status(&requester.user_id);
        let text = match (status.daily_limit, status.remaining) {
            (Some(limit), Some(remaining)) => {
                format!("今日剩余 {remaining}/{limit} 次")
            }
            _ => "起卦次数不限".to_string(),
        };
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

#[tool_handler]
impl ServerHandler for GuaServer {
    fn get_info(&self) -> ServerInfo {
        let settings = self.plugin.settings();
        let limit = match settings.daily_limit {
            Some(n) => format!("{n} draws per user per day, reset at midnight ({})", settings.timezone),
            None => "no daily limit".to_string(),
        };
        let instructions = format!(
            "{}\n\n## This server\n- Trigger keyword: `{}`\n- Quota: {}\n- Images loaded: {}",
            INSTRUCTIONS,
            settings.command,
            limit,
            self.plugin.pool_size()
        );
        ServerInfo {
            instructions: Some(instructions.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// --- Helpers ---

fn requester_from(user_id: String, display_name: Option<String>) -> Result<Requester, McpError> {
    let user_id = user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(McpError::invalid_params("user_id must not be empty", None));
    }
    let mut requester = Requester::new(user_id);
    if let Some(name) = display_name.filter(|n| !n.trim().is_empty()) {
        requester = requester.with_display_name(name);
    }
    Ok(requester)
}

/// Convert reply segments to MCP content, in order.
fn reply_to_content(reply: &Reply) -> Vec<Content> {
    reply
        .segments
        .iter()
        .map(|segment| match segment {
            Segment::Plain(text) => Content::text(text.clone()),
            Segment::Image(image) => Content::image(
                base64::engine::general_purpose::STANDARD.encode(&image.bytes),
                image.mime_type.clone(),
            ),
            Segment::Mention {
                user_id,
                display_name,
            } => Content::text(gua_core::reply::mention_text(
                user_id,
                display_name.as_deref(),
            )),
        })
        .collect()
}

fn load_settings() -> GuaSettings {
    match gua_core::read_settings() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(
                "Failed to read settings from {}: {}; using defaults",
                gua_core::settings::settings_path().display(),
                e
            );
            GuaSettings::default()
        }
    }
}

const INSTRUCTIONS: &str = r#"gua is a coin oracle (周易金钱卦) bot. When a chat user sends the trigger keyword, call `draw_gua` with that user's stable ID (and display name if known) and relay the returned content to the chat as one message, keeping the order: text, hexagram image, text.

## Quota
Each user may draw a limited number of times per calendar day. The count resets at midnight in the server's configured timezone. When the quota is used up `draw_gua` returns a polite refusal instead of an image; relay it as-is. Use `gua_quota` to answer "how many draws do I have left" without consuming a draw.

## Errors
If `draw_gua` reports an error, relay its text to the user. Do not retry automatically: a failed draw still counts against the user's quota."#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle `gua-mcp init` subcommand
    if std::env::args().nth(1).as_deref() == Some("init") {
        return init_project();
    }

    logging::init()?;

    let plugin = Arc::new(GuaPlugin::initialize(load_settings()));

    let service = GuaServer::new(Arc::clone(&plugin))
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| tracing::error!("MCP server error: {}", e))?;
    service.waiting().await?;

    plugin.terminate();
    Ok(())
}

/// Create default settings if none exist yet.
fn init_project() -> Result<(), Box<dyn std::error::Error>> {
    let path = gua_core::settings::settings_path();
    if init_settings_at(&path)? {
        eprintln!("Wrote {}", path.display());
    } else {
        eprintln!("Keeping existing {}", path.display());
    }

    eprintln!("\nDone. Put the 64 hexagram images in the configured imageDir and restart the host.");
    Ok(())
}

/// Returns `false` when a settings file is already present.
fn init_settings_at(path: &std::path::Path) -> Result<bool, gua_core::GuaError> {
    if path.exists() {
        return Ok(false);
    }
    gua_core::write_settings(path, &GuaSettings::default())?;
    Ok(true)
}
