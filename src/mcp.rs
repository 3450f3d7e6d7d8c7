//! MCP service implementation with tool routing
//!
//! Thin façade over [`ScreenshotLibrary`]: each tool unpacks its
//! parameters, calls the matching query, and converts the [`Reply`] into
//! MCP content. Library failures become error tool results with the
//! message and remediation hint inline; protocol-level errors are reserved
//! for transport problems.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, ErrorData as McpError, Implementation, ServerCapabilities,
        ServerInfo,
    },
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::{Reply, ReplyPart};
use crate::service::ScreenshotLibrary;

/// Parameters for the check_latest_screenshots tool
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckLatestScreenshotsParams {
    /// How many of the newest screenshots to return (1-5, default: 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

/// Parameters for the check_gif_by_index tool
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckGifByIndexParams {
    /// 1-based index into the newest-first GIF list (1 = latest)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

/// Parameters for the get_screenshot_by_name tool
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetScreenshotByNameParams {
    /// Exact filename as shown by list_screenshots
    pub filename: String,
}

/// Parameters for the list_screenshots tool
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListScreenshotsParams {
    /// Maximum number of entries to list (default: 20)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Parameters for the extract_gif_frames tool
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractGifFramesParams {
    /// GIF filename; defaults to the most recent GIF
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Maximum number of frames to return (default: 10)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_frames: Option<usize>,
    /// Sample every Nth frame instead of the computed even spacing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_stride: Option<usize>,
}

const DEFAULT_LIST_LIMIT: usize = 20;

/// ShareX screenshot library MCP server
///
/// # Tools
///
/// - `check_latest_screenshots`: newest still images with inline bytes
/// - `check_latest_gif`: sampled frames of the most recent GIF
/// - `check_gif_by_index`: sampled frames of the Nth newest GIF
/// - `list_gifs`: indexed newest-first GIF listing
/// - `get_screenshot_by_name`: fetch one file by exact name
/// - `list_screenshots`: merged listing with cache occupancy
/// - `extract_gif_frames`: extraction with caller-chosen sampling
#[derive(Clone)]
pub struct ShareXMcpServer {
    tool_router: ToolRouter<Self>,
    library: Arc<ScreenshotLibrary>,
}

#[tool_router]
impl ShareXMcpServer {
    pub fn new(library: Arc<ScreenshotLibrary>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            library,
        }
    }

    #[tool(description = "Get the most recent screenshot(s) from the ShareX folder")]
    pub async fn check_latest_screenshots(
        &self,
        Parameters(params): Parameters<CheckLatestScreenshotsParams>,
    ) -> Result<CallToolResult, McpError> {
        let reply = self.library.latest_screenshots(params.count.unwrap_or(1)).await;
        Ok(reply_to_result(reply))
    }

    #[tool(description = "Get the most recent GIF as a set of extracted frames")]
    pub async fn check_latest_gif(&self) -> Result<CallToolResult, McpError> {
        let reply = self.library.gif_by_index(1).await;
        Ok(reply_to_result(reply))
    }

    #[tool(description = "Get a GIF by its index in the newest-first list (1 = latest)")]
    pub async fn check_gif_by_index(
        &self,
        Parameters(params): Parameters<CheckGifByIndexParams>,
    ) -> Result<CallToolResult, McpError> {
        let reply = self.library.gif_by_index(params.index.unwrap_or(1)).await;
        Ok(reply_to_result(reply))
    }

    #[tool(description = "List tracked GIFs, newest first, with their index numbers")]
    pub async fn list_gifs(&self) -> Result<CallToolResult, McpError> {
        Ok(reply_to_result(self.library.list_gifs()))
    }

    #[tool(description = "Get a specific screenshot or GIF by filename")]
    pub async fn get_screenshot_by_name(
        &self,
        Parameters(params): Parameters<GetScreenshotByNameParams>,
    ) -> Result<CallToolResult, McpError> {
        let reply = self.library.screenshot_by_name(&params.filename).await;
        Ok(reply_to_result(reply))
    }

    #[tool(description = "List all tracked screenshots and GIFs with cache occupancy")]
    pub async fn list_screenshots(
        &self,
        Parameters(params): Parameters<ListScreenshotsParams>,
    ) -> Result<CallToolResult, McpError> {
        let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        Ok(reply_to_result(self.library.list_screenshots(limit)))
    }

    #[tool(
        description = "Extract frames from a GIF with custom sampling (higher size limit than \
                       the implicit GIF tools)"
    )]
    pub async fn extract_gif_frames(
        &self,
        Parameters(params): Parameters<ExtractGifFramesParams>,
    ) -> Result<CallToolResult, McpError> {
        let max_frames = params
            .max_frames
            .unwrap_or(self.library.config().max_frames_per_gif);
        let reply = self
            .library
            .extract_frames(params.filename.as_deref(), max_frames, params.frame_stride)
            .await;
        Ok(reply_to_result(reply))
    }
}

/// Converts a library [`Reply`] into MCP content
fn reply_to_result(reply: Reply) -> CallToolResult {
    let content: Vec<Content> = reply
        .parts
        .into_iter()
        .map(|part| match part {
            ReplyPart::Text(text) => Content::text(text),
            ReplyPart::Image { data, mime } => Content::image(STANDARD.encode(data), mime),
        })
        .collect();

    if reply.is_error {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    }
}

#[tool_handler]
impl ServerHandler for ShareXMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Read-only view of the ShareX screenshots folder. Use \
                 check_latest_screenshots after taking a screenshot, list_gifs plus \
                 check_gif_by_index for recordings, and extract_gif_frames when you need \
                 custom frame sampling."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}
