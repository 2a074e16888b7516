//! JSON-RPC message types for the MCP stdio transport

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// JSON-RPC version carried by every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision announced during the handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// Identifier correlating a request with its response.
///
/// Allocated by the client, never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The id that follows this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identification sent in the `clientInfo` field of `initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "test-client".to_string(),
            version: "1.0.0".to_string(),
        }
    }
}

/// Outgoing JSON-RPC request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl Request {
    pub fn new(id: RequestId, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }

    /// Handshake request with an empty capability set.
    pub fn initialize(id: RequestId, client_info: &ClientInfo) -> Self {
        Self::new(
            id,
            METHOD_INITIALIZE,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": client_info.name,
                    "version": client_info.version,
                },
            }),
        )
    }

    pub fn call_tool(id: RequestId, name: &str, arguments: Value) -> Self {
        Self::new(
            id,
            METHOD_TOOLS_CALL,
            json!({
                "name": name,
                "arguments": arguments,
            }),
        )
    }
}

/// Error object of a failed JSON-RPC call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// Any line received from the server.
///
/// Responses carry an `id`; notifications and log messages usually carry a
/// `method` and no `id`. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    /// The integer id of this message, if it has one.
    ///
    /// Ids of any other JSON type never correlate with a request.
    pub fn id(&self) -> Option<RequestId> {
        self.id.as_ref().and_then(Value::as_u64).map(RequestId)
    }

    pub fn matches(&self, id: RequestId) -> bool {
        self.id() == Some(id)
    }

    /// Decode `result` as a `tools/call` result. A missing result is empty.
    pub fn tool_result(&self) -> Result<ToolResult, serde_json::Error> {
        match &self.result {
            Some(result) => ToolResult::deserialize(result),
            None => Ok(ToolResult::default()),
        }
    }
}

/// Result payload of `tools/call`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    #[serde(default)]
    pub content: Vec<ContentItem>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    /// Text of every content item, in order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.content.iter().map(ContentItem::text)
    }
}

/// One element of `result.content`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ContentItem {
    /// The text field, or an empty string when absent.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}
