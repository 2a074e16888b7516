//! Notebook MCP Client
//!
//! This crate provides a minimal Model Context Protocol (MCP) client that
//! spawns a server over stdio, performs the `initialize` handshake, calls a
//! single tool and prints the text content of its result.
//!
//! # Example
//!
//! ```no_run
//! use notebook_mcp_client::{run_session, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let report = run_session(&config, &mut tokio::io::stdout()).await?;
//!     eprintln!("server exited with {}", report.exit_status);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod pending;
pub mod protocol;
pub mod session;
pub mod transport;

pub use client::Client;
pub use config::{Config, LogLevel};
pub use error::{ClientError, Result};
pub use protocol::{ClientInfo, ContentItem, Request, RequestId, Response, RpcError, ToolResult};
pub use session::{run_session, SessionReport, SessionState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_serialize_request() {
        let request = Request::call_tool(RequestId::new(2), "notebook_list", serde_json::json!({}));
        let json = serde_json::to_string(&request).expect("Should serialize");

        assert!(json.contains("tools/call"));
        assert!(json.contains("notebook_list"));
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
    }

    #[test]
    fn can_parse_tool_response() {
        let line = r#"{"id":2,"result":{"content":[{"text":"Notebook A"},{"text":"Notebook B"}]}}"#;
        let response: Response = serde_json::from_str(line).expect("Should parse");

        assert!(response.matches(RequestId::new(2)));
        let texts: Vec<String> = response
            .tool_result()
            .expect("Should decode")
            .texts()
            .map(str::to_string)
            .collect();
        assert_eq!(texts, vec!["Notebook A", "Notebook B"]);
    }
}
