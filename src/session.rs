//! The two-step handshake and tool-call transaction

use crate::client::Client;
use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::protocol::RpcError;
use serde_json::Value;
use std::process::ExitStatus;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Progress of a session, in order. Transitions only move forward; any
/// started session ends in `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum SessionState {
    #[default]
    NotStarted,
    Started,
    Initialized,
    ToolInvoked,
    Terminated,
}

/// Outcome of a session that ran to completion
#[derive(Debug)]
pub struct SessionReport {
    /// Text items written to the output, in order.
    pub texts: Vec<String>,
    /// Last state reached before the server was terminated.
    pub reached: SessionState,
    pub exit_status: ExitStatus,
    /// Error object returned by the tool call, if any.
    pub tool_error: Option<RpcError>,
}

#[derive(Debug, Default)]
struct Exchange {
    texts: Vec<String>,
    tool_error: Option<RpcError>,
}

/// Start the server, run `initialize` then `tools/call`, write each result
/// text as a line to `out`, and terminate the server.
///
/// Once the server has been spawned it is terminated and reaped exactly once,
/// whatever happens during the exchange. Errors from the exchange are
/// returned after that cleanup.
pub async fn run_session<W>(config: &Config, out: &mut W) -> Result<SessionReport>
where
    W: AsyncWrite + Unpin,
{
    let mut client = Client::start(config).inspect_err(|e| {
        tracing::error!(state = ?SessionState::NotStarted, "Server did not start: {}", e);
    })?;

    let outcome = exchange(&mut client, config, out).await;
    let reached = client.state();
    tracing::debug!(from = ?reached, to = ?SessionState::Terminated, "Ending session");

    match (outcome, client.shutdown().await) {
        (Ok(exchange), Ok(exit_status)) => Ok(SessionReport {
            texts: exchange.texts,
            reached,
            exit_status,
            tool_error: exchange.tool_error,
        }),
        (Ok(_), Err(cleanup)) => Err(cleanup),
        (Err(e), Ok(status)) => {
            tracing::debug!(%status, ?reached, "Server reaped after failed session");
            Err(e)
        }
        (Err(e), Err(cleanup)) => {
            tracing::warn!("Failed to reap server after error: {}", cleanup);
            Err(e)
        }
    }
}

async fn exchange<W>(client: &mut Client, config: &Config, out: &mut W) -> Result<Exchange>
where
    W: AsyncWrite + Unpin,
{
    // Only synchronizes the handshake; the result is not inspected further.
    if let Some(response) = client.initialize(&config.client_info).await? {
        if let Some(error) = &response.error {
            tracing::warn!("initialize failed: {}", error);
        }
    }

    let Some(response) = client
        .call_tool(&config.tool_name, config.tool_arguments.clone())
        .await?
    else {
        return Ok(Exchange::default());
    };

    if let Some(error) = response.error {
        tracing::warn!(tool = %config.tool_name, "Tool call failed: {}", error);
        return Ok(Exchange {
            texts: Vec::new(),
            tool_error: Some(error),
        });
    }

    let result = response
        .tool_result()
        .map_err(|source| ClientError::Decode {
            line: response
                .result
                .as_ref()
                .map(Value::to_string)
                .unwrap_or_default(),
            source,
        })?;

    if result.is_error {
        tracing::warn!(tool = %config.tool_name, "Tool reported an error result");
    }

    let mut texts = Vec::with_capacity(result.content.len());
    for text in result.texts() {
        out.write_all(text.as_bytes())
            .await
            .map_err(ClientError::Output)?;
        out.write_all(b"\n").await.map_err(ClientError::Output)?;
        texts.push(text.to_string());
    }
    out.flush().await.map_err(ClientError::Output)?;

    Ok(Exchange {
        texts,
        tool_error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_server_fails_before_any_io() {
        let config = Config::with_server("/nonexistent/notebooklm-mcp");
        let mut out = Vec::new();

        let err = run_session(&config, &mut out).await.unwrap_err();

        assert!(matches!(err, ClientError::Spawn { .. }));
        assert!(out.is_empty());
    }

    #[test]
    fn states_only_move_forward() {
        let order = [
            SessionState::NotStarted,
            SessionState::Started,
            SessionState::Initialized,
            SessionState::ToolInvoked,
            SessionState::Terminated,
        ];

        assert_eq!(SessionState::default(), SessionState::NotStarted);
        assert!(order.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
