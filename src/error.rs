//! Error types for the transaction client

use crate::protocol::RequestId;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to an MCP server subprocess.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server executable could not be started.
    #[error("failed to spawn {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A piped stdio handle was not available after spawning.
    #[error("subprocess {0} was not piped")]
    MissingPipe(&'static str),

    /// Writing to the server's stdin failed.
    #[error("failed to write to server stdin: {0}")]
    Write(#[source] io::Error),

    /// Reading from the server's stdout failed.
    #[error("failed to read from server stdout: {0}")]
    Read(#[source] io::Error),

    /// A request could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    /// A line from the server was not a valid JSON message.
    #[error("invalid JSON from server: {source} (line: {line:?})")]
    Decode {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// No response arrived before the deadline.
    #[error("no response to request {id} within {after:?}")]
    Timeout { id: RequestId, after: Duration },

    /// Writing extracted text to the caller's output failed.
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),

    /// Waiting for the subprocess to exit failed.
    #[error("failed to reap server process: {0}")]
    Shutdown(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        let spawn = ClientError::Spawn {
            path: PathBuf::from("/missing/server"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert!(spawn.to_string().contains("/missing/server"));

        let timeout = ClientError::Timeout {
            id: RequestId::new(2),
            after: Duration::from_millis(250),
        };
        assert_eq!(timeout.to_string(), "no response to request 2 within 250ms");
    }
}
