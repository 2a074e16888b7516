//! Newline-delimited JSON framing over a pair of async streams

use crate::error::{ClientError, Result};
use crate::protocol::{Request, Response};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// One JSON document per line in each direction.
///
/// The reader and writer are independent halves, typically a child's stdout
/// and stdin.
pub struct LineTransport<R, W> {
    reader: BufReader<R>,
    writer: W,
    line: String,
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
            line: String::new(),
        }
    }

    /// Write `request` as a single line and flush it.
    pub async fn send(&mut self, request: &Request) -> Result<()> {
        let json = serde_json::to_string(request).map_err(ClientError::Encode)?;
        tracing::debug!(id = %request.id, method = %request.method, "sending request");

        self.writer
            .write_all(json.as_bytes())
            .await
            .map_err(ClientError::Write)?;
        self.writer
            .write_all(b"\n")
            .await
            .map_err(ClientError::Write)?;
        self.writer.flush().await.map_err(ClientError::Write)?;
        Ok(())
    }

    /// Read exactly one line. `None` means the peer closed its output.
    pub async fn receive(&mut self) -> Result<Option<Response>> {
        self.line.clear();

        let read = self
            .reader
            .read_line(&mut self.line)
            .await
            .map_err(ClientError::Read)?;
        if read == 0 {
            tracing::debug!("server stdout closed");
            return Ok(None);
        }

        let trimmed = self.line.trim_end();
        tracing::trace!(line = trimmed, "received line");

        let decode = |source| ClientError::Decode {
            line: trimmed.to_string(),
            source,
        };
        let value: Value = serde_json::from_str(trimmed).map_err(decode)?;

        // Only objects carry an `id`; anything else is a message to discard.
        if !value.is_object() {
            tracing::debug!(line = trimmed, "Received non-object JSON");
            return Ok(Some(Response::default()));
        }

        Response::deserialize(value).map(Some).map_err(decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ClientInfo, RequestId};
    use serde_json::json;
    use std::io;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn send_writes_one_line_and_flushes() {
        let request = Request::initialize(RequestId::new(1), &ClientInfo::default());
        let expected = serde_json::to_string(&request).unwrap();

        let reader = Builder::new().build();
        let writer = Builder::new()
            .write(expected.as_bytes())
            .write(b"\n")
            .build();

        let mut transport = LineTransport::new(reader, writer);
        transport.send(&request).await.expect("Should send");
    }

    #[tokio::test]
    async fn send_reports_broken_pipe_as_write_error() {
        let reader = Builder::new().build();
        let writer = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            .build();

        let mut transport = LineTransport::new(reader, writer);
        let request = Request::call_tool(RequestId::new(2), "notebook_list", json!({}));
        let err = transport.send(&request).await.unwrap_err();

        assert!(matches!(err, ClientError::Write(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[tokio::test]
    async fn receive_consumes_one_line_per_call() {
        let reader = Builder::new()
            .read(b"{\"method\":\"log\",\"params\":{}}\n{\"id\":1,")
            .read(b"\"result\":{}}\n")
            .build();
        let writer = Builder::new().build();
        let mut transport = LineTransport::new(reader, writer);

        let first = transport.receive().await.unwrap().expect("First line");
        assert_eq!(first.method.as_deref(), Some("log"));
        assert_eq!(first.id(), None);

        let second = transport.receive().await.unwrap().expect("Second line");
        assert!(second.matches(RequestId::new(1)));
        assert_eq!(second.result, Some(json!({})));

        assert!(transport.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn receive_rejects_invalid_json() {
        let reader = Builder::new().read(b"not json\n").build();
        let writer = Builder::new().build();
        let mut transport = LineTransport::new(reader, writer);

        match transport.receive().await {
            Err(ClientError::Decode { line, .. }) => assert_eq!(line, "not json"),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn blank_line_is_a_decode_error() {
        let reader = Builder::new().read(b"\n").build();
        let writer = Builder::new().build();
        let mut transport = LineTransport::new(reader, writer);

        assert!(matches!(
            transport.receive().await,
            Err(ClientError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn non_object_lines_never_match() {
        let reader = Builder::new()
            .read(b"[2,null,{\"content\":[{\"text\":\"from an array\"}]}]\n")
            .read(b"null\n")
            .read(b"42\n")
            .build();
        let writer = Builder::new().build();
        let mut transport = LineTransport::new(reader, writer);

        for _ in 0..3 {
            let message = transport.receive().await.unwrap().expect("One line");
            assert_eq!(message.id(), None);
            assert!(!message.matches(RequestId::new(2)));
            assert!(message.result.is_none());
        }
        assert!(transport.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn final_line_without_newline_is_still_read() {
        let reader = Builder::new().read(b"{\"id\":3}").build();
        let writer = Builder::new().build();
        let mut transport = LineTransport::new(reader, writer);

        let response = transport.receive().await.unwrap().expect("Line before EOF");
        assert!(response.matches(RequestId::new(3)));
        assert!(transport.receive().await.unwrap().is_none());
    }
}
